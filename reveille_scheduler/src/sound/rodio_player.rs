use std::{
    fs::File,
    io::BufReader,
    path::PathBuf,
    sync::mpsc,
    thread,
};

use anyhow::Context;
use reveille_models::alarm::AlarmId;
use rodio::{Decoder, OutputStreamBuilder, Sink, Source};

use super::{PlaybackOwner, SoundPlayer, SoundSource};

enum AudioCommand {
    Play(PathBuf),
    Stop,
}

/// Plays alarm sounds on the default output device. The output stream lives
/// on a dedicated thread because it can not be shared across threads.
pub struct RodioSoundPlayer {
    commands: mpsc::Sender<AudioCommand>,
    owner: PlaybackOwner,
}

impl RodioSoundPlayer {
    pub fn spawn() -> anyhow::Result<Self> {
        let (commands, rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        thread::Builder::new()
            .name("reveille-audio".to_owned())
            .spawn(move || run_audio_thread(rx, ready_tx))
            .context("Failed to start audio thread")?;

        ready_rx
            .recv()
            .context("Audio thread exited before opening the output device")?
            .map_err(|e| anyhow::anyhow!("Failed to open audio output: {e}"))?;

        Ok(Self {
            commands,
            owner: PlaybackOwner::default(),
        })
    }
}

fn source_path(source: &SoundSource) -> anyhow::Result<PathBuf> {
    match source {
        SoundSource::Bundled(path) => Ok(path.clone()),
        SoundSource::Custom(url) if url.starts_with("http://") || url.starts_with("https://") => {
            anyhow::bail!("Remote sound sources can not be played: {url}")
        }
        SoundSource::Custom(url) => Ok(PathBuf::from(url.strip_prefix("file://").unwrap_or(url))),
    }
}

impl SoundPlayer for RodioSoundPlayer {
    fn play_looping(&self, alarm_id: &AlarmId, source: &SoundSource) -> anyhow::Result<()> {
        let path = source_path(source)?;
        if let Some(previous) = self.owner.claim(alarm_id) {
            log::warn!("Alarm {alarm_id} replaces the sound of alarm {previous}");
        }
        self.commands
            .send(AudioCommand::Play(path))
            .context("Audio thread is gone")?;
        Ok(())
    }

    fn stop(&self, alarm_id: &AlarmId) -> bool {
        if !self.owner.release(alarm_id) {
            return false;
        }
        if self.commands.send(AudioCommand::Stop).is_err() {
            log::warn!("Audio thread is gone, nothing to stop for alarm {alarm_id}");
        }
        true
    }

    fn now_playing(&self) -> Option<AlarmId> {
        self.owner.current()
    }
}

fn run_audio_thread(
    rx: mpsc::Receiver<AudioCommand>,
    ready: mpsc::Sender<Result<(), String>>,
) {
    let stream = match OutputStreamBuilder::open_default_stream() {
        Ok(stream) => {
            let _ = ready.send(Ok(()));
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e.to_string()));
            return;
        }
    };

    let mut sink: Option<Sink> = None;
    while let Ok(command) = rx.recv() {
        if let Some(current) = sink.take() {
            current.stop();
        }

        if let AudioCommand::Play(path) = command {
            let decoded = File::open(&path)
                .map_err(anyhow::Error::from)
                .and_then(|file| Decoder::new(BufReader::new(file)).map_err(anyhow::Error::from));

            match decoded {
                Ok(decoder) => {
                    let new_sink = Sink::connect_new(stream.mixer());
                    new_sink.append(decoder.repeat_infinite());
                    new_sink.play();
                    sink = Some(new_sink);
                }
                Err(e) => log::error!("Failed to play {}: {e:#}", path.display()),
            }
        }
    }
}
