#[cfg(feature = "audio")]
mod rodio_player;

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use reveille_models::alarm::{Alarm, AlarmId};

#[cfg(feature = "audio")]
pub use rodio_player::RodioSoundPlayer;

const FALLBACK_ASSET: &str = "radar.mp3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoundSource {
    Bundled(PathBuf),
    Custom(String),
}

impl fmt::Display for SoundSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoundSource::Bundled(path) => write!(f, "{}", path.display()),
            SoundSource::Custom(url) => f.write_str(url),
        }
    }
}

pub fn resolve_sound(alarm: &Alarm, assets_dir: &Path) -> SoundSource {
    if alarm.sound_type.uses_custom_source() {
        let custom = alarm
            .sound_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty());

        if let Some(url) = custom {
            return SoundSource::Custom(url.to_owned());
        }

        log::warn!(
            "Alarm {} uses {} without a sound URL, falling back to the bundled tone",
            alarm.id,
            alarm.sound_type.display_name()
        );
    }

    let asset = alarm.sound_type.bundled_asset().unwrap_or(FALLBACK_ASSET);
    SoundSource::Bundled(assets_dir.join(asset))
}

/// A single looping audio output. Starting playback for one alarm replaces
/// whatever another alarm was playing.
pub trait SoundPlayer: Send + Sync + 'static {
    fn play_looping(&self, alarm_id: &AlarmId, source: &SoundSource) -> anyhow::Result<()>;

    /// Stops playback if `alarm_id` still owns it. Returns whether anything stopped.
    fn stop(&self, alarm_id: &AlarmId) -> bool;

    fn now_playing(&self) -> Option<AlarmId>;
}

/// Tracks which alarm currently owns the output.
#[derive(Default)]
pub(crate) struct PlaybackOwner(Mutex<Option<AlarmId>>);

impl PlaybackOwner {
    pub(crate) fn claim(&self, alarm_id: &AlarmId) -> Option<AlarmId> {
        let mut owner = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        owner
            .replace(alarm_id.clone())
            .filter(|previous| previous != alarm_id)
    }

    pub(crate) fn release(&self, alarm_id: &AlarmId) -> bool {
        let mut owner = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if owner.as_ref() == Some(alarm_id) {
            *owner = None;
            true
        } else {
            false
        }
    }

    pub(crate) fn current(&self) -> Option<AlarmId> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Writes playback changes to the log instead of an audio device.
#[derive(Default)]
pub struct LogSoundPlayer {
    owner: PlaybackOwner,
}

impl LogSoundPlayer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SoundPlayer for LogSoundPlayer {
    fn play_looping(&self, alarm_id: &AlarmId, source: &SoundSource) -> anyhow::Result<()> {
        if let Some(previous) = self.owner.claim(alarm_id) {
            log::warn!("Alarm {alarm_id} replaces the sound of alarm {previous}");
        }
        log::info!("Playing {source} on loop for alarm {alarm_id}");
        Ok(())
    }

    fn stop(&self, alarm_id: &AlarmId) -> bool {
        let stopped = self.owner.release(alarm_id);
        if stopped {
            log::info!("Sound for alarm {alarm_id} stopped");
        }
        stopped
    }

    fn now_playing(&self) -> Option<AlarmId> {
        self.owner.current()
    }
}

#[cfg(test)]
mod tests {
    use reveille_models::{
        alarm::{AlarmTime, SoundType},
        chrono::NaiveDate,
    };

    use super::*;

    fn alarm(sound_type: SoundType, sound_url: Option<&str>) -> Alarm {
        Alarm {
            id: AlarmId::from("a"),
            time: AlarmTime::new(
                NaiveDate::from_ymd_opt(2025, 5, 31)
                    .unwrap()
                    .and_hms_opt(7, 0, 0)
                    .unwrap(),
            ),
            label: "Alarm 1".to_owned(),
            is_active: true,
            sound_type,
            sound_url: sound_url.map(str::to_owned),
        }
    }

    #[test]
    fn radar_resolves_to_bundled_asset() {
        let source = resolve_sound(&alarm(SoundType::Radar, Some("ignored")), Path::new("assets"));

        assert_eq!(source, SoundSource::Bundled(PathBuf::from("assets/radar.mp3")));
    }

    #[test]
    fn custom_source_uses_sound_url() {
        let source = resolve_sound(
            &alarm(SoundType::Youtube, Some(" https://youtu.be/x ")),
            Path::new("assets"),
        );

        assert_eq!(source, SoundSource::Custom("https://youtu.be/x".to_owned()));
    }

    #[test]
    fn custom_source_without_url_falls_back() {
        let source = resolve_sound(&alarm(SoundType::Youtube, Some("  ")), Path::new("assets"));

        assert_eq!(source, SoundSource::Bundled(PathBuf::from("assets/radar.mp3")));
    }

    #[test]
    fn stop_only_silences_current_owner() {
        let player = LogSoundPlayer::new();
        let first = AlarmId::from("first");
        let second = AlarmId::from("second");
        let source = SoundSource::Custom("tone".to_owned());

        player.play_looping(&first, &source).unwrap();
        player.play_looping(&second, &source).unwrap();

        assert!(!player.stop(&first));
        assert_eq!(player.now_playing(), Some(second.clone()));
        assert!(player.stop(&second));
        assert!(!player.stop(&second));
        assert_eq!(player.now_playing(), None);
    }
}
