mod clock;
mod delayed_task;
pub mod fire_time;
mod local_center;
pub mod notification;
mod re_alert;
mod scheduler;
pub mod sound;

#[cfg(any(test, feature = "test-util"))]
pub mod test_util;

#[cfg(test)]
mod tests;

pub use clock::{Clock, SystemClock};
pub use local_center::LocalNotificationCenter;
pub use notification::{
    AuthorizationStatus, NotificationError, NotificationEvent, NotificationRequest,
    NotificationService, NotificationTrigger,
};
pub use re_alert::AlarmLoopState;
pub use scheduler::{NotificationScheduler, SchedulerOptions};
pub use sound::{LogSoundPlayer, SoundPlayer, SoundSource};
