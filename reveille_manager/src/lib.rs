mod alert;
mod manager;

pub use alert::RingingAlert;
pub use manager::AlarmManager;
