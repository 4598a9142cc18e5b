mod alarm_store;
mod key_value;
mod repository;

pub use alarm_store::AlarmStore;
pub use key_value::{FileKeyValueStore, InMemoryKeyValueStore, KeyValueStore, StorageError};
pub use repository::AlarmRepository;
