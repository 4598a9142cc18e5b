use std::sync::Arc;

use reveille_models::{alarm::Alarm, settings::DEFAULT_ALARMS_KEY};

use crate::key_value::{KeyValueStore, StorageError};

/// The alarm collection serialized as one JSON array under a fixed key.
pub struct AlarmStore {
    kv: Arc<dyn KeyValueStore>,
    key: String,
}

impl AlarmStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(kv, DEFAULT_ALARMS_KEY)
    }

    pub fn with_key(kv: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            kv,
            key: key.into(),
        }
    }

    /// Reads the persisted snapshot. Any failure yields an empty collection.
    pub async fn load(&self) -> Vec<Alarm> {
        let bytes = match self.kv.get(&self.key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                log::info!("No alarm snapshot stored under {:?}", self.key);
                return Vec::new();
            }
            Err(e) => {
                log::warn!("Failed to read alarm snapshot {:?}: {e}", self.key);
                return Vec::new();
            }
        };

        match serde_json::from_slice::<Vec<Alarm>>(&bytes) {
            Ok(alarms) => {
                log::info!("Loaded {} alarms", alarms.len());
                alarms
            }
            Err(e) => {
                log::warn!("Alarm snapshot {:?} is unreadable, starting empty: {e}", self.key);
                Vec::new()
            }
        }
    }

    pub async fn save(&self, alarms: &[Alarm]) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(alarms)?;
        self.kv.set(&self.key, bytes).await
    }
}
