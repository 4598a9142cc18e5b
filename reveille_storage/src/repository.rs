use reveille_models::alarm::{Alarm, AlarmId};

use crate::{alarm_store::AlarmStore, key_value::StorageError};

/// Canonical in-memory alarm list. Changes made through `mutate`/`update`
/// only reach storage once `persist` is called.
pub struct AlarmRepository {
    store: AlarmStore,
    alarms: Vec<Alarm>,
}

impl AlarmRepository {
    pub async fn load(store: AlarmStore) -> Self {
        let alarms = store.load().await;
        Self { store, alarms }
    }

    pub fn alarms(&self) -> &[Alarm] {
        &self.alarms
    }

    pub fn get(&self, id: &AlarmId) -> Option<&Alarm> {
        self.alarms.iter().find(|alarm| &alarm.id == id)
    }

    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }

    pub fn mutate<R>(&mut self, f: impl FnOnce(&mut Vec<Alarm>) -> R) -> R {
        f(&mut self.alarms)
    }

    /// Applies `f` to the alarm with `id`. Returns `None` if there is no such alarm.
    pub fn update<R>(&mut self, id: &AlarmId, f: impl FnOnce(&mut Alarm) -> R) -> Option<R> {
        self.alarms.iter_mut().find(|alarm| &alarm.id == id).map(f)
    }

    pub async fn persist(&self) -> Result<(), StorageError> {
        self.store.save(&self.alarms).await
    }
}
