use parking_lot::Mutex;

use crate::ports::{ConfigStoreError, TrustConfig, TrustConfigStore};

/// Keeps the configuration in memory.
#[derive(Debug, Default)]
pub struct InMemoryTrustConfigStore {
    config: Mutex<TrustConfig>,
    saves: Mutex<usize>,
}

impl InMemoryTrustConfigStore {
    pub fn new(config: TrustConfig) -> Self {
        Self {
            config: Mutex::new(config),
            saves: Mutex::new(0),
        }
    }

    /// Number of `save` calls so far.
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

impl TrustConfigStore for InMemoryTrustConfigStore {
    fn load(&self) -> Result<TrustConfig, ConfigStoreError> {
        Ok(self.config.lock().clone())
    }

    fn save(&self, config: &TrustConfig) -> Result<(), ConfigStoreError> {
        *self.config.lock() = config.clone();
        *self.saves.lock() += 1;
        Ok(())
    }
}
