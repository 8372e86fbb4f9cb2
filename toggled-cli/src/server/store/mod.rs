pub mod sled_store;

use std::sync::Arc;

use toggled_lib::{FlagStore, MemoryStore, StoreError};

pub use sled_store::SledStore;

use super::config::{ServerConfig, StorageBackend};

/// Open the storage backend selected in `config`.
pub fn open_store(config: &ServerConfig) -> Result<Arc<dyn FlagStore>, StoreError> {
    match config.storage {
        StorageBackend::Sled => Ok(Arc::new(SledStore::open(&config.data_dir)?)),
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}
