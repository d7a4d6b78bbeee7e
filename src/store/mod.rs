pub mod disk;
pub mod memory;

pub use disk::DiskStorage;
pub use memory::MemoryStorage;

use crate::core::storage::KeyValueStorage;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Opens the disk store under `data_path`, falling back to memory when the
/// keyspace cannot be opened. Conversions keep working either way.
pub fn open_or_memory(data_path: &Path) -> Arc<dyn KeyValueStorage> {
    match DiskStorage::open(data_path) {
        Ok(disk) => Arc::new(disk),
        Err(e) => {
            warn!(
                "Could not open storage at {}: {}. History will not be saved.",
                data_path.display(),
                e
            );
            Arc::new(MemoryStorage::new())
        }
    }
}
