pub mod in_memory;
pub mod record;
pub mod store;

pub use in_memory::InMemoryStore;
pub use record::{DataRecord, RecordStatus};
pub use store::{PersistenceStore, StoreError};

#[cfg(test)]
pub use store::MockPersistenceStore;
