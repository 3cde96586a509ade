// Store module: persistence backends for the ledger

pub mod backend;

pub use backend::{MemoryStorage, SledStorage, StorageBackend};
