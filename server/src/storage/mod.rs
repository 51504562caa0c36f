mod batch;
mod entries;
mod error;
pub mod kv;
pub mod path;

#[cfg(test)]
mod tests;

pub use batch::{BatchFailure, PermitPool, WriteBatcher, DEFAULT_PARALLEL_OPERATIONS};
pub use entries::{EntryStore, Record, UpsertReport};
pub use error::StorageError;
