mod backend;
mod store;

#[cfg(test)]
mod tests;

pub use backend::{MemorySecrets, SecretBackend, SecretError, SecretVersion};
pub use store::SecretStore;
