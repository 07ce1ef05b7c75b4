pub mod client;
pub mod memory;

pub use client::{ValidationResultCache, cache_key, key_fingerprint};
pub use memory::InMemoryValidationResultCache;
