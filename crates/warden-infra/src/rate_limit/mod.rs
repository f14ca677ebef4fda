//! Rate limiting implementations.

mod memory;

pub use memory::{DEFAULT_MAX_KEYS, InMemoryWindowStore, RateLimitConfig};
