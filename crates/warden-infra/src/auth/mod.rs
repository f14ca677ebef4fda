//! Authentication gate implementations.

mod jwt;

pub use jwt::{JwtAuthGate, JwtConfig};
