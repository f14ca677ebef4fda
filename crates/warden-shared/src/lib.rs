//! # Warden Shared
//!
//! Wire types shared between the Warden server and its clients.

pub mod dto;
pub mod response;

pub use response::ErrorResponse;
