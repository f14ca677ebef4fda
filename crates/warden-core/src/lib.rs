//! # Warden Core
//!
//! The admission layer of Warden: everything an inbound request passes through
//! before it reaches a handler.
//! This crate holds the domain types, the ports adapters must implement, and
//! the services that compose them. It has no framework or network dependencies.

pub mod domain;
pub mod error;
pub mod ports;
pub mod services;

pub use error::ConfigError;
pub use services::{AdmissionOutcome, AdmissionPipeline, LocalRateLimiter, PolicyOracleClient};
