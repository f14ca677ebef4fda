//! Domain types - the values that flow through the admission pipeline.

mod client_key;
mod decision;
mod identity;
mod request;
mod window;

pub use client_key::ClientKey;
pub use decision::{PolicyDecision, RateLimitDecision};
pub use identity::IdentityContext;
pub use request::InboundRequest;
pub use window::{WindowRecord, window_end};
