//! Shared types and error plumbing used across all vidrelay crates.

pub mod error;
pub mod types;

pub use error::FromMessage;
pub use types::InboundMessage;
