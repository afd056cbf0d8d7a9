//! Gateway: the HTTP surface of the relay.
//!
//! Lifecycle:
//! 1. Ensure the download directory exists
//! 2. Probe the extraction tool
//! 3. Wire the Messenger client and retrieval client into the dispatcher
//! 4. Serve the webhook, status, health and cleanup routes
//!
//! All domain logic (matching, retrieval, relay) lives in other crates and
//! is reached through the dispatcher.

pub mod server;

pub use server::{AppState, build_app, start_gateway};
