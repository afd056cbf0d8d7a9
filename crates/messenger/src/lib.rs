//! Messenger platform integration: the Send API client for outbound
//! messages and the webhook payload/handshake types for inbound events.

mod outbound;
mod webhook;

pub use {
    outbound::{MessengerClient, SendAck},
    webhook::{InboundEvent, WebhookPayload, verify_subscription},
};
