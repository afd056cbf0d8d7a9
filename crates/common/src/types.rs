use serde::{Deserialize, Serialize};

/// One inbound chat message handed from the webhook layer to the dispatch
/// pipeline. Created per event, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Opaque sender identifier as supplied by the platform. Doubles as the
    /// recipient of every reply and as the download-filename namespace.
    pub recipient_id: String,
    /// Raw message text.
    pub text: String,
}

impl InboundMessage {
    #[must_use]
    pub fn new(recipient_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            text: text.into(),
        }
    }
}
