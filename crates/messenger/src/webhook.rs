//! Inbound webhook payloads and the subscription handshake.

use {serde::Deserialize, vidrelay_common::InboundMessage};

/// Verify a webhook subscription (GET request).
///
/// The platform sends `hub.mode=subscribe`, `hub.verify_token=<token>` and
/// `hub.challenge=<random string>`. Returns `Some(challenge)` when the mode
/// and token check out. An empty configured token never verifies, so an
/// unconfigured deployment cannot be subscribed to by accident.
pub fn verify_subscription(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&str>,
    verify_token: &str,
) -> Option<String> {
    let mode = mode?;
    let token = token?;
    let challenge = challenge?;

    if verify_token.is_empty() {
        return None;
    }

    if mode == "subscribe" && token == verify_token {
        Some(challenge.to_string())
    } else {
        None
    }
}

/// Top-level event-delivery payload (POST request).
#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub messaging: Vec<MessagingEvent>,
}

#[derive(Debug, Deserialize)]
pub struct MessagingEvent {
    pub sender: Option<Sender>,
    pub message: Option<MessagePayload>,
    pub postback: Option<Postback>,
}

#[derive(Debug, Deserialize)]
pub struct Sender {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct MessagePayload {
    /// Set on deliveries that echo our own sends back at us.
    #[serde(default)]
    pub is_echo: bool,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Postback {
    #[serde(default)]
    pub payload: String,
}

/// One inbound event worth reacting to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Message(InboundMessage),
    Postback {
        recipient_id: String,
        payload: String,
    },
}

impl WebhookPayload {
    /// Whether this delivery is a page subscription at all.
    #[must_use]
    pub fn is_page_subscription(&self) -> bool {
        self.object == "page"
    }

    /// Flatten the entry/messaging nesting into inbound events. Echoes of
    /// our own sends and events without a sender or a non-empty text are
    /// dropped here.
    #[must_use]
    pub fn events(&self) -> Vec<InboundEvent> {
        let mut events = Vec::new();
        for entry in &self.entry {
            for messaging in &entry.messaging {
                let Some(sender) = &messaging.sender else {
                    continue;
                };
                if let Some(message) = &messaging.message {
                    if message.is_echo {
                        continue;
                    }
                    if let Some(text) = &message.text
                        && !text.is_empty()
                    {
                        events.push(InboundEvent::Message(InboundMessage::new(
                            sender.id.clone(),
                            text.clone(),
                        )));
                    }
                    continue;
                }
                if let Some(postback) = &messaging.postback {
                    events.push(InboundEvent::Postback {
                        recipient_id: sender.id.clone(),
                        payload: postback.payload.clone(),
                    });
                }
            }
        }
        events
    }
}
