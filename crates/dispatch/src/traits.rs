//! Seams between the pipeline and its two I/O-heavy collaborators. Tests
//! substitute recording fakes; production wires in the real clients below.

use std::path::Path;

use async_trait::async_trait;

use {
    vidrelay_fetch::{Fetcher, RetrievalResult},
    vidrelay_messenger::{MessengerClient, SendAck},
};

/// Outbound side of the pipeline.
#[async_trait]
pub trait Relay: Send + Sync {
    async fn send_text(&self, recipient_id: &str, text: &str) -> SendAck;
    async fn send_typing(&self, recipient_id: &str);
    async fn send_media_file(&self, recipient_id: &str, path: &Path) -> SendAck;
}

#[async_trait]
impl Relay for MessengerClient {
    async fn send_text(&self, recipient_id: &str, text: &str) -> SendAck {
        MessengerClient::send_text(self, recipient_id, text).await
    }

    async fn send_typing(&self, recipient_id: &str) {
        MessengerClient::send_typing(self, recipient_id).await;
    }

    async fn send_media_file(&self, recipient_id: &str, path: &Path) -> SendAck {
        MessengerClient::send_media_file(self, recipient_id, path).await
    }
}

/// Retrieval side of the pipeline.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn fetch(&self, url: &str, namespace: Option<&str>) -> RetrievalResult;
}

#[async_trait]
impl Retriever for Fetcher {
    async fn fetch(&self, url: &str, namespace: Option<&str>) -> RetrievalResult {
        Fetcher::fetch(self, url, namespace).await
    }
}
