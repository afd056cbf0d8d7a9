//! Outbound sends through the platform Send API.
//!
//! Every operation POSTs to the configured endpoint with the page access
//! token as a query parameter. Failures never escape as errors: callers get
//! a [`SendAck`] and the details go to the log.

use std::path::Path;

use {
    secrecy::ExposeSecret,
    serde::Deserialize,
    tracing::{debug, info, warn},
    vidrelay_config::MessengerConfig,
};

/// Delivery acknowledgment for one send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendAck {
    /// The platform accepted the send.
    Delivered,
    /// The platform answered with an error object.
    Rejected { code: i64, message: String },
    /// The request never produced a usable platform answer.
    TransportFailed,
}

impl SendAck {
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, SendAck::Delivered)
    }
}

/// Send-API response body. A present `error` means the send was rejected
/// regardless of the HTTP status.
#[derive(Debug, Deserialize)]
struct SendResponse {
    error: Option<ApiError>,
    message_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: i64,
}

/// Send-API client for one page.
#[derive(Debug, Clone)]
pub struct MessengerClient {
    http: reqwest::Client,
    config: MessengerConfig,
}

impl MessengerClient {
    #[must_use]
    pub fn new(config: MessengerConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Send a plain text message.
    pub async fn send_text(&self, recipient_id: &str, text: &str) -> SendAck {
        debug!(
            recipient_id,
            text_len = text.len(),
            "messenger outbound text send start"
        );
        let payload = serde_json::json!({
            "recipient": { "id": recipient_id },
            "message": { "text": text },
        });
        let result = self.post().json(&payload).send().await;
        self.ack("send_text", recipient_id, result).await
    }

    /// Flash the typing indicator. Cosmetic; a failure here never affects
    /// the pipeline, so there is nothing to acknowledge.
    pub async fn send_typing(&self, recipient_id: &str) {
        let payload = serde_json::json!({
            "recipient": { "id": recipient_id },
            "sender_action": "typing_on",
        });
        if let Err(e) = self.post().json(&payload).send().await {
            debug!(recipient_id, error = %e, "typing indicator send failed");
        }
    }

    /// Upload a video file as an attachment.
    pub async fn send_media_file(&self, recipient_id: &str, path: &Path) -> SendAck {
        info!(
            recipient_id,
            path = %path.display(),
            "messenger outbound video upload start"
        );

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(
                    recipient_id,
                    path = %path.display(),
                    error = %e,
                    "could not read video for upload"
                );
                return SendAck::TransportFailed;
            },
        };

        let part = match reqwest::multipart::Part::bytes(bytes)
            .file_name("video.mp4")
            .mime_str("video/mp4")
        {
            Ok(part) => part,
            Err(e) => {
                warn!(recipient_id, error = %e, "could not build multipart body");
                return SendAck::TransportFailed;
            },
        };
        let form = reqwest::multipart::Form::new()
            .text(
                "recipient",
                serde_json::json!({ "id": recipient_id }).to_string(),
            )
            .text(
                "message",
                serde_json::json!({
                    "attachment": { "type": "video", "payload": {} },
                })
                .to_string(),
            )
            .part("filedata", part);

        let result = self.post().multipart(form).send().await;
        let ack = self.ack("send_media_file", recipient_id, result).await;
        if ack.is_delivered() {
            info!(
                recipient_id,
                path = %path.display(),
                "messenger outbound video uploaded"
            );
        }
        ack
    }

    /// Send a video attachment by URL, letting the platform fetch it.
    pub async fn send_media_link(&self, recipient_id: &str, url: &str) -> SendAck {
        debug!(recipient_id, url, "messenger outbound video link send start");
        let payload = serde_json::json!({
            "recipient": { "id": recipient_id },
            "message": {
                "attachment": {
                    "type": "video",
                    "payload": { "url": url, "is_reusable": false },
                },
            },
        });
        let result = self.post().json(&payload).send().await;
        self.ack("send_media_link", recipient_id, result).await
    }

    fn post(&self) -> reqwest::RequestBuilder {
        self.http
            .post(&self.config.api_url)
            .query(&[("access_token", self.config.access_token.expose_secret())])
    }

    async fn ack(
        &self,
        operation: &'static str,
        recipient_id: &str,
        result: Result<reqwest::Response, reqwest::Error>,
    ) -> SendAck {
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(recipient_id, operation, error = %e, "messenger send failed in transport");
                return SendAck::TransportFailed;
            },
        };

        let status = response.status();
        let body: SendResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!(
                    recipient_id,
                    operation,
                    status = %status,
                    error = %e,
                    "messenger answer was not valid JSON"
                );
                return SendAck::TransportFailed;
            },
        };

        match body.error {
            Some(error) => {
                warn!(
                    recipient_id,
                    operation,
                    code = error.code,
                    message = %error.message,
                    "messenger rejected the send"
                );
                SendAck::Rejected {
                    code: error.code,
                    message: error.message,
                }
            },
            None => {
                debug!(
                    recipient_id,
                    operation,
                    message_id = ?body.message_id,
                    "messenger accepted the send"
                );
                SendAck::Delivered
            },
        }
    }
}
