//! The dispatch pipeline: everything between an inbound message and the
//! reply its sender sees.
//!
//! The head of the pipeline (keyword short-circuit, URL matching, the
//! processing acknowledgment) runs on the webhook handler's task. The slow
//! remainder (retrieval, size decision, relay, cleanup) runs detached so
//! the platform gets its answer right away.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use {
    vidrelay_common::InboundMessage,
    vidrelay_config::VidrelayConfig,
    vidrelay_fetch::{RetrievalResult, remove_file},
    vidrelay_messenger::InboundEvent,
    vidrelay_sources::{SourceFilter, extract_url},
};

use crate::traits::{Relay, Retriever};

/// Postback payload the platform sends for the get-started button.
const GET_STARTED_PAYLOAD: &str = "GET_STARTED";

/// Drives one inbound message through matching, retrieval and relay.
#[derive(Clone)]
pub struct Dispatcher {
    config: Arc<VidrelayConfig>,
    filter: SourceFilter,
    relay: Arc<dyn Relay>,
    retriever: Arc<dyn Retriever>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        config: Arc<VidrelayConfig>,
        relay: Arc<dyn Relay>,
        retriever: Arc<dyn Retriever>,
    ) -> Self {
        let filter = SourceFilter::new(config.download.sources.iter().copied());
        Self {
            config,
            filter,
            relay,
            retriever,
        }
    }

    /// React to one flattened webhook event.
    pub async fn handle_event(&self, event: InboundEvent) {
        match event {
            InboundEvent::Message(message) => self.handle_message(message).await,
            InboundEvent::Postback {
                recipient_id,
                payload,
            } => self.handle_postback(&recipient_id, &payload).await,
        }
    }

    /// Run the synchronous head of the pipeline. Returns once the sender has
    /// either a final reply or the processing acknowledgment.
    pub async fn handle_message(&self, message: InboundMessage) {
        let recipient_id = message.recipient_id.as_str();

        // Keyword check comes before any URL extraction.
        let normalized = message.text.trim().to_lowercase();
        if self.config.is_help_keyword(&normalized) {
            self.relay
                .send_text(recipient_id, &self.config.messages.help)
                .await;
            return;
        }

        let Some(url) = extract_url(&message.text) else {
            debug!(recipient_id, "message carries no url");
            self.relay
                .send_text(recipient_id, &self.config.messages.no_url)
                .await;
            return;
        };

        let Some(source) = self.filter.matching_source(url) else {
            info!(recipient_id, url, "link is not from a supported source");
            self.relay
                .send_text(recipient_id, &self.config.messages.unsupported)
                .await;
            return;
        };

        info!(recipient_id, url, source = %source, "dispatching video retrieval");
        self.relay
            .send_text(recipient_id, &self.config.messages.processing)
            .await;
        self.spawn_retrieval(message.recipient_id.clone(), url.to_string());
    }

    /// Reply to the get-started postback; every other payload is ignored.
    pub async fn handle_postback(&self, recipient_id: &str, payload: &str) {
        if payload == GET_STARTED_PAYLOAD {
            self.relay
                .send_text(recipient_id, &self.config.messages.welcome)
                .await;
        } else {
            debug!(recipient_id, payload, "ignoring unknown postback");
        }
    }

    fn spawn_retrieval(&self, recipient_id: String, url: String) {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            let worker = tokio::spawn({
                let dispatcher = dispatcher.clone();
                let recipient_id = recipient_id.clone();
                let url = url.clone();
                async move { dispatcher.run_retrieval(&recipient_id, &url).await }
            });
            // However the retrieval task dies, the sender still hears back.
            if let Err(e) = worker.await {
                error!(recipient_id = %recipient_id, url = %url, error = %e, "retrieval task died");
                dispatcher
                    .relay
                    .send_text(&recipient_id, &dispatcher.config.messages.error)
                    .await;
            }
        });
    }

    async fn run_retrieval(&self, recipient_id: &str, url: &str) {
        let messages = &self.config.messages;

        self.relay.send_text(recipient_id, &messages.downloading).await;
        self.relay.send_typing(recipient_id).await;

        let media = match self.retriever.fetch(url, Some(recipient_id)).await {
            RetrievalResult::Fetched(media) => media,
            RetrievalResult::Failed { reason } => {
                warn!(recipient_id, url, reason = %reason, "retrieval failed");
                self.relay.send_text(recipient_id, &messages.error).await;
                return;
            },
        };

        if media.size_mb > self.config.download.max_file_size_mb {
            info!(
                recipient_id,
                size_mb = media.size_mb,
                ceiling_mb = self.config.download.max_file_size_mb,
                "attachment ceiling exceeded, sending the link instead"
            );
            let link = media.canonical_url.as_deref().unwrap_or(url);
            self.relay
                .send_text(recipient_id, &messages.too_large_for(link))
                .await;
            // The file stays behind for the age sweep.
            return;
        }

        self.relay.send_text(recipient_id, &messages.uploading).await;
        self.relay.send_typing(recipient_id).await;

        let ack = self
            .relay
            .send_media_file(recipient_id, &media.file_path)
            .await;
        if ack.is_delivered() {
            self.relay.send_text(recipient_id, &messages.success).await;
        } else {
            // Fetched but not relayed still reads as a failure to the sender.
            self.relay.send_text(recipient_id, &messages.error).await;
        }

        remove_file(&media.file_path).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::{
        path::{Path, PathBuf},
        sync::Mutex,
        time::Duration,
    };

    use {
        async_trait::async_trait,
        vidrelay_config::DownloadConfig,
        vidrelay_fetch::FetchedMedia,
        vidrelay_messenger::SendAck,
        vidrelay_sources::Source,
    };

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Sent {
        Text(String),
        Typing,
        File(PathBuf),
    }

    struct RecordingRelay {
        sent: Mutex<Vec<Sent>>,
        file_ack: SendAck,
    }

    impl RecordingRelay {
        fn new() -> Self {
            Self::with_file_ack(SendAck::Delivered)
        }

        fn with_file_ack(file_ack: SendAck) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                file_ack,
            }
        }

        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }

        fn texts(&self) -> Vec<String> {
            self.sent()
                .into_iter()
                .filter_map(|s| match s {
                    Sent::Text(text) => Some(text),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl Relay for RecordingRelay {
        async fn send_text(&self, _recipient_id: &str, text: &str) -> SendAck {
            self.sent.lock().unwrap().push(Sent::Text(text.to_string()));
            SendAck::Delivered
        }

        async fn send_typing(&self, _recipient_id: &str) {
            self.sent.lock().unwrap().push(Sent::Typing);
        }

        async fn send_media_file(&self, _recipient_id: &str, path: &Path) -> SendAck {
            self.sent.lock().unwrap().push(Sent::File(path.to_path_buf()));
            self.file_ack.clone()
        }
    }

    struct FakeRetriever {
        result: RetrievalResult,
        requests: Mutex<Vec<String>>,
    }

    impl FakeRetriever {
        fn failing() -> Self {
            Self::returning(RetrievalResult::Failed {
                reason: "boom".into(),
            })
        }

        fn returning(result: RetrievalResult) -> Self {
            Self {
                result,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Retriever for FakeRetriever {
        async fn fetch(&self, url: &str, _namespace: Option<&str>) -> RetrievalResult {
            self.requests.lock().unwrap().push(url.to_string());
            self.result.clone()
        }
    }

    struct PanickingRetriever;

    #[async_trait]
    impl Retriever for PanickingRetriever {
        async fn fetch(&self, _url: &str, _namespace: Option<&str>) -> RetrievalResult {
            panic!("retriever blew up");
        }
    }

    fn media(path: PathBuf, size_mb: f64) -> FetchedMedia {
        FetchedMedia {
            file_path: path,
            size_mb,
            title: Some("Clip".into()),
            canonical_url: Some("https://youtu.be/abc123".into()),
            thumbnail: None,
        }
    }

    fn dispatcher(relay: &Arc<RecordingRelay>, retriever: &Arc<FakeRetriever>) -> Dispatcher {
        Dispatcher::new(
            Arc::new(VidrelayConfig::default()),
            Arc::clone(relay) as Arc<dyn Relay>,
            Arc::clone(retriever) as Arc<dyn Retriever>,
        )
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn help_keyword_short_circuits_before_matching() {
        let relay = Arc::new(RecordingRelay::new());
        let retriever = Arc::new(FakeRetriever::failing());
        let d = dispatcher(&relay, &retriever);

        d.handle_message(InboundMessage::new("42", "  Help  ")).await;

        let config = VidrelayConfig::default();
        assert_eq!(relay.texts(), vec![config.messages.help]);
        assert!(retriever.requests().is_empty());
    }

    #[tokio::test]
    async fn message_without_url_gets_the_no_url_reply() {
        let relay = Arc::new(RecordingRelay::new());
        let retriever = Arc::new(FakeRetriever::failing());
        let d = dispatcher(&relay, &retriever);

        d.handle_message(InboundMessage::new("42", "hey what can you do"))
            .await;

        let config = VidrelayConfig::default();
        assert_eq!(relay.texts(), vec![config.messages.no_url]);
        assert!(retriever.requests().is_empty());
    }

    #[tokio::test]
    async fn unsupported_link_gets_the_unsupported_reply() {
        let relay = Arc::new(RecordingRelay::new());
        let retriever = Arc::new(FakeRetriever::failing());
        let d = dispatcher(&relay, &retriever);

        d.handle_message(InboundMessage::new("42", "https://vimeo.com/12345"))
            .await;

        let config = VidrelayConfig::default();
        assert_eq!(relay.texts(), vec![config.messages.unsupported]);
        assert!(retriever.requests().is_empty());
    }

    #[tokio::test]
    async fn configured_sources_narrow_the_filter() {
        let relay = Arc::new(RecordingRelay::new());
        let retriever = Arc::new(FakeRetriever::failing());
        let config = VidrelayConfig {
            download: DownloadConfig {
                sources: vec![Source::Youtube, Source::YoutubeShort],
                ..Default::default()
            },
            ..Default::default()
        };
        let d = Dispatcher::new(
            Arc::new(config),
            Arc::clone(&relay) as Arc<dyn Relay>,
            Arc::clone(&retriever) as Arc<dyn Retriever>,
        );

        d.handle_message(InboundMessage::new(
            "42",
            "https://www.tiktok.com/@someuser/video/1234567890",
        ))
        .await;

        let defaults = VidrelayConfig::default();
        assert_eq!(relay.texts(), vec![defaults.messages.unsupported]);
    }

    #[tokio::test]
    async fn failed_retrieval_sends_the_generic_error() {
        let relay = Arc::new(RecordingRelay::new());
        let retriever = Arc::new(FakeRetriever::failing());
        let d = dispatcher(&relay, &retriever);

        d.run_retrieval("42", "https://youtu.be/abc123").await;

        let config = VidrelayConfig::default();
        assert_eq!(
            relay.texts(),
            vec![config.messages.downloading, config.messages.error]
        );
        assert!(relay.sent().contains(&Sent::Typing));
    }

    #[tokio::test]
    async fn oversized_media_takes_the_link_branch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("42_abc123.mp4");
        std::fs::write(&path, b"x").unwrap();

        let relay = Arc::new(RecordingRelay::new());
        let retriever = Arc::new(FakeRetriever::returning(RetrievalResult::Fetched(media(
            path.clone(),
            30.0,
        ))));
        let d = dispatcher(&relay, &retriever);

        d.run_retrieval("42", "https://youtu.be/abc123").await;

        let config = VidrelayConfig::default();
        let texts = relay.texts();
        assert!(texts.last().unwrap().contains("https://youtu.be/abc123"));
        assert!(!texts.contains(&config.messages.uploading));
        assert!(!relay.sent().iter().any(|s| matches!(s, Sent::File(_))));
        assert!(path.exists(), "link branch leaves the file for the sweep");
    }

    #[tokio::test]
    async fn link_branch_falls_back_to_the_requested_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("42_XYZ.mp4");
        std::fs::write(&path, b"x").unwrap();

        let relay = Arc::new(RecordingRelay::new());
        let retriever = Arc::new(FakeRetriever::returning(RetrievalResult::Fetched(
            FetchedMedia {
                canonical_url: None,
                ..media(path, 30.0)
            },
        )));
        let d = dispatcher(&relay, &retriever);

        d.run_retrieval("42", "https://vm.tiktok.com/XYZ").await;

        let texts = relay.texts();
        assert!(texts.last().unwrap().contains("https://vm.tiktok.com/XYZ"));
    }

    #[tokio::test]
    async fn small_media_is_uploaded_and_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("42_abc123.mp4");
        std::fs::write(&path, b"x").unwrap();

        let relay = Arc::new(RecordingRelay::new());
        let retriever = Arc::new(FakeRetriever::returning(RetrievalResult::Fetched(media(
            path.clone(),
            10.0,
        ))));
        let d = dispatcher(&relay, &retriever);

        d.run_retrieval("42", "https://youtu.be/abc123").await;

        let config = VidrelayConfig::default();
        assert_eq!(
            relay.texts(),
            vec![
                config.messages.downloading,
                config.messages.uploading,
                config.messages.success,
            ]
        );
        assert!(relay.sent().contains(&Sent::File(path.clone())));
        assert!(!path.exists(), "relayed file is removed right away");
    }

    #[tokio::test]
    async fn failed_upload_reports_an_error_but_still_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("42_abc123.mp4");
        std::fs::write(&path, b"x").unwrap();

        let relay = Arc::new(RecordingRelay::with_file_ack(SendAck::TransportFailed));
        let retriever = Arc::new(FakeRetriever::returning(RetrievalResult::Fetched(media(
            path.clone(),
            10.0,
        ))));
        let d = dispatcher(&relay, &retriever);

        d.run_retrieval("42", "https://youtu.be/abc123").await;

        let config = VidrelayConfig::default();
        assert_eq!(relay.texts().last(), Some(&config.messages.error));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn supported_link_is_acknowledged_then_fetched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("42_abc123.mp4");
        std::fs::write(&path, b"x").unwrap();

        let relay = Arc::new(RecordingRelay::new());
        let retriever = Arc::new(FakeRetriever::returning(RetrievalResult::Fetched(media(
            path.clone(),
            10.0,
        ))));
        let d = dispatcher(&relay, &retriever);

        d.handle_message(InboundMessage::new(
            "42",
            "watch this https://youtu.be/abc123 now",
        ))
        .await;

        let config = VidrelayConfig::default();
        assert_eq!(relay.texts().first(), Some(&config.messages.processing));

        let success = config.messages.success.clone();
        wait_until(|| relay.texts().contains(&success)).await;
        assert_eq!(
            retriever.requests(),
            vec!["https://youtu.be/abc123".to_string()]
        );
    }

    #[tokio::test]
    async fn panicking_retrieval_still_sends_the_generic_error() {
        let relay = Arc::new(RecordingRelay::new());
        let d = Dispatcher::new(
            Arc::new(VidrelayConfig::default()),
            Arc::clone(&relay) as Arc<dyn Relay>,
            Arc::new(PanickingRetriever),
        );

        d.handle_message(InboundMessage::new("42", "https://youtu.be/abc123"))
            .await;

        let error = VidrelayConfig::default().messages.error;
        wait_until(|| relay.texts().contains(&error)).await;
    }

    #[tokio::test]
    async fn get_started_postback_sends_the_welcome() {
        let relay = Arc::new(RecordingRelay::new());
        let retriever = Arc::new(FakeRetriever::failing());
        let d = dispatcher(&relay, &retriever);

        d.handle_event(InboundEvent::Postback {
            recipient_id: "42".into(),
            payload: "GET_STARTED".into(),
        })
        .await;

        let config = VidrelayConfig::default();
        assert_eq!(relay.texts(), vec![config.messages.welcome]);
    }

    #[tokio::test]
    async fn unknown_postback_is_ignored() {
        let relay = Arc::new(RecordingRelay::new());
        let retriever = Arc::new(FakeRetriever::failing());
        let d = dispatcher(&relay, &retriever);

        d.handle_postback("42", "SOMETHING_ELSE").await;

        assert!(relay.sent().is_empty());
    }
}
