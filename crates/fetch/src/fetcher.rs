//! Retrieval client wrapping the external extraction tool.
//!
//! One `fetch` call runs the tool against a single URL, lands the media file
//! in the configured download directory under a recipient namespace, and
//! reports metadata. Failures come back inside [`RetrievalResult`]; nothing
//! crosses this boundary as an `Err`.

use std::{path::PathBuf, process::Stdio, time::Duration};

use {
    serde::Deserialize,
    tokio::{process::Command, sync::RwLock, time::timeout},
    tracing::{debug, info, warn},
    vidrelay_config::DownloadConfig,
};

use crate::error::{Context, Error, Result};

/// Namespace used when no recipient identifier is supplied.
const FALLBACK_NAMESPACE: &str = "video";

/// Outcome of one retrieval attempt.
#[derive(Debug, Clone)]
pub enum RetrievalResult {
    /// The media file is on disk.
    Fetched(FetchedMedia),
    /// Retrieval failed; `reason` is for the logs, never shown to the user.
    Failed { reason: String },
}

/// A downloaded media file plus tool-reported metadata.
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    pub file_path: PathBuf,
    /// Size on disk in MB, rounded to two decimals. Drives the relay-vs-link
    /// decision.
    pub size_mb: f64,
    pub title: Option<String>,
    /// Canonical page URL reported by the tool. The link fallback prefers
    /// this over the URL the sender typed.
    pub canonical_url: Option<String>,
    pub thumbnail: Option<String>,
}

/// The single-line JSON document the tool prints after a download.
#[derive(Debug, Deserialize)]
struct ToolMetadata {
    id: Option<String>,
    ext: Option<String>,
    title: Option<String>,
    webpage_url: Option<String>,
    thumbnail: Option<String>,
}

/// Runs the extraction tool and tracks whether it is installed at all.
pub struct Fetcher {
    config: DownloadConfig,
    /// Cached result of the version probe.
    available: RwLock<Option<bool>>,
}

impl Fetcher {
    #[must_use]
    pub fn new(config: DownloadConfig) -> Self {
        Self {
            config,
            available: RwLock::new(None),
        }
    }

    /// Check if the extraction tool responds to a version probe. The result
    /// is cached for the process lifetime.
    pub async fn is_available(&self) -> bool {
        {
            let cached = self.available.read().await;
            if let Some(available) = *cached {
                return available;
            }
        }

        let available = self.probe().await;
        *self.available.write().await = Some(available);
        available
    }

    async fn probe(&self) -> bool {
        match Command::new(&self.config.binary)
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
        {
            Ok(output) => {
                if output.status.success() {
                    let version = String::from_utf8_lossy(&output.stdout);
                    info!(version = %version.trim(), "extraction tool is available");
                    true
                } else {
                    warn!("extraction tool version probe exited non-zero");
                    false
                }
            },
            Err(e) => {
                debug!(error = %e, "extraction tool is not available");
                false
            },
        }
    }

    /// Download `url` into the configured directory, prefixing filenames
    /// with `namespace` so concurrent recipients cannot collide.
    pub async fn fetch(&self, url: &str, namespace: Option<&str>) -> RetrievalResult {
        let namespace = namespace
            .map(sanitize_namespace)
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| FALLBACK_NAMESPACE.to_string());

        match self.run(url, &namespace).await {
            Ok(media) => RetrievalResult::Fetched(media),
            Err(e) => {
                warn!(url = %url, error = %e, "retrieval failed");
                RetrievalResult::Failed {
                    reason: e.to_string(),
                }
            },
        }
    }

    async fn run(&self, url: &str, namespace: &str) -> Result<FetchedMedia> {
        let template = self
            .config
            .dir
            .join(format!("{namespace}_%(id)s.%(ext)s"));

        let mut cmd = Command::new(&self.config.binary);
        cmd.arg("--format")
            .arg(self.config.format_selector())
            .arg("--max-filesize")
            .arg(self.config.tool_max_filesize_bytes().to_string())
            .arg("--output")
            .arg(&template)
            .arg("--quiet")
            .arg("--no-warnings")
            .arg("--no-progress")
            .arg("--print-json")
            .arg(url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(url = %url, namespace = %namespace, "starting retrieval");

        let duration = Duration::from_secs(self.config.timeout_secs);
        let output = match timeout(duration, cmd.output()).await {
            Ok(result) => result.context("spawn extraction tool")?,
            Err(_) => {
                return Err(Error::message(format!(
                    "retrieval timed out after {}s",
                    self.config.timeout_secs
                )));
            },
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::message(format!(
                "extraction tool failed: {}",
                stderr.trim()
            )));
        }

        let metadata: ToolMetadata = serde_json::from_slice(&output.stdout)?;
        let file_path = self.output_path(namespace, &metadata);

        let len = tokio::fs::metadata(&file_path)
            .await
            .with_context(|| {
                format!(
                    "output file missing after download: {}",
                    file_path.display()
                )
            })?
            .len();
        let size_mb = round2(len as f64 / (1024.0 * 1024.0));

        info!(
            url = %url,
            size_mb,
            title = ?metadata.title,
            thumbnail = ?metadata.thumbnail,
            path = %file_path.display(),
            "video fetched"
        );

        Ok(FetchedMedia {
            file_path,
            size_mb,
            title: metadata.title,
            canonical_url: metadata.webpage_url,
            thumbnail: metadata.thumbnail,
        })
    }

    /// Reconstruct the file path the output template resolves to, from the
    /// tool-reported content id and extension.
    fn output_path(&self, namespace: &str, metadata: &ToolMetadata) -> PathBuf {
        let id = metadata.id.as_deref().unwrap_or("video");
        let ext = metadata.ext.as_deref().unwrap_or("mp4");
        self.config.dir.join(format!("{namespace}_{id}.{ext}"))
    }
}

/// The namespace lands in a filename; keep it to word characters.
fn sanitize_namespace(namespace: &str) -> String {
    namespace
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
