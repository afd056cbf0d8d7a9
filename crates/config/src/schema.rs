//! Config schema types (server, messenger, download, message templates).

use std::path::PathBuf;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
    vidrelay_sources::Source,
};

/// Root configuration. Loaded once at startup and treated as immutable for
/// the process lifetime; components receive it by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VidrelayConfig {
    pub server: ServerConfig,
    pub messenger: MessengerConfig,
    pub download: DownloadConfig,
    pub messages: MessagesConfig,
    /// Trimmed, case-folded message texts that short-circuit to the help
    /// template before any URL extraction.
    pub help_keywords: Vec<String>,
}

impl Default for VidrelayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            messenger: MessengerConfig::default(),
            download: DownloadConfig::default(),
            messages: MessagesConfig::default(),
            help_keywords: vec!["help".into(), "start".into()],
        }
    }
}

/// Webhook server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "0.0.0.0" so the platform can reach
    /// the webhook directly.
    pub bind: String,
    /// Port to listen on. The `PORT` environment variable overrides this.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 10000,
        }
    }
}

/// Messenger Graph API configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessengerConfig {
    /// Page access token. The `PAGE_ACCESS_TOKEN` environment variable
    /// overrides this.
    #[serde(serialize_with = "serialize_secret")]
    pub access_token: Secret<String>,

    /// Pre-shared webhook verification token. The `VERIFY_TOKEN` environment
    /// variable overrides this. Verification always fails while unset.
    pub verify_token: String,

    /// Send-API endpoint all four relay operations POST to.
    pub api_url: String,
}

impl std::fmt::Debug for MessengerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessengerConfig")
            .field("access_token", &"[REDACTED]")
            .field("verify_token", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .finish()
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            access_token: Secret::new(String::new()),
            verify_token: String::new(),
            api_url: "https://graph.facebook.com/v18.0/me/messages".into(),
        }
    }
}

/// Video retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Directory downloaded files land in. Created at startup if missing.
    pub dir: PathBuf,
    /// Attachment ceiling in MB. Larger files are relayed as a link. The
    /// extraction tool is allowed twice this size so an oversized download
    /// can still take the link path.
    pub max_file_size_mb: f64,
    /// Quality tier handed to the extraction tool ("best" or "worst").
    pub quality: String,
    /// Source families links are accepted from.
    pub sources: Vec<Source>,
    /// Extraction tool binary. Resolved via PATH unless absolute.
    pub binary: String,
    /// Wall-clock ceiling for one retrieval, in seconds.
    pub timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("downloads"),
            max_file_size_mb: 25.0,
            quality: "best".into(),
            sources: Source::ALL.to_vec(),
            binary: "yt-dlp".into(),
            timeout_secs: 900,
        }
    }
}

impl DownloadConfig {
    /// Format selector for the extraction tool: the configured tier with an
    /// MP4-container preference, e.g. `best[ext=mp4]/best`.
    #[must_use]
    pub fn format_selector(&self) -> String {
        format!("{q}[ext=mp4]/{q}", q = self.quality)
    }

    /// Tool-side byte ceiling: twice the relay ceiling, see `max_file_size_mb`.
    #[must_use]
    pub fn tool_max_filesize_bytes(&self) -> u64 {
        (self.max_file_size_mb * 2.0 * 1024.0 * 1024.0) as u64
    }
}

/// User-facing message templates, one per pipeline outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagesConfig {
    /// Reply to the get-started postback.
    pub welcome: String,
    /// Reply to a help/greeting keyword.
    pub help: String,
    /// Message text contained no URL.
    pub no_url: String,
    /// URL present but outside the supported source set.
    pub unsupported: String,
    /// Synchronous acknowledgment before the dispatch task is spawned.
    pub processing: String,
    /// Retrieval is starting.
    pub downloading: String,
    /// File relay is starting.
    pub uploading: String,
    /// File relay delivered.
    pub success: String,
    /// Link fallback; `{url}` is replaced with the canonical source URL.
    pub too_large: String,
    /// Generic failure, shared by retrieval, relay and internal errors.
    pub error: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            welcome: "👋 Hi! Send me a YouTube, TikTok or Facebook video link and I'll fetch it for you.".into(),
            help: "📌 How to use this bot:\n\n\
                   1️⃣ Send a video link from YouTube, TikTok or Facebook\n\
                   2️⃣ Wait while I fetch it\n\
                   3️⃣ Get the video in the best available quality!\n\n\
                   ✨ Supported: YouTube, TikTok, Facebook"
                .into(),
            no_url: "🔗 Send me a YouTube, TikTok or Facebook video link.".into(),
            unsupported: "❌ That link isn't supported. I can fetch from YouTube, TikTok and Facebook.".into(),
            processing: "⏳ Working on your video...".into(),
            downloading: "📥 Downloading the best quality available...".into(),
            uploading: "📤 Sending the video over...".into(),
            success: "✅ Done! Here is your video:".into(),
            too_large: "⚠️ This video is too big for an attachment (>25 MB). Download it here:\n{url}".into(),
            error: "❌ Couldn't fetch that video. Check the link or try another one.".into(),
        }
    }
}

impl MessagesConfig {
    /// The link-fallback text with `{url}` substituted.
    #[must_use]
    pub fn too_large_for(&self, url: &str) -> String {
        self.too_large.replace("{url}", url)
    }
}

impl VidrelayConfig {
    /// Whether `text` (already trimmed and lowercased by the caller) is one
    /// of the help/greeting keywords.
    #[must_use]
    pub fn is_help_keyword(&self, text: &str) -> bool {
        self.help_keywords.iter().any(|k| k == text)
    }
}
