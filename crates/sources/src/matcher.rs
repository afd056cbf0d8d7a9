use std::sync::LazyLock;

use {
    regex::Regex,
    serde::{Deserialize, Serialize},
};

/// One supported source family. Serialized as the primary host, which is how
/// operators name sources in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "youtube.com")]
    Youtube,
    #[serde(rename = "youtu.be")]
    YoutubeShort,
    #[serde(rename = "tiktok.com")]
    Tiktok,
    #[serde(rename = "vm.tiktok.com")]
    TiktokShort,
    #[serde(rename = "facebook.com")]
    Facebook,
    #[serde(rename = "fb.watch")]
    FacebookShort,
}

impl Source {
    pub const ALL: [Source; 6] = [
        Source::Youtube,
        Source::YoutubeShort,
        Source::Tiktok,
        Source::TiktokShort,
        Source::Facebook,
        Source::FacebookShort,
    ];

    /// Primary host identifier, matching the serialized form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Youtube => "youtube.com",
            Source::YoutubeShort => "youtu.be",
            Source::Tiktok => "tiktok.com",
            Source::TiktokShort => "vm.tiktok.com",
            Source::Facebook => "facebook.com",
            Source::FacebookShort => "fb.watch",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// URL-shape rules, one per source family. Scheme and `www.` are optional;
/// matching is case-insensitive and positional anywhere in the candidate.
/// The shapes are mutually disjoint, so declaration order carries no meaning.
const SOURCE_PATTERNS: [(Source, &str); 6] = [
    (
        Source::Youtube,
        r"(?i)(?:https?://)?(?:www\.)?youtube\.com/watch\?v=[\w-]+",
    ),
    (
        Source::YoutubeShort,
        r"(?i)(?:https?://)?(?:www\.)?youtu\.be/[\w-]+",
    ),
    (
        Source::Tiktok,
        r"(?i)(?:https?://)?(?:www\.)?tiktok\.com/@[\w.-]+/video/\d+",
    ),
    (
        Source::TiktokShort,
        r"(?i)(?:https?://)?(?:vm\.)?tiktok\.com/[\w-]+",
    ),
    (
        Source::Facebook,
        r"(?i)(?:https?://)?(?:www\.)?facebook\.com/.+?/videos/\d+",
    ),
    (
        Source::FacebookShort,
        r"(?i)(?:https?://)?(?:www\.)?fb\.watch/[\w-]+",
    ),
];

static COMPILED: LazyLock<Vec<(Source, Regex)>> = LazyLock::new(|| {
    SOURCE_PATTERNS
        .iter()
        .map(|(source, pattern)| (*source, compile(pattern)))
        .collect()
});

static URL: LazyLock<Regex> = LazyLock::new(|| compile(r"https?://\S+"));

/// Pattern literals are fixed at compile time; a failure here is a
/// programming error surfaced by the tests below.
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid pattern {pattern:?}: {e}"))
}

/// First `http(s)://` substring of `text`, exactly as written, or `None`.
/// Never fails: absence of a link is `None`, not an error.
#[must_use]
pub fn extract_url(text: &str) -> Option<&str> {
    URL.find(text).map(|m| m.as_str())
}

/// Whether `url` matches any source family, enabled or not.
#[must_use]
pub fn is_supported(url: &str) -> bool {
    matching_source(url).is_some()
}

/// The source family whose pattern matches `url`, if any.
#[must_use]
pub fn matching_source(url: &str) -> Option<Source> {
    COMPILED
        .iter()
        .find(|(_, re)| re.is_match(url))
        .map(|(source, _)| *source)
}

/// The pattern set restricted to the families enabled in configuration.
#[derive(Debug, Clone)]
pub struct SourceFilter {
    enabled: Vec<Source>,
}

impl SourceFilter {
    #[must_use]
    pub fn new(enabled: impl IntoIterator<Item = Source>) -> Self {
        Self {
            enabled: enabled.into_iter().collect(),
        }
    }

    /// Whether `url` matches one of the enabled source families.
    #[must_use]
    pub fn is_supported(&self, url: &str) -> bool {
        self.matching_source(url).is_some()
    }

    /// The enabled family matching `url`, if any. Used for log fields.
    #[must_use]
    pub fn matching_source(&self, url: &str) -> Option<Source> {
        COMPILED
            .iter()
            .filter(|(source, _)| self.enabled.contains(source))
            .find(|(_, re)| re.is_match(url))
            .map(|(source, _)| *source)
    }
}

impl Default for SourceFilter {
    fn default() -> Self {
        Self {
            enabled: Source::ALL.to_vec(),
        }
    }
}
