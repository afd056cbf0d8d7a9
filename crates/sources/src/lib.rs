//! URL matching for the supported video sources.
//!
//! Pure functions over a fixed, process-wide pattern set: YouTube (watch and
//! short link), TikTok (profile video and short link), Facebook (page video
//! and short link). No I/O, no failure modes; a non-match is `None`/`false`.

mod matcher;

pub use matcher::{Source, SourceFilter, extract_url, is_supported, matching_source};
