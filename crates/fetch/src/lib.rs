//! Video retrieval via the external extraction tool, plus lifecycle of the
//! download directory the retrieved files land in.

mod error;
mod fetcher;
mod files;

pub use {
    error::{Error, Result},
    fetcher::{FetchedMedia, Fetcher, RetrievalResult},
    files::{remove_file, sweep_older_than},
};
