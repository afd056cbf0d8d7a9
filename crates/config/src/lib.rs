//! Configuration loading, env substitution, and the config schema.
//!
//! Config files: `vidrelay.toml`, `vidrelay.yaml`, or `vidrelay.json`,
//! searched in `./` then `~/.config/vidrelay/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values, plus the
//! `PAGE_ACCESS_TOKEN`, `VERIFY_TOKEN` and `PORT` environment overrides.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config},
    schema::{DownloadConfig, MessagesConfig, MessengerConfig, ServerConfig, VidrelayConfig},
};
