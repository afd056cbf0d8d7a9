use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::VidrelayConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "vidrelay.toml",
    "vidrelay.yaml",
    "vidrelay.yml",
    "vidrelay.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<VidrelayConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations, then apply environment
/// overrides.
///
/// Search order:
/// 1. `./vidrelay.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/vidrelay/vidrelay.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `VidrelayConfig::default()` when no file is found or the
/// file fails to parse; overrides are applied either way.
pub fn discover_and_load() -> VidrelayConfig {
    let mut config = if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                VidrelayConfig::default()
            },
        }
    } else {
        debug!("no config file found, using defaults");
        VidrelayConfig::default()
    };
    apply_env_overrides(&mut config);
    config
}

/// Apply the environment overrides `PAGE_ACCESS_TOKEN`, `VERIFY_TOKEN` and
/// `PORT`. Environment values win over file values; secrets usually arrive
/// this way rather than on disk.
pub fn apply_env_overrides(config: &mut VidrelayConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

/// Implementation of [`apply_env_overrides`] with an injected lookup so the
/// override logic is testable without mutating the process environment.
fn apply_env_overrides_with(
    config: &mut VidrelayConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(token) = lookup("PAGE_ACCESS_TOKEN") {
        config.messenger.access_token = Secret::new(token);
    }
    if let Some(token) = lookup("VERIFY_TOKEN") {
        config.messenger.verify_token = token;
    }
    if let Some(port) = lookup("PORT") {
        match port.parse() {
            Ok(port) => config.server.port = port,
            Err(_) => warn!(value = %port, "ignoring unparsable PORT override"),
        }
    }
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    // Project-local
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    // User-global: ~/.config/vidrelay/
    if let Some(dir) = config_dir() {
        for name in CONFIG_FILENAMES {
            let p = dir.join(name);
            if p.exists() {
                return Some(p);
            }
        }
    }

    None
}

/// Returns the user-global config directory (`~/.config/vidrelay/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "vidrelay").map(|d| d.config_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<VidrelayConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    fn write_config(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "vidrelay.toml", "[server]\nport = 9000\n");
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.server.port, 9000);
    }

    #[test]
    fn loads_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "vidrelay.yaml", "download:\n  quality: worst\n");
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.download.quality, "worst");
    }

    #[test]
    fn loads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "vidrelay.json",
            r#"{"messenger": {"verify_token": "vt"}}"#,
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.messenger.verify_token, "vt");
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "vidrelay.ini", "port=1");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn env_overrides_take_precedence() {
        let lookup = |name: &str| match name {
            "PAGE_ACCESS_TOKEN" => Some("env-token".to_string()),
            "VERIFY_TOKEN" => Some("env-verify".to_string()),
            "PORT" => Some("8081".to_string()),
            _ => None,
        };
        let mut cfg = VidrelayConfig::default();
        apply_env_overrides_with(&mut cfg, lookup);
        assert_eq!(cfg.messenger.access_token.expose_secret(), "env-token");
        assert_eq!(cfg.messenger.verify_token, "env-verify");
        assert_eq!(cfg.server.port, 8081);
    }

    #[test]
    fn invalid_port_override_is_ignored() {
        let mut cfg = VidrelayConfig::default();
        apply_env_overrides_with(&mut cfg, |name| {
            (name == "PORT").then(|| "not-a-port".to_string())
        });
        assert_eq!(cfg.server.port, 10000);
    }
}
