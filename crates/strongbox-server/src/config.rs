//! Server configuration, loaded from (in increasing precedence) built-in
//! defaults, an optional `config.toml`, an optional `.env` file, and the
//! process environment. Falls back to a legacy single-line port file for
//! `listen_port` alone, preserving the original bootstrap contract.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Default listen port, matching the original single-line port-file default.
const DEFAULT_PORT: u16 = 1357;
const DEFAULT_STORAGE_ROOT: &str = "./storage";
const DEFAULT_DATABASE_URL: &str = "sqlite://catalog.db";
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;

/// Runtime configuration for the strongbox server.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// TCP port the acceptor binds on `0.0.0.0`.
    #[serde(default = "default_port")]
    pub listen_port: u16,
    /// Root directory decrypted file contents are written under.
    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,
    /// `sqlx` connection URL for the catalog database.
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Idle read timeout per connection, in seconds.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_storage_root() -> PathBuf {
    PathBuf::from(DEFAULT_STORAGE_ROOT)
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_idle_timeout_secs() -> u64 {
    DEFAULT_IDLE_TIMEOUT_SECS
}

impl Config {
    /// Load configuration, layering an optional `config.toml`, an optional
    /// `.env`, and `STRONGBOX_*` environment variables over the defaults
    /// above. If `listen_port` was left at its default after that, and a
    /// legacy port file (`$PORT_FILE`, default `port.txt`) exists, its value
    /// wins instead.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let raw = config::Config::builder()
            .set_default("listen_port", DEFAULT_PORT as i64)?
            .set_default("storage_root", DEFAULT_STORAGE_ROOT)?
            .set_default("database_url", DEFAULT_DATABASE_URL)?
            .set_default("idle_timeout_secs", DEFAULT_IDLE_TIMEOUT_SECS as i64)?
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("STRONGBOX"))
            .build()
            .context("failed to build configuration")?;

        let mut cfg: Config = raw
            .try_deserialize()
            .context("failed to parse configuration")?;

        if cfg.listen_port == DEFAULT_PORT {
            if let Some(port) = read_legacy_port_file() {
                cfg.listen_port = port;
            }
        }

        Ok(cfg)
    }
}

/// Read a legacy single-line port file, if `$PORT_FILE` (default
/// `port.txt`) exists and parses as a `u16`.
fn read_legacy_port_file() -> Option<u16> {
    let path = std::env::var("PORT_FILE").unwrap_or_else(|_| "port.txt".to_string());
    let contents = std::fs::read_to_string(path).ok()?;
    contents.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_port_file_parses_single_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("port.txt");
        std::fs::write(&path, "7777\n").unwrap();

        // SAFETY: test-only, no concurrent readers of this env var in this process.
        unsafe {
            std::env::set_var("PORT_FILE", path.to_str().unwrap());
        }
        let port = read_legacy_port_file();
        unsafe {
            std::env::remove_var("PORT_FILE");
        }

        assert_eq!(port, Some(7777));
    }

    #[test]
    fn missing_legacy_port_file_is_none() {
        // SAFETY: test-only, no concurrent readers of this env var in this process.
        unsafe {
            std::env::set_var("PORT_FILE", "/nonexistent/path/port.txt");
        }
        let port = read_legacy_port_file();
        unsafe {
            std::env::remove_var("PORT_FILE");
        }

        assert_eq!(port, None);
    }
}
