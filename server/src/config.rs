//! Server configuration.
//!
//! Layered as: built-in defaults, then an optional TOML file, then environment variables, then
//! command-line flags (applied by the binary).

use std::collections::BTreeMap;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use iss_core::estimate::RootCauseHints;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_DB_PATH: &str = "impact_support.sqlite";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub db_path: PathBuf,
    /// Use a throwaway in-memory store instead of `db_path`.
    pub in_memory: bool,
    /// Seed the demo dataset on startup when the store is empty.
    pub seed_demo: bool,
    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Row cap for `GET /api/tickets` when no `limit` is given.
    pub default_ticket_limit: u32,
    /// Upper bound for any requested `limit`.
    pub max_ticket_limit: u32,
    /// Category -> phrase, merged over the built-in root-cause hints.
    pub root_cause_defaults: BTreeMap<String, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            in_memory: false,
            seed_demo: false,
            log_level: "info".to_string(),
            default_ticket_limit: 50,
            max_ticket_limit: 500,
            root_cause_defaults: BTreeMap::new(),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
        _ => None,
    }
}

impl ServerConfig {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: ServerConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Apply `PORT`, `ISS_BIND_ADDR`, `ISS_DB_PATH` and `ISS_SEED_DEMO` from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|name| std::env::var(name).ok())
    }

    /// Same as [`apply_env`](Self::apply_env) with an injectable lookup.
    ///
    /// `ISS_BIND_ADDR` replaces the whole address; `PORT` then replaces only the port.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("ISS_BIND_ADDR") {
            self.bind_addr = raw
                .trim()
                .parse()
                .with_context(|| format!("ISS_BIND_ADDR is not a socket address: {raw}"))?;
        }
        if let Some(raw) = lookup("PORT") {
            let port: u16 = raw
                .trim()
                .parse()
                .with_context(|| format!("PORT is not a valid port: {raw}"))?;
            self.bind_addr.set_port(port);
        }
        if let Some(raw) = lookup("ISS_DB_PATH") {
            if !raw.trim().is_empty() {
                self.db_path = PathBuf::from(raw.trim());
            }
        }
        if let Some(raw) = lookup("ISS_SEED_DEMO") {
            match parse_bool(&raw) {
                Some(v) => self.seed_demo = v,
                None => bail!("ISS_SEED_DEMO must be a boolean, got {raw}"),
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_ticket_limit == 0 {
            bail!("max_ticket_limit must be greater than zero");
        }
        if self.default_ticket_limit > self.max_ticket_limit {
            bail!(
                "default_ticket_limit ({}) exceeds max_ticket_limit ({})",
                self.default_ticket_limit,
                self.max_ticket_limit
            );
        }
        Ok(())
    }

    /// Effective row cap for a ticket listing.
    pub fn ticket_limit(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_ticket_limit)
            .min(self.max_ticket_limit)
    }

    pub fn root_cause_hints(&self) -> RootCauseHints {
        RootCauseHints::default().with_overrides(self.root_cause_defaults.iter())
    }
}
