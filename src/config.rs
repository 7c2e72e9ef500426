//! Configuration loading from `.env` files.

use std::env;

use anyhow::{Context, Result};

use crate::relay::RelayTimeouts;

/// Runtime settings derived from environment variables.
///
/// Settings are loaded once at the boundary and handed to operations as a
/// plain value; nothing in the crate reads ambient state.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Relays to publish to, e.g. `wss://relay.damus.io`.
    pub relays: Vec<String>,
    /// Signing key in `nsec` form. Optional for read-only commands.
    pub nsec: Option<String>,
    /// Per-phase relay deadline in seconds.
    pub timeout_secs: u64,
}

impl Settings {
    /// Load settings from the specified `.env` file.
    pub fn from_env(path: &str) -> Result<Self> {
        dotenvy::from_filename(path).context("reading env file")?;
        let relays = csv_strings(env::var("RELAYS").unwrap_or_default());
        let nsec = env::var("NSEC").ok().filter(|s| !s.is_empty());
        let timeout_secs = env::var("TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);
        Ok(Self {
            relays,
            nsec,
            timeout_secs,
        })
    }

    /// Relay deadlines derived from `TIMEOUT_SECS`.
    pub fn relay_timeouts(&self) -> RelayTimeouts {
        RelayTimeouts::from_secs(self.timeout_secs)
    }
}

/// Split a comma-separated string into trimmed string values.
pub fn csv_strings(input: impl AsRef<str>) -> Vec<String> {
    let s = input.as_ref();
    s.split(',')
        .filter_map(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .collect()
}
