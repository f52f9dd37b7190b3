//! Configuration loading and management

use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Listener configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Jobs the callback worker queue holds before dropping new ones
    pub queue_capacity: usize,

    /// Default longest gap between steps of a multi-step hotkey
    pub hotkey_timeout: Duration,

    /// Keys blocked at startup
    pub blocked_keys: Vec<String>,

    /// `(source, target)` remaps applied at startup
    pub remaps: Vec<(String, String)>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            hotkey_timeout: Duration::from_secs(1),
            blocked_keys: Vec::new(),
            remaps: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup("KEYTAP_QUEUE_CAPACITY") {
            config.queue_capacity = raw
                .trim()
                .parse()
                .with_context(|| format!("KEYTAP_QUEUE_CAPACITY is not a number: {raw:?}"))?;
            if config.queue_capacity == 0 {
                bail!("KEYTAP_QUEUE_CAPACITY must be at least 1");
            }
        }

        if let Some(raw) = lookup("KEYTAP_HOTKEY_TIMEOUT_MS") {
            let millis: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("KEYTAP_HOTKEY_TIMEOUT_MS is not a number: {raw:?}"))?;
            config.hotkey_timeout = Duration::from_millis(millis);
        }

        if let Some(raw) = lookup("KEYTAP_BLOCK") {
            config.blocked_keys = split_list(&raw).map(str::to_string).collect();
        }

        if let Some(raw) = lookup("KEYTAP_REMAP") {
            for pair in split_list(&raw) {
                let Some((source, target)) = pair.split_once('=') else {
                    bail!("KEYTAP_REMAP entry {pair:?} is not of the form source=target");
                };
                config
                    .remaps
                    .push((source.trim().to_string(), target.trim().to_string()));
            }
        }

        Ok(config)
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|item| !item.is_empty())
}
