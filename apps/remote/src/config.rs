use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use client_core::{Endpoint, ReconnectPolicy, SessionConfig};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "mixer_remote.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub reconnect_min_ms: u64,
    pub reconnect_max_ms: u64,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            reconnect_min_ms: 1_000,
            reconnect_max_ms: 10_000,
            log_filter: "info".into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    host: Option<String>,
    port: Option<u16>,
    reconnect_min_ms: Option<u64>,
    reconnect_max_ms: Option<u64>,
    log_filter: Option<String>,
}

/// Flag values given on the command line; they win over everything else.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub reconnect_min_ms: Option<u64>,
    pub reconnect_max_ms: Option<u64>,
    pub log_filter: Option<String>,
}

impl Settings {
    pub fn session_config(&self) -> anyhow::Result<SessionConfig> {
        let endpoint = Endpoint::new(self.host.as_str(), self.port)
            .with_context(|| format!("invalid mixer address {}:{}", self.host, self.port))?;
        Ok(SessionConfig {
            endpoint,
            reconnect: ReconnectPolicy {
                min_interval: Duration::from_millis(self.reconnect_min_ms),
                max_interval: Duration::from_millis(self.reconnect_max_ms),
            },
        })
    }
}

/// Defaults, then the config file, then the environment, then `overrides`.
pub fn load_settings(path: &Path, overrides: &Overrides) -> anyhow::Result<Settings> {
    let file = match fs::read_to_string(path) {
        Ok(raw) => Some(raw),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    };
    let settings = layer_settings(file.as_deref(), |key| std::env::var(key).ok(), overrides)
        .with_context(|| format!("invalid config file {}", path.display()))?;
    Ok(settings)
}

pub fn layer_settings(
    file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
    overrides: &Overrides,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        let file_cfg: FileSettings = toml::from_str(raw)?;
        if let Some(v) = file_cfg.host {
            settings.host = v;
        }
        if let Some(v) = file_cfg.port {
            settings.port = v;
        }
        if let Some(v) = file_cfg.reconnect_min_ms {
            settings.reconnect_min_ms = v;
        }
        if let Some(v) = file_cfg.reconnect_max_ms {
            settings.reconnect_max_ms = v;
        }
        if let Some(v) = file_cfg.log_filter {
            settings.log_filter = v;
        }
    }

    if let Some(v) = env("MIXER_HOST") {
        settings.host = v;
    }
    if let Some(v) = env("APP__HOST") {
        settings.host = v;
    }

    for key in ["MIXER_PORT", "APP__PORT"] {
        if let Some(parsed) = env(key).and_then(|v| v.parse().ok()) {
            settings.port = parsed;
        }
    }
    if let Some(parsed) = env("APP__RECONNECT_MIN_MS").and_then(|v| v.parse().ok()) {
        settings.reconnect_min_ms = parsed;
    }
    if let Some(parsed) = env("APP__RECONNECT_MAX_MS").and_then(|v| v.parse().ok()) {
        settings.reconnect_max_ms = parsed;
    }
    if let Some(v) = env("APP__LOG_FILTER") {
        settings.log_filter = v;
    }

    if let Some(v) = &overrides.host {
        settings.host = v.clone();
    }
    if let Some(v) = overrides.port {
        settings.port = v;
    }
    if let Some(v) = overrides.reconnect_min_ms {
        settings.reconnect_min_ms = v;
    }
    if let Some(v) = overrides.reconnect_max_ms {
        settings.reconnect_max_ms = v;
    }
    if let Some(v) = &overrides.log_filter {
        settings.log_filter = v.clone();
    }

    Ok(settings)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
