//! # Bridge Configuration
//!
//! Settings chosen once at startup: batching delay, debug dumps, which event
//! loop drives the bridge and whether errors are forwarded to the native host.

use log::debug;
use nbridge_shared::constants::DEFAULT_FLUSH_DELAY_MS;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{BridgeError, BridgeResult};

/// Event loop implementations the bridge can run on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLoopKind {
    /// Deterministic loop driven by the host (`BuiltinEventLoop`)
    Builtin,
    /// Tasks spawned on the current tokio `LocalSet`
    Tokio,
}

impl Default for EventLoopKind {
    fn default() -> Self {
        EventLoopKind::Builtin
    }
}

/// Bridge settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Delay before a scheduled flush check runs; 0 uses a deferred call
    pub flush_delay_ms: u64,

    /// Dump every outbound and inbound batch as JSON at info level
    pub debug: bool,

    /// Event loop selected at startup
    pub event_loop: EventLoopKind,

    /// Also send reported errors to the native host for display
    pub forward_errors: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            flush_delay_ms: DEFAULT_FLUSH_DELAY_MS,
            debug: false,
            event_loop: EventLoopKind::Builtin,
            forward_errors: true,
        }
    }
}

impl BridgeConfig {
    /// Parse a JSON configuration document; missing keys keep their defaults
    pub fn from_json_str(json: &str) -> BridgeResult<Self> {
        serde_json::from_str(json).map_err(|e| BridgeError::Config(format!("failed to parse configuration: {}", e)))
    }

    /// Defaults overridden by `NBRIDGE_*` environment variables
    pub fn from_env() -> BridgeResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `NBRIDGE_*` key
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> BridgeResult<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup("NBRIDGE_FLUSH_DELAY_MS") {
            config.flush_delay_ms = raw
                .trim()
                .parse()
                .map_err(|_| BridgeError::Config(format!("NBRIDGE_FLUSH_DELAY_MS is not a number: {}", raw)))?;
        }
        if let Some(raw) = lookup("NBRIDGE_DEBUG") {
            config.debug = parse_flag("NBRIDGE_DEBUG", &raw)?;
        }
        if let Some(raw) = lookup("NBRIDGE_EVENT_LOOP") {
            config.event_loop = match raw.trim().to_ascii_lowercase().as_str() {
                "builtin" => EventLoopKind::Builtin,
                "tokio" => EventLoopKind::Tokio,
                other => return Err(BridgeError::Config(format!("unknown event loop '{}'", other))),
            };
        }
        if let Some(raw) = lookup("NBRIDGE_FORWARD_ERRORS") {
            config.forward_errors = parse_flag("NBRIDGE_FORWARD_ERRORS", &raw)?;
        }

        debug!("Bridge configuration: {:?}", config);
        Ok(config)
    }

    pub fn flush_delay(&self) -> Duration {
        Duration::from_millis(self.flush_delay_ms)
    }
}

fn parse_flag(key: &str, raw: &str) -> BridgeResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(BridgeError::Config(format!("{} is not a boolean: {}", key, raw))),
    }
}
