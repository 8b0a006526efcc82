use anyhow::{Context, Result};
use presence_core::WireFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// Unified config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
//   config.toml:     [connection]
//                    endpoint = "ws://relay.local:8765"
//
//   env var:         CANVAS_CONNECTION__ENDPOINT=ws://relay.local:8765
//
//   (single underscore stays within field names: CANVAS_PUBLISHER__EMIT_INTERVAL_MS)

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub connection: ConnectionFileConfig,
    #[serde(default)]
    pub publisher: PublisherFileConfig,
    #[serde(default)]
    pub presence: PresenceFileConfig,
    #[serde(default)]
    pub canvas: CanvasFileConfig,
}

/// Relay connection (lives under `[connection]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionFileConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Give up on a connect attempt (TCP + WebSocket upgrade) after this long.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for ConnectionFileConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// Outbound publishing (lives under `[publisher]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PublisherFileConfig {
    #[serde(default = "default_emit_interval_ms")]
    pub emit_interval_ms: u64,
    #[serde(default = "default_min_send_interval_ms")]
    pub min_send_interval_ms: u64,
    #[serde(default = "default_additional_data")]
    pub additional_data: String,
    #[serde(default)]
    pub wire_format: WireFormat,
}

impl Default for PublisherFileConfig {
    fn default() -> Self {
        Self {
            emit_interval_ms: default_emit_interval_ms(),
            min_send_interval_ms: default_min_send_interval_ms(),
            additional_data: default_additional_data(),
            wire_format: WireFormat::default(),
        }
    }
}

/// Inbound presence handling (lives under `[presence]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PresenceFileConfig {
    /// Keep sourceless positions from legacy relays.
    #[serde(default)]
    pub accept_anonymous: bool,
    #[serde(default = "default_anonymous_limit")]
    pub anonymous_limit: usize,
    /// Evict sources not heard from in this many seconds. Unset = never.
    #[serde(default)]
    pub stale_after_secs: Option<u64>,
}

impl Default for PresenceFileConfig {
    fn default() -> Self {
        Self {
            accept_anonymous: false,
            anonymous_limit: default_anonymous_limit(),
            stale_after_secs: None,
        }
    }
}

/// Canvas geometry (lives under `[canvas]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CanvasFileConfig {
    #[serde(default = "default_canvas_width")]
    pub width: u32,
}

impl Default for CanvasFileConfig {
    fn default() -> Self {
        Self {
            width: default_canvas_width(),
        }
    }
}

fn default_endpoint() -> String {
    "ws://localhost:8765".to_string()
}
fn default_reconnect_delay_ms() -> u64 {
    5000
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
fn default_emit_interval_ms() -> u64 {
    500
}
fn default_min_send_interval_ms() -> u64 {
    500
}
fn default_additional_data() -> String {
    presence_core::protocol::DEFAULT_ADDITIONAL_DATA.to_string()
}
fn default_anonymous_limit() -> usize {
    presence_core::presence::DEFAULT_ANONYMOUS_LIMIT
}
fn default_canvas_width() -> u32 {
    presence_core::grid::DEFAULT_CANVAS_WIDTH
}

/// Resolved channel configuration (runtime view).
#[derive(Clone, Debug)]
pub struct ChannelConfig {
    pub endpoint: String,
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
    pub emit_interval: Duration,
    pub min_send_interval: Duration,
    pub additional_data: String,
    pub wire_format: WireFormat,
    pub accept_anonymous: bool,
    pub anonymous_limit: usize,
    pub stale_after: Option<Duration>,
}

impl ChannelConfig {
    pub fn from_file(fc: &FileConfig) -> Self {
        Self {
            endpoint: fc.connection.endpoint.clone(),
            reconnect_delay: Duration::from_millis(fc.connection.reconnect_delay_ms),
            connect_timeout: Duration::from_millis(fc.connection.connect_timeout_ms),
            // a zero period would make tokio's interval panic
            emit_interval: Duration::from_millis(fc.publisher.emit_interval_ms.max(1)),
            min_send_interval: Duration::from_millis(fc.publisher.min_send_interval_ms),
            additional_data: fc.publisher.additional_data.clone(),
            wire_format: fc.publisher.wire_format,
            accept_anonymous: fc.presence.accept_anonymous,
            anonymous_limit: fc.presence.anonymous_limit,
            stale_after: fc.presence.stale_after_secs.map(Duration::from_secs),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::from_file(&FileConfig::default())
    }
}

/// `<config_dir>/canvas-presence/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("canvas-presence").join("config.toml"))
}

/// Build a figment that layers: defaults → config.toml → CANVAS_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `CANVAS_CONNECTION__RECONNECT_DELAY_MS=1000`  →  `connection.reconnect_delay_ms = 1000`
pub fn load_config(config_path: Option<&Path>) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    let mut figment = Figment::from(Serialized::defaults(FileConfig::default()));
    if let Some(path) = config_path {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(Env::prefixed("CANVAS_").split("__"))
}

/// Extract the layered configuration, falling back to the default path.
pub fn resolve(config_path: Option<&Path>) -> Result<FileConfig> {
    let default_path = default_config_path();
    let path = config_path.or(default_path.as_deref());
    load_config(path)
        .extract()
        .with_context(|| match path {
            Some(p) => format!("Failed to load configuration from {}", p.display()),
            None => "Failed to load configuration".to_string(),
        })
}
