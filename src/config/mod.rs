use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::error;

const DEFAULT_PORT: u16 = 4400;
const DEFAULT_UPSTREAM_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_MAX_TOKENS: u64 = 300;
const DEFAULT_TEMPERATURE: f64 = 0.8;

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

// ─── Relay settings ───────────────────────────────────────────────────────────

/// Server-side relay configuration (`[relay]` in config.toml).
///
/// The credential is the one secret in the system: it lives here (or in the
/// `GLOWD_API_KEY` env var) and never crosses to the client side.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Upstream chat-completion endpoint.
    pub upstream_url: String,
    /// Bearer credential for the upstream API. None = unconfigured; the relay
    /// refuses to forward rather than fall back to an unauthenticated call.
    pub api_key: Option<String>,
    /// Default model applied when a request doesn't name one.
    pub model: String,
    /// Default max_tokens applied when a request doesn't set one.
    pub max_tokens: u64,
    /// Default temperature applied when a request's value is not a number.
    pub temperature: f64,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

// ─── Chat settings ────────────────────────────────────────────────────────────

/// Client-side chat configuration (`[chat]` in config.toml).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// Relay endpoint the advisor posts to. None = unconfigured — surfaced
    /// to the user as a configuration error, never a crash.
    pub relay_url: Option<String>,
    /// Optional model override forwarded in the payload.
    pub model: Option<String>,
    /// Optional max_tokens override forwarded in the payload.
    pub max_tokens: Option<u64>,
    /// Optional temperature override forwarded in the payload.
    pub temperature: Option<f64>,
}

// ─── TOML config file ─────────────────────────────────────────────────────────

/// `{data_dir}/config.toml` — all fields are optional overrides.
/// Priority: CLI / env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// Relay HTTP server port (default: 4400).
    port: Option<u16>,
    /// Bind address for the relay server (default: "127.0.0.1").
    bind_address: Option<String>,
    /// Log level filter string, e.g. "debug", "info,glowd=trace" (default: "info").
    log: Option<String>,
    /// Log output format: "pretty" (default, human-readable) | "json".
    log_format: Option<String>,
    /// Catalog source: filesystem path or HTTP(S) URL.
    catalog: Option<String>,
    /// Server-side relay configuration (`[relay]`).
    relay: Option<RelaySettings>,
    /// Client-side chat configuration (`[chat]`).
    chat: Option<ChatSettings>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

// ─── GlowdConfig ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GlowdConfig {
    pub port: u16,
    pub bind_address: String,
    pub data_dir: PathBuf,
    pub log: String,
    /// Log output format: "pretty" (default) | "json".
    pub log_format: String,
    /// Catalog source: filesystem path or HTTP(S) URL.
    pub catalog_source: String,
    pub relay: RelaySettings,
    pub chat: ChatSettings,
}

impl GlowdConfig {
    /// Build config from CLI/env args + optional TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)` from clap
    ///   2. TOML file at `{data_dir}/config.toml`
    ///   3. Built-in defaults
    pub fn new(
        port: Option<u16>,
        data_dir: Option<PathBuf>,
        log: Option<String>,
        bind_address: Option<String>,
        catalog: Option<String>,
    ) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);

        // Load TOML as the lowest-priority override layer
        let toml = load_toml(&data_dir).unwrap_or_default();

        let port = port.or(toml.port).unwrap_or(DEFAULT_PORT);
        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());

        let bind_address = bind_address
            .or(std::env::var("GLOWD_BIND").ok().filter(|s| !s.is_empty()))
            .or(toml.bind_address)
            .unwrap_or_else(default_bind_address);

        let log_format = std::env::var("GLOWD_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| "pretty".to_string());

        let catalog_source = catalog
            .or(std::env::var("GLOWD_CATALOG").ok().filter(|s| !s.is_empty()))
            .or(toml.catalog)
            .unwrap_or_else(|| {
                data_dir.join("products.json").to_string_lossy().into_owned()
            });

        let mut relay = toml.relay.unwrap_or_default();
        if let Some(key) = std::env::var("GLOWD_API_KEY").ok().filter(|s| !s.is_empty()) {
            relay.api_key = Some(key);
        }
        if let Some(url) = std::env::var("GLOWD_UPSTREAM_URL").ok().filter(|s| !s.is_empty()) {
            relay.upstream_url = url;
        }

        let mut chat = toml.chat.unwrap_or_default();
        if let Some(url) = std::env::var("GLOWD_RELAY_URL").ok().filter(|s| !s.is_empty()) {
            chat.relay_url = Some(url);
        }

        Self {
            port,
            bind_address,
            data_dir,
            log,
            log_format,
            catalog_source,
            relay,
            chat,
        }
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/glowd
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("glowd");
        }
    }
    #[cfg(target_os = "linux")]
    {
        // $XDG_DATA_HOME/glowd or ~/.local/share/glowd
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("glowd");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("glowd");
        }
    }
    #[cfg(target_os = "windows")]
    {
        // %APPDATA%\glowd
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("glowd");
        }
    }
    // Fallback
    PathBuf::from(".glowd")
}
