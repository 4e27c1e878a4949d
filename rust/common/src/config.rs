//! Layered configuration resolution.
//!
//! Every value is looked up through an ordered chain of sources and the
//! first non-empty answer wins:
//!
//!   build-time file  →  runtime file  →  environment  →  hard-coded default
//!
//! Keys are split by visibility. `ServerKey` values (credentials, internal
//! service URLs) can only be resolved through a `ServerResolver`, which reads
//! the `server` sections. `PublicKey` values are safe to hand to a browser and
//! go through a `PublicResolver` built exclusively from `public` sections, so
//! no server-only value is reachable from it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

use crate::error::ConfigError;

const FALLBACK_WEBSOCKET_URL: &str = "ws://localhost:8081";

/// A key that can be looked up in a configuration chain.
pub trait ConfigKey: Copy + fmt::Debug + Send + Sync + 'static {
    /// Name used in config files and as the environment variable.
    fn name(self) -> &'static str;
    fn default_value(self) -> &'static str;
}

/// Server-only keys. Never exposed to the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerKey {
    WebsocketServerUrl,
    TwilioAccountSid,
    TwilioAuthToken,
    TwilioWebhookUrl,
    EnableTwilio,
}

impl ConfigKey for ServerKey {
    fn name(self) -> &'static str {
        match self {
            ServerKey::WebsocketServerUrl => "WEBSOCKET_SERVER_URL",
            ServerKey::TwilioAccountSid => "TWILIO_ACCOUNT_SID",
            ServerKey::TwilioAuthToken => "TWILIO_AUTH_TOKEN",
            ServerKey::TwilioWebhookUrl => "TWILIO_WEBHOOK_URL",
            ServerKey::EnableTwilio => "ENABLE_TWILIO",
        }
    }

    fn default_value(self) -> &'static str {
        match self {
            // In-cluster service name
            ServerKey::WebsocketServerUrl => "http://websocket-server:8081",
            ServerKey::TwilioAccountSid => "",
            ServerKey::TwilioAuthToken => "",
            ServerKey::TwilioWebhookUrl => "",
            ServerKey::EnableTwilio => "true",
        }
    }
}

/// Keys the browser is allowed to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublicKey {
    WebsocketServerUrl,
    EnableTwilio,
}

impl ConfigKey for PublicKey {
    fn name(self) -> &'static str {
        match self {
            PublicKey::WebsocketServerUrl => "PUBLIC_WEBSOCKET_SERVER_URL",
            PublicKey::EnableTwilio => "PUBLIC_ENABLE_TWILIO",
        }
    }

    fn default_value(self) -> &'static str {
        match self {
            PublicKey::WebsocketServerUrl => "http://localhost:8081",
            PublicKey::EnableTwilio => "true",
        }
    }
}

// ── Sources ─────────────────────────────────────────────────────────

/// One lookup strategy in a resolution chain.
pub trait ConfigSource<K: ConfigKey>: Send + Sync {
    fn label(&self) -> &str;
    fn lookup(&self, key: K) -> Option<String>;
}

/// A flat `name → value` section taken from a config file.
#[derive(Debug, Clone)]
pub struct SectionSource {
    label: String,
    values: HashMap<String, String>,
}

impl SectionSource {
    pub fn new(label: impl Into<String>, values: HashMap<String, String>) -> Self {
        Self {
            label: label.into(),
            values,
        }
    }
}

impl<K: ConfigKey> ConfigSource<K> for SectionSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn lookup(&self, key: K) -> Option<String> {
        self.values.get(key.name()).cloned()
    }
}

/// Environment variables, captured once.
///
/// Reading a snapshot instead of `std::env` on every lookup keeps a resolver
/// deterministic for its whole lifetime.
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    vars: HashMap<String, String>,
}

impl EnvSource {
    /// Snapshot the current process environment.
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Load `path` into the process environment (existing variables win),
    /// then snapshot. A missing file is not an error.
    pub fn capture_with_env_file(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            dotenv::from_path(path).map_err(|e| ConfigError::EnvFile {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
            info!(path = %path.display(), "Loaded env file");
        } else {
            debug!(path = %path.display(), "No env file found");
        }
        Ok(Self::capture())
    }
}

impl FromIterator<(String, String)> for EnvSource {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(vars: I) -> Self {
        Self {
            vars: vars.into_iter().collect(),
        }
    }
}

impl<K: ConfigKey> ConfigSource<K> for EnvSource {
    fn label(&self) -> &str {
        "env"
    }

    fn lookup(&self, key: K) -> Option<String> {
        self.vars.get(key.name()).cloned()
    }
}

/// Hard-coded defaults. Always last in a chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSource;

impl<K: ConfigKey> ConfigSource<K> for DefaultSource {
    fn label(&self) -> &str {
        "default"
    }

    fn lookup(&self, key: K) -> Option<String> {
        Some(key.default_value().to_string())
    }
}

// ── Resolver ────────────────────────────────────────────────────────

/// Ordered chain of sources, first non-empty match wins.
pub struct Resolver<K: ConfigKey> {
    sources: Vec<Box<dyn ConfigSource<K>>>,
}

pub type ServerResolver = Resolver<ServerKey>;
pub type PublicResolver = Resolver<PublicKey>;

impl<K: ConfigKey> Resolver<K> {
    pub fn new() -> Self {
        Self { sources: Vec::new() }
    }

    pub fn with_source(mut self, source: impl ConfigSource<K> + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Resolve `key` and report which source answered. Empty strings are
    /// treated as unset.
    pub fn lookup(&self, key: K) -> Option<(String, &str)> {
        self.sources.iter().find_map(|source| {
            source
                .lookup(key)
                .filter(|value| !value.is_empty())
                .map(|value| (value, source.label()))
        })
    }

    /// Resolve `key`, or the empty string when no source has a value.
    pub fn resolve(&self, key: K) -> String {
        self.lookup(key).map(|(value, _)| value).unwrap_or_default()
    }

    /// Resolve a flag. Only the exact string `"true"` enables it.
    pub fn resolve_flag(&self, key: K) -> bool {
        parse_flag(&self.resolve(key))
    }
}

impl<K: ConfigKey> Default for Resolver<K> {
    fn default() -> Self {
        Self::new()
    }
}

pub fn parse_flag(value: &str) -> bool {
    value == "true"
}

// ── Files ───────────────────────────────────────────────────────────

/// A config file split into server-only and public sections.
///
/// ```json
/// { "server": { "TWILIO_ACCOUNT_SID": "AC..." }, "public": { "PUBLIC_ENABLE_TWILIO": false } }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    server: HashMap<String, Value>,
    #[serde(default)]
    public: HashMap<String, Value>,
}

impl ConfigFile {
    /// Load from disk. A missing file yields an empty config.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using empty layer");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ConfigFile =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        info!(
            path = %path.display(),
            server_keys = file.server.len(),
            public_keys = file.public.len(),
            "Loaded config file"
        );
        Ok(file)
    }

    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    fn server_section(&self, label: &str) -> SectionSource {
        SectionSource::new(label, flatten(&self.server))
    }

    fn public_section(&self, label: &str) -> SectionSource {
        SectionSource::new(label, flatten(&self.public))
    }
}

/// Strings pass through, scalars are stringified, everything else is dropped.
fn flatten(section: &HashMap<String, Value>) -> HashMap<String, String> {
    section
        .iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            Some((key.clone(), value))
        })
        .collect()
}

/// All configuration layers known at startup.
#[derive(Debug, Clone, Default)]
pub struct ConfigLayers {
    pub build_time: ConfigFile,
    pub runtime: ConfigFile,
    pub env: EnvSource,
}

impl ConfigLayers {
    pub fn server_resolver(&self) -> ServerResolver {
        Resolver::new()
            .with_source(self.build_time.server_section("build-time"))
            .with_source(self.runtime.server_section("server-runtime"))
            .with_source(self.env.clone())
            .with_source(DefaultSource)
    }

    pub fn public_resolver(&self) -> PublicResolver {
        Resolver::new()
            .with_source(self.build_time.public_section("build-time"))
            .with_source(self.runtime.public_section("public-runtime"))
            .with_source(self.env.clone())
            .with_source(DefaultSource)
    }
}

// ── Resolved views ──────────────────────────────────────────────────

/// Server-side settings.
#[derive(Clone)]
pub struct ServerConfig {
    pub websocket_server_url: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_webhook_url: String,
    pub enable_twilio: bool,
}

impl ServerConfig {
    pub fn resolve(resolver: &ServerResolver) -> Self {
        Self {
            websocket_server_url: resolver.resolve(ServerKey::WebsocketServerUrl),
            twilio_account_sid: resolver.resolve(ServerKey::TwilioAccountSid),
            twilio_auth_token: resolver.resolve(ServerKey::TwilioAuthToken),
            twilio_webhook_url: resolver.resolve(ServerKey::TwilioWebhookUrl),
            enable_twilio: resolver.resolve_flag(ServerKey::EnableTwilio),
        }
    }

    pub fn has_twilio_credentials(&self) -> bool {
        !self.twilio_account_sid.is_empty() && !self.twilio_auth_token.is_empty()
    }

    pub fn webhook_url(&self) -> Option<&str> {
        Some(self.twilio_webhook_url.as_str()).filter(|url| !url.is_empty())
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.twilio_auth_token.is_empty() { "" } else { "<redacted>" };
        f.debug_struct("ServerConfig")
            .field("websocket_server_url", &self.websocket_server_url)
            .field("twilio_account_sid", &self.twilio_account_sid)
            .field("twilio_auth_token", &token)
            .field("twilio_webhook_url", &self.twilio_webhook_url)
            .field("enable_twilio", &self.enable_twilio)
            .finish()
    }
}

/// Browser-safe settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicConfig {
    pub websocket_server_url: String,
    pub enable_twilio: bool,
}

impl PublicConfig {
    pub fn resolve(resolver: &PublicResolver) -> Self {
        Self {
            websocket_server_url: resolver.resolve(PublicKey::WebsocketServerUrl),
            enable_twilio: resolver.resolve_flag(PublicKey::EnableTwilio),
        }
    }

    pub fn websocket_url(&self) -> String {
        websocket_url(&self.websocket_server_url)
    }
}

/// Turn an `http(s)://` server URL into the matching `ws(s)://` URL.
pub fn websocket_url(server_url: &str) -> String {
    if server_url.is_empty() {
        return FALLBACK_WEBSOCKET_URL.to_string();
    }
    match server_url.strip_prefix("http") {
        Some(rest) => format!("ws{}", rest),
        None => server_url.to_string(),
    }
}
