//! Bootstrap configuration loading and validation
//!
//! Configuration sources, highest priority first:
//! 1. Command-line arguments (applied by the service binary)
//! 2. Environment variables (applied by the service binary via clap)
//! 3. TOML config file
//! 4. Compiled defaults
//!
//! A missing config file is not fatal: the compiled defaults are used and the
//! binary reports which source it ended up with. A file that exists but does
//! not parse is fatal.

use crate::{Error, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

/// Default HTTP port for tunegate-music
pub const DEFAULT_PORT: u16 = 5780;

/// Placeholder-auth streaming URL used when no provider grants a real one
pub const DEFAULT_FALLBACK_URL_TEMPLATE: &str =
    "https://ws.stream.qqmusic.qq.com/C400{id}.m4a?guid=0&vkey=&uin=0&fromtag=120032";

/// Album art template for the direct QQ search dialect
pub const DEFAULT_QQ_ART_TEMPLATE: &str =
    "https://y.gtimg.cn/music/photo_new/T002R300x300M000{album_mid}.jpg";

/// Pay-status label the vkeys API uses for free tracks
pub const DEFAULT_FREE_LABEL: &str = "免费";

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Top-level TOML configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Interface the HTTP server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Upstream providers in priority order
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level or EnvFilter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Settings shared by every outbound upstream call
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Per-call timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// How upstream failures reach the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Always answer 200 with degraded content
    BestEffort,
    /// Answer 502 once every tier has failed
    Strict,
}

/// How many providers a search consults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// First search provider only
    Single,
    /// All search providers concurrently, merged and de-duplicated
    Aggregate,
}

/// Resolver behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_failure_policy")]
    pub failure_policy: FailurePolicy,

    #[serde(default = "default_search_mode")]
    pub search_mode: SearchMode,

    /// Result-count cap passed to search providers
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,

    /// Bitrate reported with every playback URL
    #[serde(default = "default_nominal_bitrate")]
    pub nominal_bitrate: u32,

    /// Rewrite `http://` stream URLs to `https://`
    #[serde(default = "default_true")]
    pub force_https: bool,

    /// Last playback tier; `{id}` is replaced by the encoded identifier
    #[serde(default = "default_fallback_url_template")]
    pub fallback_url_template: String,
}

/// Response shape spoken by an upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    Vkeys,
    Qq,
    Netease,
    Meting,
}

/// Operation a provider takes part in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderRole {
    Search,
    Url,
    Lyric,
}

/// Which vkeys field becomes the canonical track id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdField {
    Mid,
    Id,
}

/// One upstream provider
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub dialect: Dialect,
    pub base_url: String,

    #[serde(default = "default_roles")]
    pub roles: Vec<ProviderRole>,

    /// Pay-status value meaning "free" (vkeys)
    #[serde(default)]
    pub free_label: Option<String>,

    #[serde(default = "default_id_field")]
    pub id_field: IdField,

    /// Referer header sent upstream
    #[serde(default)]
    pub referer: Option<String>,

    /// Backing service for meting (`netease`, `tencent`, ...)
    #[serde(default)]
    pub server: Option<String>,

    /// Album art template with `{album_mid}` (qq)
    #[serde(default)]
    pub art_template: Option<String>,
}

impl ProviderConfig {
    pub fn has_role(&self, role: ProviderRole) -> bool {
        self.roles.contains(&role)
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_failure_policy() -> FailurePolicy {
    FailurePolicy::BestEffort
}

fn default_search_mode() -> SearchMode {
    SearchMode::Single
}

fn default_result_limit() -> usize {
    30
}

fn default_nominal_bitrate() -> u32 {
    320_000
}

fn default_true() -> bool {
    true
}

fn default_fallback_url_template() -> String {
    DEFAULT_FALLBACK_URL_TEMPLATE.to_string()
}

fn default_roles() -> Vec<ProviderRole> {
    vec![ProviderRole::Search, ProviderRole::Url, ProviderRole::Lyric]
}

fn default_id_field() -> IdField {
    IdField::Mid
}

/// Single vkeys provider against the Tencent catalogue
fn default_providers() -> Vec<ProviderConfig> {
    vec![ProviderConfig {
        name: "vkeys-tencent".to_string(),
        dialect: Dialect::Vkeys,
        base_url: "https://api.vkeys.cn/v2/music/tencent".to_string(),
        roles: default_roles(),
        free_label: Some(DEFAULT_FREE_LABEL.to_string()),
        id_field: IdField::Mid,
        referer: None,
        server: None,
        art_template: None,
    }]
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            failure_policy: default_failure_policy(),
            search_mode: default_search_mode(),
            result_limit: default_result_limit(),
            nominal_bitrate: default_nominal_bitrate(),
            force_https: true,
            fallback_url_template: default_fallback_url_template(),
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            logging: LoggingConfig::default(),
            upstream: UpstreamConfig::default(),
            resolver: ResolverConfig::default(),
            providers: default_providers(),
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load configuration, falling back to compiled defaults when no file exists
    ///
    /// `explicit` comes from `--config` / `TUNEGATE_CONFIG`. Without it the
    /// platform config locations are searched.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) => path,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    /// Listen address from `bind_address` and `port`; accepts IPv4 and IPv6
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.bind_address.trim().parse().map_err(|e| {
            Error::Config(format!("bind_address {:?}: {}", self.bind_address, e))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Providers holding `role`, in configured order
    pub fn providers_with_role(&self, role: ProviderRole) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.iter().filter(move |p| p.has_role(role))
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.resolver.result_limit == 0 {
            return Err(Error::Config("resolver.result_limit must be at least 1".to_string()));
        }

        self.socket_addr()?;

        if self.upstream.timeout_ms == 0 {
            return Err(Error::Config("upstream.timeout_ms must be at least 1".to_string()));
        }

        let template = &self.resolver.fallback_url_template;
        if !template.contains("{id}") {
            return Err(Error::Config(format!(
                "resolver.fallback_url_template must contain {{id}}: {}",
                template
            )));
        }
        parse_http_url(&template.replace("{id}", "0"))
            .map_err(|e| Error::Config(format!("resolver.fallback_url_template: {}", e)))?;

        if self.providers_with_role(ProviderRole::Search).next().is_none() {
            return Err(Error::Config(
                "at least one provider must have the \"search\" role".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for provider in &self.providers {
            if !names.insert(provider.name.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate provider name: {}",
                    provider.name
                )));
            }
            parse_http_url(&provider.base_url).map_err(|e| {
                Error::Config(format!("provider {} base_url: {}", provider.name, e))
            })?;
        }

        Ok(())
    }
}

fn parse_http_url(raw: &str) -> std::result::Result<reqwest::Url, String> {
    let url = reqwest::Url::parse(raw).map_err(|e| format!("invalid URL {:?}: {}", raw, e))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("unsupported scheme {:?} in {:?}", other, raw)),
    }
}

/// First existing platform config file, if any
///
/// Linux: `~/.config/tunegate/config.toml`, then `/etc/tunegate/config.toml`.
/// Other platforms: the user config directory only.
pub fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("tunegate").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/tunegate/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}
