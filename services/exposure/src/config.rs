use serde::Deserialize;

/// Main configuration for the exposure tracking service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// Backing key-value store configuration
    #[serde(default)]
    pub kv: KvConfig,
    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging/metrics
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Deployment environment label echoed in API responses
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

/// Backing key-value store configuration.
///
/// The three credential fields are all optional: when any of them is
/// missing the store serves zeroed counts and drops writes instead of
/// failing startup, so a preview deployment can run without secrets.
#[derive(Debug, Clone, Deserialize)]
pub struct KvConfig {
    /// Account identifier for the KV REST API
    pub account_id: Option<String>,
    /// Namespace identifier holding campaign data
    pub namespace_id: Option<String>,
    /// Bearer token for the KV REST API
    pub api_token: Option<String>,
    /// Base URL of the KV REST API (overridable for local emulators)
    #[serde(default = "default_kv_base_url")]
    pub base_url: String,
    /// Key under which the full counter map is stored
    #[serde(default = "default_counter_key")]
    pub counter_key: String,
}

/// API configuration for the exposure endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// API listen address
    #[serde(default = "default_api_host")]
    pub host: String,
    /// API listen port
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Enable CORS (the landing page beacons post cross-origin)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
    /// Allowed CORS origins
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

// Default value functions
fn default_service_name() -> String {
    "exposure-service".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_kv_base_url() -> String {
    "https://api.cloudflare.com/client/v4".to_string()
}

fn default_counter_key() -> String {
    "video_exposure_counts".to_string()
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Add config file if present
            .add_source(config::File::with_name("config/exposure").required(false))
            .add_source(config::File::with_name("/etc/campaign/exposure").required(false))
            // Override with environment variables
            // EXPOSURE__KV__ACCOUNT_ID -> kv.account_id
            .add_source(
                config::Environment::with_prefix("EXPOSURE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize().map_err(Into::into)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            environment: default_environment(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            account_id: None,
            namespace_id: None,
            api_token: None,
            base_url: default_kv_base_url(),
            counter_key: default_counter_key(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            cors_enabled: default_true(),
            cors_origins: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        assert_eq!(default_counter_key(), "video_exposure_counts");
        assert_eq!(default_api_port(), 8080);
        assert_eq!(default_environment(), "development");
    }

    #[test]
    fn test_kv_config_defaults_to_unconfigured() {
        let kv = KvConfig::default();
        assert!(kv.account_id.is_none());
        assert!(kv.namespace_id.is_none());
        assert!(kv.api_token.is_none());
        assert_eq!(kv.base_url, default_kv_base_url());
    }
}
