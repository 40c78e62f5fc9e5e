use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "sendiz.toml",
    "config/sendiz.toml",
    "crates/config/sendiz.toml",
    "../sendiz.toml",
    "../config/sendiz.toml",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
    #[serde(default = "HttpConfig::default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl HttpConfig {
    fn default_allowed_origins() -> Vec<String> {
        vec!["http://localhost:3000".to_string()]
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: Self::default_allowed_origins(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://sendiz.db".to_string(),
            max_connections: 10,
        }
    }
}

/// Tuning knobs for message persistence, history hydration and live delivery.
///
/// ```
/// use sendiz_config::DeliveryConfig;
///
/// let delivery = DeliveryConfig::default();
/// assert_eq!(delivery.hydration_concurrency, 4);
/// assert!(delivery.outbound_queue_capacity > 0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Pending payloads a single session may buffer before it is dropped as too slow.
    pub outbound_queue_capacity: usize,
    /// Attachment lookups allowed in flight while hydrating one history page.
    pub hydration_concurrency: usize,
    pub hydration_timeout_ms: u64,
    pub write_timeout_ms: u64,
    pub idle_timeout_secs: u64,
    /// Upper bound on message text, counted in characters.
    pub max_text_length: usize,
    pub max_attachments: usize,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: 64,
            hydration_concurrency: 4,
            hydration_timeout_ms: 2_000,
            write_timeout_ms: 5_000,
            idle_timeout_secs: 120,
            max_text_length: 4_096,
            max_attachments: 16,
            default_page_size: 50,
            max_page_size: 200,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret shared with the token service. Required to serve requests.
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default)]
    pub issuer: Option<String>,
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use sendiz_config::load;
///
/// std::env::remove_var("SENDIZ_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();
    let delivery = &defaults.delivery;

    let mut builder = config::Config::builder()
        .set_default("http.address", defaults.http.address.clone())?
        .set_default("http.port", i64::from(defaults.http.port))?
        .set_default("http.allowed_origins", defaults.http.allowed_origins.clone())?
        .set_default("database.url", defaults.database.url.clone())?
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )?
        .set_default(
            "delivery.outbound_queue_capacity",
            saturating_i64(delivery.outbound_queue_capacity as u64),
        )?
        .set_default(
            "delivery.hydration_concurrency",
            saturating_i64(delivery.hydration_concurrency as u64),
        )?
        .set_default(
            "delivery.hydration_timeout_ms",
            saturating_i64(delivery.hydration_timeout_ms),
        )?
        .set_default("delivery.write_timeout_ms", saturating_i64(delivery.write_timeout_ms))?
        .set_default("delivery.idle_timeout_secs", saturating_i64(delivery.idle_timeout_secs))?
        .set_default(
            "delivery.max_text_length",
            saturating_i64(delivery.max_text_length as u64),
        )?
        .set_default(
            "delivery.max_attachments",
            saturating_i64(delivery.max_attachments as u64),
        )?
        .set_default("delivery.default_page_size", i64::from(delivery.default_page_size))?
        .set_default("delivery.max_page_size", i64::from(delivery.max_page_size))?;

    let environment_overrides = config::Environment::with_prefix("SENDIZ").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("SENDIZ_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via SENDIZ_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    config.delivery.normalise();

    debug!(
        http.address = %config.http.address,
        http.port = config.http.port,
        database.url = %config.database.url,
        "loaded backend configuration"
    );
    Ok(config)
}

impl DeliveryConfig {
    /// Zero values would stall delivery or hydration; lift them to the smallest usable value.
    pub fn normalise(&mut self) {
        self.outbound_queue_capacity = self.outbound_queue_capacity.max(1);
        self.hydration_concurrency = self.hydration_concurrency.max(1);
        self.max_page_size = self.max_page_size.max(1);
        self.default_page_size = self.default_page_size.clamp(1, self.max_page_size);
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
