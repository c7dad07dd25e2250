use crate::valuation::DEFAULT_PROJECTION_YEARS;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub valuation: ValuationConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

/// Scraper configuration: transport settings plus the origin of every source.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    #[serde(default = "default_investing_url")]
    pub investing_url: String,

    #[serde(default = "default_simplywallst_url")]
    pub simplywallst_url: String,

    #[serde(default = "default_infront_url")]
    pub infront_url: String,

    #[serde(default = "default_search_url")]
    pub search_url: String,

    #[serde(default = "default_search_agent")]
    pub search_agent: String,

    #[serde(default = "default_search_app_id")]
    pub search_app_id: String,

    #[serde(default = "default_search_api_key")]
    pub search_api_key: String,

    /// Appended to the company name in growth-rate searches ("klse" → Bursa Malaysia).
    #[serde(default = "default_market_qualifier")]
    pub market_qualifier: String,
}

/// Valuation configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValuationConfig {
    #[serde(default = "default_projection_years")]
    pub projection_years: usize,
}

/// Report configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_extension")]
    pub extension: String,

    #[serde(default = "default_true")]
    pub json_sidecar: bool,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_request_delay_ms() -> u64 {
    500
}
fn default_jitter_ms() -> u64 {
    250
}
fn default_investing_url() -> String {
    "https://www.investing.com".to_string()
}
fn default_simplywallst_url() -> String {
    "https://simplywall.st".to_string()
}
fn default_infront_url() -> String {
    "https://www.infrontanalytics.com".to_string()
}
fn default_search_url() -> String {
    "https://17iqhzwxzw-dsn.algolia.net/1/indexes/companies/query".to_string()
}
fn default_search_agent() -> String {
    "Algolia for JavaScript (4.2.0); Browser (lite)".to_string()
}
fn default_search_app_id() -> String {
    "17IQHZWXZW".to_string()
}
fn default_search_api_key() -> String {
    "be7c37718f927d0137a88a11b69ae419".to_string()
}
fn default_market_qualifier() -> String {
    "klse".to_string()
}
fn default_projection_years() -> usize {
    DEFAULT_PROJECTION_YEARS
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("reports")
}
fn default_extension() -> String {
    "csv".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            request_delay_ms: default_request_delay_ms(),
            jitter_ms: default_jitter_ms(),
            investing_url: default_investing_url(),
            simplywallst_url: default_simplywallst_url(),
            infront_url: default_infront_url(),
            search_url: default_search_url(),
            search_agent: default_search_agent(),
            search_app_id: default_search_app_id(),
            search_api_key: default_search_api_key(),
            market_qualifier: default_market_qualifier(),
        }
    }
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            projection_years: default_projection_years(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            extension: default_extension(),
            json_sidecar: true,
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("DCF").separator("__"))
            .build()?;

        let app_cfg: AppConfig = cfg.try_deserialize().unwrap_or_else(|e| {
            tracing::warn!("Invalid configuration, using defaults: {}", e);
            AppConfig::default()
        });
        Ok(app_cfg)
    }
}
