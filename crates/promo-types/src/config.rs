//! Configuration loading for promo-radar.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/promo-radar/config.toml.
//! Environment variables use the `PROMO_` prefix and `__` for nesting,
//! e.g. `PROMO_MATCHING__SCORE_THRESHOLD=0.6`.

use config::{Config, Environment, File};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::PromoError;

/// Similarity metric of the vector collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Distance {
    #[default]
    #[serde(alias = "cosine", alias = "COSINE")]
    Cosine,
    #[serde(alias = "dot", alias = "DOT")]
    Dot,
    #[serde(alias = "euclid", alias = "EUCLID")]
    Euclid,
}

impl Distance {
    /// Name as understood by the vector database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Distance::Cosine => "Cosine",
            Distance::Dot => "Dot",
            Distance::Euclid => "Euclid",
        }
    }
}

/// OpenAI-compatible LLM and embedding backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// API base URL (LM Studio, OpenAI, or any compatible server)
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// API key (prefer the PROMO_LLM__API_KEY env var over the config file)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Chat model used for promotion extraction
    #[serde(default = "default_chat_model")]
    pub promotion_model: String,

    /// Chat model used for taste label enhancement
    #[serde(default = "default_chat_model")]
    pub taste_label_model: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Per-request timeout
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Attempts per call, including the first one
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_llm_base_url() -> String {
    "http://localhost:1234/v1".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_llm_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: None,
            promotion_model: default_chat_model(),
            taste_label_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            timeout_secs: default_llm_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl LlmSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.trim().is_empty() {
            return Err("llm.base_url must not be empty".to_string());
        }
        if self.timeout_secs == 0 {
            return Err("llm.timeout_secs must be > 0".to_string());
        }
        if self.max_retries == 0 {
            return Err("llm.max_retries must be >= 1".to_string());
        }
        Ok(())
    }
}

/// Vector database (Qdrant) connection and collection layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorSettings {
    #[serde(default = "default_vector_url")]
    pub url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_collection")]
    pub collection: String,

    /// Vector dimensionality; must match the embedding model
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    #[serde(default)]
    pub distance: Distance,

    #[serde(default = "default_vector_timeout")]
    pub timeout_secs: u64,
}

fn default_vector_url() -> String {
    "http://localhost:6333".to_string()
}

fn default_collection() -> String {
    "user_tastes".to_string()
}

fn default_dimension() -> usize {
    1024
}

fn default_vector_timeout() -> u64 {
    10
}

impl Default for VectorSettings {
    fn default() -> Self {
        Self {
            url: default_vector_url(),
            api_key: None,
            collection: default_collection(),
            dimension: default_dimension(),
            distance: Distance::default(),
            timeout_secs: default_vector_timeout(),
        }
    }
}

impl VectorSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.collection.trim().is_empty() {
            return Err("vector.collection must not be empty".to_string());
        }
        if self.dimension == 0 {
            return Err("vector.dimension must be > 0".to_string());
        }
        if self.timeout_secs == 0 {
            return Err("vector.timeout_secs must be > 0".to_string());
        }
        Ok(())
    }
}

/// Promotion-to-taste matching.
///
/// `score_threshold` has no default: a silently defaulted similarity cutoff
/// would change notification volume, so loading fails when it is missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingSettings {
    /// Minimum similarity for a taste to match a promotion (0.0-1.0)
    #[serde(default)]
    pub score_threshold: Option<f32>,

    /// Default result size for taste searches
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Upper bound for caller-supplied search limits
    #[serde(default = "default_max_search_limit")]
    pub max_search_limit: usize,
}

fn default_search_limit() -> usize {
    20
}

fn default_max_search_limit() -> usize {
    100
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            score_threshold: None,
            search_limit: default_search_limit(),
            max_search_limit: default_max_search_limit(),
        }
    }
}

impl MatchingSettings {
    pub fn validate(&self) -> Result<(), String> {
        match self.score_threshold {
            None => {
                return Err(
                    "matching.score_threshold is required (set PROMO_MATCHING__SCORE_THRESHOLD)"
                        .to_string(),
                )
            }
            Some(t) if !(0.0..=1.0).contains(&t) => {
                return Err(format!("matching.score_threshold must be 0.0-1.0, got {}", t))
            }
            Some(_) => {}
        }
        if self.search_limit == 0 || self.search_limit > self.max_search_limit {
            return Err(format!(
                "matching.search_limit must be 1-{}, got {}",
                self.max_search_limit, self.search_limit
            ));
        }
        Ok(())
    }

    /// The configured threshold, or a config error when absent.
    pub fn threshold(&self) -> Result<f32, PromoError> {
        self.score_threshold.ok_or_else(|| {
            PromoError::Config("matching.score_threshold is required".to_string())
        })
    }
}

/// Outbound messaging gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingSettings {
    /// HTTP endpoint that accepts `{to, message, image?}` send requests
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-send timeout
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
}

fn default_gateway_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_send_timeout() -> u64 {
    15
}

impl Default for MessagingSettings {
    fn default() -> Self {
        Self {
            gateway_url: default_gateway_url(),
            api_key: None,
            send_timeout_secs: default_send_timeout(),
        }
    }
}

/// Taste registration behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasteSettings {
    /// Expand labels into search keywords with the LLM before embedding
    #[serde(default = "default_enhance_labels")]
    pub enhance_labels: bool,
}

fn default_enhance_labels() -> bool {
    true
}

impl Default for TasteSettings {
    fn default() -> Self {
        Self {
            enhance_labels: default_enhance_labels(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to RocksDB storage directory
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub vector: VectorSettings,

    #[serde(default)]
    pub matching: MatchingSettings,

    #[serde(default)]
    pub messaging: MessagingSettings,

    #[serde(default)]
    pub tastes: TasteSettings,
}

fn default_db_path() -> String {
    ProjectDirs::from("", "", "promo-radar")
        .map(|p| p.data_local_dir().join("db"))
        .unwrap_or_else(|| PathBuf::from("./data"))
        .to_string_lossy()
        .to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_log_level(),
            llm: LlmSettings::default(),
            vector: VectorSettings::default(),
            matching: MatchingSettings::default(),
            messaging: MessagingSettings::default(),
            tastes: TasteSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/promo-radar/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (PROMO_*)
    ///
    /// The result is validated; a missing score threshold fails here.
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, PromoError> {
        let settings = Self::load_unvalidated(cli_config_path)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Same layering as [`Settings::load`] without validation.
    pub fn load_unvalidated(cli_config_path: Option<&str>) -> Result<Self, PromoError> {
        let config_dir = ProjectDirs::from("", "", "promo-radar")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("db_path", default_db_path())?
            .set_default("log_level", default_log_level())?
            .set_default("llm.base_url", default_llm_base_url())?
            .set_default("vector.url", default_vector_url())?
            .set_default("vector.collection", default_collection())?
            .set_default("vector.dimension", default_dimension() as i64)?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Format: PROMO_DB_PATH, PROMO_LLM__BASE_URL, PROMO_MATCHING__SCORE_THRESHOLD
        builder = builder.add_source(
            Environment::with_prefix("PROMO")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), PromoError> {
        self.llm.validate().map_err(PromoError::Config)?;
        self.vector.validate().map_err(PromoError::Config)?;
        self.matching.validate().map_err(PromoError::Config)?;
        if self.messaging.send_timeout_secs == 0 {
            return Err(PromoError::Config(
                "messaging.send_timeout_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Expand ~ in db_path to the user's home directory
    pub fn expanded_db_path(&self) -> PathBuf {
        if let Some(rest) = self.db_path.strip_prefix("~/") {
            if let Some(dirs) = BaseDirs::new() {
                return dirs.home_dir().join(rest);
            }
        }
        PathBuf::from(&self.db_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> (tempfile::TempDir, String) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("promo.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        (dir, path.to_string_lossy().to_string())
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.llm.base_url, "http://localhost:1234/v1");
        assert_eq!(settings.vector.collection, "user_tastes");
        assert_eq!(settings.vector.dimension, 1024);
        assert_eq!(settings.vector.distance, Distance::Cosine);
        assert_eq!(settings.matching.search_limit, 20);
        assert!(settings.tastes.enhance_labels);
    }

    #[test]
    fn test_defaults_fail_without_threshold() {
        let settings = Settings::default();
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("score_threshold"));
        assert!(settings.matching.threshold().is_err());
    }

    #[test]
    fn test_threshold_out_of_range() {
        let mut settings = Settings::default();
        settings.matching.score_threshold = Some(1.5);
        assert!(settings.validate().is_err());
        settings.matching.score_threshold = Some(0.6);
        assert!(settings.validate().is_ok());
        assert_eq!(settings.matching.threshold().unwrap(), 0.6);
    }

    #[test]
    fn test_load_from_file() {
        let (_dir, path) = write_config(
            r#"
log_level = "debug"

[matching]
score_threshold = 0.55

[vector]
dimension = 768
distance = "Dot"
"#,
        );
        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.matching.score_threshold, Some(0.55));
        assert_eq!(settings.vector.dimension, 768);
        assert_eq!(settings.vector.distance, Distance::Dot);
        assert_eq!(settings.vector.collection, "user_tastes");
    }

    #[test]
    fn test_load_file_missing_threshold_fails() {
        let (_dir, path) = write_config("log_level = \"warn\"\n");
        if std::env::var("PROMO_MATCHING__SCORE_THRESHOLD").is_ok() {
            return;
        }
        assert!(Settings::load(Some(&path)).is_err());
        assert!(Settings::load_unvalidated(Some(&path)).is_ok());
    }

    #[test]
    fn test_distance_wire_names() {
        assert_eq!(Distance::Cosine.as_str(), "Cosine");
        assert_eq!(Distance::Euclid.as_str(), "Euclid");
    }

    #[test]
    fn test_expanded_db_path_plain() {
        let mut settings = Settings::default();
        settings.db_path = "/var/lib/promo".to_string();
        assert_eq!(settings.expanded_db_path(), PathBuf::from("/var/lib/promo"));
    }
}
