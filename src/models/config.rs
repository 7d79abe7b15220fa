//! Configuration model for fewshot.
//!
//! Everything an experiment run can vary is parameterized here and loaded
//! once from a TOML file. Adapter-facing options are distilled into an
//! immutable [`AdapterConfig`] before any request is issued; validation
//! reports every missing required field at once rather than the first.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for an experiment run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Backend provider family ("openai", "anthropic", "mistral", "yandex", "sber")
    pub provider: String,

    /// Exact engine string, matched against the adapter's pricing table
    pub engine: String,

    /// Completion endpoint base URL (required for all remote adapters)
    #[serde(default)]
    pub api_url: Option<String>,

    /// Prompt template key (fixed template set, currently "chemistry")
    #[serde(default)]
    pub subject: Option<String>,

    /// Identity label some providers attach per message
    #[serde(default)]
    pub name: Option<String>,

    /// Cloud folder identifier for the Yandex-style adapter
    #[serde(default)]
    pub catalog: Option<String>,

    /// Total call attempts per item, 1-indexed
    #[serde(default = "default_retry_number")]
    pub retry_number: u32,

    /// Per-call timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Enable image-based payloads where the adapter supports them
    #[serde(default)]
    pub vision: bool,

    /// Seed for dataset splitting and samplers
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Fraction of the dataset held out for testing
    #[serde(default = "default_test_size")]
    pub test_size: f64,

    /// Few-shot examples per request
    #[serde(default = "default_n_for_train")]
    pub n_for_train: usize,

    /// Sampler name ("strict", "occurrence", "equal")
    #[serde(default = "default_sampler")]
    pub sampler: String,

    /// Class label columns of the dataset
    #[serde(default)]
    pub classes: Vec<String>,

    /// Path to the dataset file
    #[serde(default)]
    pub dataset: Option<PathBuf>,

    /// "table" renders rows as "label: value; ..." pairs, "text" joins them raw
    #[serde(default = "default_data_format")]
    pub data_format: String,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_retry_number() -> u32 {
    5
}

fn default_timeout() -> u64 {
    180
}

fn default_seed() -> u64 {
    42
}

fn default_test_size() -> f64 {
    0.2
}

fn default_n_for_train() -> usize {
    5
}

fn default_sampler() -> String {
    "strict".to_string()
}

fn default_data_format() -> String {
    "table".to_string()
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory that per-run result directories are created under
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("experiments")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            source: e,
        })
    }

    /// Whether dataset rows carry raw text rather than labeled columns.
    pub fn pure_text(&self) -> bool {
        self.data_format != "table"
    }

    /// Distill the adapter-facing options into an immutable, validated
    /// [`AdapterConfig`].
    ///
    /// Collects every missing required field before failing, so the
    /// operator fixes the config file once.
    pub fn adapter_config(&self) -> Result<AdapterConfig, ConfigError> {
        let mut missing = Vec::new();
        if self.api_url.is_none() {
            missing.push("api_url".to_string());
        }
        if self.subject.is_none() {
            missing.push("subject".to_string());
        }

        let (Some(api_url), Some(subject)) = (&self.api_url, &self.subject) else {
            return Err(ConfigError::MissingFields(missing));
        };

        if self.retry_number < 1 {
            return Err(ConfigError::InvalidValue {
                field: "retry_number".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(AdapterConfig {
            api_url: normalize_api_url(&expand_env_vars(api_url)),
            engine: self.engine.clone(),
            template: subject.clone(),
            name: self.name.clone(),
            catalog: self.catalog.as_deref().map(expand_env_vars),
            vision: self.vision,
            retry_number: self.retry_number,
            timeout_secs: self.timeout_secs,
        })
    }
}

/// Immutable adapter-facing configuration, validated at construction.
///
/// Adapters take this by reference in their constructors; the loosely
/// typed option map never reaches them.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Normalized endpoint base URL (scheme present, trailing slash)
    pub api_url: String,
    pub engine: String,
    pub template: String,
    pub name: Option<String>,
    pub catalog: Option<String>,
    pub vision: bool,
    pub retry_number: u32,
    pub timeout_secs: u64,
}

/// Normalize an endpoint URL the way requests will consume it: ensure a
/// scheme and a trailing slash so `respond` can be appended directly.
fn normalize_api_url(url: &str) -> String {
    let mut url = if url.starts_with("http") {
        url.to_string()
    } else {
        format!("http://{url}")
    };
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

/// Expand environment variables in a string.
///
/// Supports ${VAR_NAME} syntax. If the variable is not set, the
/// placeholder is left unchanged.
pub fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();

    for cap in re.captures_iter(s) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Invalid value for \"{field}\": {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Unknown provider: \"{0}\"")]
    UnknownProvider(String),

    #[error("Unknown sampler: \"{0}\"")]
    UnknownSampler(String),
}
