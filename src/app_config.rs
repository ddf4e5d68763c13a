use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::default::Default;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::ConfigError;

/// Application configuration module
/// This module handles the runtime settings (environment driven) and the
/// declarative configuration document listing languages and model specifications.
/// Runtime settings of the gateway
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    /// Path of the JSON configuration document
    #[serde(default)]
    pub config_path: PathBuf,

    /// Directory anchoring every relative `model_path`
    #[serde(default)]
    pub models_root: PathBuf,

    /// Inference endpoint of the remote engine
    #[serde(default = "default_engine_url")]
    pub engine_url: String,

    /// Management endpoint of the remote engine (model listing)
    #[serde(default = "default_engine_management_url")]
    pub engine_management_url: String,

    /// Request timeout for the remote engine in seconds
    #[serde(default = "default_engine_timeout_secs")]
    pub engine_timeout_secs: u64,

    /// Maximum readiness poll attempts before a remote model is skipped
    #[serde(default = "default_readiness_retries")]
    pub readiness_retries: u32,

    /// Delay between readiness poll attempts in milliseconds
    #[serde(default = "default_readiness_interval_ms")]
    pub readiness_interval_ms: u64,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    // @returns: Matching log facade filter
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(anyhow!("Invalid log level: {}", s)),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            models_root: PathBuf::new(),
            engine_url: default_engine_url(),
            engine_management_url: default_engine_management_url(),
            engine_timeout_secs: default_engine_timeout_secs(),
            readiness_retries: default_readiness_retries(),
            readiness_interval_ms: default_readiness_interval_ms(),
            log_level: LogLevel::default(),
        }
    }
}

impl Settings {
    /// Read settings from the process environment, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(path) = lookup("MT_API_CONFIG") {
            settings.config_path = PathBuf::from(path);
        }
        if let Some(root) = lookup("MODELS_ROOT") {
            settings.models_root = PathBuf::from(root);
        }
        if let Some(url) = lookup("MT_API_ENGINE_URL") {
            settings.engine_url = url;
        }
        if let Some(url) = lookup("MT_API_ENGINE_MANAGEMENT_URL") {
            settings.engine_management_url = url;
        }
        if let Some(secs) = lookup("MT_API_ENGINE_TIMEOUT").and_then(|v| v.parse().ok()) {
            settings.engine_timeout_secs = secs;
        }
        if let Some(retries) = lookup("MT_API_READINESS_RETRIES").and_then(|v| v.parse().ok()) {
            settings.readiness_retries = retries;
        }
        if let Some(ms) = lookup("MT_API_READINESS_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            settings.readiness_interval_ms = ms;
        }
        if let Some(level) = lookup("MT_API_LOG_LEVEL").and_then(|v| v.parse().ok()) {
            settings.log_level = level;
        }

        settings
    }

    /// Validate the settings for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.config_path.as_os_str().is_empty() {
            return Err(anyhow!("Configuration path is required (MT_API_CONFIG)"));
        }
        if self.engine_timeout_secs == 0 {
            return Err(anyhow!("Engine timeout must be greater than zero"));
        }
        if self.readiness_retries == 0 {
            return Err(anyhow!("Readiness retries must be greater than zero"));
        }
        url::Url::parse(&self.engine_url)
            .map_err(|e| anyhow!("Invalid engine URL {}: {}", self.engine_url, e))?;
        url::Url::parse(&self.engine_management_url)
            .map_err(|e| anyhow!("Invalid engine management URL {}: {}", self.engine_management_url, e))?;
        Ok(())
    }
}

/// Translation engine kind of a model specification
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ModelType {
    Opus,
    OpusBig,
    CTranslator2,
    Dummy,
    Custom,
    M2m100,
    Nllb,
    /// Any string outside the supported set, kept for the validation warning
    Unknown(String),
}

impl ModelType {
    // @returns: Configuration spelling of the engine kind
    pub fn as_str(&self) -> &str {
        match self {
            Self::Opus => "opus",
            Self::OpusBig => "opus-big",
            Self::CTranslator2 => "ctranslator2",
            Self::Dummy => "dummy",
            Self::Custom => "custom",
            Self::M2m100 => "m2m100",
            Self::Nllb => "nllb",
            Self::Unknown(other) => other,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    // @returns: Suffix used in the `translate-<engine>` pipeline label
    pub fn translate_label(&self) -> &str {
        match self {
            Self::Opus => "opus-huggingface",
            Self::OpusBig => "opus-big-huggingface",
            other => other.as_str(),
        }
    }
}

impl From<String> for ModelType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "opus" => Self::Opus,
            "opus-big" => Self::OpusBig,
            "ctranslator2" => Self::CTranslator2,
            "dummy" => Self::Dummy,
            "custom" => Self::Custom,
            "m2m100" => Self::M2m100,
            "nllb" => Self::Nllb,
            _ => Self::Unknown(value),
        }
    }
}

impl From<ModelType> for String {
    fn from(value: ModelType) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sentence splitting strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SentenceSplit {
    /// A named splitter, `"nltk"` is the only one known
    Named(String),
    /// Ordered list of boundary characters
    Boundaries(Vec<String>),
}

/// Pipeline flags of a model specification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineFlags {
    #[serde(default)]
    pub lowercase: bool,
    #[serde(default)]
    pub tokenize: bool,
    #[serde(default)]
    pub bpe: bool,
    #[serde(default)]
    pub sentencepiece: bool,
    #[serde(default)]
    pub translate: bool,
    #[serde(default)]
    pub recase: bool,
}

/// Declarative specification of one model.
///
/// Every field is optional at the parser level; the pipeline compiler reports
/// missing fields per model instead of rejecting the whole document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    #[serde(default)]
    pub src: Option<String>,

    #[serde(default)]
    pub tgt: Option<String>,

    #[serde(default)]
    pub model_type: Option<ModelType>,

    #[serde(default)]
    pub alt: Option<String>,

    #[serde(default = "default_true")]
    pub load: bool,

    /// Directory relative to the models root
    #[serde(default)]
    pub model_path: Option<String>,

    #[serde(default)]
    pub pipeline: PipelineFlags,

    #[serde(default)]
    pub sentence_split: Option<SentenceSplit>,

    #[serde(default)]
    pub multilingual: bool,

    /// `src-tgt` pairs served by a multilingual model
    #[serde(default)]
    pub supported_pairs: Vec<String>,

    #[serde(default)]
    pub pretranslatechain: Vec<String>,

    #[serde(default)]
    pub posttranslatechain: Vec<String>,

    // @field: BPE codes file, relative to model_path
    #[serde(default)]
    pub bpe_file: Option<String>,

    // @field: Source SentencePiece model, relative to model_path
    #[serde(default)]
    pub src_sentencepiece_model: Option<String>,

    // @field: Target SentencePiece model, relative to model_path
    #[serde(default)]
    pub tgt_sentencepiece_model: Option<String>,

    // @field: Checkpoint of m2m100/nllb engines
    #[serde(default)]
    pub checkpoint_id: Option<String>,

    // @field: Name the remote engine serves the model under
    #[serde(default)]
    pub engine_model_name: Option<String>,
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            src: None,
            tgt: None,
            model_type: None,
            alt: None,
            load: true,
            model_path: None,
            pipeline: PipelineFlags::default(),
            sentence_split: None,
            multilingual: false,
            supported_pairs: Vec::new(),
            pretranslatechain: Vec::new(),
            posttranslatechain: Vec::new(),
            bpe_file: None,
            src_sentencepiece_model: None,
            tgt_sentencepiece_model: None,
            checkpoint_id: None,
            engine_model_name: None,
        }
    }
}

impl ModelSpec {
    /// Bilingual specification with the given engine
    pub fn bilingual(src: &str, tgt: &str, model_type: ModelType) -> Self {
        Self {
            src: Some(src.to_string()),
            tgt: Some(tgt.to_string()),
            model_type: Some(model_type),
            ..Default::default()
        }
    }

    /// Set the alt id
    pub fn with_alt(mut self, alt: &str) -> Self {
        self.alt = Some(alt.to_string());
        self
    }

    /// Set the pipeline flags
    pub fn with_pipeline(mut self, pipeline: PipelineFlags) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Set the sentence splitting strategy
    pub fn with_sentence_split(mut self, split: SentenceSplit) -> Self {
        self.sentence_split = Some(split);
        self
    }
}

/// Configuration document: language names and model specifications
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigDocument {
    /// Language code to display name
    #[serde(default)]
    pub languages: Option<BTreeMap<String, String>>,

    /// Model entries, in declaration order. Kept as raw JSON so a mistyped
    /// entry only disqualifies itself; see [`ConfigDocument::model_specs`].
    #[serde(default)]
    pub models: Option<Vec<serde_json::Value>>,
}

impl ConfigDocument {
    /// Build a document in memory
    pub fn new(languages: BTreeMap<String, String>, models: Vec<ModelSpec>) -> Self {
        Self {
            languages: Some(languages),
            models: Some(models.iter().filter_map(|spec| serde_json::to_value(spec).ok()).collect()),
        }
    }

    /// Decode each model entry on its own. `None` when the document has no
    /// `models` list; a malformed entry yields the decoding error in its slot.
    pub fn model_specs(&self) -> Option<Vec<std::result::Result<ModelSpec, String>>> {
        self.models.as_ref().map(|entries| {
            entries
                .iter()
                .map(|entry| ModelSpec::deserialize(entry).map_err(|e| e.to_string()))
                .collect()
        })
    }

    /// Read and parse the configuration document at `path`
    pub fn load(path: &Path) -> std::result::Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(&content, path)
    }

    /// Parse a configuration document; `origin` is only used in error messages
    pub fn parse(content: &str, origin: &Path) -> std::result::Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::Malformed {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

fn default_true() -> bool {
    true
}

fn default_engine_url() -> String {
    "http://torchserve:8080".to_string()
}

fn default_engine_management_url() -> String {
    "http://torchserve:8081".to_string()
}

fn default_engine_timeout_secs() -> u64 {
    60
}

fn default_readiness_retries() -> u32 {
    30
}

fn default_readiness_interval_ms() -> u64 {
    1000 // 1 second between readiness polls
}
