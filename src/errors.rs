/*!
 * Error types for the mtgateway library.
 *
 * Errors are split by severity:
 * - `ConfigError`: fatal, aborts the registry build
 * - `ModelLoadError`: recoverable, skips a single model
 * - `EngineError` / `TranslationError`: raised while serving a request
 *
 * All of them use the thiserror crate for ergonomic error definitions.
 */

use std::path::PathBuf;

use thiserror::Error;

/// Fatal configuration errors. No registry is produced when one of these occurs.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration document could not be read
    #[error("Config file {path:?} could not be read: {reason}")]
    Unreadable {
        /// Path of the configuration document
        path: PathBuf,
        /// Underlying I/O failure
        reason: String,
    },

    /// The configuration document is not valid JSON for the expected shape
    #[error("Config file format broken ({path:?}): {reason}")]
    Malformed {
        /// Path of the configuration document
        path: PathBuf,
        /// Parser failure
        reason: String,
    },

    /// The `models` list is absent from the configuration document
    #[error("Model specification list ('models') not found in configuration")]
    MissingModels,

    /// The models root directory does not exist
    #[error("`models` directory not found at {0:?}")]
    ModelsRootMissing(PathBuf),
}

/// Errors that cause a single model to be skipped during the registry build
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelLoadError {
    /// A required specification field is absent
    #[error("`{0}` not specified for a model")]
    MissingField(&'static str),

    /// The engine kind is not part of the supported set
    #[error("`model_type` not recognized: {0}")]
    UnsupportedModelType(String),

    /// A stage needs `model_path` but none was resolved
    #[error("{stage}: model_path not specified")]
    MissingModelPath {
        /// Stage that needed the model directory
        stage: &'static str,
    },

    /// A stage needs an engine-specific field that is absent
    #[error("{stage}: {field} not specified")]
    MissingAuxiliaryField {
        /// Stage that needed the field
        stage: &'static str,
        /// Name of the missing field
        field: &'static str,
    },

    /// An auxiliary file referenced by the specification does not exist
    #[error("{stage}: file not found at {path:?}")]
    MissingAuxiliaryFile {
        /// Stage that needed the file
        stage: &'static str,
        /// Expected location
        path: PathBuf,
    },

    /// An auxiliary file exists but could not be loaded
    #[error("{stage}: failed to load {path:?}: {reason}")]
    AuxiliaryLoad {
        /// Stage that needed the file
        stage: &'static str,
        /// File location
        path: PathBuf,
        /// Loader failure
        reason: String,
    },

    /// The checkpoint identifier is not known for the engine kind
    #[error("checkpoint `{checkpoint}` is not a known {engine} checkpoint")]
    InvalidCheckpoint {
        /// Engine kind
        engine: String,
        /// Offending checkpoint id
        checkpoint: String,
    },

    /// The inference engine never reported the model as served
    #[error("engine model `{model}` unavailable: {reason}")]
    EngineUnavailable {
        /// Engine-side model name
        model: String,
        /// Why the readiness check failed
        reason: String,
    },
}

/// Errors reported by a translation engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The request never produced a response
    #[error("Engine request failed: {0}")]
    RequestFailed(String),

    /// The engine answered with a non-success status
    #[error("Engine responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Body returned by the engine
        message: String,
    },

    /// The engine response could not be decoded
    #[error("Failed to parse engine response: {0}")]
    ParseError(String),

    /// The engine returned a batch of a different size than it was given
    #[error("Engine returned {actual} segments for a batch of {expected}")]
    LengthMismatch {
        /// Input batch size
        expected: usize,
        /// Output batch size
        actual: usize,
    },
}

/// Errors that can occur while serving a translation request
#[derive(Error, Debug)]
pub enum TranslationError {
    /// The identifier is not present in the registry
    #[error("Model {0} is not loaded")]
    UnknownModel(String),

    /// No model serves the requested language pair
    #[error("Language pair {0} is not supported")]
    UnsupportedPair(String),

    /// The engine of a model failed while translating
    #[error("Translation with {model} failed: {source}")]
    Engine {
        /// Identifier of the model whose engine failed
        model: String,
        /// Engine failure
        #[source]
        source: EngineError,
    },

    /// A pivot model changed the number of segments
    #[error("Pivot {pivot} returned {actual} segments for a batch of {expected}")]
    PivotLengthMismatch {
        /// Pivot model identifier
        pivot: String,
        /// Input batch size
        expected: usize,
        /// Output batch size
        actual: usize,
    },
}

impl TranslationError {
    /// Whether the failure is the caller's fault (unknown pair or model)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::UnknownModel(_) | Self::UnsupportedPair(_))
    }
}

/// Request-level error with an HTTP-style status, consumed by a front end
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The request cannot be served by any loaded model
    #[error("{0}")]
    NotSupported(TranslationError),

    /// The request was routed but translation failed
    #[error("{0}")]
    TranslationFailed(TranslationError),
}

impl GatewayError {
    /// Status code a front end should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotSupported(_) => 404,
            Self::TranslationFailed(_) => 500,
        }
    }

    /// Whether the failure is the caller's fault
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::NotSupported(_))
    }
}

impl From<TranslationError> for GatewayError {
    fn from(error: TranslationError) -> Self {
        if error.is_client_error() {
            Self::NotSupported(error)
        } else {
            Self::TranslationFailed(error)
        }
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Fatal configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error from a request
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
