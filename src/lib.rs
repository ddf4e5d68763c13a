/*!
 * # mtgateway - multi-backend machine translation gateway
 *
 * Selects a translation pipeline for a `(src, tgt, text)` request from a
 * declarative model registry, then runs it.
 *
 * ## Features
 *
 * - Declarative model configuration (JSON), validated per model: a broken
 *   entry is skipped with a warning, the rest still loads
 * - Fixed-order pipelines: sentence splitting, lowercasing, tokenization,
 *   subword segmentation, translation and the matching inverse stages
 * - Pivot chains running other models before or after the core translation
 * - Multilingual models as a fallback for pairs without a bilingual model
 * - Remote inference engines with a bounded readiness check
 * - Queued background jobs on registries scoped to a single model
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Runtime settings and the configuration document
 * - `model_id`: Model identifiers
 * - `stages`: Stage traits, built-in text stages and the stage factory
 * - `engines`: Dummy and remote translation engines
 * - `registry`: Pipeline compiler, pivot chains and the model registry
 * - `resolver`: Language tag mapping and model selection
 * - `dispatcher`: Pipeline execution
 * - `gateway`: Request and response types and the request facade
 * - `jobs`: Background job queue
 * - `language_utils`: Language code utilities
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod dispatcher;
pub mod engines;
pub mod errors;
pub mod gateway;
pub mod jobs;
pub mod language_utils;
pub mod model_id;
pub mod registry;
pub mod resolver;
pub mod stages;

// Re-export main types for easier usage
pub use app_config::{ConfigDocument, ModelSpec, ModelType, Settings};
pub use dispatcher::Dispatcher;
pub use engines::BuiltinStages;
pub use errors::{AppError, ConfigError, EngineError, GatewayError, ModelLoadError, TranslationError};
pub use gateway::{Gateway, TranslationRequest, TranslationResponse};
pub use jobs::{JobQueue, JobStatus};
pub use language_utils::closest;
pub use model_id::ModelId;
pub use registry::{CompiledModel, Registry, RegistryBuilder};
pub use resolver::{resolve_pair, resolve_request};
pub use stages::{StageFactory, Translator};
