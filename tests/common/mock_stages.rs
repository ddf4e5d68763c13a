/*!
 * Mock stage factory for testing
 *
 * Builds in-process translators with scripted behaviour so registries can be
 * compiled and exercised without any inference service. Every translate call
 * is counted, which lets tests check that no engine was reached.
 */

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mtgateway::errors::{EngineError, ModelLoadError};
use mtgateway::stages::{EngineSpec, StageFactory, Translator};

/// Scripted engine behaviour
#[derive(Debug, Clone, PartialEq)]
pub enum MockEngine {
    /// Returns the batch unchanged
    Identity,
    /// Uppercases every sentence
    Uppercase,
    /// Appends a marker to every sentence
    Suffix(String),
    /// Answers with an engine error
    Failing,
    /// Loses the last sentence of the batch
    Dropping,
    /// Cannot be constructed at all
    Unavailable,
}

/// Translator running a `MockEngine` script
#[derive(Debug)]
pub struct MockTranslator {
    engine: MockEngine,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, batch: Vec<String>, _src: &str, _tgt: &str) -> Result<Vec<String>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.engine {
            MockEngine::Identity | MockEngine::Unavailable => Ok(batch),
            MockEngine::Uppercase => Ok(batch.into_iter().map(|s| s.to_uppercase()).collect()),
            MockEngine::Suffix(marker) => Ok(batch.into_iter().map(|s| format!("{} {}", s, marker)).collect()),
            MockEngine::Failing => Err(EngineError::ApiError {
                status_code: 500,
                message: "mock engine failure".into(),
            }),
            MockEngine::Dropping => {
                let mut batch = batch;
                batch.pop();
                Ok(batch)
            }
        }
    }
}

/// Stage factory handing out mock translators per model id
#[derive(Debug, Default)]
pub struct MockStages {
    engines: HashMap<String, MockEngine>,
    build_delays: HashMap<String, Duration>,
    calls: Arc<AtomicUsize>,
    built: Arc<Mutex<Vec<String>>>,
}

impl MockStages {
    /// Factory where every model translates with `MockEngine::Identity`
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the engine of the model registered under `model_id`
    pub fn with_engine(mut self, model_id: &str, engine: MockEngine) -> Self {
        self.engines.insert(model_id.to_string(), engine);
        self
    }

    /// Make building the translator of `model_id` take `delay`
    pub fn with_build_delay(mut self, model_id: &str, delay: Duration) -> Self {
        self.build_delays.insert(model_id.to_string(), delay);
        self
    }

    /// Number of translate calls across all engines
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Model ids whose translator was built, in build order
    pub fn built_models(&self) -> Vec<String> {
        self.built.lock().unwrap().clone()
    }
}

#[async_trait]
impl StageFactory for MockStages {
    async fn translator(&self, spec: &EngineSpec) -> Result<Arc<dyn Translator>, ModelLoadError> {
        if let Some(delay) = self.build_delays.get(&spec.model_id) {
            tokio::time::sleep(*delay).await;
        }
        let engine = self.engines.get(&spec.model_id).cloned().unwrap_or(MockEngine::Identity);
        if engine == MockEngine::Unavailable {
            return Err(ModelLoadError::EngineUnavailable {
                model: spec.model_id.clone(),
                reason: "mock engine unavailable".into(),
            });
        }

        self.built.lock().unwrap().push(spec.model_id.clone());
        Ok(Arc::new(MockTranslator {
            engine,
            calls: self.calls.clone(),
        }))
    }
}
