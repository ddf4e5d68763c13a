/*!
 * Translation engine adapters.
 *
 * `dummy` models translate in-process (identity). Every other engine kind is
 * served by a remote inference service and reached over HTTP:
 * - requests go to `<engine_url>/predictions/<engine model name>`
 * - before a remote model is accepted, the management API is polled until the
 *   model shows up in `<management_url>/models` (bounded, cancellable)
 */

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::app_config::{ModelType, Settings};
use crate::errors::ModelLoadError;
use crate::stages::{EngineSpec, StageFactory, Translator};

pub mod dummy;
pub mod remote;

pub use dummy::DummyTranslator;
pub use remote::{ReadinessProbe, RemoteTranslator};

/// Known NLLB checkpoints
pub const NLLB_CHECKPOINTS: [&str; 3] = [
    "nllb-200-distilled-1.3B",
    "nllb-200-distilled-600M",
    "nllb-200-3.3B",
];

/// Known M2M100 checkpoints
pub const M2M100_CHECKPOINTS: [&str; 2] = ["m2m100_418M", "m2m100_1.2B"];

/// Name the remote engine serves a model under
pub fn engine_model_name(spec: &EngineSpec) -> Result<String, ModelLoadError> {
    match &spec.model_type {
        ModelType::Opus => Ok(format!("opus-mt-{}-{}", spec.src, spec.tgt)),
        ModelType::OpusBig => Ok(format!("opus-mt-tc-big-{}-{}", spec.src, spec.tgt)),
        ModelType::M2m100 => checkpoint(spec, &M2M100_CHECKPOINTS),
        ModelType::Nllb => checkpoint(spec, &NLLB_CHECKPOINTS),
        ModelType::CTranslator2 | ModelType::Custom => {
            let dir = spec.model_dir.as_ref()
                .ok_or(ModelLoadError::MissingModelPath { stage: "translate" })?;
            if let Some(name) = &spec.engine_model_name {
                return Ok(name.clone());
            }
            dir.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or(ModelLoadError::MissingModelPath { stage: "translate" })
        }
        ModelType::Dummy => Ok(ModelType::Dummy.to_string()),
        ModelType::Unknown(other) => Err(ModelLoadError::UnsupportedModelType(other.clone())),
    }
}

fn checkpoint(spec: &EngineSpec, known: &[&str]) -> Result<String, ModelLoadError> {
    let checkpoint = spec.checkpoint_id.as_ref().ok_or(ModelLoadError::MissingAuxiliaryField {
        stage: "translate",
        field: "checkpoint_id",
    })?;
    if !known.contains(&checkpoint.as_str()) {
        return Err(ModelLoadError::InvalidCheckpoint {
            engine: spec.model_type.to_string(),
            checkpoint: checkpoint.clone(),
        });
    }
    Ok(checkpoint.clone())
}

/// Stage factory backed by the built-in text stages and the engine adapters
#[derive(Debug, Clone)]
pub struct BuiltinStages {
    settings: Settings,
    client: Client,
    cancel: Option<watch::Receiver<bool>>,
}

impl BuiltinStages {
    pub fn new(settings: Settings) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.engine_timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            settings,
            client,
            cancel: None,
        }
    }

    /// Stop pending readiness checks once `true` is sent on the channel
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn readiness_probe(&self) -> ReadinessProbe {
        let probe = ReadinessProbe::new(
            self.client.clone(),
            &self.settings.engine_management_url,
            self.settings.readiness_retries,
            Duration::from_millis(self.settings.readiness_interval_ms),
        );
        match &self.cancel {
            Some(cancel) => probe.with_cancellation(cancel.clone()),
            None => probe,
        }
    }
}

#[async_trait]
impl StageFactory for BuiltinStages {
    async fn translator(&self, spec: &EngineSpec) -> Result<Arc<dyn Translator>, ModelLoadError> {
        if spec.model_type == ModelType::Dummy {
            return Ok(Arc::new(DummyTranslator));
        }

        let name = engine_model_name(spec)?;
        debug!("Waiting for engine to serve {} for model {}", name, spec.model_id);
        self.readiness_probe().wait_until_served(&name).await?;

        Ok(Arc::new(RemoteTranslator::new(self.client.clone(), &self.settings.engine_url, name)))
    }
}

/// Run `work` with a cancellation flag that `signal` raises. The signal
/// listener is aborted as soon as `work` completes.
pub async fn with_cancellation_signal<S, W, Fut, T>(signal: S, work: W) -> T
where
    S: Future<Output = ()> + Send + 'static,
    W: FnOnce(watch::Receiver<bool>) -> Fut,
    Fut: Future<Output = T>,
{
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let listener = tokio::spawn(async move {
        signal.await;
        let _ = cancel_tx.send(true);
    });

    let output = work(cancel_rx).await;
    listener.abort();
    output
}
