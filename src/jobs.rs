/*!
 * Queued translation jobs.
 *
 * Jobs are addressed by model identifier and run in the background. Each job
 * uses a registry scoped to its model (plus pivots), built on first use and
 * cached afterwards, so unrelated engines are never loaded. Builds for
 * different models run independently; concurrent jobs on one model share a
 * single build. There is no ordering guarantee between jobs.
 *
 * Finished statuses stay queryable until `JobQueue::take` collects them.
 */

use log::{error, info};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::app_config::ConfigDocument;
use crate::dispatcher::Dispatcher;
use crate::model_id::ModelId;
use crate::registry::{Registry, RegistryBuilder};
use crate::stages::StageFactory;

/// Poll interval of `JobQueue::wait`
const WAIT_INTERVAL: Duration = Duration::from_millis(10);

/// Result of a finished job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobOutput {
    Text(String),
    Batch(Vec<String>),
}

/// State of a queued job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "result", rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Success(JobOutput),
    Failure(String),
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

enum JobInput {
    Text(String),
    Batch(Vec<String>),
}

struct QueueInner {
    document: ConfigDocument,
    models_root: PathBuf,
    factory: Arc<dyn StageFactory>,
    registries: Mutex<HashMap<ModelId, Arc<OnceCell<Arc<Registry>>>>>,
    jobs: RwLock<HashMap<Uuid, JobStatus>>,
}

/// Background translation queue
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<QueueInner>,
}

impl JobQueue {
    pub fn new(document: ConfigDocument, models_root: PathBuf, factory: Arc<dyn StageFactory>) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                document,
                models_root,
                factory,
                registries: Mutex::new(HashMap::new()),
                jobs: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Queue a single text; returns the job id
    pub fn submit(&self, model_id: ModelId, text: String, src: String, tgt: String) -> Uuid {
        self.spawn(model_id, JobInput::Text(text), src, tgt)
    }

    /// Queue a batch of texts; returns the job id
    pub fn submit_batch(&self, model_id: ModelId, texts: Vec<String>, src: String, tgt: String) -> Uuid {
        self.spawn(model_id, JobInput::Batch(texts), src, tgt)
    }

    /// Current status, `None` for ids this queue never issued
    pub fn status(&self, id: &Uuid) -> Option<JobStatus> {
        self.inner.jobs.read().get(id).cloned()
    }

    /// Remove and return the status of a finished job. A pending job stays
    /// queued and `Some(JobStatus::Pending)` is returned.
    pub fn take(&self, id: &Uuid) -> Option<JobStatus> {
        let mut jobs = self.inner.jobs.write();
        if !jobs.get(id)?.is_finished() {
            return Some(JobStatus::Pending);
        }
        jobs.remove(id)
    }

    /// Wait until the job finishes
    pub async fn wait(&self, id: &Uuid) -> Option<JobStatus> {
        loop {
            match self.status(id) {
                Some(JobStatus::Pending) => tokio::time::sleep(WAIT_INTERVAL).await,
                other => return other,
            }
        }
    }

    fn spawn(&self, model_id: ModelId, input: JobInput, src: String, tgt: String) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.jobs.write().insert(id, JobStatus::Pending);

        let queue = self.clone();
        tokio::spawn(async move {
            let status = match queue.run(&model_id, input, &src, &tgt).await {
                Ok(output) => JobStatus::Success(output),
                Err(e) => {
                    error!("Job {} on model {} failed: {}", id, model_id, e);
                    JobStatus::Failure(e.to_string())
                }
            };
            queue.inner.jobs.write().insert(id, status);
        });

        id
    }

    async fn run(&self, model_id: &ModelId, input: JobInput, src: &str, tgt: &str) -> anyhow::Result<JobOutput> {
        let registry = self.scoped_registry(model_id).await?;
        let dispatcher = Dispatcher::new(registry);

        let output = match input {
            JobInput::Text(text) => JobOutput::Text(dispatcher.translate(model_id, &text, src, tgt).await?),
            JobInput::Batch(texts) => JobOutput::Batch(dispatcher.translate_batch(model_id, &texts, src, tgt).await?),
        };
        Ok(output)
    }

    /// Build the registry scoped to `model_id` once and reuse it afterwards.
    /// The map lock only guards the per-model cell, never the build itself.
    async fn scoped_registry(&self, model_id: &ModelId) -> anyhow::Result<Arc<Registry>> {
        let cell = self.inner.registries.lock().entry(model_id.clone()).or_default().clone();

        let registry = cell
            .get_or_try_init(|| async {
                info!("Loading registry scoped to model {}", model_id);
                RegistryBuilder::new(&self.inner.models_root, self.inner.factory.as_ref())
                    .scoped(model_id.clone())
                    .quiet(true)
                    .build(&self.inner.document)
                    .await
                    .map(Arc::new)
            })
            .await?;
        Ok(registry.clone())
    }
}
