use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;

use crate::errors::{EngineError, ModelLoadError};
use crate::stages::Translator;

/// Client for a separately hosted inference service
#[derive(Debug, Clone)]
pub struct RemoteTranslator {
    /// HTTP client for making requests
    client: Client,
    /// Full prediction URL of the served model
    endpoint: String,
    /// Name the engine serves the model under
    model_name: String,
}

/// Language pair forwarded with every batch
#[derive(Debug, Serialize, Deserialize)]
pub struct AdditionalInfo {
    pub src: String,
    pub tgt: String,
}

/// Prediction request body
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictionRequest {
    /// Sentences to translate
    pub sample: Vec<String>,
    pub additional_info: AdditionalInfo,
}

/// Prediction response body
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub translation: Vec<String>,
}

/// Management listing of served models
#[derive(Debug, Deserialize)]
struct ModelListing {
    models: Vec<ServedModel>,
}

#[derive(Debug, Deserialize)]
struct ServedModel {
    #[serde(rename = "modelName")]
    model_name: String,
}

impl RemoteTranslator {
    /// Create a translator posting to `<base_url>/predictions/<model_name>`
    pub fn new(client: Client, base_url: &str, model_name: impl Into<String>) -> Self {
        let model_name = model_name.into();
        Self {
            client,
            endpoint: format!("{}/predictions/{}", base_url.trim_end_matches('/'), model_name),
            model_name,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[async_trait]
impl Translator for RemoteTranslator {
    async fn translate(&self, batch: Vec<String>, src: &str, tgt: &str) -> Result<Vec<String>, EngineError> {
        let request = PredictionRequest {
            sample: batch,
            additional_info: AdditionalInfo {
                src: src.to_string(),
                tgt: tgt.to_string(),
            },
        };

        let response = self.client.post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Engine {} error ({}): {}", self.model_name, status, message);
            return Err(EngineError::ApiError {
                status_code: status.as_u16(),
                message,
            });
        }

        let body = response.json::<PredictionResponse>().await
            .map_err(|e| EngineError::ParseError(e.to_string()))?;

        Ok(body.translation)
    }
}

/// Bounded readiness check against the engine management API
#[derive(Debug, Clone)]
pub struct ReadinessProbe {
    client: Client,
    management_url: String,
    max_attempts: u32,
    interval: Duration,
    cancel: Option<watch::Receiver<bool>>,
}

impl ReadinessProbe {
    pub fn new(client: Client, management_url: &str, max_attempts: u32, interval: Duration) -> Self {
        Self {
            client,
            management_url: management_url.trim_end_matches('/').to_string(),
            max_attempts: max_attempts.max(1),
            interval,
            cancel: None,
        }
    }

    /// Abort polling as soon as `true` is sent on the channel
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Wait until the engine lists `model_name` among its served models
    pub async fn wait_until_served(&self, model_name: &str) -> Result<(), ModelLoadError> {
        let url = format!("{}/models", self.management_url);
        let unavailable = |reason: String| ModelLoadError::EngineUnavailable {
            model: model_name.to_string(),
            reason,
        };

        for attempt in 1..=self.max_attempts {
            if self.is_cancelled() {
                return Err(unavailable("readiness check cancelled".to_string()));
            }

            match self.client.get(&url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        return Err(unavailable(format!("management API answered {}", status)));
                    }
                    let listing = response.json::<ModelListing>().await
                        .map_err(|e| unavailable(format!("invalid model listing: {}", e)))?;
                    return if listing.models.iter().any(|m| m.model_name == model_name) {
                        Ok(())
                    } else {
                        Err(unavailable("model not served by the engine".to_string()))
                    };
                }
                Err(e) => {
                    debug!("Engine not reachable for {} (attempt {}/{}): {}", model_name, attempt, self.max_attempts, e);
                }
            }

            if attempt < self.max_attempts {
                self.pause().await?;
            }
        }

        Err(unavailable(format!("no answer after {} attempts", self.max_attempts)))
    }

    async fn pause(&self) -> Result<(), ModelLoadError> {
        match &self.cancel {
            Some(rx) => {
                let mut rx = rx.clone();
                tokio::select! {
                    _ = tokio::time::sleep(self.interval) => Ok(()),
                    changed = rx.changed() => {
                        // A dropped sender means nobody can cancel any more
                        if changed.is_err() {
                            tokio::time::sleep(self.interval).await;
                        }
                        Ok(())
                    }
                }
            }
            None => {
                tokio::time::sleep(self.interval).await;
                Ok(())
            }
        }
    }
}
