/*!
 * Translation dispatcher.
 *
 * Runs a compiled pipeline over one text:
 * 1. split into sentences (or keep the text as a single sentence)
 * 2. pre-translate pivot chain
 * 3. preprocessors, per sentence
 * 4. core translation of the whole batch
 * 5. postprocessors, per sentence
 * 6. post-translate pivot chain
 * 7. join the sentences with single spaces
 *
 * Sentence order is preserved end to end; every engine call must return one
 * output per input.
 */

use futures::future::try_join_all;
use log::debug;
use std::sync::Arc;

use crate::errors::{EngineError, TranslationError};
use crate::model_id::ModelId;
use crate::registry::{CompiledModel, Registry};
use crate::stages::TextProcessor;

/// Executes compiled pipelines from a shared registry
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn model(&self, id: &ModelId) -> Result<&CompiledModel, TranslationError> {
        self.registry
            .get(id)
            .ok_or_else(|| TranslationError::UnknownModel(id.to_string()))
    }

    /// Translate `text` with the model registered under `id`
    pub async fn translate(&self, id: &ModelId, text: &str, src: &str, tgt: &str) -> Result<String, TranslationError> {
        let model = self.model(id)?;

        let mut batch = match &model.sentence_segmenter {
            Some(segmenter) => segmenter.segment(text),
            None => vec![text.to_string()],
        };
        if batch.is_empty() {
            return Ok(String::new());
        }
        debug!("Model {} translating {} sentences", id, batch.len());

        batch = self.run_chain(&model.pretranslatechain, batch, src, tgt).await?;
        batch = apply(&model.preprocessors, batch);

        if let Some(translator) = &model.translator {
            let expected = batch.len();
            let output = translator
                .translate(batch, src, tgt)
                .await
                .map_err(|source| TranslationError::Engine {
                    model: id.to_string(),
                    source,
                })?;
            if output.len() != expected {
                return Err(TranslationError::Engine {
                    model: id.to_string(),
                    source: EngineError::LengthMismatch {
                        expected,
                        actual: output.len(),
                    },
                });
            }
            batch = output;
        }

        batch = apply(&model.postprocessors, batch);
        batch = self.run_chain(&model.posttranslatechain, batch, src, tgt).await?;

        Ok(batch.join(" "))
    }

    /// Translate every text independently, keeping input order
    pub async fn translate_batch(&self, id: &ModelId, texts: &[String], src: &str, tgt: &str) -> Result<Vec<String>, TranslationError> {
        self.model(id)?;
        try_join_all(texts.iter().map(|text| self.translate(id, text, src, tgt))).await
    }

    /// Push the batch through the translator of every pivot, in order
    async fn run_chain(&self, chain: &[ModelId], mut batch: Vec<String>, src: &str, tgt: &str) -> Result<Vec<String>, TranslationError> {
        for pivot_id in chain {
            let pivot = self.model(pivot_id)?;
            let Some(translator) = &pivot.translator else {
                continue;
            };

            let expected = batch.len();
            batch = translator
                .translate(batch, src, tgt)
                .await
                .map_err(|source| TranslationError::Engine {
                    model: pivot_id.to_string(),
                    source,
                })?;
            if batch.len() != expected {
                return Err(TranslationError::PivotLengthMismatch {
                    pivot: pivot_id.to_string(),
                    expected,
                    actual: batch.len(),
                });
            }
        }
        Ok(batch)
    }
}

fn apply(processors: &[Arc<dyn TextProcessor>], batch: Vec<String>) -> Vec<String> {
    if processors.is_empty() {
        return batch;
    }
    batch
        .into_iter()
        .map(|sentence| {
            processors
                .iter()
                .fold(sentence, |current, processor| processor.process(&current))
        })
        .collect()
}
