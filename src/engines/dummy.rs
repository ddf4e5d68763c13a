use async_trait::async_trait;

use crate::errors::EngineError;
use crate::stages::Translator;

/// Identity engine, used for measurement and pipeline testing configurations
#[derive(Debug, Clone, Copy, Default)]
pub struct DummyTranslator;

#[async_trait]
impl Translator for DummyTranslator {
    async fn translate(&self, batch: Vec<String>, _src: &str, _tgt: &str) -> Result<Vec<String>, EngineError> {
        Ok(batch)
    }
}
