/*!
 * Stage library.
 *
 * Every pipeline stage is one of three shapes:
 * - `SentenceSegmenter`: text to an ordered list of sentences
 * - `TextProcessor`: one sentence to one sentence (pre- and postprocessors)
 * - `Translator`: a batch of sentences to a batch of the same length
 *
 * Stages are built through a `StageFactory`. The text stages have built-in
 * defaults; engines are supplied by the factory implementation, so tests and
 * embedders can swap translation backends without touching the compiler.
 */

use async_trait::async_trait;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::ModelType;
use crate::errors::{EngineError, ModelLoadError};

pub mod segmenters;
pub mod text;

pub use segmenters::{
    BpeDesegmenter, BpeSegmenter, PunctuationSetSegmenter, RuleSentenceSegmenter,
    SentencePieceDesegmenter, SentencePieceSegmenter,
};
pub use text::{Lowercaser, Recaser, TokenDesegmenter, TokenSegmenter, WordDetokenizer, WordTokenizer};

/// Splits a text into sentences, preserving order
pub trait SentenceSegmenter: Send + Sync + Debug {
    fn segment(&self, text: &str) -> Vec<String>;
}

/// Transforms a single sentence
pub trait TextProcessor: Send + Sync + Debug {
    fn process(&self, text: &str) -> String;
}

/// Common trait for all translation engines
///
/// Engines receive the whole batch at once and must return exactly one output
/// per input, in input order. Failures are reported as values, never as panics.
#[async_trait]
pub trait Translator: Send + Sync + Debug {
    /// Translate a batch of sentences from `src` to `tgt`
    async fn translate(&self, batch: Vec<String>, src: &str, tgt: &str) -> Result<Vec<String>, EngineError>;
}

/// Sentence splitting strategy after validation
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentKind {
    /// Rule based splitting on terminal punctuation
    Nltk,
    /// Cut after any of the given characters
    Boundaries(Vec<char>),
}

/// Subword segmentation scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubwordKind {
    Bpe,
    SentencePiece,
}

/// Everything an engine constructor needs to know about a model
#[derive(Debug, Clone)]
pub struct EngineSpec {
    /// Identifier of the owning model, for diagnostics
    pub model_id: String,
    pub model_type: ModelType,
    pub src: String,
    pub tgt: String,
    /// Resolved model directory, if any
    pub model_dir: Option<PathBuf>,
    pub checkpoint_id: Option<String>,
    pub engine_model_name: Option<String>,
}

/// Constructors for every stage kind.
///
/// Only `translator` has no default: text stages fall back to the built-in
/// implementations of this module.
#[async_trait]
pub trait StageFactory: Send + Sync {
    /// Build the translation engine for a model
    async fn translator(&self, spec: &EngineSpec) -> Result<Arc<dyn Translator>, ModelLoadError>;

    fn sentence_segmenter(&self, kind: &SegmentKind) -> Result<Arc<dyn SentenceSegmenter>, ModelLoadError> {
        Ok(match kind {
            SegmentKind::Nltk => Arc::new(RuleSentenceSegmenter::new()),
            SegmentKind::Boundaries(chars) => Arc::new(PunctuationSetSegmenter::new(chars.clone())),
        })
    }

    fn lowercaser(&self) -> Result<Arc<dyn TextProcessor>, ModelLoadError> {
        Ok(Arc::new(Lowercaser))
    }

    fn word_tokenizer(&self, lang: &str) -> Result<Arc<dyn TextProcessor>, ModelLoadError> {
        Ok(Arc::new(WordTokenizer::new(lang)))
    }

    fn word_detokenizer(&self, lang: &str) -> Result<Arc<dyn TextProcessor>, ModelLoadError> {
        Ok(Arc::new(WordDetokenizer::new(lang)))
    }

    fn subword_segmenter(&self, kind: SubwordKind, model_file: &Path) -> Result<Arc<dyn TextProcessor>, ModelLoadError> {
        Ok(match kind {
            SubwordKind::Bpe => Arc::new(BpeSegmenter::from_file(model_file)?),
            SubwordKind::SentencePiece => Arc::new(SentencePieceSegmenter::from_file(model_file)?),
        })
    }

    /// `model_file` is the target-side model; BPE needs none
    fn subword_desegmenter(&self, kind: SubwordKind, model_file: Option<&Path>) -> Result<Arc<dyn TextProcessor>, ModelLoadError> {
        Ok(match (kind, model_file) {
            (SubwordKind::Bpe, _) => Arc::new(BpeDesegmenter),
            (SubwordKind::SentencePiece, Some(file)) => Arc::new(SentencePieceDesegmenter::from_file(file)?),
            (SubwordKind::SentencePiece, None) => {
                return Err(ModelLoadError::MissingAuxiliaryField {
                    stage: "desentencepiece",
                    field: "tgt_sentencepiece_model",
                });
            }
        })
    }

    fn token_segmenter(&self) -> Result<Arc<dyn TextProcessor>, ModelLoadError> {
        Ok(Arc::new(TokenSegmenter))
    }

    fn token_desegmenter(&self) -> Result<Arc<dyn TextProcessor>, ModelLoadError> {
        Ok(Arc::new(TokenDesegmenter))
    }

    fn recaser(&self) -> Result<Arc<dyn TextProcessor>, ModelLoadError> {
        Ok(Arc::new(Recaser))
    }
}
