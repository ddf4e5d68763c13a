/*!
 * Pipeline compiler.
 *
 * Turns one declarative `ModelSpec` into a `CompiledModel`. Compilation happens
 * in two steps:
 * - the validated spec is planned into an ordered list of `StageDescriptor`s
 * - the plan is executed against a `StageFactory`, building every stage
 *
 * A model is only produced if every stage of its plan was built.
 */

use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::chains::{resolve_chain, ChainDirection};
use crate::app_config::{ModelSpec, ModelType, SentenceSplit};
use crate::errors::ModelLoadError;
use crate::model_id::{ModelId, MULTI};
use crate::stages::{
    EngineSpec, SegmentKind, SentenceSegmenter, StageFactory, SubwordKind, TextProcessor, Translator,
};

/// One step of a model pipeline, in execution order
#[derive(Debug, Clone, PartialEq)]
pub enum StageDescriptor {
    Segment(SegmentKind),
    Lowercase,
    Tokenize,
    SubwordSegment(SubwordKind),
    /// Whitespace tokenization for token-based engines without a subword scheme
    BareTokenize,
    Translate(ModelType),
    SubwordDesegment(SubwordKind),
    BareDetokenize,
    Detokenize,
    Recase,
}

impl StageDescriptor {
    /// Diagnostic label of the stage; bare token stages have none
    pub fn label(&self) -> Option<String> {
        let label = match self {
            Self::Segment(SegmentKind::Nltk) => "sentence_split-nltk".to_string(),
            Self::Segment(SegmentKind::Boundaries(_)) => "sentence_split-custom".to_string(),
            Self::Lowercase => "lowercase".to_string(),
            Self::Tokenize => "mtokenize".to_string(),
            Self::SubwordSegment(SubwordKind::Bpe) => "bpe".to_string(),
            Self::SubwordSegment(SubwordKind::SentencePiece) => "sentencepiece".to_string(),
            Self::Translate(model_type) => format!("translate-{}", model_type.translate_label()),
            Self::SubwordDesegment(SubwordKind::Bpe) => "unbpe".to_string(),
            Self::SubwordDesegment(SubwordKind::SentencePiece) => "desentencepiece".to_string(),
            Self::Detokenize => "mdetokenize".to_string(),
            Self::Recase => "recase".to_string(),
            Self::BareTokenize | Self::BareDetokenize => return None,
        };
        Some(label)
    }

    /// Whether the stage runs after the core translation
    pub fn is_postprocessing(&self) -> bool {
        matches!(
            self,
            Self::SubwordDesegment(_) | Self::BareDetokenize | Self::Detokenize | Self::Recase
        )
    }
}

/// Runtime form of a model specification
#[derive(Debug, Clone)]
pub struct CompiledModel {
    pub id: ModelId,
    pub src: String,
    pub tgt: String,
    pub model_type: ModelType,
    pub multilingual: bool,
    /// Pairs served by a multilingual model (alt carries the owning model's alt)
    pub supported_pairs: Vec<ModelId>,
    pub sentence_segmenter: Option<Arc<dyn SentenceSegmenter>>,
    pub preprocessors: Vec<Arc<dyn TextProcessor>>,
    pub translator: Option<Arc<dyn Translator>>,
    pub postprocessors: Vec<Arc<dyn TextProcessor>>,
    pub pretranslatechain: Vec<ModelId>,
    pub posttranslatechain: Vec<ModelId>,
    /// Plan the model was built from
    pub stages: Vec<StageDescriptor>,
}

impl CompiledModel {
    /// Human readable description of the pipeline
    pub fn describe(&self) -> String {
        let mut parts = vec![format!("Model: {} (", self.id)];
        parts.extend(self.stages.iter().filter_map(StageDescriptor::label));
        parts.push(")".to_string());
        parts.join(" ")
    }
}

/// Outcome of compiling a single specification
#[derive(Debug)]
pub struct Compilation {
    pub outcome: Result<CompiledModel, ModelLoadError>,
    /// Soft-check warnings, emitted whatever the outcome
    pub warnings: Vec<String>,
}

/// Fields every specification must carry, after validation
#[derive(Debug)]
struct ValidatedSpec<'a> {
    spec: &'a ModelSpec,
    id: ModelId,
    src: String,
    tgt: String,
    model_type: ModelType,
    model_dir: Option<PathBuf>,
}

/// Compiles specifications against a models root and a stage factory
pub struct PipelineCompiler<'a> {
    models_root: &'a Path,
    factory: &'a dyn StageFactory,
    language_names: &'a BTreeMap<String, String>,
    active: &'a BTreeSet<ModelId>,
}

impl<'a> PipelineCompiler<'a> {
    /// `active` holds the identifiers pivots may reference
    pub fn new(
        models_root: &'a Path,
        factory: &'a dyn StageFactory,
        language_names: &'a BTreeMap<String, String>,
        active: &'a BTreeSet<ModelId>,
    ) -> Self {
        Self {
            models_root,
            factory,
            language_names,
            active,
        }
    }

    /// Compile one specification
    pub async fn compile(&self, spec: &ModelSpec) -> Compilation {
        let mut warnings = Vec::new();
        let outcome = self.compile_inner(spec, &mut warnings).await;
        Compilation { outcome, warnings }
    }

    async fn compile_inner(&self, spec: &ModelSpec, warnings: &mut Vec<String>) -> Result<CompiledModel, ModelLoadError> {
        let validated = self.validate(spec, warnings)?;
        let plan = plan_stages(&validated, warnings);
        debug!("Planned {} stages for model {}", plan.len(), validated.id);

        let mut model = CompiledModel {
            id: validated.id.clone(),
            src: validated.src.clone(),
            tgt: validated.tgt.clone(),
            model_type: validated.model_type.clone(),
            multilingual: spec.multilingual,
            supported_pairs: Vec::new(),
            sentence_segmenter: None,
            preprocessors: Vec::new(),
            translator: None,
            postprocessors: Vec::new(),
            pretranslatechain: Vec::new(),
            posttranslatechain: Vec::new(),
            stages: Vec::new(),
        };

        for stage in &plan {
            match stage {
                StageDescriptor::Segment(kind) => {
                    model.sentence_segmenter = Some(self.factory.sentence_segmenter(kind)?);
                }
                StageDescriptor::Translate(_) => {
                    model.translator = Some(self.factory.translator(&engine_spec(&validated)).await?);
                }
                other => {
                    let Some(processor) = self.build_processor(other, &validated)? else { continue };
                    if other.is_postprocessing() {
                        model.postprocessors.push(processor);
                    } else {
                        model.preprocessors.push(processor);
                    }
                }
            }
        }
        model.stages = plan;

        for (direction, declared, chain) in [
            (ChainDirection::Pre, &spec.pretranslatechain, &mut model.pretranslatechain),
            (ChainDirection::Post, &spec.posttranslatechain, &mut model.posttranslatechain),
        ] {
            let (resolved, warning) = resolve_chain(&validated.id, direction, declared, self.active);
            warnings.extend(warning);
            *chain = resolved;
        }

        if spec.multilingual {
            model.supported_pairs = self.supported_pairs(&validated, warnings);
        }

        Ok(model)
    }

    fn validate<'s>(&self, spec: &'s ModelSpec, warnings: &mut Vec<String>) -> Result<ValidatedSpec<'s>, ModelLoadError> {
        let (src, tgt) = if spec.multilingual {
            (MULTI.to_string(), MULTI.to_string())
        } else {
            (
                spec.src.clone().ok_or(ModelLoadError::MissingField("src"))?,
                spec.tgt.clone().ok_or(ModelLoadError::MissingField("tgt"))?,
            )
        };
        let model_type = spec.model_type.clone().ok_or(ModelLoadError::MissingField("model_type"))?;
        if !model_type.is_supported() {
            return Err(ModelLoadError::UnsupportedModelType(model_type.to_string()));
        }

        let id = ModelId::new(src.as_str(), tgt.as_str(), spec.alt.as_deref());

        let model_dir = match &spec.model_path {
            Some(path) => {
                let dir = self.models_root.join(path);
                if !dir.is_dir() {
                    warnings.push(format!("Model path {:?} not found for model {}.", dir, id));
                }
                Some(dir)
            }
            None => {
                warnings.push(format!(
                    "Model path not specified for model {}. Can't load custom translation model or segmenters.",
                    id
                ));
                None
            }
        };

        if spec.pipeline.bpe && spec.pipeline.sentencepiece {
            warnings.push(format!(
                "Model {} has both sentencepiece and bpe setup. Using bpe.",
                id
            ));
        }

        if !spec.multilingual {
            for code in [&src, &tgt] {
                if !self.language_names.contains_key(code) {
                    warnings.push(format!(
                        "Language code `{}` not defined in languages dict. Model {} is still loaded.",
                        code, id
                    ));
                }
            }
        }

        Ok(ValidatedSpec {
            spec,
            id,
            src,
            tgt,
            model_type,
            model_dir,
        })
    }

    /// Build a per-sentence stage; segmenters and translators are not processors
    fn build_processor(&self, stage: &StageDescriptor, validated: &ValidatedSpec) -> Result<Option<Arc<dyn TextProcessor>>, ModelLoadError> {
        let spec = validated.spec;
        let processor = match stage {
            StageDescriptor::Lowercase => self.factory.lowercaser(),
            StageDescriptor::Tokenize => self.factory.word_tokenizer(&validated.src),
            StageDescriptor::Detokenize => self.factory.word_detokenizer(&validated.tgt),
            StageDescriptor::BareTokenize => self.factory.token_segmenter(),
            StageDescriptor::BareDetokenize => self.factory.token_desegmenter(),
            StageDescriptor::Recase => self.factory.recaser(),
            StageDescriptor::SubwordSegment(SubwordKind::Bpe) => {
                let file = auxiliary_file(validated, "bpe", "bpe_file", spec.bpe_file.as_deref())?;
                self.factory.subword_segmenter(SubwordKind::Bpe, &file)
            }
            StageDescriptor::SubwordSegment(SubwordKind::SentencePiece) => {
                let file = auxiliary_file(
                    validated,
                    "sentencepiece",
                    "src_sentencepiece_model",
                    spec.src_sentencepiece_model.as_deref(),
                )?;
                self.factory.subword_segmenter(SubwordKind::SentencePiece, &file)
            }
            StageDescriptor::SubwordDesegment(SubwordKind::Bpe) => {
                self.factory.subword_desegmenter(SubwordKind::Bpe, None)
            }
            StageDescriptor::SubwordDesegment(SubwordKind::SentencePiece) => {
                let file = auxiliary_file(
                    validated,
                    "desentencepiece",
                    "tgt_sentencepiece_model",
                    spec.tgt_sentencepiece_model.as_deref(),
                )?;
                self.factory.subword_desegmenter(SubwordKind::SentencePiece, Some(&file))
            }
            StageDescriptor::Segment(_) | StageDescriptor::Translate(_) => return Ok(None),
        }?;
        Ok(Some(processor))
    }

    fn supported_pairs(&self, validated: &ValidatedSpec, warnings: &mut Vec<String>) -> Vec<ModelId> {
        let alt = validated.spec.alt.as_deref();
        validated
            .spec
            .supported_pairs
            .iter()
            .filter_map(|pair| match ModelId::parse(pair) {
                Some(parsed) if parsed.alt.is_none() => Some(ModelId::new(parsed.src, parsed.tgt, alt)),
                _ => {
                    warnings.push(format!(
                        "Supported pair `{}` of model {} is not a `src-tgt` pair. Skipping it.",
                        pair, validated.id
                    ));
                    None
                }
            })
            .collect()
    }
}

/// Build the ordered stage plan of a validated specification
fn plan_stages(validated: &ValidatedSpec, warnings: &mut Vec<String>) -> Vec<StageDescriptor> {
    let spec = validated.spec;
    let flags = &spec.pipeline;
    let token_based = validated.model_type == ModelType::CTranslator2;
    let mut plan = Vec::new();

    if let Some(kind) = segment_kind(spec, &validated.id, warnings) {
        plan.push(StageDescriptor::Segment(kind));
    }
    if flags.lowercase {
        plan.push(StageDescriptor::Lowercase);
    }
    if flags.tokenize {
        plan.push(StageDescriptor::Tokenize);
    }

    let subword = if flags.bpe {
        Some(SubwordKind::Bpe)
    } else if flags.sentencepiece {
        Some(SubwordKind::SentencePiece)
    } else {
        None
    };

    match subword {
        Some(kind) => plan.push(StageDescriptor::SubwordSegment(kind)),
        None if token_based => plan.push(StageDescriptor::BareTokenize),
        None => {}
    }
    if flags.translate {
        plan.push(StageDescriptor::Translate(validated.model_type.clone()));
    }
    match subword {
        Some(kind) => plan.push(StageDescriptor::SubwordDesegment(kind)),
        None if token_based => plan.push(StageDescriptor::BareDetokenize),
        None => {}
    }

    if flags.tokenize {
        plan.push(StageDescriptor::Detokenize);
    }
    if flags.recase {
        plan.push(StageDescriptor::Recase);
    }

    plan
}

fn segment_kind(spec: &ModelSpec, id: &ModelId, warnings: &mut Vec<String>) -> Option<SegmentKind> {
    match spec.sentence_split.as_ref()? {
        SentenceSplit::Named(name) if name == "nltk" => Some(SegmentKind::Nltk),
        SentenceSplit::Named(name) => {
            warnings.push(format!("Unknown sentence splitter `{}` for model {}. Not splitting sentences.", name, id));
            None
        }
        SentenceSplit::Boundaries(entries) => {
            let mut boundaries = Vec::with_capacity(entries.len());
            for entry in entries {
                let mut chars = entry.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => boundaries.push(c),
                    _ => warnings.push(format!(
                        "Sentence boundary `{}` of model {} is not a single character. Ignoring it.",
                        entry, id
                    )),
                }
            }
            Some(SegmentKind::Boundaries(boundaries))
        }
    }
}

fn auxiliary_file(
    validated: &ValidatedSpec,
    stage: &'static str,
    field: &'static str,
    name: Option<&str>,
) -> Result<PathBuf, ModelLoadError> {
    let dir = validated.model_dir.as_ref().ok_or(ModelLoadError::MissingModelPath { stage })?;
    let name = name.ok_or(ModelLoadError::MissingAuxiliaryField { stage, field })?;
    let path = dir.join(name);
    if !path.is_file() {
        return Err(ModelLoadError::MissingAuxiliaryFile { stage, path });
    }
    Ok(path)
}

fn engine_spec(validated: &ValidatedSpec) -> EngineSpec {
    EngineSpec {
        model_id: validated.id.to_string(),
        model_type: validated.model_type.clone(),
        src: validated.src.clone(),
        tgt: validated.tgt.clone(),
        model_dir: validated.model_dir.clone(),
        checkpoint_id: validated.spec.checkpoint_id.clone(),
        engine_model_name: validated.spec.engine_model_name.clone(),
    }
}
