/*!
 * Model registry.
 *
 * Drives the pipeline compiler over every specification of a configuration
 * document and collects the results into an immutable lookup structure:
 * - compiled models keyed by identifier (last write wins on duplicates)
 * - the language display-name table
 * - `languages_list`, the src -> tgt -> identifiers discovery index
 * - every warning and pipeline description produced while building
 *
 * Once built, a registry is never mutated. Share it behind an `Arc`.
 */

use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::app_config::{ConfigDocument, ModelSpec, Settings};
use crate::errors::ConfigError;
use crate::model_id::ModelId;
use crate::stages::StageFactory;

pub mod chains;
pub mod compiler;

pub use chains::{active_bilingual_ids, resolve_chain, ChainDirection};
pub use compiler::{Compilation, CompiledModel, PipelineCompiler, StageDescriptor};

/// Source code -> target code -> identifiers serving the pair
pub type LanguagesList = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// Immutable set of compiled models
#[derive(Debug, Default)]
pub struct Registry {
    models: BTreeMap<ModelId, CompiledModel>,
    language_codes: BTreeMap<String, String>,
    languages_list: LanguagesList,
    warnings: Vec<String>,
    messages: Vec<String>,
}

impl Registry {
    /// Build a registry from every loadable specification of `document`
    pub async fn build(document: &ConfigDocument, models_root: &Path, factory: &dyn StageFactory) -> Result<Self, ConfigError> {
        RegistryBuilder::new(models_root, factory).build(document).await
    }

    /// Build a registry holding only `id` and the pivots it references
    pub async fn build_scoped(
        document: &ConfigDocument,
        models_root: &Path,
        factory: &dyn StageFactory,
        id: &ModelId,
    ) -> Result<Self, ConfigError> {
        RegistryBuilder::new(models_root, factory)
            .scoped(id.clone())
            .build(document)
            .await
    }

    /// Load the configuration document named by the settings and build from it
    pub async fn from_settings(settings: &Settings, factory: &dyn StageFactory) -> Result<Self, ConfigError> {
        let document = ConfigDocument::load(&settings.config_path)?;
        Self::build(&document, &settings.models_root, factory).await
    }

    pub fn get(&self, id: &ModelId) -> Option<&CompiledModel> {
        self.models.get(id)
    }

    pub fn contains(&self, id: &ModelId) -> bool {
        self.models.contains_key(id)
    }

    /// Compiled models in identifier order
    pub fn models(&self) -> impl Iterator<Item = &CompiledModel> {
        self.models.values()
    }

    pub fn model_ids(&self) -> impl Iterator<Item = &ModelId> {
        self.models.keys()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Language code to display name, as configured
    pub fn language_codes(&self) -> &BTreeMap<String, String> {
        &self.language_codes
    }

    pub fn languages_list(&self) -> &LanguagesList {
        &self.languages_list
    }

    /// Identifiers listed for a language pair, bilingual and multilingual alike
    pub fn listed_for(&self, src: &str, tgt: &str) -> &[String] {
        self.languages_list
            .get(src)
            .and_then(|targets| targets.get(tgt))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Warnings recorded while building, in emission order
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Pipeline descriptions of the registered models, in load order
    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

/// Configurable registry construction
pub struct RegistryBuilder<'a> {
    models_root: PathBuf,
    factory: &'a dyn StageFactory,
    scope: Option<ModelId>,
    quiet: bool,
}

impl<'a> RegistryBuilder<'a> {
    pub fn new(models_root: &Path, factory: &'a dyn StageFactory) -> Self {
        Self {
            models_root: models_root.to_path_buf(),
            factory,
            scope: None,
            quiet: false,
        }
    }

    /// Only compile `id` and its pivots
    pub fn scoped(mut self, id: ModelId) -> Self {
        self.scope = Some(id);
        self
    }

    /// Do not log pipeline descriptions
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub async fn build(&self, document: &ConfigDocument) -> Result<Registry, ConfigError> {
        if !self.models_root.is_dir() {
            return Err(ConfigError::ModelsRootMissing(self.models_root.clone()));
        }
        let entries = document.model_specs().ok_or(ConfigError::MissingModels)?;

        let mut warnings = Vec::new();
        let mut specs = Vec::with_capacity(entries.len());
        let mut indices = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            match entry {
                Ok(spec) => {
                    specs.push(spec);
                    indices.push(index);
                }
                Err(e) => record(&mut warnings, format!("Invalid model specification: {}. Skipping load of model #{}", e, index)),
            }
        }

        let language_codes = match &document.languages {
            Some(languages) => languages.clone(),
            None => {
                record(&mut warnings, "Language name specification dictionary ('languages') not found in configuration.".to_string());
                BTreeMap::new()
            }
        };

        let active = active_bilingual_ids(&specs);
        let wanted = self.scope.as_ref().map(|id| scope_closure(&specs, id));
        let compiler = PipelineCompiler::new(&self.models_root, self.factory, &language_codes, &active);

        let mut models: BTreeMap<ModelId, CompiledModel> = BTreeMap::new();
        let mut messages = Vec::new();

        for (&index, spec) in indices.iter().zip(specs.iter()) {
            let label = spec_label(index, spec);
            if !spec.load {
                debug!("Model {} has load disabled", label);
                continue;
            }
            if let Some(wanted) = &wanted {
                if !spec_id(spec).is_some_and(|id| wanted.contains(&id)) {
                    continue;
                }
            }

            let Compilation { outcome, warnings: soft } = compiler.compile(spec).await;
            for warning in soft {
                record(&mut warnings, warning);
            }

            match outcome {
                Ok(model) => {
                    if models.contains_key(&model.id) {
                        record(&mut warnings, format!(
                            "Overwriting model {} since there are duplicate entries. Make sure you give an 'alt' id to load alternate models.",
                            model.id
                        ));
                    }
                    let message = model.describe();
                    if !self.quiet {
                        info!("{}", message);
                    }
                    messages.push(message);
                    models.insert(model.id.clone(), model);
                }
                Err(e) => record(&mut warnings, format!("{}. Skipping load of model {}", e, label)),
            }
        }

        drop_unregistered_pivots(&mut models, &mut warnings);
        let languages_list = index_languages(&models);

        Ok(Registry {
            models,
            language_codes,
            languages_list,
            warnings,
            messages,
        })
    }
}

fn record(warnings: &mut Vec<String>, warning: String) {
    warn!("{}", warning);
    warnings.push(warning);
}

/// Identifier a specification would be registered under, if computable
fn spec_id(spec: &ModelSpec) -> Option<ModelId> {
    if spec.multilingual {
        return Some(ModelId::multilingual(spec.alt.as_deref()));
    }
    match (&spec.src, &spec.tgt) {
        (Some(src), Some(tgt)) => Some(ModelId::new(src.as_str(), tgt.as_str(), spec.alt.as_deref())),
        _ => None,
    }
}

fn spec_label(index: usize, spec: &ModelSpec) -> String {
    spec_id(spec)
        .map(|id| id.to_string())
        .unwrap_or_else(|| format!("#{}", index))
}

/// `id` plus every pivot its loadable specifications declare
fn scope_closure(specs: &[ModelSpec], id: &ModelId) -> BTreeSet<ModelId> {
    let mut wanted = BTreeSet::from([id.clone()]);
    for spec in specs.iter().filter(|spec| spec.load && spec_id(spec).as_ref() == Some(id)) {
        wanted.extend(
            spec.pretranslatechain
                .iter()
                .chain(&spec.posttranslatechain)
                .filter_map(|pivot| ModelId::parse(pivot)),
        );
    }
    wanted
}

/// Pivots are validated against the declared specs; drop chains whose pivots
/// did not make it into the registry.
fn drop_unregistered_pivots(models: &mut BTreeMap<ModelId, CompiledModel>, warnings: &mut Vec<String>) {
    let registered: BTreeSet<ModelId> = models.keys().cloned().collect();

    for model in models.values_mut() {
        for (direction, chain) in [
            (ChainDirection::Pre, &mut model.pretranslatechain),
            (ChainDirection::Post, &mut model.posttranslatechain),
        ] {
            if let Some(missing) = chain.iter().find(|pivot| !registered.contains(*pivot)).cloned() {
                record(warnings, format!(
                    "Model {} in {} of {} failed to load. Dropping the chain.",
                    missing, direction, model.id
                ));
                chain.clear();
            }
        }
    }
}

fn index_languages(models: &BTreeMap<ModelId, CompiledModel>) -> LanguagesList {
    let mut list = LanguagesList::new();

    for (id, model) in models {
        if model.multilingual {
            for pair in &model.supported_pairs {
                list.entry(pair.src.clone())
                    .or_default()
                    .entry(pair.tgt.clone())
                    .or_default()
                    .push(ModelId::multilingual_listing(&pair.src, &pair.tgt, id.alt.as_deref()));
            }
        } else {
            list.entry(model.src.clone())
                .or_default()
                .entry(model.tgt.clone())
                .or_default()
                .push(id.to_string());
        }
    }

    list
}
