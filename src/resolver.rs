/*!
 * Language resolver.
 *
 * Maps request language tags onto supported codes and picks the compiled model
 * serving a `(src, tgt, alt)` request. A direct bilingual model always wins;
 * multilingual models are only a fallback.
 */

use log::debug;
use std::collections::BTreeMap;

use crate::errors::TranslationError;
use crate::language_utils::closest;
use crate::model_id::ModelId;
use crate::registry::Registry;

/// A request routed to a registered model
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    /// Registry key of the serving model
    pub model_id: ModelId,
    /// Resolved source code
    pub src: String,
    /// Resolved target code
    pub tgt: String,
}

/// Pick the model serving `src -> tgt` for already resolved codes
pub fn resolve_pair(registry: &Registry, src: &str, tgt: &str, alt: Option<&str>) -> Result<ModelId, TranslationError> {
    let direct = ModelId::new(src, tgt, alt);
    if registry.contains(&direct) {
        return Ok(direct);
    }

    let fallback = registry
        .listed_for(src, tgt)
        .iter()
        .filter_map(|listing| ModelId::from_multilingual_listing(listing))
        .filter(|pair| alt.is_none() || pair.alt.as_deref() == alt)
        .map(|pair| pair.owning_multilingual())
        .find(|owner| registry.contains(owner));

    match fallback {
        Some(owner) => {
            debug!("No bilingual model for {}, using multilingual model {}", direct, owner);
            Ok(owner)
        }
        None => Err(TranslationError::UnsupportedPair(direct.to_string())),
    }
}

/// Route a request with raw language tags
pub fn resolve_request(registry: &Registry, src: &str, tgt: &str, alt: Option<&str>) -> Result<Route, TranslationError> {
    let known = known_codes(registry);
    let resolved_src = closest(src, &known);
    let resolved_tgt = closest(tgt, &known);

    if resolved_src.is_empty() || resolved_tgt.is_empty() {
        return Err(TranslationError::UnsupportedPair(ModelId::new(src, tgt, alt).to_string()));
    }

    let model_id = resolve_pair(registry, &resolved_src, &resolved_tgt, alt)?;
    Ok(Route {
        model_id,
        src: resolved_src,
        tgt: resolved_tgt,
    })
}

/// Configured language codes plus every code a model is listed under
fn known_codes(registry: &Registry) -> BTreeMap<String, ()> {
    let mut known: BTreeMap<String, ()> = registry.language_codes().keys().map(|code| (code.clone(), ())).collect();
    for (src, targets) in registry.languages_list() {
        known.insert(src.clone(), ());
        known.extend(targets.keys().map(|tgt| (tgt.clone(), ())));
    }
    known
}
