use std::collections::BTreeSet;
use std::fmt;

use crate::app_config::ModelSpec;
use crate::model_id::ModelId;

/// Which side of the core translation a pivot chain runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainDirection {
    Pre,
    Post,
}

impl fmt::Display for ChainDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pre => write!(f, "pretranslatechain"),
            Self::Post => write!(f, "posttranslatechain"),
        }
    }
}

/// Identifiers of the specifications that will be compiled as bilingual models
pub fn active_bilingual_ids(specs: &[ModelSpec]) -> BTreeSet<ModelId> {
    specs
        .iter()
        .filter(|spec| spec.load && !spec.multilingual && spec.model_type.as_ref().is_some_and(|t| t.is_supported()))
        .filter_map(|spec| match (&spec.src, &spec.tgt) {
            (Some(src), Some(tgt)) => Some(ModelId::new(src.as_str(), tgt.as_str(), spec.alt.as_deref())),
            _ => None,
        })
        .collect()
}

/// Validate a declared pivot chain.
///
/// Every entry must name an active bilingual model. One bad entry drops the
/// whole chain for that direction and yields a warning.
pub fn resolve_chain(
    owner: &ModelId,
    direction: ChainDirection,
    declared: &[String],
    active: &BTreeSet<ModelId>,
) -> (Vec<ModelId>, Option<String>) {
    let mut chain = Vec::with_capacity(declared.len());

    for entry in declared {
        match ModelId::parse(entry).filter(|pivot| active.contains(pivot)) {
            Some(pivot) => chain.push(pivot),
            None => {
                let warning = format!(
                    "Model {} in {} of {} is not an active model. Dropping the chain.",
                    entry, direction, owner
                );
                return (Vec::new(), Some(warning));
            }
        }
    }

    (chain, None)
}
