use isolang::Language;
use std::collections::BTreeMap;

/// Language utilities for request language tags
///
/// This module maps incoming language tags onto the codes the configuration
/// declares, and resolves human readable names for codes.
/// Separators between a primary language subtag and a region or script subtag
const SUBTAG_SEPARATORS: [char; 2] = ['_', '-'];

/// Map a language tag onto the closest known code.
///
/// Exact membership wins; otherwise a tag carrying a region or script subtag
/// (`en_US`, `pt-BR`) is stripped to its primary subtag and retried. No case
/// folding or aliasing is applied. Returns an empty string when unsupported.
pub fn closest<V>(tag: &str, known_codes: &BTreeMap<String, V>) -> String {
    if known_codes.contains_key(tag) {
        return tag.to_string();
    }

    if let Some((primary, _)) = tag.split_once(SUBTAG_SEPARATORS) {
        if known_codes.contains_key(primary) {
            return primary.to_string();
        }
    }

    String::new()
}

/// Get a display name for a code: the configured name first, then the ISO 639 name
pub fn display_name(code: &str, language_codes: &BTreeMap<String, String>) -> Option<String> {
    if let Some(name) = language_codes.get(code) {
        return Some(name.clone());
    }

    let normalized = code.trim().to_lowercase();
    let lang = match normalized.len() {
        2 => Language::from_639_1(&normalized),
        3 => Language::from_639_3(&normalized),
        _ => None,
    }?;

    Some(lang.to_name().to_string())
}
