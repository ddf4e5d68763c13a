/*!
 * Model identifiers.
 *
 * A model is addressed as `src-tgt` or `src-tgt-alt`. The separator is reserved:
 * language codes and alt ids never contain it. Multilingual models are registered
 * under the `MULTI` sentinel for both languages, and are listed per language pair
 * under a namespaced listing identifier (`MULTI:src-tgt[-alt]`).
 */

use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator between identifier segments
pub const MODEL_TAG_SEPARATOR: char = '-';

/// Sentinel language code of multilingual models
pub const MULTI: &str = "MULTI";

/// Prefix of listing identifiers that point at a multilingual model
const MULTILINGUAL_NAMESPACE: &str = "MULTI:";

/// Identifier of a compiled model
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelId {
    /// Source language code
    pub src: String,
    /// Target language code
    pub tgt: String,
    /// Optional disambiguator between competing models for one pair
    pub alt: Option<String>,
}

impl ModelId {
    /// Build an identifier. An empty alt is the same as no alt.
    pub fn new(src: impl Into<String>, tgt: impl Into<String>, alt: Option<&str>) -> Self {
        Self {
            src: src.into(),
            tgt: tgt.into(),
            alt: alt.filter(|a| !a.is_empty()).map(str::to_string),
        }
    }

    /// Identifier under which a multilingual model is registered
    pub fn multilingual(alt: Option<&str>) -> Self {
        Self::new(MULTI, MULTI, alt)
    }

    /// Parse `src-tgt` or `src-tgt-alt`. Anything else, including an empty
    /// segment, is unparseable and yields `None`.
    pub fn parse(id: &str) -> Option<Self> {
        let fields: Vec<&str> = id.split(MODEL_TAG_SEPARATOR).collect();
        if fields.iter().any(|field| field.is_empty()) {
            return None;
        }
        match fields.as_slice() {
            [src, tgt] => Some(Self::new(*src, *tgt, None)),
            [src, tgt, alt] => Some(Self::new(*src, *tgt, Some(*alt))),
            _ => None,
        }
    }

    /// Whether this identifies a multilingual model
    pub fn is_multilingual(&self) -> bool {
        self.src == MULTI && self.tgt == MULTI
    }

    /// Listing identifier for a language pair served by the multilingual model `alt`
    pub fn multilingual_listing(src: &str, tgt: &str, alt: Option<&str>) -> String {
        format!("{}{}", MULTILINGUAL_NAMESPACE, Self::new(src, tgt, alt))
    }

    /// Decode a multilingual listing identifier into the served pair (with the
    /// owning model's alt). Plain identifiers yield `None`.
    pub fn from_multilingual_listing(listing: &str) -> Option<Self> {
        listing
            .strip_prefix(MULTILINGUAL_NAMESPACE)
            .and_then(Self::parse)
    }

    /// Registry key of the multilingual model behind a decoded listing pair
    pub fn owning_multilingual(&self) -> Self {
        Self::multilingual(self.alt.as_deref())
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.src, MODEL_TAG_SEPARATOR, self.tgt)?;
        if let Some(alt) = &self.alt {
            write!(f, "{}{}", MODEL_TAG_SEPARATOR, alt)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for ModelId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| anyhow::anyhow!("Unparseable model id: {}", s))
    }
}
