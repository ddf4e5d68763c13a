/*!
 * Sentence-level text processors: case handling and word tokenization.
 */

use once_cell::sync::Lazy;
use regex::Regex;

use super::TextProcessor;

/// Punctuation that gets split off words
static PUNCTUATION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([.,!?;:"()\[\]{}¿¡«»…])"#).unwrap()
});

/// Space before closing punctuation
static SPACE_BEFORE_CLOSING_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\s+([.,!?;:)\]}»…%])"#).unwrap()
});

/// Space after opening punctuation
static SPACE_AFTER_OPENING_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([(\[{«¿¡])\s+"#).unwrap()
});

/// Lowercases the whole sentence
#[derive(Debug, Clone, Copy, Default)]
pub struct Lowercaser;

impl TextProcessor for Lowercaser {
    fn process(&self, text: &str) -> String {
        text.to_lowercase()
    }
}

/// Uppercases the first character and lowercases the rest
#[derive(Debug, Clone, Copy, Default)]
pub struct Recaser;

impl TextProcessor for Recaser {
    fn process(&self, text: &str) -> String {
        let mut chars = text.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
            None => String::new(),
        }
    }
}

/// Splits punctuation off words, leaving space separated tokens
#[derive(Debug, Clone)]
pub struct WordTokenizer {
    lang: String,
}

impl WordTokenizer {
    pub fn new(lang: &str) -> Self {
        Self { lang: lang.to_string() }
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }
}

impl TextProcessor for WordTokenizer {
    fn process(&self, text: &str) -> String {
        let spaced = PUNCTUATION_REGEX.replace_all(text, " $1 ");
        spaced.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Reattaches punctuation split off by `WordTokenizer`
#[derive(Debug, Clone)]
pub struct WordDetokenizer {
    lang: String,
}

impl WordDetokenizer {
    pub fn new(lang: &str) -> Self {
        Self { lang: lang.to_string() }
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }
}

impl TextProcessor for WordDetokenizer {
    fn process(&self, text: &str) -> String {
        let joined = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let closed = SPACE_BEFORE_CLOSING_REGEX.replace_all(&joined, "$1");
        SPACE_AFTER_OPENING_REGEX.replace_all(&closed, "$1").into_owned()
    }
}

/// Bare whitespace tokenization used by token-based engines
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenSegmenter;

impl TextProcessor for TokenSegmenter {
    fn process(&self, text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Inverse of `TokenSegmenter`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenDesegmenter;

impl TextProcessor for TokenDesegmenter {
    fn process(&self, text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}
