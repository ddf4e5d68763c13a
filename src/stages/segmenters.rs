/*!
 * Sentence and subword segmentation stages.
 *
 * The subword stages here are lightweight built-ins: BPE applies the merge table
 * of a codes file, SentencePiece marks word starts with `▁`. Deployments that
 * need the full algorithms plug them in through `StageFactory`.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::{SentenceSegmenter, TextProcessor};
use crate::errors::ModelLoadError;

/// BPE continuation markers, including one dangling at the end of the line
static BPE_MARKER_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(@@ )|(@@ ?$)").unwrap());

const TERMINALS: [char; 3] = ['.', '!', '?'];
const CLOSERS: [char; 5] = ['"', '\'', ')', ']', '»'];
const ABBREVIATIONS: [&str; 9] = ["mr.", "mrs.", "ms.", "dr.", "prof.", "st.", "e.g.", "i.e.", "vs."];

const BPE_END_OF_WORD: &str = "</w>";
const BPE_CONTINUATION: &str = "@@";
const SENTENCEPIECE_SPACE: char = '▁';

/// Splits on terminal punctuation followed by whitespace
#[derive(Debug, Clone, Default)]
pub struct RuleSentenceSegmenter;

impl RuleSentenceSegmenter {
    pub fn new() -> Self {
        Self
    }

    fn ends_with_abbreviation(sentence: &str) -> bool {
        sentence
            .split_whitespace()
            .last()
            .map(|word| ABBREVIATIONS.contains(&word.to_lowercase().as_str()))
            .unwrap_or(false)
    }
}

impl SentenceSegmenter for RuleSentenceSegmenter {
    fn segment(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let mut sentences = Vec::new();
        let mut current = String::new();
        let mut i = 0;

        while i < chars.len() {
            current.push(chars[i]);

            if TERMINALS.contains(&chars[i]) {
                while i + 1 < chars.len() && (TERMINALS.contains(&chars[i + 1]) || CLOSERS.contains(&chars[i + 1])) {
                    i += 1;
                    current.push(chars[i]);
                }

                let at_boundary = i + 1 >= chars.len() || chars[i + 1].is_whitespace();
                if at_boundary && !Self::ends_with_abbreviation(&current) {
                    push_trimmed(&mut sentences, &current);
                    current.clear();
                }
            }

            i += 1;
        }

        push_trimmed(&mut sentences, &current);
        sentences
    }
}

/// Cuts after every occurrence of a configured boundary character
#[derive(Debug, Clone)]
pub struct PunctuationSetSegmenter {
    boundaries: Vec<char>,
}

impl PunctuationSetSegmenter {
    pub fn new(boundaries: Vec<char>) -> Self {
        Self { boundaries }
    }
}

impl SentenceSegmenter for PunctuationSetSegmenter {
    fn segment(&self, text: &str) -> Vec<String> {
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut sentences = Vec::new();
        let mut current = String::new();

        for c in normalized.chars() {
            current.push(c);
            if self.boundaries.contains(&c) {
                push_trimmed(&mut sentences, &current);
                current.clear();
            }
        }

        push_trimmed(&mut sentences, &current);
        sentences
    }
}

fn push_trimmed(sentences: &mut Vec<String>, sentence: &str) {
    let trimmed = sentence.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
}

/// Applies a BPE merge table, marking non-final pieces with `@@`
#[derive(Debug, Clone)]
pub struct BpeSegmenter {
    merges: HashMap<(String, String), usize>,
}

impl BpeSegmenter {
    /// Load a codes file: one `left right` merge per line, highest priority first
    pub fn from_file(path: &Path) -> Result<Self, ModelLoadError> {
        let content = fs::read_to_string(path).map_err(|e| ModelLoadError::AuxiliaryLoad {
            stage: "bpe",
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_codes(&content).map_err(|reason| ModelLoadError::AuxiliaryLoad {
            stage: "bpe",
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Parse the contents of a codes file
    pub fn from_codes(codes: &str) -> Result<Self, String> {
        let mut merges = HashMap::new();

        for (line_no, line) in codes.lines().enumerate() {
            if line.starts_with("#version") || line.trim().is_empty() {
                continue;
            }
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() != 2 {
                return Err(format!("invalid merge at line {}: {:?}", line_no + 1, line));
            }
            let rank = merges.len();
            merges
                .entry((parts[0].to_string(), parts[1].to_string()))
                .or_insert(rank);
        }

        Ok(Self { merges })
    }

    fn segment_word(&self, word: &str) -> Vec<String> {
        let mut symbols: Vec<String> = word.chars().map(|c| c.to_string()).collect();
        match symbols.last_mut() {
            Some(last) => last.push_str(BPE_END_OF_WORD),
            None => return Vec::new(),
        }

        loop {
            let best = symbols
                .windows(2)
                .enumerate()
                .filter_map(|(i, pair)| {
                    self.merges
                        .get(&(pair[0].clone(), pair[1].clone()))
                        .map(|rank| (*rank, i))
                })
                .min();

            let Some((_, i)) = best else { break };
            let right = symbols.remove(i + 1);
            symbols[i].push_str(&right);
        }

        let last = symbols.len() - 1;
        symbols
            .into_iter()
            .enumerate()
            .filter_map(|(i, symbol)| {
                if i == last {
                    let piece = symbol.strip_suffix(BPE_END_OF_WORD).unwrap_or(&symbol).to_string();
                    (!piece.is_empty()).then_some(piece)
                } else {
                    Some(format!("{}{}", symbol, BPE_CONTINUATION))
                }
            })
            .collect()
    }
}

impl TextProcessor for BpeSegmenter {
    fn process(&self, text: &str) -> String {
        text.split_whitespace()
            .flat_map(|word| self.segment_word(word))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Joins BPE pieces back into words
#[derive(Debug, Clone, Copy, Default)]
pub struct BpeDesegmenter;

impl TextProcessor for BpeDesegmenter {
    fn process(&self, text: &str) -> String {
        BPE_MARKER_REGEX.replace_all(text, "").into_owned()
    }
}

/// Word-level SentencePiece segmentation
#[derive(Debug, Clone)]
pub struct SentencePieceSegmenter {
    model_file: PathBuf,
}

impl SentencePieceSegmenter {
    pub fn from_file(path: &Path) -> Result<Self, ModelLoadError> {
        ensure_readable("sentencepiece", path)?;
        Ok(Self { model_file: path.to_path_buf() })
    }

    pub fn model_file(&self) -> &Path {
        &self.model_file
    }
}

impl TextProcessor for SentencePieceSegmenter {
    fn process(&self, text: &str) -> String {
        text.split_whitespace()
            .map(|word| format!("{}{}", SENTENCEPIECE_SPACE, word))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Rebuilds text from SentencePiece pieces
#[derive(Debug, Clone)]
pub struct SentencePieceDesegmenter {
    model_file: PathBuf,
}

impl SentencePieceDesegmenter {
    pub fn from_file(path: &Path) -> Result<Self, ModelLoadError> {
        ensure_readable("desentencepiece", path)?;
        Ok(Self { model_file: path.to_path_buf() })
    }

    pub fn model_file(&self) -> &Path {
        &self.model_file
    }
}

impl TextProcessor for SentencePieceDesegmenter {
    fn process(&self, text: &str) -> String {
        text.chars()
            .filter(|c| *c != ' ')
            .map(|c| if c == SENTENCEPIECE_SPACE { ' ' } else { c })
            .collect::<String>()
            .trim()
            .to_string()
    }
}

fn ensure_readable(stage: &'static str, path: &Path) -> Result<(), ModelLoadError> {
    if !path.is_file() {
        return Err(ModelLoadError::MissingAuxiliaryFile {
            stage,
            path: path.to_path_buf(),
        });
    }
    fs::File::open(path).map_err(|e| ModelLoadError::AuxiliaryLoad {
        stage,
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(())
}
