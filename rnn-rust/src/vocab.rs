// ============================================================================
// VOCABULARY
// ============================================================================

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, RnnError};

pub const UNKNOWN_TOKEN: &str = "UNKNOWN_TOKEN";
pub const SENTENCE_START: &str = "SENTENCE_START";
pub const SENTENCE_END: &str = "SENTENCE_END";
pub const RESERVED_TOKENS: [&str; 3] = [UNKNOWN_TOKEN, SENTENCE_START, SENTENCE_END];

/// Immutable token <-> index mapping with three reserved entries.
#[derive(Clone, Debug)]
pub struct Vocabulary {
    index_to_word: Vec<String>,
    word_to_index: HashMap<String, usize>,
    unknown: usize,
    start: usize,
    end: usize,
}

#[derive(Serialize, Deserialize)]
struct VocabFile {
    tokens: Vec<String>,
}

impl Vocabulary {
    /// Keeps the `vocab_size - 3` most frequent tokens (ties broken by token
    /// text), followed by the unknown, start and end markers.
    pub fn build(sentences: &[Vec<String>], vocab_size: usize) -> Result<Self> {
        if vocab_size < RESERVED_TOKENS.len() {
            return Err(RnnError::InvalidConfig(format!(
                "vocab_size {} leaves no room for the {} reserved tokens",
                vocab_size, RESERVED_TOKENS.len()
            )));
        }
        let mut freq: HashMap<&str, usize> = HashMap::new();
        for tok in sentences.iter().flatten() {
            if RESERVED_TOKENS.contains(&tok.as_str()) { continue; }
            *freq.entry(tok.as_str()).or_insert(0) += 1;
        }
        let mut ranked: Vec<(&str, usize)> = freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(vocab_size - RESERVED_TOKENS.len());

        let mut tokens: Vec<String> = ranked.into_iter().map(|(t, _)| t.to_string()).collect();
        tokens.extend(RESERVED_TOKENS.iter().map(|t| t.to_string()));
        Vocabulary::from_tokens(tokens)
    }

    /// Index order is the order of `tokens`.
    pub fn from_tokens(tokens: Vec<String>) -> Result<Self> {
        let mut word_to_index = HashMap::with_capacity(tokens.len());
        for (i, t) in tokens.iter().enumerate() {
            if word_to_index.insert(t.clone(), i).is_some() {
                return Err(RnnError::InvalidConfig(format!("token {:?} appears twice", t)));
            }
        }
        let reserved = |name: &str| {
            word_to_index
                .get(name)
                .copied()
                .ok_or_else(|| RnnError::UnknownToken(name.to_string()))
        };
        let (unknown, start, end) = (reserved(UNKNOWN_TOKEN)?, reserved(SENTENCE_START)?, reserved(SENTENCE_END)?);
        Ok(Vocabulary { index_to_word: tokens, word_to_index, unknown, start, end })
    }

    pub fn len(&self) -> usize { self.index_to_word.len() }
    pub fn is_empty(&self) -> bool { self.index_to_word.is_empty() }

    pub fn unknown_index(&self) -> usize { self.unknown }
    pub fn start_index(&self) -> usize { self.start }
    pub fn end_index(&self) -> usize { self.end }

    /// Out-of-vocabulary tokens map to the unknown marker.
    pub fn index_of(&self, token: &str) -> usize {
        self.word_to_index.get(token).copied().unwrap_or(self.unknown)
    }

    pub fn try_index_of(&self, token: &str) -> Result<usize> {
        self.word_to_index
            .get(token)
            .copied()
            .ok_or_else(|| RnnError::UnknownToken(token.to_string()))
    }

    pub fn token(&self, index: usize) -> Result<&str> {
        self.index_to_word
            .get(index)
            .map(String::as_str)
            .ok_or(RnnError::UnknownIndex(index))
    }

    pub fn encode(&self, tokens: &[String]) -> Vec<usize> {
        tokens.iter().map(|t| self.index_of(t)).collect()
    }

    pub fn decode(&self, indices: &[usize]) -> Result<Vec<String>> {
        indices.iter().map(|&i| self.token(i).map(str::to_string)).collect()
    }

    /// Tokens that appear in `sentences` but did not make the cut.
    pub fn out_of_vocabulary<'a>(&self, sentences: &'a [Vec<String>]) -> HashSet<&'a str> {
        sentences
            .iter()
            .flatten()
            .map(String::as_str)
            .filter(|t| !self.word_to_index.contains_key(*t))
            .collect()
    }

    pub fn save(&self, fp: &Path) -> Result<()> {
        let d = VocabFile { tokens: self.index_to_word.clone() };
        fs::write(fp, serde_json::to_string_pretty(&d)?)?;
        info!("Saved vocabulary ({} tokens) to {}", self.len(), fp.display());
        Ok(())
    }

    pub fn load(fp: &Path) -> Result<Self> {
        let d: VocabFile = serde_json::from_str(&fs::read_to_string(fp)?)?;
        Vocabulary::from_tokens(d.tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentences(lines: &[&str]) -> Vec<Vec<String>> {
        lines.iter().map(|l| l.split_whitespace().map(str::to_string).collect()).collect()
    }

    #[test]
    fn build_keeps_most_frequent_tokens() {
        let s = sentences(&["a b c", "a b", "a d"]);
        let v = Vocabulary::build(&s, 5).expect("vocab");
        assert_eq!(v.len(), 5);
        assert_eq!(v.token(0).expect("token"), "a");
        assert_eq!(v.token(1).expect("token"), "b");
        assert_eq!(v.index_of("c"), v.unknown_index());
        assert_eq!(v.token(v.start_index()).expect("token"), SENTENCE_START);
        assert_eq!(v.token(v.end_index()).expect("token"), SENTENCE_END);
        let oov: HashSet<&str> = ["c", "d"].into_iter().collect();
        assert_eq!(v.out_of_vocabulary(&s), oov);
    }

    #[test]
    fn ties_break_lexicographically() {
        let v = Vocabulary::build(&sentences(&["z y x"]), 4).expect("vocab");
        assert_eq!(v.token(0).expect("token"), "x");
    }

    #[test]
    fn decode_rejects_unknown_index() {
        let v = Vocabulary::build(&sentences(&["a"]), 4).expect("vocab");
        assert!(matches!(v.decode(&[0, 17]), Err(RnnError::UnknownIndex(17))));
        assert!(matches!(v.try_index_of("nope"), Err(RnnError::UnknownToken(_))));
    }

    #[test]
    fn too_small_vocab_is_rejected() {
        assert!(Vocabulary::build(&[], 2).is_err());
    }

    #[test]
    fn from_tokens_requires_reserved_markers() {
        let toks = vec!["a".to_string(), UNKNOWN_TOKEN.to_string()];
        assert!(matches!(Vocabulary::from_tokens(toks), Err(RnnError::UnknownToken(_))));
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fp = dir.path().join("vocab.json");
        let v = Vocabulary::build(&sentences(&["hello there", "hello"]), 10).expect("vocab");
        v.save(&fp).expect("save");
        let back = Vocabulary::load(&fp).expect("load");
        assert_eq!(back.decode(&[0, 1, 2, 3, 4]).expect("decode"), v.decode(&[0, 1, 2, 3, 4]).expect("decode"));
    }
}
