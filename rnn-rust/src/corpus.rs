// ============================================================================
// DATA PREPARATION
// Raw lyric/text files -> cleaned sentences -> (x, y) index sequences
// ============================================================================

use std::fs;
use std::path::Path;

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::{Result, RnnError};
use crate::vocab::Vocabulary;

/// Lines starting with any of these are section headings, not text.
pub const SECTION_MARKERS: [&str; 6] = ["[", "Intro", "Outro", "Verse", "(", "Interlude"];

/// One training pair; `y` is `x` shifted left by one token.
#[derive(Clone, Debug, PartialEq)]
pub struct Example {
    pub x: Vec<usize>,
    pub y: Vec<usize>,
}

impl Example {
    pub fn new(x: Vec<usize>, y: Vec<usize>) -> Result<Self> {
        if x.len() != y.len() {
            return Err(RnnError::ShapeMismatch(format!(
                "example input has {} tokens but target has {}",
                x.len(), y.len()
            )));
        }
        Ok(Example { x, y })
    }

    /// `x = seq[..n-1]`, `y = seq[1..]`. Sequences shorter than two give an empty pair.
    pub fn from_sequence(seq: &[usize]) -> Self {
        if seq.len() < 2 {
            return Example { x: Vec::new(), y: Vec::new() };
        }
        Example { x: seq[..seq.len() - 1].to_vec(), y: seq[1..].to_vec() }
    }

    pub fn len(&self) -> usize { self.x.len() }
    pub fn is_empty(&self) -> bool { self.x.is_empty() }
}

pub fn is_section_marker(line: &str) -> bool {
    SECTION_MARKERS.iter().any(|m| line.starts_with(m))
}

/// Drops section headings and blank lines.
pub fn clean_lines(text: &str) -> Vec<&str> {
    text.lines()
        .filter(|l| !is_section_marker(l))
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
}

/// Lowercased whitespace tokens.
pub fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_lowercase).collect()
}

/// Every cleaned line of every regular file under `dir`, in path order.
pub fn read_sentences(dir: &Path) -> Result<Vec<Vec<String>>> {
    let mut sentences = Vec::new();
    let mut files = 0usize;
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| RnnError::Io(e.into()))?;
        if !entry.file_type().is_file() { continue; }
        let text = match fs::read_to_string(entry.path()) {
            Ok(t) => t,
            Err(e) => {
                warn!("Skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };
        files += 1;
        sentences.extend(clean_lines(&text).into_iter().map(tokenize));
    }
    info!("Read {} sentences from {} files under {}", sentences.len(), files, dir.display());
    Ok(sentences)
}

/// Encoded training set together with the vocabulary it was encoded against.
pub struct Corpus {
    pub vocab: Vocabulary,
    pub examples: Vec<Example>,
}

impl Corpus {
    pub fn build(sentences: &[Vec<String>], vocab_size: usize) -> Result<Self> {
        let vocab = Vocabulary::build(sentences, vocab_size)?;
        let examples = Corpus::encode(&vocab, sentences);
        let oov = vocab.out_of_vocabulary(sentences).len();
        info!(
            "Vocabulary: {} tokens ({} distinct tokens mapped to unknown) | {} examples",
            vocab.len(), oov, examples.len()
        );
        Ok(Corpus { vocab, examples })
    }

    pub fn from_dir(dir: &Path, vocab_size: usize) -> Result<Self> {
        Corpus::build(&read_sentences(dir)?, vocab_size)
    }

    /// Wraps each sentence in start/end markers before shifting.
    pub fn encode(vocab: &Vocabulary, sentences: &[Vec<String>]) -> Vec<Example> {
        sentences
            .iter()
            .map(|s| {
                let mut seq = Vec::with_capacity(s.len() + 2);
                seq.push(vocab.start_index());
                seq.extend(vocab.encode(s));
                seq.push(vocab.end_index());
                Example::from_sequence(&seq)
            })
            .collect()
    }

    pub fn num_tokens(&self) -> usize { self.examples.iter().map(Example::len).sum() }
}
