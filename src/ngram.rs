//! Character n-gram vocabulary indexing
//!
//! Turns a normalized name into the sequence of vocabulary ids the sequence
//! models consume. The vocabulary is a frozen artifact: its row order is the
//! id mapping learned at training time, and id 0 doubles as "unknown".

use std::path::Path;

use rustc_hash::FxHashMap;

use crate::error::{ConfigError, ResourceError, Result};
use crate::records::open_csv;

/// Id returned for n-grams the vocabulary does not contain
pub const UNKNOWN_ID: u32 = 0;

/// Column holding the n-gram strings in a vocabulary CSV
const VOCAB_COLUMN: &str = "vocab";

/// Window width(s) used to cut a name into n-grams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NgramWidth {
    Fixed(usize),
    /// All widths `lo..=hi`, width-major
    Range { lo: usize, hi: usize },
}

impl NgramWidth {
    pub fn range(lo: usize, hi: usize) -> std::result::Result<Self, ConfigError> {
        if lo == 0 || lo > hi {
            return Err(ConfigError::InvalidNgramRange { lo, hi });
        }
        Ok(NgramWidth::Range { lo, hi })
    }

    fn widths(&self) -> std::ops::RangeInclusive<usize> {
        match *self {
            NgramWidth::Fixed(n) => n..=n,
            NgramWidth::Range { lo, hi } => lo..=hi,
        }
    }
}

/// Ordered n-gram list with a hash index for lookups
#[derive(Debug, Clone)]
pub struct Vocabulary {
    ngrams: Vec<String>,
    index: FxHashMap<String, u32>,
}

impl Vocabulary {
    /// Build from n-grams in id order. Duplicates keep their first id.
    pub fn new<I, S>(ngrams: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ngrams: Vec<String> = ngrams.into_iter().map(Into::into).collect();
        let mut index = FxHashMap::default();
        index.reserve(ngrams.len());
        for (id, ngram) in ngrams.iter().enumerate() {
            index.entry(ngram.clone()).or_insert(id as u32);
        }
        Self { ngrams, index }
    }

    /// Load a vocabulary CSV (`rank,vocab` header; row order defines ids)
    pub fn load(path: &Path) -> Result<Self> {
        let csv_err = |source| ResourceError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut rdr = open_csv(path)?;
        let column = rdr
            .headers()
            .map_err(csv_err)?
            .iter()
            .position(|h| h.trim() == VOCAB_COLUMN)
            .ok_or_else(|| ResourceError::MissingArtifactColumn {
                path: path.to_path_buf(),
                column: VOCAB_COLUMN,
            })?;

        let mut ngrams = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(csv_err)?;
            ngrams.push(record.get(column).unwrap_or_default().to_string());
        }
        if ngrams.is_empty() {
            return Err(ResourceError::EmptyArtifact {
                path: path.to_path_buf(),
            }
            .into());
        }

        let vocab = Self::new(ngrams);
        tracing::info!("loaded {} n-grams from {}", vocab.len(), path.display());
        Ok(vocab)
    }

    pub fn len(&self) -> usize {
        self.ngrams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ngrams.is_empty()
    }

    /// Id of an n-gram, [`UNKNOWN_ID`] when absent
    pub fn id(&self, ngram: &str) -> u32 {
        self.index.get(ngram).copied().unwrap_or(UNKNOWN_ID)
    }
}

/// Vocabulary ids of every n-gram in `text`.
///
/// Windows slide over characters with no boundary padding, so a text
/// shorter than the width contributes nothing. Missing text yields an
/// empty sequence.
pub fn find_ngrams(vocab: &Vocabulary, text: Option<&str>, width: NgramWidth) -> Vec<u32> {
    let Some(text) = text else {
        return Vec::new();
    };
    let chars: Vec<char> = text.chars().collect();

    let mut ids = Vec::new();
    let mut gram = String::new();
    for n in width.widths() {
        if n == 0 || chars.len() < n {
            continue;
        }
        for window in chars.windows(n) {
            gram.clear();
            gram.extend(window);
            ids.push(vocab.id(&gram));
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> Vocabulary {
        Vocabulary::new(["<unk>", "Sm", "mi", "it", "th", "Smi", "ith"])
    }

    #[test]
    fn test_fixed_width_count() {
        let ids = find_ngrams(&vocab(), Some("Smith"), NgramWidth::Fixed(2));
        assert_eq!(ids, vec![1, 2, 3, 4]);
        for text in ["ab", "abc", "Smithson", "Ñúñez"] {
            let n = text.chars().count();
            let ids = find_ngrams(&vocab(), Some(text), NgramWidth::Fixed(2));
            assert_eq!(ids.len(), n - 2 + 1);
        }
    }

    #[test]
    fn test_short_text_is_empty() {
        assert!(find_ngrams(&vocab(), Some("S"), NgramWidth::Fixed(2)).is_empty());
        assert!(find_ngrams(&vocab(), Some(""), NgramWidth::Fixed(2)).is_empty());
        assert!(find_ngrams(&vocab(), Some("Sm"), NgramWidth::Fixed(3)).is_empty());
    }

    #[test]
    fn test_missing_text_is_empty() {
        assert!(find_ngrams(&vocab(), None, NgramWidth::Fixed(2)).is_empty());
    }

    #[test]
    fn test_unknown_ngrams_map_to_zero() {
        let ids = find_ngrams(&vocab(), Some("Zhang"), NgramWidth::Fixed(2));
        assert_eq!(ids, vec![UNKNOWN_ID; 4]);
        // lookup is case-sensitive
        let ids = find_ngrams(&vocab(), Some("SMITH"), NgramWidth::Fixed(2));
        assert_eq!(ids, vec![UNKNOWN_ID; 4]);
    }

    #[test]
    fn test_range_is_width_major() {
        let width = NgramWidth::range(2, 3).unwrap();
        let ids = find_ngrams(&vocab(), Some("Smith"), width);
        // bigrams Sm mi it th, then trigrams Smi mit ith
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 0, 6]);
    }

    #[test]
    fn test_range_skips_widths_longer_than_text() {
        let width = NgramWidth::range(2, 3).unwrap();
        assert_eq!(find_ngrams(&vocab(), Some("Sm"), width), vec![1]);
    }

    #[test]
    fn test_invalid_range() {
        assert!(NgramWidth::range(3, 2).is_err());
        assert!(NgramWidth::range(0, 2).is_err());
    }

    #[test]
    fn test_duplicate_ngram_keeps_first_id() {
        let vocab = Vocabulary::new(["<unk>", "ab", "ab"]);
        assert_eq!(vocab.id("ab"), 1);
        assert_eq!(vocab.len(), 3);
    }

    #[test]
    fn test_load_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.csv");
        std::fs::write(&path, "rank,vocab\n0,<unk>\n1,Sm\n2,mi\n").unwrap();
        let vocab = Vocabulary::load(&path).unwrap();
        assert_eq!(vocab.len(), 3);
        assert_eq!(vocab.id("mi"), 2);
    }

    #[test]
    fn test_load_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.csv");
        std::fs::write(&path, "rank,gram\n0,Sm\n").unwrap();
        let err = Vocabulary::load(&path).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("vocab"));
    }
}
