//! # Subword Tokenizers
//!
//! The sequence builder only needs a word-to-subtoken mapping plus three
//! fixed special ids. [`HfSubwordTokenizer`] provides it on top of a
//! Hugging Face `tokenizer.json`; [`CharChunkTokenizer`] is a self-contained
//! fallback that needs no model files.

use std::path::{Path, PathBuf};

use tokenizers::Tokenizer as HfTokenizer;
use tracing::{debug, info};

use crate::error::{Result, SeqtagError};

/// Maps a surface token to subtoken ids.
pub trait SubwordTokenizer {
    /// Subtoken ids for a single word, without special tokens.
    fn encode(&self, token: &str) -> Result<Vec<u32>>;
    /// Id prepended to every sample.
    fn start_id(&self) -> u32;
    /// Id appended to every sample.
    fn end_id(&self) -> u32;
    /// Id used to pad token rows in a batch.
    fn pad_id(&self) -> u32;
}

/// Special token names tried in order: BERT style, then RoBERTa style.
const SPECIAL_TOKENS: &[(&str, &str, &str)] = &[("[CLS]", "[SEP]", "[PAD]"), ("<s>", "</s>", "<pad>")];

/// Adapter over a Hugging Face `tokenizers` model.
pub struct HfSubwordTokenizer {
    inner: HfTokenizer,
    start_id: u32,
    end_id: u32,
    pad_id: u32,
}

impl HfSubwordTokenizer {
    /// Load a tokenizer from a `tokenizer.json` file or a directory holding one.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = resolve_tokenizer_file(path.as_ref());
        info!(path = %path.display(), "loading tokenizer");

        if !path.exists() {
            return Err(SeqtagError::Tokenizer(format!(
                "tokenizer not found at {}",
                path.display()
            )));
        }

        let mut inner =
            HfTokenizer::from_file(&path).map_err(|e| SeqtagError::Tokenizer(e.to_string()))?;
        // Words are encoded one at a time; batch shaping happens later.
        inner.with_padding(None);
        inner
            .with_truncation(None)
            .map_err(|e| SeqtagError::Tokenizer(e.to_string()))?;

        let tokenizer = Self::from_tokenizer(inner)?;
        info!(
            start_id = tokenizer.start_id,
            end_id = tokenizer.end_id,
            pad_id = tokenizer.pad_id,
            "tokenizer loaded"
        );
        Ok(tokenizer)
    }

    /// Wrap an already constructed tokenizer, resolving its special ids.
    pub fn from_tokenizer(inner: HfTokenizer) -> Result<Self> {
        for &(start, end, pad) in SPECIAL_TOKENS {
            if let (Some(start_id), Some(end_id)) = (inner.token_to_id(start), inner.token_to_id(end))
            {
                let pad_id = inner.token_to_id(pad).unwrap_or_else(|| {
                    debug!(pad, "pad token missing from vocabulary, using id 0");
                    0
                });
                return Ok(Self {
                    inner,
                    start_id,
                    end_id,
                    pad_id,
                });
            }
        }

        Err(SeqtagError::Tokenizer(
            "vocabulary defines neither [CLS]/[SEP] nor <s>/</s>".into(),
        ))
    }

    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }
}

impl SubwordTokenizer for HfSubwordTokenizer {
    fn encode(&self, token: &str) -> Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(token, false)
            .map_err(|e| SeqtagError::Tokenizer(format!("failed to encode {token:?}: {e}")))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn start_id(&self) -> u32 {
        self.start_id
    }

    fn end_id(&self) -> u32 {
        self.end_id
    }

    fn pad_id(&self) -> u32 {
        self.pad_id
    }
}

fn resolve_tokenizer_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join("tokenizer.json")
    } else {
        path.to_path_buf()
    }
}

/// Splits a word into fixed-width character chunks and hashes each chunk
/// into a bounded id space. Ids 0, 1 and 2 are reserved for pad, start and
/// end.
#[derive(Debug, Clone)]
pub struct CharChunkTokenizer {
    width: usize,
    vocab_size: u32,
}

impl CharChunkTokenizer {
    const RESERVED: u32 = 3;

    pub fn new(width: usize, vocab_size: u32) -> Result<Self> {
        if width == 0 || vocab_size <= Self::RESERVED {
            return Err(SeqtagError::InvalidConfig(format!(
                "chunk tokenizer needs width > 0 and vocab_size > {}, got {width} and {vocab_size}",
                Self::RESERVED
            )));
        }
        Ok(Self { width, vocab_size })
    }

    fn chunk_id(&self, chunk: &[char]) -> u32 {
        // FNV-1a
        let mut hash: u32 = 0x811c_9dc5;
        for &c in chunk {
            for byte in (c as u32).to_le_bytes() {
                hash ^= u32::from(byte);
                hash = hash.wrapping_mul(0x0100_0193);
            }
        }
        Self::RESERVED + hash % (self.vocab_size - Self::RESERVED)
    }
}

impl Default for CharChunkTokenizer {
    fn default() -> Self {
        Self {
            width: 4,
            vocab_size: 30_000,
        }
    }
}

impl SubwordTokenizer for CharChunkTokenizer {
    fn encode(&self, token: &str) -> Result<Vec<u32>> {
        let chars: Vec<char> = token.trim().chars().collect();
        Ok(chars.chunks(self.width).map(|chunk| self.chunk_id(chunk)).collect())
    }

    fn start_id(&self) -> u32 {
        1
    }

    fn end_id(&self) -> u32 {
        2
    }

    fn pad_id(&self) -> u32 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_counts() {
        let tokenizer = CharChunkTokenizer::new(3, 100).unwrap();
        assert_eq!(tokenizer.encode("ab").unwrap().len(), 1);
        assert_eq!(tokenizer.encode("abc").unwrap().len(), 1);
        assert_eq!(tokenizer.encode("abcdefg").unwrap().len(), 3);
        assert!(tokenizer.encode("").unwrap().is_empty());
    }

    #[test]
    fn test_chunk_ids_avoid_reserved() {
        let tokenizer = CharChunkTokenizer::new(1, 5).unwrap();
        let ids = tokenizer.encode("Zürich").unwrap();
        assert_eq!(ids.len(), 6);
        assert!(ids.iter().all(|&id| (3..5).contains(&id)));
    }

    #[test]
    fn test_chunk_ids_deterministic() {
        let tokenizer = CharChunkTokenizer::default();
        assert_eq!(tokenizer.encode("Berlin").unwrap(), tokenizer.encode("Berlin").unwrap());
    }

    #[test]
    fn test_invalid_chunk_tokenizer() {
        assert!(CharChunkTokenizer::new(0, 100).is_err());
        assert!(CharChunkTokenizer::new(2, 3).is_err());
    }

    fn word_level(tokens: &[&str]) -> HfTokenizer {
        use std::collections::HashMap;
        use tokenizers::models::wordlevel::WordLevel;

        let vocab: HashMap<String, u32> = tokens
            .iter()
            .enumerate()
            .map(|(id, token)| (token.to_string(), id as u32))
            .collect();
        let model = WordLevel::builder()
            .vocab(vocab)
            .unk_token(tokens[0].to_string())
            .build()
            .unwrap();
        HfTokenizer::new(model)
    }

    #[test]
    fn test_bert_special_ids() {
        let inner = word_level(&["[UNK]", "[PAD]", "[CLS]", "[SEP]", "<s>", "</s>", "hello"]);
        let tokenizer = HfSubwordTokenizer::from_tokenizer(inner).unwrap();
        assert_eq!(tokenizer.start_id(), 2);
        assert_eq!(tokenizer.end_id(), 3);
        assert_eq!(tokenizer.pad_id(), 1);
    }

    #[test]
    fn test_roberta_special_ids_without_pad() {
        let inner = word_level(&["<s>", "<unk>", "</s>", "world", "x", "hello"]);
        let tokenizer = HfSubwordTokenizer::from_tokenizer(inner).unwrap();
        assert_eq!(tokenizer.start_id(), 0);
        assert_eq!(tokenizer.end_id(), 2);
        assert_eq!(tokenizer.pad_id(), 0);
    }

    #[test]
    fn test_vocabulary_without_markers() {
        let inner = word_level(&["<unk>", "[PAD]", "hello"]);
        let err = HfSubwordTokenizer::from_tokenizer(inner).err().unwrap();
        assert!(matches!(err, SeqtagError::Tokenizer(_)));
    }

    #[test]
    fn test_encode_adds_no_special_tokens() {
        let inner = word_level(&["<s>", "<unk>", "</s>", "world", "x", "hello"]);
        let tokenizer = HfSubwordTokenizer::from_tokenizer(inner).unwrap();
        assert_eq!(tokenizer.encode("hello").unwrap(), vec![5]);
        assert_eq!(tokenizer.vocab_size(), 6);
    }

    #[test]
    fn test_missing_tokenizer_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = HfSubwordTokenizer::from_path(dir.path()).err().unwrap();
        assert!(matches!(err, SeqtagError::Tokenizer(_)));
    }
}
