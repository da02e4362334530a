//! # Loader Configuration
//!
//! Parameters shared by the sequence builder, the batch assembler and the
//! corpus loader.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SeqtagError};

/// Default label for sequence-boundary and batch-padding positions.
pub const DEFAULT_PAD_LABEL: &str = "<pad>";
/// Default label for every non-first subtoken of a word.
pub const DEFAULT_NULL_LABEL: &str = "<X>";

/// Configuration for reading and batching a column-formatted corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Number of samples per mini-batch.
    pub batch_size: usize,
    /// 0-based column holding the surface token.
    pub tokens_column: usize,
    /// 0-based column holding the gold label.
    pub predict_column: usize,
    /// Path to a `tokenizer.json`, or a directory containing one.
    pub lang_model: PathBuf,
    /// Maximum sample length, start and end markers included.
    pub max_len: usize,
    /// Field separator of the data files.
    pub separator: String,
    pub pad_label: String,
    pub null_label: String,
    /// Shuffle samples between batches.
    pub shuffle: bool,
    /// Seed of the shuffle permutation.
    pub seed: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            tokens_column: 0,
            predict_column: 1,
            lang_model: PathBuf::from("models/tokenizer.json"),
            max_len: 512,
            separator: "\t".to_string(),
            pad_label: DEFAULT_PAD_LABEL.to_string(),
            null_label: DEFAULT_NULL_LABEL.to_string(),
            shuffle: true,
            seed: 0,
        }
    }
}

impl LoaderConfig {
    /// Create a loader configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a configuration from a JSON file. Missing keys take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| SeqtagError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the token and label column indices.
    pub fn with_columns(mut self, tokens_column: usize, predict_column: usize) -> Self {
        self.tokens_column = tokens_column;
        self.predict_column = predict_column;
        self
    }

    pub fn with_lang_model<P: Into<PathBuf>>(mut self, lang_model: P) -> Self {
        self.lang_model = lang_model.into();
        self
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    pub fn with_separator<S: Into<String>>(mut self, separator: S) -> Self {
        self.separator = separator.into();
        self
    }

    /// Set the pad and null labels.
    pub fn with_labels<S: Into<String>>(mut self, pad_label: S, null_label: S) -> Self {
        self.pad_label = pad_label.into();
        self.null_label = null_label.into();
        self
    }

    /// Enable or disable shuffling, and set the permutation seed.
    pub fn with_shuffle(mut self, shuffle: bool, seed: u64) -> Self {
        self.shuffle = shuffle;
        self.seed = seed;
        self
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(SeqtagError::InvalidConfig("batch_size must be positive".into()));
        }
        if self.max_len < 3 {
            return Err(SeqtagError::InvalidConfig(format!(
                "max_len must leave room for start/end markers, got {}",
                self.max_len
            )));
        }
        if self.separator.is_empty() {
            return Err(SeqtagError::InvalidConfig("separator is empty".into()));
        }
        if self.pad_label == self.null_label {
            return Err(SeqtagError::InvalidConfig(format!(
                "pad_label and null_label are both {:?}",
                self.pad_label
            )));
        }
        Ok(())
    }

    /// All settings as ordered key/value pairs, for display.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("batch_size", self.batch_size.to_string()),
            ("tokens_column", self.tokens_column.to_string()),
            ("predict_column", self.predict_column.to_string()),
            ("lang_model", self.lang_model.display().to_string()),
            ("max_len", self.max_len.to_string()),
            ("separator", format!("{:?}", self.separator)),
            ("pad_label", self.pad_label.clone()),
            ("null_label", self.null_label.clone()),
            ("shuffle", self.shuffle.to_string()),
            ("seed", self.seed.to_string()),
        ]
    }
}
