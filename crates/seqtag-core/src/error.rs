use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while preparing corpora or aggregating metrics.
#[derive(Debug, Error)]
pub enum SeqtagError {
    /// A corpus or artifact file could not be read or written.
    #[error("failed to access {path:?}: {source}")]
    Io {
        /// The file that failed.
        path: PathBuf,
        source: std::io::Error,
    },

    /// Reading from an already opened stream failed.
    #[error("read error: {0}")]
    Read(#[from] std::io::Error),

    /// A data line has fewer columns than the configured index requires.
    #[error("line {line}: column {column} requested but only {found} column(s) present")]
    MissingColumn {
        /// 1-based line number in the input.
        line: usize,
        /// The 0-based column index that was requested.
        column: usize,
        /// Number of columns actually present.
        found: usize,
    },

    /// A label string is absent from the fitted label vocabulary.
    #[error("unknown label: {0:?}")]
    UnknownLabel(String),

    /// A label id lies outside the fitted label vocabulary.
    #[error("unknown label id: {0}")]
    UnknownLabelId(u32),

    /// Token and label buffers of a sentence diverged.
    #[error("sentence buffers out of sync: {tokens} tokens vs {labels} labels")]
    LengthMismatch { tokens: usize, labels: usize },

    /// No samples to fit a label encoder on.
    #[error("cannot fit a label encoder on an empty corpus")]
    EmptyCorpus,

    /// The supplied configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Subword tokenizer error.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// Candle tensor error.
    #[error("tensor error: {0}")]
    Tensor(String),

    /// Logits and gold labels do not line up.
    #[error("shape mismatch: logits {logits:?} vs gold {gold:?}")]
    ShapeMismatch { logits: Vec<usize>, gold: Vec<usize> },

    /// A persisted artifact could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<candle_core::Error> for SeqtagError {
    fn from(err: candle_core::Error) -> Self {
        SeqtagError::Tensor(err.to_string())
    }
}

impl From<serde_json::Error> for SeqtagError {
    fn from(err: serde_json::Error) -> Self {
        SeqtagError::Serialization(err.to_string())
    }
}

/// Result type alias for seqtag operations.
pub type Result<T> = std::result::Result<T, SeqtagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = SeqtagError::UnknownLabel("B-MISC".into());
        assert_eq!(err.to_string(), "unknown label: \"B-MISC\"");

        let err = SeqtagError::MissingColumn {
            line: 7,
            column: 3,
            found: 2,
        };
        assert!(err.to_string().contains("line 7"));
        assert!(err.to_string().contains("column 3"));

        let err = SeqtagError::EmptyCorpus;
        assert!(err.to_string().contains("empty corpus"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SeqtagError>();
    }
}
