//! # Seqtag Core
//!
//! Prepares column-formatted corpora for token-level sequence labeling and
//! tracks running training/evaluation metrics. Words are split into
//! subtokens, labels are aligned to the first subtoken of each word, and
//! sentences are padded into batches of candle tensors.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::io::Cursor;
//!
//! use candle_core::Device;
//! use seqtag_core::{BatchedDataset, CharChunkTokenizer, LoaderConfig, SubwordTokenizer};
//!
//! let config = LoaderConfig::new().with_batch_size(2).with_shuffle(false, 0);
//! let tokenizer = CharChunkTokenizer::default();
//! let corpus = "Ada\tB-PER\nLovelace\tI-PER\nwrote\tO\n\nHi\tO\n";
//!
//! let samples = seqtag_core::build_samples(Cursor::new(corpus), &config, &tokenizer).unwrap();
//! let (dataset, encoder) =
//!     BatchedDataset::fit(&samples, &config, tokenizer.pad_id(), &Device::Cpu).unwrap();
//!
//! assert_eq!(samples.len(), 2);
//! assert_eq!(dataset.len(), 1);
//! assert!(encoder.contains("B-PER"));
//! ```
pub mod batch;
pub mod builder;
pub mod config;
pub mod error;
pub mod labels;
pub mod loader;
pub mod meter;
pub mod report;
pub mod tokenizer;

// Re-export primary API
pub use batch::{Batch, BatchIter, BatchedDataset};
pub use builder::{Sample, SentenceBuilder, build_samples, build_samples_from_file};
pub use config::{DEFAULT_NULL_LABEL, DEFAULT_PAD_LABEL, LoaderConfig};
pub use error::{Result, SeqtagError};
pub use labels::LabelEncoder;
pub use loader::{Corpus, load_corpus, load_corpus_with_lang_model};
pub use meter::{BatchScores, Meter, MeterSummary};
pub use report::{ConfigDump, SessionInfo};
pub use tokenizer::{CharChunkTokenizer, HfSubwordTokenizer, SubwordTokenizer};
