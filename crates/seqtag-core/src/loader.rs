//! # Corpus Loader
//!
//! Builds the training split first, fitting the label encoder on it, then
//! builds the development split with that same encoder.

use std::path::Path;

use candle_core::Device;
use tracing::info;

use crate::batch::BatchedDataset;
use crate::builder::build_samples_from_file;
use crate::config::LoaderConfig;
use crate::error::Result;
use crate::labels::LabelEncoder;
use crate::tokenizer::{HfSubwordTokenizer, SubwordTokenizer};

/// Train and dev batches sharing one label encoder.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub train: BatchedDataset,
    pub dev: BatchedDataset,
    pub label_encoder: LabelEncoder,
}

/// Load both splits with an already constructed tokenizer.
pub fn load_corpus<T: SubwordTokenizer + ?Sized>(
    train_path: &Path,
    dev_path: &Path,
    config: &LoaderConfig,
    tokenizer: &T,
    device: &Device,
) -> Result<Corpus> {
    config.validate()?;

    let train_samples = build_samples_from_file(train_path, config, tokenizer)?;
    let (train, label_encoder) =
        BatchedDataset::fit(&train_samples, config, tokenizer.pad_id(), device)?;

    let dev_samples = build_samples_from_file(dev_path, config, tokenizer)?;
    let dev = BatchedDataset::with_encoder(
        &dev_samples,
        &label_encoder,
        config,
        tokenizer.pad_id(),
        device,
    )?;

    info!(
        train_samples = train.num_samples(),
        dev_samples = dev.num_samples(),
        classes = label_encoder.len(),
        "corpus loaded"
    );
    Ok(Corpus {
        train,
        dev,
        label_encoder,
    })
}

/// Load both splits, reading the tokenizer named by `config.lang_model`.
pub fn load_corpus_with_lang_model(
    train_path: &Path,
    dev_path: &Path,
    config: &LoaderConfig,
    device: &Device,
) -> Result<Corpus> {
    let tokenizer = HfSubwordTokenizer::from_path(&config.lang_model)?;
    load_corpus(train_path, dev_path, config, &tokenizer, device)
}
