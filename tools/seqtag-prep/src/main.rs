//! Seqtag corpus preparation tool
//!
//! Loads train/dev corpora into padded batches and reports what came out.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use candle_core::Device;
use clap::{Args, Parser, Subcommand};
use seqtag_core::{
    CharChunkTokenizer, ConfigDump, HfSubwordTokenizer, LoaderConfig, Meter, SessionInfo,
    SubwordTokenizer, build_samples_from_file, load_corpus,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// CLI arguments
#[derive(Parser)]
#[command(name = "seqtag-prep")]
#[command(about = "Prepare column-formatted corpora for sequence labeling")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load train and dev splits into batches
    Load {
        /// Training corpus
        #[arg(long)]
        train: PathBuf,
        /// Development corpus
        #[arg(long)]
        dev: PathBuf,
        /// Labels to score, e.g. B-PER,I-PER
        #[arg(long, value_delimiter = ',')]
        target: Vec<String>,
        /// Report the language model as fine-tuned
        #[arg(long)]
        fine_tune: bool,
        /// Write the fitted label encoder here
        #[arg(long, value_name = "PATH")]
        save_labels: Option<PathBuf>,
        #[command(flatten)]
        loader: LoaderArgs,
    },
    /// Show sentence and label statistics of a single corpus file
    Inspect {
        file: PathBuf,
        #[command(flatten)]
        loader: LoaderArgs,
    },
}

#[derive(Args)]
struct LoaderArgs {
    /// JSON loader configuration; flags below override it
    #[arg(short, long, env = "SEQTAG_CONFIG")]
    config: Option<PathBuf>,
    /// Path to tokenizer.json or a directory holding it
    #[arg(short, long, env = "SEQTAG_LANG_MODEL")]
    lang_model: Option<PathBuf>,
    /// Use the built-in character chunk tokenizer with this width instead
    #[arg(long, conflicts_with = "lang_model")]
    chunk_width: Option<usize>,
    #[arg(short, long)]
    batch_size: Option<usize>,
    #[arg(long)]
    tokens_column: Option<usize>,
    #[arg(long)]
    predict_column: Option<usize>,
    #[arg(short, long)]
    max_len: Option<usize>,
    /// Field separator, `\t` for tab
    #[arg(short, long)]
    separator: Option<String>,
    #[arg(long)]
    pad_label: Option<String>,
    #[arg(long)]
    null_label: Option<String>,
    #[arg(long)]
    no_shuffle: bool,
    #[arg(long)]
    seed: Option<u64>,
    /// CUDA device ordinal, falls back to CPU when CUDA is unavailable
    #[arg(long, env = "SEQTAG_CUDA")]
    cuda: Option<usize>,
}

impl LoaderArgs {
    fn config(&self) -> Result<LoaderConfig> {
        let mut config = match &self.config {
            Some(path) => LoaderConfig::from_json_file(path)
                .with_context(|| format!("failed to read config {}", path.display()))?,
            None => LoaderConfig::default(),
        };

        if let Some(lang_model) = &self.lang_model {
            config.lang_model = lang_model.clone();
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(column) = self.tokens_column {
            config.tokens_column = column;
        }
        if let Some(column) = self.predict_column {
            config.predict_column = column;
        }
        if let Some(max_len) = self.max_len {
            config.max_len = max_len;
        }
        if let Some(separator) = &self.separator {
            config.separator = separator.replace("\\t", "\t");
        }
        if let Some(pad_label) = &self.pad_label {
            config.pad_label = pad_label.clone();
        }
        if let Some(null_label) = &self.null_label {
            config.null_label = null_label.clone();
        }
        if self.no_shuffle {
            config.shuffle = false;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }

        config.validate()?;
        Ok(config)
    }

    fn tokenizer(&self, config: &LoaderConfig) -> Result<Box<dyn SubwordTokenizer>> {
        match self.chunk_width {
            Some(width) => Ok(Box::new(CharChunkTokenizer::new(width, 30_000)?)),
            None => Ok(Box::new(
                HfSubwordTokenizer::from_path(&config.lang_model).with_context(|| {
                    format!("failed to load tokenizer {}", config.lang_model.display())
                })?,
            )),
        }
    }

    fn device(&self) -> Result<Device> {
        match self.cuda {
            Some(ordinal) => Ok(Device::cuda_if_available(ordinal)?),
            None => Ok(Device::Cpu),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Commands::Load {
            train,
            dev,
            target,
            fine_tune,
            save_labels,
            loader,
        } => {
            let config = loader.config()?;
            let tokenizer = loader.tokenizer(&config)?;
            let device = loader.device()?;
            print!("{}", ConfigDump(&config));

            let corpus = load_corpus(&train, &dev, &config, tokenizer.as_ref(), &device)
                .context("failed to load corpus")?;

            println!(
                "train: {} samples in {} batches, seq_len {}",
                corpus.train.num_samples(),
                corpus.train.len(),
                corpus.train.seq_len()
            );
            println!(
                "dev: {} samples in {} batches, seq_len {}",
                corpus.dev.num_samples(),
                corpus.dev.len(),
                corpus.dev.seq_len()
            );

            let target = if target.is_empty() {
                // every class except the pad and null placeholders
                corpus
                    .label_encoder
                    .classes()
                    .iter()
                    .filter(|class| **class != config.pad_label && **class != config.null_label)
                    .cloned()
                    .collect()
            } else {
                target
            };
            if target.is_empty() {
                bail!("no target classes to score");
            }

            let meter = Meter::with_target_labels(&corpus.label_encoder, &target)
                .context("invalid target classes")?;
            let lang_model = match loader.chunk_width {
                Some(width) => format!("char-chunk/{width}"),
                None => config.lang_model.display().to_string(),
            };
            print!(
                "{}",
                SessionInfo {
                    lang_model: &lang_model,
                    fine_tune,
                    target_classes: meter.target_classes(),
                    label_encoder: &corpus.label_encoder,
                    device: &device,
                }
            );

            if let Some(path) = save_labels {
                corpus
                    .label_encoder
                    .save(&path)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                info!(path = %path.display(), "label encoder saved");
            }
        }
        Commands::Inspect { file, loader } => {
            let config = loader.config()?;
            let tokenizer = loader.tokenizer(&config)?;

            let samples = build_samples_from_file(&file, &config, tokenizer.as_ref())
                .with_context(|| format!("failed to read {}", file.display()))?;
            if samples.is_empty() {
                warn!(file = %file.display(), "no sentences found");
            }

            let mut label_counts: BTreeMap<&str, usize> = BTreeMap::new();
            for label in samples.iter().flat_map(|sample| &sample.labels) {
                *label_counts.entry(label.as_str()).or_default() += 1;
            }
            let longest = samples.iter().map(|sample| sample.len()).max().unwrap_or(0);
            let subtokens: usize = samples.iter().map(|sample| sample.len() - 2).sum();

            println!("sentences: {}", samples.len());
            println!("subtokens: {subtokens}");
            println!("longest sample: {longest}");
            println!("labels:");
            for (label, count) in label_counts {
                println!("\t{label}: {count}");
            }
        }
    }

    Ok(())
}
