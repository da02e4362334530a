//! # Batch Assembly
//!
//! Right-pads samples to a common length, encodes their labels and serves
//! them as mini-batches of four aligned tensors.

use candle_core::{Device, Tensor};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use tracing::info;

use crate::builder::Sample;
use crate::config::LoaderConfig;
use crate::error::{Result, SeqtagError};
use crate::labels::LabelEncoder;

/// One mini-batch. Every tensor has shape `[batch, seq_len]`.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Subtoken ids, `u32`.
    pub token_ids: Tensor,
    /// Encoded label ids, `u32`.
    pub label_ids: Tensor,
    /// 1 for sample positions, 0 for padding, `u32`.
    pub attention_mask: Tensor,
    /// 1 where a real label sits, 0 elsewhere, `u8`.
    pub crf_mask: Tensor,
}

impl Batch {
    pub fn size(&self) -> usize {
        self.token_ids.dims().first().copied().unwrap_or(0)
    }
}

/// Padded samples of one corpus split.
#[derive(Debug, Clone)]
pub struct BatchedDataset {
    token_ids: Tensor,
    label_ids: Tensor,
    attention_mask: Tensor,
    crf_mask: Tensor,
    num_samples: usize,
    seq_len: usize,
    batch_size: usize,
    shuffle: bool,
    seed: u64,
    device: Device,
}

impl BatchedDataset {
    /// Fit a label encoder over all sample labels, then assemble.
    pub fn fit(
        samples: &[Sample],
        config: &LoaderConfig,
        pad_id: u32,
        device: &Device,
    ) -> Result<(Self, LabelEncoder)> {
        if samples.is_empty() {
            return Err(SeqtagError::EmptyCorpus);
        }

        info!("fitting the label encoder");
        let encoder = LabelEncoder::fit(samples.iter().flat_map(|sample| sample.labels.iter()));
        info!(classes = encoder.len(), "label encoder fitted");

        let dataset = Self::with_encoder(samples, &encoder, config, pad_id, device)?;
        Ok((dataset, encoder))
    }

    /// Assemble with an encoder fitted on another split. Labels unknown to
    /// the encoder are an error.
    pub fn with_encoder(
        samples: &[Sample],
        encoder: &LabelEncoder,
        config: &LoaderConfig,
        pad_id: u32,
        device: &Device,
    ) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(SeqtagError::InvalidConfig("batch_size must be positive".into()));
        }

        let pad_label_id = encoder.transform_one(&config.pad_label)?;
        let num_samples = samples.len();
        let seq_len = samples.iter().map(Sample::len).max().unwrap_or(0);

        let mut token_ids = vec![pad_id; num_samples * seq_len];
        let mut label_ids = vec![pad_label_id; num_samples * seq_len];
        let mut attention_mask = vec![0u32; num_samples * seq_len];
        let mut crf_mask = vec![0u8; num_samples * seq_len];

        for (row, sample) in samples.iter().enumerate() {
            let offset = row * seq_len;
            let end = offset + sample.len();
            token_ids[offset..end].copy_from_slice(&sample.tokens);
            label_ids[offset..end].copy_from_slice(&encoder.transform(&sample.labels)?);
            attention_mask[offset..end].copy_from_slice(&sample.attention_mask);
            for (slot, &real) in crf_mask[offset..end].iter_mut().zip(&sample.crf_mask) {
                *slot = u8::from(real);
            }
        }

        let shape = (num_samples, seq_len);
        let dataset = Self {
            token_ids: Tensor::from_vec(token_ids, shape, device)?,
            label_ids: Tensor::from_vec(label_ids, shape, device)?,
            attention_mask: Tensor::from_vec(attention_mask, shape, device)?,
            crf_mask: Tensor::from_vec(crf_mask, shape, device)?,
            num_samples,
            seq_len,
            batch_size: config.batch_size,
            shuffle: config.shuffle,
            seed: config.seed,
            device: device.clone(),
        };

        info!(
            samples = num_samples,
            seq_len,
            batches = dataset.len(),
            "dataset assembled"
        );
        Ok(dataset)
    }

    /// Number of mini-batches, the last one possibly short.
    pub fn len(&self) -> usize {
        self.num_samples.div_ceil(self.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.num_samples == 0
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// Padded length of every row.
    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// All rows as a single batch, in sample order.
    pub fn full(&self) -> Batch {
        Batch {
            token_ids: self.token_ids.clone(),
            label_ids: self.label_ids.clone(),
            attention_mask: self.attention_mask.clone(),
            crf_mask: self.crf_mask.clone(),
        }
    }

    /// Iterate one pass over the data. With shuffling on, `epoch` selects
    /// the permutation, so the same epoch always yields the same order.
    pub fn batches(&self, epoch: u64) -> BatchIter<'_> {
        let order = if self.shuffle {
            Some(permutation(self.num_samples, self.seed, epoch))
        } else {
            None
        };
        BatchIter {
            dataset: self,
            order,
            position: 0,
        }
    }

    fn select(&self, order: Option<&[u32]>, start: usize, len: usize) -> Result<Batch> {
        let pick = |tensor: &Tensor| -> Result<Tensor> {
            match order {
                Some(order) => {
                    let indices = Tensor::new(&order[start..start + len], &self.device)?;
                    Ok(tensor.index_select(&indices, 0)?)
                }
                None => Ok(tensor.narrow(0, start, len)?),
            }
        };

        Ok(Batch {
            token_ids: pick(&self.token_ids)?,
            label_ids: pick(&self.label_ids)?,
            attention_mask: pick(&self.attention_mask)?,
            crf_mask: pick(&self.crf_mask)?,
        })
    }
}

/// Iterator over the mini-batches of a [`BatchedDataset`].
pub struct BatchIter<'a> {
    dataset: &'a BatchedDataset,
    order: Option<Vec<u32>>,
    position: usize,
}

impl Iterator for BatchIter<'_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = self.dataset.num_samples.saturating_sub(self.position);
        if remaining == 0 {
            return None;
        }

        let len = remaining.min(self.dataset.batch_size);
        let batch = self
            .dataset
            .select(self.order.as_deref(), self.position, len);
        self.position += len;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.dataset.num_samples.saturating_sub(self.position);
        let batches = remaining.div_ceil(self.dataset.batch_size);
        (batches, Some(batches))
    }
}

impl ExactSizeIterator for BatchIter<'_> {}

/// Random order of `0..n`, fixed by `seed` and `epoch`.
fn permutation(n: usize, seed: u64, epoch: u64) -> Vec<u32> {
    let mut rng = StdRng::seed_from_u64(seed ^ epoch.wrapping_mul(0x9e37_79b9_7f4a_7c15));
    let mut order: Vec<u32> = (0..n as u32).collect();
    order.shuffle(&mut rng);
    order
}
