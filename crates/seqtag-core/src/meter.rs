//! # Running Metrics
//!
//! [`Meter`] folds per-batch loss and micro/macro precision, recall and F1
//! into running means. Only positions whose gold class is a target class
//! are scored, which keeps pad and null positions out of the numbers.

use std::collections::BTreeMap;
use std::fmt;

use candle_core::{D, DType, Tensor};
use serde::Serialize;

use crate::error::{Result, SeqtagError};
use crate::labels::LabelEncoder;

/// Loss plus the six classification metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MeterSummary {
    pub loss: f64,
    pub micro_precision: f64,
    pub micro_recall: f64,
    pub micro_f1: f64,
    pub macro_precision: f64,
    pub macro_recall: f64,
    pub macro_f1: f64,
}

impl fmt::Display for MeterSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "loss: {:.4}, micro P/R/F1: {:.4}/{:.4}/{:.4}, macro P/R/F1: {:.4}/{:.4}/{:.4}",
            self.loss,
            self.micro_precision,
            self.micro_recall,
            self.micro_f1,
            self.macro_precision,
            self.macro_recall,
            self.macro_f1
        )
    }
}

/// Precision, recall and F1 of one batch, before folding.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BatchScores {
    pub micro_precision: f64,
    pub micro_recall: f64,
    pub micro_f1: f64,
    pub macro_precision: f64,
    pub macro_recall: f64,
    pub macro_f1: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Counts {
    true_positives: u64,
    predicted: u64,
    actual: u64,
}

/// `numerator / denominator`, 0 when the denominator is 0.
fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn f1(counts: &Counts) -> f64 {
    ratio(2 * counts.true_positives, counts.predicted + counts.actual)
}

impl BatchScores {
    /// Score predictions against gold ids, restricted to `classes`.
    ///
    /// Positions whose gold id is not in `classes` are ignored. A prediction
    /// outside `classes` counts as a miss for the gold class and as nobody's
    /// false positive.
    pub fn compute(gold: &[u32], predicted: &[u32], classes: &[u32]) -> Self {
        let mut per_class: BTreeMap<u32, Counts> =
            classes.iter().map(|&class| (class, Counts::default())).collect();

        for (&gold, &pred) in gold.iter().zip(predicted) {
            if !per_class.contains_key(&gold) {
                continue;
            }
            if let Some(counts) = per_class.get_mut(&pred) {
                counts.predicted += 1;
            }
            if let Some(counts) = per_class.get_mut(&gold) {
                counts.actual += 1;
                if gold == pred {
                    counts.true_positives += 1;
                }
            }
        }

        let pooled = per_class.values().fold(Counts::default(), |acc, counts| Counts {
            true_positives: acc.true_positives + counts.true_positives,
            predicted: acc.predicted + counts.predicted,
            actual: acc.actual + counts.actual,
        });

        let n = per_class.len().max(1) as f64;
        let mean = |metric: fn(&Counts) -> f64| per_class.values().map(metric).sum::<f64>() / n;

        Self {
            micro_precision: ratio(pooled.true_positives, pooled.predicted),
            micro_recall: ratio(pooled.true_positives, pooled.actual),
            micro_f1: f1(&pooled),
            macro_precision: mean(|c| ratio(c.true_positives, c.predicted)),
            macro_recall: mean(|c| ratio(c.true_positives, c.actual)),
            macro_f1: mean(f1),
        }
    }
}

/// Running mean of loss and metrics over the batches since the last reset.
///
/// Not synchronized: one aggregation loop owns a meter at a time.
#[derive(Debug, Clone)]
pub struct Meter {
    target_classes: Vec<u32>,
    summary: MeterSummary,
    it: u64,
}

impl Meter {
    /// Create a meter scoring the given class ids. Duplicates are ignored.
    pub fn new(target_classes: &[u32]) -> Result<Self> {
        let mut classes = target_classes.to_vec();
        classes.sort_unstable();
        classes.dedup();

        if classes.is_empty() {
            return Err(SeqtagError::InvalidConfig("target classes are empty".into()));
        }

        Ok(Self {
            target_classes: classes,
            summary: MeterSummary::default(),
            it: 0,
        })
    }

    /// Create a meter scoring the given label names.
    pub fn with_target_labels<S: AsRef<str>>(encoder: &LabelEncoder, labels: &[S]) -> Result<Self> {
        Self::new(&encoder.transform(labels)?)
    }

    pub fn target_classes(&self) -> &[u32] {
        &self.target_classes
    }

    /// Batches folded in since the last reset.
    pub fn iterations(&self) -> u64 {
        self.it
    }

    pub fn summary(&self) -> MeterSummary {
        self.summary
    }

    /// Fold one batch in.
    ///
    /// `logits` has shape `[batch, seq_len, num_classes]`, `gold` has shape
    /// `[batch, seq_len]` and holds class ids.
    pub fn update(&mut self, loss: f64, logits: &Tensor, gold: &Tensor) -> Result<MeterSummary> {
        let (predicted, gold) = flatten_predictions(logits, gold)?;
        Ok(self.update_with_predictions(loss, &predicted, &gold))
    }

    /// Fold one batch in from already decoded predictions.
    pub fn update_with_predictions(
        &mut self,
        loss: f64,
        predicted: &[u32],
        gold: &[u32],
    ) -> MeterSummary {
        let scores = BatchScores::compute(gold, predicted, &self.target_classes);

        let it = self.it as f64;
        let fold = |running: f64, value: f64| (running * it + value) / (it + 1.0);

        let s = &mut self.summary;
        s.loss = fold(s.loss, loss);
        s.micro_precision = fold(s.micro_precision, scores.micro_precision);
        s.micro_recall = fold(s.micro_recall, scores.micro_recall);
        s.micro_f1 = fold(s.micro_f1, scores.micro_f1);
        s.macro_precision = fold(s.macro_precision, scores.macro_precision);
        s.macro_recall = fold(s.macro_recall, scores.macro_recall);
        s.macro_f1 = fold(s.macro_f1, scores.macro_f1);

        self.it += 1;
        self.summary
    }

    /// Zero every running value. Call between epochs and between splits.
    pub fn reset(&mut self) {
        self.summary = MeterSummary::default();
        self.it = 0;
    }
}

/// Argmax over the class dimension, flattened alongside the gold ids.
fn flatten_predictions(logits: &Tensor, gold: &Tensor) -> Result<(Vec<u32>, Vec<u32>)> {
    let logit_dims = logits.dims();
    if logit_dims.len() != 3 || gold.dims() != &logit_dims[..2] {
        return Err(SeqtagError::ShapeMismatch {
            logits: logit_dims.to_vec(),
            gold: gold.dims().to_vec(),
        });
    }

    let predicted = logits
        .argmax(D::Minus1)?
        .flatten_all()?
        .to_dtype(DType::U32)?
        .to_vec1::<u32>()?;
    let gold = gold.flatten_all()?.to_dtype(DType::U32)?.to_vec1::<u32>()?;
    Ok((predicted, gold))
}

#[cfg(test)]
mod tests {
    use candle_core::Device;

    use super::*;

    const EPS: f64 = 1e-12;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < EPS, "{a} != {b}");
    }

    /// One-hot logits for the given predicted classes, shape `[1, n, classes]`.
    fn logits(predicted: &[u32], classes: usize) -> Tensor {
        let mut data = vec![0f32; predicted.len() * classes];
        for (i, &class) in predicted.iter().enumerate() {
            data[i * classes + class as usize] = 1.0;
        }
        Tensor::from_vec(data, (1, predicted.len(), classes), &Device::Cpu).unwrap()
    }

    fn gold(ids: &[u32]) -> Tensor {
        Tensor::from_vec(ids.to_vec(), (1, ids.len()), &Device::Cpu).unwrap()
    }

    #[test]
    fn test_scores_against_hand_counts() {
        // classes 1 and 2 scored, 0 ignored
        let gold = [1, 1, 2, 2, 0, 0];
        let pred = [1, 2, 2, 0, 1, 2];
        let scores = BatchScores::compute(&gold, &pred, &[1, 2]);

        // class 1: tp 1, predicted 1, actual 2; class 2: tp 1, predicted 2, actual 2
        assert_close(scores.micro_precision, 2.0 / 3.0);
        assert_close(scores.micro_recall, 2.0 / 4.0);
        assert_close(scores.micro_f1, 4.0 / 7.0);
        assert_close(scores.macro_precision, (1.0 + 0.5) / 2.0);
        assert_close(scores.macro_recall, (0.5 + 0.5) / 2.0);
        assert_close(scores.macro_f1, (2.0 / 3.0 + 0.5) / 2.0);
    }

    #[test]
    fn test_absent_class_scores_zero() {
        let scores = BatchScores::compute(&[1, 1], &[1, 1], &[1, 2]);
        assert_close(scores.micro_precision, 1.0);
        assert_close(scores.micro_f1, 1.0);
        assert_close(scores.macro_precision, 0.5);
        assert_close(scores.macro_recall, 0.5);
        assert_close(scores.macro_f1, 0.5);
    }

    #[test]
    fn test_no_target_positions() {
        let scores = BatchScores::compute(&[0, 0], &[1, 2], &[1, 2]);
        assert_eq!(scores, BatchScores::default());
    }

    #[test]
    fn test_out_of_target_positions_are_ignored() {
        let mut meter = Meter::new(&[1, 2]).unwrap();
        // gold 0 and 3 are outside the targets; every mistake sits there
        let gold_ids = [0, 1, 3, 2, 0, 2];
        let predicted = [2, 1, 1, 2, 1, 2];
        let summary = meter
            .update(0.25, &logits(&predicted, 4), &gold(&gold_ids))
            .unwrap();

        assert_close(summary.loss, 0.25);
        assert_close(summary.micro_precision, 1.0);
        assert_close(summary.micro_recall, 1.0);
        assert_close(summary.micro_f1, 1.0);
        assert_close(summary.macro_precision, 1.0);
        assert_close(summary.macro_recall, 1.0);
        assert_close(summary.macro_f1, 1.0);
    }

    #[test]
    fn test_repeated_batch_keeps_single_batch_values() {
        let gold_ids = [1, 1, 2, 2, 0, 0];
        let predicted = [1, 2, 2, 0, 1, 2];
        let (logits, gold) = (logits(&predicted, 3), gold(&gold_ids));

        let mut meter = Meter::new(&[1, 2]).unwrap();
        let single = meter.update(0.7, &logits, &gold).unwrap();
        for _ in 0..9 {
            meter.update(0.7, &logits, &gold).unwrap();
        }
        let repeated = meter.summary();

        assert_eq!(meter.iterations(), 10);
        assert_close(repeated.loss, single.loss);
        assert_close(repeated.micro_precision, single.micro_precision);
        assert_close(repeated.micro_recall, single.micro_recall);
        assert_close(repeated.micro_f1, single.micro_f1);
        assert_close(repeated.macro_precision, single.macro_precision);
        assert_close(repeated.macro_recall, single.macro_recall);
        assert_close(repeated.macro_f1, single.macro_f1);
    }

    #[test]
    fn test_running_mean() {
        let mut meter = Meter::new(&[1]).unwrap();
        meter.update_with_predictions(1.0, &[1], &[1]);
        meter.update_with_predictions(2.0, &[0], &[1]);
        let summary = meter.update_with_predictions(3.0, &[1], &[1]);

        assert_close(summary.loss, 2.0);
        assert_close(summary.micro_precision, 2.0 / 3.0);
        assert_close(summary.micro_recall, 2.0 / 3.0);
    }

    #[test]
    fn test_reset() {
        let mut meter = Meter::new(&[1, 2]).unwrap();
        let fresh = meter.summary();
        meter.update_with_predictions(0.5, &[1, 2], &[1, 1]);
        assert_eq!(meter.iterations(), 1);

        meter.reset();
        assert_eq!(meter.summary(), fresh);
        assert_eq!(meter.summary(), MeterSummary::default());
        assert_eq!(meter.iterations(), 0);
    }

    #[test]
    fn test_shape_mismatch() {
        let mut meter = Meter::new(&[1]).unwrap();
        let err = meter
            .update(0.0, &logits(&[1, 1, 1], 2), &gold(&[1, 1]))
            .unwrap_err();
        assert!(matches!(err, SeqtagError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_target_labels() {
        let encoder = LabelEncoder::fit(["<pad>", "<X>", "O", "B-PER", "I-PER"]);
        let meter = Meter::with_target_labels(&encoder, &["B-PER", "I-PER"]).unwrap();
        assert_eq!(meter.target_classes(), &[2, 3]);

        assert!(Meter::with_target_labels(&encoder, &["B-LOC"]).is_err());
        assert!(Meter::new(&[]).is_err());
    }
}
