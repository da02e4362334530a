//! # Sequence Builder
//!
//! Turns a column-formatted corpus into subtokenized samples. Each word is
//! split by the subword tokenizer; only its first subtoken keeps the gold
//! label, the others get the null label. A blank line ends a sentence, a line
//! starting with `#` is skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, info};

use crate::config::LoaderConfig;
use crate::error::{Result, SeqtagError};
use crate::tokenizer::SubwordTokenizer;

/// A finalized sentence framed by start/end markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub tokens: Vec<u32>,
    pub labels: Vec<String>,
    pub attention_mask: Vec<u32>,
    /// `true` where the label is a real label, neither null nor pad.
    pub crf_mask: Vec<bool>,
}

impl Sample {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Accumulates the subtokens and labels of the sentence being read.
#[derive(Debug, Clone)]
pub struct SentenceBuilder {
    tokens: Vec<u32>,
    labels: Vec<String>,
    pad_label: String,
    null_label: String,
}

impl SentenceBuilder {
    pub fn new<S: Into<String>>(pad_label: S, null_label: S) -> Self {
        Self {
            tokens: Vec::new(),
            labels: Vec::new(),
            pad_label: pad_label.into(),
            null_label: null_label.into(),
        }
    }

    /// Append one word: `label` goes to its first subtoken, the null label
    /// to the rest. A word without subtokens adds nothing.
    pub fn push_word(&mut self, subtokens: &[u32], label: &str) {
        let Some((_, rest)) = subtokens.split_first() else {
            return;
        };
        self.tokens.extend_from_slice(subtokens);
        self.labels.push(label.to_string());
        self.labels
            .extend(std::iter::repeat_n(self.null_label.clone(), rest.len()));
    }

    /// Number of subtokens collected so far.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Fails if token and label buffers diverged.
    pub fn check(&self) -> Result<()> {
        if self.tokens.len() != self.labels.len() {
            return Err(SeqtagError::LengthMismatch {
                tokens: self.tokens.len(),
                labels: self.labels.len(),
            });
        }
        Ok(())
    }

    /// Discard the current sentence.
    pub fn clear(&mut self) {
        self.tokens.clear();
        self.labels.clear();
    }

    /// Finalize the current sentence into a sample and start an empty one.
    pub fn flush(&mut self, start_id: u32, end_id: u32) -> Sample {
        let inner_tokens = std::mem::take(&mut self.tokens);
        let inner_labels = std::mem::take(&mut self.labels);

        let mut tokens = Vec::with_capacity(inner_tokens.len() + 2);
        tokens.push(start_id);
        tokens.extend(inner_tokens);
        tokens.push(end_id);

        let mut labels = Vec::with_capacity(inner_labels.len() + 2);
        labels.push(self.pad_label.clone());
        labels.extend(inner_labels);
        labels.push(self.pad_label.clone());

        let attention_mask = vec![1; tokens.len()];
        let crf_mask = labels
            .iter()
            .map(|label| *label != self.null_label && *label != self.pad_label)
            .collect();

        Sample {
            tokens,
            labels,
            attention_mask,
            crf_mask,
        }
    }
}

/// Read a corpus file into samples.
pub fn build_samples_from_file<P, T>(
    path: P,
    config: &LoaderConfig,
    tokenizer: &T,
) -> Result<Vec<Sample>>
where
    P: AsRef<Path>,
    T: SubwordTokenizer + ?Sized,
{
    let path = path.as_ref();
    info!(path = %path.display(), "loading data file");
    let file = File::open(path).map_err(|source| SeqtagError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    build_samples(BufReader::new(file), config, tokenizer)
}

/// Read a corpus stream into samples.
///
/// A sentence with more than `max_len - 2` subtokens is dropped, except the
/// trailing sentence of a stream that does not end in a blank line, which is
/// always kept.
pub fn build_samples<R, T>(reader: R, config: &LoaderConfig, tokenizer: &T) -> Result<Vec<Sample>>
where
    R: BufRead,
    T: SubwordTokenizer + ?Sized,
{
    let start_id = tokenizer.start_id();
    let end_id = tokenizer.end_id();
    let mut sentence = SentenceBuilder::new(config.pad_label.as_str(), config.null_label.as_str());
    let mut samples = Vec::new();
    let mut dropped = 0usize;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_number = index + 1;

        if line.starts_with('#') {
            continue;
        }

        if !line.is_empty() {
            let columns: Vec<&str> = line.split(config.separator.as_str()).collect();
            let field = |column: usize| {
                columns
                    .get(column)
                    .copied()
                    .ok_or(SeqtagError::MissingColumn {
                        line: line_number,
                        column,
                        found: columns.len(),
                    })
            };
            let token = field(config.tokens_column)?;
            let label = field(config.predict_column)?;

            let subtokens = tokenizer.encode(token)?;
            if subtokens.is_empty() {
                debug!(line = line_number, token, "word produced no subtokens");
            }
            sentence.push_word(&subtokens, label);
            continue;
        }

        sentence.check()?;
        if sentence.is_empty() {
            continue;
        }

        if sentence.len() + 2 <= config.max_len {
            samples.push(sentence.flush(start_id, end_id));
        } else {
            debug!(
                line = line_number,
                subtokens = sentence.len(),
                max_len = config.max_len,
                "dropping over-length sentence"
            );
            sentence.clear();
            dropped += 1;
        }
    }

    if !sentence.is_empty() {
        sentence.check()?;
        samples.push(sentence.flush(start_id, end_id));
    }

    info!(samples = samples.len(), dropped, "file loading done");
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::tokenizer::CharChunkTokenizer;

    fn config(max_len: usize) -> LoaderConfig {
        LoaderConfig::new().with_max_len(max_len)
    }

    /// Two characters per subtoken.
    fn tokenizer() -> CharChunkTokenizer {
        CharChunkTokenizer::new(2, 1000).unwrap()
    }

    fn build(input: &str, max_len: usize) -> Result<Vec<Sample>> {
        build_samples(Cursor::new(input), &config(max_len), &tokenizer())
    }

    #[test]
    fn test_single_sentence() {
        let samples = build("John\tB-PER\nruns\tO\n\n", 100).unwrap();
        assert_eq!(samples.len(), 1);

        let sample = &samples[0];
        assert_eq!(sample.len(), 4 + 2);
        assert_eq!(sample.tokens[0], 1);
        assert_eq!(sample.tokens[5], 2);
        assert_eq!(sample.labels.first().unwrap(), "<pad>");
        assert_eq!(sample.labels.last().unwrap(), "<pad>");
        assert_eq!(sample.attention_mask, vec![1; 6]);
    }

    #[test]
    fn test_label_propagation() {
        let samples = build("Washington\tB-LOC\n\n", 100).unwrap();
        assert_eq!(
            samples[0].labels,
            vec!["<pad>", "B-LOC", "<X>", "<X>", "<X>", "<X>", "<pad>"]
        );
    }

    #[test]
    fn test_crf_mask_marks_real_labels() {
        let samples = build("John\tB-PER\nis\tO\n\n", 100).unwrap();
        let sample = &samples[0];
        assert_eq!(sample.labels, vec!["<pad>", "B-PER", "<X>", "O", "<pad>"]);
        assert_eq!(sample.crf_mask, vec![false, true, false, true, false]);
    }

    #[test]
    fn test_comments_and_repeated_blank_lines() {
        let input = "# doc 1\n\n\nab\tO\n# inline comment\ncd\tO\n\n\n\nef\tO\n\n";
        let samples = build(input, 100).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].len(), 4);
        assert_eq!(samples[1].len(), 3);
    }

    #[test]
    fn test_trailing_sentence_without_blank_line() {
        let samples = build("tok1\tO\n", 1000).unwrap();
        assert_eq!(samples.len(), 1);
    }

    #[test]
    fn test_over_length_sentence_dropped() {
        // 3 subtokens + 2 markers > 4
        let samples = build("abcdef\tO\n\nab\tO\n\n", 4).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].len(), 3);
        assert_eq!(samples[0].labels, vec!["<pad>", "O", "<pad>"]);
    }

    #[test]
    fn test_exact_fit_is_kept() {
        let samples = build("abcd\tO\n\n", 4).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].len(), 4);
    }

    #[test]
    fn test_trailing_sentence_ignores_cap() {
        let samples = build("abcdefgh\tO\n", 4).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].len(), 6);
    }

    #[test]
    fn test_custom_columns_and_separator() {
        let config = LoaderConfig::new()
            .with_columns(2, 0)
            .with_separator(" ");
        let samples =
            build_samples(Cursor::new("B-ORG x ACME\n"), &config, &tokenizer()).unwrap();
        assert_eq!(samples[0].labels, vec!["<pad>", "B-ORG", "<X>", "<pad>"]);
    }

    #[test]
    fn test_missing_column() {
        let err = build("ab\tO\nlonely\n", 100).unwrap_err();
        assert!(matches!(
            err,
            SeqtagError::MissingColumn {
                line: 2,
                column: 1,
                found: 1
            }
        ));
    }

    #[test]
    fn test_sentence_builder_flush_resets() {
        let mut sentence = SentenceBuilder::new("<pad>", "<X>");
        sentence.push_word(&[7, 8], "B-PER");
        sentence.push_word(&[], "O");
        assert_eq!(sentence.len(), 2);
        assert!(sentence.check().is_ok());

        let sample = sentence.flush(1, 2);
        assert_eq!(sample.tokens, vec![1, 7, 8, 2]);
        assert!(sentence.is_empty());
        assert!(sentence.check().is_ok());
    }
}
