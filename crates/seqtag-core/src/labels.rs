//! # Label Encoder
//!
//! Bidirectional mapping between label strings and class ids. Classes are the
//! sorted set of labels seen during fitting, so a class id is the label's rank.
//! A fitted encoder never changes; every later split must reuse it.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SeqtagError};

/// On-disk form of a fitted encoder.
#[derive(Debug, Serialize, Deserialize)]
struct EncoderFile {
    classes: Vec<String>,
}

/// Fitted label vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEncoder {
    classes: Vec<String>,
    ids: HashMap<String, u32>,
}

impl LabelEncoder {
    /// Fit an encoder over every label in `labels`.
    pub fn fit<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let unique: BTreeSet<String> = labels
            .into_iter()
            .map(|label| label.as_ref().to_string())
            .collect();
        Self::from_sorted(unique.into_iter().collect())
    }

    fn from_sorted(classes: Vec<String>) -> Self {
        let ids = classes
            .iter()
            .enumerate()
            .map(|(id, class)| (class.clone(), id as u32))
            .collect();
        Self { classes, ids }
    }

    /// Known classes, ordered by id.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.ids.contains_key(label)
    }

    /// Id of a single label.
    pub fn transform_one(&self, label: &str) -> Result<u32> {
        self.ids
            .get(label)
            .copied()
            .ok_or_else(|| SeqtagError::UnknownLabel(label.to_string()))
    }

    /// Ids of a label sequence. Fails on the first label that was never fitted.
    pub fn transform<S: AsRef<str>>(&self, labels: &[S]) -> Result<Vec<u32>> {
        labels
            .iter()
            .map(|label| self.transform_one(label.as_ref()))
            .collect()
    }

    /// Label strings of an id sequence.
    pub fn inverse_transform(&self, ids: &[u32]) -> Result<Vec<String>> {
        ids.iter()
            .map(|&id| {
                self.classes
                    .get(id as usize)
                    .cloned()
                    .ok_or(SeqtagError::UnknownLabelId(id))
            })
            .collect()
    }

    /// Persist the classes as JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(&EncoderFile {
            classes: self.classes.clone(),
        })?;
        fs::write(path, json).map_err(|source| SeqtagError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load an encoder written by [`LabelEncoder::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| SeqtagError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: EncoderFile = serde_json::from_str(&raw)?;

        if file.classes.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(SeqtagError::Serialization(
                "label classes must be sorted and unique".into(),
            ));
        }
        Ok(Self::from_sorted(file.classes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder() -> LabelEncoder {
        LabelEncoder::fit(["O", "B-PER", "<pad>", "O", "I-PER", "<X>", "B-PER"])
    }

    #[test]
    fn test_classes_sorted_unique() {
        let encoder = encoder();
        assert_eq!(encoder.classes(), &["<X>", "<pad>", "B-PER", "I-PER", "O"]);
        assert_eq!(encoder.len(), 5);
    }

    #[test]
    fn test_label_roundtrip() {
        let encoder = encoder();
        for class in encoder.classes() {
            let ids = encoder.transform(&[class.as_str()]).unwrap();
            assert_eq!(&encoder.inverse_transform(&ids).unwrap()[0], class);
        }
    }

    #[test]
    fn test_unknown_label() {
        let encoder = encoder();
        let err = encoder.transform(&["O", "B-LOC"]).unwrap_err();
        assert!(matches!(err, SeqtagError::UnknownLabel(label) if label == "B-LOC"));
    }

    #[test]
    fn test_unknown_id() {
        let encoder = encoder();
        assert!(matches!(
            encoder.inverse_transform(&[9]),
            Err(SeqtagError::UnknownLabelId(9))
        ));
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.json");

        let encoder = encoder();
        encoder.save(&path).unwrap();
        assert_eq!(LabelEncoder::load(&path).unwrap(), encoder);

        fs::write(&path, r#"{"classes": ["O", "B-PER"]}"#).unwrap();
        assert!(LabelEncoder::load(&path).is_err());
    }
}
