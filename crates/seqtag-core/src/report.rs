//! Human-readable dumps of the configuration and the training session.

use std::fmt;

use candle_core::Device;

use crate::config::LoaderConfig;
use crate::labels::LabelEncoder;

/// Summary of what a training session runs with.
pub struct SessionInfo<'a> {
    pub lang_model: &'a str,
    pub fine_tune: bool,
    pub target_classes: &'a [u32],
    pub label_encoder: &'a LabelEncoder,
    pub device: &'a Device,
}

impl fmt::Display for SessionInfo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let classes = self.label_encoder.classes();
        let targets: Vec<String> = self
            .target_classes
            .iter()
            .map(|&id| {
                classes
                    .get(id as usize)
                    .cloned()
                    .unwrap_or_else(|| format!("#{id}"))
            })
            .collect();

        writeln!(f, "Training session info:")?;
        writeln!(
            f,
            "\tLanguage model: {}, Finetune: {}",
            self.lang_model, self.fine_tune
        )?;
        writeln!(f, "\tTarget classes: {targets:?}")?;
        writeln!(f, "\tAll classes: {classes:?}")?;
        writeln!(f, "\tDevice: {:?}", self.device.location())
    }
}

/// Every configuration value under an "Arguments" header.
pub struct ConfigDump<'a>(pub &'a LoaderConfig);

impl fmt::Display for ConfigDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Arguments")?;
        writeln!(f, "---------")?;
        for (key, value) in self.0.entries() {
            writeln!(f, "{key}: {value}")?;
        }
        writeln!(f)
    }
}
