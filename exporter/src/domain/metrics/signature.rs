//! Series key construction
//!
//! Turns a series name, positional label keys/values and the exporter's
//! constant labels into one sorted label set and its canonical signature.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::data::types::{Label, METRIC_NAME_LABEL, SeriesSignature};

/// Upper-bound label of histogram bucket series
pub const BUCKET_LABEL: &str = "le";

/// Quantile label of summary quantile series
pub const QUANTILE_LABEL: &str = "quantile";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("{keys} label keys but {values} label values")]
    LengthMismatch { keys: usize, values: usize },

    #[error("label name must not be empty")]
    EmptyLabelName,

    #[error("label '{name}' appears more than once")]
    DuplicateLabel { name: String },

    #[error("label '{name}' is set by both the metric and the exporter constant labels")]
    ConstantLabelCollision { name: String },
}

impl SignatureError {
    /// Collisions with constant labels point at exporter configuration, not bad data
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::ConstantLabelCollision { .. })
    }
}

/// Exporter-level labels attached to every series, sorted by name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstantLabels {
    labels: Vec<Label>,
}

impl ConstantLabels {
    pub fn new(labels: &BTreeMap<String, String>) -> Result<Self, SignatureError> {
        let mut out = Vec::with_capacity(labels.len());
        for (name, value) in labels {
            if name.is_empty() {
                return Err(SignatureError::EmptyLabelName);
            }
            out.push(Label::new(sanitize_label_name(name), value.clone()));
        }
        sort_and_check_unique(&mut out)?;
        if let Some(reserved) = out.iter().find(|l| l.name == METRIC_NAME_LABEL) {
            return Err(SignatureError::DuplicateLabel {
                name: reserved.name.clone(),
            });
        }
        Ok(Self { labels: out })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.labels.iter()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    fn contains(&self, name: &str) -> bool {
        self.labels
            .binary_search_by(|l| l.name.as_str().cmp(name))
            .is_ok()
    }
}

/// Build the sorted label set and signature for one series.
///
/// `series_name` must already be sanitized (see [`metric_name`]). `extra`
/// holds component labels such as `le` or `quantile`. Metric labels with an
/// empty value are omitted, matching remote-write semantics.
pub fn build_signature(
    series_name: &str,
    label_keys: &[String],
    label_values: &[String],
    constants: &ConstantLabels,
    extra: &[Label],
) -> Result<(SeriesSignature, Vec<Label>), SignatureError> {
    if label_keys.len() != label_values.len() {
        return Err(SignatureError::LengthMismatch {
            keys: label_keys.len(),
            values: label_values.len(),
        });
    }

    let mut labels = Vec::with_capacity(1 + label_keys.len() + extra.len() + constants.len());
    labels.push(Label::new(METRIC_NAME_LABEL, series_name));
    for (key, value) in label_keys.iter().zip(label_values) {
        if key.is_empty() {
            return Err(SignatureError::EmptyLabelName);
        }
        let name = sanitize_label_name(key);
        // a clashing key is a collision even when this point leaves it empty
        if constants.contains(&name) {
            return Err(SignatureError::ConstantLabelCollision { name });
        }
        if value.is_empty() {
            continue;
        }
        labels.push(Label::new(name, value.clone()));
    }
    labels.extend(extra.iter().cloned());
    sort_and_check_unique(&mut labels)?;

    if let Some(clash) = labels.iter().find(|l| constants.contains(&l.name)) {
        return Err(SignatureError::ConstantLabelCollision {
            name: clash.name.clone(),
        });
    }

    labels.extend(constants.iter().cloned());
    labels.sort_by(|a, b| a.name.cmp(&b.name));

    Ok((SeriesSignature::from_sorted(&labels), labels))
}

fn sort_and_check_unique(labels: &mut [Label]) -> Result<(), SignatureError> {
    labels.sort_by(|a, b| a.name.cmp(&b.name));
    if let Some(pair) = labels.windows(2).find(|w| w[0].name == w[1].name) {
        return Err(SignatureError::DuplicateLabel {
            name: pair[0].name.clone(),
        });
    }
    Ok(())
}

/// Final series name: sanitized, with the namespace as prefix when set
pub fn metric_name(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        sanitize_metric_name(name)
    } else {
        sanitize_metric_name(&format!("{namespace}_{name}"))
    }
}

/// Map a metric name onto `[a-zA-Z_:][a-zA-Z0-9_:]*`
pub fn sanitize_metric_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == ':' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Map a label name onto `[a-zA-Z_][a-zA-Z0-9_]*`
pub fn sanitize_label_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert_str(0, "key_");
    }
    out
}
