//! Outbound series model (flat, label-keyed)

use std::fmt;

/// Reserved label carrying the series name on the wire
pub const METRIC_NAME_LABEL: &str = "__name__";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label {
    pub name: String,
    pub value: String,
}

impl Label {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp_ms: i64,
    pub value: f64,
}

/// Canonical identity of a series, built from its sorted label set
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeriesSignature(String);

impl SeriesSignature {
    /// Render labels that are already sorted by name.
    ///
    /// Each label becomes `name=<len>:<value>;`. Sanitized names never contain
    /// `=`, and the byte length makes any value content unambiguous.
    pub fn from_sorted(labels: &[Label]) -> Self {
        let capacity = labels
            .iter()
            .map(|l| l.name.len() + l.value.len() + 8)
            .sum();
        let mut out = String::with_capacity(capacity);
        for label in labels {
            out.push_str(&label.name);
            out.push('=');
            out.push_str(&label.value.len().to_string());
            out.push(':');
            out.push_str(&label.value);
            out.push(';');
        }
        Self(out)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeriesSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A finished series: labels sorted by name, samples ascending by timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    pub labels: Vec<Label>,
    pub samples: Vec<Sample>,
}

impl TimeSeries {
    /// Value of the `__name__` label
    pub fn name(&self) -> Option<&str> {
        self.label(METRIC_NAME_LABEL)
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_rendering() {
        let labels = vec![Label::new("__name__", "up"), Label::new("job", "api")];
        let sig = SeriesSignature::from_sorted(&labels);
        assert_eq!(sig.as_str(), "__name__=2:up;job=3:api;");
    }

    #[test]
    fn test_signature_values_cannot_forge_extra_labels() {
        let forged = vec![Label::new("a", "x;b=1:y")];
        let split = vec![Label::new("a", "x"), Label::new("b", "y")];
        assert_ne!(
            SeriesSignature::from_sorted(&forged),
            SeriesSignature::from_sorted(&split)
        );
    }

    #[test]
    fn test_time_series_label_lookup() {
        let series = TimeSeries {
            labels: vec![Label::new("__name__", "up"), Label::new("job", "api")],
            samples: vec![],
        };
        assert_eq!(series.name(), Some("up"));
        assert_eq!(series.label("job"), Some("api"));
        assert_eq!(series.label("missing"), None);
    }
}
