//! Inbound metric model
//!
//! Hierarchy: resource → metric (descriptor + label keys) → typed data points.
//! Point shapes are a closed enum so the translator matches them exhaustively.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use super::enums::{MetricType, Temporality};

/// A batch handed to one export call
pub type MetricBatch = Vec<ResourceMetrics>;

/// Entity that produced a group of metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceMetrics {
    #[serde(default)]
    pub resource: Resource,
    #[serde(default)]
    pub metrics: Vec<Metric>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub unit: String,
    #[serde(rename = "type", default)]
    pub metric_type: MetricType,
    #[serde(default)]
    pub temporality: Temporality,
}

impl MetricDescriptor {
    pub fn new(name: impl Into<String>, metric_type: MetricType, temporality: Temporality) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            unit: String::new(),
            metric_type,
            temporality,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    #[serde(default)]
    pub descriptor: Option<MetricDescriptor>,
    /// Label names; every point carries values in the same positions
    #[serde(default)]
    pub label_keys: Vec<String>,
    pub points: Points,
}

impl Metric {
    pub fn new(descriptor: MetricDescriptor, label_keys: &[&str], points: Points) -> Self {
        Self {
            descriptor: Some(descriptor),
            label_keys: label_keys.iter().map(|k| k.to_string()).collect(),
            points,
        }
    }

    /// Descriptor name, or empty when the descriptor is missing
    pub fn name(&self) -> &str {
        self.descriptor.as_ref().map(|d| d.name.as_str()).unwrap_or("")
    }
}

/// Data points of one metric, tagged by shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Points {
    Scalar(Vec<ScalarPoint>),
    Histogram(Vec<HistogramPoint>),
    Summary(Vec<SummaryPoint>),
}

impl Points {
    pub fn len(&self) -> usize {
        match self {
            Self::Scalar(points) => points.len(),
            Self::Histogram(points) => points.len(),
            Self::Summary(points) => points.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Histogram(_) => "histogram",
            Self::Summary(_) => "summary",
        }
    }
}

/// Integer or floating point sample value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberValue {
    Int(i64),
    Double(f64),
}

impl NumberValue {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Int(v) => v as f64,
            Self::Double(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarPoint {
    #[serde(default)]
    pub label_values: Vec<String>,
    pub timestamp_unix_nano: u64,
    pub value: NumberValue,
}

impl ScalarPoint {
    pub fn new(label_values: &[&str], timestamp_unix_nano: u64, value: NumberValue) -> Self {
        Self {
            label_values: to_owned_values(label_values),
            timestamp_unix_nano,
            value,
        }
    }
}

/// One histogram bucket. `count` is cumulative up to and including `upper_bound`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    #[serde(deserialize_with = "deserialize_bound")]
    pub upper_bound: f64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramPoint {
    #[serde(default)]
    pub label_values: Vec<String>,
    pub timestamp_unix_nano: u64,
    pub sum: f64,
    pub count: u64,
    #[serde(default)]
    pub buckets: Vec<Bucket>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueAtQuantile {
    pub quantile: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryPoint {
    #[serde(default)]
    pub label_values: Vec<String>,
    pub timestamp_unix_nano: u64,
    pub sum: f64,
    pub count: u64,
    #[serde(default)]
    pub quantiles: Vec<ValueAtQuantile>,
}

fn to_owned_values(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// JSON has no infinity literal, so bounds also accept "+Inf"-style strings
fn deserialize_bound<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoundRepr {
        Number(f64),
        Text(String),
    }

    match BoundRepr::deserialize(deserializer)? {
        BoundRepr::Number(n) => Ok(n),
        BoundRepr::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "+inf" | "inf" | "infinity" | "+infinity" => Ok(f64::INFINITY),
            other => other
                .parse::<f64>()
                .map_err(|e| serde::de::Error::custom(format!("invalid bucket bound '{s}': {e}"))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scalar_metric() {
        let json = r#"{
            "descriptor": { "name": "requests", "type": "monotonic_int64", "temporality": "cumulative" },
            "label_keys": ["method"],
            "points": { "scalar": [
                { "label_values": ["GET"], "timestamp_unix_nano": 1000000, "value": 3 },
                { "label_values": ["POST"], "timestamp_unix_nano": 2000000, "value": 1.5 }
            ] }
        }"#;
        let metric: Metric = serde_json::from_str(json).unwrap();

        assert_eq!(metric.name(), "requests");
        let Points::Scalar(points) = &metric.points else {
            panic!("expected scalar points");
        };
        assert_eq!(points[0].value, NumberValue::Int(3));
        assert_eq!(points[1].value, NumberValue::Double(1.5));
    }

    #[test]
    fn test_parse_histogram_inf_bound() {
        let json = r#"{
            "label_values": [],
            "timestamp_unix_nano": 5,
            "sum": 42.0,
            "count": 10,
            "buckets": [
                { "upper_bound": 1, "count": 2 },
                { "upper_bound": "+Inf", "count": 10 }
            ]
        }"#;
        let point: HistogramPoint = serde_json::from_str(json).unwrap();

        assert_eq!(point.buckets[0].upper_bound, 1.0);
        assert!(point.buckets[1].upper_bound.is_infinite());
    }

    #[test]
    fn test_parse_invalid_bound_rejected() {
        let json = r#"{ "upper_bound": "lots", "count": 1 }"#;
        assert!(serde_json::from_str::<Bucket>(json).is_err());
    }

    #[test]
    fn test_missing_descriptor_defaults_to_none() {
        let json = r#"{ "points": { "summary": [] } }"#;
        let metric: Metric = serde_json::from_str(json).unwrap();
        assert!(metric.descriptor.is_none());
        assert_eq!(metric.name(), "");
        assert!(metric.points.is_empty());
        assert_eq!(metric.points.kind(), "summary");
    }
}
