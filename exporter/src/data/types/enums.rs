//! Descriptor enums shared by the translation and validation layers

use serde::{Deserialize, Serialize};

/// Declared shape of a metric's data points.
///
/// `Invalid` is the zero value: a descriptor that was never filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    #[default]
    Invalid,
    MonotonicInt64,
    MonotonicDouble,
    Int64,
    Double,
    Histogram,
    Summary,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::MonotonicInt64 => "monotonic_int64",
            Self::MonotonicDouble => "monotonic_double",
            Self::Int64 => "int64",
            Self::Double => "double",
            Self::Histogram => "histogram",
            Self::Summary => "summary",
        }
    }

    /// Map the wire integer of the descriptor protocol. Unknown values are `Invalid`.
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => Self::Int64,
            2 => Self::MonotonicInt64,
            3 => Self::Double,
            4 => Self::MonotonicDouble,
            5 => Self::Histogram,
            6 => Self::Summary,
            _ => Self::Invalid,
        }
    }

    /// True for the four types carried by scalar points
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::MonotonicInt64 | Self::MonotonicDouble | Self::Int64 | Self::Double
        )
    }
}

/// How a metric's values relate to time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Temporality {
    #[default]
    Invalid,
    Cumulative,
    Delta,
    Instantaneous,
}

impl Temporality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::Cumulative => "cumulative",
            Self::Delta => "delta",
            Self::Instantaneous => "instantaneous",
        }
    }

    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => Self::Instantaneous,
            2 => Self::Delta,
            3 => Self::Cumulative,
            _ => Self::Invalid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_type_default_is_invalid() {
        assert_eq!(MetricType::default(), MetricType::Invalid);
        assert_eq!(Temporality::default(), Temporality::Invalid);
    }

    #[test]
    fn test_metric_type_as_str() {
        assert_eq!(MetricType::MonotonicInt64.as_str(), "monotonic_int64");
        assert_eq!(MetricType::Histogram.as_str(), "histogram");
        assert_eq!(MetricType::Summary.as_str(), "summary");
    }

    #[test]
    fn test_metric_type_from_i32() {
        assert_eq!(MetricType::from_i32(0), MetricType::Invalid);
        assert_eq!(MetricType::from_i32(2), MetricType::MonotonicInt64);
        assert_eq!(MetricType::from_i32(5), MetricType::Histogram);
        assert_eq!(MetricType::from_i32(99), MetricType::Invalid);
    }

    #[test]
    fn test_temporality_from_i32() {
        assert_eq!(Temporality::from_i32(0), Temporality::Invalid);
        assert_eq!(Temporality::from_i32(1), Temporality::Instantaneous);
        assert_eq!(Temporality::from_i32(2), Temporality::Delta);
        assert_eq!(Temporality::from_i32(3), Temporality::Cumulative);
        assert_eq!(Temporality::from_i32(-1), Temporality::Invalid);
    }

    #[test]
    fn test_enum_serde_snake_case() {
        let ty: MetricType = serde_json::from_str(r#""monotonic_double""#).unwrap();
        assert_eq!(ty, MetricType::MonotonicDouble);
        let temp: Temporality = serde_json::from_str(r#""instantaneous""#).unwrap();
        assert_eq!(temp, Temporality::Instantaneous);
    }

    #[test]
    fn test_is_scalar() {
        assert!(MetricType::Int64.is_scalar());
        assert!(MetricType::MonotonicDouble.is_scalar());
        assert!(!MetricType::Histogram.is_scalar());
        assert!(!MetricType::Invalid.is_scalar());
    }
}
