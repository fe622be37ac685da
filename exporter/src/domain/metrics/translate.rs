//! Point translation
//!
//! Converts typed data points into flat series contributions. Histograms and
//! summaries decompose into several derived series (`_sum`, `_count`, buckets,
//! quantiles). All contributions of a point are built before any is returned,
//! so a malformed point contributes nothing.

use thiserror::Error;

use super::signature::{
    BUCKET_LABEL, ConstantLabels, QUANTILE_LABEL, SignatureError, build_signature, metric_name,
};
use crate::data::types::{
    HistogramPoint, Label, Metric, MetricType, Points, Sample, ScalarPoint, SeriesSignature,
    SummaryPoint,
};

const NANOS_PER_MILLI: u64 = 1_000_000;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error("metric has no name")]
    MissingName,

    #[error("{kind} points do not match descriptor type {metric_type}")]
    ShapeMismatch {
        kind: &'static str,
        metric_type: &'static str,
    },

    #[error("bucket {index} bound {bound} is not greater than the previous bound")]
    BucketBounds { index: usize, bound: f64 },

    #[error("bucket {index} count {count} is below the previous count {previous}")]
    BucketCounts {
        index: usize,
        count: u64,
        previous: u64,
    },

    #[error("quantile {quantile} is outside [0, 1]")]
    Quantile { quantile: f64 },
}

impl TranslationError {
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Signature(e) if e.is_config_error())
    }
}

/// One sample destined for one series
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    pub signature: SeriesSignature,
    pub labels: Vec<Label>,
    pub sample: Sample,
}

/// Failure to translate the point at `index` within its metric
#[derive(Debug, Clone, PartialEq)]
pub struct PointError {
    pub index: usize,
    pub error: TranslationError,
}

#[derive(Debug, Default)]
pub struct MetricTranslation {
    pub contributions: Vec<Contribution>,
    pub errors: Vec<PointError>,
}

pub struct PointTranslator<'a> {
    namespace: &'a str,
    constants: &'a ConstantLabels,
}

impl<'a> PointTranslator<'a> {
    pub fn new(namespace: &'a str, constants: &'a ConstantLabels) -> Self {
        Self {
            namespace,
            constants,
        }
    }

    /// Translate every point of a metric whose descriptor already passed validation.
    pub fn translate_metric(&self, metric: &Metric) -> MetricTranslation {
        let mut out = MetricTranslation::default();
        let metric_type = metric
            .descriptor
            .as_ref()
            .map(|d| d.metric_type)
            .unwrap_or_default();

        let shape_ok = match &metric.points {
            Points::Scalar(_) => metric_type.is_scalar(),
            Points::Histogram(_) => metric_type == MetricType::Histogram,
            Points::Summary(_) => metric_type == MetricType::Summary,
        };
        let whole_metric_error = if metric.name().is_empty() {
            Some(TranslationError::MissingName)
        } else if !shape_ok {
            Some(TranslationError::ShapeMismatch {
                kind: metric.points.kind(),
                metric_type: metric_type.as_str(),
            })
        } else {
            None
        };
        if let Some(error) = whole_metric_error {
            out.errors = (0..metric.points.len())
                .map(|index| PointError {
                    index,
                    error: error.clone(),
                })
                .collect();
            return out;
        }

        let name = metric_name(self.namespace, metric.name());
        let keys = &metric.label_keys;

        match &metric.points {
            Points::Scalar(points) => {
                for (index, point) in points.iter().enumerate() {
                    self.collect(&mut out, index, self.scalar(&name, keys, point));
                }
            }
            Points::Histogram(points) => {
                for (index, point) in points.iter().enumerate() {
                    self.collect(&mut out, index, self.histogram(&name, keys, point));
                }
            }
            Points::Summary(points) => {
                for (index, point) in points.iter().enumerate() {
                    self.collect(&mut out, index, self.summary(&name, keys, point));
                }
            }
        }
        out
    }

    fn collect(
        &self,
        out: &mut MetricTranslation,
        index: usize,
        result: Result<Vec<Contribution>, TranslationError>,
    ) {
        match result {
            Ok(contributions) => out.contributions.extend(contributions),
            Err(error) => out.errors.push(PointError { index, error }),
        }
    }

    fn scalar(
        &self,
        name: &str,
        keys: &[String],
        point: &ScalarPoint,
    ) -> Result<Vec<Contribution>, TranslationError> {
        let ts = to_millis(point.timestamp_unix_nano);
        let c = self.contribution(name, keys, &point.label_values, &[], ts, point.value.as_f64())?;
        Ok(vec![c])
    }

    fn histogram(
        &self,
        name: &str,
        keys: &[String],
        point: &HistogramPoint,
    ) -> Result<Vec<Contribution>, TranslationError> {
        let buckets = normalized_buckets(point)?;
        let ts = to_millis(point.timestamp_unix_nano);
        let values = &point.label_values;

        let mut out = Vec::with_capacity(buckets.len() + 2);
        out.push(self.contribution(&format!("{name}_sum"), keys, values, &[], ts, point.sum)?);
        out.push(self.contribution(
            &format!("{name}_count"),
            keys,
            values,
            &[],
            ts,
            point.count as f64,
        )?);

        let bucket_name = format!("{name}_bucket");
        for (bound, count) in buckets {
            let le = [Label::new(BUCKET_LABEL, format_float(bound))];
            out.push(self.contribution(&bucket_name, keys, values, &le, ts, count as f64)?);
        }
        Ok(out)
    }

    fn summary(
        &self,
        name: &str,
        keys: &[String],
        point: &SummaryPoint,
    ) -> Result<Vec<Contribution>, TranslationError> {
        if let Some(bad) = point
            .quantiles
            .iter()
            .find(|q| !(0.0..=1.0).contains(&q.quantile))
        {
            return Err(TranslationError::Quantile {
                quantile: bad.quantile,
            });
        }

        let ts = to_millis(point.timestamp_unix_nano);
        let values = &point.label_values;

        let mut out = Vec::with_capacity(point.quantiles.len() + 2);
        out.push(self.contribution(&format!("{name}_sum"), keys, values, &[], ts, point.sum)?);
        out.push(self.contribution(
            &format!("{name}_count"),
            keys,
            values,
            &[],
            ts,
            point.count as f64,
        )?);
        for q in &point.quantiles {
            let quantile = [Label::new(QUANTILE_LABEL, format_float(q.quantile))];
            out.push(self.contribution(name, keys, values, &quantile, ts, q.value)?);
        }
        Ok(out)
    }

    fn contribution(
        &self,
        series_name: &str,
        keys: &[String],
        values: &[String],
        extra: &[Label],
        timestamp_ms: i64,
        value: f64,
    ) -> Result<Contribution, TranslationError> {
        let (signature, labels) = build_signature(series_name, keys, values, self.constants, extra)?;
        Ok(Contribution {
            signature,
            labels,
            sample: Sample {
                timestamp_ms,
                value,
            },
        })
    }
}

/// Validated `(upper_bound, cumulative_count)` pairs ending with `+Inf`
fn normalized_buckets(point: &HistogramPoint) -> Result<Vec<(f64, u64)>, TranslationError> {
    let mut out: Vec<(f64, u64)> = Vec::with_capacity(point.buckets.len() + 1);
    for (index, bucket) in point.buckets.iter().enumerate() {
        if bucket.upper_bound.is_nan() {
            return Err(TranslationError::BucketBounds {
                index,
                bound: bucket.upper_bound,
            });
        }
        if let Some(&(prev_bound, prev_count)) = out.last() {
            if bucket.upper_bound <= prev_bound {
                return Err(TranslationError::BucketBounds {
                    index,
                    bound: bucket.upper_bound,
                });
            }
            if bucket.count < prev_count {
                return Err(TranslationError::BucketCounts {
                    index,
                    count: bucket.count,
                    previous: prev_count,
                });
            }
        }
        out.push((bucket.upper_bound, bucket.count));
    }

    let ends_with_inf = out
        .last()
        .is_some_and(|&(bound, _)| bound == f64::INFINITY);
    if !ends_with_inf {
        out.push((f64::INFINITY, point.count));
    }
    Ok(out)
}

fn to_millis(timestamp_unix_nano: u64) -> i64 {
    (timestamp_unix_nano / NANOS_PER_MILLI) as i64
}

/// Prometheus float rendering for `le` and `quantile` values
pub fn format_float(value: f64) -> String {
    if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::data::types::{
        Bucket, MetricDescriptor, NumberValue, Temporality, ValueAtQuantile,
    };

    fn histogram_metric(buckets: Vec<Bucket>, count: u64) -> Metric {
        Metric::new(
            MetricDescriptor::new("latency", MetricType::Histogram, Temporality::Cumulative),
            &["route"],
            Points::Histogram(vec![HistogramPoint {
                label_values: vec!["/api".to_string()],
                timestamp_unix_nano: 3_000_000_000,
                sum: 42.0,
                count,
                buckets,
            }]),
        )
    }

    fn find<'a>(contributions: &'a [Contribution], name: &str, le: Option<&str>) -> &'a Contribution {
        contributions
            .iter()
            .find(|c| {
                let has_name = c.labels.iter().any(|l| l.name == "__name__" && l.value == name);
                let has_le = match le {
                    Some(le) => c.labels.iter().any(|l| l.name == "le" && l.value == le),
                    None => true,
                };
                has_name && has_le
            })
            .unwrap_or_else(|| panic!("no contribution for {name} {le:?}"))
    }

    #[test]
    fn test_scalar_point() {
        let constants = ConstantLabels::default();
        let translator = PointTranslator::new("", &constants);
        let metric = Metric::new(
            MetricDescriptor::new("requests", MetricType::MonotonicInt64, Temporality::Cumulative),
            &["method"],
            Points::Scalar(vec![ScalarPoint::new(&["GET"], 1_500_000_000, NumberValue::Int(7))]),
        );

        let out = translator.translate_metric(&metric);
        assert!(out.errors.is_empty());
        assert_eq!(out.contributions.len(), 1);
        let c = &out.contributions[0];
        assert_eq!(c.sample, Sample { timestamp_ms: 1500, value: 7.0 });
        assert_eq!(c.labels[0], Label::new("__name__", "requests"));
        assert_eq!(c.labels[1], Label::new("method", "GET"));
    }

    #[test]
    fn test_histogram_decomposition() {
        let constants = ConstantLabels::default();
        let translator = PointTranslator::new("", &constants);
        let metric = histogram_metric(
            vec![
                Bucket { upper_bound: 1.0, count: 2 },
                Bucket { upper_bound: 5.0, count: 7 },
                Bucket { upper_bound: f64::INFINITY, count: 10 },
            ],
            10,
        );

        let out = translator.translate_metric(&metric);
        assert!(out.errors.is_empty());
        assert_eq!(out.contributions.len(), 5);

        assert_eq!(find(&out.contributions, "latency_count", None).sample.value, 10.0);
        assert_eq!(find(&out.contributions, "latency_sum", None).sample.value, 42.0);
        assert_eq!(find(&out.contributions, "latency_bucket", Some("1")).sample.value, 2.0);
        assert_eq!(find(&out.contributions, "latency_bucket", Some("5")).sample.value, 7.0);
        assert_eq!(find(&out.contributions, "latency_bucket", Some("+Inf")).sample.value, 10.0);
        assert!(out.contributions.iter().all(|c| c.sample.timestamp_ms == 3000));
    }

    #[test]
    fn test_histogram_inf_bucket_appended() {
        let constants = ConstantLabels::default();
        let translator = PointTranslator::new("", &constants);
        let metric = histogram_metric(vec![Bucket { upper_bound: 0.5, count: 4 }], 9);

        let out = translator.translate_metric(&metric);
        assert_eq!(out.contributions.len(), 4);
        assert_eq!(find(&out.contributions, "latency_bucket", Some("0.5")).sample.value, 4.0);
        assert_eq!(find(&out.contributions, "latency_bucket", Some("+Inf")).sample.value, 9.0);
    }

    #[test]
    fn test_histogram_non_increasing_bounds_rejected() {
        let constants = ConstantLabels::default();
        let translator = PointTranslator::new("", &constants);
        let metric = histogram_metric(
            vec![
                Bucket { upper_bound: 5.0, count: 1 },
                Bucket { upper_bound: 1.0, count: 2 },
            ],
            2,
        );

        let out = translator.translate_metric(&metric);
        assert!(out.contributions.is_empty());
        assert_eq!(
            out.errors[0].error,
            TranslationError::BucketBounds { index: 1, bound: 1.0 }
        );
    }

    #[test]
    fn test_histogram_decreasing_counts_rejected() {
        let constants = ConstantLabels::default();
        let translator = PointTranslator::new("", &constants);
        let metric = histogram_metric(
            vec![
                Bucket { upper_bound: 1.0, count: 5 },
                Bucket { upper_bound: 2.0, count: 3 },
            ],
            5,
        );

        let out = translator.translate_metric(&metric);
        assert!(out.contributions.is_empty());
        assert!(matches!(
            out.errors[0].error,
            TranslationError::BucketCounts { index: 1, count: 3, previous: 5 }
        ));
    }

    #[test]
    fn test_summary_decomposition() {
        let constants = ConstantLabels::default();
        let translator = PointTranslator::new("app", &constants);
        let metric = Metric::new(
            MetricDescriptor::new("rpc_duration", MetricType::Summary, Temporality::Cumulative),
            &[],
            Points::Summary(vec![SummaryPoint {
                label_values: vec![],
                timestamp_unix_nano: 0,
                sum: 12.5,
                count: 4,
                quantiles: vec![
                    ValueAtQuantile { quantile: 0.5, value: 2.0 },
                    ValueAtQuantile { quantile: 0.99, value: 6.0 },
                ],
            }]),
        );

        let out = translator.translate_metric(&metric);
        assert!(out.errors.is_empty());
        assert_eq!(out.contributions.len(), 4);

        let quantile_series: Vec<_> = out
            .contributions
            .iter()
            .filter(|c| c.labels.iter().any(|l| l.name == "quantile"))
            .collect();
        assert_eq!(quantile_series.len(), 2);
        assert!(
            quantile_series
                .iter()
                .all(|c| c.labels.contains(&Label::new("__name__", "app_rpc_duration")))
        );
        assert_eq!(find(&out.contributions, "app_rpc_duration_sum", None).sample.value, 12.5);
        assert_eq!(find(&out.contributions, "app_rpc_duration_count", None).sample.value, 4.0);
    }

    #[test]
    fn test_summary_quantile_out_of_range() {
        let constants = ConstantLabels::default();
        let translator = PointTranslator::new("", &constants);
        let metric = Metric::new(
            MetricDescriptor::new("rpc", MetricType::Summary, Temporality::Cumulative),
            &[],
            Points::Summary(vec![SummaryPoint {
                label_values: vec![],
                timestamp_unix_nano: 0,
                sum: 1.0,
                count: 1,
                quantiles: vec![ValueAtQuantile { quantile: 1.5, value: 2.0 }],
            }]),
        );

        let out = translator.translate_metric(&metric);
        assert!(out.contributions.is_empty());
        assert_eq!(out.errors[0].error, TranslationError::Quantile { quantile: 1.5 });
    }

    #[test]
    fn test_shape_mismatch_skips_every_point() {
        let constants = ConstantLabels::default();
        let translator = PointTranslator::new("", &constants);
        let metric = Metric::new(
            MetricDescriptor::new("requests", MetricType::Histogram, Temporality::Cumulative),
            &[],
            Points::Scalar(vec![
                ScalarPoint::new(&[], 0, NumberValue::Int(1)),
                ScalarPoint::new(&[], 1, NumberValue::Int(2)),
            ]),
        );

        let out = translator.translate_metric(&metric);
        assert!(out.contributions.is_empty());
        assert_eq!(out.errors.len(), 2);
        assert!(matches!(
            out.errors[1].error,
            TranslationError::ShapeMismatch { kind: "scalar", .. }
        ));
    }

    #[test]
    fn test_bad_point_does_not_affect_siblings() {
        let constants = ConstantLabels::default();
        let translator = PointTranslator::new("", &constants);
        let metric = Metric::new(
            MetricDescriptor::new("temp", MetricType::Double, Temporality::Instantaneous),
            &["room"],
            Points::Scalar(vec![
                ScalarPoint::new(&["kitchen"], 0, NumberValue::Double(21.5)),
                ScalarPoint::new(&["hall", "extra"], 0, NumberValue::Double(19.0)),
            ]),
        );

        let out = translator.translate_metric(&metric);
        assert_eq!(out.contributions.len(), 1);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].index, 1);
        assert!(!out.errors[0].error.is_config_error());
    }

    #[test]
    fn test_constant_collision_flagged_as_config_error() {
        let map: BTreeMap<String, String> =
            [("room".to_string(), "x".to_string())].into_iter().collect();
        let constants = ConstantLabels::new(&map).unwrap();
        let translator = PointTranslator::new("", &constants);
        let metric = Metric::new(
            MetricDescriptor::new("temp", MetricType::Double, Temporality::Instantaneous),
            &["room"],
            Points::Scalar(vec![ScalarPoint::new(&["kitchen"], 0, NumberValue::Double(1.0))]),
        );

        let out = translator.translate_metric(&metric);
        assert!(out.errors[0].error.is_config_error());
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(1.0), "1");
        assert_eq!(format_float(0.25), "0.25");
        assert_eq!(format_float(f64::INFINITY), "+Inf");
    }
}
