//! Shared data types
//!
//! - `enums` - descriptor type and temporality
//! - `metrics` - inbound hierarchical metric model
//! - `series` - outbound flat time series model

mod enums;
mod metrics;
mod series;

pub use enums::{MetricType, Temporality};
pub use metrics::{
    Bucket, HistogramPoint, Metric, MetricBatch, MetricDescriptor, NumberValue, Points, Resource,
    ResourceMetrics, ScalarPoint, SummaryPoint, ValueAtQuantile,
};
pub use series::{Label, METRIC_NAME_LABEL, Sample, SeriesSignature, TimeSeries};
