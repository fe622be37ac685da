//! Metric translation
//!
//! - `validate` - descriptor (type, temporality) filter
//! - `signature` - canonical series keys and constant labels
//! - `translate` - data points to series contributions
//! - `accumulate` - per-export series map
//! - `exporter` - ties the stages to the delivery pipeline

mod accumulate;
mod exporter;
mod signature;
mod translate;
mod validate;

pub use accumulate::SeriesAccumulator;
pub use exporter::{ExportError, ExportReport, MetricsExporter, PendingExport, PointFailure};
pub use signature::{
    BUCKET_LABEL, ConstantLabels, QUANTILE_LABEL, SignatureError, build_signature, metric_name,
    sanitize_label_name, sanitize_metric_name,
};
pub use translate::{
    Contribution, MetricTranslation, PointError, PointTranslator, TranslationError, format_float,
};
pub use validate::{EXPORTABLE, is_exportable};
