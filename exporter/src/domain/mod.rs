//! Export domain logic
//!
//! - `metrics` - validation, translation and accumulation of metric batches
//! - `delivery` - bounded queue, workers and retry for encoded batches

pub mod delivery;
pub mod metrics;

pub use delivery::{DeliveryError, DeliveryPipeline, DeliveryReport};
pub use metrics::{ExportError, ExportReport, MetricsExporter};
