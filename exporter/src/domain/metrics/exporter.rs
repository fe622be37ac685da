//! Metrics exporter
//!
//! One export call runs validate → translate → accumulate synchronously, then
//! hands the encoded batch to the delivery pipeline.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::accumulate::SeriesAccumulator;
use super::signature::ConstantLabels;
use super::translate::{PointTranslator, TranslationError};
use super::validate::is_exportable;
use crate::core::config::AppConfig;
use crate::data::remote_write::{EncodeError, RemoteWriteTransport, encode_batch};
use crate::data::types::MetricBatch;
use crate::domain::delivery::{
    DeliveryError, DeliveryHandle, DeliveryPipeline, DeliveryReport, RetryingSender,
};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Exporter configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// A point that was skipped during translation
#[derive(Debug, Clone, PartialEq)]
pub struct PointFailure {
    pub metric: String,
    pub index: usize,
    pub error: TranslationError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportReport {
    pub series: usize,
    pub samples: usize,
    /// Metrics rejected by descriptor validation
    pub invalid_metrics: usize,
    pub dropped_points: usize,
    /// Samples replaced by a later sample with the same series and timestamp
    pub overwritten_samples: usize,
    pub point_errors: Vec<PointFailure>,
    /// `None` when there was nothing to send
    pub delivery: Option<DeliveryReport>,
}

/// A translated batch whose delivery may still be in flight
pub struct PendingExport {
    report: ExportReport,
    handle: Option<DeliveryHandle>,
}

impl PendingExport {
    /// Translation summary, available before delivery completes
    pub fn report(&self) -> &ExportReport {
        &self.report
    }

    pub async fn wait(self) -> Result<ExportReport, ExportError> {
        let mut report = self.report;
        if let Some(handle) = self.handle {
            report.delivery = Some(handle.outcome().await?);
        }
        Ok(report)
    }
}

pub struct MetricsExporter {
    namespace: String,
    constants: ConstantLabels,
    compression: bool,
    pipeline: DeliveryPipeline,
}

impl MetricsExporter {
    /// Build the exporter and start its delivery workers.
    pub fn new(
        config: &AppConfig,
        transport: Arc<dyn RemoteWriteTransport>,
        cancel: CancellationToken,
    ) -> Result<Self, ExportError> {
        let constants = ConstantLabels::new(&config.const_labels)
            .map_err(|e| ExportError::Config(e.to_string()))?;
        let sender = RetryingSender::new(transport, config.retry.clone(), config.timeout);
        let pipeline = DeliveryPipeline::new(sender, &config.queue, cancel);

        Ok(Self {
            namespace: config.namespace.clone(),
            constants,
            compression: config.http.compression,
            pipeline,
        })
    }

    /// Translate a batch and enqueue it for delivery.
    ///
    /// Fails without sending anything when a metric's labels collide with the
    /// constant labels.
    pub async fn submit(&self, batch: &MetricBatch) -> Result<PendingExport, ExportError> {
        let translator = PointTranslator::new(&self.namespace, &self.constants);
        let mut accumulator = SeriesAccumulator::new();
        let mut report = ExportReport::default();

        for metric in batch.iter().flat_map(|rm| rm.metrics.iter()) {
            if !is_exportable(metric.descriptor.as_ref()) {
                tracing::debug!(
                    metric = metric.name(),
                    metric_type = ?metric.descriptor.as_ref().map(|d| d.metric_type),
                    temporality = ?metric.descriptor.as_ref().map(|d| d.temporality),
                    "Skipping metric with unsupported descriptor"
                );
                report.invalid_metrics += 1;
                continue;
            }

            let translation = translator.translate_metric(metric);
            if let Some(failure) = translation.errors.iter().find(|e| e.error.is_config_error()) {
                return Err(ExportError::Config(format!(
                    "metric '{}': {}",
                    metric.name(),
                    failure.error
                )));
            }

            for failure in translation.errors {
                tracing::warn!(
                    metric = metric.name(),
                    point = failure.index,
                    error = %failure.error,
                    "Dropping data point"
                );
                report.point_errors.push(PointFailure {
                    metric: metric.name().to_string(),
                    index: failure.index,
                    error: failure.error,
                });
            }
            accumulator.extend(translation.contributions);
        }

        report.dropped_points = report.point_errors.len();
        report.series = accumulator.len();
        report.samples = accumulator.sample_count();
        report.overwritten_samples = accumulator.overwrites();

        if accumulator.is_empty() {
            tracing::debug!(
                invalid_metrics = report.invalid_metrics,
                dropped_points = report.dropped_points,
                "Nothing to export"
            );
            return Ok(PendingExport {
                report,
                handle: None,
            });
        }

        let series = accumulator.finish();
        let encoded = encode_batch(&series, self.compression)?;
        tracing::debug!(
            series = encoded.series,
            samples = encoded.samples,
            bytes = encoded.body.len(),
            "Submitting batch"
        );
        let handle = self.pipeline.submit(encoded).await?;

        Ok(PendingExport {
            report,
            handle: Some(handle),
        })
    }

    /// Submit a batch and wait for its delivery outcome.
    pub async fn export(&self, batch: &MetricBatch) -> Result<ExportReport, ExportError> {
        self.submit(batch).await?.wait().await
    }

    /// Stop accepting batches and drain the delivery queue.
    pub async fn shutdown(&self) {
        self.pipeline.shutdown().await;
    }
}
