//! Core application

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, Lines};
use tokio::task::JoinHandle;

use crate::core::cli::{self, CliConfig, Commands};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME, ENV_LOG};
use crate::core::shutdown::ShutdownService;
use crate::data::remote_write::RemoteWriteClient;
use crate::data::types::MetricBatch;
use crate::domain::metrics::{ExportError, ExportReport, MetricsExporter};
use crate::utils::file::InputSource;

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub exporter: Arc<MetricsExporter>,
}

/// Totals over one run of the export command
#[derive(Debug, Default)]
struct RunSummary {
    batches: usize,
    malformed: usize,
    failed: usize,
    series: usize,
    samples: usize,
    dropped_points: usize,
}

impl RunSummary {
    fn record(&mut self, report: &ExportReport) {
        self.batches += 1;
        self.series += report.series;
        self.samples += report.samples;
        self.dropped_points += report.dropped_points;
    }
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        let input = match command {
            Some(Commands::Check) => {
                let config = AppConfig::load(&cli_config)?;
                println!("Configuration OK\n\n{config}");
                return Ok(());
            }
            Some(Commands::Export { input }) => input,
            None => None,
        };

        let app = Self::init(&cli_config)?;
        app.run_export(InputSource::parse(input.as_deref())).await
    }

    fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;
        let shutdown = ShutdownService::new();

        let transport = RemoteWriteClient::new(&config.http)
            .context("Failed to create remote-write client")?;
        let exporter = MetricsExporter::new(&config, Arc::new(transport), shutdown.cancellation())
            .context("Failed to initialize exporter")?;

        tracing::info!(endpoint = %config.http.endpoint, "Exporter ready");

        Ok(Self {
            shutdown,
            config,
            exporter: Arc::new(exporter),
        })
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME.replace('-', "_"));

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    /// Read JSON-lines batches until EOF or a shutdown signal, then drain.
    async fn run_export(self, source: InputSource) -> Result<()> {
        self.shutdown.install_signal_handlers();

        let mut lines = source
            .lines()
            .await
            .with_context(|| format!("Failed to open input: {}", source.describe()))?;
        tracing::debug!(input = %source.describe(), "Reading metric batches");

        let (mut summary, pending) =
            read_batches(&self.exporter, &self.shutdown, &mut lines, &source.describe()).await?;

        let exporter = Arc::clone(&self.exporter);
        self.shutdown
            .register(tokio::spawn(async move {
                exporter.shutdown().await;
            }))
            .await;
        self.shutdown.shutdown().await;

        for result in futures::future::join_all(pending).await {
            match result {
                Ok(Ok(report)) => summary.record(&report),
                // already logged by the delivery layer
                Ok(Err(_)) => summary.failed += 1,
                Err(e) => {
                    tracing::warn!(error = %e, "Export task panicked");
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            batches = summary.batches,
            series = summary.series,
            samples = summary.samples,
            dropped_points = summary.dropped_points,
            malformed = summary.malformed,
            failed = summary.failed,
            "Export finished"
        );

        if summary.failed > 0 {
            anyhow::bail!("{} batch(es) failed to export", summary.failed);
        }
        Ok(())
    }
}

type PendingResult = JoinHandle<Result<ExportReport, ExportError>>;

/// Submit one batch per input line until EOF or shutdown.
///
/// A submit blocked on a full queue is abandoned when shutdown is requested.
async fn read_batches<R>(
    exporter: &MetricsExporter,
    shutdown: &ShutdownService,
    lines: &mut Lines<R>,
    input: &str,
) -> Result<(RunSummary, Vec<PendingResult>)>
where
    R: AsyncBufRead + Unpin,
{
    let mut summary = RunSummary::default();
    let mut pending: Vec<PendingResult> = Vec::new();
    let mut line_no = 0usize;

    loop {
        let line = tokio::select! {
            biased;
            _ = shutdown.wait() => {
                tracing::info!("Shutdown requested, no longer reading input");
                break;
            }
            line = lines.next_line() => line
                .with_context(|| format!("Failed to read input: {input}"))?,
        };
        let Some(line) = line else {
            break;
        };
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }

        let batch: MetricBatch = match serde_json::from_str(&line) {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(line = line_no, error = %e, "Skipping malformed batch");
                summary.malformed += 1;
                continue;
            }
        };

        let submitted = tokio::select! {
            biased;
            _ = shutdown.wait() => {
                tracing::warn!(
                    line = line_no,
                    "Shutdown requested before the batch was queued, batch not sent"
                );
                summary.failed += 1;
                break;
            }
            submitted = exporter.submit(&batch) => submitted,
        };
        match submitted {
            Ok(export) => pending.push(tokio::spawn(export.wait())),
            Err(e) => {
                tracing::error!(line = line_no, error = %e, "Export failed");
                summary.failed += 1;
            }
        }
    }

    Ok((summary, pending))
}
