use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::metrics::{BUCKET_LABEL, QUANTILE_LABEL, sanitize_metric_name};
use crate::utils::file::expand_path;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_NUM_CONSUMERS,
    DEFAULT_POOL_IDLE_TIMEOUT_SECS, DEFAULT_POOL_MAX_IDLE_PER_HOST, DEFAULT_QUEUE_SIZE,
    DEFAULT_RETRY_INITIAL_INTERVAL_MS, DEFAULT_RETRY_MAX_ELAPSED_MS, DEFAULT_RETRY_MAX_INTERVAL_MS,
    DEFAULT_RETRY_MULTIPLIER, DEFAULT_RETRY_RANDOMIZATION_FACTOR, DEFAULT_TCP_KEEPALIVE_SECS,
    DEFAULT_TIMEOUT_SECS,
};

// =============================================================================
// File Config Structs (JSON deserialization)
// =============================================================================

/// TLS settings (nested under http)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct TlsFileConfig {
    pub ca_file: Option<PathBuf>,
    pub insecure: Option<bool>,
    pub insecure_skip_verify: Option<bool>,
}

/// Connection reuse settings (nested under http)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct KeepaliveFileConfig {
    pub tcp_keepalive_secs: Option<u64>,
    pub pool_idle_timeout_secs: Option<u64>,
    pub pool_max_idle_per_host: Option<usize>,
}

/// HTTP client section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct HttpFileConfig {
    pub endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
    pub compression: Option<bool>,
    pub headers: Option<BTreeMap<String, String>>,
    pub tls: Option<TlsFileConfig>,
    pub keepalive: Option<KeepaliveFileConfig>,
}

/// Delivery queue section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct QueueFileConfig {
    pub enabled: Option<bool>,
    pub num_consumers: Option<usize>,
    pub queue_size: Option<usize>,
    pub block_on_full: Option<bool>,
}

/// Retry section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RetryFileConfig {
    pub enabled: Option<bool>,
    pub initial_interval_ms: Option<u64>,
    pub max_interval_ms: Option<u64>,
    pub max_elapsed_time_ms: Option<u64>,
    pub multiplier: Option<f64>,
    pub randomization_factor: Option<f64>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub namespace: Option<String>,
    pub const_labels: Option<BTreeMap<String, String>>,
    pub timeout_secs: Option<u64>,
    pub http: Option<HttpFileConfig>,
    pub queue: Option<QueueFileConfig>,
    pub retry: Option<RetryFileConfig>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

fn overlay<T: fmt::Debug>(current: &mut Option<T>, other: Option<T>, field: &str) {
    if other.is_some() {
        tracing::trace!(field, value = ?other, "Merging config field");
        *current = other;
    }
}

fn overlay_map(
    current: &mut Option<BTreeMap<String, String>>,
    other: Option<BTreeMap<String, String>>,
) {
    if let Some(other) = other {
        current.get_or_insert_with(BTreeMap::new).extend(other);
    }
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        overlay(&mut self.namespace, other.namespace, "namespace");
        overlay_map(&mut self.const_labels, other.const_labels);
        overlay(&mut self.timeout_secs, other.timeout_secs, "timeout_secs");

        if let Some(http) = other.http {
            let current = self.http.get_or_insert_with(HttpFileConfig::default);
            overlay(&mut current.endpoint, http.endpoint, "http.endpoint");
            overlay(&mut current.timeout_secs, http.timeout_secs, "http.timeout_secs");
            overlay(&mut current.compression, http.compression, "http.compression");
            overlay_map(&mut current.headers, http.headers);

            if let Some(tls) = http.tls {
                let current_tls = current.tls.get_or_insert_with(TlsFileConfig::default);
                overlay(&mut current_tls.ca_file, tls.ca_file, "http.tls.ca_file");
                overlay(&mut current_tls.insecure, tls.insecure, "http.tls.insecure");
                overlay(
                    &mut current_tls.insecure_skip_verify,
                    tls.insecure_skip_verify,
                    "http.tls.insecure_skip_verify",
                );
            }

            if let Some(keepalive) = http.keepalive {
                let current_ka = current
                    .keepalive
                    .get_or_insert_with(KeepaliveFileConfig::default);
                overlay(
                    &mut current_ka.tcp_keepalive_secs,
                    keepalive.tcp_keepalive_secs,
                    "http.keepalive.tcp_keepalive_secs",
                );
                overlay(
                    &mut current_ka.pool_idle_timeout_secs,
                    keepalive.pool_idle_timeout_secs,
                    "http.keepalive.pool_idle_timeout_secs",
                );
                overlay(
                    &mut current_ka.pool_max_idle_per_host,
                    keepalive.pool_max_idle_per_host,
                    "http.keepalive.pool_max_idle_per_host",
                );
            }
        }

        if let Some(queue) = other.queue {
            let current = self.queue.get_or_insert_with(QueueFileConfig::default);
            overlay(&mut current.enabled, queue.enabled, "queue.enabled");
            overlay(&mut current.num_consumers, queue.num_consumers, "queue.num_consumers");
            overlay(&mut current.queue_size, queue.queue_size, "queue.queue_size");
            overlay(&mut current.block_on_full, queue.block_on_full, "queue.block_on_full");
        }

        if let Some(retry) = other.retry {
            let current = self.retry.get_or_insert_with(RetryFileConfig::default);
            overlay(&mut current.enabled, retry.enabled, "retry.enabled");
            overlay(
                &mut current.initial_interval_ms,
                retry.initial_interval_ms,
                "retry.initial_interval_ms",
            );
            overlay(&mut current.max_interval_ms, retry.max_interval_ms, "retry.max_interval_ms");
            overlay(
                &mut current.max_elapsed_time_ms,
                retry.max_elapsed_time_ms,
                "retry.max_elapsed_time_ms",
            );
            overlay(&mut current.multiplier, retry.multiplier, "retry.multiplier");
            overlay(
                &mut current.randomization_factor,
                retry.randomization_factor,
                "retry.randomization_factor",
            );
        }
    }
}

// =============================================================================
// Runtime Config Structs
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TlsConfig {
    pub ca_file: Option<PathBuf>,
    /// Plaintext `http://` for bare `host:port` endpoints even with a CA file
    pub insecure: bool,
    pub insecure_skip_verify: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeepaliveConfig {
    pub tcp_keepalive: Option<Duration>,
    pub pool_idle_timeout: Option<Duration>,
    pub pool_max_idle_per_host: usize,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            tcp_keepalive: Some(Duration::from_secs(DEFAULT_TCP_KEEPALIVE_SECS)),
            pool_idle_timeout: Some(Duration::from_secs(DEFAULT_POOL_IDLE_TIMEOUT_SECS)),
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    /// Normalized `http(s)://` URL
    pub endpoint: String,
    /// Overall client request timeout
    pub timeout: Duration,
    pub compression: bool,
    pub headers: BTreeMap<String, String>,
    pub tls: TlsConfig,
    pub keepalive: KeepaliveConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            compression: true,
            headers: BTreeMap::new(),
            tls: TlsConfig::default(),
            keepalive: KeepaliveConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub enabled: bool,
    pub num_consumers: usize,
    pub queue_size: usize,
    /// Wait for a free slot instead of failing with `QueueFull`
    pub block_on_full: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            num_consumers: DEFAULT_NUM_CONSUMERS,
            queue_size: DEFAULT_QUEUE_SIZE,
            block_on_full: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub enabled: bool,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub max_elapsed_time: Duration,
    pub multiplier: f64,
    pub randomization_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_interval: Duration::from_millis(DEFAULT_RETRY_INITIAL_INTERVAL_MS),
            max_interval: Duration::from_millis(DEFAULT_RETRY_MAX_INTERVAL_MS),
            max_elapsed_time: Duration::from_millis(DEFAULT_RETRY_MAX_ELAPSED_MS),
            multiplier: DEFAULT_RETRY_MULTIPLIER,
            randomization_factor: DEFAULT_RETRY_RANDOMIZATION_FACTOR,
        }
    }
}

/// Final merged application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Sanitized metric name prefix, empty for none
    pub namespace: String,
    pub const_labels: BTreeMap<String, String>,
    /// Per-attempt send timeout
    pub timeout: Duration,
    pub http: HttpConfig,
    pub queue: QueueConfig,
    pub retry: RetryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            const_labels: BTreeMap::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            http: HttpConfig::default(),
            queue: QueueConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.cortex-exporter/cortex-exporter.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading exporter configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        Self::build(file_config, cli)
    }

    /// Layer defaults, merged file config and CLI/env overrides, then validate
    pub fn build(file_config: FileConfig, cli: &CliConfig) -> Result<Self> {
        let file_http = file_config.http.unwrap_or_default();
        let file_tls = file_http.tls.unwrap_or_default();
        let file_keepalive = file_http.keepalive.unwrap_or_default();
        let file_queue = file_config.queue.unwrap_or_default();
        let file_retry = file_config.retry.unwrap_or_default();

        let namespace = cli
            .namespace
            .clone()
            .or(file_config.namespace)
            .map(|ns| sanitize_metric_name(ns.trim()))
            .unwrap_or_default();

        let tls = TlsConfig {
            ca_file: file_tls
                .ca_file
                .map(|path| expand_path(&path.to_string_lossy())),
            insecure: file_tls.insecure.unwrap_or(false),
            insecure_skip_verify: file_tls.insecure_skip_verify.unwrap_or(false),
        };

        let raw_endpoint = cli
            .endpoint
            .clone()
            .or(file_http.endpoint)
            .unwrap_or_default();
        let endpoint = normalize_endpoint(&raw_endpoint, &tls)?;

        // 0 disables the keepalive or idle timeout
        let keepalive_defaults = KeepaliveConfig::default();
        let keepalive = KeepaliveConfig {
            tcp_keepalive: match file_keepalive.tcp_keepalive_secs {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => keepalive_defaults.tcp_keepalive,
            },
            pool_idle_timeout: match file_keepalive.pool_idle_timeout_secs {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => keepalive_defaults.pool_idle_timeout,
            },
            pool_max_idle_per_host: file_keepalive
                .pool_max_idle_per_host
                .unwrap_or(keepalive_defaults.pool_max_idle_per_host),
        };

        let http = HttpConfig {
            endpoint,
            timeout: Duration::from_secs(
                file_http.timeout_secs.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            ),
            compression: cli.compression.or(file_http.compression).unwrap_or(true),
            headers: file_http.headers.unwrap_or_default(),
            tls,
            keepalive,
        };

        let queue = QueueConfig {
            enabled: cli.queue_enabled.or(file_queue.enabled).unwrap_or(true),
            num_consumers: cli
                .num_consumers
                .or(file_queue.num_consumers)
                .unwrap_or(DEFAULT_NUM_CONSUMERS),
            queue_size: cli
                .queue_size
                .or(file_queue.queue_size)
                .unwrap_or(DEFAULT_QUEUE_SIZE),
            block_on_full: file_queue.block_on_full.unwrap_or(true),
        };

        let retry = RetryConfig {
            enabled: cli.retry_enabled.or(file_retry.enabled).unwrap_or(true),
            initial_interval: Duration::from_millis(
                file_retry
                    .initial_interval_ms
                    .unwrap_or(DEFAULT_RETRY_INITIAL_INTERVAL_MS),
            ),
            max_interval: Duration::from_millis(
                file_retry
                    .max_interval_ms
                    .unwrap_or(DEFAULT_RETRY_MAX_INTERVAL_MS),
            ),
            max_elapsed_time: Duration::from_millis(
                file_retry
                    .max_elapsed_time_ms
                    .unwrap_or(DEFAULT_RETRY_MAX_ELAPSED_MS),
            ),
            multiplier: file_retry.multiplier.unwrap_or(DEFAULT_RETRY_MULTIPLIER),
            randomization_factor: file_retry
                .randomization_factor
                .unwrap_or(DEFAULT_RETRY_RANDOMIZATION_FACTOR),
        };

        let config = Self {
            namespace,
            const_labels: file_config.const_labels.unwrap_or_default(),
            timeout: Duration::from_secs(file_config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            http,
            queue,
            retry,
        };

        config.validate()?;
        tracing::debug!(
            endpoint = %config.http.endpoint,
            namespace = %config.namespace,
            queue_enabled = config.queue.enabled,
            retry_enabled = config.retry.enabled,
            "Configuration loaded"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.http.endpoint.starts_with("http://") && !self.http.endpoint.starts_with("https://")
        {
            anyhow::bail!(
                "Configuration error: http.endpoint must be an http(s) URL, got '{}'",
                self.http.endpoint
            );
        }

        if self.timeout.is_zero() {
            anyhow::bail!("Configuration error: timeout_secs must be greater than 0");
        }

        if self.queue.enabled {
            if self.queue.num_consumers == 0 {
                anyhow::bail!("Configuration error: queue.num_consumers must be greater than 0");
            }
            if self.queue.queue_size == 0 {
                anyhow::bail!("Configuration error: queue.queue_size must be greater than 0");
            }
        }

        if self.retry.initial_interval > self.retry.max_interval {
            anyhow::bail!(
                "Configuration error: retry.initial_interval_ms ({}) exceeds retry.max_interval_ms ({})",
                self.retry.initial_interval.as_millis(),
                self.retry.max_interval.as_millis()
            );
        }
        if self.retry.multiplier.is_nan() || self.retry.multiplier < 1.0 {
            anyhow::bail!(
                "Configuration error: retry.multiplier must be at least 1, got {}",
                self.retry.multiplier
            );
        }
        if !(0.0..1.0).contains(&self.retry.randomization_factor) {
            anyhow::bail!(
                "Configuration error: retry.randomization_factor must be in [0, 1), got {}",
                self.retry.randomization_factor
            );
        }

        for name in self.const_labels.keys() {
            if !is_valid_label_name(name) {
                anyhow::bail!("Configuration error: invalid constant label name '{}'", name);
            }
            if name == BUCKET_LABEL || name == QUANTILE_LABEL {
                anyhow::bail!(
                    "Configuration error: constant label '{}' is reserved for histogram and summary series",
                    name
                );
            }
            if name.starts_with("__") {
                anyhow::bail!(
                    "Configuration error: constant label '{}' uses the reserved '__' prefix",
                    name
                );
            }
        }

        if self.retry.enabled && self.retry.max_elapsed_time < self.retry.initial_interval {
            tracing::warn!(
                "retry.max_elapsed_time_ms is below retry.initial_interval_ms, failed batches will not be retried"
            );
        }

        Ok(())
    }
}

impl fmt::Display for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "endpoint:     {}", self.http.endpoint)?;
        writeln!(
            f,
            "namespace:    {}",
            if self.namespace.is_empty() { "-" } else { &self.namespace }
        )?;
        writeln!(f, "const labels: {}", self.const_labels.len())?;
        writeln!(f, "timeout:      {:?}", self.timeout)?;
        writeln!(f, "compression:  {}", self.http.compression)?;
        writeln!(
            f,
            "queue:        enabled={} consumers={} size={} block_on_full={}",
            self.queue.enabled,
            self.queue.num_consumers,
            self.queue.queue_size,
            self.queue.block_on_full
        )?;
        write!(
            f,
            "retry:        enabled={} initial={:?} max={:?} max_elapsed={:?}",
            self.retry.enabled,
            self.retry.initial_interval,
            self.retry.max_interval,
            self.retry.max_elapsed_time
        )
    }
}

/// Add a scheme to bare `host:port` endpoints. https is chosen when a CA
/// file is configured and `insecure` is off.
pub fn normalize_endpoint(endpoint: &str, tls: &TlsConfig) -> Result<String> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        anyhow::bail!("Configuration error: http.endpoint is required");
    }
    if endpoint.contains("://") {
        return Ok(endpoint.to_string());
    }
    let scheme = if tls.ca_file.is_some() && !tls.insecure {
        "https"
    } else {
        "http"
    };
    Ok(format!("{scheme}://{endpoint}"))
}

fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}
