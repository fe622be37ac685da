// =============================================================================
// Application Identity
// =============================================================================

/// Application name (for display, paths and identifiers)
pub const APP_NAME: &str = "cortex-exporter";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".cortex-exporter";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "cortex-exporter.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "CORTEX_EXPORTER_CONFIG";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "CORTEX_EXPORTER_LOG";

// =============================================================================
// Environment Variables - Exporter
// =============================================================================

/// Environment variable for the remote-write endpoint
pub const ENV_ENDPOINT: &str = "CORTEX_EXPORTER_ENDPOINT";

/// Environment variable for the metric name namespace
pub const ENV_NAMESPACE: &str = "CORTEX_EXPORTER_NAMESPACE";

/// Environment variable to enable or disable snappy compression
pub const ENV_COMPRESSION: &str = "CORTEX_EXPORTER_COMPRESSION";

/// Environment variable to enable or disable the delivery queue
pub const ENV_QUEUE_ENABLED: &str = "CORTEX_EXPORTER_QUEUE_ENABLED";

/// Environment variable for the number of delivery workers
pub const ENV_NUM_CONSUMERS: &str = "CORTEX_EXPORTER_NUM_CONSUMERS";

/// Environment variable for the delivery queue capacity
pub const ENV_QUEUE_SIZE: &str = "CORTEX_EXPORTER_QUEUE_SIZE";

/// Environment variable to enable or disable retries
pub const ENV_RETRY_ENABLED: &str = "CORTEX_EXPORTER_RETRY_ENABLED";

// =============================================================================
// Delivery Defaults
// =============================================================================

/// Per-attempt send timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Overall HTTP client request timeout
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_TCP_KEEPALIVE_SECS: u64 = 30;

pub const DEFAULT_POOL_IDLE_TIMEOUT_SECS: u64 = 90;

pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 32;

pub const DEFAULT_NUM_CONSUMERS: usize = 10;

pub const DEFAULT_QUEUE_SIZE: usize = 5000;

// =============================================================================
// Retry Defaults
// =============================================================================

pub const DEFAULT_RETRY_INITIAL_INTERVAL_MS: u64 = 5_000;

pub const DEFAULT_RETRY_MAX_INTERVAL_MS: u64 = 30_000;

pub const DEFAULT_RETRY_MAX_ELAPSED_MS: u64 = 300_000;

pub const DEFAULT_RETRY_MULTIPLIER: f64 = 2.0;

pub const DEFAULT_RETRY_RANDOMIZATION_FACTOR: f64 = 0.5;

// =============================================================================
// Shutdown
// =============================================================================

/// Maximum time to wait for queued batches to drain on shutdown
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;
