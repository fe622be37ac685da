use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::constants::{
    APP_NAME, ENV_COMPRESSION, ENV_CONFIG, ENV_ENDPOINT, ENV_NAMESPACE, ENV_NUM_CONSUMERS,
    ENV_QUEUE_ENABLED, ENV_QUEUE_SIZE, ENV_RETRY_ENABLED,
};

#[derive(Parser)]
#[command(name = APP_NAME)]
#[command(version, about = "Export metric batches to Cortex/Prometheus remote write", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Remote-write endpoint (host:port or full URL)
    #[arg(long, global = true, env = ENV_ENDPOINT)]
    pub endpoint: Option<String>,

    /// Prefix added to every metric name
    #[arg(long, global = true, env = ENV_NAMESPACE)]
    pub namespace: Option<String>,

    /// Snappy-compress request bodies
    #[arg(long, global = true, env = ENV_COMPRESSION)]
    pub compression: Option<bool>,

    /// Send through the bounded delivery queue
    #[arg(long, global = true, env = ENV_QUEUE_ENABLED)]
    pub queue_enabled: Option<bool>,

    /// Number of delivery workers
    #[arg(long, global = true, env = ENV_NUM_CONSUMERS)]
    pub num_consumers: Option<usize>,

    /// Delivery queue capacity in batches
    #[arg(long, global = true, env = ENV_QUEUE_SIZE)]
    pub queue_size: Option<usize>,

    /// Retry retryable delivery failures with backoff
    #[arg(long, global = true, env = ENV_RETRY_ENABLED)]
    pub retry_enabled: Option<bool>,
}

#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Export JSON-lines metric batches (default command)
    Export {
        /// Input file, or `-` for stdin
        #[arg(long, short = 'i')]
        input: Option<String>,
    },
    /// Load and validate configuration, then print it
    Check,
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub config: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub namespace: Option<String>,
    pub compression: Option<bool>,
    pub queue_enabled: Option<bool>,
    pub num_consumers: Option<usize>,
    pub queue_size: Option<usize>,
    pub retry_enabled: Option<bool>,
}

impl From<Cli> for CliConfig {
    fn from(cli: Cli) -> Self {
        Self {
            config: cli.config,
            endpoint: cli.endpoint,
            namespace: cli.namespace,
            compression: cli.compression,
            queue_enabled: cli.queue_enabled,
            num_consumers: cli.num_consumers,
            queue_size: cli.queue_size,
            retry_enabled: cli.retry_enabled,
        }
    }
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let mut cli = Cli::parse();
    let command = cli.command.take();
    (cli.into(), command)
}
