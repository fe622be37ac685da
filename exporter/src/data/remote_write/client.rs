use async_trait::async_trait;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};

use super::encoding::EncodedBatch;
use super::error::TransportError;
use crate::core::config::HttpConfig;

pub const REMOTE_WRITE_VERSION_HEADER: &str = "X-Prometheus-Remote-Write-Version";
pub const REMOTE_WRITE_VERSION: &str = "0.1.0";
const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";

/// One transmission attempt of an encoded batch
#[async_trait]
pub trait RemoteWriteTransport: Send + Sync {
    async fn send(&self, batch: &EncodedBatch) -> Result<(), TransportError>;
}

#[derive(Debug, Clone)]
pub struct RemoteWriteClient {
    client: reqwest::Client,
    endpoint: String,
}

impl RemoteWriteClient {
    pub fn new(config: &HttpConfig) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::config(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::config(format!("invalid value for '{name}': {e}")))?;
            headers.insert(name, value);
        }

        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .tcp_keepalive(config.keepalive.tcp_keepalive)
            .pool_idle_timeout(config.keepalive.pool_idle_timeout)
            .pool_max_idle_per_host(config.keepalive.pool_max_idle_per_host);

        if let Some(ca_file) = &config.tls.ca_file {
            let pem = std::fs::read(ca_file).map_err(|e| {
                TransportError::config(format!("failed to read CA file {}: {e}", ca_file.display()))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| TransportError::config(format!("invalid CA certificate: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }
        if config.tls.insecure_skip_verify {
            tracing::warn!("TLS certificate verification disabled for remote write");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::config(format!("failed to build HTTP client: {e}")))?;

        tracing::debug!(
            endpoint = %config.endpoint,
            timeout_secs = config.timeout.as_secs(),
            "Remote write client initialized"
        );
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RemoteWriteTransport for RemoteWriteClient {
    async fn send(&self, batch: &EncodedBatch) -> Result<(), TransportError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, PROTOBUF_CONTENT_TYPE)
            .header(REMOTE_WRITE_VERSION_HEADER, REMOTE_WRITE_VERSION);
        if batch.compressed {
            request = request.header(CONTENT_ENCODING, "snappy");
        }

        let resp = request.body(batch.body.clone()).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(TransportError::status(status.as_u16(), body))
    }
}
