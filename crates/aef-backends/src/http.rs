use std::collections::HashMap;
use std::time::Duration;

use aef_types::Event;
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Configuration for [`HttpBackend`]
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// Base URL of the ingestion service (required)
    pub base_url: String,
    /// Per-request wall-clock timeout
    pub timeout: Duration,
    /// Extra headers merged over the default content-type
    pub headers: HashMap<String, String>,
    /// Idle keep-alive connections retained per host
    pub max_keepalive_connections: usize,
    /// How long an idle connection is kept alive
    pub keepalive_expiry: Duration,
    pub retry: RetryPolicy,
}

impl HttpBackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(5),
            headers: HashMap::new(),
            max_keepalive_connections: 100,
            keepalive_expiry: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// Backend that POSTs batches to a remote ingestion endpoint.
///
/// A batch of one goes to `/events` as a single object; larger batches go
/// to `/events/batch` as an array. Transient failures (connect, timeout,
/// 5xx, 429) are retried under the configured [`RetryPolicy`]; other
/// statuses are terminal.
#[derive(Debug)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HttpBackend {
    pub fn new(config: HttpBackendConfig) -> Result<Self> {
        if config.base_url.is_empty() {
            return Err(Error::Config(
                "HttpBackend requires a base_url".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Config(format!("invalid header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::Config(format!("invalid header value: {}", e)))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .pool_max_idle_per_host(config.max_keepalive_connections)
            .pool_idle_timeout(config.keepalive_expiry)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: config.retry,
        })
    }

    async fn post_once(&self, url: &str, body: &Value) -> Result<()> {
        let response = self.client.post(url).json(body).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(512).collect();
        Err(Error::Status {
            status: status.as_u16(),
            body: snippet,
        })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn write(&self, batch: &[Event]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let (endpoint, body) = if batch.len() == 1 {
            ("/events", batch[0].to_value().map_err(json_error)?)
        } else {
            let values = batch
                .iter()
                .map(Event::to_value)
                .collect::<aef_types::Result<Vec<Value>>>()
                .map_err(json_error)?;
            ("/events/batch", Value::Array(values))
        };
        let url = format!("{}{}", self.base_url, endpoint);

        let mut attempt = 0;
        loop {
            match self.post_once(&url, &body).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay(attempt);
                    tracing::debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %err,
                        "retrying batch delivery"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn close(&self) -> Result<()> {
        // reqwest pools are released on drop
        Ok(())
    }

    fn retries_writes(&self) -> bool {
        true
    }
}

fn json_error(err: aef_types::Error) -> Error {
    Error::Invalid(err.to_string())
}
