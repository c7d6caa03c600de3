//! Bootstrap Service
//!
//! The post-restore call that establishes the support account in the running
//! service. Reachable only after services start, hence retried by the caller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::errors::{LifecycleError, LifecycleResult};

/// A single bootstrap attempt
#[async_trait]
pub trait BootstrapService: Send + Sync {
    async fn bootstrap(&self) -> LifecycleResult<()>;
}

/// Bootstrap over HTTP: `POST <url>`, any 2xx is success
#[derive(Debug, Clone)]
pub struct HttpBootstrap {
    client: Client,
    url: String,
}

impl HttpBootstrap {
    pub fn new(url: impl Into<String>, timeout: Duration) -> LifecycleResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LifecycleError::bootstrap_failed(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl BootstrapService for HttpBootstrap {
    async fn bootstrap(&self) -> LifecycleResult<()> {
        self.client
            .post(&self.url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map(|_| ())
            .map_err(|e| LifecycleError::bootstrap_failed(format!("{}: {}", self.url, e)))
    }
}
