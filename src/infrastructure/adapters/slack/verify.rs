//! Pre-flight TLS verification
//!
//! Some networks serve an incomplete certificate chain for a while after
//! startup. When peer verification is switched off for the RTM stream, a
//! plain HTTPS handshake is retried against Slack until it succeeds, and
//! only then is the stream opened.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::application::errors::BotError;

/// Host probed before connecting
pub const DEFAULT_VERIFY_HOST: &str = "wss-primary.slack.com";

/// Bounded retry with a fixed delay between attempts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(5),
        }
    }
}

/// A single TLS handshake attempt against `host:443`
#[async_trait]
pub trait TlsProbe: Send + Sync {
    async fn handshake(&self, host: &str) -> Result<(), String>;
}

/// Probe backed by reqwest: any HTTP response means the handshake completed
pub struct HttpsProbe {
    client: Client,
}

impl HttpsProbe {
    pub fn new(proxy: Option<&str>) -> Result<Self, BotError> {
        let mut builder = Client::builder().timeout(Duration::from_secs(30));
        if let Some(proxy) = proxy {
            builder = builder.proxy(
                reqwest::Proxy::all(proxy).map_err(|e| BotError::Network(e.to_string()))?,
            );
        }
        let client = builder
            .build()
            .map_err(|e| BotError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TlsProbe for HttpsProbe {
    async fn handshake(&self, host: &str) -> Result<(), String> {
        let url = format!("https://{}:443/", host);
        self.client
            .head(&url)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// Runs the probe until it succeeds or the policy is exhausted
///
/// Returns the number of attempts used. Sleeps only between attempts.
pub async fn verify_connection(
    probe: &dyn TlsProbe,
    host: &str,
    policy: &RetryPolicy,
) -> Result<u32, BotError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match probe.handshake(host).await {
            Ok(()) => {
                tracing::info!("TLS connection to {} is verified (attempt {})", host, attempt);
                return Ok(attempt);
            }
            Err(reason) if attempt == max_attempts => {
                tracing::error!(
                    "TLS connection to {} is not verified after {} attempts: {}",
                    host,
                    attempt,
                    reason
                );
                return Err(BotError::Tls { attempts: attempt, reason });
            }
            Err(reason) => {
                tracing::warn!(
                    "TLS connection to {} is not verified. Retry {}/{}: {}",
                    host,
                    attempt,
                    max_attempts,
                    reason
                );
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}
