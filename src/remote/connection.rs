/*!
 * Connection management for the remote store
 *
 * One lazily-built client per manager, reused across requests. The manager
 * never retries: callers observe a transport error, call `reset()`, and own
 * the retry policy themselves.
 */

use reqwest::blocking::{Client, Request};
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

use crate::config::EngineConfig;
use crate::error::{FerryError, Result};

const USER_AGENT: &str = concat!("ferry/", env!("CARGO_PKG_VERSION"));

/// A fully-drained response from the remote store.
///
/// Draining happens inside [`ConnectionManager::execute`] on every path,
/// including error statuses, so an unread body can never poison the
/// connection for the next request.
#[derive(Debug, Clone)]
pub struct RemoteResponse {
    pub status: u16,
    pub content_md5: Option<String>,
    pub body: String,
}

impl RemoteResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Owns the one reusable connection to the configured host
pub struct ConnectionManager {
    base: Url,
    timeout: Duration,
    client: Mutex<Option<Client>>,
}

impl ConnectionManager {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| FerryError::Config(format!("invalid base URL {}: {}", base_url, e)))?;
        Ok(Self {
            base,
            timeout,
            client: Mutex::new(None),
        })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Self::new(&config.base_url(), config.http_timeout())
    }

    /// Base URL requests are resolved against
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Hand out the live client, building it on first use
    fn client(&self) -> Result<Client> {
        let mut guard = self.client.lock().unwrap();
        match guard.as_ref() {
            Some(client) => Ok(client.clone()),
            None => {
                tracing::debug!(base = %self.base, "opening connection");
                let client = Client::builder()
                    .timeout(self.timeout)
                    .pool_max_idle_per_host(1)
                    .user_agent(USER_AGENT)
                    .build()
                    .map_err(|e| FerryError::Transport(format!("cannot build client: {}", e)))?;
                *guard = Some(client.clone());
                Ok(client)
            }
        }
    }

    /// Close the live connection; the next request reopens it
    pub fn reset(&self) {
        tracing::debug!(base = %self.base, "resetting connection");
        *self.client.lock().unwrap() = None;
    }

    /// Send one request and drain its response
    pub fn execute(&self, request: Request) -> Result<RemoteResponse> {
        let client = self.client()?;
        let response = client
            .execute(request)
            .map_err(|e| FerryError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let content_md5 = response
            .headers()
            .get("content-md5")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .map_err(|e| FerryError::Transport(e.to_string()))?;

        tracing::debug!(status, bytes = body.len(), "response drained");
        Ok(RemoteResponse {
            status,
            content_md5,
            body,
        })
    }
}
