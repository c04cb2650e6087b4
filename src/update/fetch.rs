/*!
 * File download seam for the update pipeline
 */

use reqwest::blocking::Client;
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::core::retry::with_reconnect;
use crate::error::{FerryError, Result};

const USER_AGENT: &str = concat!("ferry/", env!("CARGO_PKG_VERSION"));

/// Downloads one resource to a local path.
///
/// Manifest entries may point at arbitrary hosts, so this seam is separate
/// from the catalog store's fixed-host connection. Tests substitute
/// in-memory implementations.
pub trait FileFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()>;
}

/// HTTP implementation with the same reconnect-and-retry discipline as the
/// upload pipeline
pub struct HttpFetcher {
    timeout: Duration,
    attempts: u32,
    backoff: Duration,
    cancel: CancelToken,
    client: Mutex<Option<Client>>,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, attempts: u32, backoff: Duration, cancel: CancelToken) -> Self {
        Self {
            timeout,
            attempts,
            backoff,
            cancel,
            client: Mutex::new(None),
        }
    }

    fn client(&self) -> Result<Client> {
        let mut guard = self.client.lock().unwrap();
        match guard.as_ref() {
            Some(client) => Ok(client.clone()),
            None => {
                let client = Client::builder()
                    .timeout(self.timeout)
                    .user_agent(USER_AGENT)
                    .build()
                    .map_err(|e| FerryError::Transport(format!("cannot build client: {}", e)))?;
                *guard = Some(client.clone());
                Ok(client)
            }
        }
    }

    fn reset(&self) {
        *self.client.lock().unwrap() = None;
    }
}

impl FileFetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        with_reconnect(
            self.attempts,
            self.backoff,
            &self.cancel,
            || self.reset(),
            || {
                let client = self.client()?;
                let mut response = client
                    .get(url)
                    .send()
                    .map_err(|e| FerryError::Transport(e.to_string()))?;

                let status = response.status().as_u16();
                if !response.status().is_success() {
                    // Drain before reporting so the connection stays usable
                    let body = response.text().unwrap_or_default();
                    return Err(FerryError::RemoteRejection { status, body });
                }

                // A truncating create keeps a retried attempt from appending
                // to a half-written file.
                let mut out = File::create(dest)?;
                response
                    .copy_to(&mut out)
                    .map_err(|e| FerryError::Transport(e.to_string()))?;
                tracing::debug!(url = %url, dest = %dest.display(), "downloaded");
                Ok(())
            },
        )
    }
}
