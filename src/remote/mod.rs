/*!
 * Remote catalog store: connection management, probing, and transfer
 */

mod connection;
mod store;

pub use connection::{ConnectionManager, RemoteResponse};
pub use store::{expand_multi_values, HttpCatalogStore};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::path::Path;

use crate::config::EngineConfig;
use crate::core::progress::ProgressPublisher;
use crate::error::{FerryError, Result};

/// Result of an existence probe against the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Target absent remotely
    NotFound,
    /// Remote digest equals the local one
    FoundIdentical,
    /// Remote exists but its digest differs or is unknown
    FoundDifferent,
}

/// Operations the sync engine needs from a catalog-backed store.
///
/// The HTTP implementation lives in [`HttpCatalogStore`]; tests substitute
/// in-memory implementations.
pub trait RemoteStore {
    /// Create a collection record from metadata pairs; returns the new pid
    fn create_record(&self, metadata: &[(String, String)]) -> Result<String>;

    /// Link a record to a related pid; returns whether the remote accepted it
    fn add_relation(&self, pid: &str, link_type: &str, related_pid: &str) -> Result<bool>;

    /// Check whether `target` already exists under `pid` with `digest`
    fn probe(&self, pid: &str, target: &str, digest: &str) -> Result<ProbeOutcome>;

    /// Upload one file to `target` under `pid`
    fn upload(
        &self,
        pid: &str,
        source: &Path,
        target: &str,
        digest: &str,
        publisher: &ProgressPublisher,
    ) -> Result<()>;
}

/// Seam for whatever produces the opaque credential the engine attaches to
/// requests (config file, federated-login exchange, ...). The engine only
/// sees header pairs.
pub trait CredentialProvider {
    fn credential_headers(&self) -> Result<Vec<(String, String)>>;
}

impl CredentialProvider for EngineConfig {
    fn credential_headers(&self) -> Result<Vec<(String, String)>> {
        if let Some(ref token) = self.token {
            return Ok(vec![("X-Auth-Token".to_string(), token.clone())]);
        }
        if let (Some(ref user), Some(ref pass)) = (&self.username, &self.password) {
            let encoded = BASE64.encode(format!("{}:{}", user, pass));
            return Ok(vec![(
                "Authorization".to_string(),
                format!("Basic {}", encoded),
            )]);
        }
        Err(FerryError::AuthConfiguration(
            "configure either a token or a username and password".to_string(),
        ))
    }
}
