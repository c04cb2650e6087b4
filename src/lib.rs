/*!
 * Ferry - checksum-driven synchronization and transfer engine
 *
 * A client for a catalog-backed data store with:
 * - Probe-before-transfer upload deduplication via MD5 content digests
 * - Bounded retry with reconnect and fixed backoff on transport failure
 * - One reusable connection to a fixed host
 * - Manifest-driven self-update with atomic staged replacement
 * - Sequential, cancellable batch orchestration with per-item outcomes
 */

pub mod cancel;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod output;
pub mod remote;
pub mod update;

// Re-export commonly used types
pub use cancel::CancelToken;
pub use config::EngineConfig;
pub use crate::core::{
    BatchResult, Catalog, InterruptPolicy, Outcome, SyncOrchestrator, TransferItem,
    UploadRequestSource,
};
pub use error::{FerryError, Result};
pub use metadata::{resolve_record_pid, MetadataSource};
pub use remote::{CredentialProvider, HttpCatalogStore, ProbeOutcome, RemoteStore};
pub use update::{FileFetcher, HttpFetcher, Manifest, UpdateOutcome, Updater};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
