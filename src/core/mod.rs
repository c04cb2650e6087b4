/*!
 * Core synchronization engine: digesting, diffing, retrying, orchestration
 */

pub mod catalog;
pub mod differ;
pub mod digest;
pub mod orchestrator;
pub mod progress;
pub mod retry;

pub use catalog::{BatchResult, Catalog, Outcome, TransferItem, UploadRequestSource};
pub use orchestrator::{InterruptPolicy, SyncOrchestrator};
