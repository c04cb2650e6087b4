/*!
 * Batch orchestration for the upload pipeline
 *
 * Items are processed strictly in catalog order on one control thread. One
 * item's full probe/transfer/retry cycle completes before the next starts,
 * and one item's failure never aborts the batch: every catalog item appears
 * exactly once in the result.
 */

use crate::cancel::{CancelToken, SleepOutcome};
use crate::config::EngineConfig;
use crate::core::catalog::{BatchResult, Catalog, Outcome, TransferItem};
use crate::core::differ::{upload_decision, TransferDecision};
use crate::core::digest::file_digest;
use crate::core::progress::ProgressPublisher;
use crate::error::FerryError;
use crate::remote::RemoteStore;

/// What to do when the inter-item pacing delay is interrupted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterruptPolicy {
    /// Clear the cancellation and continue with the next item
    #[default]
    Resume,
    /// Stop the batch; unattempted items are recorded as failed
    Abort,
}

/// Per-item phase, for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemPhase {
    Probing,
    Transferring,
}

/// Drives one batch of transfers against a remote store
pub struct SyncOrchestrator<'a, S: RemoteStore> {
    store: &'a S,
    config: &'a EngineConfig,
    cancel: CancelToken,
    publisher: ProgressPublisher,
    interrupt_policy: InterruptPolicy,
}

impl<'a, S: RemoteStore> SyncOrchestrator<'a, S> {
    pub fn new(store: &'a S, config: &'a EngineConfig) -> Self {
        Self {
            store,
            config,
            cancel: CancelToken::new(),
            publisher: ProgressPublisher::noop(),
            interrupt_policy: InterruptPolicy::default(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_publisher(mut self, publisher: ProgressPublisher) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn with_interrupt_policy(mut self, policy: InterruptPolicy) -> Self {
        self.interrupt_policy = policy;
        self
    }

    /// Process every catalog item in insertion order and aggregate outcomes
    pub fn run(&self, pid: &str, catalog: &Catalog) -> BatchResult {
        let mut result = BatchResult::new();
        let total = catalog.len();
        let mut aborted = false;

        for (index, item) in catalog.iter().enumerate() {
            if aborted {
                result.push(item.clone(), Outcome::Failed("batch cancelled".to_string()));
                continue;
            }

            // Pacing elapses between items, never before the first one
            if index > 0 && !self.pace_before_next_item() {
                aborted = true;
                result.push(item.clone(), Outcome::Failed("batch cancelled".to_string()));
                continue;
            }

            tracing::info!(
                item = index + 1,
                total,
                target = %item.target,
                "processing item"
            );
            let outcome = self.process_item(pid, item);
            tracing::info!(target = %item.target, outcome = outcome.label(), "item finished");
            result.push(item.clone(), outcome);
        }

        tracing::info!(
            succeeded = result.succeeded(),
            skipped = result.skipped(),
            failed = result.failed(),
            "batch complete"
        );
        result
    }

    /// Wait out the pacing delay; returns false when the batch should abort
    fn pace_before_next_item(&self) -> bool {
        let delay = self.config.pacing_delay();
        if delay.is_zero() {
            return true;
        }
        match self.cancel.sleep(delay) {
            SleepOutcome::Completed => true,
            SleepOutcome::Interrupted => match self.interrupt_policy {
                InterruptPolicy::Resume => {
                    tracing::info!("pacing delay interrupted, resuming batch");
                    self.cancel.reset();
                    true
                }
                InterruptPolicy::Abort => {
                    tracing::warn!("pacing delay interrupted, aborting batch");
                    false
                }
            },
        }
    }

    fn process_item(&self, pid: &str, item: &TransferItem) -> Outcome {
        // A missing source fails the item before any network traffic
        if !item.source.is_file() {
            return Outcome::Failed(
                FerryError::LocalFileMissing(item.source.clone()).to_string(),
            );
        }

        let digest = match &item.digest {
            Some(d) => d.clone(),
            None => match file_digest(&item.source, &self.publisher) {
                Ok(d) => d,
                Err(e) => return Outcome::Failed(e.to_string()),
            },
        };

        tracing::debug!(target = %item.target, phase = ?ItemPhase::Probing);
        let probe = self.store.probe(pid, &item.target, &digest);

        match upload_decision(probe) {
            TransferDecision::Skip => Outcome::SkippedIdentical,
            TransferDecision::Transfer => {
                tracing::debug!(target = %item.target, phase = ?ItemPhase::Transferring);
                match self.store.upload(
                    pid,
                    &item.source,
                    &item.target,
                    &digest,
                    &self.publisher,
                ) {
                    Ok(()) => Outcome::Success,
                    Err(e) => Outcome::Failed(e.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::remote::ProbeOutcome;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::io::Write;
    use std::path::Path;

    /// In-memory store scripted per target
    #[derive(Default)]
    struct MockStore {
        remote: RefCell<HashMap<String, String>>,
        probe_errors: Vec<String>,
        upload_rejections: Vec<String>,
        probe_calls: RefCell<Vec<String>>,
        upload_calls: RefCell<Vec<String>>,
    }

    impl RemoteStore for MockStore {
        fn create_record(&self, _metadata: &[(String, String)]) -> Result<String> {
            Ok("test:1".to_string())
        }

        fn add_relation(&self, _pid: &str, _lt: &str, _rp: &str) -> Result<bool> {
            Ok(true)
        }

        fn probe(&self, _pid: &str, target: &str, digest: &str) -> Result<ProbeOutcome> {
            self.probe_calls.borrow_mut().push(target.to_string());
            if self.probe_errors.iter().any(|t| t == target) {
                return Err(FerryError::Transport("probe timed out".to_string()));
            }
            match self.remote.borrow().get(target) {
                None => Ok(ProbeOutcome::NotFound),
                Some(remote) if remote == digest => Ok(ProbeOutcome::FoundIdentical),
                Some(_) => Ok(ProbeOutcome::FoundDifferent),
            }
        }

        fn upload(
            &self,
            _pid: &str,
            _source: &Path,
            target: &str,
            digest: &str,
            _publisher: &ProgressPublisher,
        ) -> Result<()> {
            self.upload_calls.borrow_mut().push(target.to_string());
            if self.upload_rejections.iter().any(|t| t == target) {
                return Err(FerryError::RemoteRejection {
                    status: 400,
                    body: "rejected".to_string(),
                });
            }
            self.remote
                .borrow_mut()
                .insert(target.to_string(), digest.to_string());
            Ok(())
        }
    }

    fn no_pacing_config() -> EngineConfig {
        EngineConfig {
            pacing_delay_secs: 0,
            ..Default::default()
        }
    }

    fn catalog_with_files(dir: &Path, names: &[&str]) -> Catalog {
        let mut catalog = Catalog::new();
        for name in names {
            let path = dir.join(name);
            let mut f = std::fs::File::create(&path).unwrap();
            writeln!(f, "content of {}", name).unwrap();
            catalog.insert(TransferItem::new(path, *name));
        }
        catalog
    }

    #[test]
    fn test_outcomes_follow_catalog_order() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog_with_files(dir.path(), &["a.csv", "b.csv", "c.csv"]);

        let store = MockStore {
            upload_rejections: vec!["b.csv".to_string()],
            ..Default::default()
        };
        let config = no_pacing_config();
        let result = SyncOrchestrator::new(&store, &config).run("test:1", &catalog);

        let outcomes: Vec<_> = result
            .iter()
            .map(|(item, o)| (item.target.clone(), o.label()))
            .collect();
        assert_eq!(
            outcomes,
            vec![
                ("a.csv".to_string(), "SUCCESS"),
                ("b.csv".to_string(), "FAILED"),
                ("c.csv".to_string(), "SUCCESS"),
            ]
        );
    }

    #[test]
    fn test_second_run_skips_identical_items() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog_with_files(dir.path(), &["a.csv", "b.csv"]);

        let store = MockStore::default();
        let config = no_pacing_config();
        let orchestrator = SyncOrchestrator::new(&store, &config);

        let first = orchestrator.run("test:1", &catalog);
        assert_eq!(first.succeeded(), 2);

        let second = orchestrator.run("test:1", &catalog);
        assert_eq!(second.skipped(), 2);
        assert_eq!(second.succeeded(), 0);
        // No re-upload happened on the second pass
        assert_eq!(store.upload_calls.borrow().len(), 2);
    }

    #[test]
    fn test_missing_source_fails_without_remote_contact() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = catalog_with_files(dir.path(), &["a.csv"]);
        catalog.insert(TransferItem::new(dir.path().join("missing.csv"), "missing.csv"));

        let store = MockStore::default();
        let config = no_pacing_config();
        let result = SyncOrchestrator::new(&store, &config).run("test:1", &catalog);

        assert_eq!(result.failed(), 1);
        assert_eq!(result.succeeded(), 1);
        // The missing item never reached the store
        assert!(!store.probe_calls.borrow().contains(&"missing.csv".to_string()));
    }

    #[test]
    fn test_probe_failure_still_transfers() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog_with_files(dir.path(), &["a.csv"]);

        let store = MockStore {
            probe_errors: vec!["a.csv".to_string()],
            ..Default::default()
        };
        let config = no_pacing_config();
        let result = SyncOrchestrator::new(&store, &config).run("test:1", &catalog);

        assert_eq!(result.succeeded(), 1);
        assert_eq!(store.upload_calls.borrow().len(), 1);
    }

    #[test]
    fn test_abort_policy_records_unattempted_items() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog_with_files(dir.path(), &["a.csv", "b.csv", "c.csv"]);

        let cancel = CancelToken::new();
        cancel.cancel();
        let config = EngineConfig {
            pacing_delay_secs: 1,
            ..Default::default()
        };
        let store = MockStore::default();
        let result = SyncOrchestrator::new(&store, &config)
            .with_cancel(cancel)
            .with_interrupt_policy(InterruptPolicy::Abort)
            .run("test:1", &catalog);

        // First item runs before any pacing delay; the rest are recorded
        assert_eq!(result.len(), 3);
        assert_eq!(result.succeeded(), 1);
        assert_eq!(result.failed(), 2);
    }

    #[test]
    fn test_resume_policy_continues_after_interruption() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog_with_files(dir.path(), &["a.csv", "b.csv"]);

        let cancel = CancelToken::new();
        cancel.cancel();
        let config = EngineConfig {
            pacing_delay_secs: 1,
            ..Default::default()
        };
        let store = MockStore::default();
        let result = SyncOrchestrator::new(&store, &config)
            .with_cancel(cancel)
            .with_interrupt_policy(InterruptPolicy::Resume)
            .run("test:1", &catalog);

        assert_eq!(result.succeeded(), 2);
        assert_eq!(result.failed(), 0);
    }
}
