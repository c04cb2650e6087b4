/*!
 * Skip/transfer decisions for both pipelines
 */

use crate::error::Result;
use crate::remote::ProbeOutcome;

/// Per-item decision on the upload path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDecision {
    Skip,
    Transfer,
}

/// Decide whether an item must be transferred, given its probe result.
///
/// A probe that could not be completed fails open toward re-transfer: the
/// worst case of transferring an identical file is wasted bandwidth, while
/// skipping a file that might differ loses data.
pub fn upload_decision(probe: Result<ProbeOutcome>) -> TransferDecision {
    match probe {
        Ok(ProbeOutcome::FoundIdentical) => TransferDecision::Skip,
        Ok(ProbeOutcome::NotFound) | Ok(ProbeOutcome::FoundDifferent) => {
            TransferDecision::Transfer
        }
        Err(e) => {
            tracing::warn!(error = %e, "probe failed, transferring anyway");
            TransferDecision::Transfer
        }
    }
}

/// Batch-level decision on the update path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateDecision {
    /// Replace the installation with the fetched manifest's files
    Proceed,
    /// Leave the installation alone
    NotNewer,
}

/// Compare the fetched manifest version against the previously applied one.
///
/// The force flag waives the equal-version block and substitutes for a
/// missing baseline; it never promotes an older manifest.
pub fn update_decision(previous: Option<i64>, fetched: i64, force: bool) -> UpdateDecision {
    match previous {
        None => {
            if force {
                UpdateDecision::Proceed
            } else {
                UpdateDecision::NotNewer
            }
        }
        Some(prev) if fetched > prev => UpdateDecision::Proceed,
        Some(prev) if fetched == prev && force => UpdateDecision::Proceed,
        Some(_) => UpdateDecision::NotNewer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FerryError;

    #[test]
    fn test_identical_skips() {
        assert_eq!(
            upload_decision(Ok(ProbeOutcome::FoundIdentical)),
            TransferDecision::Skip
        );
    }

    #[test]
    fn test_absent_or_different_transfers() {
        assert_eq!(
            upload_decision(Ok(ProbeOutcome::NotFound)),
            TransferDecision::Transfer
        );
        assert_eq!(
            upload_decision(Ok(ProbeOutcome::FoundDifferent)),
            TransferDecision::Transfer
        );
    }

    #[test]
    fn test_probe_failure_fails_open_to_transfer() {
        let err = Err(FerryError::Transport("connection reset".to_string()));
        assert_eq!(upload_decision(err), TransferDecision::Transfer);
    }

    #[test]
    fn test_newer_version_proceeds() {
        assert_eq!(update_decision(Some(5), 6, false), UpdateDecision::Proceed);
        assert_eq!(update_decision(Some(5), 6, true), UpdateDecision::Proceed);
    }

    #[test]
    fn test_equal_version_needs_force() {
        assert_eq!(update_decision(Some(5), 5, false), UpdateDecision::NotNewer);
        assert_eq!(update_decision(Some(5), 5, true), UpdateDecision::Proceed);
    }

    #[test]
    fn test_older_version_blocked_even_with_force() {
        assert_eq!(update_decision(Some(5), 4, false), UpdateDecision::NotNewer);
        assert_eq!(update_decision(Some(5), 4, true), UpdateDecision::NotNewer);
    }

    #[test]
    fn test_missing_baseline_needs_force() {
        assert_eq!(update_decision(None, 7, false), UpdateDecision::NotNewer);
        assert_eq!(update_decision(None, 7, true), UpdateDecision::Proceed);
    }
}
