/*!
 * Catalog and batch-result types
 *
 * A catalog is built once per run and never mutated mid-transfer; per-item
 * status lives in the batch result, which the orchestrator appends to exactly
 * once per item and which is read-only afterwards.
 */

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// One candidate transfer: a local byte source bound for a remote target path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferItem {
    /// Local source file
    pub source: PathBuf,
    /// Target path within the remote record's data tree
    pub target: String,
    /// Content digest, when already known; computed lazily otherwise
    pub digest: Option<String>,
}

impl TransferItem {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            digest: None,
        }
    }
}

/// Terminal outcome for one catalog item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    SkippedIdentical,
    Failed(String),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success => "SUCCESS",
            Outcome::SkippedIdentical => "SKIPPED",
            Outcome::Failed(_) => "FAILED",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

/// Insertion-ordered mapping from remote target to transfer item.
///
/// Targets are unique within a batch: inserting an existing target replaces
/// the item while keeping its first-insertion position, so outcome ordering
/// stays stable when a later source overrides an earlier one.
#[derive(Debug, Default)]
pub struct Catalog {
    items: Vec<TransferItem>,
    index: HashMap<String, usize>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, item: TransferItem) {
        match self.index.get(&item.target) {
            Some(&pos) => self.items[pos] = item,
            None => {
                self.index.insert(item.target.clone(), self.items.len());
                self.items.push(item);
            }
        }
    }

    pub fn get(&self, target: &str) -> Option<&TransferItem> {
        self.index.get(target).map(|&pos| &self.items[pos])
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransferItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Merge another catalog's items into this one, in their order
    pub fn extend(&mut self, other: Catalog) {
        for item in other.items {
            self.insert(item);
        }
    }
}

/// Ordered record of every item's outcome for one batch
#[derive(Debug, Default)]
pub struct BatchResult {
    records: Vec<(TransferItem, Outcome)>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: TransferItem, outcome: Outcome) {
        self.records.push((item, outcome));
    }

    pub fn iter(&self) -> impl Iterator<Item = &(TransferItem, Outcome)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.records
            .iter()
            .filter(|(_, o)| matches!(o, Outcome::Success))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.records
            .iter()
            .filter(|(_, o)| matches!(o, Outcome::SkippedIdentical))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.records.iter().filter(|(_, o)| o.is_failure()).count()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }
}

/// Seam for front ends that supply upload requests (metadata files, GUIs).
/// The engine never depends on their internals.
pub trait UploadRequestSource {
    fn items(&self) -> Result<Catalog>;
}

/// Build a catalog entry for a bare local path: the target is the file name
pub fn item_for_path(path: &Path) -> TransferItem {
    let target = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());
    TransferItem::new(path, target)
}
