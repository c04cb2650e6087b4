/*!
 * Run summaries in human-readable and JSON form
 */

use comfy_table::{presets, Cell, ContentArrangement, Table};
use console::style;
use serde::Serialize;

use crate::core::catalog::{BatchResult, Outcome};
use crate::update::UpdateOutcome;

/// Output mode for CLI results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

#[derive(Debug, Serialize)]
struct ItemRow {
    target: String,
    source: String,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct BatchSummary {
    pid: String,
    completed_at: String,
    items: Vec<ItemRow>,
    succeeded: usize,
    skipped: usize,
    failed: usize,
}

/// Writes final summaries; every catalog item appears exactly once
#[derive(Debug, Clone)]
pub struct SummaryWriter {
    pub mode: OutputMode,
}

impl SummaryWriter {
    pub fn new(json: bool) -> Self {
        Self {
            mode: if json {
                OutputMode::Json
            } else {
                OutputMode::Human
            },
        }
    }

    pub fn batch_summary(&self, pid: &str, result: &BatchResult) {
        match self.mode {
            OutputMode::Json => {
                let summary = batch_summary_model(pid, result);
                if let Ok(json) = serde_json::to_string(&summary) {
                    println!("{}", json);
                }
            }
            OutputMode::Human => print_batch_table(pid, result),
        }
    }

    pub fn update_summary(&self, outcome: &UpdateOutcome) {
        match self.mode {
            OutputMode::Json => {
                if let Ok(json) = serde_json::to_string(&update_summary_model(outcome)) {
                    println!("{}", json);
                }
            }
            OutputMode::Human => match outcome {
                UpdateOutcome::Disabled => {
                    println!("Update checks are disabled by the sentinel file.")
                }
                UpdateOutcome::Deferred => {
                    println!("Update check deferred; the local manifest is recent.")
                }
                UpdateOutcome::NotNewer { version } => {
                    println!("Already current (remote version {}).", version)
                }
                UpdateOutcome::Updated {
                    version,
                    files_replaced,
                } => println!(
                    "Updated to version {} ({} file(s) replaced).",
                    version, files_replaced
                ),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct UpdateSummary {
    operation: &'static str,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    files_replaced: Option<usize>,
}

fn update_summary_model(outcome: &UpdateOutcome) -> UpdateSummary {
    let (label, version, files_replaced) = match outcome {
        UpdateOutcome::Disabled => ("disabled", None, None),
        UpdateOutcome::Deferred => ("deferred", None, None),
        UpdateOutcome::NotNewer { version } => ("not-newer", Some(*version), None),
        UpdateOutcome::Updated {
            version,
            files_replaced,
        } => ("updated", Some(*version), Some(*files_replaced)),
    };
    UpdateSummary {
        operation: "update",
        outcome: label,
        version,
        files_replaced,
    }
}

fn batch_summary_model(pid: &str, result: &BatchResult) -> BatchSummary {
    let items = result
        .iter()
        .map(|(item, outcome)| ItemRow {
            target: item.target.clone(),
            source: item.source.display().to_string(),
            outcome: outcome.label(),
            reason: match outcome {
                Outcome::Failed(reason) => Some(reason.clone()),
                _ => None,
            },
        })
        .collect();

    BatchSummary {
        pid: pid.to_string(),
        completed_at: chrono::Local::now().to_rfc3339(),
        items,
        succeeded: result.succeeded(),
        skipped: result.skipped(),
        failed: result.failed(),
    }
}

fn print_batch_table(pid: &str, result: &BatchResult) {
    println!();
    println!("Upload summary for {}", pid);

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Target", "Source", "Outcome"]);

    for (item, outcome) in result.iter() {
        let styled = match outcome {
            Outcome::Success => style(outcome.label().to_string()).green(),
            Outcome::SkippedIdentical => style(outcome.label().to_string()).yellow(),
            Outcome::Failed(reason) => style(format!("{}: {}", outcome.label(), reason)).red(),
        };
        table.add_row(vec![
            Cell::new(&item.target),
            Cell::new(item.source.display()),
            Cell::new(styled),
        ]);
    }
    println!("{}", table);

    println!(
        "{} succeeded, {} skipped, {} failed",
        result.succeeded(),
        result.skipped(),
        result.failed()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::TransferItem;

    fn sample_result() -> BatchResult {
        let mut result = BatchResult::new();
        result.push(TransferItem::new("/data/a.csv", "a.csv"), Outcome::Success);
        result.push(
            TransferItem::new("/data/b.csv", "b.csv"),
            Outcome::SkippedIdentical,
        );
        result.push(
            TransferItem::new("/data/c.csv", "c.csv"),
            Outcome::Failed("remote store rejected the request (400): bad".to_string()),
        );
        result
    }

    #[test]
    fn test_batch_summary_lists_every_item_once() {
        let model = batch_summary_model("test:1", &sample_result());
        assert_eq!(model.items.len(), 3);
        assert_eq!(model.succeeded, 1);
        assert_eq!(model.skipped, 1);
        assert_eq!(model.failed, 1);
        assert_eq!(model.items[2].outcome, "FAILED");
        assert!(model.items[2].reason.is_some());
        assert!(model.items[0].reason.is_none());
    }

    #[test]
    fn test_batch_summary_serializes() {
        let model = batch_summary_model("test:1", &sample_result());
        let json = serde_json::to_string(&model).unwrap();
        assert!(json.contains("\"pid\":\"test:1\""));
        assert!(json.contains("\"outcome\":\"SKIPPED\""));
    }

    #[test]
    fn test_update_summary_models() {
        let model = update_summary_model(&UpdateOutcome::Updated {
            version: 6,
            files_replaced: 4,
        });
        assert_eq!(model.outcome, "updated");
        assert_eq!(model.version, Some(6));
        assert_eq!(model.files_replaced, Some(4));

        let model = update_summary_model(&UpdateOutcome::Deferred);
        assert_eq!(model.outcome, "deferred");
        assert!(model.version.is_none());
    }

    #[test]
    fn test_human_output_does_not_panic() {
        let writer = SummaryWriter::new(false);
        writer.batch_summary("test:1", &sample_result());
        writer.update_summary(&UpdateOutcome::NotNewer { version: 5 });
    }
}
