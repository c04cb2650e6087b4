/*!
 * Metadata source files
 *
 * A metadata source is a sectioned key/value document describing one
 * collection record: the metadata pairs the record is created from, the
 * files to upload, optional typed relations to other records, and - once
 * the record exists - its pid. The pid is written back into the file so a
 * rerun reuses the record instead of creating a duplicate.
 */

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::catalog::{Catalog, TransferItem, UploadRequestSource};
use crate::error::FerryError;
use crate::remote::RemoteStore;

const SECTION_METADATA: &str = "metadata";
const SECTION_PID: &str = "pid";
const SECTION_FILES: &str = "files";
const SECTION_RELATIONS: &str = "relations";

/// Errors reading, parsing, or writing a metadata source file
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: entry before any section header: {content}")]
    EntryOutsideSection { line: usize, content: String },

    #[error("line {line}: malformed entry (expected key = value): {content}")]
    MalformedEntry { line: usize, content: String },

    #[error("line {line}: unknown section [{name}]")]
    UnknownSection { line: usize, name: String },

    #[error("pid is already recorded as {0}")]
    PidAlreadyRecorded(String),
}

impl From<MetadataError> for FerryError {
    fn from(err: MetadataError) -> Self {
        FerryError::Metadata(err.to_string())
    }
}

/// Parsed metadata source, bound to the file it came from
#[derive(Debug, Clone)]
pub struct MetadataSource {
    path: PathBuf,
    metadata: Vec<(String, String)>,
    pid: Option<String>,
    files: Vec<(String, String)>,
    relations: Vec<(String, String)>,
}

impl MetadataSource {
    pub fn load(path: &Path) -> Result<Self, MetadataError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content, path)
    }

    /// Parse document content. Order within each section is preserved;
    /// duplicate keys are allowed in the metadata section (repeated fields).
    pub fn parse(content: &str, path: &Path) -> Result<Self, MetadataError> {
        let mut source = Self {
            path: path.to_path_buf(),
            metadata: Vec::new(),
            pid: None,
            files: Vec::new(),
            relations: Vec::new(),
        };

        let mut section: Option<String> = None;
        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let name = name.trim().to_ascii_lowercase();
                match name.as_str() {
                    SECTION_METADATA | SECTION_PID | SECTION_FILES | SECTION_RELATIONS => {
                        section = Some(name);
                    }
                    _ => {
                        return Err(MetadataError::UnknownSection {
                            line: idx + 1,
                            name,
                        })
                    }
                }
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| {
                MetadataError::MalformedEntry {
                    line: idx + 1,
                    content: line.to_string(),
                }
            })?;
            let key = key.trim().to_string();
            let value = value.trim().to_string();

            match section.as_deref() {
                Some(SECTION_METADATA) => source.metadata.push((key, value)),
                Some(SECTION_PID) => source.pid = Some(value),
                Some(SECTION_FILES) => source.files.push((key, value)),
                Some(SECTION_RELATIONS) => source.relations.push((key, value)),
                None => {
                    return Err(MetadataError::EntryOutsideSection {
                        line: idx + 1,
                        content: line.to_string(),
                    })
                }
                Some(_) => unreachable!("section names are validated above"),
            }
        }

        Ok(source)
    }

    pub fn pid(&self) -> Option<&str> {
        self.pid.as_deref()
    }

    /// Metadata pairs the record is created from
    pub fn metadata(&self) -> &[(String, String)] {
        &self.metadata
    }

    /// `(target name, local path)` pairs to upload
    pub fn files(&self) -> &[(String, String)] {
        &self.files
    }

    /// `(link type, related pid)` pairs
    pub fn relations(&self) -> &[(String, String)] {
        &self.relations
    }

    /// Persist a newly assigned pid back into the source file.
    ///
    /// Refuses to overwrite an existing pid: a source with a recorded pid
    /// must never trigger record creation again, so replacing the pid is
    /// always a caller bug.
    pub fn record_pid(&mut self, pid: &str) -> Result<(), MetadataError> {
        if let Some(existing) = &self.pid {
            return Err(MetadataError::PidAlreadyRecorded(existing.clone()));
        }
        self.pid = Some(pid.to_string());
        fs::write(&self.path, self.serialize())?;
        tracing::info!(pid = %pid, path = %self.path.display(), "recorded pid");
        Ok(())
    }

    fn serialize(&self) -> String {
        let mut out = String::new();

        out.push_str(&format!("[{}]\n", SECTION_METADATA));
        for (key, value) in &self.metadata {
            out.push_str(&format!("{} = {}\n", key, value));
        }

        if let Some(ref pid) = self.pid {
            out.push_str(&format!("\n[{}]\n", SECTION_PID));
            out.push_str(&format!("pid = {}\n", pid));
        }

        if !self.files.is_empty() {
            out.push_str(&format!("\n[{}]\n", SECTION_FILES));
            for (name, path) in &self.files {
                out.push_str(&format!("{} = {}\n", name, path));
            }
        }

        if !self.relations.is_empty() {
            out.push_str(&format!("\n[{}]\n", SECTION_RELATIONS));
            for (link_type, related) in &self.relations {
                out.push_str(&format!("{} = {}\n", link_type, related));
            }
        }

        out
    }
}

impl UploadRequestSource for MetadataSource {
    fn items(&self) -> crate::error::Result<Catalog> {
        let mut catalog = Catalog::new();
        for (target, path) in &self.files {
            catalog.insert(TransferItem::new(path, target.clone()));
        }
        Ok(catalog)
    }
}

/// Resolve the record pid for a metadata source.
///
/// A source with a recorded pid reuses it and never touches the
/// record-creation endpoint. Otherwise the record is created from the
/// metadata pairs, the assigned pid is persisted back into the source file,
/// and relations are posted best-effort.
pub fn resolve_record_pid(
    source: &mut MetadataSource,
    store: &impl RemoteStore,
) -> crate::error::Result<String> {
    if let Some(existing) = source.pid() {
        tracing::debug!(pid = %existing, "reusing recorded pid");
        return Ok(existing.to_string());
    }

    if source.metadata().is_empty() {
        return Err(FerryError::Metadata(format!(
            "{} has no metadata entries to create a record from",
            source.path.display()
        )));
    }

    let pid = store.create_record(source.metadata())?;
    source.record_pid(&pid)?;

    for (link_type, related) in source.relations() {
        match store.add_relation(&pid, link_type, related) {
            Ok(_accepted) => {} // rejections are logged by the store
            Err(e) => {
                tracing::warn!(error = %e, link_type = %link_type, "relation creation failed")
            }
        }
    }

    Ok(pid)
}
