/*!
 * Manifest-driven self-update with atomic staged replacement
 */

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use filetime::FileTime;

use crate::core::differ::{update_decision, UpdateDecision};
use crate::error::Result;
use crate::update::fetch::FileFetcher;
use crate::update::manifest::Manifest;

/// Live manifest file name inside the installation directory
pub const MANIFEST_FILENAME: &str = "manifest.properties";

/// Presence-only sentinel that disables update checks entirely
pub const DISABLE_UPDATE_FILE: &str = "DO_NOT_UPDATE";

/// Suffix marking staged downloads
pub const TEMP_SUFFIX: &str = ".tmp";

/// How an update run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The sentinel file is present; nothing was checked
    Disabled,
    /// The local manifest is fresh enough; the remote was not consulted
    Deferred,
    /// The fetched manifest did not warrant an update
    NotNewer { version: i64 },
    /// The installation was replaced
    Updated { version: i64, files_replaced: usize },
}

/// Checks the remote manifest and replaces the installation when warranted
pub struct Updater<'a, F: FileFetcher + ?Sized> {
    fetcher: &'a F,
    manifest_url: String,
    base_dir: PathBuf,
    force: bool,
    check_interval: Duration,
}

impl<'a, F: FileFetcher + ?Sized> Updater<'a, F> {
    pub fn new(fetcher: &'a F, manifest_url: impl Into<String>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            manifest_url: manifest_url.into(),
            base_dir: base_dir.into(),
            force: false,
            check_interval: Duration::from_secs(24 * 3600),
        }
    }

    /// Update even when the fetched version equals the local one, and check
    /// regardless of manifest freshness
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Run one update check.
    ///
    /// Commit sequence: every changed file is first downloaded to a
    /// `.tmp`-suffixed path, then live files are deleted, then the staged
    /// files are renamed into place, then the manifest itself is swapped.
    /// The slow network phase finishes before any live file is touched, and
    /// on any error a cleanup pass removes every staged file. The cleanup is
    /// not transactional: a process kill between the delete and rename
    /// phases can leave live files removed before their replacements land.
    /// The installation directory is assumed single-writer for the duration
    /// of the run.
    pub fn run(&self) -> Result<UpdateOutcome> {
        if self.base_dir.join(DISABLE_UPDATE_FILE).is_file() {
            tracing::info!(
                sentinel = DISABLE_UPDATE_FILE,
                "update checks are disabled, skipping"
            );
            return Ok(UpdateOutcome::Disabled);
        }

        let live_manifest = self.base_dir.join(MANIFEST_FILENAME);
        let previous = if live_manifest.is_file() {
            Some(Manifest::load(&live_manifest)?)
        } else {
            None
        };

        if !self.force && previous.is_some() && !self.check_is_due(&live_manifest) {
            tracing::debug!("local manifest is fresh, deferring update check");
            return Ok(UpdateOutcome::Deferred);
        }

        let mut staged: Vec<PathBuf> = Vec::new();
        let result = self.check_and_commit(&live_manifest, previous.as_ref(), &mut staged);
        if result.is_err() {
            for path in &staged {
                if let Err(e) = delete_if_exists(path) {
                    tracing::warn!(path = %path.display(), error = %e, "could not remove staged file");
                }
            }
        }
        result
    }

    fn check_is_due(&self, live_manifest: &Path) -> bool {
        let age = fs::metadata(live_manifest)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|mtime| SystemTime::now().duration_since(mtime).ok());
        match age {
            Some(age) => age >= self.check_interval,
            // Unreadable mtime: check rather than silently defer forever
            None => true,
        }
    }

    fn check_and_commit(
        &self,
        live_manifest: &Path,
        previous: Option<&Manifest>,
        staged: &mut Vec<PathBuf>,
    ) -> Result<UpdateOutcome> {
        let temp_manifest = temp_path(live_manifest);
        delete_if_exists(&temp_manifest)?;
        staged.push(temp_manifest.clone());
        self.fetcher.fetch(&self.manifest_url, &temp_manifest)?;

        let fetched = Manifest::load(&temp_manifest)?;
        tracing::info!(
            fetched_version = fetched.version,
            previous_version = ?previous.map(|m| m.version),
            "fetched manifest"
        );

        let decision = update_decision(
            previous.map(|m| m.version),
            fetched.version,
            self.force,
        );

        match decision {
            UpdateDecision::Proceed => {
                self.commit(live_manifest, &temp_manifest, &fetched, staged)?;
                Ok(UpdateOutcome::Updated {
                    version: fetched.version,
                    files_replaced: fetched.entries.len(),
                })
            }
            UpdateDecision::NotNewer => {
                if previous.is_some() {
                    fs::remove_file(&temp_manifest)?;
                    // Refresh the mtime so the next check is deferred again
                    filetime::set_file_mtime(live_manifest, FileTime::now())?;
                } else {
                    // No baseline yet: adopt the fetched manifest so future
                    // runs have a version to compare against
                    fs::rename(&temp_manifest, live_manifest)?;
                }
                Ok(UpdateOutcome::NotNewer {
                    version: fetched.version,
                })
            }
        }
    }

    fn commit(
        &self,
        live_manifest: &Path,
        temp_manifest: &Path,
        fetched: &Manifest,
        staged: &mut Vec<PathBuf>,
    ) -> Result<()> {
        let total = fetched.entries.len();

        // Phase 1: stage every download; no live file is touched yet
        for (index, entry) in fetched.entries.iter().enumerate() {
            let live = self.base_dir.join(&entry.path);
            let temp = temp_path(&live);
            if let Some(parent) = temp.parent() {
                fs::create_dir_all(parent)?;
            }
            delete_if_exists(&temp)?;
            staged.push(temp.clone());
            self.fetcher.fetch(&entry.url, &temp)?;
            tracing::info!(
                file = index + 1,
                total,
                path = %entry.path,
                url = %entry.url,
                "downloaded"
            );
        }

        // Phase 2: delete the live files named by the new manifest
        for entry in &fetched.entries {
            delete_if_exists(&self.base_dir.join(&entry.path))?;
        }

        // Phase 3: rename staged files to their live names
        for entry in &fetched.entries {
            let live = self.base_dir.join(&entry.path);
            fs::rename(temp_path(&live), &live)?;
        }

        // Phase 4: swap the manifest itself
        delete_if_exists(live_manifest)?;
        fs::rename(temp_manifest, live_manifest)?;

        tracing::info!(version = fetched.version, files = total, "update complete");
        Ok(())
    }
}

/// The staged twin of a live path: same name with the temp suffix appended
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

fn delete_if_exists(path: &Path) -> std::io::Result<()> {
    if path.is_file() {
        fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_path_appends_suffix() {
        assert_eq!(
            temp_path(Path::new("/install/bin/ferry")),
            PathBuf::from("/install/bin/ferry.tmp")
        );
        assert_eq!(
            temp_path(Path::new("manifest.properties")),
            PathBuf::from("manifest.properties.tmp")
        );
    }

    #[test]
    fn test_delete_if_exists_tolerates_absence() {
        assert!(delete_if_exists(Path::new("/definitely/not/here")).is_ok());
    }

    #[test]
    fn test_delete_if_exists_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.tmp");
        fs::write(&path, "x").unwrap();

        delete_if_exists(&path).unwrap();
        assert!(!path.exists());
    }
}
