/*!
 * Version manifest parsing and validation
 *
 * A manifest is a sectioned key/value document naming the current client
 * version and the files that make up an installation:
 *
 * ```text
 * [version]
 * current_version = 7
 *
 * [files]
 * ferry.toml = https://downloads.example.org/ferry.toml
 * bin/ferry = https://downloads.example.org/bin/ferry
 * ```
 */

use std::path::{Component, Path};
use thiserror::Error;

use crate::error::FerryError;

/// One file the installation is made of
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Path relative to the installation directory
    pub path: String,
    /// Absolute URL the content is downloaded from
    pub url: String,
}

/// Parsed, validated manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub version: i64,
    pub entries: Vec<ManifestEntry>,
}

/// Errors parsing a manifest document
#[derive(Error, Debug)]
pub enum ManifestParseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing [version] current_version")]
    MissingVersion,

    #[error("current_version is not an integer: {0}")]
    InvalidVersion(String),

    #[error("line {line}: malformed entry (expected key = value): {content}")]
    MalformedEntry { line: usize, content: String },

    #[error("line {line}: unknown section [{name}]")]
    UnknownSection { line: usize, name: String },

    #[error("line {line}: entry before any section header")]
    EntryOutsideSection { line: usize },

    #[error("file entry has an empty path")]
    EmptyPath,

    #[error("file entry {0} has an empty URL")]
    EmptyUrl(String),

    #[error("file entry {0} escapes the installation directory")]
    UnsafePath(String),
}

impl From<ManifestParseError> for FerryError {
    fn from(err: ManifestParseError) -> Self {
        FerryError::ManifestParse(err.to_string())
    }
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, ManifestParseError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ManifestParseError> {
        let mut version: Option<i64> = None;
        let mut entries = Vec::new();
        let mut section: Option<String> = None;

        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let name = name.trim().to_ascii_lowercase();
                match name.as_str() {
                    "version" | "files" => section = Some(name),
                    _ => {
                        return Err(ManifestParseError::UnknownSection {
                            line: idx + 1,
                            name,
                        })
                    }
                }
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| {
                ManifestParseError::MalformedEntry {
                    line: idx + 1,
                    content: line.to_string(),
                }
            })?;
            let key = key.trim();
            let value = value.trim();

            match section.as_deref() {
                Some("version") => {
                    if key == "current_version" {
                        let parsed = value
                            .parse::<i64>()
                            .map_err(|_| ManifestParseError::InvalidVersion(value.to_string()))?;
                        version = Some(parsed);
                    }
                }
                Some("files") => {
                    entries.push(ManifestEntry {
                        path: key.to_string(),
                        url: value.to_string(),
                    });
                }
                _ => return Err(ManifestParseError::EntryOutsideSection { line: idx + 1 }),
            }
        }

        let manifest = Manifest {
            version: version.ok_or(ManifestParseError::MissingVersion)?,
            entries,
        };
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<(), ManifestParseError> {
        for entry in &self.entries {
            if entry.path.is_empty() {
                return Err(ManifestParseError::EmptyPath);
            }
            if entry.url.is_empty() {
                return Err(ManifestParseError::EmptyUrl(entry.path.clone()));
            }
            let path = Path::new(&entry.path);
            let escapes = path.is_absolute()
                || path
                    .components()
                    .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
            if escapes {
                return Err(ManifestParseError::UnsafePath(entry.path.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[version]
current_version = 7

[files]
ferry.toml = https://downloads.example.org/ferry.toml
bin/ferry = https://downloads.example.org/bin/ferry
"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        assert_eq!(manifest.version, 7);
        assert_eq!(manifest.entries.len(), 2);
        assert_eq!(manifest.entries[0].path, "ferry.toml");
        assert_eq!(
            manifest.entries[1].url,
            "https://downloads.example.org/bin/ferry"
        );
    }

    #[test]
    fn test_entry_order_is_preserved() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        let paths: Vec<_> = manifest.entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["ferry.toml", "bin/ferry"]);
    }

    #[test]
    fn test_missing_version_is_invalid() {
        let content = "[files]\na = https://example.org/a\n";
        assert!(matches!(
            Manifest::parse(content),
            Err(ManifestParseError::MissingVersion)
        ));
    }

    #[test]
    fn test_non_integer_version_is_invalid() {
        let content = "[version]\ncurrent_version = 1.2.3\n";
        assert!(matches!(
            Manifest::parse(content),
            Err(ManifestParseError::InvalidVersion(_))
        ));
    }

    #[test]
    fn test_empty_url_is_invalid() {
        let content = "[version]\ncurrent_version = 1\n[files]\na =\n";
        assert!(matches!(
            Manifest::parse(content),
            Err(ManifestParseError::EmptyUrl(_))
        ));
    }

    #[test]
    fn test_escaping_path_is_invalid() {
        let content =
            "[version]\ncurrent_version = 1\n[files]\n../outside = https://example.org/x\n";
        assert!(matches!(
            Manifest::parse(content),
            Err(ManifestParseError::UnsafePath(_))
        ));

        let content = "[version]\ncurrent_version = 1\n[files]\n/etc/hosts = https://example.org/x\n";
        assert!(matches!(
            Manifest::parse(content),
            Err(ManifestParseError::UnsafePath(_))
        ));
    }

    #[test]
    fn test_unknown_section_is_invalid() {
        let content = "[extras]\na = b\n";
        assert!(matches!(
            Manifest::parse(content),
            Err(ManifestParseError::UnknownSection { .. })
        ));
    }

    #[test]
    fn test_url_values_keep_query_strings() {
        let content = "[version]\ncurrent_version = 2\n[files]\na = https://example.org/a?sig=x==\n";
        let manifest = Manifest::parse(content).unwrap();
        assert_eq!(manifest.entries[0].url, "https://example.org/a?sig=x==");
    }

    #[test]
    fn test_manifest_without_files_is_valid() {
        let manifest = Manifest::parse("[version]\ncurrent_version = 3\n").unwrap();
        assert_eq!(manifest.version, 3);
        assert!(manifest.entries.is_empty());
    }
}
