//! BillForge Storage Layer
//!
//! Implements the `ArtifactStore` trait as a directory of named JSON blobs,
//! one `<name>.json` file per artifact.
//!
//! Names are sanitized to `[A-Za-z0-9_-]` before they touch the filesystem,
//! and names given to [`JsonDirStore::load`] are first reduced to their
//! basename, so no caller-supplied name can reach outside the directory.
//!
//! # Examples
//!
//! ```no_run
//! use billforge_store::JsonDirStore;
//!
//! let store = JsonDirStore::new("artifacts").unwrap();
//! // Store is now ready for artifact operations
//! ```

#![warn(missing_docs)]

use billforge_domain::traits::ArtifactStore;
use billforge_domain::BillArtifact;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const EXTENSION: &str = "json";

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Blob not found
    #[error("Artifact not found: {0}")]
    NotFound(String),

    /// Name has no usable characters
    #[error("Invalid name: '{0}'")]
    InvalidName(String),

    /// Blob is not valid JSON for the requested type
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`
///
/// Fails when nothing usable is left.
pub fn sanitize_name(name: &str) -> Result<String, StoreError> {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();

    if sanitized.chars().all(|c| c == '_') {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(sanitized)
}

/// Reduce a load name to its basename, drop a `.json` suffix, then sanitize
fn load_name(name: &str) -> Result<String, StoreError> {
    let base = Path::new(name.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StoreError::InvalidName(name.to_string()))?;
    let stem = base.strip_suffix(".json").unwrap_or(base);
    sanitize_name(stem)
}

/// Directory-backed JSON blob store
///
/// Writes go to a temporary file first and are renamed into place.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Directory the blobs live in
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, sanitized: &str) -> PathBuf {
        self.root.join(format!("{}.{}", sanitized, EXTENSION))
    }

    /// Whether a blob exists under `name`
    pub fn exists(&self, name: &str) -> bool {
        load_name(name).map(|n| self.path_for(&n).is_file()).unwrap_or(false)
    }

    /// Save any serializable value under `name`, returning the sanitized name
    pub fn save_json<T: Serialize>(&self, name: &str, value: &T) -> Result<String, StoreError> {
        let sanitized = sanitize_name(name)?;
        let path = self.path_for(&sanitized);
        let staging = self.root.join(format!(".{}.{}.tmp", sanitized, EXTENSION));

        fs::write(&staging, serde_json::to_vec_pretty(value)?)?;
        fs::rename(&staging, &path)?;
        debug!("Saved {}", path.display());
        Ok(sanitized)
    }

    /// Load a value saved under `name`
    pub fn load_json<T: DeserializeOwned>(&self, name: &str) -> Result<T, StoreError> {
        let sanitized = load_name(name)?;
        let path = self.path_for(&sanitized);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(StoreError::NotFound(sanitized)),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Delete the blob under `name`
    pub fn remove(&self, name: &str) -> Result<(), StoreError> {
        let sanitized = load_name(name)?;
        match fs::remove_file(self.path_for(&sanitized)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound(sanitized)),
            Err(e) => Err(e.into()),
        }
    }
}

impl ArtifactStore for JsonDirStore {
    type Error = StoreError;

    fn save(&self, name: &str, artifact: &BillArtifact) -> Result<String, Self::Error> {
        self.save_json(name, artifact)
    }

    fn load(&self, name: &str) -> Result<BillArtifact, Self::Error> {
        self.load_json(name)
    }

    fn list(&self) -> Result<Vec<String>, Self::Error> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !stem.starts_with('.') {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("bill-01_a").unwrap(), "bill-01_a");
        assert_eq!(sanitize_name("my bill.v2").unwrap(), "my_bill_v2");
        assert_eq!(sanitize_name("../etc/passwd").unwrap(), "___etc_passwd");
        assert!(matches!(sanitize_name("   "), Err(StoreError::InvalidName(_))));
        assert!(matches!(sanitize_name("../"), Err(StoreError::InvalidName(_))));
    }

    #[test]
    fn test_load_name_is_basename() {
        assert_eq!(load_name("../../secrets/bill-7.json").unwrap(), "bill-7");
        assert_eq!(load_name("/tmp/x y").unwrap(), "x_y");
        assert_eq!(load_name("bill").unwrap(), "bill");
        assert!(load_name("..").is_err());
    }

    #[test]
    fn test_json_roundtrip_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::new(dir.path().join("blobs")).unwrap();

        let saved = store.save_json("report 1", &vec![1, 2, 3]).unwrap();
        assert_eq!(saved, "report_1");
        assert!(store.exists("report_1"));

        let loaded: Vec<i32> = store.load_json("report_1.json").unwrap();
        assert_eq!(loaded, vec![1, 2, 3]);
        assert_eq!(store.list().unwrap(), vec!["report_1".to_string()]);
    }

    #[test]
    fn test_missing_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::new(dir.path()).unwrap();

        let result: Result<Vec<i32>, _> = store.load_json("nope");
        assert!(matches!(result, Err(StoreError::NotFound(name)) if name == "nope"));
        assert!(matches!(store.remove("nope"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_list_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::new(dir.path()).unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::create_dir(dir.path().join("sub.json")).unwrap();
        store.save_json("b", &1).unwrap();
        store.save_json("a", &2).unwrap();

        assert_eq!(store.list().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_corrupt_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::new(dir.path()).unwrap();
        fs::write(dir.path().join("bad.json"), "{not json").unwrap();

        let result: Result<Vec<i32>, _> = store.load_json("bad");
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }
}
