//! src/services/storage_root.rs
//!
//! StorageRoot — owns the sandbox directory that holds every locally-hosted
//! media file. All physical reads and writes go through `resolve`, which
//! guarantees the target stays directly inside the root. The layout is flat:
//! generated filenames only, no sub-directories.

use std::{
    io::{self, ErrorKind},
    path::{Component, Path, PathBuf},
};
use thiserror::Error;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageRootError {
    #[error("storage name `{0}` resolves outside the storage root")]
    UnsafeName(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageRootResult<T> = Result<T, StorageRootError>;

/// Sandbox directory for media payloads.
#[derive(Clone, Debug)]
pub struct StorageRoot {
    root: PathBuf,
}

impl StorageRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: normalize(&root.into()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Idempotently create the root directory. The process must not start
    /// serving requests if this fails.
    pub fn ensure(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }

    /// Produce a collision-resistant storage name for an upload, keeping the
    /// extension of the client-supplied filename (everything from its last
    /// dot, possibly empty).
    pub fn generate_name(original_filename: &str) -> String {
        let extension = original_filename
            .rfind('.')
            .map(|idx| &original_filename[idx..])
            .unwrap_or("");
        format!("{}{}", Uuid::new_v4(), extension)
    }

    /// Join `name` onto the root and normalize the result lexically.
    ///
    /// Rejects any name whose normalized parent is not exactly the root:
    /// traversal sequences, absolute paths, and nested sub-paths all fail
    /// here before any filesystem access.
    pub fn resolve(&self, name: &str) -> StorageRootResult<PathBuf> {
        let candidate = normalize(&self.root.join(name));
        if candidate.parent() != Some(self.root.as_path()) {
            return Err(StorageRootError::UnsafeName(name.to_string()));
        }
        Ok(candidate)
    }

    /// Write (or overwrite) the payload for `name` inside the root.
    pub async fn write(&self, name: &str, data: &[u8]) -> StorageRootResult<()> {
        let path = self.resolve(name)?;
        fs::write(&path, data).await?;
        Ok(())
    }

    /// Remove the payload for `name` if it exists. Returns whether a file
    /// was actually deleted; a file that is already gone is not an error.
    pub async fn delete_if_exists(&self, name: &str) -> StorageRootResult<bool> {
        let path = self.resolve(name)?;
        match fs::remove_file(&path).await {
            Ok(_) => {
                debug!("removed physical file {}", path.display());
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", path.display());
                Ok(false)
            }
            Err(err) => Err(StorageRootError::Io(err)),
        }
    }
}

/// Lexical path normalization: drops `.` segments and folds `..` into the
/// preceding component without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> StorageRoot {
        StorageRoot::new("/srv/media")
    }

    #[test]
    fn generated_names_keep_the_extension() {
        let name = StorageRoot::generate_name("holiday photo.jpeg");
        assert!(name.ends_with(".jpeg"));
        assert_ne!(
            StorageRoot::generate_name("a.png"),
            StorageRoot::generate_name("a.png")
        );
    }

    #[test]
    fn generated_names_without_extension() {
        let name = StorageRoot::generate_name("README");
        assert!(!name.contains('.'));
        assert_eq!(name.len(), 36);
    }

    #[test]
    fn resolve_accepts_plain_names() {
        let path = root().resolve("abc123.png").unwrap();
        assert_eq!(path, PathBuf::from("/srv/media/abc123.png"));
    }

    #[test]
    fn resolve_rejects_traversal() {
        assert!(matches!(
            root().resolve("../../etc/passwd"),
            Err(StorageRootError::UnsafeName(_))
        ));
        assert!(matches!(
            root().resolve("ok/../../escape.png"),
            Err(StorageRootError::UnsafeName(_))
        ));
    }

    #[test]
    fn resolve_rejects_absolute_and_nested_names() {
        assert!(root().resolve("/etc/passwd").is_err());
        assert!(root().resolve("sub/dir.png").is_err());
        assert!(root().resolve("").is_err());
    }

    #[tokio::test]
    async fn delete_if_exists_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageRoot::new(dir.path());
        storage.write("gone.png", b"bytes").await.unwrap();
        assert!(storage.delete_if_exists("gone.png").await.unwrap());
        assert!(!storage.delete_if_exists("gone.png").await.unwrap());
    }
}
