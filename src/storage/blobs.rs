//! On-disk storage for uploaded file bytes
//!
//! Layout: `<root>/<owner>/<document id>`. Both components are sanitized so a
//! hostile owner or id cannot escape the root.

use crate::Result;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Directory of uploaded files, one subdirectory per owner
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the bytes of a document live
    pub fn path_for(&self, owner: &str, id: &str) -> PathBuf {
        self.root.join(path_component(owner)).join(path_component(id))
    }

    /// Write a document's bytes, returning their SHA256 hex digest
    pub async fn put(&self, owner: &str, id: &str, bytes: &[u8]) -> Result<String> {
        let path = self.path_for(owner, id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(compute_hash(bytes))
    }

    /// Read a document's bytes back
    pub async fn get(&self, owner: &str, id: &str) -> Result<Vec<u8>> {
        let path = self.path_for(owner, id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(crate::Error::NotFound(format!("content of {}", id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a document's bytes. Missing files are not an error.
    pub async fn remove(&self, owner: &str, id: &str) -> Result<()> {
        let path = self.path_for(owner, id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No stored content at {}", path.display());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Compute SHA256 of a byte slice as lower-case hex
pub fn compute_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let result = hasher.finalize();
    format!("{:x}", result)
}

/// Reduce an arbitrary string to one safe path component
fn path_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '@' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_') {
        // Keep distinct owners distinct even if they sanitize to nothing
        format!("_{}", &compute_hash(raw.as_bytes())[..16])
    } else {
        cleaned
    }
}
