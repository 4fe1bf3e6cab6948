//! Configuration management for daftar

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for daftar
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub upload: UploadConfig,
    pub search: SearchConfig,
    pub auth: AuthConfig,
    pub import: ImportConfig,
    /// JSON file replacing the built-in taxonomy
    pub taxonomy_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root for uploaded bytes and the document snapshot
    pub data_dir: PathBuf,
    /// Write the document snapshot after every change
    pub persist: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Maximum size of a single file (in bytes)
    pub max_file_size: u64,
    /// Maximum number of files per upload request
    pub max_files: usize,
    pub allowed_mime_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Page size when the caller does not ask for one
    pub default_limit: usize,
    /// Upper bound on any requested page size
    pub max_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Header the identity proxy uses to pass the authenticated owner id
    pub owner_header: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Patterns to exclude from folder import
    pub exclude_patterns: Vec<String>,
    /// Respect these ignore files
    pub respect_ignore_files: Vec<String>,
    /// Maximum file size to import (in bytes)
    pub max_file_size: u64,
}

impl StorageConfig {
    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("documents.json")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".daftar"),
            persist: true,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024, // 10MB
            max_files: 10,
            allowed_mime_types: vec![
                "application/pdf".to_string(),
                "application/msword".to_string(),
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
                    .to_string(),
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/gif".to_string(),
                "text/plain".to_string(),
            ],
        }
    }
}

impl UploadConfig {
    pub fn is_allowed(&self, mime_type: &str) -> bool {
        self.allowed_mime_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(mime_type))
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 50,
            max_limit: 200,
        }
    }
}

impl SearchConfig {
    /// Resolve a caller supplied page size against the configured bounds
    pub fn effective_limit(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_limit).min(self.max_limit)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            owner_header: "x-user-id".to_string(),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            exclude_patterns: vec![
                "**/.git".to_string(),
                "**/.ssh".to_string(),
                "**/.gnupg".to_string(),
                "**/node_modules".to_string(),
                "**/target".to_string(),
                "**/*.key".to_string(),
                "**/*.pem".to_string(),
            ],
            respect_ignore_files: vec![".gitignore".to_string()],
            max_file_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            upload: UploadConfig::default(),
            search: SearchConfig::default(),
            auth: AuthConfig::default(),
            import: ImportConfig::default(),
            taxonomy_path: None,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults when the
    /// file does not exist. Missing keys take their default values.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let json = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&json)
            .map_err(|e| crate::Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.upload.max_files == 0 {
            return Err(crate::Error::Config("upload.max_files must be at least 1".to_string()));
        }
        if self.search.max_limit == 0 {
            return Err(crate::Error::Config("search.max_limit must be at least 1".to_string()));
        }
        if self.auth.owner_header.trim().is_empty() {
            return Err(crate::Error::Config("auth.owner_header must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.search.default_limit, 50);
        assert_eq!(config.upload.max_files, 10);
        assert_eq!(config.upload.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.auth.owner_header, "x-user-id");
        assert!(config.storage.persist);
        assert!(config.taxonomy_path.is_none());
    }

    #[test]
    fn test_allowed_mime_types() {
        let upload = UploadConfig::default();
        assert!(upload.is_allowed("application/pdf"));
        assert!(upload.is_allowed("IMAGE/PNG"));
        assert!(!upload.is_allowed("application/zip"));
    }

    #[test]
    fn test_effective_limit() {
        let search = SearchConfig::default();
        assert_eq!(search.effective_limit(None), 50);
        assert_eq!(search.effective_limit(Some(5)), 5);
        assert_eq!(search.effective_limit(Some(10_000)), 200);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load(temp_dir.path().join("config.json")).unwrap();
        assert_eq!(config.search.default_limit, 50);
    }

    #[test]
    fn test_load_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, r#"{"search": {"default_limit": 5}, "auth": {"owner_header": "x-owner"}}"#)
            .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.search.default_limit, 5);
        assert_eq!(config.search.max_limit, 200);
        assert_eq!(config.auth.owner_header, "x-owner");
        assert_eq!(config.upload.max_files, 10);
    }

    #[test]
    fn test_load_rejects_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");

        std::fs::write(&path, r#"{"upload": {"max_files": 0}}"#).unwrap();
        assert!(matches!(Config::load(&path), Err(crate::Error::Config(_))));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(Config::load(&path), Err(crate::Error::Config(_))));
    }
}
