//! File system walker for importing a folder of documents

use crate::config::ImportConfig;
use crate::Result;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Represents a discovered file during traversal
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    /// Guessed from the extension, refined from content on import
    pub mime_type: String,
    pub size: u64,
}

/// File system walker that respects .gitignore and exclusion settings
pub struct FileWalker {
    import_config: ImportConfig,
}

impl FileWalker {
    /// Create a new file walker with import configuration
    pub fn new(import_config: ImportConfig) -> Self {
        Self { import_config }
    }

    /// Walk a directory and return all importable files
    ///
    /// # Arguments
    /// * `root_path` - Root directory to start walking from
    pub fn walk<P: AsRef<Path>>(&self, root_path: P) -> Result<Vec<DiscoveredFile>> {
        let root_path = root_path.as_ref();

        if !root_path.exists() {
            return Err(crate::Error::NotFound(root_path.display().to_string()));
        }

        let mut builder = WalkBuilder::new(root_path);
        builder.git_ignore(
            self.import_config
                .respect_ignore_files
                .iter()
                .any(|f| f == ".gitignore"),
        );
        for ignore_file in &self.import_config.respect_ignore_files {
            if ignore_file != ".gitignore" {
                builder.add_custom_ignore_filename(ignore_file);
            }
        }

        let mut files = Vec::new();

        for result in builder.build() {
            let entry = match result {
                Ok(e) => e,
                Err(e) => {
                    if let Some(io_err) = e.io_error() {
                        if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                            tracing::debug!("Skipping protected folder/file (permission denied): {}", e);
                            continue;
                        }
                    }
                    return Err(e.into());
                }
            };
            let path = entry.path();

            if path.is_dir() {
                continue;
            }

            let should_exclude = self
                .import_config
                .exclude_patterns
                .iter()
                .any(|pattern| self.matches_pattern(path, pattern));

            if should_exclude {
                tracing::debug!("Skipping excluded file: {}", path.display());
                continue;
            }

            let metadata = match std::fs::metadata(path) {
                Ok(m) => m,
                Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                    tracing::debug!("Skipping file (permission denied): {}", path.display());
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let size = metadata.len();

            if size > self.import_config.max_file_size {
                tracing::debug!("Skipping large file: {} ({} bytes)", path.display(), size);
                continue;
            }

            files.push(DiscoveredFile {
                path: path.to_path_buf(),
                mime_type: mime_guess::from_path(path)
                    .first_or_octet_stream()
                    .to_string(),
                size,
            });
        }

        // Walk order depends on the platform, imports should not
        files.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(files)
    }

    /// Check if a path matches an exclusion pattern
    fn matches_pattern(&self, path: &Path, pattern: &str) -> bool {
        let path_str = path.to_string_lossy();

        if let Some(suffix) = pattern.strip_prefix("**/") {
            if let Some(ext_pattern) = suffix.strip_prefix("*.") {
                // "**/*.key"
                path.extension()
                    .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(ext_pattern))
                    .unwrap_or(false)
            } else {
                // "**/.git" - any path component
                path.components()
                    .any(|c| c.as_os_str().to_string_lossy() == suffix)
            }
        } else if let Some(suffix) = pattern.strip_prefix("**") {
            path_str.ends_with(suffix)
        } else {
            path_str.contains(pattern)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_config() -> ImportConfig {
        ImportConfig {
            exclude_patterns: vec![
                "**/.git".to_string(),
                "**/node_modules".to_string(),
                "**/*.key".to_string(),
            ],
            respect_ignore_files: vec![".gitignore".to_string()],
            max_file_size: 1024,
        }
    }

    #[test]
    fn test_walk_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let walker = FileWalker::new(create_test_config());

        let files = walker.walk(temp_dir.path()).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_walk_finds_documents_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let walker = FileWalker::new(create_test_config());

        fs::create_dir(temp_dir.path().join("bank")).unwrap();
        fs::write(temp_dir.path().join("bank").join("statement.pdf"), "%PDF-1.4").unwrap();
        fs::write(temp_dir.path().join("a_notes.txt"), "hello").unwrap();

        let files = walker.walk(temp_dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].path.ends_with("a_notes.txt"));
        assert_eq!(files[0].mime_type, "text/plain");
        assert!(files[1].path.ends_with("statement.pdf"));
        assert_eq!(files[1].mime_type, "application/pdf");
    }

    #[test]
    fn test_walk_respects_exclusions_and_size() {
        let temp_dir = TempDir::new().unwrap();
        let walker = FileWalker::new(create_test_config());

        let node_modules = temp_dir.path().join("node_modules");
        fs::create_dir(&node_modules).unwrap();
        fs::write(node_modules.join("package.json"), "{}").unwrap();

        fs::write(temp_dir.path().join("test.txt"), "hello").unwrap();
        fs::write(temp_dir.path().join("secret.key"), "password").unwrap();
        fs::write(temp_dir.path().join("huge.txt"), vec![b'x'; 4096]).unwrap();

        let files = walker.walk(temp_dir.path()).unwrap();

        assert_eq!(files.len(), 1);
        assert!(files[0].path.ends_with("test.txt"));
    }

    #[test]
    fn test_walk_nonexistent_directory() {
        let walker = FileWalker::new(create_test_config());
        let result = walker.walk("/nonexistent/path");
        assert!(matches!(result, Err(crate::Error::NotFound(_))));
    }

    #[test]
    fn test_matches_pattern() {
        let walker = FileWalker::new(create_test_config());

        assert!(walker.matches_pattern(Path::new("/path/to/.git/file"), "**/.git"));
        assert!(walker.matches_pattern(Path::new("/path/node_modules/pkg"), "**/node_modules"));
        assert!(walker.matches_pattern(Path::new("/path/secret.key"), "**/*.key"));

        assert!(!walker.matches_pattern(Path::new("/path/to/file.txt"), "**/.git"));
        assert!(!walker.matches_pattern(Path::new("/path/.github/ci.yml"), "**/.git"));
        assert!(!walker.matches_pattern(Path::new("/path/keys.txt"), "**/*.key"));
    }
}
