//! Turning incoming files into documents: MIME detection, upload validation
//! and folder import

pub mod walker;

use crate::config::UploadConfig;
use crate::Result;

/// A file handed over by an upload transport (HTTP multipart or folder import)
#[derive(Debug, Clone)]
pub struct IncomingFile {
    /// Original filename, if the transport supplied one
    pub filename: Option<String>,
    /// Declared content type, if any
    pub declared_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl IncomingFile {
    pub fn new(filename: impl Into<String>, declared_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: Some(filename.into()),
            declared_type,
            bytes,
        }
    }

    pub fn name(&self) -> &str {
        self.filename.as_deref().unwrap_or_default()
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// The MIME type to record for this file
    pub fn mime_type(&self) -> String {
        detect_mime_type(self.name(), self.declared_type.as_deref(), &self.bytes)
    }
}

/// Resolve a file's MIME type.
///
/// A specific declared type wins. Otherwise the content is sniffed, then the
/// filename extension is consulted.
pub fn detect_mime_type(filename: &str, declared: Option<&str>, bytes: &[u8]) -> String {
    if let Some(declared) = declared {
        let declared = declared.split(';').next().unwrap_or_default().trim();
        if !declared.is_empty() && !declared.eq_ignore_ascii_case("application/octet-stream") {
            return declared.to_ascii_lowercase();
        }
    }

    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_string();
    }

    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .to_string()
}

/// Check a single file against the upload limits
pub fn validate(file: &IncomingFile, mime_type: &str, limits: &UploadConfig) -> Result<()> {
    if file.size() > limits.max_file_size {
        return Err(crate::Error::FileTooLarge {
            name: file.name().to_string(),
            size: file.size(),
            limit: limits.max_file_size,
        });
    }

    if !limits.is_allowed(mime_type) {
        return Err(crate::Error::UnsupportedFileType(format!(
            "{} ({})",
            file.name(),
            mime_type
        )));
    }

    Ok(())
}
