//! Daftar - keeps uploaded paperwork categorized and searchable
//!
//! Files are sorted into a fixed category taxonomy by filename keywords and
//! stored per owner. The collection can then be filtered by free text,
//! category and tags.
//!
//! # Example
//!
//! ```no_run
//! use daftar::{
//!     categorize::Categorizer,
//!     search::{self, SearchFilters},
//!     taxonomy::Taxonomy,
//! };
//! use std::sync::Arc;
//!
//! let taxonomy = Arc::new(Taxonomy::builtin());
//! let categorizer = Categorizer::new(taxonomy.clone());
//!
//! let result = categorizer.categorize("car_insurance_policy.pdf", "application/pdf");
//! assert_eq!(result.category_id, "vehicles");
//!
//! let documents = Vec::new();
//! let hits = search::search(&documents, &taxonomy, "tax", Some(&SearchFilters::default()));
//! assert!(hits.is_empty());
//! ```

pub mod categorize;
pub mod config;
pub mod intake;
pub mod library;
pub mod search;
pub mod stats;
pub mod storage;
pub mod taxonomy;
pub mod web;

pub mod error;
pub use error::{Error, Result};

/// Common types used throughout the library
pub mod types {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};

    /// Unique identifier for a stored document (UUID v4 string)
    pub type DocumentId = String;

    /// Identifier of the principal that owns a document collection
    pub type OwnerId = String;

    /// Identifier of a taxonomy category, e.g. `"finance"`
    pub type CategoryId = String;

    /// A categorized document in an owner's collection
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Document {
        pub id: DocumentId,
        pub name: String,
        pub mime_type: String,
        pub size_bytes: u64,
        pub category: CategoryId,
        pub confidence: f32,
        pub uploaded_at: DateTime<Utc>,
        /// Set semantics, first-insertion order kept for display
        #[serde(default)]
        pub tags: Vec<String>,
        pub owner_id: OwnerId,
        /// SHA256 of the stored bytes, if any were stored
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub content_hash: Option<String>,
    }

    impl Document {
        /// Add tags, ignoring blanks and ones already present.
        ///
        /// Returns the number of tags actually added.
        pub fn add_tags<I, S>(&mut self, tags: I) -> usize
        where
            I: IntoIterator<Item = S>,
            S: AsRef<str>,
        {
            let mut added = 0;
            for tag in tags {
                let tag = tag.as_ref().trim();
                if tag.is_empty() || self.tags.iter().any(|t| t == tag) {
                    continue;
                }
                self.tags.push(tag.to_string());
                added += 1;
            }
            added
        }
    }

    /// Output of the categorizer for a single file
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Categorization {
        pub category_id: CategoryId,
        /// Presentation signal only, see [`crate::categorize::ConfidenceScorer`]
        pub confidence: f32,
    }

    /// An offset/limit window over a filtered sequence
    #[derive(Debug, Clone, PartialEq, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Page<T> {
        pub items: Vec<T>,
        /// Number of items before windowing
        pub total: usize,
        pub has_more: bool,
        pub offset: usize,
        pub limit: usize,
    }
}

#[cfg(test)]
mod tests {
    use super::types::Document;
    use chrono::Utc;

    fn doc() -> Document {
        Document {
            id: "1".to_string(),
            name: "Tax_Return_2023.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            size_bytes: 1024,
            category: "finance".to_string(),
            confidence: 0.95,
            uploaded_at: Utc::now(),
            tags: vec!["taxes".to_string()],
            owner_id: "alice".to_string(),
            content_hash: None,
        }
    }

    #[test]
    fn test_add_tags_is_set_like() {
        let mut d = doc();
        let added = d.add_tags(["2023", "taxes", "  ", " 2023 ", "irs"]);
        assert_eq!(added, 2);
        assert_eq!(d.tags, vec!["taxes", "2023", "irs"]);
    }

    #[test]
    fn test_document_json_is_camel_case() {
        let json = serde_json::to_value(doc()).unwrap();
        assert!(json.get("mimeType").is_some());
        assert!(json.get("sizeBytes").is_some());
        assert!(json.get("uploadedAt").is_some());
        assert!(json.get("ownerId").is_some());
        assert!(json.get("contentHash").is_none());
    }
}
