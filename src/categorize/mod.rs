//! Keyword based document categorization
//!
//! Category selection is deterministic: the taxonomy is walked in order and
//! the first category with a keyword occurring in the lower-cased filename
//! wins. Confidence comes from a [`ConfidenceScorer`], which by default is a
//! random mock and carries no meaning beyond its documented bounds.

use crate::taxonomy::{Category, Taxonomy};
use crate::types::Categorization;
use rand::Rng;
use std::sync::Arc;

/// Confidence reported when no keyword matched
pub const FALLBACK_CONFIDENCE: f32 = 0.5;

/// Lower bound of [`MockConfidence`] scores
pub const MOCK_CONFIDENCE_MIN: f32 = 0.70;

/// Exclusive upper bound of [`MockConfidence`] scores
pub const MOCK_CONFIDENCE_MAX: f32 = 1.0;

/// Scores a keyword match
///
/// Implementations may be non-deterministic. Results are clamped to `[0, 1]`.
pub trait ConfidenceScorer: Send + Sync {
    fn score(&self, filename: &str, mime_type: &str, category: &Category) -> f32;
}

/// Placeholder scorer drawing uniformly from `[0.70, 1.00)`.
///
/// This is not a classifier confidence.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockConfidence;

impl ConfidenceScorer for MockConfidence {
    fn score(&self, _filename: &str, _mime_type: &str, _category: &Category) -> f32 {
        rand::thread_rng().gen_range(MOCK_CONFIDENCE_MIN..MOCK_CONFIDENCE_MAX)
    }
}

/// Always returns the same score
#[derive(Debug, Clone, Copy)]
pub struct FixedConfidence(pub f32);

impl ConfidenceScorer for FixedConfidence {
    fn score(&self, _filename: &str, _mime_type: &str, _category: &Category) -> f32 {
        self.0
    }
}

/// Assigns a taxonomy category to a file
pub struct Categorizer {
    taxonomy: Arc<Taxonomy>,
    scorer: Box<dyn ConfidenceScorer>,
}

impl Categorizer {
    /// Create a categorizer using the mock confidence scorer
    pub fn new(taxonomy: Arc<Taxonomy>) -> Self {
        Self::with_scorer(taxonomy, Box::new(MockConfidence))
    }

    pub fn with_scorer(taxonomy: Arc<Taxonomy>, scorer: Box<dyn ConfidenceScorer>) -> Self {
        Self { taxonomy, scorer }
    }

    pub fn taxonomy(&self) -> &Arc<Taxonomy> {
        &self.taxonomy
    }

    /// Pick a category for a file by its name.
    ///
    /// The MIME type is passed through to the scorer but does not influence
    /// which category is chosen. Never fails: anything unmatched (including
    /// an empty name) lands in the fallback category.
    pub fn categorize(&self, filename: &str, mime_type: &str) -> Categorization {
        let lower = filename.to_lowercase();

        match self.taxonomy.keyword_categories().find(|c| c.matches(&lower)) {
            Some(category) => Categorization {
                category_id: category.id.clone(),
                confidence: self
                    .scorer
                    .score(filename, mime_type, category)
                    .clamp(0.0, 1.0),
            },
            None => {
                tracing::debug!("No keyword matched {:?}, using fallback", filename);
                Categorization {
                    category_id: self.taxonomy.fallback().id.clone(),
                    confidence: FALLBACK_CONFIDENCE,
                }
            }
        }
    }

    /// Categorize when the transport could not supply a filename
    pub fn categorize_opt(&self, filename: Option<&str>, mime_type: &str) -> Categorization {
        self.categorize(filename.unwrap_or_default(), mime_type)
    }
}
