//! Free text search and structured filtering over a document snapshot
//!
//! This is a stable filter, not a ranked search: matching documents come
//! back in the order they were given.

use crate::taxonomy::Taxonomy;
use crate::types::{Document, Page};
use serde::{Deserialize, Serialize};

/// Optional structured filters, all of which must pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    /// Exact category id
    #[serde(default)]
    pub category: Option<String>,
    /// Any overlap with the document's tags passes
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// A query and filters prepared for matching many documents
pub struct Matcher<'a> {
    taxonomy: &'a Taxonomy,
    query: String,
    category: Option<&'a str>,
    tags: Vec<String>,
}

impl<'a> Matcher<'a> {
    pub fn new(taxonomy: &'a Taxonomy, query: &str, filters: Option<&'a SearchFilters>) -> Self {
        let category = filters.and_then(|f| f.category.as_deref());
        let tags = filters
            .and_then(|f| f.tags.as_ref())
            .map(|tags| tags.iter().map(|t| t.to_lowercase()).collect())
            .unwrap_or_default();

        if let Some(category) = category {
            if !taxonomy.contains(category) {
                tracing::debug!("Category filter {:?} is not in the taxonomy", category);
            }
        }

        Self {
            taxonomy,
            query: query.to_lowercase(),
            category,
            tags,
        }
    }

    /// Query, category and tag clauses combined with AND
    pub fn matches(&self, doc: &Document) -> bool {
        self.matches_query(doc) && self.matches_category(doc) && self.matches_tags(doc)
    }

    fn matches_query(&self, doc: &Document) -> bool {
        if self.query.is_empty() {
            return true;
        }

        doc.name.to_lowercase().contains(&self.query)
            || self
                .taxonomy
                .display_name(&doc.category)
                .to_lowercase()
                .contains(&self.query)
            || doc
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(&self.query))
    }

    fn matches_category(&self, doc: &Document) -> bool {
        // An unknown id never equals a stored category, so it matches nothing
        self.category.map_or(true, |c| doc.category == c)
    }

    fn matches_tags(&self, doc: &Document) -> bool {
        if self.tags.is_empty() {
            return true;
        }
        doc.tags
            .iter()
            .any(|tag| self.tags.iter().any(|wanted| tag.to_lowercase() == *wanted))
    }
}

/// Filter `documents` by query and filters, keeping their relative order
pub fn search<'d>(
    documents: &'d [Document],
    taxonomy: &Taxonomy,
    query: &str,
    filters: Option<&SearchFilters>,
) -> Vec<&'d Document> {
    let matcher = Matcher::new(taxonomy, query, filters);
    documents.iter().filter(|doc| matcher.matches(doc)).collect()
}

/// Take an offset/limit window over already filtered items
pub fn paginate<T>(items: Vec<T>, offset: usize, limit: usize) -> Page<T> {
    let total = items.len();
    let has_more = total > offset.saturating_add(limit);
    let items = items.into_iter().skip(offset).take(limit).collect();

    Page {
        items,
        total,
        has_more,
        offset,
        limit,
    }
}
