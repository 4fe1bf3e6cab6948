//! Collection statistics computed from an owner's documents

use crate::taxonomy::Taxonomy;
use crate::types::Document;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// How far back an upload still counts as recent
pub const RECENT_WINDOW_DAYS: i64 = 7;

/// Count of documents in one category
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    pub category: String,
    pub display_name: String,
    pub count: usize,
}

/// Overview of an owner's collection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsOverview {
    pub total_documents: usize,
    /// Documents outside the fallback category
    pub categorized_documents: usize,
    pub recent_uploads: usize,
    pub categories_used: usize,
    /// Percentage of categorized documents, 0 for an empty collection
    pub organization_score: u32,
    pub total_size_bytes: u64,
    /// Every taxonomy category in taxonomy order, including empty ones
    pub category_breakdown: Vec<CategoryCount>,
}

/// Compute the overview as of `now`
pub fn overview(documents: &[Document], taxonomy: &Taxonomy, now: DateTime<Utc>) -> StatsOverview {
    let fallback = taxonomy.fallback().id.as_str();
    let cutoff = now - Duration::days(RECENT_WINDOW_DAYS);

    let total_documents = documents.len();
    let categorized_documents = documents.iter().filter(|d| d.category != fallback).count();
    let recent_uploads = documents.iter().filter(|d| d.uploaded_at >= cutoff).count();
    let categories_used = documents
        .iter()
        .map(|d| d.category.as_str())
        .collect::<HashSet<_>>()
        .len();
    let total_size_bytes = documents.iter().map(|d| d.size_bytes).sum();

    let organization_score = if total_documents > 0 {
        ((categorized_documents as f64 / total_documents as f64) * 100.0).round() as u32
    } else {
        0
    };

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for doc in documents {
        *counts.entry(doc.category.as_str()).or_insert(0) += 1;
    }

    let category_breakdown = taxonomy
        .categories()
        .iter()
        .map(|c| CategoryCount {
            category: c.id.clone(),
            display_name: c.display_name.clone(),
            count: counts.get(c.id.as_str()).copied().unwrap_or(0),
        })
        .collect();

    StatsOverview {
        total_documents,
        categorized_documents,
        recent_uploads,
        categories_used,
        organization_score,
        total_size_bytes,
        category_breakdown,
    }
}
