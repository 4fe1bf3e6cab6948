//! The fixed category taxonomy documents are sorted into
//!
//! The taxonomy is an ordered table. Declaration order is significant: the
//! categorizer walks it front to back and the first keyword hit wins.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// One taxonomy entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub display_name: String,
    /// Lower-case substrings matched against filenames
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Category {
    pub fn new(id: &str, display_name: &str, keywords: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// The fallback category is the one without keywords
    pub fn is_fallback(&self) -> bool {
        self.keywords.is_empty()
    }

    /// Whether any keyword occurs in an already lower-cased filename
    pub fn matches(&self, lower_filename: &str) -> bool {
        self.keywords.iter().any(|k| lower_filename.contains(k.as_str()))
    }
}

/// Ordered, validated set of categories
#[derive(Debug, Clone, Serialize)]
pub struct Taxonomy {
    categories: Vec<Category>,
    fallback: usize,
}

impl Taxonomy {
    /// Build a taxonomy, checking that ids are unique and that exactly one
    /// category has no keywords
    pub fn new(categories: Vec<Category>) -> Result<Self> {
        // Keywords are matched against lower-cased filenames. Blank ones are
        // dropped before the fallback count so they cannot hide a fallback.
        let categories: Vec<Category> = categories
            .into_iter()
            .map(|mut c| {
                c.keywords = c
                    .keywords
                    .into_iter()
                    .map(|k| k.to_lowercase())
                    .filter(|k| !k.trim().is_empty())
                    .collect();
                c
            })
            .collect();

        let mut seen = HashSet::new();
        for category in &categories {
            if category.id.trim().is_empty() {
                return Err(crate::Error::Config("Category id must not be empty".to_string()));
            }
            if !seen.insert(category.id.as_str()) {
                return Err(crate::Error::Config(format!(
                    "Duplicate category id: {}",
                    category.id
                )));
            }
        }

        let fallbacks: Vec<usize> = categories
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_fallback())
            .map(|(i, _)| i)
            .collect();

        let fallback = match fallbacks.as_slice() {
            [only] => *only,
            [] => {
                return Err(crate::Error::Config(
                    "Taxonomy needs one category without keywords as fallback".to_string(),
                ))
            }
            _ => {
                return Err(crate::Error::Config(format!(
                    "Taxonomy has {} categories without keywords, expected exactly one",
                    fallbacks.len()
                )))
            }
        };

        Ok(Self { categories, fallback })
    }

    /// The taxonomy shipped with daftar
    pub fn builtin() -> Self {
        let categories = vec![
            Category::new(
                "education",
                "Education",
                &["diploma", "degree", "certificate", "transcript", "report card"],
            ),
            Category::new(
                "employment",
                "Employment & Income",
                &["payslip", "salary", "w2", "w-2", "contract", "offer"],
            ),
            Category::new(
                "finance",
                "Finance",
                &["bank", "statement", "loan", "credit", "investment"],
            ),
            Category::new(
                "medical",
                "Medical",
                &["medical", "prescription", "health", "vaccination", "report"],
            ),
            Category::new(
                "utilities",
                "Utilities & Bills",
                &["bill", "utility", "electric", "water", "gas", "internet"],
            ),
            Category::new(
                "property",
                "Property & Rent",
                &["lease", "rent", "property", "deed", "mortgage"],
            ),
            Category::new(
                "legal",
                "Legal & Identity",
                &["passport", "license", "id", "birth", "marriage", "ssn"],
            ),
            Category::new(
                "vehicles",
                "Vehicles",
                &["registration", "car", "vehicle", "insurance", "puc"],
            ),
            Category::new("insurance", "Insurance", &["insurance", "policy", "claim"]),
            Category::new(
                "personal",
                "Personal & Family",
                &["family", "emergency", "personal", "note"],
            ),
            Category::new(
                "purchases",
                "Online Purchases",
                &["invoice", "receipt", "warranty", "purchase"],
            ),
            Category::new("miscellaneous", "Miscellaneous", &[]),
        ];

        // Only the fallback has an empty keyword list
        Self {
            fallback: categories.len() - 1,
            categories,
        }
    }

    /// Load a taxonomy from a JSON array of categories
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let categories: Vec<Category> = serde_json::from_str(&json)?;
        Self::new(categories)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn get(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn fallback(&self) -> &Category {
        &self.categories[self.fallback]
    }

    /// Display name for a category id, empty if the id is unknown
    pub fn display_name(&self, id: &str) -> &str {
        self.get(id).map(|c| c.display_name.as_str()).unwrap_or("")
    }

    /// Categories that can be matched by keyword, in priority order
    pub fn keyword_categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter().filter(|c| !c.is_fallback())
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::builtin()
    }
}
