//! Static recommendation table.
//!
//! The default table is embedded at compile time from
//! `contrib/recommendations.toml`; an override file with the same layout can
//! be loaded instead. Either way the table is validated once at load time, so
//! lookups against a constructed [`RecommendationTable`] can never come back
//! empty.

use crate::types::{AgeGroup, LookupKey, Mood, Product, RecommendationRecord, ANY};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

const DEFAULT_TABLE: &str = include_str!("../../../contrib/recommendations.toml");

#[derive(Error, Debug)]
pub enum TableError {
    #[error("failed to read recommendation table: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed recommendation table: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("recommendation table has no fallback entry for {}", LookupKey::fallback())]
    MissingFallback,
    #[error("duplicate recommendation key {0}")]
    DuplicateKey(LookupKey),
    #[error("invalid age group {value:?} in key {key} (expected <25, 25-40, 40+ or Any)")]
    InvalidAgeGroup { key: LookupKey, value: String },
    #[error("invalid mood {value:?} in key {key}")]
    InvalidMood { key: LookupKey, value: String },
    #[error("empty {component} in key {key}")]
    EmptyKeyComponent { key: LookupKey, component: &'static str },
}

/// Top-level table file structure.
#[derive(Debug, Deserialize)]
struct TableFile {
    #[serde(default, rename = "recommendation")]
    recommendations: Vec<TableEntry>,
}

/// One `[[recommendation]]` section.
#[derive(Debug, Deserialize)]
struct TableEntry {
    age_group: String,
    gender: String,
    race: String,
    mood: String,
    skin_condition: String,
    source: String,
    #[serde(default)]
    products: Vec<Product>,
    #[serde(default)]
    lifestyle_changes: Vec<String>,
}

impl TableEntry {
    fn into_parts(self) -> (LookupKey, RecommendationRecord) {
        let key = LookupKey::new(self.age_group, self.gender, self.race, self.mood);
        let record = RecommendationRecord {
            skin_condition: self.skin_condition,
            products: self.products,
            lifestyle_changes: self.lifestyle_changes,
            source: self.source,
        };
        (key, record)
    }
}

/// Validated, read-only recommendation table.
#[derive(Debug, Clone)]
pub struct RecommendationTable {
    entries: HashMap<LookupKey, RecommendationRecord>,
    /// Keys in file order, for listing.
    order: Vec<LookupKey>,
    fallback: RecommendationRecord,
}

impl RecommendationTable {
    /// Parse the table embedded in the binary.
    pub fn builtin() -> Result<Self, TableError> {
        Self::from_toml_str(DEFAULT_TABLE)
    }

    /// Read and validate a table file.
    pub fn load(path: &Path) -> Result<Self, TableError> {
        let src = std::fs::read_to_string(path)?;
        let table = Self::from_toml_str(&src)?;
        tracing::info!(
            path = %path.display(),
            entries = table.len(),
            "loaded recommendation table"
        );
        Ok(table)
    }

    pub fn from_toml_str(src: &str) -> Result<Self, TableError> {
        let file: TableFile = toml::from_str(src)?;
        Self::from_entries(file.recommendations.into_iter().map(TableEntry::into_parts))
    }

    /// Build a table from key/record pairs, enforcing key well-formedness,
    /// key uniqueness and the presence of the fallback entry.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (LookupKey, RecommendationRecord)>,
    ) -> Result<Self, TableError> {
        let mut map = HashMap::new();
        let mut order = Vec::new();

        for (key, record) in entries {
            validate_key(&key)?;
            if map.contains_key(&key) {
                return Err(TableError::DuplicateKey(key));
            }
            order.push(key.clone());
            map.insert(key, record);
        }

        let fallback = map
            .get(&LookupKey::fallback())
            .cloned()
            .ok_or(TableError::MissingFallback)?;

        tracing::debug!(entries = map.len(), "recommendation table validated");

        Ok(Self {
            entries: map,
            order,
            fallback,
        })
    }

    /// Exact-match lookup. Wildcards in `key` are matched literally.
    pub fn get(&self, key: &LookupKey) -> Option<&RecommendationRecord> {
        self.entries.get(key)
    }

    /// The record stored under `(Any, Any, Any, Neutral)`.
    pub fn fallback(&self) -> &RecommendationRecord {
        &self.fallback
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in the order they were declared.
    pub fn iter(&self) -> impl Iterator<Item = (&LookupKey, &RecommendationRecord)> {
        self.order
            .iter()
            .filter_map(|key| self.entries.get_key_value(key))
    }
}

fn validate_key(key: &LookupKey) -> Result<(), TableError> {
    if key.age_group != ANY && key.age_group.parse::<AgeGroup>().is_err() {
        return Err(TableError::InvalidAgeGroup {
            key: key.clone(),
            value: key.age_group.clone(),
        });
    }
    if key.mood != ANY && key.mood.parse::<Mood>().is_err() {
        return Err(TableError::InvalidMood {
            key: key.clone(),
            value: key.mood.clone(),
        });
    }
    for (component, value) in [("gender", &key.gender), ("race", &key.race)] {
        if value.is_empty() {
            return Err(TableError::EmptyKeyComponent {
                key: key.clone(),
                component,
            });
        }
    }
    Ok(())
}
