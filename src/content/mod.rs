//! Content catalog the scheduled posts draw from.

use anyhow::{Context, Result};
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// A single piece of content handed to the notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub category: String,
    #[serde(default)]
    pub body: String,
}

pub trait ContentProvider: Send + Sync {
    fn random_item(&self) -> Option<Item>;
    /// Up to `n` distinct random items of `category`.
    fn random_items_by_category(&self, category: &str, n: usize) -> Vec<Item>;
    /// Distinct categories, sorted.
    fn categories(&self) -> Vec<String>;
    fn count_by_category(&self) -> BTreeMap<String, usize>;
}

/// Catalog loaded once from a JSON array of [`Item`]s.
pub struct JsonContentProvider {
    items: Vec<Item>,
}

impl JsonContentProvider {
    pub fn from_items(items: Vec<Item>) -> Self {
        Self { items }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read content file {:?}", path))?;
        let items: Vec<Item> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse content file {:?}", path))?;
        info!("Loaded {} content items from {:?}", items.len(), path);
        Ok(Self { items })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl ContentProvider for JsonContentProvider {
    fn random_item(&self) -> Option<Item> {
        self.items.choose(&mut rand::rng()).cloned()
    }

    fn random_items_by_category(&self, category: &str, n: usize) -> Vec<Item> {
        let matching: Vec<&Item> = self
            .items
            .iter()
            .filter(|item| item.category.eq_ignore_ascii_case(category))
            .collect();
        matching
            .choose_multiple(&mut rand::rng(), n)
            .map(|item| (*item).clone())
            .collect()
    }

    fn categories(&self) -> Vec<String> {
        self.count_by_category().into_keys().collect()
    }

    fn count_by_category(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for item in &self.items {
            *counts.entry(item.category.clone()).or_insert(0) += 1;
        }
        counts
    }
}
