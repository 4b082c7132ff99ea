//! Candidate sources for recommendations.
//!
//! The catalog owns item lifecycles and filtering; the engine only consumes
//! the resulting id list. Ids the engine has state for do not need to still
//! be listed here.

use serde::{Deserialize, Serialize};

use crate::bandit::arm::ItemId;
use crate::error::BanditError;

/// Filters a host applies before candidates reach the ranker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogQuery {
    /// Case-insensitive substring match on the item category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub exclude: Vec<ItemId>,
}

impl CatalogQuery {
    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            exclude: Vec::new(),
        }
    }

    pub fn excluding(mut self, ids: Vec<ItemId>) -> Self {
        self.exclude = ids;
        self
    }
}

/// Supplies candidate ids for a query.
pub trait CatalogProvider {
    fn candidates(&self, query: &CatalogQuery) -> Result<Vec<ItemId>, BanditError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: ItemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl CatalogItem {
    pub fn new(id: ItemId, category: Option<&str>) -> Self {
        Self {
            id,
            category: category.map(str::to_string),
        }
    }
}

/// In-memory catalog, listed in insertion order.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    items: Vec<CatalogItem>,
}

impl StaticCatalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self { items }
    }

    pub fn push(&mut self, item: CatalogItem) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn category_matches(item: &CatalogItem, wanted: &str) -> bool {
    item.category
        .as_deref()
        .map(|c| c.to_lowercase().contains(&wanted.to_lowercase()))
        .unwrap_or(false)
}

impl CatalogProvider for StaticCatalog {
    fn candidates(&self, query: &CatalogQuery) -> Result<Vec<ItemId>, BanditError> {
        // An empty category string means no category filter.
        let category = query.category.as_deref().filter(|c| !c.trim().is_empty());

        Ok(self
            .items
            .iter()
            .filter(|item| category.map_or(true, |wanted| category_matches(item, wanted)))
            .filter(|item| !query.exclude.contains(&item.id))
            .map(|item| item.id)
            .collect())
    }
}
