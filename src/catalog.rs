//! Item capacity data.
//!
//! [`MemoryCatalog`] holds a removal item dataset in memory. [`CatalogCache`]
//! is the per-call memo the planners put in front of any catalog so repeated
//! lookups during a search never hit the backing store twice.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::io::Read;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PlanError;
use crate::traits::ItemCatalog;

/// Minutes spent carrying any item, before dismantling and reassembly.
pub const BASE_HANDLING_MINUTES: f64 = 5.0;

/// An item as the planner sees it: an identity plus its physical footprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub volume_m3: f64,
    pub weight_kg: f64,
    pub handling_minutes: f64,
}

impl Item {
    pub fn new(id: impl Into<String>, volume_m3: f64, weight_kg: f64) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            volume_m3,
            weight_kg,
            handling_minutes: BASE_HANDLING_MINUTES,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn handling_minutes(mut self, minutes: f64) -> Self {
        self.handling_minutes = minutes;
        self
    }
}

/// Result of a batched item lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemResolution {
    pub items: Vec<Item>,
    pub missing_ids: Vec<String>,
}

impl ItemResolution {
    /// Indexes the resolved items by id.
    pub fn lookup(&self) -> HashMap<&str, &Item> {
        self.items.iter().map(|item| (item.id.as_str(), item)).collect()
    }
}

/// Summed footprint of a list of item ids. Duplicated ids count every time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadSummary {
    pub volume_m3: f64,
    pub weight_kg: f64,
    pub handling_minutes: f64,
    pub item_count: usize,
    pub missing_ids: Vec<String>,
}

/// Totals the footprint of `item_ids`. Unknown ids contribute nothing.
pub fn summarize<C: ItemCatalog + ?Sized>(catalog: &C, item_ids: &[String]) -> LoadSummary {
    let resolution = catalog.resolve_items(item_ids);
    let lookup = resolution.lookup();

    let mut summary = LoadSummary {
        item_count: item_ids.len(),
        missing_ids: resolution.missing_ids.clone(),
        ..LoadSummary::default()
    };
    for id in item_ids {
        if let Some(item) = lookup.get(id.as_str()) {
            summary.volume_m3 += item.volume_m3;
            summary.weight_kg += item.weight_kg;
            summary.handling_minutes += item.handling_minutes;
        }
    }
    summary
}

/// In-memory item dataset.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    items: HashMap<String, Item>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: impl IntoIterator<Item = Item>) -> Self {
        let mut catalog = Self::new();
        for item in items {
            catalog.insert(item);
        }
        catalog
    }

    /// Parses the removal dataset JSON (`{ "items": [...] }`).
    pub fn from_json_str(json: &str) -> Result<Self, PlanError> {
        let dataset: DatasetFile = serde_json::from_str(json)?;
        Self::from_dataset(dataset)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, PlanError> {
        let dataset: DatasetFile = serde_json::from_reader(reader)?;
        Self::from_dataset(dataset)
    }

    fn from_dataset(dataset: DatasetFile) -> Result<Self, PlanError> {
        let items = dataset
            .items
            .into_iter()
            .map(Item::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(items = items.len(), "loaded item dataset");
        Ok(Self::from_items(items))
    }

    /// Inserts or replaces an item.
    pub fn insert(&mut self, item: Item) {
        self.items.insert(item.id.clone(), item);
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.items.get(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl ItemCatalog for MemoryCatalog {
    fn resolve_items(&self, item_ids: &[String]) -> ItemResolution {
        let mut seen = HashSet::new();
        let mut resolution = ItemResolution::default();

        for id in item_ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            match self.items.get(id) {
                Some(item) => resolution.items.push(item.clone()),
                None => resolution.missing_ids.push(id.clone()),
            }
        }
        resolution
    }
}

/// Memoizing front for another catalog, scoped to one planning call.
///
/// Negative results are cached as well, so an unknown id is asked for once.
pub struct CatalogCache<'a, C: ?Sized> {
    inner: &'a C,
    known: RefCell<HashMap<String, Option<Item>>>,
}

impl<'a, C: ItemCatalog + ?Sized> CatalogCache<'a, C> {
    pub fn new(inner: &'a C) -> Self {
        Self {
            inner,
            known: RefCell::new(HashMap::new()),
        }
    }

    /// Fetches every uncached id in a single batched read.
    pub fn prefetch(&self, item_ids: &[String]) {
        let mut seen = HashSet::new();
        let uncached: Vec<String> = {
            let known = self.known.borrow();
            item_ids
                .iter()
                .filter(|id| !known.contains_key(id.as_str()) && seen.insert(id.as_str()))
                .cloned()
                .collect()
        };
        if uncached.is_empty() {
            return;
        }

        let resolution = self.inner.resolve_items(&uncached);
        let mut known = self.known.borrow_mut();
        for item in resolution.items {
            known.insert(item.id.clone(), Some(item));
        }
        for id in uncached {
            known.entry(id).or_insert(None);
        }
    }

    /// Forgets everything cached so far.
    pub fn invalidate(&self) {
        self.known.borrow_mut().clear();
    }

    /// Number of ids (found or missing) held in the cache.
    pub fn cached_len(&self) -> usize {
        self.known.borrow().len()
    }
}

impl<C: ItemCatalog + ?Sized> ItemCatalog for CatalogCache<'_, C> {
    fn resolve_items(&self, item_ids: &[String]) -> ItemResolution {
        self.prefetch(item_ids);

        let known = self.known.borrow();
        let mut seen = HashSet::new();
        let mut resolution = ItemResolution::default();
        for id in item_ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            match known.get(id.as_str()) {
                Some(Some(item)) => resolution.items.push(item.clone()),
                _ => resolution.missing_ids.push(id.clone()),
            }
        }
        resolution
    }
}

#[derive(Debug, Deserialize)]
struct DatasetFile {
    items: Vec<DatasetRow>,
}

#[derive(Debug, Deserialize)]
struct DatasetRow {
    id: String,
    name: String,
    volume: RawVolume,
    weight: f64,
    #[serde(default)]
    dismantling_required: Option<String>,
    #[serde(default)]
    dismantling_time_minutes: Option<f64>,
    #[serde(default)]
    reassembly_time_minutes: Option<f64>,
}

/// The dataset stores volume as a string; plain numbers are accepted too.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawVolume {
    Number(f64),
    Text(String),
}

impl TryFrom<DatasetRow> for Item {
    type Error = PlanError;

    fn try_from(row: DatasetRow) -> Result<Self, Self::Error> {
        let volume_m3 = match &row.volume {
            RawVolume::Number(value) => *value,
            RawVolume::Text(text) => {
                text.trim()
                    .parse::<f64>()
                    .map_err(|_| PlanError::InvalidItem {
                        item_id: row.id.clone(),
                        reason: format!("volume {text:?} is not a number"),
                    })?
            }
        };

        if !(volume_m3 > 0.0) {
            return Err(PlanError::InvalidItem {
                item_id: row.id,
                reason: format!("volume must be positive, got {volume_m3}"),
            });
        }
        if !(row.weight > 0.0) {
            return Err(PlanError::InvalidItem {
                item_id: row.id,
                reason: format!("weight must be positive, got {}", row.weight),
            });
        }

        let dismantled = row
            .dismantling_required
            .as_deref()
            .is_some_and(|flag| flag.eq_ignore_ascii_case("yes"));
        let handling_minutes = if dismantled {
            BASE_HANDLING_MINUTES
                + row.dismantling_time_minutes.unwrap_or(0.0)
                + row.reassembly_time_minutes.unwrap_or(0.0)
        } else {
            BASE_HANDLING_MINUTES
        };

        Ok(Item {
            id: row.id,
            name: row.name,
            volume_m3,
            weight_kg: row.weight,
            handling_minutes,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    const DATASET: &str = r#"{
        "metadata": { "source": "uk-removal", "version": 3 },
        "items": [
            {
                "id": "storage_box",
                "name": "Storage box",
                "category": "Storage",
                "volume": "0.1",
                "weight": 10,
                "dismantling_required": "No",
                "dismantling_time_minutes": 0,
                "reassembly_time_minutes": 0
            },
            {
                "id": "wardrobe_double",
                "name": "Double wardrobe",
                "category": "Furniture",
                "volume": "2.0",
                "weight": 100,
                "dismantling_required": "Yes",
                "dismantling_time_minutes": 20,
                "reassembly_time_minutes": 25
            }
        ]
    }"#;

    struct CountingCatalog {
        inner: MemoryCatalog,
        calls: Cell<usize>,
    }

    impl ItemCatalog for CountingCatalog {
        fn resolve_items(&self, item_ids: &[String]) -> ItemResolution {
            self.calls.set(self.calls.get() + 1);
            self.inner.resolve_items(item_ids)
        }
    }

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_dataset_parsing() {
        let catalog = MemoryCatalog::from_json_str(DATASET).unwrap();
        assert_eq!(catalog.len(), 2);

        let box_item = catalog.get("storage_box").unwrap();
        assert_eq!(box_item.volume_m3, 0.1);
        assert_eq!(box_item.weight_kg, 10.0);
        assert_eq!(box_item.handling_minutes, 5.0);

        let wardrobe = catalog.get("wardrobe_double").unwrap();
        assert_eq!(wardrobe.handling_minutes, 50.0);
    }

    #[test]
    fn test_dataset_rejects_non_positive_volume() {
        let json = r#"{"items": [{"id": "ghost", "name": "Ghost", "volume": "0", "weight": 5}]}"#;
        let err = MemoryCatalog::from_json_str(json).unwrap_err();
        assert!(matches!(err, PlanError::InvalidItem { ref item_id, .. } if item_id == "ghost"));
    }

    #[test]
    fn test_dataset_rejects_unparsable_volume() {
        let json = r#"{"items": [{"id": "odd", "name": "Odd", "volume": "large", "weight": 5}]}"#;
        assert!(matches!(
            MemoryCatalog::from_json_str(json),
            Err(PlanError::InvalidItem { .. })
        ));
    }

    #[test]
    fn test_malformed_json_is_dataset_error() {
        assert!(matches!(
            MemoryCatalog::from_json_str("{ not json"),
            Err(PlanError::Dataset(_))
        ));
    }

    #[test]
    fn test_resolve_reports_missing_once() {
        let catalog = MemoryCatalog::from_json_str(DATASET).unwrap();
        let resolution =
            catalog.resolve_items(&ids(&["storage_box", "nope", "storage_box", "nope"]));

        assert_eq!(resolution.items.len(), 1);
        assert_eq!(resolution.missing_ids, vec!["nope".to_string()]);
    }

    #[test]
    fn test_summarize_counts_duplicates() {
        let catalog = MemoryCatalog::from_json_str(DATASET).unwrap();
        let summary = summarize(&catalog, &ids(&["storage_box", "storage_box", "nope"]));

        assert!((summary.volume_m3 - 0.2).abs() < 1e-12);
        assert_eq!(summary.weight_kg, 20.0);
        assert_eq!(summary.item_count, 3);
        assert_eq!(summary.missing_ids, vec!["nope".to_string()]);
    }

    #[test]
    fn test_cache_reads_backing_catalog_once() {
        let backing = CountingCatalog {
            inner: MemoryCatalog::from_json_str(DATASET).unwrap(),
            calls: Cell::new(0),
        };
        let cache = CatalogCache::new(&backing);
        let request = ids(&["storage_box", "wardrobe_double", "nope"]);

        cache.prefetch(&request);
        let first = cache.resolve_items(&request);
        let second = cache.resolve_items(&ids(&["nope", "storage_box"]));

        assert_eq!(backing.calls.get(), 1);
        assert_eq!(first.items.len(), 2);
        assert_eq!(second.missing_ids, vec!["nope".to_string()]);
        assert_eq!(cache.cached_len(), 3);
    }

    #[test]
    fn test_cache_invalidate_refetches() {
        let backing = CountingCatalog {
            inner: MemoryCatalog::from_json_str(DATASET).unwrap(),
            calls: Cell::new(0),
        };
        let cache = CatalogCache::new(&backing);
        let request = ids(&["storage_box"]);

        cache.resolve_items(&request);
        cache.invalidate();
        assert_eq!(cache.cached_len(), 0);
        cache.resolve_items(&request);

        assert_eq!(backing.calls.get(), 2);
    }
}
