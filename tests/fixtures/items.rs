//! Removal items with known footprints.
//!
//! Volumes and weights are chosen so the sums in assertions stay exact.

use multidrop_planner::catalog::{Item, MemoryCatalog};

pub const SMALL_BOX: &str = "box_small"; // 0.25 m³, 5 kg
pub const MEDIUM_BOX: &str = "box_medium"; // 0.5 m³, 50 kg
pub const CRATE: &str = "crate_1m3"; // 1 m³, 100 kg
pub const SOFA: &str = "sofa_3_seater"; // 2.5 m³, 200 kg
pub const SAFE: &str = "safe_heavy"; // 1 m³, 500 kg
pub const PALLET: &str = "pallet_5m3"; // 5 m³, 600 kg
pub const HALF_VAN: &str = "half_van_load"; // 8 m³, 400 kg
pub const WARDROBE: &str = "wardrobe_double"; // 2 m³, 80 kg, dismantled

pub fn test_catalog() -> MemoryCatalog {
    MemoryCatalog::from_items([
        Item::new(SMALL_BOX, 0.25, 5.0).name("Small box"),
        Item::new(MEDIUM_BOX, 0.5, 50.0).name("Medium box"),
        Item::new(CRATE, 1.0, 100.0).name("Crate"),
        Item::new(SOFA, 2.5, 200.0).name("Three-seater sofa"),
        Item::new(SAFE, 1.0, 500.0).name("Floor safe"),
        Item::new(PALLET, 5.0, 600.0).name("Pallet"),
        Item::new(HALF_VAN, 8.0, 400.0).name("Half a van of furniture"),
        Item::new(WARDROBE, 2.0, 80.0)
            .name("Double wardrobe")
            .handling_minutes(50.0),
    ])
}

/// A trimmed copy of the removal dataset format.
pub const DATASET_JSON: &str = r#"{
    "metadata": { "source": "UK removal dataset", "item_count": 3 },
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
            "id": "dining_table",
            "name": "Dining table",
            "category": "Furniture",
            "volume": "2.0",
            "weight": 100,
            "dismantling_required": "Yes",
            "dismantling_time_minutes": 15,
            "reassembly_time_minutes": 20
        },
        {
            "id": "industrial_unit",
            "name": "Industrial unit",
            "category": "Equipment",
            "volume": "10.0",
            "weight": 800,
            "dismantling_required": "No",
            "dismantling_time_minutes": 0,
            "reassembly_time_minutes": 0
        }
    ]
}"#;
