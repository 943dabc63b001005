//! Real Bristol and London addresses for realistic test fixtures.
//!
//! Coordinates sourced from OpenStreetMap.

/// A named place with coordinates.
#[derive(Debug, Clone)]
pub struct Place {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Place {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn coords(&self) -> (f64, f64) {
        (self.lat, self.lng)
    }
}

// ============================================================================
// Bristol
// ============================================================================

pub const BRISTOL: &[Place] = &[
    Place::new("Clifton Village, Bristol BS8", 51.4545, -2.6200),
    Place::new("East Street, Bedminster BS3", 51.4400, -2.6000),
    Place::new("Cotham Hill, Redland BS6", 51.4700, -2.6000),
    Place::new("Wells Road, Totterdown BS4", 51.4420, -2.5750),
    Place::new("Gloucester Road, Bishopston BS7", 51.4760, -2.5910),
    Place::new("North Street, Southville BS3", 51.4420, -2.6080),
];

// ============================================================================
// London
// ============================================================================

pub const LONDON: &[Place] = &[
    Place::new("Camden High Street NW1", 51.5390, -0.1426),
    Place::new("Upper Street, Islington N1", 51.5362, -0.1033),
    Place::new("Brixton Road SW9", 51.4613, -0.1156),
    Place::new("Clapham High Street SW4", 51.4618, -0.1384),
    Place::new("Mare Street, Hackney E8", 51.5450, -0.0553),
    Place::new("King Street, Hammersmith W6", 51.4927, -0.2339),
];
