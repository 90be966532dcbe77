use serde::{Deserialize, Serialize};

use super::place::Category;

/// Provenance of a destination row. Pre-existing hand-entered rows are
/// `manual`; the importer writes `google_research` for researched places and
/// `manual_curated` for curated entries it re-enriched via lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Manual,
    GoogleResearch,
    ManualCurated,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Manual => "manual",
            Source::GoogleResearch => "google_research",
            Source::ManualCurated => "manual_curated",
        }
    }
}

/// One entry of the hand-curated manual-places list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualPlace {
    pub name: String,
    pub search_name: Option<String>,
    pub category: Category,
    pub village: String,
    pub lat: f64,
    pub lng: f64,
}

/// Row shape for the `places` table (religious / nature / heritage).
#[derive(Debug, Clone, Serialize)]
pub struct PlaceRow {
    pub name: String,
    pub description: Option<String>,
    pub description_ar: Option<String>,
    pub category: Category,
    pub village: String,
    pub lat: f64,
    pub lng: f64,
    pub image_url: Option<String>,
    pub open_hours: Option<Vec<String>>,
    pub featured: bool,
    pub google_place_id: String,
    pub active: bool,
    pub source: Source,
}

/// Row shape for the `businesses` table (hotel / cafe / restaurant / shop).
#[derive(Debug, Clone, Serialize)]
pub struct BusinessRow {
    pub name: String,
    pub description: Option<String>,
    pub description_ar: Option<String>,
    pub category: Category,
    pub village: String,
    pub lat: f64,
    pub lng: f64,
    pub image_url: Option<String>,
    pub rating: Option<f64>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub price_range: Option<String>,
    pub google_place_id: String,
    pub active: bool,
    pub source: Source,
}
