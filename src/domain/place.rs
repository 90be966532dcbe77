use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Internal category a place ends up under. Declaration order is the
/// categorizer's priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Religious,
    Nature,
    Heritage,
    Hotel,
    Cafe,
    Restaurant,
    Shop,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Religious => "religious",
            Category::Nature => "nature",
            Category::Heritage => "heritage",
            Category::Hotel => "hotel",
            Category::Cafe => "cafe",
            Category::Restaurant => "restaurant",
            Category::Shop => "shop",
        }
    }

    /// Businesses land in the `businesses` table, everything else in `places`.
    pub fn is_business(&self) -> bool {
        matches!(
            self,
            Category::Hotel | Category::Cafe | Category::Restaurant | Category::Shop
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lng >= self.min_lng && lng <= self.max_lng
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub author: Option<String>,
    pub rating: Option<f64>,
    pub text: Option<String>,
    pub relative_time: Option<String>,
}

/// One researched point of interest, as written to the raw-places artifact.
/// Immutable once emitted; the scorer only ever adds to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPlace {
    pub google_place_id: String,
    pub name: String,
    pub address: String,
    pub village: String,
    pub types: BTreeSet<String>,
    pub category: Category,
    pub lat: f64,
    pub lng: f64,
    pub rating: f64,
    pub user_ratings_total: u32,
    pub price_level: Option<u8>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub editorial_summary: Option<String>,
    pub open_hours: Option<Vec<String>>,
    pub reviews: Vec<Review>,
    pub photo_refs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPlace {
    #[serde(flatten)]
    pub place: RawPlace,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchArtifact {
    pub researched_at: DateTime<Utc>,
    pub queries: Vec<String>,
    pub bounds: BoundingBox,
    pub search_calls: u32,
    pub details_calls: u32,
    pub estimated_cost_usd: f64,
    /// Candidates evaluated and rejected (filters, failed details fetch, no
    /// category). A query whose search failed outright contributes nothing
    /// here; its results were never seen.
    pub skipped: u32,
    pub places: Vec<RawPlace>,
}

/// Scored artifact: the raw places plus scoring metadata, `places` sorted
/// descending by score (stable, ties keep research order).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredArtifact {
    pub scored_at: DateTime<Utc>,
    pub global_avg_rating: f64,
    pub bayesian_m: u32,
    // 0 means "not recorded"; the importer falls back to its default then.
    #[serde(default)]
    pub percentile: u8,
    pub top_count: usize,
    pub bottom_count: usize,
    pub places: Vec<ScoredPlace>,
}
