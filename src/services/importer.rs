use std::collections::HashSet;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use sqlx::PgPool;

use crate::dal::{business_db, place_db};
use crate::domain::import::{BusinessRow, ManualPlace, PlaceRow, Source};
use crate::domain::place::{Category, ScoredArtifact, ScoredPlace};

use super::places_client::PlacesApi;
use super::scorer::top_count;

pub const DEFAULT_PERCENTILE: u8 = 30;
const UPSERT_BATCH: usize = 50;

pub struct ImportOptions {
    pub percentile: Option<u8>,
    pub dry_run: bool,
    pub keep_existing: bool,
}

/// Percentile precedence: flag, then the scored artifact's own metadata,
/// then the default.
pub fn effective_percentile(flag: Option<u8>, artifact: &ScoredArtifact) -> u8 {
    match flag {
        Some(p) => p,
        None if (1..=100).contains(&artifact.percentile) => artifact.percentile,
        None => DEFAULT_PERCENTILE,
    }
}

pub fn select_top(artifact: &ScoredArtifact, percentile: u8) -> &[ScoredPlace] {
    let keep = top_count(artifact.places.len(), percentile).min(artifact.places.len());
    &artifact.places[..keep]
}

/// Manual entries whose name is not already among the selected places
/// (lowercased comparison).
pub fn unmatched_manual<'a>(
    selected: &[ScoredPlace],
    manual: &'a [ManualPlace],
) -> Vec<&'a ManualPlace> {
    let present: HashSet<String> = selected
        .iter()
        .map(|p| p.place.name.to_lowercase())
        .collect();
    manual
        .iter()
        .filter(|m| !present.contains(&m.name.to_lowercase()))
        .collect()
}

/// Stable conflict key for a manual entry the lookup could not resolve.
pub fn manual_slug_id(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash && !slug.is_empty() {
            slug.push('-');
            last_dash = true;
        }
    }
    format!("manual-{}", slug.trim_end_matches('-'))
}

/// Research and manual entries meet in this shape before being routed into
/// the two destination tables.
#[derive(Debug, Clone, Serialize)]
pub struct ImportCandidate {
    pub name: String,
    pub description: Option<String>,
    pub category: Category,
    pub village: String,
    pub lat: f64,
    pub lng: f64,
    pub image_url: Option<String>,
    pub open_hours: Option<Vec<String>>,
    pub rating: Option<f64>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub price_level: Option<u8>,
    pub google_place_id: String,
    pub source: Source,
}

pub fn research_candidate(scored: &ScoredPlace, image_url: Option<String>) -> ImportCandidate {
    let p = &scored.place;
    ImportCandidate {
        name: p.name.clone(),
        description: p.editorial_summary.clone(),
        category: p.category,
        village: p.village.clone(),
        lat: p.lat,
        lng: p.lng,
        image_url,
        open_hours: p.open_hours.clone(),
        rating: Some(p.rating),
        phone: p.phone.clone(),
        website: p.website.clone(),
        price_level: p.price_level,
        google_place_id: p.google_place_id.clone(),
        source: Source::GoogleResearch,
    }
}

fn manual_fallback(m: &ManualPlace) -> ImportCandidate {
    ImportCandidate {
        name: m.name.clone(),
        description: None,
        category: m.category,
        village: m.village.clone(),
        lat: m.lat,
        lng: m.lng,
        image_url: None,
        open_hours: None,
        rating: None,
        phone: None,
        website: None,
        price_level: None,
        google_place_id: manual_slug_id(&m.name),
        source: Source::ManualCurated,
    }
}

/// Re-enriches a manual entry via lookup; any failure falls back to the
/// hand-entered coordinates with no photo.
async fn resolve_manual<A: PlacesApi>(api: &A, m: &ManualPlace) -> ImportCandidate {
    let query = m.search_name.as_deref().unwrap_or(&m.name);
    let found = match api.find_place(query).await {
        Ok(Some(found)) => found,
        Ok(None) => {
            log::warn!("no lookup result for '{}', keeping manual coordinates", m.name);
            return manual_fallback(m);
        }
        Err(e) => {
            log::warn!("lookup failed for '{}': {e}, keeping manual coordinates", m.name);
            return manual_fallback(m);
        }
    };

    let (lat, lng) = found
        .geometry
        .as_ref()
        .map(|g| (g.location.lat, g.location.lng))
        .unwrap_or((m.lat, m.lng));
    let image_url = found
        .photos
        .first()
        .and_then(|p| api.photo_url(&p.photo_reference));
    let open_hours = match api.details(&found.place_id).await {
        Ok(Some(details)) => details.opening_hours.map(|h| h.weekday_text),
        Ok(None) => None,
        Err(e) => {
            log::warn!("details fetch failed for curated '{}': {e}", m.name);
            None
        }
    };

    ImportCandidate {
        lat,
        lng,
        image_url,
        open_hours,
        google_place_id: found.place_id,
        ..manual_fallback(m)
    }
}

pub struct RowSet {
    pub places: Vec<PlaceRow>,
    pub businesses: Vec<BusinessRow>,
}

fn price_range(level: Option<u8>) -> Option<String> {
    level.map(|l| "$".repeat(usize::from(l.max(1))))
}

/// Routes each candidate into exactly one destination table by category.
/// The first research candidate per place-category is the featured one
/// (candidates arrive score-sorted); manual entries are never featured.
pub fn build_rows(candidates: &[ImportCandidate]) -> RowSet {
    let mut featured_taken: HashSet<Category> = HashSet::new();
    let mut rows = RowSet {
        places: Vec::new(),
        businesses: Vec::new(),
    };

    for c in candidates {
        if c.category.is_business() {
            rows.businesses.push(BusinessRow {
                name: c.name.clone(),
                description: c.description.clone(),
                description_ar: None,
                category: c.category,
                village: c.village.clone(),
                lat: c.lat,
                lng: c.lng,
                image_url: c.image_url.clone(),
                rating: c.rating,
                phone: c.phone.clone(),
                website: c.website.clone(),
                price_range: price_range(c.price_level),
                google_place_id: c.google_place_id.clone(),
                active: true,
                source: c.source,
            });
        } else {
            let featured =
                c.source == Source::GoogleResearch && featured_taken.insert(c.category);
            rows.places.push(PlaceRow {
                name: c.name.clone(),
                description: c.description.clone(),
                description_ar: None,
                category: c.category,
                village: c.village.clone(),
                lat: c.lat,
                lng: c.lng,
                image_url: c.image_url.clone(),
                open_hours: c.open_hours.clone(),
                featured,
                google_place_id: c.google_place_id.clone(),
                active: true,
                source: c.source,
            });
        }
    }

    rows
}

/// Non-revert import: check the destination schema, select, merge manual,
/// build rows, then replace the destination's active set (tag untagged as
/// manual, deactivate, upsert in batches). With `--dry-run` everything is
/// computed but nothing leaves the process except a sample row and the
/// counts.
pub async fn run_import<A: PlacesApi>(
    artifact: ScoredArtifact,
    manual: Vec<ManualPlace>,
    options: &ImportOptions,
    api: &A,
    pool: Option<&PgPool>,
) -> Result<()> {
    // Schema precondition comes before anything else so a stale schema
    // aborts the run before a single paid lookup is spent.
    let live_pool = match (options.dry_run, pool) {
        (true, _) => None,
        (false, None) => bail!("a database connection is required for a live import"),
        (false, Some(pool)) => {
            ensure_destination_schema(pool).await?;
            Some(pool)
        }
    };

    let percentile = effective_percentile(options.percentile, &artifact);
    let selected = select_top(&artifact, percentile);
    log::info!(
        "importing top {percentile}% -> {} of {} scored places",
        selected.len(),
        artifact.places.len()
    );

    let mut candidates: Vec<ImportCandidate> = selected
        .iter()
        .map(|p| {
            let image_url = p.place.photo_refs.first().and_then(|r| api.photo_url(r));
            research_candidate(p, image_url)
        })
        .collect();

    for m in unmatched_manual(selected, &manual) {
        let candidate = if options.dry_run {
            // no lookup side effects in a dry run
            manual_fallback(m)
        } else {
            resolve_manual(api, m).await
        };
        candidates.push(candidate);
    }

    let rows = build_rows(&candidates);

    match live_pool {
        Some(pool) => apply(&rows, options.keep_existing, pool).await,
        None => {
            print_dry_run(&rows);
            Ok(())
        }
    }
}

async fn ensure_destination_schema(pool: &PgPool) -> Result<()> {
    place_db::ensure_import_columns(pool).await.context(
        "the places table is missing the active/source columns; \
         apply the latest schema migration before importing",
    )?;
    business_db::ensure_import_columns(pool).await.context(
        "the businesses table is missing the active/source columns; \
         apply the latest schema migration before importing",
    )?;
    Ok(())
}

fn print_dry_run(rows: &RowSet) {
    let sample = rows
        .places
        .first()
        .map(|r| serde_json::to_string_pretty(r).unwrap_or_default())
        .or_else(|| {
            rows.businesses
                .first()
                .map(|r| serde_json::to_string_pretty(r).unwrap_or_default())
        });

    println!("dry run: would upsert {} place rows and {} business rows", rows.places.len(), rows.businesses.len());
    if let Some(sample) = sample {
        println!("sample row:\n{sample}");
    }
}

async fn apply(rows: &RowSet, keep_existing: bool, pool: &PgPool) -> Result<()> {
    let tagged = place_db::tag_missing_source_as_manual(pool).await?
        + business_db::tag_missing_source_as_manual(pool).await?;
    if tagged > 0 {
        log::info!("tagged {tagged} pre-existing rows as source=manual");
    }

    if keep_existing {
        log::info!("--keep-existing: leaving currently active rows untouched");
    } else {
        let deactivated = place_db::deactivate_active(pool).await?
            + business_db::deactivate_active(pool).await?;
        log::info!("deactivated {deactivated} previously active rows");
    }

    // The tag/deactivate/upsert sequence is not one transaction; a crash in
    // between leaves the store deactivated but partly written. Re-running
    // the import recovers it, the conflict key keeps the upsert idempotent.
    for batch in rows.places.chunks(UPSERT_BATCH) {
        place_db::upsert_batch(batch, pool)
            .await
            .context("places upsert batch failed")?;
    }
    for batch in rows.businesses.chunks(UPSERT_BATCH) {
        business_db::upsert_batch(batch, pool)
            .await
            .context("businesses upsert batch failed")?;
    }

    log::info!(
        "import complete: {} place rows and {} business rows upserted",
        rows.places.len(),
        rows.businesses.len()
    );
    Ok(())
}

/// Restores the pre-import hand-curated state: hand-entered rows become
/// active again, everything the importer wrote goes inactive. Research and
/// curated rows are kept, so import/revert can alternate freely.
pub async fn run_revert(pool: &PgPool) -> Result<()> {
    place_db::ensure_import_columns(pool)
        .await
        .context("the places table is missing the active/source columns")?;
    business_db::ensure_import_columns(pool)
        .await
        .context("the businesses table is missing the active/source columns")?;

    let reactivated = place_db::reactivate_manual(pool).await?
        + business_db::reactivate_manual(pool).await?;
    let deactivated = place_db::deactivate_non_manual(pool).await?
        + business_db::deactivate_non_manual(pool).await?;

    log::info!(
        "revert complete: {reactivated} manual rows active again, \
         {deactivated} researched/curated rows deactivated"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::place::RawPlace;
    use crate::services::places_client::{ApiFailure, FoundPlace, PlaceDetails, TextSearchPage};
    use chrono::Utc;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts outbound lookups so tests can assert none were spent.
    struct RecordingApi {
        lookups: AtomicUsize,
    }

    impl RecordingApi {
        fn new() -> Self {
            RecordingApi {
                lookups: AtomicUsize::new(0),
            }
        }

        fn lookup_count(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }
    }

    impl PlacesApi for RecordingApi {
        async fn text_search(
            &self,
            _query: &str,
            _page_token: Option<&str>,
        ) -> Result<Option<TextSearchPage>, ApiFailure> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }

        async fn details(&self, _place_id: &str) -> Result<Option<PlaceDetails>, ApiFailure> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }

        async fn find_place(&self, _query: &str) -> Result<Option<FoundPlace>, ApiFailure> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }

        fn photo_url(&self, _photo_reference: &str) -> Option<String> {
            None
        }
    }

    fn curated_lake() -> ManualPlace {
        ManualPlace {
            name: "Bnachii Lake".to_string(),
            search_name: Some("Bnachii lake Zgharta".to_string()),
            category: Category::Nature,
            village: "Bnachii".to_string(),
            lat: 34.27,
            lng: 35.91,
        }
    }

    fn scored(name: &str, category: Category, score: f64) -> ScoredPlace {
        ScoredPlace {
            place: RawPlace {
                google_place_id: format!("id-{name}"),
                name: name.to_string(),
                address: "Ehden, Lebanon".to_string(),
                village: "Ehden".to_string(),
                types: BTreeSet::new(),
                category,
                lat: 34.3,
                lng: 35.95,
                rating: 4.0,
                user_ratings_total: 50,
                price_level: Some(2),
                phone: None,
                website: None,
                editorial_summary: None,
                open_hours: None,
                reviews: vec![],
                photo_refs: vec![],
            },
            score,
        }
    }

    fn artifact(places: Vec<ScoredPlace>, percentile: u8) -> ScoredArtifact {
        ScoredArtifact {
            scored_at: Utc::now(),
            global_avg_rating: 4.0,
            bayesian_m: 10,
            percentile,
            top_count: 0,
            bottom_count: 0,
            places,
        }
    }

    #[test]
    fn percentile_precedence_is_flag_then_artifact_then_default() {
        let a = artifact(vec![], 40);
        assert_eq!(effective_percentile(Some(20), &a), 20);
        assert_eq!(effective_percentile(None, &a), 40);

        let unrecorded = artifact(vec![], 0);
        assert_eq!(effective_percentile(None, &unrecorded), DEFAULT_PERCENTILE);
    }

    #[test]
    fn selection_keeps_at_least_one_place() {
        let a = artifact(vec![scored("solo", Category::Cafe, 4.0)], 0);
        assert_eq!(select_top(&a, 1).len(), 1);

        let many = artifact(
            (0..10)
                .map(|i| scored(&format!("p{i}"), Category::Cafe, 4.0))
                .collect(),
            0,
        );
        assert_eq!(select_top(&many, 25).len(), 3);
        assert_eq!(select_top(&many, 100).len(), 10);
    }

    #[test]
    fn manual_entries_already_selected_are_not_merged_again() {
        let selected = vec![scored("Mar Sarkis Monastery", Category::Religious, 4.5)];
        let manual = vec![
            ManualPlace {
                name: "mar sarkis monastery".to_string(),
                search_name: None,
                category: Category::Religious,
                village: "Ehden".to_string(),
                lat: 34.3,
                lng: 35.95,
            },
            ManualPlace {
                name: "Bnachii Lake".to_string(),
                search_name: Some("Bnachii lake Zgharta".to_string()),
                category: Category::Nature,
                village: "Bnachii".to_string(),
                lat: 34.27,
                lng: 35.91,
            },
        ];

        let unmatched = unmatched_manual(&selected, &manual);
        assert_eq!(unmatched.len(), 1);
        assert_eq!(unmatched[0].name, "Bnachii Lake");
    }

    #[test]
    fn slug_ids_are_stable_and_url_safe() {
        assert_eq!(manual_slug_id("Bnachii Lake"), "manual-bnachii-lake");
        assert_eq!(manual_slug_id("Saydet El-Hosn!"), "manual-saydet-el-hosn");
    }

    #[test]
    fn rows_are_routed_by_category() {
        let candidates = vec![
            research_candidate(&scored("Church", Category::Religious, 4.6), None),
            research_candidate(&scored("Cafe", Category::Cafe, 4.4), None),
            research_candidate(&scored("Museum", Category::Heritage, 4.2), None),
        ];
        let rows = build_rows(&candidates);

        assert_eq!(rows.places.len(), 2);
        assert_eq!(rows.businesses.len(), 1);
        assert!(rows.places.iter().all(|r| r.active));
        assert!(rows.businesses.iter().all(|r| r.active));
    }

    #[test]
    fn first_research_candidate_per_place_category_is_featured() {
        let mut manual = manual_fallback(&ManualPlace {
            name: "Hand Picked Chapel".to_string(),
            search_name: None,
            category: Category::Religious,
            village: "Ehden".to_string(),
            lat: 34.3,
            lng: 35.95,
        });
        manual.source = Source::ManualCurated;

        let candidates = vec![
            manual,
            research_candidate(&scored("Best Church", Category::Religious, 4.8), None),
            research_candidate(&scored("Second Church", Category::Religious, 4.5), None),
            research_candidate(&scored("Best Trail", Category::Nature, 4.7), None),
        ];
        let rows = build_rows(&candidates);

        let featured: Vec<&str> = rows
            .places
            .iter()
            .filter(|r| r.featured)
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(featured, vec!["Best Church", "Best Trail"]);
    }

    #[test]
    fn price_levels_render_as_dollar_signs() {
        assert_eq!(price_range(Some(3)), Some("$$$".to_string()));
        assert_eq!(price_range(Some(0)), Some("$".to_string()));
        assert_eq!(price_range(None), None);
    }

    #[tokio::test]
    async fn live_import_aborts_on_preconditions_before_any_lookup() {
        let api = RecordingApi::new();
        let a = artifact(vec![scored("Cafe", Category::Cafe, 4.2)], 30);
        let options = ImportOptions {
            percentile: None,
            dry_run: false,
            keep_existing: false,
        };

        // the curated entry would normally trigger a find_place lookup
        let err = run_import(a, vec![curated_lake()], &options, &api, None)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("database connection"));
        assert_eq!(api.lookup_count(), 0);
    }

    #[tokio::test]
    async fn dry_run_computes_rows_without_lookup_side_effects() {
        let api = RecordingApi::new();
        let a = artifact(vec![scored("Cafe", Category::Cafe, 4.2)], 30);
        let options = ImportOptions {
            percentile: None,
            dry_run: true,
            keep_existing: false,
        };

        run_import(a, vec![curated_lake()], &options, &api, None)
            .await
            .unwrap();

        assert_eq!(api.lookup_count(), 0);
    }

    #[test]
    fn building_rows_twice_from_the_same_input_is_identical() {
        let candidates = vec![
            research_candidate(&scored("Church", Category::Religious, 4.6), None),
            research_candidate(&scored("Cafe", Category::Cafe, 4.4), None),
        ];
        let first = build_rows(&candidates);
        let second = build_rows(&candidates);

        let key = |rows: &RowSet| {
            (
                rows.places
                    .iter()
                    .map(|r| (r.google_place_id.clone(), r.featured, r.active))
                    .collect::<Vec<_>>(),
                rows.businesses
                    .iter()
                    .map(|r| (r.google_place_id.clone(), r.active))
                    .collect::<Vec<_>>(),
            )
        };
        assert_eq!(key(&first), key(&second));
    }
}
