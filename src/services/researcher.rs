use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;

use crate::domain::catalog::Catalog;
use crate::domain::place::{RawPlace, ResearchArtifact, Review};

use super::categorizer::categorize;
use super::places_client::{ApiFailure, PlaceDetails, PlacesApi, SearchResult};
use super::village::extract_village;

// The service refuses the next page token for ~2s after issuing it.
const PAGINATION_DELAY: Duration = Duration::from_secs(2);
const ACCEPT_DELAY: Duration = Duration::from_millis(100);

// Legacy Places SKU prices, for the run's cost estimate.
const TEXT_SEARCH_COST_USD: f64 = 0.032;
const DETAILS_COST_USD: f64 = 0.017;

const MAX_REVIEWS: usize = 5;
const MAX_PHOTOS: usize = 3;

/// Worst-case cost of a research run, for `--dry-run` planning: every query
/// paginated to the service's three-page maximum, every result detailed.
pub fn estimate_worst_case_cost(query_count: usize, results_per_query: usize) -> f64 {
    let searches = (query_count * 3) as f64;
    let details = (query_count * results_per_query) as f64;
    searches * TEXT_SEARCH_COST_USD + details * DETAILS_COST_USD
}

/// Runs the fixed query set, dedupes by place id (first write wins), filters,
/// enriches survivors with a details fetch, and categorizes. Per-query and
/// per-candidate failures are logged and skipped; the run itself only fails
/// on I/O around the artifact.
pub async fn run_research<A: PlacesApi>(api: &A, catalog: &Catalog) -> Result<ResearchArtifact> {
    let researched_at = Utc::now();
    let mut seen: HashSet<String> = HashSet::new();
    let mut places: Vec<RawPlace> = Vec::new();
    let mut search_calls: u32 = 0;
    let mut details_calls: u32 = 0;
    let mut skipped: u32 = 0;

    for query in catalog.queries {
        let results = match fetch_all_pages(api, query, &mut search_calls).await {
            Ok(results) => results,
            Err(e) => {
                // not counted in `skipped`: that counter is per evaluated
                // candidate, and this query's results were never seen
                log::error!("text search failed for '{query}': {e}");
                continue;
            }
        };
        log::info!("'{query}' returned {} results", results.len());

        for result in results {
            // First occurrence across the whole run wins, even if it ends
            // up skipped; a later duplicate carries the same data.
            if !seen.insert(result.place_id.clone()) {
                continue;
            }

            let (lat, lng, rating, votes) = match screen(&result, catalog) {
                Ok(coords) => coords,
                Err(reason) => {
                    skipped += 1;
                    log::info!("skipping '{}': {reason}", result.name);
                    continue;
                }
            };

            details_calls += 1;
            let details = match api.details(&result.place_id).await {
                Ok(Some(details)) => details,
                Ok(None) => {
                    skipped += 1;
                    log::warn!("skipping '{}': empty details response", result.name);
                    continue;
                }
                Err(e) => {
                    skipped += 1;
                    log::warn!("skipping '{}': details fetch failed: {e}", result.name);
                    continue;
                }
            };

            match assemble(&result, details, lat, lng, rating, votes, catalog) {
                Some(place) => {
                    log::info!("accepted '{}' as {}", place.name, place.category.as_str());
                    places.push(place);
                    tokio::time::sleep(ACCEPT_DELAY).await;
                }
                None => {
                    skipped += 1;
                    log::info!("skipping '{}': no category match", result.name);
                }
            }
        }
    }

    let estimated_cost_usd =
        f64::from(search_calls) * TEXT_SEARCH_COST_USD + f64::from(details_calls) * DETAILS_COST_USD;
    log::info!(
        "research done: {} places, {} skipped, {} searches + {} details (~${:.2})",
        places.len(),
        skipped,
        search_calls,
        details_calls,
        estimated_cost_usd
    );

    Ok(ResearchArtifact {
        researched_at,
        queries: catalog.queries.iter().map(|q| q.to_string()).collect(),
        bounds: catalog.bounds,
        search_calls,
        details_calls,
        estimated_cost_usd,
        skipped,
        places,
    })
}

async fn fetch_all_pages<A: PlacesApi>(
    api: &A,
    query: &str,
    search_calls: &mut u32,
) -> Result<Vec<SearchResult>, ApiFailure> {
    let mut results = Vec::new();
    let mut token: Option<String> = None;

    loop {
        *search_calls += 1;
        let Some(page) = api.text_search(query, token.as_deref()).await? else {
            break;
        };
        results.extend(page.results);
        match page.next_page_token {
            Some(next) => {
                tokio::time::sleep(PAGINATION_DELAY).await;
                token = Some(next);
            }
            None => break,
        }
    }

    Ok(results)
}

fn screen(result: &SearchResult, catalog: &Catalog) -> Result<(f64, f64, f64, u32), &'static str> {
    let Some(geometry) = &result.geometry else {
        return Err("missing coordinates");
    };
    let (lat, lng) = (geometry.location.lat, geometry.location.lng);
    if !catalog.bounds.contains(lat, lng) {
        return Err("outside the bounding box");
    }

    if result
        .types
        .iter()
        .any(|t| catalog.excluded_types.contains(&t.as_str()))
    {
        return Err("excluded type");
    }

    match (result.rating, result.user_ratings_total) {
        (Some(rating), Some(votes)) if rating > 0.0 && votes > 0 => Ok((lat, lng, rating, votes)),
        _ => Err("no rating or no reviews"),
    }
}

fn assemble(
    result: &SearchResult,
    details: PlaceDetails,
    lat: f64,
    lng: f64,
    rating: f64,
    votes: u32,
    catalog: &Catalog,
) -> Option<RawPlace> {
    let mut types: BTreeSet<String> = result.types.iter().cloned().collect();
    types.extend(details.types.iter().cloned());

    let category = categorize(&types, &catalog.rules)?;
    let address = result.formatted_address.clone().unwrap_or_default();
    let village = extract_village(&address, catalog.villages);

    Some(RawPlace {
        google_place_id: result.place_id.clone(),
        name: result.name.clone(),
        address,
        village,
        types,
        category,
        lat,
        lng,
        rating,
        user_ratings_total: votes,
        price_level: result.price_level,
        phone: details.formatted_phone_number,
        website: details.website,
        editorial_summary: details.editorial_summary.and_then(|s| s.overview),
        open_hours: details.opening_hours.map(|h| h.weekday_text),
        reviews: details
            .reviews
            .into_iter()
            .take(MAX_REVIEWS)
            .map(|r| Review {
                author: r.author_name,
                rating: r.rating,
                text: r.text,
                relative_time: r.relative_time_description,
            })
            .collect(),
        photo_refs: details
            .photos
            .into_iter()
            .take(MAX_PHOTOS)
            .map(|p| p.photo_reference)
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::place::Category;
    use crate::services::places_client::{FoundPlace, Geometry, LatLng, TextSearchPage};

    struct StubApi {
        results: Vec<SearchResult>,
        fail_details_for: Vec<String>,
        fail_queries: Vec<String>,
    }

    impl StubApi {
        fn returning(results: Vec<SearchResult>) -> Self {
            StubApi {
                results,
                fail_details_for: vec![],
                fail_queries: vec![],
            }
        }
    }

    impl PlacesApi for StubApi {
        async fn text_search(
            &self,
            query: &str,
            _page_token: Option<&str>,
        ) -> Result<Option<TextSearchPage>, ApiFailure> {
            if self.fail_queries.iter().any(|q| q == query) {
                return Err(ApiFailure::Http(500));
            }
            Ok(Some(TextSearchPage {
                results: self.results.clone(),
                next_page_token: None,
            }))
        }

        async fn details(&self, place_id: &str) -> Result<Option<PlaceDetails>, ApiFailure> {
            if self.fail_details_for.iter().any(|id| id == place_id) {
                return Err(ApiFailure::Service {
                    status: "NOT_FOUND".to_string(),
                    message: None,
                });
            }
            Ok(Some(PlaceDetails::default()))
        }

        async fn find_place(&self, _query: &str) -> Result<Option<FoundPlace>, ApiFailure> {
            Ok(None)
        }

        fn photo_url(&self, _photo_reference: &str) -> Option<String> {
            None
        }
    }

    fn result(id: &str, name: &str, lat: f64, lng: f64) -> SearchResult {
        SearchResult {
            place_id: id.to_string(),
            name: name.to_string(),
            formatted_address: Some("Main St, Ehden, Lebanon".to_string()),
            geometry: Some(Geometry {
                location: LatLng { lat, lng },
            }),
            types: vec!["restaurant".to_string()],
            rating: Some(4.2),
            user_ratings_total: Some(120),
            price_level: Some(2),
        }
    }

    fn one_query_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.queries = &["restaurants in Ehden"];
        catalog
    }

    #[tokio::test]
    async fn a_failed_details_fetch_skips_only_that_candidate() {
        let mut api = StubApi::returning(
            (1..=5)
                .map(|i| result(&format!("p{i}"), &format!("Place {i}"), 34.30, 35.95))
                .collect(),
        );
        api.fail_details_for = vec!["p3".to_string()];

        let artifact = run_research(&api, &one_query_catalog()).await.unwrap();

        assert_eq!(artifact.places.len(), 4);
        assert_eq!(artifact.skipped, 1);
        assert!(artifact.places.iter().all(|p| p.google_place_id != "p3"));
    }

    #[tokio::test]
    async fn duplicate_place_ids_keep_the_first_occurrence() {
        let mut first = result("dup", "First Name", 34.30, 35.95);
        first.rating = Some(4.8);
        let second = result("dup", "Second Name", 34.31, 35.96);

        let api = StubApi::returning(vec![first, second]);

        let artifact = run_research(&api, &one_query_catalog()).await.unwrap();

        assert_eq!(artifact.places.len(), 1);
        assert_eq!(artifact.places[0].name, "First Name");
        assert_eq!(artifact.places[0].rating, 4.8);
    }

    #[tokio::test]
    async fn out_of_bounds_and_unrated_results_are_filtered() {
        let mut unrated = result("p2", "No Ratings", 34.30, 35.95);
        unrated.user_ratings_total = Some(0);
        let mut excluded = result("p3", "Town Hall", 34.30, 35.95);
        excluded.types = vec!["city_hall".to_string()];

        let api = StubApi::returning(vec![
            result("p1", "Far Away", 33.0, 35.5),
            unrated,
            excluded,
            result("p4", "Kept", 34.30, 35.95),
        ]);

        let artifact = run_research(&api, &one_query_catalog()).await.unwrap();

        assert_eq!(artifact.places.len(), 1);
        assert_eq!(artifact.places[0].google_place_id, "p4");
        assert_eq!(artifact.skipped, 3);
    }

    #[tokio::test]
    async fn a_failed_query_is_dropped_without_touching_the_skip_count() {
        let mut catalog = Catalog::new();
        catalog.queries = &["cafes in Ehden", "broken query"];

        let mut api = StubApi::returning(vec![result("p1", "Kept", 34.30, 35.95)]);
        api.fail_queries = vec!["broken query".to_string()];

        let artifact = run_research(&api, &catalog).await.unwrap();

        // skipped counts evaluated candidates only, never a lost query
        assert_eq!(artifact.places.len(), 1);
        assert_eq!(artifact.skipped, 0);
        assert_eq!(artifact.queries.len(), 2);
    }

    #[test]
    fn village_and_category_come_from_merged_data() {
        let catalog = Catalog::new();
        let mut search = result("p1", "Bakery", 34.30, 35.95);
        search.types = vec!["bakery".to_string()];
        let details = PlaceDetails {
            types: vec!["store".to_string()],
            ..PlaceDetails::default()
        };

        let place = assemble(&search, details, 34.30, 35.95, 4.2, 120, &catalog).unwrap();
        assert_eq!(place.category, Category::Shop);
        assert_eq!(place.village, "Ehden");
        assert!(place.types.contains("store"));
        assert!(place.types.contains("bakery"));
    }
}
