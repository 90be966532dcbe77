use std::cmp::Ordering;
use std::collections::BTreeMap;

use anyhow::{bail, Result};
use chrono::Utc;
use itertools::Itertools;

use crate::domain::place::{Category, ResearchArtifact, ScoredArtifact, ScoredPlace};

/// Minimum-reviews constant of the Bayesian average. Ten reviews is the
/// point where a place's own rating and the global mean weigh equally.
pub const BAYESIAN_M: u32 = 10;

// Expected top-tier size for the guide; outside this the operator should
// pick a different percentile.
const TOP_BAND_MIN: usize = 80;
const TOP_BAND_MAX: usize = 150;

const BOTTOM_FRACTION: f64 = 0.75;

/// `(v/(v+M))·R + (M/(v+M))·C`: few reviews pull the score toward the
/// global mean `C`, many reviews let the place's own rating `R` dominate.
pub fn bayesian_score(rating: f64, votes: u32, prior: f64, m: u32) -> f64 {
    let v = f64::from(votes);
    let m = f64::from(m);
    (v / (v + m)) * rating + (m / (v + m)) * prior
}

pub fn top_count(total: usize, percentile: u8) -> usize {
    (((total as f64) * f64::from(percentile) / 100.0).ceil() as usize).max(1)
}

pub fn bottom_start(total: usize) -> usize {
    ((total as f64) * BOTTOM_FRACTION).ceil() as usize
}

pub struct Tiers<'a> {
    pub top: &'a [ScoredPlace],
    pub middle: &'a [ScoredPlace],
    pub bottom: &'a [ScoredPlace],
}

/// Partitions a score-sorted slice. The bottom tier always starts at
/// `ceil(total · 0.75)`; a percentile above 75 shrinks the middle to zero
/// before it eats into the bottom tier's start.
pub fn tiers(places: &[ScoredPlace], percentile: u8) -> Tiers<'_> {
    let total = places.len();
    let top_end = top_count(total, percentile).min(total);
    let bottom_begin = bottom_start(total).max(top_end);

    Tiers {
        top: &places[..top_end],
        middle: &places[top_end..bottom_begin],
        bottom: &places[bottom_begin..],
    }
}

/// Top percentile within each category's own score-sorted subset.
pub fn top_by_category(
    places: &[ScoredPlace],
    percentile: u8,
) -> BTreeMap<Category, Vec<&ScoredPlace>> {
    let grouped: BTreeMap<Category, Vec<&ScoredPlace>> = places
        .iter()
        .map(|p| (p.place.category, p))
        .into_group_map()
        .into_iter()
        .collect();

    grouped
        .into_iter()
        .map(|(category, mut group)| {
            let keep = top_count(group.len(), percentile);
            group.truncate(keep);
            (category, group)
        })
        .collect()
}

/// Scores a raw-places artifact and sorts descending (stable, ties keep
/// research order). Fails only on an empty input set.
pub fn score_places(artifact: ResearchArtifact, percentile: u8) -> Result<ScoredArtifact> {
    if artifact.places.is_empty() {
        bail!("the raw-places artifact contains no places to score");
    }

    let total = artifact.places.len();
    let prior = artifact.places.iter().map(|p| p.rating).sum::<f64>() / total as f64;

    let mut places: Vec<ScoredPlace> = artifact
        .places
        .into_iter()
        .map(|place| {
            let score = bayesian_score(place.rating, place.user_ratings_total, prior, BAYESIAN_M);
            ScoredPlace { place, score }
        })
        .collect();
    places.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let top = top_count(total, percentile);
    let bottom = total - bottom_start(total).min(total);
    if !(TOP_BAND_MIN..=TOP_BAND_MAX).contains(&top) {
        log::warn!(
            "top tier has {top} places, outside the expected {TOP_BAND_MIN}-{TOP_BAND_MAX} band; \
             consider a different --percentile"
        );
    }

    Ok(ScoredArtifact {
        scored_at: Utc::now(),
        global_avg_rating: prior,
        bayesian_m: BAYESIAN_M,
        percentile,
        top_count: top,
        bottom_count: bottom,
        places,
    })
}
