use crate::domain::place::{Category, ScoredArtifact, ScoredPlace};

use super::scorer::{tiers, top_by_category};

fn heading(category: Category) -> &'static str {
    match category {
        Category::Religious => "Religious sites",
        Category::Nature => "Nature",
        Category::Heritage => "Heritage",
        Category::Hotel => "Hotels & guesthouses",
        Category::Cafe => "Cafes",
        Category::Restaurant => "Restaurants",
        Category::Shop => "Shops",
    }
}

fn map_link(place_id: &str) -> String {
    format!("[map](https://www.google.com/maps/place/?q=place_id:{place_id})")
}

fn ranked_row(rank: usize, p: &ScoredPlace) -> String {
    format!(
        "| {} | {} | {} | {:.1} | {} | {:.3} | {} | {} | {} |\n",
        rank,
        p.place.name,
        p.place.village,
        p.place.rating,
        p.place.user_ratings_total,
        p.score,
        p.place.phone.as_deref().unwrap_or("-"),
        p.place
            .website
            .as_deref()
            .map(|w| format!("[site]({w})"))
            .unwrap_or_else(|| "-".to_string()),
        map_link(&p.place.google_place_id),
    )
}

/// Renders the human-readable tier report for the scored artifact.
pub fn render_report(artifact: &ScoredArtifact) -> String {
    let percentile = artifact.percentile;
    let t = tiers(&artifact.places, percentile);
    let mut out = String::new();

    out.push_str("# Ehden guide - scored places\n\n");
    out.push_str(&format!(
        "Scored at {} | global average rating {:.3} | M = {} | percentile {}\n\n",
        artifact.scored_at.format("%Y-%m-%d %H:%M UTC"),
        artifact.global_avg_rating,
        artifact.bayesian_m,
        percentile,
    ));

    out.push_str("## Summary\n\n");
    out.push_str("| Tier | Count |\n|---|---|\n");
    out.push_str(&format!("| Top {percentile}% | {} |\n", t.top.len()));
    out.push_str(&format!("| Middle | {} |\n", t.middle.len()));
    out.push_str(&format!("| Bottom 25% | {} |\n\n", t.bottom.len()));

    out.push_str(&format!("## Top {percentile}% by category\n\n"));
    for (category, group) in top_by_category(&artifact.places, percentile) {
        out.push_str(&format!("### {}\n\n", heading(category)));
        out.push_str(
            "| # | Name | Village | Rating | Reviews | Score | Phone | Website | Map |\n\
             |---|---|---|---|---|---|---|---|---|\n",
        );
        for (i, place) in group.iter().enumerate() {
            out.push_str(&ranked_row(i + 1, place));
        }
        out.push('\n');
    }

    out.push_str("## Honorable mentions\n\n");
    out.push_str("| Name | Village | Category | Score |\n|---|---|---|---|\n");
    for p in t.middle {
        out.push_str(&format!(
            "| {} | {} | {} | {:.3} |\n",
            p.place.name,
            p.place.village,
            p.place.category.as_str(),
            p.score
        ));
    }
    out.push('\n');

    out.push_str("## Bottom 25%\n\n");
    out.push_str("| Name | Village | Rating | Reviews | Score |\n|---|---|---|---|---|\n");
    for p in t.bottom {
        out.push_str(&format!(
            "| {} | {} | {:.1} | {} | {:.3} |\n",
            p.place.name,
            p.place.village,
            p.place.rating,
            p.place.user_ratings_total,
            p.score
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::place::{BoundingBox, RawPlace, ResearchArtifact};
    use crate::services::scorer::score_places;
    use chrono::Utc;
    use itertools::Itertools;
    use std::collections::BTreeSet;

    #[test]
    fn report_lists_every_tier_and_category() {
        let places = (0..12)
            .map(|i| RawPlace {
                google_place_id: format!("p{i}"),
                name: format!("Place {i}"),
                address: "Ehden, Lebanon".to_string(),
                village: "Ehden".to_string(),
                types: BTreeSet::new(),
                category: if i % 2 == 0 {
                    Category::Restaurant
                } else {
                    Category::Heritage
                },
                lat: 34.3,
                lng: 35.95,
                rating: 3.0 + (i as f64) * 0.15,
                user_ratings_total: 30,
                price_level: None,
                phone: Some("+961 6 560 000".to_string()),
                website: None,
                editorial_summary: None,
                open_hours: None,
                reviews: vec![],
                photo_refs: vec![],
            })
            .collect_vec();

        let artifact = ResearchArtifact {
            researched_at: Utc::now(),
            queries: vec![],
            bounds: BoundingBox {
                min_lat: 34.2,
                max_lat: 34.4,
                min_lng: 35.85,
                max_lng: 36.05,
            },
            search_calls: 0,
            details_calls: 0,
            estimated_cost_usd: 0.0,
            skipped: 0,
            places,
        };
        let scored = score_places(artifact, 25).unwrap();
        let report = render_report(&scored);

        assert!(report.contains("## Summary"));
        assert!(report.contains("### Restaurants"));
        assert!(report.contains("### Heritage"));
        assert!(report.contains("## Honorable mentions"));
        assert!(report.contains("## Bottom 25%"));
        assert!(report.contains("place_id:p11")); // best-rated place is linked
    }
}
