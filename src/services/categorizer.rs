use std::collections::BTreeSet;

use crate::domain::catalog::CategoryRules;
use crate::domain::place::Category;

/// Maps a place's merged type tags to one internal category, walking the
/// priority order with two precision exceptions:
/// - a bakery with no generic restaurant tag is left for `shop` to claim;
/// - a tourist_attraction that also carries food/lodging tags is not
///   heritage (keeps hotel restaurants out of the heritage list).
pub fn categorize(tags: &BTreeSet<String>, rules: &CategoryRules) -> Option<Category> {
    let has = |tag: &str| tags.contains(tag);
    let matches_any = |markers: &[&str]| markers.iter().any(|m| tags.contains(*m));

    for (category, markers) in rules.priority() {
        if !matches_any(markers) {
            continue;
        }
        match category {
            Category::Restaurant
                if has("bakery")
                    && !has("restaurant")
                    && matches_any(rules.markers(Category::Shop)) =>
            {
                continue;
            }
            Category::Heritage
                if has("tourist_attraction") && matches_any(rules.food_or_lodging) =>
            {
                continue;
            }
            _ => return Some(*category),
        }
    }

    if has("bakery") {
        return Some(Category::Shop);
    }
    None
}
