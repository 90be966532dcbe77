use super::place::{BoundingBox, Category};

// Ehden / Zgharta district, with margin for the surrounding villages.
const MIN_LAT: f64 = 34.20;
const MAX_LAT: f64 = 34.40;
const MIN_LNG: f64 = 35.85;
const MAX_LNG: f64 = 36.05;

const SEARCH_QUERIES: &[&str] = &[
    "restaurants in Ehden",
    "restaurants in Zgharta",
    "cafes in Ehden",
    "hotels in Ehden",
    "guesthouses near Ehden",
    "churches in Ehden",
    "monasteries in Zgharta district",
    "Horsh Ehden nature reserve",
    "hiking trails near Ehden",
    "shops in Ehden",
    "bakeries in Zgharta",
    "tourist attractions in Ehden",
    "museums near Zgharta",
];

// Tag types that disqualify a result outright, whatever else it is tagged as.
const EXCLUDED_TYPES: &[&str] = &[
    "local_government_office",
    "city_hall",
    "courthouse",
    "police",
    "post_office",
    "bank",
    "atm",
    "gas_station",
    "car_repair",
    "hospital",
    "doctor",
    "pharmacy",
    "school",
    "real_estate_agency",
    "lawyer",
    "electrician",
    "plumber",
];

const RELIGIOUS_TAGS: &[&str] = &[
    "church",
    "mosque",
    "place_of_worship",
    "synagogue",
    "monastery",
];
const NATURE_TAGS: &[&str] = &[
    "park",
    "natural_feature",
    "campground",
    "hiking_area",
    "national_park",
];
const HERITAGE_TAGS: &[&str] = &[
    "tourist_attraction",
    "museum",
    "art_gallery",
    "historical_landmark",
    "landmark",
];
const HOTEL_TAGS: &[&str] = &[
    "lodging",
    "hotel",
    "guest_house",
    "resort_hotel",
    "bed_and_breakfast",
];
const CAFE_TAGS: &[&str] = &["cafe", "coffee_shop", "tea_house"];
const RESTAURANT_TAGS: &[&str] = &[
    "restaurant",
    "food",
    "meal_takeaway",
    "meal_delivery",
    "bakery",
];
const SHOP_TAGS: &[&str] = &[
    "store",
    "bakery",
    "supermarket",
    "shopping_mall",
    "gift_shop",
    "clothing_store",
];

// Tags that mark a tourist_attraction-tagged result as really being a food
// or lodging venue, so heritage must not claim it.
const FOOD_OR_LODGING_TAGS: &[&str] = &["restaurant", "food", "cafe", "bar", "lodging", "hotel"];

const KNOWN_VILLAGES: &[&str] = &[
    "Ehden",
    "Zgharta",
    "Kfarsghab",
    "Bane",
    "Aintourine",
    "Hadath El Jebbeh",
    "Hasroun",
    "Bcharre",
    "Kozhaya",
    "Mejdlaya",
    "Ardeh",
    "Rachiine",
    "Miziara",
    "Sereel",
    "Bnachii",
    "Kfarhata",
    "Haref",
    "Aslout",
];

/// Tag tables the categorizer walks, in priority order.
pub struct CategoryRules {
    priority: Vec<(Category, &'static [&'static str])>,
    pub food_or_lodging: &'static [&'static str],
}

impl CategoryRules {
    pub fn new() -> Self {
        CategoryRules {
            priority: vec![
                (Category::Religious, RELIGIOUS_TAGS),
                (Category::Nature, NATURE_TAGS),
                (Category::Heritage, HERITAGE_TAGS),
                (Category::Hotel, HOTEL_TAGS),
                (Category::Cafe, CAFE_TAGS),
                (Category::Restaurant, RESTAURANT_TAGS),
                (Category::Shop, SHOP_TAGS),
            ],
            food_or_lodging: FOOD_OR_LODGING_TAGS,
        }
    }

    pub fn priority(&self) -> &[(Category, &'static [&'static str])] {
        &self.priority
    }

    pub fn markers(&self, category: Category) -> &'static [&'static str] {
        self.priority
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, tags)| *tags)
            .unwrap_or(&[])
    }
}

impl Default for CategoryRules {
    fn default() -> Self {
        CategoryRules::new()
    }
}

/// All fixed lookup tables for a run, built once at startup and passed by
/// reference into the pure functions that consume them.
pub struct Catalog {
    pub rules: CategoryRules,
    pub excluded_types: &'static [&'static str],
    pub villages: &'static [&'static str],
    pub queries: &'static [&'static str],
    pub bounds: BoundingBox,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog {
            rules: CategoryRules::new(),
            excluded_types: EXCLUDED_TYPES,
            villages: KNOWN_VILLAGES,
            queries: SEARCH_QUERIES,
            bounds: BoundingBox {
                min_lat: MIN_LAT,
                max_lat: MAX_LAT,
                min_lng: MIN_LNG,
                max_lng: MAX_LNG,
            },
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Catalog::new()
    }
}
