pub mod business_db;
pub mod place_db;
