pub mod categorizer;
pub mod importer;
pub mod places_client;
pub mod report;
pub mod researcher;
pub mod scorer;
pub mod village;

pub use categorizer::*;
pub use importer::*;
pub use places_client::*;
pub use report::*;
pub use researcher::*;
pub use scorer::*;
pub use village::*;
