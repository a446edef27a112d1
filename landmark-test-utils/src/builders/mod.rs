//! Test data builders for creating test scenarios

mod images;
mod test_data;

pub use images::{TestImageBuilder, png_bytes};
pub use test_data::{LandmarkBuilder, LocationBuilder, nearby_place};
