pub mod catalog;
pub mod cog;
pub mod error;
pub mod footprint;
pub mod links;
pub mod model;
pub mod raster;
pub mod routing;
pub mod stac;

#[cfg(test)]
pub(crate) mod test_support;

pub use catalog::{build_catalog, CatalogConfig};
pub use cog::{normalize, CogOptions, Conversion, NormalizedRaster};
pub use error::{report, Error, Result};
pub use footprint::extract_footprint;
pub use links::rewrite_root_links;
pub use model::{BoundingBox, Footprint, ItemKey};
pub use routing::{plan_conversions, ConversionJob};
