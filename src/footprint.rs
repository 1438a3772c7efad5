use std::path::Path;

use crate::error::Result;
use crate::model::Footprint;
use crate::raster::{self, RasterHeader};

/// Geographic (EPSG:4326) bbox and outline of a raster, from its header only.
pub fn extract_footprint(path: &Path) -> Result<Footprint> {
    let header = RasterHeader::open(path)?;
    footprint_of(&header)
}

pub fn footprint_of(header: &RasterHeader) -> Result<Footprint> {
    let native = header.bounds();

    let bbox = if header.is_wgs84() {
        native
    } else {
        raster::transform_bounds(&native, &header.spatial_ref()?, &raster::wgs84()?)?
    };

    Ok(Footprint::from_bounds(bbox))
}
