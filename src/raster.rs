use std::path::{Path, PathBuf};

use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use gdal::Dataset;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::BoundingBox;

pub const WGS84_EPSG: u32 = 4326;

/// Number of points inserted along each edge when reprojecting bounds.
const DENSIFY_POINTS: i32 = 21;

/// Header-level view of a raster; no pixel data is read.
#[derive(Debug, Clone)]
pub struct RasterHeader {
    pub path: PathBuf,
    pub width: usize,
    pub height: usize,
    pub geo_transform: [f64; 6],
    /// WKT of the raster's coordinate system
    pub wkt: String,
    pub epsg: Option<u32>,
}

impl RasterHeader {
    pub fn open(path: &Path) -> Result<Self> {
        let dataset = Dataset::open(path)?;
        let (width, height) = dataset.raster_size();
        let geo_transform = dataset.geo_transform()?;

        let srs = dataset.spatial_ref().map_err(|e| Error::InvalidRaster {
            path: path.to_path_buf(),
            reason: format!("no coordinate system: {e}"),
        })?;
        let wkt = srs.to_wkt()?;
        let epsg = epsg_code(&srs);

        debug!(
            "Opened {:?}: {}x{} pixels, EPSG {:?}",
            path, width, height, epsg
        );

        Ok(Self {
            path: path.to_path_buf(),
            width,
            height,
            geo_transform,
            wkt,
            epsg,
        })
    }

    /// Bounding rectangle in the raster's own coordinate system.
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::from_geo_transform(&self.geo_transform, self.width, self.height)
    }

    pub fn is_wgs84(&self) -> bool {
        self.epsg == Some(WGS84_EPSG)
    }

    /// `EPSG:xxxx` when the authority code is known, otherwise the WKT.
    pub fn crs_definition(&self) -> String {
        match self.epsg {
            Some(code) => format!("EPSG:{code}"),
            None => self.wkt.clone(),
        }
    }

    pub fn spatial_ref(&self) -> Result<SpatialRef> {
        let mut srs = SpatialRef::from_wkt(&self.wkt)?;
        srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
        Ok(srs)
    }
}

fn epsg_code(srs: &SpatialRef) -> Option<u32> {
    match (srs.auth_name(), srs.auth_code()) {
        (Some(name), Ok(code)) if name.eq_ignore_ascii_case("EPSG") => u32::try_from(code).ok(),
        _ => None,
    }
}

/// Parses `EPSG:xxxx`, WKT or PROJ strings, with lon/lat axis order.
pub fn spatial_ref(definition: &str) -> Result<SpatialRef> {
    let mut srs = SpatialRef::from_definition(definition)?;
    srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    Ok(srs)
}

pub fn wgs84() -> Result<SpatialRef> {
    let mut srs = SpatialRef::from_epsg(WGS84_EPSG)?;
    srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    Ok(srs)
}

/// Reprojects a bounding rectangle, densifying its edges so curved
/// boundaries are covered.
pub fn transform_bounds(
    bounds: &BoundingBox,
    from: &SpatialRef,
    to: &SpatialRef,
) -> Result<BoundingBox> {
    let transform = CoordTransform::new(from, to)?;
    let out = transform.transform_bounds(&bounds.to_array(), DENSIFY_POINTS)?;
    Ok(BoundingBox::from(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{gtiff_available, write_raster};
    use tempfile::TempDir;

    #[test]
    fn test_header_of_geographic_raster() {
        if !gtiff_available() {
            eprintln!("Skipping test: GTiff driver not available");
            return;
        }
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("wgs84.tif");
        write_raster(&path, 4326, BoundingBox::new(-10.0, -5.0, 10.0, 5.0), 20, 10).unwrap();

        let header = RasterHeader::open(&path).unwrap();

        assert_eq!((header.width, header.height), (20, 10));
        assert!(header.is_wgs84());
        assert_eq!(header.crs_definition(), "EPSG:4326");
        assert_eq!(header.bounds(), BoundingBox::new(-10.0, -5.0, 10.0, 5.0));
    }

    #[test]
    fn test_missing_raster_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = RasterHeader::open(&temp_dir.path().join("absent.tif"));
        assert!(result.is_err());
    }

    #[test]
    fn test_transform_bounds_to_web_mercator() {
        let from = wgs84().unwrap();
        let to = spatial_ref("EPSG:3857").unwrap();

        let out = transform_bounds(&BoundingBox::new(-180.0, -60.0, 180.0, 60.0), &from, &to)
            .unwrap();

        // Half the equatorial circumference of the WGS84 ellipsoid.
        assert!((out.max_x - 20_037_508.34).abs() < 1.0);
        assert!((out.min_x + 20_037_508.34).abs() < 1.0);
        assert!(out.max_y > 8_000_000.0);
    }
}
