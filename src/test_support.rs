use std::path::Path;

use gdal::spatial_ref::SpatialRef;
use gdal::DriverManager;

use crate::model::BoundingBox;

pub(crate) fn gtiff_available() -> bool {
    DriverManager::get_driver_by_name("GTiff").is_ok()
}

/// Writes a single-band float32 GeoTIFF covering `bounds` in `epsg`.
pub(crate) fn write_raster(
    path: &Path,
    epsg: u32,
    bounds: BoundingBox,
    width: usize,
    height: usize,
) -> gdal::errors::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create raster parent directory");
    }
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut dataset = driver.create_with_band_type::<f32, _>(path, width, height, 1)?;

    dataset.set_geo_transform(&[
        bounds.min_x,
        bounds.width() / width as f64,
        0.0,
        bounds.max_y,
        0.0,
        -bounds.height() / height as f64,
    ])?;
    let wkt = SpatialRef::from_epsg(epsg)?.to_wkt()?;
    dataset.set_projection(&wkt)?;

    Ok(())
}
