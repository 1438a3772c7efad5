use std::path::{Path, PathBuf};

use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::error::{report, Error, Result};
use crate::footprint::extract_footprint;
use crate::model::{Footprint, ItemKey};
use crate::routing::OUTPUT_FILE;
use crate::stac::{
    media_type, Asset, Catalog, Collection, Item, LinkStyle, Provider, ProviderRole, RasterBand,
    TreePath,
};

const ASSET_KEY: &str = "gdp";

/// Fixed descriptive metadata for the catalog, its collection and assets.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub catalog_id: String,
    pub catalog_title: Option<String>,
    pub catalog_description: String,
    pub collection_id: String,
    pub collection_title: String,
    pub collection_description: String,
    pub license: String,
    pub providers: Vec<Provider>,
    pub asset_title: String,
    pub asset_description: String,
    pub band_unit: String,
    pub band_description: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            catalog_id: "gridded-gdp".to_string(),
            catalog_title: Some("Gridded GDP".to_string()),
            catalog_description:
                "a global gridded dataset consistent with the Shared Socioeconomic Pathways"
                    .to_string(),
            collection_id: "gridded-gdp-ssp".to_string(),
            collection_title: "Global gridded GDP under historical and SSP scenarios".to_string(),
            collection_description: "Annual gross domestic product on a global grid for the \
                historical period and for future years under the Shared Socioeconomic Pathways, \
                stored as Cloud-Optimized GeoTIFFs."
                .to_string(),
            license: "CC-BY-4.0".to_string(),
            providers: vec![
                Provider {
                    name: "Wang and Sun".to_string(),
                    roles: vec![ProviderRole::Producer, ProviderRole::Licensor],
                    url: Some("https://www.nature.com/articles/s41597-022-01300-x".to_string()),
                },
                Provider {
                    name: "United Nations Development Programme".to_string(),
                    roles: vec![ProviderRole::Host],
                    url: Some("https://www.undp.org".to_string()),
                },
            ],
            asset_title: "Gridded GDP".to_string(),
            asset_description: "Gross domestic product per grid cell".to_string(),
            band_unit: "USD (2005 PPP)".to_string(),
            band_description: "Gross domestic product".to_string(),
        }
    }
}

/// All rasters under `root_dir`, sorted by path.
pub fn discover_rasters(root_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut rasters = Vec::new();

    for entry in WalkDir::new(root_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root_dir).to_path_buf();
            Error::io(path, e.into())
        })?;
        let is_tiff = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("tif") || ext.eq_ignore_ascii_case("tiff"));
        if entry.file_type().is_file() && is_tiff {
            rasters.push(entry.into_path());
        }
    }

    Ok(rasters)
}

/// Keys and footprints for every raster under `root_dir` laid out as
/// `{year}/[{scenario}/]{file}`. Other depths are skipped.
pub fn scan_rasters(root_dir: &Path) -> Result<Vec<(ItemKey, Footprint)>> {
    let mut entries = Vec::new();

    for path in discover_rasters(root_dir)? {
        let relative = path.strip_prefix(root_dir).unwrap_or(path.as_path());
        let Some(key) = ItemKey::from_relative_path(relative) else {
            debug!("Skipping {:?}: not a {{year}}/[{{scenario}}/]file path", relative);
            continue;
        };

        let footprint = extract_footprint(&path)?;
        debug!("{}: bbox {:?}", key.id(), footprint.bbox.to_array());
        entries.push((key, footprint));
    }

    Ok(entries)
}

/// Builds the catalog tree from scanned rasters; asset hrefs are rooted at
/// `base_href`.
pub fn assemble_catalog(
    entries: Vec<(ItemKey, Footprint)>,
    base_href: &str,
    config: &CatalogConfig,
) -> Result<Catalog> {
    let mut items = Vec::with_capacity(entries.len());
    for (key, footprint) in &entries {
        let datetime = key.datetime().ok_or_else(|| Error::InvalidRaster {
            path: key.relative_dir(),
            reason: format!("year {} is out of range", key.year),
        })?;

        let mut item = Item::new(key, datetime, footprint);
        item.add_asset(ASSET_KEY, gdp_asset(key, base_href, config));
        items.push(item);
    }

    let collection = Collection::new(
        &config.collection_id,
        Some(config.collection_title.clone()),
        &config.collection_description,
        &config.license,
        config.providers.clone(),
        items,
    )?;

    Ok(Catalog::new(
        &config.catalog_id,
        config.catalog_title.clone(),
        &config.catalog_description,
        collection,
    ))
}

fn gdp_asset(key: &ItemKey, base_href: &str, config: &CatalogConfig) -> Asset {
    Asset {
        href: TreePath::in_item_dir(&config.catalog_id, key, OUTPUT_FILE).absolute_href(base_href),
        media_type: Some(media_type::COG.to_string()),
        title: Some(config.asset_title.clone()),
        description: Some(config.asset_description.clone()),
        roles: vec!["data".to_string()],
        bands: vec![RasterBand {
            name: ASSET_KEY.to_string(),
            data_type: "float32".to_string(),
            unit: Some(config.band_unit.clone()),
            description: Some(config.band_description.clone()),
        }],
    }
}

/// Scans `root_dir`, builds the catalog and publishes it under `dist_dir`.
///
/// The tree is written with relative links first, then rewritten with
/// absolute links rooted at `root_href` (or `dist_dir` when absent).
/// Errors while writing are logged and do not fail the build.
pub fn build_catalog(
    root_dir: &Path,
    root_href: Option<&str>,
    dist_dir: &Path,
    config: &CatalogConfig,
) -> Result<Catalog> {
    let dist_href = dist_dir.display().to_string();
    let base_href = root_href.unwrap_or(&dist_href);

    let entries = scan_rasters(root_dir)?;
    info!("Found {} rasters under {:?}", entries.len(), root_dir);

    let mut catalog = assemble_catalog(entries, base_href, config)?;

    match publish(&mut catalog, dist_dir, &dist_href, base_href) {
        Ok(count) => info!("Saved {} documents to {:?}", count, dist_dir),
        Err(e) => error!("Failed to save catalog to {:?}: {}", dist_dir, report(&e)),
    }

    Ok(catalog)
}

fn publish(catalog: &mut Catalog, dist_dir: &Path, dist_href: &str, root_href: &str) -> Result<usize> {
    catalog.save(dist_dir, dist_href, LinkStyle::RelativePublished)?;
    let written = catalog.save(dist_dir, root_href, LinkStyle::AbsolutePublished)?;
    Ok(written.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BoundingBox;
    use std::fs;
    use tempfile::TempDir;

    fn entry(year: i32, scenario: Option<&str>, bbox: [f64; 4]) -> (ItemKey, Footprint) {
        (
            ItemKey::new(year, scenario.map(str::to_string)),
            Footprint::from_bounds(BoundingBox::from(bbox)),
        )
    }

    fn sample() -> Vec<(ItemKey, Footprint)> {
        vec![
            entry(2000, None, [-180.0, -60.0, 0.0, 0.0]),
            entry(2000, Some("ssp2"), [0.0, 0.0, 180.0, 70.0]),
            entry(2010, None, [-10.0, -65.0, 10.0, 10.0]),
        ]
    }

    #[test]
    fn test_assembled_collection() {
        let catalog =
            assemble_catalog(sample(), "https://host/stac", &CatalogConfig::default()).unwrap();

        assert_eq!(catalog.children().len(), 1);
        let collection = &catalog.children()[0];
        let ids: Vec<_> = collection.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["2000", "2000-ssp2", "2010"]);

        assert_eq!(collection.extent.spatial.bbox, vec![[-180.0, -65.0, 180.0, 70.0]]);
        let [start, end] = collection.extent.temporal.interval[0];
        assert_eq!(start.unwrap().to_rfc3339(), "2000-01-01T00:00:00+00:00");
        assert_eq!(end.unwrap().to_rfc3339(), "2010-01-01T00:00:00+00:00");
        assert_eq!(collection.providers.len(), 2);

        let asset = &collection.items()[1].assets["gdp"];
        assert_eq!(asset.href, "https://host/stac/gridded-gdp/2000/ssp2/gdp.tif");
        assert_eq!(asset.roles, ["data"]);
        assert_eq!(asset.bands[0].data_type, "float32");
    }

    #[test]
    fn test_extent_does_not_depend_on_order() {
        let config = CatalogConfig::default();
        let forward = assemble_catalog(sample(), "/dist", &config).unwrap();
        let mut reversed = sample();
        reversed.reverse();
        let backward = assemble_catalog(reversed, "/dist", &config).unwrap();

        assert_eq!(
            forward.children()[0].extent,
            backward.children()[0].extent
        );
    }

    #[test]
    fn test_empty_input_is_fatal() {
        let result = assemble_catalog(Vec::new(), "/dist", &CatalogConfig::default());
        assert!(matches!(result, Err(Error::EmptyCollection { .. })));
    }

    #[test]
    fn test_discover_and_skip_depths() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for rel in ["2010/gdp.tif", "2000/ssp2/gdp.tif", "2000/gdp.TIF", "a/b/c/d.tif", "2000/notes.txt", "02000/gdp.tif"] {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, b"").unwrap();
        }

        let found = discover_rasters(root).unwrap();
        let relative: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            relative,
            vec![
                PathBuf::from("02000/gdp.tif"),
                PathBuf::from("2000/gdp.TIF"),
                PathBuf::from("2000/ssp2/gdp.tif"),
                PathBuf::from("2010/gdp.tif"),
                PathBuf::from("a/b/c/d.tif"),
            ]
        );

        let keys: Vec<_> = relative.iter().filter_map(|p| ItemKey::from_relative_path(p)).collect();
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn test_publish_reports_write_failure() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("dist");
        fs::write(&blocker, b"a file where a directory should be").unwrap();

        let mut catalog = assemble_catalog(sample(), "/dist", &CatalogConfig::default()).unwrap();
        let err = publish(&mut catalog, &blocker, "/dist", "/dist").unwrap_err();

        // The logged message carries the underlying OS error after the context.
        let message = report(&err);
        assert!(message.starts_with(&format!("{}: ", err)));
        assert!(message.len() > err.to_string().len() + 2);
    }
}
