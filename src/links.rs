use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::error::{report, Error, Result};
use crate::stac::{rel, CATALOG_FILE};

/// Points the first `root` link of every document under `catalog_dir` at
/// `new_root_href`, skipping the root catalog file itself.
///
/// Documents that fail to load or save are logged and left out of the
/// returned count.
pub fn rewrite_root_links(catalog_dir: &Path, new_root_href: &str) -> Result<usize> {
    let mut updated = 0;

    for entry in WalkDir::new(catalog_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(catalog_dir).to_path_buf();
            Error::io(path, e.into())
        })?;
        let path = entry.path();

        let is_json = path.extension().is_some_and(|ext| ext == "json");
        if !entry.file_type().is_file() || !is_json || entry.file_name() == CATALOG_FILE {
            continue;
        }

        match rewrite_document(path, new_root_href) {
            Ok(true) => updated += 1,
            Ok(false) => debug!("No root link in {:?}", path),
            Err(e) => error!("Failed to rewrite root link in {:?}: {}", path, report(&e)),
        }
    }

    info!("Rewrote root link in {} documents", updated);
    Ok(updated)
}

fn rewrite_document(path: &Path, new_root_href: &str) -> Result<bool> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let mut document: Value = serde_json::from_str(&text).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })?;

    // Only the first root link is touched; every other field is kept as read.
    let root = document
        .get_mut("links")
        .and_then(Value::as_array_mut)
        .and_then(|links| {
            links
                .iter_mut()
                .find(|l| l.get("rel").and_then(Value::as_str) == Some(rel::ROOT))
        });
    let Some(link) = root.and_then(Value::as_object_mut) else {
        return Ok(false);
    };
    link.insert("href".to_string(), Value::String(new_root_href.to_string()));

    let mut text = serde_json::to_string_pretty(&document).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })?;
    text.push('\n');
    fs::write(path, text).map_err(|e| Error::io(path, e))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stac;
    use tempfile::TempDir;

    const NEW_ROOT: &str = "https://stac.example.org/catalog.json";

    fn write(dir: &Path, rel_path: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(rel_path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, body).unwrap();
        path
    }

    fn catalog_json(links: &str) -> String {
        format!(
            r#"{{"type": "Catalog", "stac_version": "1.0.0", "id": "c", "description": "d", "links": [{links}]}}"#
        )
    }

    #[test]
    fn test_only_first_root_link_is_rewritten() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(
            temp_dir.path(),
            "sub/catalog-copy.json",
            &catalog_json(
                r#"{"rel": "root", "href": "a.json"}, {"rel": "root", "href": "b.json"}"#,
            ),
        );

        let count = rewrite_root_links(temp_dir.path(), NEW_ROOT).unwrap();

        assert_eq!(count, 1);
        let doc = stac::read_document(&path).unwrap();
        assert_eq!(doc.links()[0].href, NEW_ROOT);
        assert_eq!(doc.links()[1].href, "b.json");
    }

    #[test]
    fn test_documents_without_root_link_are_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let body = catalog_json(r#"{"rel": "child", "href": "x.json"}"#);
        let path = write(temp_dir.path(), "other.json", &body);

        let count = rewrite_root_links(temp_dir.path(), NEW_ROOT).unwrap();

        assert_eq!(count, 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), body);
    }

    #[test]
    fn test_root_catalog_is_never_rewritten() {
        let temp_dir = TempDir::new().unwrap();
        let body = catalog_json(r#"{"rel": "root", "href": "./catalog.json"}"#);
        let path = write(temp_dir.path(), "catalog.json", &body);

        let count = rewrite_root_links(temp_dir.path(), NEW_ROOT).unwrap();

        assert_eq!(count, 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), body);
    }

    #[test]
    fn test_malformed_documents_do_not_abort_the_batch() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "a/broken.json", "{ not json");
        write(temp_dir.path(), "a/notes.txt", "ignored");
        let good = write(
            temp_dir.path(),
            "b/good.json",
            &catalog_json(r#"{"rel": "root", "href": "../catalog.json"}"#),
        );

        let count = rewrite_root_links(temp_dir.path(), NEW_ROOT).unwrap();

        assert_eq!(count, 1);
        assert_eq!(stac::read_document(&good).unwrap().links()[0].href, NEW_ROOT);
    }

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_unmodelled_fields_survive_rewrite() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(
            temp_dir.path(),
            "collection.json",
            r#"{
                "type": "Collection",
                "stac_version": "1.0.0",
                "stac_extensions": ["https://stac-extensions.github.io/scientific/v1.0.0/schema.json"],
                "id": "gdp",
                "description": "d",
                "license": "CC-BY-4.0",
                "keywords": ["gdp", "ssp"],
                "summaries": {"ssp_type": ["SSP1", "SSP2"]},
                "extent": {"spatial": {"bbox": [[-180, -90, 180, 90]]}, "temporal": {"interval": [[null, null]]}},
                "links": [{"rel": "root", "href": "./catalog.json", "type": "application/json"}]
            }"#,
        );

        let count = rewrite_root_links(temp_dir.path(), NEW_ROOT).unwrap();

        assert_eq!(count, 1);
        let doc = read_json(&path);
        assert_eq!(doc["links"][0]["href"], NEW_ROOT);
        assert_eq!(doc["links"][0]["type"], "application/json");
        assert_eq!(doc["keywords"], serde_json::json!(["gdp", "ssp"]));
        assert_eq!(doc["summaries"]["ssp_type"][1], "SSP2");
        assert_eq!(doc["stac_extensions"].as_array().unwrap().len(), 1);
        assert!(doc.get("providers").is_none());
        assert_eq!(doc.as_object().unwrap().keys().next().unwrap(), "type");
    }

    #[test]
    fn test_items_with_other_geometries_are_rewritten() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(
            temp_dir.path(),
            "2000/item.json",
            r#"{
                "type": "Feature",
                "stac_version": "1.0.0",
                "id": "islands",
                "geometry": {"type": "MultiPolygon", "coordinates": [[[[0, 0], [0, 1], [1, 1], [0, 0]]], [[[2, 2], [2, 3], [3, 3], [2, 2]]]]},
                "bbox": [0, 0, 0, 3, 3, 0],
                "properties": {"datetime": "2000-01-01T00:00:00Z"},
                "links": [{"rel": "root", "href": "../catalog.json"}],
                "assets": {}
            }"#,
        );

        let count = rewrite_root_links(temp_dir.path(), NEW_ROOT).unwrap();

        assert_eq!(count, 1);
        let doc = read_json(&path);
        assert_eq!(doc["links"][0]["href"], NEW_ROOT);
        assert_eq!(doc["geometry"]["type"], "MultiPolygon");
        assert_eq!(doc["bbox"].as_array().unwrap().len(), 6);
    }
}
