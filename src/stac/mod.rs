//! STAC documents for the catalog tree.
//!
//! The three document kinds share an id and a link list; [`Document`] is the
//! closed set of them as they appear on disk, tagged by their `type` field.

mod layout;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{BoundingBox, ExtentAccumulator, Footprint, ItemKey};

pub use layout::{relative_href, LinkStyle, TreePath, CATALOG_FILE, COLLECTION_FILE, ITEM_FILE};

pub const STAC_VERSION: &str = "1.0.0";
pub const RASTER_EXTENSION: &str = "https://stac-extensions.github.io/raster/v1.1.0/schema.json";

pub mod media_type {
    pub const COG: &str = "image/tiff; application=geotiff; profile=cloud-optimized";
    pub const JSON: &str = "application/json";
    pub const GEOJSON: &str = "application/geo+json";
}

pub mod rel {
    pub const SELF: &str = "self";
    pub const ROOT: &str = "root";
    pub const PARENT: &str = "parent";
    pub const CHILD: &str = "child";
    pub const ITEM: &str = "item";
    pub const COLLECTION: &str = "collection";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Link {
    pub fn new(rel: &str, href: impl Into<String>, media_type: &str) -> Self {
        Self {
            rel: rel.to_string(),
            href: href.into(),
            media_type: Some(media_type.to_string()),
            title: None,
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderRole {
    Licensor,
    Producer,
    Processor,
    Host,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub name: String,
    #[serde(default)]
    pub roles: Vec<ProviderRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialExtent {
    pub bbox: Vec<[f64; 4]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalExtent {
    pub interval: Vec<[Option<DateTime<Utc>>; 2]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub spatial: SpatialExtent,
    pub temporal: TemporalExtent,
}

impl Extent {
    pub fn new(bbox: BoundingBox, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            spatial: SpatialExtent {
                bbox: vec![bbox.to_array()],
            },
            temporal: TemporalExtent {
                interval: vec![[Some(start), Some(end)]],
            },
        }
    }
}

/// Entry of the raster extension's `raster:bands` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterBand {
    pub name: String,
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub href: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(rename = "raster:bands", default, skip_serializing_if = "Vec::is_empty")]
    pub bands: Vec<RasterBand>,
}

/// GeoJSON geometry of an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
}

impl From<&Footprint> for Geometry {
    fn from(footprint: &Footprint) -> Self {
        Geometry::Polygon {
            coordinates: vec![footprint.closed_ring()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemProperties {
    pub datetime: DateTime<Utc>,
    pub year: i32,
    pub ssp_type: Option<String>,
}

impl ItemProperties {
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.year, self.ssp_type.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub stac_version: String,
    #[serde(default)]
    pub stac_extensions: Vec<String>,
    pub id: String,
    pub geometry: Geometry,
    pub bbox: [f64; 4],
    pub properties: ItemProperties,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub assets: BTreeMap<String, Asset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

impl Item {
    pub fn new(key: &ItemKey, datetime: DateTime<Utc>, footprint: &Footprint) -> Self {
        Self {
            stac_version: STAC_VERSION.to_string(),
            stac_extensions: vec![RASTER_EXTENSION.to_string()],
            id: key.id(),
            geometry: Geometry::from(footprint),
            bbox: footprint.bbox.to_array(),
            properties: ItemProperties {
                datetime,
                year: key.year,
                ssp_type: key.scenario.clone(),
            },
            links: Vec::new(),
            assets: BTreeMap::new(),
            collection: None,
        }
    }

    pub fn add_asset(&mut self, key: &str, asset: Asset) {
        self.assets.insert(key.to_string(), asset);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub stac_version: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub description: String,
    pub license: String,
    #[serde(default)]
    pub providers: Vec<Provider>,
    pub extent: Extent,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(skip)]
    items: Vec<Item>,
}

impl Collection {
    /// Builds a collection whose extent covers `items`.
    ///
    /// Fails on an empty item list or on duplicate item ids.
    pub fn new(
        id: &str,
        title: Option<String>,
        description: &str,
        license: &str,
        providers: Vec<Provider>,
        items: Vec<Item>,
    ) -> Result<Self> {
        let extent = extent_of(id, &items)?;
        let mut collection = Self {
            stac_version: STAC_VERSION.to_string(),
            id: id.to_string(),
            title,
            description: description.to_string(),
            license: license.to_string(),
            providers,
            extent,
            links: Vec::new(),
            items: Vec::with_capacity(items.len()),
        };
        for item in items {
            collection.push_item(item)?;
        }
        Ok(collection)
    }

    pub fn add_item(&mut self, item: Item) -> Result<()> {
        self.push_item(item)?;
        self.extent = extent_of(&self.id, &self.items)?;
        Ok(())
    }

    fn push_item(&mut self, mut item: Item) -> Result<()> {
        if self.items.iter().any(|existing| existing.id == item.id) {
            return Err(Error::DuplicateItem(item.id));
        }
        item.collection = Some(self.id.clone());
        self.items.push(item);
        Ok(())
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }
}

fn extent_of(collection: &str, items: &[Item]) -> Result<Extent> {
    let (bbox, [start, end]) = items
        .iter()
        .fold(ExtentAccumulator::default(), |acc, item| {
            acc.add(&BoundingBox::from(item.bbox), item.properties.datetime)
        })
        .finish()
        .ok_or_else(|| Error::EmptyCollection {
            collection: collection.to_string(),
        })?;
    Ok(Extent::new(bbox, start, end))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub stac_version: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub description: String,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(skip)]
    children: Vec<Collection>,
}

impl Catalog {
    pub fn new(id: &str, title: Option<String>, description: &str, child: Collection) -> Self {
        Self {
            stac_version: STAC_VERSION.to_string(),
            id: id.to_string(),
            title,
            description: description.to_string(),
            links: Vec::new(),
            children: vec![child],
        }
    }

    pub fn children(&self) -> &[Collection] {
        &self.children
    }

    /// Writes the tree under `dest`, regenerating every link for `style`.
    ///
    /// `base_href` is where `dest` will be published; it prefixes absolute
    /// hrefs. Returns the written files in write order.
    pub fn save(&mut self, dest: &Path, base_href: &str, style: LinkStyle) -> Result<Vec<PathBuf>> {
        let catalog_path = TreePath::catalog(&self.id);
        let href = |from: &TreePath, to: &TreePath| style.href(base_href, from, to);
        let self_link = |at: &TreePath, media: &str| {
            style
                .self_href(base_href, at, at == &catalog_path)
                .map(|h| Link::new(rel::SELF, h, media))
        };

        let mut written = Vec::new();

        let mut child_links = Vec::new();
        for collection in &mut self.children {
            let collection_path = TreePath::collection(&self.id);
            child_links.push(
                Link::new(rel::CHILD, href(&catalog_path, &collection_path), media_type::JSON)
                    .with_title(collection.title.as_deref().unwrap_or(&collection.id)),
            );

            let mut item_links = Vec::new();
            for item in &mut collection.items {
                let item_path = TreePath::item(&self.id, &item.properties.key());
                item_links.push(Link::new(
                    rel::ITEM,
                    href(&collection_path, &item_path),
                    media_type::GEOJSON,
                ));

                item.links = self_link(&item_path, media_type::GEOJSON)
                    .into_iter()
                    .chain([
                        Link::new(rel::ROOT, href(&item_path, &catalog_path), media_type::JSON),
                        Link::new(rel::PARENT, href(&item_path, &collection_path), media_type::JSON),
                        Link::new(rel::COLLECTION, href(&item_path, &collection_path), media_type::JSON),
                    ])
                    .collect();
                written.push(write_document(
                    &item_path.to_path(dest),
                    &Document::Item(item.clone()),
                )?);
            }

            collection.links = self_link(&collection_path, media_type::JSON)
                .into_iter()
                .chain([
                    Link::new(rel::ROOT, href(&collection_path, &catalog_path), media_type::JSON),
                    Link::new(rel::PARENT, href(&collection_path, &catalog_path), media_type::JSON),
                ])
                .chain(item_links)
                .collect();
            written.push(write_document(
                &collection_path.to_path(dest),
                &Document::Collection(collection.clone()),
            )?);
        }

        self.links = self_link(&catalog_path, media_type::JSON)
            .into_iter()
            .chain([Link::new(rel::ROOT, href(&catalog_path, &catalog_path), media_type::JSON)])
            .chain(child_links)
            .collect();
        written.push(write_document(
            &catalog_path.to_path(dest),
            &Document::Catalog(self.clone()),
        )?);

        Ok(written)
    }
}

/// A STAC document as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Document {
    Catalog(Catalog),
    Collection(Collection),
    #[serde(rename = "Feature")]
    Item(Item),
}

impl Document {
    pub fn id(&self) -> &str {
        match self {
            Document::Catalog(c) => &c.id,
            Document::Collection(c) => &c.id,
            Document::Item(i) => &i.id,
        }
    }

    pub fn links(&self) -> &[Link] {
        match self {
            Document::Catalog(c) => &c.links,
            Document::Collection(c) => &c.links,
            Document::Item(i) => &i.links,
        }
    }
}

pub fn read_document(path: &Path) -> Result<Document> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    serde_json::from_str(&text).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes pretty-printed JSON with a trailing newline, creating parent
/// directories. Returns the path written.
pub fn write_document(path: &Path, document: &Document) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let mut text = serde_json::to_string_pretty(document).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })?;
    text.push('\n');
    fs::write(path, text).map_err(|e| Error::io(path, e))?;
    Ok(path.to_path_buf())
}
