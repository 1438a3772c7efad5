use std::path::{Path, PathBuf};

use crate::model::ItemKey;

pub const CATALOG_FILE: &str = "catalog.json";
pub const COLLECTION_FILE: &str = "collection.json";
pub const ITEM_FILE: &str = "item.json";

/// How hrefs between documents are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStyle {
    /// Relative links; only the root catalog carries an absolute `self` link.
    RelativePublished,
    /// Absolute links everywhere, each document with its own `self` link.
    AbsolutePublished,
}

impl LinkStyle {
    pub(crate) fn href(&self, base_href: &str, from: &TreePath, to: &TreePath) -> String {
        match self {
            LinkStyle::RelativePublished => relative_href(from, to),
            LinkStyle::AbsolutePublished => to.absolute_href(base_href),
        }
    }

    pub(crate) fn self_href(&self, base_href: &str, at: &TreePath, is_root: bool) -> Option<String> {
        match self {
            LinkStyle::RelativePublished if !is_root => None,
            _ => Some(at.absolute_href(base_href)),
        }
    }
}

/// Location of a file inside the published tree, as `/`-free segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreePath(Vec<String>);

impl TreePath {
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// `{catalog_id}/catalog.json`
    pub fn catalog(catalog_id: &str) -> Self {
        Self(vec![catalog_id.to_string(), CATALOG_FILE.to_string()])
    }

    /// `{catalog_id}/collection.json`
    pub fn collection(catalog_id: &str) -> Self {
        Self(vec![catalog_id.to_string(), COLLECTION_FILE.to_string()])
    }

    /// `{catalog_id}/{year}/[{scenario}/]item.json`
    pub fn item(catalog_id: &str, key: &ItemKey) -> Self {
        Self::in_item_dir(catalog_id, key, ITEM_FILE)
    }

    /// `{catalog_id}/{year}/[{scenario}/]{file_name}`
    pub fn in_item_dir(catalog_id: &str, key: &ItemKey, file_name: &str) -> Self {
        let mut segments = vec![catalog_id.to_string()];
        segments.extend(key.segments());
        segments.push(file_name.to_string());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn to_path(&self, root: &Path) -> PathBuf {
        self.0.iter().fold(root.to_path_buf(), |path, s| path.join(s))
    }

    pub fn absolute_href(&self, base_href: &str) -> String {
        format!("{}/{}", base_href.trim_end_matches('/'), self.0.join("/"))
    }

    fn dir(&self) -> &[String] {
        &self.0[..self.0.len().saturating_sub(1)]
    }
}

/// Href of `to` as seen from the directory containing `from`.
pub fn relative_href(from: &TreePath, to: &TreePath) -> String {
    let from_dir = from.dir();
    let to_segments = to.segments();

    let common = from_dir
        .iter()
        .zip(to_segments)
        .take_while(|(a, b)| a == b)
        .count()
        .min(to_segments.len().saturating_sub(1));

    let ups = from_dir.len() - common;
    let rest = to_segments[common..].join("/");

    if ups == 0 {
        format!("./{rest}")
    } else {
        format!("{}{rest}", "../".repeat(ups))
    }
}
