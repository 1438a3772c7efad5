use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::ItemKey;

/// File name every normalized raster is written as.
pub const OUTPUT_FILE: &str = "gdp.tif";

/// One raw input and the COG it becomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub key: ItemKey,
}

/// Recognises `GDP{year}.tif` and `GDP{year}_{scenario}.tif`.
pub struct InputPattern {
    with_scenario: Regex,
    without_scenario: Regex,
}

impl InputPattern {
    pub fn new() -> Self {
        Self {
            with_scenario: Regex::new(r"^GDP(\d{4})_([a-zA-Z0-9]+)\.tif$").expect("valid regex"),
            without_scenario: Regex::new(r"^GDP(\d{4})\.tif$").expect("valid regex"),
        }
    }

    pub fn key(&self, file_name: &str) -> Option<ItemKey> {
        if let Some(caps) = self.with_scenario.captures(file_name) {
            return Some(ItemKey::new(
                caps[1].parse().ok()?,
                Some(caps[2].to_string()),
            ));
        }
        let caps = self.without_scenario.captures(file_name)?;
        Some(ItemKey::new(caps[1].parse().ok()?, None))
    }
}

impl Default for InputPattern {
    fn default() -> Self {
        Self::new()
    }
}

/// `{output_root}/{year}/[{scenario}/]gdp.tif`
pub fn output_path(output_root: &Path, key: &ItemKey) -> PathBuf {
    output_root.join(key.relative_dir()).join(OUTPUT_FILE)
}

/// Lists the `.tif` files directly inside each input folder, in sorted
/// order per folder, and maps the recognised ones to their output paths.
pub fn plan_conversions(input_folders: &[PathBuf], output_root: &Path) -> Result<Vec<ConversionJob>> {
    let pattern = InputPattern::new();
    let mut jobs = Vec::new();

    for folder in input_folders {
        info!("Scanning {:?}", folder);

        let mut files = Vec::new();
        for entry in fs::read_dir(folder).map_err(|e| Error::io(folder, e))? {
            let path = entry.map_err(|e| Error::io(folder, e))?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "tif") {
                files.push(path);
            }
        }
        files.sort();

        for input in files {
            let Some(key) = input
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| pattern.key(n))
            else {
                debug!("Ignoring unrecognised input: {:?}", input);
                continue;
            };
            jobs.push(ConversionJob {
                output: output_path(output_root, &key),
                input,
                key,
            });
        }
    }

    Ok(jobs)
}
