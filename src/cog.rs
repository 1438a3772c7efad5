use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::BoundingBox;
use crate::raster::{self, RasterHeader};

/// CRS the `-te` extent is expressed in.
const EXTENT_CRS: &str = "EPSG:4326";

/// Settings for the `gdalwarp` run that produces each COG.
#[derive(Debug, Clone)]
pub struct CogOptions {
    pub target_crs: String,
    /// `[lonmin, latmin, lonmax, latmax]` in EPSG:4326
    pub target_bounds: BoundingBox,
    /// Pass `-tap` so output pixels align to the resolution grid.
    pub target_aligned_pixels: bool,
    /// Value of `GDAL_CACHEMAX` for the warp process, in megabytes.
    pub cache_max_mb: u32,
    pub gdalwarp: PathBuf,
}

impl Default for CogOptions {
    fn default() -> Self {
        Self {
            target_crs: "EPSG:3857".to_string(),
            target_bounds: BoundingBox::new(-179.9999, -65.0, 179.9999, 75.0),
            target_aligned_pixels: false,
            cache_max_mb: 10240,
            gdalwarp: PathBuf::from("gdalwarp"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRaster {
    pub path: PathBuf,
    pub target_crs: String,
    pub target_bounds: BoundingBox,
    pub resolution: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Conversion {
    Written(NormalizedRaster),
    /// The output already existed and `force` was not set.
    Skipped(PathBuf),
}

/// Square pixel size that spreads `bounds` over `width` source pixels.
pub fn pixel_resolution(bounds: &BoundingBox, width: usize) -> f64 {
    bounds.width() / width as f64
}

/// Converts `input` into a COG at `output`.
///
/// An existing output is left alone unless `force` is set, in which case it
/// is removed before warping.
pub fn normalize(
    input: &Path,
    output: &Path,
    options: &CogOptions,
    force: bool,
) -> Result<Conversion> {
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    if output.exists() {
        if !force {
            debug!("Skipping existing output: {:?}", output);
            return Ok(Conversion::Skipped(output.to_path_buf()));
        }
        fs::remove_file(output).map_err(|e| Error::io(output, e))?;
    }

    let header = RasterHeader::open(input)?;
    let source_crs = header.crs_definition();
    let target_srs = raster::spatial_ref(&options.target_crs)?;
    let projected = raster::transform_bounds(&header.bounds(), &header.spatial_ref()?, &target_srs)?;
    let resolution = pixel_resolution(&projected, header.width);

    let args = warp_args(input, output, &source_crs, options, resolution);
    run_gdalwarp(&options.gdalwarp, &args, options.cache_max_mb, output)?;

    Ok(Conversion::Written(NormalizedRaster {
        path: output.to_path_buf(),
        target_crs: options.target_crs.clone(),
        target_bounds: options.target_bounds,
        resolution,
    }))
}

pub fn warp_args(
    input: &Path,
    output: &Path,
    source_crs: &str,
    options: &CogOptions,
    resolution: f64,
) -> Vec<OsString> {
    let bounds = &options.target_bounds;
    let res = resolution.to_string();
    let extent = bounds.to_array().map(|v| v.to_string());

    let mut args: Vec<OsString> = vec![input.into(), output.into()];
    let mut push = |values: &[&str]| args.extend(values.iter().map(OsString::from));

    push(&["-s_srs", source_crs, "-t_srs", options.target_crs.as_str()]);
    push(&["-r", "nearest"]);
    push(&[
        "-te",
        extent[0].as_str(),
        extent[1].as_str(),
        extent[2].as_str(),
        extent[3].as_str(),
    ]);
    push(&["-te_srs", EXTENT_CRS]);
    push(&["-tr", res.as_str(), res.as_str()]);
    if options.target_aligned_pixels {
        push(&["-tap"]);
    }
    push(&["-of", "COG"]);
    for creation_option in [
        "COMPRESS=ZSTD",
        "PREDICTOR=2",
        "BLOCKSIZE=256",
        "BIGTIFF=YES",
        "OVERVIEW_RESAMPLING=NEAREST",
        "NUM_THREADS=ALL_CPUS",
        "OVERVIEWS=IGNORE_EXISTING",
    ] {
        push(&["-co", creation_option]);
    }

    args
}

fn run_gdalwarp(program: &Path, args: &[OsString], cache_max_mb: u32, output: &Path) -> Result<()> {
    let program_name = program.display().to_string();
    let command_line = args.iter().fold(program_name.clone(), |mut line, arg| {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
        line
    });
    info!("Running command: {}", command_line);

    let status = Command::new(program)
        .args(args)
        .env("GDAL_CACHEMAX", cache_max_mb.to_string())
        .status()
        .map_err(|source| Error::Spawn {
            program: program_name.clone(),
            source,
        })?;

    if !status.success() {
        return Err(Error::Warp {
            program: program_name,
            status,
            output: output.to_path_buf(),
        });
    }

    Ok(())
}
