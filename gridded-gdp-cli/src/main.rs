use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use gridded_gdp::{
    build_catalog, normalize, plan_conversions, rewrite_root_links, BoundingBox, CatalogConfig,
    CogOptions, Conversion, ConversionJob,
};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert raw GDP{year}[_{scenario}].tif rasters into COGs
    Cog(CogArgs),
    /// Build the STAC catalog for a directory of COGs
    Catalog(CatalogArgs),
    /// Point the root link of every catalog document at a new href
    RewriteLinks(RewriteArgs),
}

#[derive(Args, Debug)]
struct CogArgs {
    /// Folders holding the raw rasters
    #[arg(value_name = "INPUT", required = true)]
    inputs: Vec<PathBuf>,

    /// Output root; files land in {year}/[{scenario}/]gdp.tif
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// Overwrite outputs that already exist
    #[arg(long)]
    force: bool,

    /// Number of files converted at once
    #[arg(short, long, default_value_t = 1)]
    jobs: usize,

    /// Target coordinate system
    #[arg(long, default_value = "EPSG:3857")]
    target_crs: String,

    /// Target extent in EPSG:4326
    #[arg(
        long,
        num_args = 4,
        value_names = ["LONMIN", "LATMIN", "LONMAX", "LATMAX"],
        allow_negative_numbers = true
    )]
    bounds: Option<Vec<f64>>,

    /// Align output pixels to the resolution grid (-tap)
    #[arg(long)]
    target_aligned_pixels: bool,

    /// GDAL_CACHEMAX for gdalwarp, in megabytes
    #[arg(long, default_value_t = 10240)]
    cache_max_mb: u32,

    /// gdalwarp executable
    #[arg(long, default_value = "gdalwarp")]
    gdalwarp: PathBuf,
}

#[derive(Args, Debug)]
struct CatalogArgs {
    /// Directory of COGs laid out as {year}/[{scenario}/]gdp.tif
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Directory the catalog is written to
    #[arg(short, long, value_name = "DIR")]
    dist: PathBuf,

    /// Href the dist directory is published at
    #[arg(long)]
    root_href: Option<String>,

    /// After building, point every root link at this href
    #[arg(long)]
    root_link: Option<String>,
}

#[derive(Args, Debug)]
struct RewriteArgs {
    /// Catalog directory ({dist}/{catalog id})
    #[arg(value_name = "DIR")]
    catalog_dir: PathBuf,

    /// New root href
    #[arg(long)]
    root_href: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let start_time = std::time::Instant::now();

    match cli.command {
        Command::Cog(args) => run_cog(&args)?,
        Command::Catalog(args) => run_catalog(&args)?,
        Command::RewriteLinks(args) => {
            let updated = rewrite_root_links(&args.catalog_dir, &args.root_href)
                .with_context(|| format!("Failed to rewrite links under {:?}", args.catalog_dir))?;
            info!("Updated {} documents", updated);
        }
    }

    let elapsed = start_time.elapsed();
    info!("Total processing time: {:?}", elapsed);

    Ok(())
}

fn cog_options(args: &CogArgs) -> CogOptions {
    let defaults = CogOptions::default();
    let target_bounds = match args.bounds.as_deref() {
        Some(&[lonmin, latmin, lonmax, latmax]) => BoundingBox::new(lonmin, latmin, lonmax, latmax),
        _ => defaults.target_bounds,
    };

    CogOptions {
        target_crs: args.target_crs.clone(),
        target_bounds,
        target_aligned_pixels: args.target_aligned_pixels,
        cache_max_mb: args.cache_max_mb,
        gdalwarp: args.gdalwarp.clone(),
    }
}

fn run_cog(args: &CogArgs) -> Result<()> {
    let options = cog_options(args);
    let jobs = plan_conversions(&args.inputs, &args.output).context("Failed to scan inputs")?;
    info!("Start processing {} files", jobs.len());

    let progress = ProgressBar::new(jobs.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
            .context("Invalid progress template")?,
    );

    if args.jobs > 1 {
        let pool = ThreadPoolBuilder::new()
            .num_threads(args.jobs)
            .build()
            .context("Failed to build thread pool")?;
        let results: Vec<Result<()>> = pool.install(|| {
            jobs.par_iter()
                .map(|job| convert(job, &options, args.force, &progress))
                .collect()
        });

        let errors: Vec<String> = results
            .into_iter()
            .zip(&jobs)
            .filter_map(|(result, job)| result.err().map(|e| format!("{}: {:#}", job.input.display(), e)))
            .collect();
        if !errors.is_empty() {
            progress.abandon();
            error!("Failed to process {} files:", errors.len());
            for err in &errors {
                error!("  {}", err);
            }
            anyhow::bail!("{} files failed to process", errors.len());
        }
    } else {
        for job in &jobs {
            convert(job, &options, args.force, &progress)?;
        }
    }

    progress.finish_with_message("done");
    info!("End processing");
    Ok(())
}

fn convert(job: &ConversionJob, options: &CogOptions, force: bool, progress: &ProgressBar) -> Result<()> {
    progress.set_message(job.key.id());
    let conversion = normalize(&job.input, &job.output, options, force)
        .with_context(|| format!("Failed to convert {:?}", job.input))?;

    match conversion {
        Conversion::Written(raster) => info!(
            "Written COG: {:?} (resolution {})",
            raster.path, raster.resolution
        ),
        Conversion::Skipped(path) => info!("Skipped existing COG: {:?}", path),
    }
    progress.inc(1);
    Ok(())
}

fn run_catalog(args: &CatalogArgs) -> Result<()> {
    let config = CatalogConfig::default();
    let catalog = build_catalog(&args.input, args.root_href.as_deref(), &args.dist, &config)
        .with_context(|| format!("Failed to build catalog from {:?}", args.input))?;

    let items: usize = catalog.children().iter().map(|c| c.items().len()).sum();
    info!("Catalog '{}' with {} items", catalog.id, items);

    if let Some(root_link) = &args.root_link {
        let catalog_dir = args.dist.join(&config.catalog_id);
        let updated = rewrite_root_links(&catalog_dir, root_link)
            .with_context(|| format!("Failed to rewrite links under {:?}", catalog_dir))?;
        info!("Rewrote root link in {} documents", updated);
    }

    Ok(())
}
