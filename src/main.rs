use anyhow::{Context, Result};
use clap::Parser;
use coast_thumbs::pipeline::{TilePipeline, Visible};
use coast_thumbs::{ThumbnailConfig, ThumbnailRenderer};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Render thumbnails for every scenario, bitmap and subfolder in a folder
#[derive(Debug, Parser)]
#[command(name = "coast-thumbs", version)]
struct Args {
    /// Folder to list
    folder: PathBuf,

    /// GeoJSON coastline polygons, overrides the config file
    #[arg(long)]
    coastline: Option<PathBuf>,

    /// TOML settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where PNGs are written
    #[arg(long, default_value = "thumbs")]
    out: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ThumbnailConfig::from_toml_file(path)?,
        None => ThumbnailConfig::default(),
    };
    if args.coastline.is_some() {
        config.coastline = args.coastline.clone();
    }
    if config.coastline.is_none() {
        log::warn!("no coastline given; map tiles will be placeholders");
    }

    let workers = config.workers();
    let renderer = Arc::new(ThumbnailRenderer::from_config(config));
    log::info!(
        "rendering {}x{} tiles on {workers} workers",
        renderer.config().tile_width,
        renderer.config().tile_height
    );
    let mut pipeline = TilePipeline::new(renderer, workers);

    pipeline.navigate(&args.folder).await?;
    pipeline.wait_idle().await;

    // Hovering each tile in turn queues its close-up
    for index in 0..pipeline.tiles().len() {
        pipeline.pointer_enter(index);
        pipeline.pointer_leave(index);
    }
    pipeline.wait_idle().await;

    fs::create_dir_all(&args.out).with_context(|| format!("cannot create {}", args.out.display()))?;
    let mut written = 0;
    for tile in pipeline.tiles() {
        let stem = file_stem(tile.entry().path());
        if let Some(raster) = tile.default_raster() {
            save(raster.image(), &args.out.join(format!("{stem}.png")))?;
            written += 1;
        }
        if let Some(raster) = tile.hover_raster() {
            save(raster.image(), &args.out.join(format!("{stem}.hover.png")))?;
            written += 1;
        }
    }

    let placeholders = (0..pipeline.tiles().len())
        .filter(|&i| pipeline.visible(i) == Some(Visible::Placeholder))
        .count();
    log::info!(
        "{} tiles, {written} images written to {}, {placeholders} never rendered",
        pipeline.tiles().len(),
        args.out.display()
    );

    pipeline.shutdown().await;
    Ok(())
}

fn file_stem(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().replace('.', "_"))
        .unwrap_or_else(|| "tile".to_string())
}

fn save(image: &image::RgbaImage, path: &Path) -> Result<()> {
    image
        .save(path)
        .with_context(|| format!("cannot write {}", path.display()))
}
