//! Render entry points: world maps, auto-fit windows, and the per-entry
//! tiles the pipeline asks for.

use crate::config::ThumbnailConfig;
use crate::data::{FeatureSource, GeoJsonSource};
use crate::exercise::{read_center, read_platforms};
use crate::fit::{adaptive_cluster_zoom, auto_view, FitTuning};
use crate::geo::GeoPoint;
use crate::map::{MarkerSet, RenderedTile, SceneRenderer, StyleOptions, ViewWindow};
use crate::pipeline::{DefaultRender, EntryKind, TileEntry, TileRenderer};
use image::{imageops, Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use std::path::Path;
use std::sync::Arc;

pub fn render_world_map(
    source: Option<&dyn FeatureSource>,
    width: u32,
    height: u32,
    markers: &MarkerSet,
    window: &ViewWindow,
    style: &StyleOptions,
) -> RenderedTile {
    SceneRenderer::new(style.clone()).render(source, window, width, height, markers)
}

/// Window that fits every point, see [`auto_view`]
pub fn compute_auto_view(points: &[GeoPoint], min_radius_nm: f64, padding_nm: f64, pad_ratio: f64) -> ViewWindow {
    let view = auto_view(points, min_radius_nm, padding_nm);
    ViewWindow::from_center_radius(view.center, view.radius_nm, pad_ratio).unwrap_or_else(|e| {
        log::warn!("auto view produced an unusable window ({e}); showing the world");
        ViewWindow::world()
    })
}

/// Close-up of a scenario's contacts that keeps launch platforms in frame
pub fn render_adaptive_cluster_zoom(
    source: Option<&dyn FeatureSource>,
    scenario: &Path,
    width: u32,
    height: u32,
    tuning: &FitTuning,
    style: &StyleOptions,
) -> RenderedTile {
    let markers = scenario_markers(scenario);
    let window = adaptive_cluster_zoom(&markers.other, &markers.launch, tuning);
    render_world_map(source, width, height, &markers, &window, style)
}

/// Whole-scenario view: every marker auto-fitted
pub fn render_exercise_overview(
    source: Option<&dyn FeatureSource>,
    scenario: &Path,
    config: &ThumbnailConfig,
) -> (RenderedTile, MarkerSet) {
    let markers = scenario_markers(scenario);
    let points: Vec<GeoPoint> = markers
        .launch
        .iter()
        .chain(&markers.other)
        .chain(&markers.center)
        .copied()
        .collect();
    let window = compute_auto_view(
        &points,
        config.auto_min_radius_nm,
        config.auto_padding_nm,
        config.tuning.pad_ratio,
    );
    let tile = render_world_map(
        source,
        config.tile_width,
        config.tile_height,
        &markers,
        &window,
        &config.style,
    );
    (tile, markers)
}

/// Center and platform markers of a scenario; empty when unreadable
pub fn scenario_markers(scenario: &Path) -> MarkerSet {
    let platforms = read_platforms(scenario);
    MarkerSet {
        other: platforms.other,
        center: read_center(scenario).into_iter().collect(),
        launch: platforms.launch,
    }
}

/// Decode a bitmap and letterbox it into the tile
pub fn bitmap_preview(path: &Path, width: u32, height: u32) -> RenderedTile {
    match image::open(path) {
        Ok(img) => {
            let fitted = img.thumbnail(width, height).to_rgba8();
            let mut canvas = RgbaImage::from_pixel(width, height, Rgba([16, 16, 18, 255]));
            let x = (width.saturating_sub(fitted.width()) / 2) as i64;
            let y = (height.saturating_sub(fitted.height()) / 2) as i64;
            imageops::overlay(&mut canvas, &fitted, x, y);
            RenderedTile::new(canvas)
        }
        Err(e) => {
            log::debug!("cannot decode {}: {e}", path.display());
            RenderedTile::placeholder(width, height, format!("cannot decode image: {e}"))
        }
    }
}

/// Flat folder glyph
pub fn folder_tile(width: u32, height: u32) -> RenderedTile {
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([30, 32, 36, 255]));
    if width == 0 || height == 0 {
        return RenderedTile::new(canvas);
    }
    let amber = Rgba([222, 170, 72, 255]);
    let body_w = (width / 2).max(1);
    let body_h = (height / 2).max(1);
    let left = (width.saturating_sub(body_w) / 2) as i32;
    let top = (height.saturating_sub(body_h) / 2) as i32;
    let tab_h = (body_h / 6).max(1);

    draw_filled_rect_mut(
        &mut canvas,
        Rect::at(left, top - tab_h as i32).of_size((body_w / 3).max(1), tab_h),
        amber,
    );
    draw_filled_rect_mut(&mut canvas, Rect::at(left, top).of_size(body_w, body_h), amber);
    RenderedTile::new(canvas)
}

/// Renders scenario, bitmap and folder tiles against one shared coastline source
pub struct ThumbnailRenderer {
    source: Option<Arc<dyn FeatureSource>>,
    config: ThumbnailConfig,
}

impl ThumbnailRenderer {
    pub fn new(source: Option<Arc<dyn FeatureSource>>, config: ThumbnailConfig) -> Self {
        Self { source, config }
    }

    /// Coastline taken from `config.coastline`, if any
    pub fn from_config(config: ThumbnailConfig) -> Self {
        let source = config
            .coastline
            .as_ref()
            .map(|path| Arc::new(GeoJsonSource::new(path.clone())) as Arc<dyn FeatureSource>);
        Self::new(source, config)
    }

    pub fn config(&self) -> &ThumbnailConfig {
        &self.config
    }

    fn source(&self) -> Option<&dyn FeatureSource> {
        self.source.as_deref()
    }
}

impl TileRenderer for ThumbnailRenderer {
    fn render_default(&self, entry: &TileEntry) -> DefaultRender {
        let (width, height) = (self.config.tile_width, self.config.tile_height);
        match entry.kind {
            EntryKind::Folder => DefaultRender {
                tile: folder_tile(width, height),
                hover: false,
            },
            EntryKind::Bitmap => DefaultRender {
                tile: bitmap_preview(&entry.path, width, height),
                hover: false,
            },
            EntryKind::Scenario => {
                let (tile, markers) = render_exercise_overview(self.source(), &entry.path, &self.config);
                // Without platforms there is nothing to zoom in on
                let hover = !(markers.launch.is_empty() && markers.other.is_empty());
                DefaultRender { tile, hover }
            }
        }
    }

    fn render_hover(&self, entry: &TileEntry) -> RenderedTile {
        let (width, height) = (self.config.tile_width, self.config.tile_height);
        match entry.kind {
            EntryKind::Scenario => render_adaptive_cluster_zoom(
                self.source(),
                &entry.path,
                width,
                height,
                &self.config.tuning,
                &self.config.style,
            ),
            EntryKind::Folder | EntryKind::Bitmap => RenderedTile::placeholder(width, height, "no close-up"),
        }
    }
}
