use crate::data::{FeatureSource, SourceError};
use crate::geo::GeoPoint;
use crate::map::geometry::{draw_cross, draw_diamond, draw_dot, fill_even_odd, stroke_ring, CanvasRing};
use crate::map::projection::ViewWindow;
use ab_glyph::{FontRef, PxScale};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_line_segment_mut, draw_text_mut, text_size};
use serde::{Deserialize, Serialize};

/// Marker layers, listed bottom to top
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MarkerLayer {
    OtherPlatform,
    Center,
    LaunchPlatform,
}

/// Points to mark on a scene, one collection per layer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerSet {
    pub other: Vec<GeoPoint>,
    pub center: Vec<GeoPoint>,
    pub launch: Vec<GeoPoint>,
}

impl MarkerSet {
    /// Layers in draw order
    fn layers(&self) -> [(MarkerLayer, &[GeoPoint]); 3] {
        [
            (MarkerLayer::OtherPlatform, self.other.as_slice()),
            (MarkerLayer::Center, self.center.as_slice()),
            (MarkerLayer::LaunchPlatform, self.launch.as_slice()),
        ]
    }
}

/// Colors and marker sizes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleOptions {
    pub water: [u8; 4],
    pub land: [u8; 4],
    pub coast: [u8; 4],
    pub other_platform: [u8; 4],
    pub center: [u8; 4],
    /// Multiplied into the center marker alpha (0.0 to 1.0)
    pub center_opacity: f32,
    pub launch_fill: [u8; 4],
    pub launch_outline: [u8; 4],
    pub dot_radius: i32,
    pub cross_arm: i32,
    pub diamond_radius: f64,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self {
            water: [22, 44, 72, 255],
            land: [86, 110, 74, 255],
            coast: [160, 176, 150, 255],
            other_platform: [80, 200, 255, 255],
            center: [255, 255, 255, 255],
            center_opacity: 0.85,
            launch_fill: [255, 72, 48, 255],
            launch_outline: [20, 20, 20, 255],
            dot_radius: 2,
            cross_arm: 5,
            diamond_radius: 5.0,
        }
    }
}

impl StyleOptions {
    fn center_color(&self) -> Rgba<u8> {
        let [r, g, b, a] = self.center;
        let alpha = (a as f32 * self.center_opacity.clamp(0.0, 1.0)).round() as u8;
        Rgba([r, g, b, alpha])
    }
}

/// A finished raster. Never modified after the render that produced it.
#[derive(Debug, Clone)]
pub struct RenderedTile {
    image: RgbaImage,
    layers: Vec<MarkerLayer>,
    diagnostic: Option<String>,
}

impl RenderedTile {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image,
            layers: Vec::new(),
            diagnostic: None,
        }
    }

    /// Neutral tile with the reason it is not a real render written on it
    pub fn placeholder(width: u32, height: u32, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut image = RgbaImage::from_pixel(width, height, PLACEHOLDER_FIELD);
        if width > 1 && height > 1 {
            let (w, h) = ((width - 1) as f32, (height - 1) as f32);
            draw_line_segment_mut(&mut image, (0.0, 0.0), (w, h), PLACEHOLDER_CROSS);
            draw_line_segment_mut(&mut image, (0.0, h), (w, 0.0), PLACEHOLDER_CROSS);
            if let Some(font) = placeholder_font() {
                write_message(&mut image, &font, &message);
            }
        }
        Self {
            image,
            layers: Vec::new(),
            diagnostic: Some(message),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Marker layer of every marker drawn, in draw order
    pub fn layers(&self) -> &[MarkerLayer] {
        &self.layers
    }

    /// Set only for placeholders
    pub fn diagnostic(&self) -> Option<&str> {
        self.diagnostic.as_deref()
    }

    pub fn is_placeholder(&self) -> bool {
        self.diagnostic.is_some()
    }
}

const PLACEHOLDER_FIELD: Rgba<u8> = Rgba([58, 58, 62, 255]);
const PLACEHOLDER_CROSS: Rgba<u8> = Rgba([96, 96, 104, 255]);
const PLACEHOLDER_TEXT: Rgba<u8> = Rgba([222, 222, 228, 255]);

fn placeholder_font() -> Option<FontRef<'static>> {
    FontRef::try_from_slice(epaint_default_fonts::HACK_REGULAR)
        .map_err(|e| log::warn!("placeholder font unusable, drawing the bare cross: {e}"))
        .ok()
}

/// Word-wrapped and vertically centered; lines that do not fit are dropped
fn write_message(image: &mut RgbaImage, font: &FontRef<'_>, message: &str) {
    let (width, height) = image.dimensions();
    let scale = PxScale::from((height as f32 / 10.0).clamp(8.0, 14.0));
    let margin = 4;
    let max_width = width.saturating_sub(2 * margin);

    let mut lines: Vec<String> = Vec::new();
    for word in message.split_whitespace() {
        match lines.last_mut() {
            Some(line) if text_size(scale, font, &format!("{line} {word}")).0 <= max_width => {
                line.push(' ');
                line.push_str(word);
            }
            _ => lines.push(word.to_string()),
        }
    }

    let line_height = scale.y.ceil() as u32 + 2;
    let fit = (height.saturating_sub(2 * margin) / line_height.max(1)) as usize;
    lines.truncate(fit);

    let block = line_height * lines.len() as u32;
    let mut y = (height.saturating_sub(block) / 2) as i32;
    for line in &lines {
        draw_text_mut(image, PLACEHOLDER_TEXT, margin as i32, y, scale, font, line);
        y += line_height as i32;
    }
}

/// Composes background, coastline polygons and marker layers
#[derive(Debug, Clone, Default)]
pub struct SceneRenderer {
    pub style: StyleOptions,
}

impl SceneRenderer {
    pub fn new(style: StyleOptions) -> Self {
        Self { style }
    }

    /// Render a scene. Source failures come back as a placeholder tile.
    pub fn render(
        &self,
        source: Option<&dyn FeatureSource>,
        window: &ViewWindow,
        width: u32,
        height: u32,
        markers: &MarkerSet,
    ) -> RenderedTile {
        match self.try_render(source, window, width, height, markers) {
            Ok(tile) => tile,
            Err(e) => {
                log::warn!("coastline render failed: {e}");
                RenderedTile::placeholder(width, height, e.to_string())
            }
        }
    }

    fn try_render(
        &self,
        source: Option<&dyn FeatureSource>,
        window: &ViewWindow,
        width: u32,
        height: u32,
        markers: &MarkerSet,
    ) -> Result<RenderedTile, SourceError> {
        let source = source.ok_or(SourceError::NotConfigured)?;
        let mut image = RgbaImage::from_pixel(width, height, Rgba(self.style.water));

        let land = Rgba(self.style.land);
        let coast = Rgba(self.style.coast);
        let mut rings: Vec<CanvasRing> = Vec::new();
        source.for_each_polygon(&mut |polygon| {
            rings.clear();
            // Clamp rather than cull so coastlines stay continuous at the edge
            rings.extend(polygon.rings().map(|ring| {
                ring.iter()
                    .map(|&p| window.to_canvas(window.clamp(p), width, height))
                    .collect::<CanvasRing>()
            }));
            fill_even_odd(&mut image, &rings, land);
            for ring in &rings {
                stroke_ring(&mut image, ring, coast);
            }
        })?;

        let layers = self.draw_markers(&mut image, window, markers);

        Ok(RenderedTile {
            image,
            layers,
            diagnostic: None,
        })
    }

    fn draw_markers(&self, image: &mut RgbaImage, window: &ViewWindow, markers: &MarkerSet) -> Vec<MarkerLayer> {
        let (width, height) = image.dimensions();
        let mut drawn = Vec::new();

        for (layer, points) in markers.layers() {
            for &p in points.iter().filter(|&&p| window.contains(p)) {
                let (x, y) = window.to_canvas(p, width, height);
                match layer {
                    MarkerLayer::OtherPlatform => {
                        draw_dot(image, x, y, self.style.dot_radius, Rgba(self.style.other_platform));
                    }
                    MarkerLayer::Center => {
                        draw_cross(image, x, y, self.style.cross_arm, self.style.center_color());
                    }
                    MarkerLayer::LaunchPlatform => {
                        draw_diamond(
                            image,
                            x,
                            y,
                            self.style.diamond_radius,
                            Rgba(self.style.launch_fill),
                            Rgba(self.style.launch_outline),
                        );
                    }
                }
                drawn.push(layer);
            }
        }

        drawn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MemorySource, Polygon};

    fn square(min: f64, max: f64) -> Vec<GeoPoint> {
        vec![
            GeoPoint::new(min, min),
            GeoPoint::new(max, min),
            GeoPoint::new(max, max),
            GeoPoint::new(min, max),
        ]
    }

    fn window() -> ViewWindow {
        ViewWindow::new(-10.0, 10.0, -10.0, 10.0).unwrap()
    }

    #[test]
    fn test_missing_source_gives_placeholder() {
        let tile = SceneRenderer::default().render(None, &window(), 220, 124, &MarkerSet::default());
        assert_eq!((tile.width(), tile.height()), (220, 124));
        assert!(tile.is_placeholder());
        assert_eq!(tile.diagnostic(), Some("no coastline path configured"));
    }

    #[test]
    fn test_unreadable_source_gives_placeholder() {
        let source = crate::data::GeoJsonSource::new("/nope/coast.geojson");
        let tile = SceneRenderer::default().render(Some(&source), &window(), 220, 124, &MarkerSet::default());
        assert_eq!((tile.width(), tile.height()), (220, 124));
        assert!(tile.diagnostic().unwrap().contains("cannot read"));
    }

    fn count_text_pixels(tile: &RenderedTile) -> usize {
        tile.image()
            .pixels()
            .filter(|&&p| p != PLACEHOLDER_FIELD && p != PLACEHOLDER_CROSS)
            .count()
    }

    #[test]
    fn test_placeholder_writes_its_message() {
        let blank = RenderedTile::placeholder(220, 124, "");
        assert_eq!(count_text_pixels(&blank), 0);

        let tile = RenderedTile::placeholder(220, 124, "no coastline path configured");
        assert!(count_text_pixels(&tile) > 50);

        // Different reasons look different
        let other = RenderedTile::placeholder(220, 124, "cannot parse coast.geojson");
        assert_ne!(tile.image(), other.image());
    }

    #[test]
    fn test_placeholder_long_message_stays_in_bounds() {
        let message = "cannot read /a/very/long/path/to/some/coastline/file.geojson: No such file or directory ".repeat(8);
        let tile = RenderedTile::placeholder(64, 40, message);
        assert_eq!((tile.width(), tile.height()), (64, 40));
        let tiny = RenderedTile::placeholder(1, 1, "x");
        assert_eq!((tiny.width(), tiny.height()), (1, 1));
    }

    #[test]
    fn test_empty_source_is_all_water() {
        let style = StyleOptions::default();
        let tile = SceneRenderer::new(style.clone()).render(
            Some(&MemorySource::default()),
            &window(),
            220,
            124,
            &MarkerSet::default(),
        );
        assert!(!tile.is_placeholder());
        assert!(tile.image().pixels().all(|p| p.0 == style.water));
    }

    #[test]
    fn test_land_is_filled_and_holes_are_water() {
        let style = StyleOptions::default();
        let source = MemorySource::new(vec![Polygon::new(square(-5.0, 5.0), vec![square(-1.0, 1.0)])]);
        let tile = SceneRenderer::new(style.clone()).render(Some(&source), &window(), 200, 200, &MarkerSet::default());
        // Halfway between hole edge and exterior edge
        assert_eq!(tile.image().get_pixel(70, 100).0, style.land);
        assert_eq!(tile.image().get_pixel(100, 100).0, style.water);
        assert_eq!(tile.image().get_pixel(10, 10).0, style.water);
    }

    #[test]
    fn test_out_of_window_polygon_is_clamped_to_edge() {
        let style = StyleOptions::default();
        // Extends far past the right edge; clamping keeps a filled band up to it
        let source = MemorySource::new(vec![Polygon::new(square(0.0, 40.0), vec![])]);
        let tile = SceneRenderer::new(style.clone()).render(Some(&source), &window(), 200, 200, &MarkerSet::default());
        assert_eq!(tile.image().get_pixel(190, 50).0, style.land);
        assert_eq!(tile.image().get_pixel(50, 50).0, style.water);
    }

    #[test]
    fn test_markers_outside_window_are_culled() {
        let markers = MarkerSet {
            other: vec![GeoPoint::new(50.0, 0.0), GeoPoint::new(1.0, 1.0)],
            center: vec![GeoPoint::new(0.0, 80.0)],
            launch: vec![],
        };
        let tile = SceneRenderer::default().render(Some(&MemorySource::default()), &window(), 100, 100, &markers);
        assert_eq!(tile.layers(), &[MarkerLayer::OtherPlatform]);
    }

    #[test]
    fn test_layer_order_launch_on_top() {
        let style = StyleOptions::default();
        let spot = GeoPoint::new(0.0, 0.0);
        let markers = MarkerSet {
            launch: vec![spot],
            center: vec![spot],
            other: vec![spot, GeoPoint::new(0.2, 0.2)],
        };
        let tile = SceneRenderer::new(style.clone()).render(Some(&MemorySource::default()), &window(), 200, 200, &markers);

        assert_eq!(
            tile.layers(),
            &[
                MarkerLayer::OtherPlatform,
                MarkerLayer::OtherPlatform,
                MarkerLayer::Center,
                MarkerLayer::LaunchPlatform,
            ]
        );
        assert_eq!(tile.image().get_pixel(100, 100).0, style.launch_fill);
    }

    #[test]
    fn test_center_drawn_over_other_platform() {
        let style = StyleOptions {
            center_opacity: 1.0,
            ..StyleOptions::default()
        };
        let spot = GeoPoint::new(0.0, 0.0);
        let markers = MarkerSet {
            other: vec![spot],
            center: vec![spot],
            launch: vec![],
        };
        let tile = SceneRenderer::new(style.clone()).render(Some(&MemorySource::default()), &window(), 200, 200, &markers);
        assert_eq!(tile.image().get_pixel(100, 100).0, style.center);
    }
}
