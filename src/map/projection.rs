use crate::geo::{GeoPoint, NM_PER_DEGREE};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum WindowError {
    #[error("degenerate window: lon [{min_lon}, {max_lon}], lat [{min_lat}, {max_lat}]")]
    Degenerate {
        min_lon: f64,
        max_lon: f64,
        min_lat: f64,
        max_lat: f64,
    },
    #[error("radius must be positive, got {0} nm")]
    NonPositiveRadius(f64),
}

/// Geographic bounding window mapped onto the whole raster.
///
/// Invariant: `min_lon < max_lon` and `min_lat < max_lat`. Both constructors
/// enforce it, so [`ViewWindow::to_canvas`] never divides by zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewWindow {
    min_lon: f64,
    max_lon: f64,
    min_lat: f64,
    max_lat: f64,
}

impl ViewWindow {
    pub fn new(min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64) -> Result<Self, WindowError> {
        // Negated form so NaN bounds are rejected too
        if !(min_lon < max_lon && min_lat < max_lat) {
            return Err(WindowError::Degenerate {
                min_lon,
                max_lon,
                min_lat,
                max_lat,
            });
        }
        Ok(Self {
            min_lon,
            max_lon,
            min_lat,
            max_lat,
        })
    }

    /// Square-in-degrees window of `radius_nm * pad_ratio` around a center.
    /// Edges are not wrapped or clamped to the globe.
    pub fn from_center_radius(
        center: GeoPoint,
        radius_nm: f64,
        pad_ratio: f64,
    ) -> Result<Self, WindowError> {
        if !(radius_nm > 0.0) {
            return Err(WindowError::NonPositiveRadius(radius_nm));
        }
        let half = radius_nm / NM_PER_DEGREE * pad_ratio;
        Self::new(
            center.lon - half,
            center.lon + half,
            center.lat - half,
            center.lat + half,
        )
    }

    /// Whole-globe window
    pub fn world() -> Self {
        Self {
            min_lon: -180.0,
            max_lon: 180.0,
            min_lat: -90.0,
            max_lat: 90.0,
        }
    }

    pub fn min_lon(&self) -> f64 {
        self.min_lon
    }

    pub fn max_lon(&self) -> f64 {
        self.max_lon
    }

    pub fn min_lat(&self) -> f64 {
        self.min_lat
    }

    pub fn max_lat(&self) -> f64 {
        self.max_lat
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lon + self.max_lon) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        )
    }

    /// Equirectangular projection into a `width` x `height` raster
    #[inline(always)]
    pub fn to_canvas(&self, p: GeoPoint, width: u32, height: u32) -> (f64, f64) {
        let x = (p.lon - self.min_lon) / (self.max_lon - self.min_lon) * width as f64;
        let y = (1.0 - (p.lat - self.min_lat) / (self.max_lat - self.min_lat)) * height as f64;
        (x, y)
    }

    /// Inclusive bounds test
    #[inline(always)]
    pub fn contains(&self, p: GeoPoint) -> bool {
        p.lon >= self.min_lon && p.lon <= self.max_lon && p.lat >= self.min_lat && p.lat <= self.max_lat
    }

    /// Pull a point onto the window edge if it lies outside
    #[inline(always)]
    pub fn clamp(&self, p: GeoPoint) -> GeoPoint {
        GeoPoint::new(
            p.lon.clamp(self.min_lon, self.max_lon),
            p.lat.clamp(self.min_lat, self.max_lat),
        )
    }
}
