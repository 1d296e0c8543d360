use crate::geo::GeoPoint;
use geojson::{GeoJson, Geometry, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Closed loop of geographic vertices; the closing vertex may or may not repeat
pub type Ring = Vec<GeoPoint>;

/// Exterior ring with zero or more holes
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub exterior: Ring,
    pub holes: Vec<Ring>,
}

impl Polygon {
    pub fn new(exterior: Ring, holes: Vec<Ring>) -> Self {
        Self { exterior, holes }
    }

    /// Exterior first, then holes
    pub fn rings(&self) -> impl Iterator<Item = &Ring> {
        std::iter::once(&self.exterior).chain(self.holes.iter())
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SourceError {
    #[error("no coastline path configured")]
    NotConfigured,
    #[error("cannot read {path}: {message}")]
    Io { path: PathBuf, message: String },
    #[error("cannot parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Read-only polygon store shared across concurrent renders.
///
/// Every call visits every feature; there is no spatial pre-filter.
pub trait FeatureSource: Send + Sync {
    fn for_each_polygon(&self, visit: &mut dyn FnMut(&Polygon)) -> Result<(), SourceError>;
}

/// Polygons held in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    polygons: Vec<Polygon>,
}

impl MemorySource {
    pub fn new(polygons: Vec<Polygon>) -> Self {
        Self { polygons }
    }

    pub fn from_geojson_str(content: &str) -> anyhow::Result<Self> {
        let geojson: GeoJson = content.parse()?;
        Ok(Self::new(collect_polygons(&geojson)))
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }
}

impl FeatureSource for MemorySource {
    fn for_each_polygon(&self, visit: &mut dyn FnMut(&Polygon)) -> Result<(), SourceError> {
        self.polygons.iter().for_each(|p| visit(p));
        Ok(())
    }
}

/// Coastline polygons from a GeoJSON file, parsed on first use.
///
/// A failed load is not remembered: the next render tries the file again.
pub struct GeoJsonSource {
    path: PathBuf,
    loaded: Mutex<Option<Arc<Vec<Polygon>>>>,
}

impl GeoJsonSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            loaded: Mutex::new(None),
        }
    }

    fn polygons(&self) -> Result<Arc<Vec<Polygon>>, SourceError> {
        // A poisoned lock only means another loader panicked; the slot is still usable
        let mut slot = self.loaded.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(polygons) = slot.as_ref() {
            return Ok(Arc::clone(polygons));
        }

        let polygons = Arc::new(load_polygons(&self.path)?);
        log::debug!(
            "loaded {} coastline polygons from {}",
            polygons.len(),
            self.path.display()
        );
        *slot = Some(Arc::clone(&polygons));
        Ok(polygons)
    }
}

impl FeatureSource for GeoJsonSource {
    fn for_each_polygon(&self, visit: &mut dyn FnMut(&Polygon)) -> Result<(), SourceError> {
        let polygons = self.polygons()?;
        polygons.iter().for_each(|p| visit(p));
        Ok(())
    }
}

fn load_polygons(path: &Path) -> Result<Vec<Polygon>, SourceError> {
    let content = fs::read_to_string(path).map_err(|e| SourceError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let geojson = content.parse::<GeoJson>().map_err(|e| SourceError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(collect_polygons(&geojson))
}

/// Extract Polygon and MultiPolygon geometries; everything else is skipped
pub fn collect_polygons(geojson: &GeoJson) -> Vec<Polygon> {
    let mut out = Vec::new();
    match geojson {
        GeoJson::FeatureCollection(fc) => {
            for feature in &fc.features {
                if let Some(ref geometry) = feature.geometry {
                    process_geometry(geometry, &mut out);
                }
            }
        }
        GeoJson::Feature(f) => {
            if let Some(ref geometry) = f.geometry {
                process_geometry(geometry, &mut out);
            }
        }
        GeoJson::Geometry(geometry) => process_geometry(geometry, &mut out),
    }
    out
}

fn process_geometry(geometry: &Geometry, out: &mut Vec<Polygon>) {
    match &geometry.value {
        Value::Polygon(rings) => out.extend(to_polygon(rings)),
        Value::MultiPolygon(polygons) => {
            out.extend(polygons.iter().filter_map(|rings| to_polygon(rings)));
        }
        Value::GeometryCollection(geometries) => {
            for g in geometries {
                process_geometry(g, out);
            }
        }
        _ => {}
    }
}

fn to_polygon(rings: &[Vec<Vec<f64>>]) -> Option<Polygon> {
    let mut rings = rings.iter().map(|coords| {
        coords
            .iter()
            .filter(|c| c.len() >= 2)
            .map(|c| GeoPoint::new(c[0], c[1]))
            .collect::<Ring>()
    });
    let exterior = rings.next()?;
    if exterior.len() < 3 {
        return None;
    }
    Some(Polygon::new(exterior, rings.filter(|r| r.len() >= 3).collect()))
}
