//! Exercise scenario files: scenario center and platform positions.
//!
//! Positions are stored as ECEF meters and converted to lon/lat on the way
//! out. The lenient readers ([`read_center`], [`read_platforms`]) never fail;
//! the `try_` variants say why nothing came back.

use crate::geo::{ecef_to_geodetic, EcefPosition, GeoPoint, GeodesyError};
use roxmltree::{Document, Node, ParsingOptions};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const LAUNCH_ROLE: &str = "LaunchPlatform";

#[derive(Debug, Error)]
pub enum ExerciseError {
    #[error("cannot read scenario: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed scenario XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("missing <{0}> tag")]
    MissingTag(&'static str),
    #[error("<{tag}> is not a number: {value:?}")]
    BadNumber { tag: &'static str, value: String },
    #[error(transparent)]
    Geodesy(#[from] GeodesyError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Platform {
    pub role: String,
    /// `None` when the position is missing or not a numeric triple
    pub position: Option<EcefPosition>,
}

impl Platform {
    pub fn is_launch(&self) -> bool {
        self.role.eq_ignore_ascii_case(LAUNCH_ROLE)
    }
}

/// Platform positions split by role
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlatformMarkers {
    pub launch: Vec<GeoPoint>,
    pub other: Vec<GeoPoint>,
}

impl PlatformMarkers {
    pub fn is_empty(&self) -> bool {
        self.launch.is_empty() && self.other.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExerciseScenario {
    pub center: Option<EcefPosition>,
    pub platforms: Vec<Platform>,
}

impl ExerciseScenario {
    pub fn load(path: &Path) -> Result<Self, ExerciseError> {
        Self::parse(&fs::read_to_string(path)?)
    }

    /// A missing or bad center is tolerated; malformed XML is not
    pub fn parse(text: &str) -> Result<Self, ExerciseError> {
        Ok(Self {
            center: scan_center(text).ok(),
            platforms: parse_platforms(text)?,
        })
    }

    pub fn center_point(&self) -> Option<GeoPoint> {
        self.center.and_then(|c| ecef_to_geodetic(c).ok())
    }

    /// Launch platforms by role; everything else with a usable position is "other"
    pub fn markers(&self) -> PlatformMarkers {
        let mut markers = PlatformMarkers::default();
        for platform in &self.platforms {
            let Some(point) = platform.position.and_then(|p| ecef_to_geodetic(p).ok()) else {
                continue;
            };
            if platform.is_launch() {
                markers.launch.push(point);
            } else {
                markers.other.push(point);
            }
        }
        markers
    }
}

pub fn try_read_center(path: &Path) -> Result<GeoPoint, ExerciseError> {
    let text = fs::read_to_string(path)?;
    Ok(ecef_to_geodetic(scan_center(&text)?)?)
}

/// Scenario center, or `None` for any failure
pub fn read_center(path: &Path) -> Option<GeoPoint> {
    try_read_center(path)
        .map_err(|e| log::debug!("no center in {}: {e}", path.display()))
        .ok()
}

pub fn try_read_platforms(path: &Path) -> Result<PlatformMarkers, ExerciseError> {
    let text = fs::read_to_string(path)?;
    let platforms = parse_platforms(&text)?;
    Ok(ExerciseScenario {
        center: None,
        platforms,
    }
    .markers())
}

/// Launch and other platform positions; empty lists for any failure
pub fn read_platforms(path: &Path) -> PlatformMarkers {
    try_read_platforms(path).unwrap_or_else(|e| {
        log::warn!("ignoring platforms in {}: {e}", path.display());
        PlatformMarkers::default()
    })
}

/// First `<X>`, `<Y>` and `<Z>` in document order, found by plain text search
fn scan_center(text: &str) -> Result<EcefPosition, ExerciseError> {
    Ok(EcefPosition::new(
        scan_number(text, "X")?,
        scan_number(text, "Y")?,
        scan_number(text, "Z")?,
    ))
}

fn scan_number(text: &str, tag: &'static str) -> Result<f64, ExerciseError> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = text.find(&open).ok_or(ExerciseError::MissingTag(tag))? + open.len();
    let len = text[start..].find(&close).ok_or(ExerciseError::MissingTag(tag))?;
    parse_number(tag, &text[start..start + len])
}

fn parse_number(tag: &'static str, raw: &str) -> Result<f64, ExerciseError> {
    let value = raw.trim();
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ExerciseError::BadNumber {
            tag,
            value: value.to_string(),
        })
}

fn parse_platforms(text: &str) -> Result<Vec<Platform>, ExerciseError> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(text.trim_start_matches('\u{feff}'), options)?;

    let platforms = doc
        .descendants()
        .filter(|n| {
            n.has_tag_name("Platforms")
                && n.parent_element().is_some_and(|p| p.has_tag_name("PlatformManager"))
        })
        .flat_map(|container| container.children().filter(|n| n.has_tag_name("Platform")))
        .filter_map(|node| {
            let role = child_text(node, "Role")?.to_string();
            let position = child(node, "Position").and_then(position_triple);
            Some(Platform { role, position })
        })
        .collect();

    Ok(platforms)
}

fn position_triple(position: Node) -> Option<EcefPosition> {
    let axis = |tag: &'static str| parse_number(tag, child_text(position, tag)?).ok();
    Some(EcefPosition::new(axis("X")?, axis("Y")?, axis("Z")?))
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(name))
}

fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    child(node, name).and_then(|n| n.text()).map(str::trim)
}
