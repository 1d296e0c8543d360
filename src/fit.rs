//! View fitting: choose a center and radius that keep markers in frame.

use crate::geo::{centroid, geographic_midpoint, haversine_nm, GeoPoint};
use crate::map::ViewWindow;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Radius used by [`auto_view`] when there is nothing to fit
pub const WIDE_DEFAULT_RADIUS_NM: f64 = 600.0;
/// Radius used by [`tight_cluster_view`] when there is nothing to fit
pub const TIGHT_DEFAULT_RADIUS_NM: f64 = 60.0;
/// Auto-fit parameters used as the fallback inside [`adaptive_cluster_zoom`]
pub const AUTO_MIN_RADIUS_NM: f64 = 60.0;
pub const AUTO_PADDING_NM: f64 = 30.0;

/// Slack allowed before the tight view is considered to clip something
const TIGHT_SLACK: f64 = 1.05;

/// Center plus radius in nautical miles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitView {
    pub center: GeoPoint,
    pub radius_nm: f64,
}

impl FitView {
    pub const fn new(center: GeoPoint, radius_nm: f64) -> Self {
        Self { center, radius_nm }
    }

    /// Farthest distance from the center to any of `points`
    pub fn reach_nm(&self, points: &[GeoPoint]) -> f64 {
        points
            .iter()
            .map(|&p| haversine_nm(self.center, p))
            .fold(0.0, f64::max)
    }
}

/// Tuning for the close-up contact view
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitTuning {
    pub min_contacts_radius_nm: f64,
    pub padding_nm: f64,
    pub max_contacts_radius_nm: f64,
    /// Window half-size is `radius * pad_ratio`
    pub pad_ratio: f64,
}

impl Default for FitTuning {
    fn default() -> Self {
        Self {
            min_contacts_radius_nm: 10.0,
            padding_nm: 5.0,
            max_contacts_radius_nm: 250.0,
            pad_ratio: 1.15,
        }
    }
}

/// Fit every point: center on the farthest pair, then widen for outliers.
///
/// Every input point ends up within `radius_nm` of the center.
pub fn auto_view(points: &[GeoPoint], min_radius_nm: f64, padding_nm: f64) -> FitView {
    match points {
        [] => FitView::new(GeoPoint::default(), min_radius_nm.max(WIDE_DEFAULT_RADIUS_NM)),
        [only] => FitView::new(*only, min_radius_nm),
        _ => {
            let (i, j, span) = farthest_pair(points);
            let center = geographic_midpoint(points[i], points[j]);
            let mut radius = min_radius_nm.max(span / 2.0 + padding_nm);

            // The pair does not bound everything on a sphere; keep the center, grow the radius
            for &p in points {
                let needed = haversine_nm(center, p) + padding_nm;
                if needed > radius {
                    radius = needed;
                }
            }

            FitView::new(center, radius)
        }
    }
}

/// Centroid-based view clamped to `[min_radius_nm, max_radius_nm]`.
///
/// The clamp can leave far-flung points out of frame.
pub fn tight_cluster_view(
    points: &[GeoPoint],
    min_radius_nm: f64,
    padding_nm: f64,
    max_radius_nm: f64,
) -> FitView {
    match points {
        [] => FitView::new(GeoPoint::default(), min_radius_nm.max(TIGHT_DEFAULT_RADIUS_NM)),
        [only] => FitView::new(*only, min_radius_nm),
        _ => {
            let center = centroid(points);
            let spread = FitView::new(center, 0.0).reach_nm(points) + padding_nm;
            let upper = max_radius_nm.max(min_radius_nm);
            FitView::new(center, spread.max(min_radius_nm).min(upper))
        }
    }
}

/// Close-in view of the contacts that never clips a launch platform.
///
/// Falls back to the combined auto-fit center when the tight contact view
/// would leave a launch platform (or stray contact) out of frame, sized just
/// large enough for everything but never beyond the auto-fit radius.
pub fn adaptive_cluster_zoom(contacts: &[GeoPoint], launches: &[GeoPoint], tuning: &FitTuning) -> ViewWindow {
    if contacts.is_empty() && launches.is_empty() {
        return ViewWindow::world();
    }

    let view = if contacts.is_empty() {
        auto_view(launches, AUTO_MIN_RADIUS_NM, AUTO_PADDING_NM)
    } else {
        adaptive_fit(contacts, launches, tuning)
    };

    ViewWindow::from_center_radius(view.center, view.radius_nm, tuning.pad_ratio).unwrap_or_else(|e| {
        log::warn!("adaptive zoom produced an unusable window ({e}); showing the world");
        ViewWindow::world()
    })
}

fn adaptive_fit(contacts: &[GeoPoint], launches: &[GeoPoint], tuning: &FitTuning) -> FitView {
    let tight = tight_cluster_view(
        contacts,
        tuning.min_contacts_radius_nm,
        tuning.padding_nm,
        tuning.max_contacts_radius_nm,
    );

    let everything: Vec<GeoPoint> = launches.iter().chain(contacts).copied().collect();
    let max_from_tight = tight.reach_nm(&everything);
    if max_from_tight + tuning.padding_nm <= tight.radius_nm * TIGHT_SLACK {
        return tight;
    }

    let auto_all = auto_view(&everything, AUTO_MIN_RADIUS_NM, AUTO_PADDING_NM);
    let needed = FitView::new(auto_all.center, 0.0).reach_nm(&everything) + tuning.padding_nm;
    let upper = tuning.max_contacts_radius_nm.max(auto_all.radius_nm).min(auto_all.radius_nm);
    let radius = needed.max(tuning.min_contacts_radius_nm).min(upper);
    log::trace!(
        "tight view ({:.1} nm) clips {:.1} nm reach; widening to {:.1} nm",
        tight.radius_nm,
        max_from_tight,
        radius
    );
    FitView::new(auto_all.center, radius)
}

/// Indices and distance of the two points farthest apart
fn farthest_pair(points: &[GeoPoint]) -> (usize, usize, f64) {
    let n = points.len();
    (0..n)
        .into_par_iter()
        .flat_map_iter(|i| (i + 1..n).map(move |j| (i, j, haversine_nm(points[i], points[j]))))
        .reduce(|| (0, 0, f64::NEG_INFINITY), |a, b| if b.2 > a.2 { b } else { a })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn covers(window: &ViewWindow, p: GeoPoint) -> bool {
        let center = window.center();
        let half_nm = (window.max_lat() - window.min_lat()) / 2.0 * crate::geo::NM_PER_DEGREE;
        haversine_nm(center, p) <= half_nm
    }

    #[test]
    fn test_auto_view_empty_and_single() {
        let v = auto_view(&[], 60.0, 30.0);
        assert_eq!(v, FitView::new(GeoPoint::new(0.0, 0.0), 600.0));
        let v = auto_view(&[], 900.0, 30.0);
        assert_eq!(v.radius_nm, 900.0);

        let p = GeoPoint::new(-70.0, 41.0);
        assert_eq!(auto_view(&[p], 60.0, 30.0), FitView::new(p, 60.0));
    }

    #[test]
    fn test_auto_view_pair() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(0.0, 10.0);
        let v = auto_view(&[a, b], 60.0, 30.0);
        assert_abs_diff_eq!(v.center.lat, 5.0, epsilon = 1e-9);
        let span = haversine_nm(a, b);
        assert_abs_diff_eq!(v.radius_nm, span / 2.0 + 30.0, epsilon = 1e-6);
    }

    #[test]
    fn test_auto_view_widens_for_outlier() {
        // Equilateral-ish triangle: the third vertex is far from the pair midpoint
        let pts = [
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(20.0, 0.0),
            GeoPoint::new(10.0, 17.0),
        ];
        let v = auto_view(&pts, 1.0, 0.0);
        for p in pts {
            assert!(haversine_nm(v.center, p) <= v.radius_nm + 1e-9);
        }
        assert!(v.radius_nm > haversine_nm(pts[0], pts[1]) / 2.0);
    }

    #[test]
    fn test_tight_defaults() {
        assert_eq!(
            tight_cluster_view(&[], 10.0, 5.0, 250.0),
            FitView::new(GeoPoint::default(), 60.0)
        );
        let p = GeoPoint::new(3.0, 4.0);
        assert_eq!(tight_cluster_view(&[p], 10.0, 5.0, 250.0), FitView::new(p, 10.0));
    }

    #[test]
    fn test_tight_clamps_to_max() {
        let pts = [GeoPoint::new(0.0, 0.0), GeoPoint::new(40.0, 0.0)];
        let v = tight_cluster_view(&pts, 10.0, 5.0, 250.0);
        assert_eq!(v.radius_nm, 250.0);
        assert_abs_diff_eq!(v.center.lon, 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_adaptive_nothing_is_world() {
        assert_eq!(adaptive_cluster_zoom(&[], &[], &FitTuning::default()), ViewWindow::world());
    }

    #[test]
    fn test_adaptive_keeps_launch_200nm_away() {
        let contact = GeoPoint::new(-70.0, 40.0);
        // 200 nm due north
        let launch = GeoPoint::new(-70.0, 40.0 + 200.0 / 60.04);
        assert_abs_diff_eq!(haversine_nm(contact, launch), 200.0, epsilon = 0.5);

        let tuning = FitTuning::default();
        let window = adaptive_cluster_zoom(&[contact], &[launch], &tuning);
        let view_radius = (window.max_lat() - window.min_lat()) / 2.0 / tuning.pad_ratio * 60.0;
        let center = window.center();
        assert!(haversine_nm(center, contact) <= view_radius);
        assert!(haversine_nm(center, launch) <= view_radius);
        assert!(window.contains(contact) && window.contains(launch));
    }

    #[test]
    fn test_adaptive_stays_tight_for_clustered_contacts() {
        let contacts = [
            GeoPoint::new(10.0, 10.0),
            GeoPoint::new(10.1, 10.0),
            GeoPoint::new(10.0, 10.1),
        ];
        let launch = GeoPoint::new(10.05, 10.05);
        let tuning = FitTuning::default();
        let window = adaptive_cluster_zoom(&contacts, &[launch], &tuning);
        let tight = tight_cluster_view(&contacts, 10.0, 5.0, 250.0);
        let expected = ViewWindow::from_center_radius(tight.center, tight.radius_nm, tuning.pad_ratio).unwrap();
        assert_eq!(window, expected);
    }

    #[test]
    fn test_adaptive_launches_only_uses_auto_view() {
        let launches = [GeoPoint::new(0.0, 0.0), GeoPoint::new(4.0, 0.0)];
        let tuning = FitTuning::default();
        let window = adaptive_cluster_zoom(&[], &launches, &tuning);
        let v = auto_view(&launches, AUTO_MIN_RADIUS_NM, AUTO_PADDING_NM);
        let expected = ViewWindow::from_center_radius(v.center, v.radius_nm, tuning.pad_ratio).unwrap();
        assert_eq!(window, expected);
        assert!(launches.iter().all(|&p| covers(&window, p)));
    }

    #[test]
    fn test_adaptive_fallback_never_exceeds_auto_radius() {
        let contacts = [GeoPoint::new(0.0, 0.0), GeoPoint::new(0.3, 0.0)];
        let launches = [GeoPoint::new(0.0, 30.0)];
        let tuning = FitTuning::default();
        let window = adaptive_cluster_zoom(&contacts, &launches, &tuning);

        let everything = [contacts[0], contacts[1], launches[0]];
        let auto_all = auto_view(&everything, AUTO_MIN_RADIUS_NM, AUTO_PADDING_NM);
        let radius = (window.max_lat() - window.min_lat()) / 2.0 / tuning.pad_ratio * 60.0;
        assert!(radius <= auto_all.radius_nm + 1e-9);
        assert!(everything.iter().all(|&p| haversine_nm(window.center(), p) <= radius));
    }

    fn cluster() -> impl Strategy<Value = Vec<GeoPoint>> {
        (-80.0f64..80.0, -170.0f64..170.0).prop_flat_map(|(lat, lon)| {
            prop::collection::vec((-1.0f64..1.0, -1.0f64..1.0), 1..12).prop_map(move |offsets| {
                offsets
                    .into_iter()
                    .map(|(dlon, dlat)| GeoPoint::new(lon + dlon, lat + dlat))
                    .collect()
            })
        })
    }

    proptest! {
        #[test]
        fn prop_auto_view_contains_all(
            pts in prop::collection::vec((-180.0f64..=180.0, -90.0f64..=90.0), 1..16),
            min_radius in 1.0f64..200.0,
            padding in 0.0f64..50.0,
        ) {
            let pts: Vec<GeoPoint> = pts.into_iter().map(|(lon, lat)| GeoPoint::new(lon, lat)).collect();
            let v = auto_view(&pts, min_radius, padding);
            for &p in &pts {
                prop_assert!(haversine_nm(v.center, p) <= v.radius_nm);
            }
        }

        #[test]
        fn prop_tight_view_bounds(pts in cluster(), min_radius in 1.0f64..50.0, padding in 0.0f64..20.0) {
            let max_radius = 1000.0;
            let v = tight_cluster_view(&pts, min_radius, padding, max_radius);
            prop_assert!(v.radius_nm >= min_radius && v.radius_nm <= max_radius);
            for &p in &pts {
                prop_assert!(haversine_nm(v.center, p) <= v.radius_nm + 1e-9);
            }
        }
    }
}
