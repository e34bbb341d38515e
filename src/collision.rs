//! Screen-space collision avoidance for point-of-interest icons.
//!
//! A colliding icon tries a fixed ring of offsets around its own screen
//! position and takes the first that clears every marker already placed in
//! the pass. If none clears, it keeps its original position and overlaps.

use std::f64::consts::TAU;

use glam::DVec2;

use crate::config::CollisionConfig;
use crate::geo::GeoPoint;
use crate::surface::{Projection, ScreenPoint};

/// Where a point of interest ended up
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub position: GeoPoint,
    pub screen: ScreenPoint,
    /// True when moved off its own coordinate
    pub displaced: bool,
    /// Ring candidates evaluated (0 when there was no collision)
    pub attempts: usize,
}

#[derive(Clone, Debug)]
pub struct CollisionResolver {
    config: CollisionConfig,
    /// Unit vectors of the candidate ring, starting east and turning clockwise on screen
    directions: Vec<DVec2>,
}

impl CollisionResolver {
    pub fn new(config: CollisionConfig) -> Self {
        let n = config.directions.max(1);
        let directions = (0..n)
            .map(|i| {
                let angle = TAU * i as f64 / n as f64;
                DVec2::new(angle.cos(), angle.sin())
            })
            .collect();
        Self { config, directions }
    }

    /// Resolver only runs at or above the configured zoom
    pub fn is_active(&self, zoom: f64) -> bool {
        zoom >= self.config.min_zoom
    }

    /// Distance from the icon's own position to each ring candidate
    pub fn push_distance(&self) -> f64 {
        self.config.radius_px + self.config.push_px
    }

    /// True if `at` is within the collision radius of any placed marker.
    /// NaN distances count as clear.
    pub fn collides(&self, at: ScreenPoint, placed: &[ScreenPoint]) -> bool {
        placed.iter().any(|p| {
            let d = at.distance(*p);
            debug_assert!(!d.is_nan(), "NaN screen distance from {at:?} to {p:?}");
            d <= self.config.radius_px
        })
    }

    /// Pick a position for `point` given the screen positions of markers
    /// already placed. Evaluates at most `directions` candidates.
    pub fn resolve(&self, point: GeoPoint, placed: &[ScreenPoint], projection: &impl Projection) -> Placement {
        let screen = projection.project_to_screen(point);
        let original = Placement {
            position: point,
            screen,
            displaced: false,
            attempts: 0,
        };

        if !screen.is_finite() || !self.collides(screen, placed) {
            return original;
        }

        let push = self.push_distance();
        for (i, dir) in self.directions.iter().enumerate() {
            let candidate = screen + *dir * push;
            if !self.collides(candidate, placed) {
                return Placement {
                    position: projection.project_from_screen(candidate),
                    screen: candidate,
                    displaced: true,
                    attempts: i + 1,
                };
            }
        }

        Placement {
            attempts: self.directions.len(),
            ..original
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1 degree == 1 pixel, y grows downward
    struct Linear;

    impl Projection for Linear {
        fn project_to_screen(&self, p: GeoPoint) -> ScreenPoint {
            DVec2::new(p.lon, -p.lat)
        }

        fn project_from_screen(&self, s: ScreenPoint) -> GeoPoint {
            GeoPoint::new(-s.y, s.x)
        }
    }

    fn resolver() -> CollisionResolver {
        CollisionResolver::new(CollisionConfig::default())
    }

    #[test]
    fn test_no_collision_keeps_position() {
        let p = resolver().resolve(GeoPoint::new(-100.0, 100.0), &[DVec2::new(300.0, 300.0)], &Linear);
        assert!(!p.displaced);
        assert_eq!(p.attempts, 0);
        assert_eq!(p.position, GeoPoint::new(-100.0, 100.0));
    }

    #[test]
    fn test_relocates_onto_ring() {
        let r = resolver();
        let existing = DVec2::new(105.0, 102.0);
        let p = r.resolve(GeoPoint::new(-100.0, 100.0), &[existing], &Linear);

        assert!(p.displaced);
        assert!(p.attempts >= 1 && p.attempts <= 8);
        assert!(p.screen.distance(existing) > 60.0);
        assert!((p.screen.distance(DVec2::new(100.0, 100.0)) - 80.0).abs() < 1e-9);
        // Re-projected geo position matches the chosen screen point
        assert_eq!(Linear.project_to_screen(p.position), p.screen);
    }

    #[test]
    fn test_boundary_distance_collides() {
        let r = resolver();
        assert!(r.collides(DVec2::ZERO, &[DVec2::new(60.0, 0.0)]));
        assert!(!r.collides(DVec2::ZERO, &[DVec2::new(60.5, 0.0)]));
    }

    #[test]
    fn test_crowded_falls_back_to_overlap() {
        let r = resolver();
        // A dense grid around the origin blocks every ring candidate
        let placed: Vec<DVec2> = (-4..=4)
            .flat_map(|x| (-4..=4).map(move |y| DVec2::new(x as f64 * 30.0, y as f64 * 30.0)))
            .collect();
        let p = r.resolve(GeoPoint::new(0.0, 0.0), &placed, &Linear);
        assert!(!p.displaced);
        assert_eq!(p.attempts, 8);
        assert_eq!(p.position, GeoPoint::new(0.0, 0.0));
    }

    #[test]
    fn test_zoom_gate() {
        let r = resolver();
        assert!(!r.is_active(18.9));
        assert!(r.is_active(19.0));
    }
}
