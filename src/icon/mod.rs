//! Marker and cluster icon rasterization.
//!
//! Circle outlines are the only geometry markers need, so the factory keeps
//! origin-centered circle paths keyed by radius and translates them into
//! place at draw time.

pub mod thumbnail;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tiny_skia::{FillRule, Paint, Path, PathBuilder, Pixmap, Stroke, Transform};

use crate::entity::{ContentKind, MapEntity};

/// Radii (px) whose circle paths are built when the factory is created
pub const PRECOMPUTED_RADII: [f32; 9] = [4.0, 6.0, 8.0, 10.0, 12.0, 14.0, 16.0, 20.0, 24.0];

/// Plain entity dot radius
const DOT_RADIUS: f32 = 6.0;
const DOT_STROKE: f32 = 1.5;
const CLUSTER_STROKE: f32 = 2.0;

/// Centered text drawn over an icon by the host
#[derive(Clone, Debug, PartialEq)]
pub struct IconLabel {
    pub text: String,
    pub font_size: f32,
}

/// A rasterized marker image
#[derive(Clone)]
pub struct MarkerIcon {
    pub pixmap: Pixmap,
    pub label: Option<IconLabel>,
    /// Dominant color, for hosts that cannot show the bitmap's colors
    pub tint: [u8; 3],
}

impl fmt::Debug for MarkerIcon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkerIcon")
            .field("width", &self.pixmap.width())
            .field("height", &self.pixmap.height())
            .field("label", &self.label)
            .field("tint", &self.tint)
            .finish()
    }
}

impl MarkerIcon {
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Alpha of the pixel at (x, y), 0 outside the bitmap
    pub fn alpha_at(&self, x: u32, y: u32) -> u8 {
        self.pixmap.pixel(x, y).map(|p| p.alpha()).unwrap_or(0)
    }
}

/// Count badge label and font size: three tiers by digit count, capped at "999+"
pub fn cluster_label(count: usize) -> IconLabel {
    let text = if count > 999 { "999+".to_string() } else { count.to_string() };
    let font_size = if count < 10 {
        14.0
    } else if count < 100 {
        12.0
    } else {
        10.0
    };
    IconLabel { text, font_size }
}

/// Badge radius grows with the member count
pub fn cluster_radius(count: usize) -> f32 {
    if count < 10 {
        10.0
    } else if count < 100 {
        12.0
    } else {
        14.0
    }
}

/// Color for an entity, decided in exactly one place
pub fn entity_color(entity: &MapEntity) -> [u8; 3] {
    match entity {
        MapEntity::Content(c) => match c.kind {
            ContentKind::Notice => [66, 133, 244],
            ContentKind::Info => [52, 168, 83],
            ContentKind::Market => [251, 188, 5],
            ContentKind::Free => [0, 172, 193],
            ContentKind::Hot => [234, 67, 53],
        },
        MapEntity::Record(_) => [156, 39, 176],
    }
}

#[inline(always)]
fn radius_key(radius: f32) -> u32 {
    (radius * 4.0).round() as u32
}

fn build_circle(radius: f32) -> Option<Path> {
    PathBuilder::from_circle(0.0, 0.0, radius)
}

fn solid(rgb: [u8; 3], alpha: u8) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(rgb[0], rgb[1], rgb[2], alpha);
    paint.anti_alias = true;
    paint
}

/// Builds marker icons with memoized circle geometry
pub struct IconFactory {
    circles: HashMap<u32, Path>,
    /// Plain entity dots only vary by color
    dots: HashMap<[u8; 3], Arc<MarkerIcon>>,
}

impl IconFactory {
    pub fn new() -> Self {
        let circles = PRECOMPUTED_RADII
            .iter()
            .filter_map(|&r| build_circle(r).map(|p| (radius_key(r), p)))
            .collect();
        Self {
            circles,
            dots: HashMap::new(),
        }
    }

    /// Origin-centered circle path, built once per radius
    pub fn circle(&mut self, radius: f32) -> Option<&Path> {
        let key = radius_key(radius);
        if !self.circles.contains_key(&key) {
            let path = build_circle(radius)?;
            self.circles.insert(key, path);
        }
        self.circles.get(&key)
    }

    /// Number of memoized circle paths
    pub fn cached_circles(&self) -> usize {
        self.circles.len()
    }

    /// Filled, stroked circle of `radius` centered in a fresh pixmap
    fn disc(&mut self, radius: f32, stroke: f32, fill: [u8; 3], outline: [u8; 3]) -> Option<Pixmap> {
        let side = (2.0 * (radius + stroke)).ceil() as u32;
        let mut pixmap = Pixmap::new(side, side)?;
        let center = side as f32 / 2.0;
        let transform = Transform::from_translate(center, center);
        let path = self.circle(radius)?;

        pixmap.fill_path(path, &solid(fill, 255), FillRule::Winding, transform, None);
        let stroke = Stroke {
            width: stroke,
            ..Stroke::default()
        };
        pixmap.stroke_path(path, &solid(outline, 255), &stroke, transform, None);
        Some(pixmap)
    }

    /// Count badge for a cluster of `count` members
    pub fn cluster_icon(&mut self, count: usize, records: bool) -> Option<MarkerIcon> {
        let fill = if records { [123, 31, 162] } else { [255, 112, 67] };
        let pixmap = self.disc(cluster_radius(count), CLUSTER_STROKE, fill, [255, 255, 255])?;
        Some(MarkerIcon {
            pixmap,
            label: Some(cluster_label(count)),
            tint: fill,
        })
    }

    /// Plain dot icon colored by the entity's kind
    pub fn entity_icon(&mut self, entity: &MapEntity) -> Option<Arc<MarkerIcon>> {
        let color = entity_color(entity);
        if let Some(icon) = self.dots.get(&color) {
            return Some(icon.clone());
        }
        let pixmap = self.disc(DOT_RADIUS, DOT_STROKE, color, [255, 255, 255])?;
        let icon = Arc::new(MarkerIcon {
            pixmap,
            label: None,
            tint: color,
        });
        self.dots.insert(color, icon.clone());
        Some(icon)
    }
}

impl Default for IconFactory {
    fn default() -> Self {
        Self::new()
    }
}
