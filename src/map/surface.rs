//! Marker surface backed by the Braille canvas.
//!
//! Marker icons are far larger than a terminal cell, so they are sampled
//! down by `ICON_STEP` and stamped dot-by-dot where the source pixel is
//! mostly opaque. Text (cluster counts, captions) comes back as labels for
//! the widget to overlay.

use std::collections::HashMap;
use std::sync::Arc;

use glam::DVec2;

use crate::braille::BrailleCanvas;
use crate::config::EngineConfig;
use crate::icon::MarkerIcon;
use crate::map::geometry::{draw_circle, draw_line_tinted, draw_marker};
use crate::map::projection::Viewport;
use crate::surface::{ClickTarget, MarkerHandle, MarkerPlacement, MarkerSurface};

/// Icon pixels per Braille dot
pub const ICON_STEP: u32 = 3;
/// Alpha at or above which a sampled icon pixel becomes a dot
pub const ALPHA_THRESHOLD: u8 = 128;
/// Dot radius of a marker still waiting for its icon
const PLACEHOLDER_RADIUS: i32 = 1;
const HIT_SLACK: f64 = 2.0;
const PLACEHOLDER_TINT: [u8; 3] = [158, 158, 158];
const LEADER_TINT: [u8; 3] = [120, 120, 120];
const SELECTED_TINT: [u8; 3] = [255, 255, 255];

/// Text overlaid at a terminal cell
#[derive(Clone, Debug, PartialEq)]
pub struct MarkerLabel {
    pub col: u16,
    pub row: u16,
    pub text: String,
    pub tint: [u8; 3],
    pub bold: bool,
}

#[derive(Default)]
pub struct TerminalSurface {
    next: u32,
    /// `None` while the handle is hidden (idle in the pool)
    slots: HashMap<MarkerHandle, Option<MarkerPlacement>>,
}

impl TerminalSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine tunables for this surface: icons shrink by `ICON_STEP`, so
    /// collision distances shrink with them
    pub fn engine_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.collision = config.collision.scaled(1.0 / ICON_STEP as f64);
        config
    }

    /// Handles the surface currently holds, shown or hidden
    pub fn handle_count(&self) -> usize {
        self.slots.len()
    }

    /// Shown markers, lowest z-order first
    pub fn visible(&self) -> Vec<(MarkerHandle, &MarkerPlacement)> {
        let mut shown: Vec<_> = self
            .slots
            .iter()
            .filter_map(|(h, p)| p.as_ref().map(|p| (*h, p)))
            .collect();
        shown.sort_by_key(|(h, p)| (p.z_order, *h));
        shown
    }

    /// Half the stamped footprint in canvas pixels, plus the slack of a
    /// click landing anywhere in a 2x4 cell
    fn hit_radius(icon: Option<&Arc<MarkerIcon>>) -> f64 {
        let footprint = match icon {
            Some(icon) => (icon.width().max(icon.height()) / ICON_STEP) as f64 / 2.0,
            None => PLACEHOLDER_RADIUS as f64,
        };
        footprint + HIT_SLACK
    }

    /// Click target of the topmost marker under `point` (canvas pixels)
    pub fn hit_test(&self, viewport: &Viewport, point: DVec2) -> Option<ClickTarget> {
        self.visible()
            .into_iter()
            .rev()
            .find(|(_, p)| viewport.project_f(p.position).distance(point) <= Self::hit_radius(p.icon.as_ref()))
            .map(|(_, p)| p.target.clone())
    }

    /// Stamp every shown marker into `canvas`. Returns the text overlays.
    pub fn draw(&self, canvas: &mut BrailleCanvas, viewport: &Viewport) -> Vec<MarkerLabel> {
        let mut labels = Vec::new();
        for (_, placement) in self.visible() {
            let at = viewport.project_f(placement.position);
            if !at.is_finite() {
                continue;
            }
            let (x, y) = (at.x.round() as i32, at.y.round() as i32);
            if !viewport.is_visible(x, y) {
                continue;
            }

            if let Some(anchor) = placement.anchor {
                let (ax, ay) = viewport.project(anchor.lon, anchor.lat);
                draw_line_tinted(canvas, (ax, ay), (x, y), LEADER_TINT);
                draw_marker(canvas, ax, ay, 1, LEADER_TINT);
            }

            let tint = match &placement.icon {
                Some(icon) => {
                    let tint = if placement.selected { SELECTED_TINT } else { icon.tint };
                    stamp_icon(canvas, icon, x, y, tint);
                    tint
                }
                None => {
                    draw_circle(canvas, x, y, PLACEHOLDER_RADIUS, PLACEHOLDER_TINT);
                    PLACEHOLDER_TINT
                }
            };

            let (col, row) = ((x / 2).max(0) as u16, (y / 4).max(0) as u16);
            if let Some(label) = placement.icon.as_ref().and_then(|i| i.label.as_ref()) {
                let half = (label.text.chars().count() / 2) as u16;
                labels.push(MarkerLabel {
                    col: col.saturating_sub(half),
                    row,
                    text: label.text.clone(),
                    tint: [255, 255, 255],
                    bold: true,
                });
            } else if placement.selected {
                if let Some(caption) = &placement.caption {
                    labels.push(MarkerLabel {
                        col: col.saturating_add(3),
                        row,
                        text: caption.clone(),
                        tint,
                        bold: true,
                    });
                }
            }
        }
        labels
    }
}

/// Sample `icon` every `ICON_STEP` pixels and set a dot for each opaque sample,
/// centered on (cx, cy)
fn stamp_icon(canvas: &mut BrailleCanvas, icon: &MarkerIcon, cx: i32, cy: i32, tint: [u8; 3]) {
    let w = (icon.width() / ICON_STEP) as i32;
    let h = (icon.height() / ICON_STEP) as i32;
    let offset = ICON_STEP / 2;
    for oy in 0..h {
        for ox in 0..w {
            let sx = ox as u32 * ICON_STEP + offset;
            let sy = oy as u32 * ICON_STEP + offset;
            if icon.alpha_at(sx, sy) >= ALPHA_THRESHOLD {
                canvas.set_pixel_tinted(cx - w / 2 + ox, cy - h / 2 + oy, tint);
            }
        }
    }
}

impl MarkerSurface for TerminalSurface {
    fn create_marker(&mut self) -> MarkerHandle {
        let handle = MarkerHandle(self.next);
        self.next = self.next.wrapping_add(1);
        self.slots.insert(handle, None);
        handle
    }

    fn destroy_marker(&mut self, handle: MarkerHandle) {
        self.slots.remove(&handle);
    }

    fn reset_marker(&mut self, handle: MarkerHandle) {
        if let Some(slot) = self.slots.get_mut(&handle) {
            *slot = None;
        }
    }

    fn place_marker(&mut self, handle: MarkerHandle, placement: MarkerPlacement) {
        if let Some(slot) = self.slots.get_mut(&handle) {
            *slot = Some(placement);
        }
    }

    fn set_icon(&mut self, handle: MarkerHandle, icon: Arc<MarkerIcon>) {
        if let Some(Some(placement)) = self.slots.get_mut(&handle) {
            placement.icon = Some(icon);
        }
    }
}
