use crate::braille::BrailleCanvas;
use crate::map::geometry::draw_line;
use crate::map::projection::Viewport;
use crate::map::surface::{MarkerLabel, TerminalSurface};

/// A geographic line (sequence of lon/lat coordinates)
pub type LineString = Vec<(f64, f64)>;

/// Display settings for map layers
#[derive(Clone, Debug)]
pub struct DisplaySettings {
    pub show_basemap: bool,
    pub show_markers: bool,
    pub show_labels: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_basemap: true,
            show_markers: true,
            show_labels: true,
        }
    }
}

/// One frame's worth of rasterized layers, back to front
pub struct MapLayers {
    pub basemap: BrailleCanvas,
    pub markers: BrailleCanvas,
    pub labels: Vec<MarkerLabel>,
}

/// Draws the base-map lines and the marker surface
pub struct MapRenderer {
    pub lines: Vec<LineString>,
    pub settings: DisplaySettings,
}

impl MapRenderer {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            settings: DisplaySettings::default(),
        }
    }

    /// Rasterize a frame of `width` x `height` terminal cells
    pub fn render(&self, width: usize, height: usize, viewport: &Viewport, surface: &TerminalSurface) -> MapLayers {
        let mut basemap = BrailleCanvas::new(width, height);
        let mut markers = BrailleCanvas::new(width, height);
        let mut labels = Vec::new();

        if self.settings.show_basemap {
            for line in &self.lines {
                self.draw_linestring(&mut basemap, line, viewport);
            }
        }

        if self.settings.show_markers {
            labels = surface.draw(&mut markers, viewport);
            if !self.settings.show_labels {
                labels.clear();
            }
        }

        MapLayers {
            basemap,
            markers,
            labels,
        }
    }

    /// Draw a linestring with viewport culling
    fn draw_linestring(&self, canvas: &mut BrailleCanvas, line: &LineString, viewport: &Viewport) {
        if line.len() < 2 {
            return;
        }

        let mut prev: Option<(i32, i32)> = None;

        for &(lon, lat) in line {
            let (px, py) = viewport.project(lon, lat);

            if let Some((prev_x, prev_y)) = prev {
                // Segments longer than the screen are antimeridian jumps or off-screen
                let dist = (px - prev_x).unsigned_abs() as usize + (py - prev_y).unsigned_abs() as usize;
                if dist < viewport.width.max(viewport.height) * 4
                    && viewport.line_might_be_visible((prev_x, prev_y), (px, py))
                {
                    draw_line(canvas, prev_x, prev_y, px, py);
                }
            }

            prev = Some((px, py));
        }
    }

    pub fn add_line(&mut self, line: LineString) {
        self.lines.push(line);
    }

    /// Check if any base-map data is loaded
    pub fn has_data(&self) -> bool {
        !self.lines.is_empty()
    }

    pub fn toggle_basemap(&mut self) {
        self.settings.show_basemap = !self.settings.show_basemap;
    }

    pub fn toggle_labels(&mut self) {
        self.settings.show_labels = !self.settings.show_labels;
    }

    pub fn toggle_markers(&mut self) {
        self.settings.show_markers = !self.settings.show_markers;
    }
}

impl Default for MapRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basemap_line_drawn() {
        let mut renderer = MapRenderer::new();
        let vp = Viewport::new(0.0, 0.0, 3.0, 40, 20);
        renderer.add_line(vec![(-5.0, 0.0), (5.0, 0.0)]);
        let layers = renderer.render(20, 5, &vp, &TerminalSurface::new());
        assert!(layers.basemap.rows().any(|r| r.chars().any(|c| c != '\u{2800}')));
        assert!(layers.markers.rows().all(|r| r.chars().all(|c| c == '\u{2800}')));
    }

    #[test]
    fn test_basemap_toggle() {
        let mut renderer = MapRenderer::new();
        let vp = Viewport::new(0.0, 0.0, 3.0, 40, 20);
        renderer.add_line(vec![(-5.0, 0.0), (5.0, 0.0)]);
        renderer.toggle_basemap();
        let layers = renderer.render(20, 5, &vp, &TerminalSurface::new());
        assert!(layers.basemap.rows().all(|r| r.chars().all(|c| c == '\u{2800}')));
    }
}
