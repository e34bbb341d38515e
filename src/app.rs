use std::sync::Arc;
use std::time::Instant;

use glam::DVec2;
use tokio::runtime::Handle;
use tracing::debug;

use tui_pinmap::data::{ContentSource, LocalThumbnails};
use tui_pinmap::engine::{EngineStats, MarkerEngine};
use tui_pinmap::entity::{ContentKind, EntityFilter, MapEntity};
use tui_pinmap::geo::GeoPoint;
use tui_pinmap::interaction::{InteractionEvent, SelectionState, TooltipStyle};
use tui_pinmap::loader::ViewportLoader;
use tui_pinmap::map::{MapRenderer, TerminalSurface, Viewport};

/// Terminal rows outside the map: two border rows, tooltip line, status bar
const CHROME_ROWS: usize = 4;
/// Terminal columns outside the map: two border columns
const CHROME_COLS: usize = 2;
/// Titles listed in a cluster tooltip before eliding
const CLUSTER_PREVIEW: usize = 3;

/// Where `r` takes the camera back to
#[derive(Clone, Copy, Debug)]
pub struct Home {
    pub center: GeoPoint,
    pub zoom: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Tooltip {
    pub text: String,
    pub style: TooltipStyle,
}

/// Application state
pub struct App {
    pub viewport: Viewport,
    pub map_renderer: MapRenderer,
    pub engine: MarkerEngine<TerminalSurface>,
    loader: ViewportLoader<ContentSource>,
    filter: EntityFilter,
    home: Home,
    pub should_quit: bool,
    /// Last mouse position for drag tracking
    pub last_mouse: Option<(u16, u16)>,
    /// The left button moved while down; releasing it is not a click
    dragged: bool,
    /// Current mouse position for cursor marker
    pub mouse_pos: Option<(u16, u16)>,
    pub tooltip: Option<Tooltip>,
    /// Focus tooltip shown next to a selected marker's
    pub focus_tooltip: Option<Tooltip>,
}

/// Braille canvas size for a terminal of `width` x `height` cells
fn canvas_size(width: usize, height: usize) -> (usize, usize) {
    let inner_width = width.saturating_sub(CHROME_COLS);
    let inner_height = height.saturating_sub(CHROME_ROWS);
    (inner_width * 2, inner_height * 4)
}

/// Terminal cell to the canvas pixel at the cell's top-left dot.
/// Accounts for the 1-cell border.
fn cell_to_pixel(col: u16, row: u16) -> (i32, i32) {
    ((col.saturating_sub(1)) as i32 * 2, (row.saturating_sub(1)) as i32 * 4)
}

/// One-line summary of an entity for the tooltip
pub fn describe(entity: &MapEntity) -> String {
    match entity {
        MapEntity::Content(c) => {
            let mut text = format!(
                "[{}] {}  ♥ {}  ✉ {}",
                c.kind.label(),
                c.title,
                c.like_count,
                c.comment_count
            );
            if !c.body.is_empty() {
                text.push_str(" · ");
                text.push_str(&c.body);
            }
            text
        }
        MapEntity::Record(r) => format!(
            "♪ {}  {}:{:02}  ▶ {}",
            r.title,
            r.duration_secs / 60,
            r.duration_secs % 60,
            r.play_count
        ),
    }
}

impl App {
    pub fn new(
        width: usize,
        height: usize,
        home: Home,
        source: ContentSource,
        thumbnails: LocalThumbnails,
        runtime: Handle,
    ) -> Self {
        let config = TerminalSurface::engine_config();
        let mut engine = MarkerEngine::new(TerminalSurface::new(), config.clone());
        engine.enable_thumbnails(thumbnails, runtime.clone());
        let loader = ViewportLoader::new(Arc::new(source), runtime, config.loader);

        let (pixel_width, pixel_height) = canvas_size(width, height);
        let mut app = Self {
            viewport: Viewport::new(home.center.lon, home.center.lat, home.zoom, pixel_width, pixel_height),
            map_renderer: MapRenderer::new(),
            engine,
            loader,
            filter: EntityFilter::default(),
            home,
            should_quit: false,
            last_mouse: None,
            dragged: false,
            mouse_pos: None,
            tooltip: None,
            focus_tooltip: None,
        };
        app.camera_moved();
        app
    }

    /// Update viewport size when terminal resizes
    pub fn resize(&mut self, width: usize, height: usize) {
        let (pixel_width, pixel_height) = canvas_size(width, height);
        self.viewport.width = pixel_width;
        self.viewport.height = pixel_height;
        self.camera_moved();
    }

    /// Tell the engine and the loader where the camera is now
    fn camera_moved(&mut self) {
        let camera = self.viewport.camera();
        let events = self.engine.camera_changed(camera, Instant::now());
        self.apply_events(&events);
        self.loader.on_camera_change(&camera);
    }

    fn apply_events(&mut self, events: &[InteractionEvent]) {
        for event in events {
            debug!(?event, "interaction");
        }
        self.refresh_tooltip();
    }

    fn refresh_tooltip(&mut self) {
        let interaction = self.engine.interaction();
        let tooltip = match self.engine.selection() {
            SelectionState::ClusterSelected(ids) => Some(Tooltip {
                text: self.describe_cluster(ids),
                style: TooltipStyle::Selected,
            }),
            _ => interaction.tooltip().and_then(|tip| self.entity_tooltip(tip)),
        };
        // Focus rides beside the selection only
        let focus = match tooltip {
            Some(Tooltip { style: TooltipStyle::Selected, .. }) => {
                interaction.focus_tooltip().and_then(|tip| self.entity_tooltip(tip))
            }
            _ => None,
        };
        self.tooltip = tooltip;
        self.focus_tooltip = focus;
    }

    fn entity_tooltip(&self, (id, style): (u64, TooltipStyle)) -> Option<Tooltip> {
        self.engine.entity(id).map(|entity| Tooltip {
            text: describe(entity),
            style,
        })
    }

    fn describe_cluster(&self, ids: &[u64]) -> String {
        let titles: Vec<&str> = ids
            .iter()
            .filter_map(|id| self.engine.entity(*id))
            .map(|e| e.title())
            .take(CLUSTER_PREVIEW)
            .collect();
        let more = if ids.len() > CLUSTER_PREVIEW { ", …" } else { "" };
        format!("{} items: {}{}", ids.len(), titles.join(", "), more)
    }

    /// Per-frame work: land fetched snapshots and thumbnails, paint one batch
    pub fn update(&mut self, now: Instant) {
        if let Some(snapshot) = self.loader.poll() {
            debug!(
                count = snapshot.entities.len(),
                radius_m = snapshot.area.radius_m,
                "snapshot landed"
            );
            self.engine.replace_snapshot(snapshot.entities);
            self.refresh_tooltip();
        }
        self.engine.apply_thumbnails();

        let outcome = self.engine.tick(now, &self.viewport);
        if !outcome.events.is_empty() {
            self.apply_events(&outcome.events);
        }
    }

    /// Pan the map
    pub fn pan(&mut self, dx: i32, dy: i32) {
        self.viewport.pan(dx, dy);
        self.camera_moved();
    }

    /// Zoom in
    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
        self.camera_moved();
    }

    /// Zoom out
    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
        self.camera_moved();
    }

    /// Zoom in towards a screen position (terminal column/row)
    pub fn zoom_in_at(&mut self, col: u16, row: u16) {
        let (px, py) = cell_to_pixel(col, row);
        self.viewport.zoom_in_at(px, py);
        self.camera_moved();
    }

    /// Zoom out from a screen position (terminal column/row)
    pub fn zoom_out_at(&mut self, col: u16, row: u16) {
        let (px, py) = cell_to_pixel(col, row);
        self.viewport.zoom_out_at(px, py);
        self.camera_moved();
    }

    /// Select whatever marker is under the cell, or clear the selection
    pub fn click(&mut self, col: u16, row: u16) {
        let (px, py) = cell_to_pixel(col, row);
        // Middle of the 2x4 dot block
        let point = DVec2::new(px as f64 + 1.0, py as f64 + 2.0);
        let events = match self.engine.surface().hit_test(&self.viewport, point) {
            Some(target) => self.engine.handle_click(&target),
            None => self.engine.background_click(),
        };
        self.apply_events(&events);
    }

    /// Show or hide one content kind (`index` into `ContentKind::ALL`)
    pub fn toggle_kind(&mut self, index: usize) {
        if let Some(kind) = ContentKind::ALL.get(index) {
            self.filter.toggle_kind(*kind);
            self.filter_changed();
        }
    }

    pub fn toggle_records(&mut self) {
        self.filter.toggle_records();
        self.filter_changed();
    }

    fn filter_changed(&mut self) {
        self.engine.set_filter(self.filter.clone());
        self.loader.force_reload(self.filter.clone(), &self.viewport.camera());
    }

    /// Back to the starting camera with every marker released and the
    /// default filter
    pub fn reset(&mut self) {
        let events = self.engine.clear();
        self.viewport = Viewport::new(
            self.home.center.lon,
            self.home.center.lat,
            self.home.zoom,
            self.viewport.width,
            self.viewport.height,
        );
        self.filter = EntityFilter::default();
        self.engine.set_filter(self.filter.clone());
        self.loader.force_reload(self.filter.clone(), &self.viewport.camera());
        self.apply_events(&events);
        self.camera_moved();
    }

    /// Request quit
    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn filter(&self) -> &EntityFilter {
        &self.filter
    }

    pub fn is_loading(&self) -> bool {
        self.loader.is_loading()
    }

    pub fn stats(&self) -> EngineStats {
        self.engine.stats()
    }

    /// Get current zoom level as a string
    pub fn zoom_level(&self) -> String {
        format!("z{:.1}", self.viewport.zoom)
    }

    /// Get current center coordinates as a string
    pub fn center_coords(&self) -> String {
        format!(
            "{:.4}°{}, {:.4}°{}",
            self.viewport.center_lat.abs(),
            if self.viewport.center_lat >= 0.0 { "N" } else { "S" },
            self.viewport.center_lon.abs(),
            if self.viewport.center_lon >= 0.0 { "E" } else { "W" }
        )
    }

    pub fn selection_status(&self) -> String {
        match self.engine.selection() {
            SelectionState::None => "-".to_string(),
            SelectionState::MarkerSelected(id) => format!("#{id}"),
            SelectionState::ClusterSelected(ids) => format!("{} grouped", ids.len()),
        }
    }

    /// Pan by the cells moved since the last drag event
    pub fn handle_drag(&mut self, x: u16, y: u16) {
        if let Some((last_x, last_y)) = self.last_mouse {
            let dx = last_x as i32 - x as i32;
            let dy = last_y as i32 - y as i32;
            if dx != 0 || dy != 0 {
                self.dragged = true;
                self.pan(dx * 2, dy * 4);
            }
        }
        self.last_mouse = Some((x, y));
    }

    pub fn begin_press(&mut self, x: u16, y: u16) {
        self.last_mouse = Some((x, y));
        self.dragged = false;
    }

    /// Mouse released: a press without drag is a click
    pub fn end_press(&mut self, x: u16, y: u16) {
        if self.last_mouse.is_some() && !self.dragged {
            self.click(x, y);
        }
        self.last_mouse = None;
        self.dragged = false;
    }

    /// Update mouse cursor position
    pub fn set_mouse_pos(&mut self, col: u16, row: u16) {
        self.mouse_pos = Some((col, row));
    }

    /// Get mouse position in braille pixel coordinates (for rendering marker)
    pub fn mouse_pixel_pos(&self) -> Option<(i32, i32)> {
        self.mouse_pos.map(|(col, row)| cell_to_pixel(col, row))
    }
}
