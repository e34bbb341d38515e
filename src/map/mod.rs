mod geometry;
mod projection;
mod renderer;
pub mod spatial;
mod surface;

pub use projection::{Viewport, MAX_ZOOM, MIN_ZOOM};
pub use renderer::{DisplaySettings, LineString, MapLayers, MapRenderer};
pub use surface::{MarkerLabel, TerminalSurface};
