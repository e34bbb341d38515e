//! Interfaces between the marker engine and its collaborators: the host
//! rendering surface, the host projection, and the async data sources.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use glam::DVec2;

use crate::entity::{EntityFilter, MapEntity};
use crate::error::{FetchError, ImageError};
use crate::geo::{Bounds, GeoPoint};
use crate::icon::MarkerIcon;

/// Screen position in host pixels, origin top-left
pub type ScreenPoint = DVec2;

/// Opaque marker resource owned by the host surface
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerHandle(pub u32);

impl fmt::Display for MarkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a click on a placed marker reports back
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClickTarget {
    Entity(u64),
    Cluster(Vec<u64>),
}

/// Everything the host needs to show one marker
#[derive(Clone, Debug)]
pub struct MarkerPlacement {
    /// Where the marker is drawn (after any collision offset)
    pub position: GeoPoint,
    /// The entity's own position when the marker was pushed away from it
    pub anchor: Option<GeoPoint>,
    /// `None` while an asynchronous icon is still pending
    pub icon: Option<Arc<MarkerIcon>>,
    pub z_order: i32,
    pub caption: Option<String>,
    pub target: ClickTarget,
    /// Highlighted as the current selection
    pub selected: bool,
}

/// Host rendering surface. The marker pool is the only caller of
/// `create_marker`/`destroy_marker`.
pub trait MarkerSurface {
    /// Allocate a hidden marker
    fn create_marker(&mut self) -> MarkerHandle;

    /// Free a marker for good
    fn destroy_marker(&mut self, handle: MarkerHandle);

    /// Hide the marker and restore every visual property to its default
    /// (z-order, opacity, caption, click target, icon)
    fn reset_marker(&mut self, handle: MarkerHandle);

    /// Show the marker with the given placement
    fn place_marker(&mut self, handle: MarkerHandle, placement: MarkerPlacement);

    /// Swap the icon of an already placed marker
    fn set_icon(&mut self, handle: MarkerHandle, icon: Arc<MarkerIcon>);
}

/// Host projection between geographic and screen space
pub trait Projection {
    fn project_to_screen(&self, point: GeoPoint) -> ScreenPoint;
    fn project_from_screen(&self, screen: ScreenPoint) -> GeoPoint;
}

/// Camera state polled on every camera-change notification
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub center: GeoPoint,
    pub zoom: f64,
    /// Geographic region covered by the screen
    pub bounds: Bounds,
    /// Screen size in pixels
    pub screen_size: DVec2,
}

/// External content source
pub trait EntitySource: Send + Sync + 'static {
    fn fetch_entities(
        &self,
        center: GeoPoint,
        radius_m: i32,
        filter: &EntityFilter,
    ) -> impl Future<Output = Result<Vec<MapEntity>, FetchError>> + Send;
}

/// External thumbnail source returning encoded image bytes
pub trait ThumbnailSource: Send + Sync + 'static {
    fn fetch_thumbnail(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, ImageError>> + Send;
}
