//! Viewport-driven entity loading.
//!
//! Each camera change either falls inside the last loaded area (nothing to
//! do) or schedules a debounced fetch of a buffered radius around the new
//! center. A newer schedule cancels a fetch whose debounce has not fired yet.
//! Results come back over a channel the UI thread drains with `poll`.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::LoaderConfig;
use crate::entity::{EntityFilter, MapEntity};
use crate::error::FetchError;
use crate::geo::GeoPoint;
use crate::surface::{Camera, EntitySource};

/// Region whose entities are already in the snapshot
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoadedArea {
    pub center: GeoPoint,
    pub radius_m: f64,
}

impl LoadedArea {
    pub fn covers(&self, point: &GeoPoint) -> bool {
        self.center.distance_m(point) <= self.radius_m
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LoadDecision {
    /// Center still inside the loaded area
    Covered,
    Scheduled { center: GeoPoint, radius_m: i32 },
}

/// Radius that covers the screen: the farthest edge midpoint plus margin, clamped
pub fn visible_radius(camera: &Camera, config: &LoaderConfig) -> f64 {
    let center = camera.center;
    let farthest = camera
        .bounds
        .edge_midpoints()
        .iter()
        .map(|p| center.distance_m(p))
        .fold(0.0_f64, f64::max);
    (farthest * (1.0 + config.visible_margin)).clamp(config.min_radius_m, config.max_radius_m)
}

/// Radius actually requested from the source
pub fn buffered_radius(visible_m: f64, config: &LoaderConfig) -> f64 {
    (visible_m * config.buffer_factor).min(config.max_radius_m)
}

struct FetchOutcome {
    seq: u64,
    center: GeoPoint,
    radius_m: i32,
    result: Result<Vec<MapEntity>, FetchError>,
}

/// A successfully fetched snapshot
#[derive(Debug)]
pub struct LoadedSnapshot {
    pub area: LoadedArea,
    pub entities: Vec<MapEntity>,
}

pub struct ViewportLoader<E: EntitySource> {
    config: LoaderConfig,
    source: Arc<E>,
    runtime: Handle,
    filter: EntityFilter,
    loaded: Option<LoadedArea>,
    shutdown: CancellationToken,
    /// Debounce of the most recent schedule, until it fires or is superseded
    pending: Option<CancellationToken>,
    seq: u64,
    applied_seq: u64,
    in_flight: usize,
    tx: mpsc::UnboundedSender<FetchOutcome>,
    rx: mpsc::UnboundedReceiver<FetchOutcome>,
}

impl<E: EntitySource> ViewportLoader<E> {
    pub fn new(source: Arc<E>, runtime: Handle, config: LoaderConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            config,
            source,
            runtime,
            filter: EntityFilter::default(),
            loaded: None,
            shutdown: CancellationToken::new(),
            pending: None,
            seq: 0,
            applied_seq: 0,
            in_flight: 0,
            tx,
            rx,
        }
    }

    pub fn loaded_area(&self) -> Option<LoadedArea> {
        self.loaded
    }

    pub fn filter(&self) -> &EntityFilter {
        &self.filter
    }

    /// True while a fetch is debouncing or running
    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    pub fn on_camera_change(&mut self, camera: &Camera) -> LoadDecision {
        if let Some(area) = self.loaded {
            if area.covers(&camera.center) {
                trace!(distance_m = area.center.distance_m(&camera.center), "center inside loaded area");
                return LoadDecision::Covered;
            }
        }

        let visible = visible_radius(camera, &self.config);
        let radius_m = buffered_radius(visible, &self.config).round() as i32;
        self.schedule(camera.center, radius_m);
        LoadDecision::Scheduled {
            center: camera.center,
            radius_m,
        }
    }

    /// Drop the loaded area and refetch with a new filter
    pub fn force_reload(&mut self, filter: EntityFilter, camera: &Camera) -> LoadDecision {
        info!(?filter, "forced reload");
        self.filter = filter;
        self.loaded = None;
        self.on_camera_change(camera)
    }

    fn schedule(&mut self, center: GeoPoint, radius_m: i32) {
        if let Some(previous) = self.pending.take() {
            previous.cancel();
        }
        self.seq += 1;
        self.in_flight += 1;

        let token = self.shutdown.child_token();
        self.pending = Some(token.clone());

        let seq = self.seq;
        let delay = self.config.debounce;
        let source = Arc::clone(&self.source);
        let filter = self.filter.clone();
        let tx = self.tx.clone();
        debug!(seq, radius_m, lat = center.lat, lon = center.lon, "fetch scheduled");

        self.runtime.spawn(async move {
            let result = tokio::select! {
                biased;

                _ = token.cancelled() => Err(FetchError::Superseded),

                _ = tokio::time::sleep(delay) => source.fetch_entities(center, radius_m, &filter).await,
            };
            // Receiver gone means the loader was dropped
            let _ = tx.send(FetchOutcome {
                seq,
                center,
                radius_m,
                result,
            });
        });
    }

    /// Apply finished fetches. Returns the newest successful snapshot, if any.
    pub fn poll(&mut self) -> Option<LoadedSnapshot> {
        let mut latest = None;
        while let Ok(outcome) = self.rx.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            if outcome.seq == self.seq {
                self.pending = None;
            }

            match outcome.result {
                Ok(entities) if outcome.seq > self.applied_seq => {
                    self.applied_seq = outcome.seq;
                    let area = LoadedArea {
                        center: outcome.center,
                        radius_m: outcome.radius_m as f64,
                    };
                    info!(count = entities.len(), radius_m = outcome.radius_m, "entities loaded");
                    self.loaded = Some(area);
                    latest = Some(LoadedSnapshot { area, entities });
                }
                Ok(_) => debug!(seq = outcome.seq, "dropping out-of-order fetch result"),
                Err(FetchError::Superseded) => trace!(seq = outcome.seq, "fetch superseded"),
                Err(e) => warn!(seq = outcome.seq, error = %e, "entity fetch failed"),
            }
        }
        latest
    }
}

impl<E: EntitySource> Drop for ViewportLoader<E> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
