//! Per-surface marker engine.
//!
//! Owns the spatial indexes, the handle pool, the icon pipeline, the render
//! scheduler, the collision resolver and the selection state machine for one
//! map surface. Everything here runs on the UI thread; background work
//! (thumbnails) reports back through `apply_thumbnails`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use tokio::runtime::Handle;
use tracing::{debug, info, trace, warn};

use crate::cluster::{Cluster, DistanceClusterer};
use crate::collision::CollisionResolver;
use crate::config::EngineConfig;
use crate::entity::{EntityFilter, EntityRef, MapEntity};
use crate::geo::Bounds;
use crate::icon::thumbnail::{ThumbnailLoader, ThumbnailState};
use crate::icon::{IconFactory, MarkerIcon};
use crate::interaction::{InteractionController, InteractionEvent, SelectionState};
use crate::map::spatial::{QuadTree, QuadTreeStats};
use crate::pool::{MarkerPool, PoolStats};
use crate::render::{rank, RenderScheduler, ScoredCandidate};
use crate::surface::{
    Camera, ClickTarget, MarkerHandle, MarkerPlacement, MarkerSurface, Projection, ScreenPoint, ThumbnailSource,
};
use crate::timing::{Debounce, Throttle};

/// Z-order bands: selection above clusters above plain markers
const Z_SELECTED: i32 = 30_000;
const Z_CLUSTER: i32 = 20_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Layer {
    Posts,
    Records,
}

/// Identity of a marker across passes. A singleton is keyed by its entity;
/// a cluster by its seed and size, so a cluster that gains or loses members
/// gets a fresh marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MarkerKey {
    pub layer: Layer,
    pub seed: u64,
    pub size: usize,
}

impl MarkerKey {
    fn of(cluster: &Cluster) -> Self {
        let seed = cluster.seed();
        Self {
            layer: if seed.is_record() { Layer::Records } else { Layer::Posts },
            seed: seed.id(),
            size: cluster.len(),
        }
    }
}

/// Diagnostics for the status bar
#[derive(Clone, Debug, Default)]
pub struct EngineStats {
    pub pool: PoolStats,
    pub posts: QuadTreeStats,
    pub records: QuadTreeStats,
    pub markers: usize,
    pub generation: u64,
    /// (painted, total) of the pass in flight
    pub progress: Option<(usize, usize)>,
    pub pending_thumbnails: usize,
    pub cached_thumbnails: usize,
}

/// What one `tick` did
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub pass_started: bool,
    pub painted: usize,
    /// Focus updates from a camera change that was held back by the throttle
    pub events: Vec<InteractionEvent>,
}

pub struct MarkerEngine<S: MarkerSurface> {
    config: EngineConfig,
    surface: S,
    posts: QuadTree<EntityRef>,
    records: QuadTree<EntityRef>,
    by_id: HashMap<u64, EntityRef>,
    filter: EntityFilter,
    clusterer: DistanceClusterer,
    pool: MarkerPool,
    icons: IconFactory,
    thumbnails: Option<ThumbnailLoader>,
    scheduler: RenderScheduler,
    resolver: CollisionResolver,
    interaction: InteractionController,
    markers: HashMap<MarkerKey, MarkerHandle>,
    /// POI markers still waiting for their thumbnail, by URL
    awaiting_icon: HashMap<String, Vec<MarkerKey>>,
    /// Screen positions placed so far in the current pass
    placed: Vec<ScreenPoint>,
    collision_active: bool,
    camera: Option<Camera>,
    throttle: Throttle,
    recluster: Debounce,
    /// Snapshot, filter or selection changed; re-render without waiting
    dirty: bool,
}

impl<S: MarkerSurface> MarkerEngine<S> {
    pub fn new(surface: S, config: EngineConfig) -> Self {
        Self {
            surface,
            posts: QuadTree::empty(),
            records: QuadTree::empty(),
            by_id: HashMap::new(),
            filter: EntityFilter::default(),
            clusterer: DistanceClusterer::new(config.cluster.max_zoom),
            pool: MarkerPool::new(config.pool.clone()),
            icons: IconFactory::new(),
            thumbnails: None,
            scheduler: RenderScheduler::new(config.render.clone()),
            resolver: CollisionResolver::new(config.collision.clone()),
            interaction: InteractionController::new(),
            markers: HashMap::new(),
            awaiting_icon: HashMap::new(),
            placed: Vec::new(),
            collision_active: false,
            camera: None,
            throttle: Throttle::new(config.cluster.camera_throttle),
            recluster: Debounce::new(config.cluster.recluster_debounce),
            dirty: false,
            config,
        }
    }

    /// Fetch POI thumbnails from `source` on `runtime`. Without this, POIs
    /// show their kind dot.
    pub fn enable_thumbnails<T: ThumbnailSource>(&mut self, source: T, runtime: Handle) -> bool {
        self.thumbnails = ThumbnailLoader::new(source, runtime, &mut self.icons);
        if self.thumbnails.is_none() {
            warn!("thumbnail ring geometry unavailable, POIs keep plain icons");
        }
        self.thumbnails.is_some()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn selection(&self) -> &SelectionState {
        self.interaction.state()
    }

    pub fn interaction(&self) -> &InteractionController {
        &self.interaction
    }

    pub fn filter(&self) -> &EntityFilter {
        &self.filter
    }

    pub fn entity(&self, id: u64) -> Option<&EntityRef> {
        self.by_id.get(&id)
    }

    pub fn entity_count(&self) -> usize {
        self.by_id.len()
    }

    /// Swap in a new entity snapshot and rebuild both indexes
    pub fn replace_snapshot(&mut self, entities: Vec<MapEntity>) {
        let (records, posts): (Vec<EntityRef>, Vec<EntityRef>) =
            entities.into_iter().map(Arc::new).partition(|e| e.is_record());

        self.by_id = posts.iter().chain(records.iter()).map(|e| (e.id(), e.clone())).collect();
        self.posts = QuadTree::build(posts);
        self.records = QuadTree::build(records);
        info!(
            posts = self.posts.len(),
            records = self.records.len(),
            "entity snapshot replaced"
        );
        self.dirty = true;
    }

    pub fn set_filter(&mut self, filter: EntityFilter) {
        if filter != self.filter {
            self.filter = filter;
            self.dirty = true;
        }
    }

    /// Notify a camera move. Throttled; the latest camera is always picked
    /// up by a later `tick`.
    pub fn camera_changed(&mut self, camera: Camera, now: Instant) -> Vec<InteractionEvent> {
        self.camera = Some(camera);
        if !self.throttle.offer(now) {
            trace!("camera change throttled");
            return Vec::new();
        }
        self.apply_camera(now)
    }

    fn apply_camera(&mut self, now: Instant) -> Vec<InteractionEvent> {
        let Some(camera) = self.camera else {
            return Vec::new();
        };
        self.recluster.touch(now);
        let nearest = self.nearest_to_center(&camera);
        self.interaction.camera_changed(nearest)
    }

    /// Id of the visible, filtered entity closest to the view center
    pub fn nearest_to_center(&self, camera: &Camera) -> Option<u64> {
        let center = camera.center;
        self.candidates(&camera.bounds)
            .into_iter()
            .chain(self.record_candidates(&camera.bounds))
            .map(|e| (center.distance_m(&e.position()), e))
            .filter(|(d, _)| !d.is_nan())
            .min_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.id().cmp(&b.1.id())))
            .map(|(_, e)| e.id())
    }

    fn candidates(&self, range: &Bounds) -> Vec<EntityRef> {
        self.posts
            .query_range(range)
            .into_iter()
            .filter(|e| self.filter.accepts(e))
            .cloned()
            .collect()
    }

    fn record_candidates(&self, range: &Bounds) -> Vec<EntityRef> {
        if !self.filter.show_records {
            return Vec::new();
        }
        self.records.query_range(range).into_iter().cloned().collect()
    }

    /// Start a render pass for `camera`: cluster the candidates, release the
    /// markers that no longer have a key, and queue the rest by priority.
    pub fn begin_pass(&mut self, camera: Camera) -> u64 {
        let range = camera.bounds.expand(self.config.render.candidate_margin);
        let posts = self.candidates(&range);
        let records = self.record_candidates(&range);

        let mut clusters = self.clusterer.cluster(&posts, camera.zoom);
        clusters.extend(self.clusterer.cluster(&records, camera.zoom));

        let keep: HashSet<MarkerKey> = clusters.iter().map(MarkerKey::of).collect();
        let stale: Vec<MarkerKey> = self.markers.keys().filter(|k| !keep.contains(k)).copied().collect();
        for key in &stale {
            self.release_marker(key);
        }

        self.placed.clear();
        self.collision_active = self.resolver.is_active(camera.zoom);
        self.camera = Some(camera);
        self.dirty = false;

        let ranked = rank(clusters, &camera);
        let candidates = ranked.len();
        let generation = self.scheduler.start(ranked);
        debug!(
            generation,
            candidates,
            released = stale.len(),
            zoom = camera.zoom,
            collision = self.collision_active,
            "render pass started"
        );
        generation
    }

    fn release_marker(&mut self, key: &MarkerKey) {
        if let Some(handle) = self.markers.remove(key) {
            if let Err(e) = self.pool.release(&mut self.surface, handle) {
                debug_assert!(false, "engine released a handle it did not hold: {e}");
                warn!(error = %e, "marker release rejected");
            }
        }
    }

    /// Advance timers and paint at most one batch
    pub fn tick(&mut self, now: Instant, projection: &impl Projection) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        if self.throttle.poll_trailing(now) {
            outcome.events = self.apply_camera(now);
        }
        let reclustered = self.recluster.poll(now);
        if reclustered || self.dirty {
            if let Some(camera) = self.camera {
                self.begin_pass(camera);
                outcome.pass_started = true;
            }
        }

        if let Some(batch) = self.scheduler.next_batch(now) {
            if self.scheduler.is_current(batch.generation) {
                for candidate in &batch.items {
                    self.paint(candidate, projection);
                }
                outcome.painted = batch.items.len();
                trace!(generation = batch.generation, index = batch.index, painted = outcome.painted, "batch painted");
            }
            self.pool.maintain(&mut self.surface);
        }
        outcome
    }

    fn paint(&mut self, candidate: &ScoredCandidate, projection: &impl Projection) {
        let cluster = &candidate.cluster;
        let key = MarkerKey::of(cluster);
        let handle = match self.markers.get(&key) {
            Some(handle) => *handle,
            None => {
                let handle = self.pool.acquire(&mut self.surface);
                self.markers.insert(key, handle);
                handle
            }
        };

        let placement = if cluster.is_singleton() {
            self.entity_placement(key, cluster.seed().clone(), candidate.score, projection)
        } else {
            self.cluster_placement(key, cluster, candidate.score)
        };

        self.placed.push(projection.project_to_screen(placement.position));
        self.surface.place_marker(handle, placement);
    }

    fn cluster_placement(&mut self, key: MarkerKey, cluster: &Cluster, score: u32) -> MarkerPlacement {
        let icon = self
            .icons
            .cluster_icon(cluster.len(), key.layer == Layer::Records)
            .map(Arc::new);
        MarkerPlacement {
            position: cluster.centroid,
            anchor: None,
            icon,
            z_order: Z_CLUSTER + score as i32,
            caption: None,
            target: ClickTarget::Cluster(cluster.member_ids()),
            selected: false,
        }
    }

    fn entity_placement(
        &mut self,
        key: MarkerKey,
        entity: EntityRef,
        score: u32,
        projection: &impl Projection,
    ) -> MarkerPlacement {
        let own = entity.position();
        let mut position = own;
        let mut anchor = None;

        if entity.is_point_of_interest() && self.collision_active {
            let placement = self.resolver.resolve(own, &self.placed, projection);
            if placement.displaced {
                position = placement.position;
                anchor = Some(own);
            }
        }

        let selected = self.interaction.selected_marker() == Some(entity.id());
        let z_order = if selected { Z_SELECTED } else { score as i32 };

        MarkerPlacement {
            position,
            anchor,
            icon: self.entity_icon(key, &entity),
            z_order,
            caption: Some(entity.title().to_string()),
            target: ClickTarget::Entity(entity.id()),
            selected,
        }
    }

    /// Kind dot, or the POI thumbnail when a loader is attached. A pending or
    /// failed thumbnail leaves the marker bare.
    fn entity_icon(&mut self, key: MarkerKey, entity: &MapEntity) -> Option<Arc<MarkerIcon>> {
        match (entity.thumbnail_url(), self.thumbnails.as_mut()) {
            (Some(url), Some(loader)) => match loader.lookup(url) {
                ThumbnailState::Ready(icon) => Some(icon),
                ThumbnailState::Pending => {
                    let waiting = self.awaiting_icon.entry(url.to_string()).or_default();
                    if !waiting.contains(&key) {
                        waiting.push(key);
                    }
                    None
                }
                ThumbnailState::Failed => None,
            },
            _ => self.icons.entity_icon(entity),
        }
    }

    /// Hand finished thumbnails to the markers waiting on them. Returns how
    /// many markers got an icon.
    pub fn apply_thumbnails(&mut self) -> usize {
        let Some(loader) = self.thumbnails.as_mut() else {
            return 0;
        };
        let landed = loader.drain();
        let mut applied = 0;
        for (url, icon) in landed {
            for key in self.awaiting_icon.remove(&url).unwrap_or_default() {
                if let Some(handle) = self.markers.get(&key) {
                    self.surface.set_icon(*handle, icon.clone());
                    applied += 1;
                }
            }
        }
        // Failed URLs never land; stop tracking markers that are gone
        self.awaiting_icon
            .retain(|_, keys| keys.iter().any(|k| self.markers.contains_key(k)));
        applied
    }

    pub fn handle_click(&mut self, target: &ClickTarget) -> Vec<InteractionEvent> {
        let events = match target {
            ClickTarget::Entity(id) => self.interaction.click_marker(*id),
            ClickTarget::Cluster(ids) => self.interaction.click_cluster(ids.clone()),
        };
        self.dirty = true;
        events
    }

    pub fn background_click(&mut self) -> Vec<InteractionEvent> {
        let events = self.interaction.click_background();
        if !events.is_empty() {
            self.dirty = true;
        }
        events
    }

    /// Release every marker and clear the selection
    pub fn clear(&mut self) -> Vec<InteractionEvent> {
        self.scheduler.cancel();
        let keys: Vec<MarkerKey> = self.markers.keys().copied().collect();
        for key in &keys {
            self.release_marker(key);
        }
        self.awaiting_icon.clear();
        if let Some(thumbnails) = self.thumbnails.as_mut() {
            thumbnails.clear();
        }
        self.pool.drain_idle(&mut self.surface);
        self.interaction.reset()
    }

    pub fn is_rendering(&self) -> bool {
        !self.scheduler.is_idle()
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            pool: self.pool.stats(),
            posts: self.posts.stats(),
            records: self.records.stats(),
            markers: self.markers.len(),
            generation: self.scheduler.generation(),
            progress: self.scheduler.progress(),
            pending_thumbnails: self.thumbnails.as_ref().map_or(0, |t| t.pending_count()),
            cached_thumbnails: self.thumbnails.as_ref().map_or(0, |t| t.cached_count()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap as Map;
    use std::time::Duration;

    use glam::DVec2;

    use super::*;
    use crate::entity::fixtures::{poi, post, record};
    use crate::entity::ContentKind;
    use crate::geo::GeoPoint;
    use crate::icon::thumbnail::test_support::{png_bytes, MapThumbnails};
    use crate::pool::test_surface::RecordingSurface;

    /// 1 pixel per 1e-5 degree around the origin
    struct Flat;

    impl Projection for Flat {
        fn project_to_screen(&self, p: GeoPoint) -> ScreenPoint {
            DVec2::new(p.lon * 1e5, -p.lat * 1e5)
        }

        fn project_from_screen(&self, s: ScreenPoint) -> GeoPoint {
            GeoPoint::new(-s.y / 1e5, s.x / 1e5)
        }
    }

    fn camera(zoom: f64) -> Camera {
        let center = GeoPoint::new(0.0, 0.0);
        Camera {
            center,
            zoom,
            bounds: Bounds::around(center, 2_000.0),
            screen_size: DVec2::new(800.0, 600.0),
        }
    }

    fn snapshot(refs: Vec<EntityRef>) -> Vec<MapEntity> {
        refs.into_iter().map(|e| (*e).clone()).collect()
    }

    fn engine() -> MarkerEngine<RecordingSurface> {
        MarkerEngine::new(RecordingSurface::default(), EngineConfig::default())
    }

    /// Run ticks a frame apart until the pass is fully painted
    fn drain(engine: &mut MarkerEngine<RecordingSurface>, mut now: Instant) -> Instant {
        for _ in 0..1_000 {
            engine.tick(now, &Flat);
            now += Duration::from_millis(16);
            if !engine.is_rendering() {
                break;
            }
        }
        now
    }

    #[test]
    fn test_empty_snapshot_paints_nothing() {
        let mut engine = engine();
        engine.replace_snapshot(Vec::new());
        engine.begin_pass(camera(15.0));
        assert!(!engine.is_rendering());
        assert_eq!(engine.tick(Instant::now(), &Flat).painted, 0);
        assert_eq!(engine.stats().pool.created, 0);
    }

    #[test]
    fn test_pass_clusters_posts_and_records_separately() {
        let mut engine = engine();
        engine.replace_snapshot(snapshot(vec![
            post(1, 0.0, 0.0, ContentKind::Hot),
            post(2, 0.0, 0.0001, ContentKind::Info),
            record(3, 0.0, 0.00005),
            post(4, 0.01, 0.01, ContentKind::Free),
        ]));
        engine.begin_pass(camera(15.0));
        drain(&mut engine, Instant::now());

        let surface = engine.surface();
        let placed: Vec<_> = surface.placed().collect();
        assert_eq!(placed.len(), 3);
        let badge = placed
            .iter()
            .find(|p| matches!(&p.target, ClickTarget::Cluster(ids) if ids.len() == 2))
            .unwrap();
        assert_eq!(badge.icon.as_ref().unwrap().label.as_ref().unwrap().text, "2");
        assert!(placed.iter().any(|p| p.target == ClickTarget::Entity(3)));
        assert!(placed.iter().any(|p| p.target == ClickTarget::Entity(4)));
    }

    #[test]
    fn test_large_set_paints_in_batches() {
        let mut engine = engine();
        let entities: Vec<_> = (0..60)
            .map(|i| post(i, (i as f64) * 0.0005 - 0.015, 0.0, ContentKind::Info))
            .collect();
        engine.replace_snapshot(snapshot(entities));
        engine.begin_pass(camera(19.0));

        let t0 = Instant::now();
        assert_eq!(engine.tick(t0, &Flat).painted, 25);
        assert_eq!(engine.tick(t0 + Duration::from_millis(1), &Flat).painted, 0);
        assert_eq!(engine.tick(t0 + Duration::from_millis(16), &Flat).painted, 25);
        assert_eq!(engine.tick(t0 + Duration::from_millis(32), &Flat).painted, 10);
        assert_eq!(engine.surface().placed().count(), 60);
    }

    #[test]
    fn test_pass_reconciles_markers() {
        let mut engine = engine();
        engine.replace_snapshot(snapshot(vec![
            post(1, 0.0, 0.0, ContentKind::Hot),
            post(2, 0.001, 0.0, ContentKind::Hot),
        ]));
        engine.begin_pass(camera(19.0));
        let t = drain(&mut engine, Instant::now());
        assert_eq!(engine.stats().markers, 2);

        // Entity 2 disappears; its marker goes back to the pool
        engine.replace_snapshot(snapshot(vec![post(1, 0.0, 0.0, ContentKind::Hot)]));
        engine.begin_pass(camera(19.0));
        drain(&mut engine, t);

        let stats = engine.stats();
        assert_eq!(stats.markers, 1);
        assert_eq!(stats.pool.returned, 1);
        assert_eq!(stats.pool.active, 1);
        assert_eq!(engine.surface().placed().count(), 1);
    }

    #[test]
    fn test_superseded_pass_stops_painting() {
        let mut engine = engine();
        let entities: Vec<_> = (0..60)
            .map(|i| post(i, (i as f64) * 0.0005 - 0.015, 0.0, ContentKind::Info))
            .collect();
        engine.replace_snapshot(snapshot(entities));
        let t0 = Instant::now();
        engine.begin_pass(camera(19.0));
        engine.tick(t0, &Flat);

        engine.replace_snapshot(Vec::new());
        let outcome = engine.tick(t0 + Duration::from_millis(16), &Flat);
        assert!(outcome.pass_started);
        assert_eq!(outcome.painted, 0);
        let stats = engine.stats();
        assert_eq!(stats.markers, 0);
        assert_eq!(stats.pool.active, 0);
        assert_eq!(stats.pool.returned, 25);
    }

    #[test]
    fn test_poi_collision_offsets_marker() {
        let mut engine = engine();
        // 5 px apart on the flat projection, both POIs
        engine.replace_snapshot(snapshot(vec![
            poi(1, 0.0, 0.0, "a.png"),
            poi(2, 0.0, 0.00005, "b.png"),
        ]));
        engine.begin_pass(camera(19.0));
        drain(&mut engine, Instant::now());

        let placed: Vec<_> = engine.surface().placed().collect();
        assert_eq!(placed.len(), 2);
        let moved: Vec<_> = placed.iter().filter(|p| p.anchor.is_some()).collect();
        assert_eq!(moved.len(), 1);
        let a = Flat.project_to_screen(placed[0].position);
        let b = Flat.project_to_screen(placed[1].position);
        assert!(a.distance(b) > 60.0);

        // Below the threshold the resolver is off
        engine.begin_pass(camera(18.5));
        drain(&mut engine, Instant::now());
        assert!(engine.surface().placed().all(|p| p.anchor.is_none()));
    }

    #[test]
    fn test_click_marks_selection_and_repaints() {
        let mut engine = engine();
        engine.replace_snapshot(snapshot(vec![post(7, 0.0, 0.0, ContentKind::Notice)]));
        engine.begin_pass(camera(19.0));
        let t = drain(&mut engine, Instant::now());

        engine.handle_click(&ClickTarget::Entity(7));
        assert_eq!(engine.selection(), &SelectionState::MarkerSelected(7));
        drain(&mut engine, t);
        let placed: Vec<_> = engine.surface().placed().collect();
        assert!(placed[0].selected);
        assert_eq!(placed[0].z_order, Z_SELECTED);

        engine.background_click();
        assert_eq!(engine.selection(), &SelectionState::None);
        assert!(engine.background_click().is_empty());
    }

    #[test]
    fn test_camera_throttle_and_recluster_debounce() {
        let mut engine = engine();
        engine.replace_snapshot(snapshot(vec![post(1, 0.0, 0.0, ContentKind::Hot)]));
        let t0 = Instant::now();
        // Consume the snapshot's immediate pass
        engine.camera_changed(camera(15.0), t0);
        engine.tick(t0, &Flat);

        let events = engine.camera_changed(camera(15.5), t0 + Duration::from_millis(50));
        assert!(events.is_empty());
        // Not yet: throttle trailing edge at 200 ms, then 300 ms quiet period
        assert!(!engine.tick(t0 + Duration::from_millis(250), &Flat).pass_started);
        assert!(engine.tick(t0 + Duration::from_millis(560), &Flat).pass_started);
    }

    #[test]
    fn test_nearest_to_center_respects_filter() {
        let mut engine = engine();
        engine.replace_snapshot(snapshot(vec![
            post(1, 0.0001, 0.0, ContentKind::Free),
            post(2, 0.001, 0.0, ContentKind::Hot),
            record(3, 0.0, 0.0),
        ]));
        let cam = camera(16.0);
        assert_eq!(engine.nearest_to_center(&cam), Some(3));

        let mut filter = EntityFilter::default();
        filter.toggle_records();
        filter.toggle_kind(ContentKind::Free);
        engine.set_filter(filter);
        assert_eq!(engine.nearest_to_center(&cam), Some(2));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_thumbnail_lands_on_waiting_marker() {
        let mut engine = engine();
        let source = MapThumbnails(Map::from([("a.png".to_string(), png_bytes(40, 30, [0, 0, 255, 255]))]));
        assert!(engine.enable_thumbnails(source, Handle::current()));
        engine.replace_snapshot(snapshot(vec![poi(1, 0.0, 0.0, "a.png"), poi(2, 0.001, 0.0, "missing.png")]));
        engine.begin_pass(camera(16.0));
        drain(&mut engine, Instant::now());
        assert!(engine.surface().placed().all(|p| p.icon.is_none()));

        let mut applied = 0;
        for _ in 0..200 {
            applied += engine.apply_thumbnails();
            if applied > 0 && engine.stats().pending_thumbnails == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(applied, 1);
        let with_icon: Vec<_> = engine.surface().placed().filter(|p| p.icon.is_some()).collect();
        assert_eq!(with_icon.len(), 1);
        assert_eq!(with_icon[0].target, ClickTarget::Entity(1));

        assert_eq!(engine.stats().cached_thumbnails, 1);
        engine.clear();
        assert_eq!(engine.stats().cached_thumbnails, 0);
    }
}
