use std::time::Duration;

/// Clustering tunables
#[derive(Clone, Debug)]
pub struct ClusterConfig {
    /// Clustering is skipped entirely above this zoom level
    pub max_zoom: f64,
    /// Throttle window between camera updates
    pub camera_throttle: Duration,
    /// Quiet period after the last camera change before re-clustering
    pub recluster_debounce: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            max_zoom: 18.0,
            camera_throttle: Duration::from_millis(200),
            recluster_debounce: Duration::from_millis(300),
        }
    }
}

/// Marker handle pool bounds
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Idle handles beyond this are destroyed on release
    pub max_idle: usize,
    /// Idle handles are topped up to this when utilization is high
    pub min_idle: usize,
    /// Active share of all handles that counts as "high" utilization
    pub high_utilization: f64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: 200,
            min_idle: 20,
            high_utilization: 0.8,
        }
    }
}

/// Incremental renderer pacing
#[derive(Clone, Debug)]
pub struct RenderConfig {
    pub batch_size: usize,
    /// Minimum gap between batches (one frame)
    pub batch_interval: Duration,
    /// Candidates are queried from the screen bounds grown by this fraction per side
    pub candidate_margin: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            batch_size: 25,
            batch_interval: Duration::from_millis(16),
            candidate_margin: 0.25,
        }
    }
}

/// Point-of-interest collision placement
#[derive(Clone, Debug)]
pub struct CollisionConfig {
    /// Resolver is active at or above this zoom level
    pub min_zoom: f64,
    /// Pixel distance at or below which two markers collide
    pub radius_px: f64,
    /// Extra push-out beyond the collision radius for candidate offsets
    pub push_px: f64,
    /// Number of evenly spaced candidate directions
    pub directions: usize,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            min_zoom: 19.0,
            radius_px: 60.0,
            push_px: 20.0,
            directions: 8,
        }
    }
}

impl CollisionConfig {
    /// Same policy on a surface whose pixels are `factor` times the icon's
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            radius_px: self.radius_px * factor,
            push_px: self.push_px * factor,
            ..self
        }
    }
}

/// Viewport-driven fetch policy
#[derive(Clone, Debug)]
pub struct LoaderConfig {
    /// Extra margin on the visible radius
    pub visible_margin: f64,
    pub min_radius_m: f64,
    pub max_radius_m: f64,
    /// Buffered fetch radius as a multiple of the visible radius
    pub buffer_factor: f64,
    pub debounce: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            visible_margin: 0.2,
            min_radius_m: 100.0,
            max_radius_m: 50_000.0,
            buffer_factor: 2.0,
            debounce: Duration::from_millis(500),
        }
    }
}

/// All engine tunables for one map surface
#[derive(Clone, Debug, Default)]
pub struct EngineConfig {
    pub cluster: ClusterConfig,
    pub pool: PoolConfig,
    pub render: RenderConfig,
    pub collision: CollisionConfig,
    pub loader: LoaderConfig,
}
