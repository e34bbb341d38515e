//! Priority-ordered incremental rendering.
//!
//! Candidates are scored once per pass and painted a batch per frame, best
//! first. Starting a pass bumps the generation; a job from an older
//! generation is dropped at its next batch boundary.

use std::collections::VecDeque;
use std::time::Instant;

use rayon::prelude::*;

use crate::cluster::Cluster;
use crate::config::RenderConfig;
use crate::entity::{ContentKind, MapEntity};
use crate::surface::Camera;

const ON_SCREEN_BONUS: u32 = 1000;

/// Closer is better: (upper bound in meters, bonus)
const DISTANCE_TIERS: [(f64, u32); 4] = [(100.0, 500), (300.0, 400), (1_000.0, 300), (3_000.0, 200)];
const FAR_BONUS: u32 = 100;

pub fn kind_bonus(entity: &MapEntity) -> u32 {
    match entity {
        MapEntity::Content(c) => match c.kind {
            ContentKind::Hot => 50,
            ContentKind::Notice => 40,
            ContentKind::Info => 30,
            ContentKind::Market => 20,
            ContentKind::Free => 10,
        },
        MapEntity::Record(_) => 25,
    }
}

pub fn distance_bonus(meters: f64) -> u32 {
    DISTANCE_TIERS
        .iter()
        .find(|(limit, _)| meters < *limit)
        .map(|(_, bonus)| *bonus)
        .unwrap_or(FAR_BONUS)
}

/// Score a cluster (or a single entity as a one-member cluster) against the camera
pub fn priority_score(cluster: &Cluster, camera: &Camera) -> u32 {
    let at = cluster.centroid;
    let on_screen = if camera.bounds.contains(&at) { ON_SCREEN_BONUS } else { 0 };
    let kind = cluster.members.iter().map(|m| kind_bonus(m)).max().unwrap_or(0);
    on_screen + distance_bonus(camera.center.distance_m(&at)) + kind
}

#[derive(Clone, Debug)]
pub struct ScoredCandidate {
    pub cluster: Cluster,
    pub score: u32,
}

/// Score in parallel and sort best first. Ties break on the seed id so the
/// order is deterministic.
pub fn rank(clusters: Vec<Cluster>, camera: &Camera) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = clusters
        .into_par_iter()
        .map(|cluster| {
            let score = priority_score(&cluster, camera);
            ScoredCandidate { cluster, score }
        })
        .collect();
    scored.par_sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.cluster.seed().id().cmp(&b.cluster.seed().id()))
    });
    scored
}

/// One slice of a pass, to be painted within a single frame
#[derive(Debug)]
pub struct Batch {
    pub generation: u64,
    /// Zero-based batch number within the pass
    pub index: usize,
    pub items: Vec<ScoredCandidate>,
}

struct RenderJob {
    generation: u64,
    queue: VecDeque<ScoredCandidate>,
    total: usize,
    batches_sent: usize,
}

/// Paces one render job at a time for a single surface
pub struct RenderScheduler {
    config: RenderConfig,
    generation: u64,
    job: Option<RenderJob>,
    last_batch: Option<Instant>,
}

impl RenderScheduler {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            generation: 0,
            job: None,
            last_batch: None,
        }
    }

    /// Start a pass over ranked candidates, superseding any job in flight.
    /// Returns the new generation.
    pub fn start(&mut self, ranked: Vec<ScoredCandidate>) -> u64 {
        self.generation += 1;
        self.last_batch = None;
        self.job = (!ranked.is_empty()).then(|| RenderJob {
            generation: self.generation,
            total: ranked.len(),
            queue: ranked.into(),
            batches_sent: 0,
        });
        self.generation
    }

    /// Invalidate the job in flight without starting another
    pub fn cancel(&mut self) {
        self.generation += 1;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    /// Batches the current pass needs in total
    pub fn planned_batches(&self) -> usize {
        match &self.job {
            Some(job) if job.generation == self.generation => job.total.div_ceil(self.config.batch_size.max(1)),
            _ => 0,
        }
    }

    /// (painted, total) candidates for the job in flight
    pub fn progress(&self) -> Option<(usize, usize)> {
        self.job
            .as_ref()
            .filter(|job| job.generation == self.generation)
            .map(|job| (job.total - job.queue.len(), job.total))
    }

    pub fn is_idle(&self) -> bool {
        self.progress().is_none()
    }

    /// Hand out the next batch if a frame has passed since the previous one.
    /// Stale or finished jobs are dropped here.
    pub fn next_batch(&mut self, now: Instant) -> Option<Batch> {
        let job = self.job.as_mut()?;
        if job.generation != self.generation || job.queue.is_empty() {
            self.job = None;
            return None;
        }
        if let Some(last) = self.last_batch {
            if now.saturating_duration_since(last) < self.config.batch_interval {
                return None;
            }
        }

        let take = self.config.batch_size.max(1).min(job.queue.len());
        let items: Vec<ScoredCandidate> = job.queue.drain(..take).collect();
        let batch = Batch {
            generation: job.generation,
            index: job.batches_sent,
            items,
        };
        job.batches_sent += 1;
        self.last_batch = Some(now);
        if job.queue.is_empty() {
            self.job = None;
        }
        Some(batch)
    }
}
