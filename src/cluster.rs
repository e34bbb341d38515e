//! Zoom-dependent greedy distance clustering.
//!
//! Each unprocessed entity seeds a cluster and absorbs every later unprocessed
//! entity within the zoom's cluster distance of the *seed*. Clusters are
//! star-shaped, never transitive chains. The pass is O(n²), which is fine
//! because the input is already cut down to the visible set.

use crate::entity::EntityRef;
use crate::geo::GeoPoint;

/// A transient group of nearby entities, valid for one render pass
#[derive(Clone, Debug)]
pub struct Cluster {
    /// Seed first, then absorbed members in input order
    pub members: Vec<EntityRef>,
    /// Arithmetic mean of member positions
    pub centroid: GeoPoint,
}

impl Cluster {
    fn from_members(members: Vec<EntityRef>) -> Self {
        let positions: Vec<GeoPoint> = members.iter().map(|m| m.position()).collect();
        let centroid = GeoPoint::centroid(&positions).unwrap_or_default();
        Self { members, centroid }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Clusters always hold at least one member
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Single-member clusters render as ordinary markers
    #[inline(always)]
    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }

    pub fn seed(&self) -> &EntityRef {
        &self.members[0]
    }

    pub fn member_ids(&self) -> Vec<u64> {
        self.members.iter().map(|m| m.id()).collect()
    }
}

/// Cluster radius in meters for a zoom level (monotonically non-increasing)
pub fn cluster_distance(zoom: f64) -> f64 {
    if zoom < 12.0 {
        500.0
    } else if zoom < 13.0 {
        300.0
    } else if zoom < 14.0 {
        200.0
    } else if zoom < 15.0 {
        100.0
    } else if zoom < 16.0 {
        60.0
    } else if zoom < 17.0 {
        40.0
    } else {
        20.0
    }
}

/// Greedy clusterer with a zoom cutoff above which everything renders individually
#[derive(Clone, Debug)]
pub struct DistanceClusterer {
    max_zoom: f64,
}

impl DistanceClusterer {
    pub fn new(max_zoom: f64) -> Self {
        Self { max_zoom }
    }

    /// Whether clustering runs at all at this zoom
    pub fn is_active(&self, zoom: f64) -> bool {
        zoom <= self.max_zoom
    }

    /// Partition `entities` into clusters for `zoom`
    pub fn cluster(&self, entities: &[EntityRef], zoom: f64) -> Vec<Cluster> {
        if !self.is_active(zoom) {
            return entities
                .iter()
                .map(|e| Cluster::from_members(vec![e.clone()]))
                .collect();
        }
        cluster_within(entities, cluster_distance(zoom))
    }
}

/// Greedy star clustering with an explicit distance
pub fn cluster_within(entities: &[EntityRef], distance_m: f64) -> Vec<Cluster> {
    let positions: Vec<GeoPoint> = entities.iter().map(|e| e.position()).collect();
    let mut processed = vec![false; entities.len()];
    let mut clusters = Vec::new();

    for seed in 0..entities.len() {
        if processed[seed] {
            continue;
        }
        processed[seed] = true;
        let mut members = vec![entities[seed].clone()];

        for other in (seed + 1)..entities.len() {
            if processed[other] {
                continue;
            }
            let d = positions[seed].distance_m(&positions[other]);
            // NaN compares false and leaves the entity for its own cluster
            if d <= distance_m {
                processed[other] = true;
                members.push(entities[other].clone());
            }
        }

        clusters.push(Cluster::from_members(members));
    }

    clusters
}
