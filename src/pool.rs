//! Reuse pool for host marker handles.
//!
//! Acquisition never fails: an empty pool creates a new handle. The idle
//! ceiling only bounds release, where surplus handles are destroyed.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, trace};

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::surface::{MarkerHandle, MarkerSurface};

/// Lifetime counters for diagnostics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub created: u64,
    pub reused: u64,
    pub returned: u64,
    pub destroyed: u64,
    pub available: usize,
    pub active: usize,
}

pub struct MarkerPool {
    config: PoolConfig,
    available: VecDeque<MarkerHandle>,
    active: HashSet<MarkerHandle>,
    created: u64,
    reused: u64,
    returned: u64,
    destroyed: u64,
}

impl MarkerPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            available: VecDeque::new(),
            active: HashSet::new(),
            created: 0,
            reused: 0,
            returned: 0,
            destroyed: 0,
        }
    }

    /// Lend out an idle handle, or create one when none is idle
    pub fn acquire(&mut self, surface: &mut impl MarkerSurface) -> MarkerHandle {
        let handle = match self.available.pop_front() {
            Some(handle) => {
                self.reused += 1;
                handle
            }
            None => {
                self.created += 1;
                surface.create_marker()
            }
        };
        self.active.insert(handle);
        trace!(%handle, "marker acquired");
        handle
    }

    /// Take a handle back. Its visual state is reset before it becomes idle;
    /// past the idle ceiling it is destroyed instead.
    pub fn release(&mut self, surface: &mut impl MarkerSurface, handle: MarkerHandle) -> Result<(), PoolError> {
        if !self.active.remove(&handle) {
            return Err(PoolError::NotActive(handle.0));
        }
        surface.reset_marker(handle);
        self.returned += 1;

        if self.available.len() >= self.config.max_idle {
            surface.destroy_marker(handle);
            self.destroyed += 1;
        } else {
            self.available.push_back(handle);
        }
        Ok(())
    }

    /// Pre-create idle handles up to the floor when most handles are lent out.
    /// Returns how many were created.
    pub fn maintain(&mut self, surface: &mut impl MarkerSurface) -> usize {
        let total = self.active.len() + self.available.len();
        if total == 0 || self.available.len() >= self.config.min_idle {
            return 0;
        }
        let utilization = self.active.len() as f64 / total as f64;
        if utilization < self.config.high_utilization {
            return 0;
        }

        let missing = self.config.min_idle - self.available.len();
        for _ in 0..missing {
            let handle = surface.create_marker();
            self.created += 1;
            self.available.push_back(handle);
        }
        debug!(missing, utilization, "pre-created idle markers");
        missing
    }

    /// Destroy every idle handle (active ones stay with their holders)
    pub fn drain_idle(&mut self, surface: &mut impl MarkerSurface) {
        for handle in self.available.drain(..) {
            surface.destroy_marker(handle);
            self.destroyed += 1;
        }
    }

    pub fn is_active(&self, handle: MarkerHandle) -> bool {
        self.active.contains(&handle)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.created,
            reused: self.reused,
            returned: self.returned,
            destroyed: self.destroyed,
            available: self.available.len(),
            active: self.active.len(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_surface {
    use std::collections::HashMap;
    use std::sync::Arc;

    use crate::icon::MarkerIcon;
    use crate::surface::{MarkerHandle, MarkerPlacement, MarkerSurface};

    /// Records every host call for assertions
    #[derive(Default)]
    pub struct RecordingSurface {
        next: u32,
        pub live: HashMap<MarkerHandle, Option<MarkerPlacement>>,
        pub destroyed: Vec<MarkerHandle>,
        pub resets: usize,
        pub places: usize,
    }

    impl RecordingSurface {
        pub fn placed(&self) -> impl Iterator<Item = &MarkerPlacement> {
            self.live.values().flatten()
        }
    }

    impl MarkerSurface for RecordingSurface {
        fn create_marker(&mut self) -> MarkerHandle {
            let handle = MarkerHandle(self.next);
            self.next += 1;
            self.live.insert(handle, None);
            handle
        }

        fn destroy_marker(&mut self, handle: MarkerHandle) {
            self.live.remove(&handle);
            self.destroyed.push(handle);
        }

        fn reset_marker(&mut self, handle: MarkerHandle) {
            self.resets += 1;
            if let Some(slot) = self.live.get_mut(&handle) {
                *slot = None;
            }
        }

        fn place_marker(&mut self, handle: MarkerHandle, placement: MarkerPlacement) {
            self.places += 1;
            self.live.insert(handle, Some(placement));
        }

        fn set_icon(&mut self, handle: MarkerHandle, icon: Arc<MarkerIcon>) {
            if let Some(Some(p)) = self.live.get_mut(&handle) {
                p.icon = Some(icon);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_surface::RecordingSurface;
    use super::*;
    use proptest::prelude::*;

    fn conserved(pool: &MarkerPool) -> bool {
        let s = pool.stats();
        (s.available + s.active) as u64 == s.created - s.destroyed
    }

    #[test]
    fn test_acquire_release_reacquire() {
        let mut surface = RecordingSurface::default();
        let mut pool = MarkerPool::new(PoolConfig::default());

        let handles: Vec<_> = (0..5).map(|_| pool.acquire(&mut surface)).collect();
        for h in &handles {
            pool.release(&mut surface, *h).unwrap();
        }
        for _ in 0..5 {
            pool.acquire(&mut surface);
        }

        let stats = pool.stats();
        assert_eq!(stats.created, 5);
        assert_eq!(stats.reused, 5);
        assert_eq!(stats.returned, 5);
        assert_eq!(surface.resets, 5);
        assert!(conserved(&pool));
    }

    #[test]
    fn test_double_release_rejected() {
        let mut surface = RecordingSurface::default();
        let mut pool = MarkerPool::new(PoolConfig::default());
        let h = pool.acquire(&mut surface);
        pool.release(&mut surface, h).unwrap();
        let before = pool.stats();

        assert_eq!(pool.release(&mut surface, h), Err(PoolError::NotActive(h.0)));
        assert_eq!(pool.release(&mut surface, MarkerHandle(999)), Err(PoolError::NotActive(999)));
        assert_eq!(pool.stats(), before);
        assert!(conserved(&pool));
    }

    #[test]
    fn test_ceiling_destroys_surplus() {
        let mut surface = RecordingSurface::default();
        let config = PoolConfig {
            max_idle: 3,
            ..PoolConfig::default()
        };
        let mut pool = MarkerPool::new(config);
        let handles: Vec<_> = (0..5).map(|_| pool.acquire(&mut surface)).collect();
        for h in handles {
            pool.release(&mut surface, h).unwrap();
        }
        let stats = pool.stats();
        assert_eq!(stats.available, 3);
        assert_eq!(stats.destroyed, 2);
        assert_eq!(surface.destroyed.len(), 2);
        assert!(conserved(&pool));
    }

    #[test]
    fn test_maintain_prefills_when_busy() {
        let mut surface = RecordingSurface::default();
        let mut pool = MarkerPool::new(PoolConfig::default());
        for _ in 0..10 {
            pool.acquire(&mut surface);
        }
        assert_eq!(pool.maintain(&mut surface), 20);
        assert_eq!(pool.stats().available, 20);
        // Now mostly idle: nothing more to do
        assert_eq!(pool.maintain(&mut surface), 0);
        assert!(conserved(&pool));
    }

    #[test]
    fn test_maintain_idle_pool_noop() {
        let mut surface = RecordingSurface::default();
        let mut pool = MarkerPool::new(PoolConfig::default());
        assert_eq!(pool.maintain(&mut surface), 0);
    }

    proptest! {
        /// Property: available + active == created - destroyed after any op sequence.
        #[test]
        fn prop_pool_conservation(ops in prop::collection::vec((0u8..3, 0usize..64), 0..300)) {
            let mut surface = RecordingSurface::default();
            let mut pool = MarkerPool::new(PoolConfig { max_idle: 16, min_idle: 4, high_utilization: 0.8 });
            let mut held: Vec<MarkerHandle> = Vec::new();

            for (op, idx) in ops {
                match op {
                    0 => held.push(pool.acquire(&mut surface)),
                    1 if !held.is_empty() => {
                        let h = held.swap_remove(idx % held.len());
                        prop_assert!(pool.release(&mut surface, h).is_ok());
                    }
                    1 => {
                        // Releasing something never acquired is rejected
                        prop_assert!(pool.release(&mut surface, MarkerHandle(10_000 + idx as u32)).is_err());
                    }
                    _ => {
                        pool.maintain(&mut surface);
                    }
                }
                prop_assert!(conserved(&pool));
                prop_assert_eq!(pool.stats().active, held.len());
            }
        }
    }
}
