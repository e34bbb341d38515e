use crate::entity::{EntityRef, MapEntity};
use crate::geo::{Bounds, GeoPoint};

/// Points held directly by a node before it splits
pub const CAPACITY: usize = 10;
/// Deepest level a node may split to
pub const MAX_DEPTH: u8 = 8;
/// Quadrants narrower than this (degrees) are never created
pub const MIN_SPAN: f64 = 1e-6;
/// Root region margin around the snapshot bounding box
const ROOT_MARGIN: f64 = 0.1;

/// Anything with a fixed geographic position
pub trait Located {
    fn position(&self) -> GeoPoint;
}

impl Located for MapEntity {
    #[inline(always)]
    fn position(&self) -> GeoPoint {
        MapEntity::position(self)
    }
}

impl Located for EntityRef {
    #[inline(always)]
    fn position(&self) -> GeoPoint {
        MapEntity::position(self)
    }
}

impl Located for GeoPoint {
    #[inline(always)]
    fn position(&self) -> GeoPoint {
        *self
    }
}

/// Statistics about a built tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuadTreeStats {
    pub node_count: usize,
    pub leaf_count: usize,
    pub max_depth: u8,
    pub item_count: usize,
}

struct Node<T> {
    bounds: Bounds,
    depth: u8,
    items: Vec<(GeoPoint, T)>,
    /// NW, NE, SW, SE once split
    children: Option<Box<[Node<T>; 4]>>,
}

impl<T> Node<T> {
    fn new(bounds: Bounds, depth: u8) -> Self {
        Self {
            bounds,
            depth,
            items: Vec::new(),
            children: None,
        }
    }

    #[inline(always)]
    fn can_split(&self) -> bool {
        self.depth < MAX_DEPTH
            && self.bounds.width() / 2.0 >= MIN_SPAN
            && self.bounds.height() / 2.0 >= MIN_SPAN
    }

    fn insert(&mut self, pos: GeoPoint, item: T) {
        if let Some(children) = &mut self.children {
            match children.iter_mut().find(|c| c.bounds.contains(&pos)) {
                Some(child) => child.insert(pos, item),
                // Only reachable through floating-point edge alignment
                None => self.items.push((pos, item)),
            }
            return;
        }

        self.items.push((pos, item));
        if self.items.len() > CAPACITY && self.can_split() {
            self.split();
        }
    }

    /// One-time split into four quadrants, redistributing held points
    fn split(&mut self) {
        let [nw, ne, sw, se] = self.bounds.quadrants();
        let depth = self.depth + 1;
        let mut children = Box::new([
            Node::new(nw, depth),
            Node::new(ne, depth),
            Node::new(sw, depth),
            Node::new(se, depth),
        ]);

        let held = std::mem::take(&mut self.items);
        for (pos, item) in held {
            match children.iter_mut().find(|c| c.bounds.contains(&pos)) {
                Some(child) => child.insert(pos, item),
                None => self.items.push((pos, item)),
            }
        }
        self.children = Some(children);
    }

    fn query_located<'a>(&'a self, range: &Bounds, out: &mut Vec<(GeoPoint, &'a T)>) {
        if !self.bounds.intersects(range) {
            return;
        }
        out.extend(self.items.iter().filter(|(p, _)| range.contains(p)).map(|(p, t)| (*p, t)));
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.query_located(range, out);
            }
        }
    }

    fn collect_stats(&self, stats: &mut QuadTreeStats) {
        stats.node_count += 1;
        stats.item_count += self.items.len();
        stats.max_depth = stats.max_depth.max(self.depth);
        match &self.children {
            Some(children) => children.iter().for_each(|c| c.collect_stats(stats)),
            None => stats.leaf_count += 1,
        }
    }

    fn for_each<'a>(&'a self, f: &mut impl FnMut(&'a T)) {
        self.items.iter().for_each(|(_, t)| f(t));
        if let Some(children) = &self.children {
            children.iter().for_each(|c| c.for_each(f));
        }
    }
}

/// Point quadtree over one immutable snapshot.
/// Rebuilt from scratch whenever the snapshot changes.
pub struct QuadTree<T> {
    root: Node<T>,
    len: usize,
}

impl<T: Located> QuadTree<T> {
    /// Build over all items, sizing the root to their bounding box plus a 10% margin.
    /// An empty snapshot yields a single-point root that answers every query with nothing.
    pub fn build(items: impl IntoIterator<Item = T>) -> Self {
        let mut located: Vec<(GeoPoint, T)> = items
            .into_iter()
            .map(|item| (item.position(), item))
            .collect();

        located.retain(|(p, _)| {
            debug_assert!(p.is_finite(), "non-finite entity position {p:?}");
            p.is_finite()
        });

        let root_bounds = match Bounds::from_points(located.iter().map(|(p, _)| p)) {
            Some(b) => b.expand(ROOT_MARGIN),
            None => Bounds::point(GeoPoint::default()),
        };

        let mut root = Node::new(root_bounds, 0);
        let len = located.len();
        for (pos, item) in located {
            root.insert(pos, item);
        }
        Self { root, len }
    }
}

impl<T> QuadTree<T> {
    pub fn empty() -> Self {
        Self {
            root: Node::new(Bounds::point(GeoPoint::default()), 0),
            len: 0,
        }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Region covered by the root node
    pub fn bounds(&self) -> Bounds {
        self.root.bounds
    }

    /// All items whose position lies inside `range` (edges inclusive)
    pub fn query_range(&self, range: &Bounds) -> Vec<&T> {
        let mut hits = Vec::new();
        if self.len > 0 {
            self.root.query_located(range, &mut hits);
        }
        hits.into_iter().map(|(_, t)| t).collect()
    }

    /// All items within `meters` great-circle distance of `center`
    pub fn query_radius(&self, center: GeoPoint, meters: f64) -> Vec<&T> {
        if self.len == 0 || !center.is_finite() || meters.is_nan() || meters < 0.0 {
            return Vec::new();
        }
        let envelope = Bounds::around(center, meters);
        let mut hits = Vec::new();
        self.root.query_located(&envelope, &mut hits);

        // The rectangle is a superset; keep only the true circle
        hits.into_iter()
            .filter(|(p, _)| p.distance_m(&center) <= meters)
            .map(|(_, t)| t)
            .collect()
    }

    /// Visit every item
    pub fn for_each<'a>(&'a self, mut f: impl FnMut(&'a T)) {
        self.root.for_each(&mut f);
    }

    pub fn stats(&self) -> QuadTreeStats {
        let mut stats = QuadTreeStats::default();
        self.root.collect_stats(&mut stats);
        stats
    }
}
