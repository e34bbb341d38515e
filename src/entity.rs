use std::sync::Arc;

use crate::geo::GeoPoint;

/// Content post category, drives icon color and render priority
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContentKind {
    Notice,
    Info,
    Market,
    Free,
    Hot,
}

impl ContentKind {
    pub const ALL: [ContentKind; 5] = [
        ContentKind::Notice,
        ContentKind::Info,
        ContentKind::Market,
        ContentKind::Free,
        ContentKind::Hot,
    ];

    /// Parse the wire name used by content sources (case-insensitive)
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "NOTICE" => Some(ContentKind::Notice),
            "INFO" => Some(ContentKind::Info),
            "MARKET" => Some(ContentKind::Market),
            "FREE" => Some(ContentKind::Free),
            "HOT" => Some(ContentKind::Hot),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ContentKind::Notice => "notice",
            ContentKind::Info => "info",
            ContentKind::Market => "market",
            ContentKind::Free => "free",
            ContentKind::Hot => "hot",
        }
    }
}

/// A geotagged content post
#[derive(Clone, Debug, PartialEq)]
pub struct ContentEntity {
    pub id: u64,
    pub position: GeoPoint,
    pub kind: ContentKind,
    pub title: String,
    pub body: String,
    pub like_count: u32,
    pub comment_count: u32,
    /// Entities with a thumbnail are points of interest
    pub thumbnail_url: Option<String>,
}

/// A geotagged audio record
#[derive(Clone, Debug, PartialEq)]
pub struct RecordEntity {
    pub id: u64,
    pub position: GeoPoint,
    pub title: String,
    pub duration_secs: u32,
    pub play_count: u32,
}

/// Anything that can be shown on the map. Snapshots are immutable; updates
/// arrive as a whole new snapshot.
#[derive(Clone, Debug, PartialEq)]
pub enum MapEntity {
    Content(ContentEntity),
    Record(RecordEntity),
}

/// Shared reference to an entity in the current snapshot
pub type EntityRef = Arc<MapEntity>;

impl MapEntity {
    #[inline(always)]
    pub fn id(&self) -> u64 {
        match self {
            MapEntity::Content(c) => c.id,
            MapEntity::Record(r) => r.id,
        }
    }

    #[inline(always)]
    pub fn position(&self) -> GeoPoint {
        match self {
            MapEntity::Content(c) => c.position,
            MapEntity::Record(r) => r.position,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            MapEntity::Content(c) => &c.title,
            MapEntity::Record(r) => &r.title,
        }
    }

    pub fn is_record(&self) -> bool {
        matches!(self, MapEntity::Record(_))
    }

    /// Content with a thumbnail gets a photo icon and collision placement
    pub fn thumbnail_url(&self) -> Option<&str> {
        match self {
            MapEntity::Content(c) => c.thumbnail_url.as_deref(),
            MapEntity::Record(_) => None,
        }
    }

    pub fn is_point_of_interest(&self) -> bool {
        self.thumbnail_url().is_some()
    }
}

/// Which entities the user wants to see
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityFilter {
    /// Visible content kinds; empty hides all content
    pub kinds: Vec<ContentKind>,
    pub show_records: bool,
}

impl Default for EntityFilter {
    fn default() -> Self {
        Self {
            kinds: ContentKind::ALL.to_vec(),
            show_records: true,
        }
    }
}

impl EntityFilter {
    pub fn accepts(&self, entity: &MapEntity) -> bool {
        match entity {
            MapEntity::Content(c) => self.kinds.contains(&c.kind),
            MapEntity::Record(_) => self.show_records,
        }
    }

    /// Flip a content kind on/off
    pub fn toggle_kind(&mut self, kind: ContentKind) {
        if let Some(pos) = self.kinds.iter().position(|k| *k == kind) {
            self.kinds.remove(pos);
        } else {
            self.kinds.push(kind);
            self.kinds.sort();
        }
    }

    pub fn toggle_records(&mut self) {
        self.show_records = !self.show_records;
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn post(id: u64, lat: f64, lon: f64, kind: ContentKind) -> EntityRef {
        Arc::new(MapEntity::Content(ContentEntity {
            id,
            position: GeoPoint::new(lat, lon),
            kind,
            title: format!("post {id}"),
            body: String::new(),
            like_count: 0,
            comment_count: 0,
            thumbnail_url: None,
        }))
    }

    pub fn poi(id: u64, lat: f64, lon: f64, url: &str) -> EntityRef {
        Arc::new(MapEntity::Content(ContentEntity {
            id,
            position: GeoPoint::new(lat, lon),
            kind: ContentKind::Info,
            title: format!("poi {id}"),
            body: String::new(),
            like_count: 0,
            comment_count: 0,
            thumbnail_url: Some(url.to_string()),
        }))
    }

    pub fn record(id: u64, lat: f64, lon: f64) -> EntityRef {
        Arc::new(MapEntity::Record(RecordEntity {
            id,
            position: GeoPoint::new(lat, lon),
            title: format!("record {id}"),
            duration_secs: 30,
            play_count: 0,
        }))
    }
}
