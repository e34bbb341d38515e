//! Deterministic generated content for running without a data file, and the
//! thumbnail source that goes with it.

use std::f64::consts::TAU;
use std::io::Cursor;
use std::path::PathBuf;
use std::time::Duration;

use image::{ImageFormat, Rgba, RgbaImage};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::entity::{ContentEntity, ContentKind, EntityFilter, MapEntity, RecordEntity};
use crate::error::{FetchError, ImageError};
use crate::geo::{meters_to_degrees, GeoPoint};
use crate::hash::{hash2, rand_simple};
use crate::surface::{EntitySource, ThumbnailSource};

/// URL scheme of generated thumbnails
pub const SYNTHETIC_SCHEME: &str = "synthetic://";
/// Every n-th generated thumbnail fails to load
const BROKEN_THUMBNAIL_EVERY: u64 = 17;
const HOTSPOTS: u64 = 6;

const PLACES: [&str; 8] = [
    "corner", "park", "station", "alley", "market", "bridge", "square", "cafe",
];
const TOPICS: [&str; 8] = [
    "lost umbrella", "street food", "live music", "garage sale", "road works", "free books", "sunset", "new mural",
];

pub struct SyntheticEntitySource {
    entities: Vec<MapEntity>,
    latency: Duration,
}

impl SyntheticEntitySource {
    /// Scatter `count` entities within `spread_m` of `center`. A third of them
    /// crowd around a few hotspots so that clusters form at street level.
    pub fn new(center: GeoPoint, spread_m: f64, count: usize, seed: u64) -> Self {
        let (dlat, dlon) = meters_to_degrees(spread_m, center.lat);
        let hotspots: Vec<(f64, f64)> = (0..HOTSPOTS)
            .map(|h| {
                let angle = TAU * rand_simple(hash2(seed, 1_000_000 + h));
                let dist = 0.6 * rand_simple(hash2(seed, 2_000_000 + h)).sqrt();
                (dist * angle.sin(), dist * angle.cos())
            })
            .collect();

        let entities: Vec<MapEntity> = (0..count as u64)
            .into_par_iter()
            .map(|i| {
                let r = |salt: u64| rand_simple(hash2(seed.wrapping_add(salt), i));
                let (ox, oy, scale) = if r(1) < 0.33 {
                    let (hx, hy) = hotspots[(r(2) * HOTSPOTS as f64) as usize % HOTSPOTS as usize];
                    (hx, hy, 0.05)
                } else {
                    (0.0, 0.0, 1.0)
                };
                let angle = TAU * r(3);
                let dist = scale * r(4).sqrt();
                let position = GeoPoint::new(
                    center.lat + (oy + dist * angle.cos()) * dlat,
                    center.lon + (ox + dist * angle.sin()) * dlon,
                );

                let id = i + 1;
                let title = format!(
                    "{} by the {}",
                    TOPICS[(r(5) * TOPICS.len() as f64) as usize % TOPICS.len()],
                    PLACES[(r(6) * PLACES.len() as f64) as usize % PLACES.len()]
                );

                if r(7) < 0.15 {
                    return MapEntity::Record(RecordEntity {
                        id,
                        position,
                        title,
                        duration_secs: 10 + (r(8) * 290.0) as u32,
                        play_count: (r(9) * 500.0) as u32,
                    });
                }

                let kind = ContentKind::ALL[(r(10) * ContentKind::ALL.len() as f64) as usize % ContentKind::ALL.len()];
                MapEntity::Content(ContentEntity {
                    id,
                    position,
                    kind,
                    title,
                    body: String::new(),
                    like_count: (r(11) * 200.0) as u32,
                    comment_count: (r(12) * 40.0) as u32,
                    thumbnail_url: (r(13) < 0.2).then(|| format!("{SYNTHETIC_SCHEME}{id}")),
                })
            })
            .collect();

        info!(count = entities.len(), spread_m, seed, "generated synthetic content");
        Self {
            entities,
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn entities(&self) -> &[MapEntity] {
        &self.entities
    }
}

impl EntitySource for SyntheticEntitySource {
    async fn fetch_entities(
        &self,
        center: GeoPoint,
        radius_m: i32,
        filter: &EntityFilter,
    ) -> Result<Vec<MapEntity>, FetchError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let radius = radius_m.max(0) as f64;
        let hits: Vec<MapEntity> = self
            .entities
            .par_iter()
            .filter(|e| filter.accepts(e) && e.position().distance_m(&center) <= radius)
            .cloned()
            .collect();
        debug!(returned = hits.len(), radius_m, "synthetic fetch");
        Ok(hits)
    }
}

/// Serves `synthetic://<id>` thumbnails by painting them, anything else is
/// read as a file path relative to `base_dir`
#[derive(Default)]
pub struct LocalThumbnails {
    base_dir: Option<PathBuf>,
}

impl LocalThumbnails {
    pub fn new(base_dir: Option<PathBuf>) -> Self {
        Self { base_dir }
    }
}

/// A diagonal two-tone gradient seeded by `id`, encoded as PNG
pub fn synthetic_thumbnail(id: u64) -> Result<Vec<u8>, ImageError> {
    let hue = |salt: u64| (rand_simple(hash2(id, salt)) * 255.0) as u8;
    let (a, b) = ([hue(1), hue(2), hue(3)], [hue(4), hue(5), hue(6)]);
    let img = RgbaImage::from_fn(48, 36, |x, y| {
        let t = (x + y) as f32 / (48 + 36) as f32;
        let mix = |i: usize| (a[i] as f32 * (1.0 - t) + b[i] as f32 * t) as u8;
        Rgba([mix(0), mix(1), mix(2), 255])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

impl ThumbnailSource for LocalThumbnails {
    async fn fetch_thumbnail(&self, url: &str) -> Result<Vec<u8>, ImageError> {
        if let Some(rest) = url.strip_prefix(SYNTHETIC_SCHEME) {
            let id: u64 = rest.parse().map_err(|_| ImageError::Fetch {
                url: url.to_string(),
                reason: "bad synthetic id".into(),
            })?;
            if id % BROKEN_THUMBNAIL_EVERY == 0 {
                return Err(ImageError::Fetch {
                    url: url.to_string(),
                    reason: "not found".into(),
                });
            }
            return synthetic_thumbnail(id);
        }

        let path = match &self.base_dir {
            Some(dir) => dir.join(url),
            None => PathBuf::from(url),
        };
        tokio::fs::read(&path).await.map_err(|e| ImageError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEOUL: GeoPoint = GeoPoint::new(37.5665, 126.978);

    #[test]
    fn test_generation_is_deterministic() {
        let a = SyntheticEntitySource::new(SEOUL, 2_000.0, 300, 7);
        let b = SyntheticEntitySource::new(SEOUL, 2_000.0, 300, 7);
        assert_eq!(a.entities(), b.entities());

        let c = SyntheticEntitySource::new(SEOUL, 2_000.0, 300, 8);
        assert_ne!(a.entities(), c.entities());
    }

    #[test]
    fn test_generation_stays_within_spread() {
        let source = SyntheticEntitySource::new(SEOUL, 2_000.0, 500, 1);
        assert_eq!(source.entities().len(), 500);
        for e in source.entities() {
            // Degree scaling is per-axis, allow a little slack
            assert!(e.position().distance_m(&SEOUL) <= 2_100.0, "{e:?}");
        }
        assert!(source.entities().iter().any(|e| e.is_record()));
        assert!(source.entities().iter().any(|e| e.is_point_of_interest()));
    }

    #[tokio::test]
    async fn test_fetch_respects_radius_and_filter() {
        let source = SyntheticEntitySource::new(SEOUL, 2_000.0, 400, 3);
        let mut filter = EntityFilter::default();
        filter.toggle_records();

        let hits = source.fetch_entities(SEOUL, 500, &filter).await.unwrap();
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|e| !e.is_record() && e.position().distance_m(&SEOUL) <= 500.0));
    }

    #[tokio::test]
    async fn test_local_thumbnails() {
        let thumbs = LocalThumbnails::default();
        let bytes = thumbs.fetch_thumbnail("synthetic://5").await.unwrap();
        assert!(image::load_from_memory(&bytes).is_ok());

        assert!(matches!(
            thumbs.fetch_thumbnail("synthetic://34").await,
            Err(ImageError::Fetch { .. })
        ));

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), &bytes).unwrap();
        let from_dir = LocalThumbnails::new(Some(dir.path().to_path_buf()));
        assert_eq!(from_dir.fetch_thumbnail("a.png").await.unwrap(), bytes);
        assert!(from_dir.fetch_thumbnail("missing.png").await.is_err());
    }
}
