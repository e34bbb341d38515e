use std::path::{Path, PathBuf};
use std::time::Duration;

use geojson::{Feature, GeoJson, JsonObject, Value};
use tracing::{debug, trace};

use super::within_radius;
use crate::entity::{ContentEntity, ContentKind, EntityFilter, MapEntity, RecordEntity};
use crate::error::FetchError;
use crate::geo::GeoPoint;
use crate::surface::EntitySource;

/// Point features in a GeoJSON file, re-read on every request so edits show
/// up on the next reload
pub struct GeoJsonEntitySource {
    path: PathBuf,
    latency: Duration,
}

impl GeoJsonEntitySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            latency: Duration::ZERO,
        }
    }

    /// Delay every response, to exercise the loading states
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EntitySource for GeoJsonEntitySource {
    async fn fetch_entities(
        &self,
        center: GeoPoint,
        radius_m: i32,
        filter: &EntityFilter,
    ) -> Result<Vec<MapEntity>, FetchError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let text = tokio::fs::read_to_string(&self.path).await?;
        let entities = parse_entities(&text)?;
        let hits = within_radius(&entities, center, radius_m, filter);
        debug!(total = entities.len(), returned = hits.len(), radius_m, "geojson fetch");
        Ok(hits)
    }
}

/// Decode point features into entities.
///
/// Recognized properties: `id`, `kind` (a content kind, or `record`),
/// `title`, `body`, `likes`, `comments`, `thumbnail`, `duration`, `plays`.
/// Features without a point geometry or with an unknown kind are skipped.
pub fn parse_entities(text: &str) -> Result<Vec<MapEntity>, FetchError> {
    let geojson = text
        .parse::<GeoJson>()
        .map_err(|e| FetchError::Decode(e.to_string()))?;
    let features = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(_) => return Err(FetchError::Decode("expected features, found a bare geometry".into())),
    };

    let entities: Vec<MapEntity> = features
        .iter()
        .enumerate()
        .filter_map(|(index, feature)| {
            let entity = feature_to_entity(index, feature);
            if entity.is_none() {
                trace!(index, "skipping feature");
            }
            entity
        })
        .collect();
    Ok(entities)
}

fn feature_to_entity(index: usize, feature: &Feature) -> Option<MapEntity> {
    let position = match &feature.geometry.as_ref()?.value {
        Value::Point(coords) if coords.len() >= 2 => GeoPoint::new(coords[1], coords[0]),
        _ => return None,
    };
    if !position.is_finite() {
        return None;
    }

    let empty = JsonObject::new();
    let props = feature.properties.as_ref().unwrap_or(&empty);
    let text = |key: &str| props.get(key).and_then(|v| v.as_str()).map(str::to_string);
    let count = |key: &str| props.get(key).and_then(|v| v.as_u64()).map_or(0, |v| v.min(u32::MAX as u64) as u32);

    let id = props.get("id").and_then(|v| v.as_u64()).unwrap_or(index as u64 + 1);
    let title = text("title").unwrap_or_default();
    let kind = text("kind").unwrap_or_else(|| "info".to_string());

    if kind.eq_ignore_ascii_case("record") {
        return Some(MapEntity::Record(RecordEntity {
            id,
            position,
            title,
            duration_secs: count("duration"),
            play_count: count("plays"),
        }));
    }

    Some(MapEntity::Content(ContentEntity {
        id,
        position,
        kind: ContentKind::parse(&kind)?,
        title,
        body: text("body").unwrap_or_default(),
        like_count: count("likes"),
        comment_count: count("comments"),
        thumbnail_url: text("thumbnail").filter(|url| !url.is_empty()),
    }))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SAMPLE: &str = r#"{"type":"FeatureCollection","features":[
        {"type":"Feature","properties":{"id":10,"kind":"hot","title":"Night market","likes":42,"thumbnail":"market.png"},
         "geometry":{"type":"Point","coordinates":[126.978,37.5665]}},
        {"type":"Feature","properties":{"kind":"record","title":"Street band","duration":95,"plays":7},
         "geometry":{"type":"Point","coordinates":[126.979,37.5667]}},
        {"type":"Feature","properties":{"kind":"weather"},
         "geometry":{"type":"Point","coordinates":[126.98,37.57]}},
        {"type":"Feature","properties":{"kind":"info"},
         "geometry":{"type":"LineString","coordinates":[[0,0],[1,1]]}},
        {"type":"Feature","properties":{"id":11,"kind":"notice","title":"Far away"},
         "geometry":{"type":"Point","coordinates":[127.5,37.5665]}}
    ]}"#;

    #[test]
    fn test_parse_entities() {
        let entities = parse_entities(SAMPLE).unwrap();
        assert_eq!(entities.len(), 3);

        match &entities[0] {
            MapEntity::Content(c) => {
                assert_eq!(c.id, 10);
                assert_eq!(c.kind, ContentKind::Hot);
                assert_eq!(c.like_count, 42);
                assert_eq!(c.thumbnail_url.as_deref(), Some("market.png"));
                assert!((c.position.lat - 37.5665).abs() < 1e-9);
            }
            other => panic!("expected content, got {other:?}"),
        }
        match &entities[1] {
            MapEntity::Record(r) => {
                // No id property: falls back to the feature index
                assert_eq!(r.id, 2);
                assert_eq!(r.duration_secs, 95);
                assert_eq!(r.play_count, 7);
            }
            other => panic!("expected record, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_entities("not json"), Err(FetchError::Decode(_))));
        assert!(matches!(
            parse_entities(r#"{"type":"Point","coordinates":[0,0]}"#),
            Err(FetchError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_filters_by_radius() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let source = GeoJsonEntitySource::new(file.path());
        let center = GeoPoint::new(37.5665, 126.978);
        let hits = source
            .fetch_entities(center, 1_000, &EntityFilter::default())
            .await
            .unwrap();
        assert_eq!(hits.iter().map(|e| e.id()).collect::<Vec<_>>(), vec![10, 2]);
    }

    #[tokio::test]
    async fn test_fetch_missing_file_is_io_error() {
        let source = GeoJsonEntitySource::new("/nonexistent/content.geojson");
        let result = source
            .fetch_entities(GeoPoint::new(0.0, 0.0), 100, &EntityFilter::default())
            .await;
        assert!(matches!(result, Err(FetchError::Io(_))));
    }
}
