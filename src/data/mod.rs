//! Data loading: GeoJSON base-map lines and the content sources behind the
//! marker engine.

mod content;
mod synthetic;

pub use content::{parse_entities, GeoJsonEntitySource};
pub use synthetic::{synthetic_thumbnail, LocalThumbnails, SyntheticEntitySource, SYNTHETIC_SCHEME};

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use geojson::{GeoJson, Geometry, Value};
use tracing::{info, warn};

use crate::entity::{EntityFilter, MapEntity};
use crate::error::FetchError;
use crate::geo::GeoPoint;
use crate::map::{LineString, MapRenderer};
use crate::surface::EntitySource;

/// Load every line feature of a GeoJSON file into the base map
pub fn load_basemap(renderer: &mut MapRenderer, path: &Path) -> Result<usize> {
    let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let geojson = content
        .parse::<GeoJson>()
        .with_context(|| format!("parsing {}", path.display()))?;

    let before = renderer.lines.len();
    process_geojson_lines(&geojson, |line| renderer.add_line(line));
    let added = renderer.lines.len() - before;
    info!(path = %path.display(), lines = added, "base map loaded");
    Ok(added)
}

/// Process GeoJSON and extract line features
fn process_geojson_lines<F>(geojson: &GeoJson, mut add_line: F)
where
    F: FnMut(LineString),
{
    match geojson {
        GeoJson::FeatureCollection(fc) => {
            for feature in &fc.features {
                if let Some(ref geometry) = feature.geometry {
                    process_geometry_lines(geometry, &mut add_line);
                }
            }
        }
        GeoJson::Feature(f) => {
            if let Some(ref geometry) = f.geometry {
                process_geometry_lines(geometry, &mut add_line);
            }
        }
        GeoJson::Geometry(geometry) => {
            process_geometry_lines(geometry, &mut add_line);
        }
    }
}

fn to_line(coords: &[Vec<f64>]) -> LineString {
    coords.iter().filter(|c| c.len() >= 2).map(|c| (c[0], c[1])).collect()
}

fn process_geometry_lines<F>(geometry: &Geometry, add_line: &mut F)
where
    F: FnMut(LineString),
{
    match &geometry.value {
        Value::LineString(coords) => add_line(to_line(coords)),
        Value::MultiLineString(lines) => {
            for coords in lines {
                add_line(to_line(coords));
            }
        }
        // Polygons contribute their outer ring only
        Value::Polygon(rings) => {
            if let Some(exterior) = rings.first() {
                add_line(to_line(exterior));
            }
        }
        Value::MultiPolygon(polygons) => {
            for rings in polygons {
                if let Some(exterior) = rings.first() {
                    add_line(to_line(exterior));
                }
            }
        }
        Value::GeometryCollection(geometries) => {
            for g in geometries {
                process_geometry_lines(g, add_line);
            }
        }
        Value::Point(_) | Value::MultiPoint(_) => {}
    }
}

/// Fallback base map: a lat/lon grid around `center` every `step_deg`,
/// `cells` steps in each direction
pub fn generate_graticule(renderer: &mut MapRenderer, center: GeoPoint, step_deg: f64, cells: i32) {
    let snap = |v: f64| (v / step_deg).round() * step_deg;
    let (lat0, lon0) = (snap(center.lat), snap(center.lon));
    let span = step_deg * cells as f64;

    for i in -cells..=cells {
        let lat = lat0 + step_deg * i as f64;
        renderer.add_line(vec![(lon0 - span, lat), (lon0 + span, lat)]);
        let lon = lon0 + step_deg * i as f64;
        renderer.add_line(vec![(lon, lat0 - span), (lon, lat0 + span)]);
    }
}

/// Keep entities the filter accepts that lie within `radius_m` of `center`
pub(crate) fn within_radius<'a>(
    entities: impl IntoIterator<Item = &'a MapEntity>,
    center: GeoPoint,
    radius_m: i32,
    filter: &EntityFilter,
) -> Vec<MapEntity> {
    let radius = radius_m.max(0) as f64;
    entities
        .into_iter()
        .filter(|e| filter.accepts(e) && e.position().distance_m(&center) <= radius)
        .cloned()
        .collect()
}

/// The content source picked on the command line
pub enum ContentSource {
    GeoJson(GeoJsonEntitySource),
    Synthetic(SyntheticEntitySource),
}

impl EntitySource for ContentSource {
    async fn fetch_entities(
        &self,
        center: GeoPoint,
        radius_m: i32,
        filter: &EntityFilter,
    ) -> Result<Vec<MapEntity>, FetchError> {
        let result = match self {
            ContentSource::GeoJson(source) => source.fetch_entities(center, radius_m, filter).await,
            ContentSource::Synthetic(source) => source.fetch_entities(center, radius_m, filter).await,
        };
        if let Err(ref err) = result {
            warn!(error = %err, "content fetch failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::entity::fixtures::{post, record};
    use crate::entity::ContentKind;

    #[test]
    fn test_load_basemap_lines_and_polygons() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"type":"FeatureCollection","features":[
                {{"type":"Feature","properties":{{}},"geometry":{{"type":"LineString","coordinates":[[0,0],[1,1]]}}}},
                {{"type":"Feature","properties":{{}},"geometry":{{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]],[[0.2,0.2],[0.3,0.2],[0.2,0.3],[0.2,0.2]]]}}}},
                {{"type":"Feature","properties":{{}},"geometry":{{"type":"Point","coordinates":[5,5]}}}}
            ]}}"#
        )
        .unwrap();

        let mut renderer = MapRenderer::new();
        let added = load_basemap(&mut renderer, file.path()).unwrap();
        assert_eq!(added, 2);
        assert_eq!(renderer.lines[1].len(), 4);
    }

    #[test]
    fn test_load_basemap_missing_file() {
        let mut renderer = MapRenderer::new();
        let err = load_basemap(&mut renderer, Path::new("/nonexistent/basemap.json")).unwrap_err();
        assert!(err.to_string().contains("reading"));
        assert!(!renderer.has_data());
    }

    #[test]
    fn test_graticule_size() {
        let mut renderer = MapRenderer::new();
        generate_graticule(&mut renderer, GeoPoint::new(37.5665, 126.978), 0.01, 5);
        assert_eq!(renderer.lines.len(), 22);
    }

    #[test]
    fn test_within_radius_applies_filter() {
        let near = post(1, 0.0, 0.0, ContentKind::Hot);
        let far = post(2, 1.0, 0.0, ContentKind::Hot);
        let rec = record(3, 0.0, 0.0001);
        let entities = [near.as_ref().clone(), far.as_ref().clone(), rec.as_ref().clone()];

        let all = within_radius(&entities, GeoPoint::new(0.0, 0.0), 1_000, &EntityFilter::default());
        assert_eq!(all.iter().map(|e| e.id()).collect::<Vec<_>>(), vec![1, 3]);

        let mut filter = EntityFilter::default();
        filter.toggle_records();
        let posts = within_radius(&entities, GeoPoint::new(0.0, 0.0), 1_000, &filter);
        assert_eq!(posts.iter().map(|e| e.id()).collect::<Vec<_>>(), vec![1]);
    }
}
