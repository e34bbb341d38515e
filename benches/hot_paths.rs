//! Benchmarks for the per-pass hot paths: index build and query, clustering,
//! candidate ranking.
//!
//! Run with: `cargo bench`

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tui_pinmap::cluster::DistanceClusterer;
use tui_pinmap::data::SyntheticEntitySource;
use tui_pinmap::entity::EntityRef;
use tui_pinmap::geo::GeoPoint;
use tui_pinmap::map::spatial::QuadTree;
use tui_pinmap::map::Viewport;
use tui_pinmap::render::rank;

const SEOUL: GeoPoint = GeoPoint::new(37.5665, 126.978);

fn entities(count: usize) -> Vec<EntityRef> {
    SyntheticEntitySource::new(SEOUL, 5_000.0, count, 42)
        .entities()
        .iter()
        .cloned()
        .map(Arc::new)
        .collect()
}

fn bench_quadtree(c: &mut Criterion) {
    let mut group = c.benchmark_group("quadtree");
    for count in [1_000, 10_000, 50_000] {
        let items = entities(count);
        group.bench_with_input(BenchmarkId::new("build", count), &items, |b, items| {
            b.iter(|| QuadTree::build(black_box(items.clone())))
        });

        let tree = QuadTree::build(items);
        let view = Viewport::new(SEOUL.lon, SEOUL.lat, 16.0, 400, 200).bounds();
        group.bench_with_input(BenchmarkId::new("query_range", count), &tree, |b, tree| {
            b.iter(|| tree.query_range(black_box(&view)).len())
        });
    }
    group.finish();
}

fn bench_cluster_and_rank(c: &mut Criterion) {
    let mut group = c.benchmark_group("pass");
    let clusterer = DistanceClusterer::new(18.0);
    for zoom in [14.0, 16.0] {
        let viewport = Viewport::new(SEOUL.lon, SEOUL.lat, zoom, 400, 200);
        let camera = viewport.camera();
        let tree = QuadTree::build(entities(20_000));
        let candidates: Vec<EntityRef> = tree.query_range(&camera.bounds).into_iter().cloned().collect();

        group.bench_with_input(BenchmarkId::new("cluster", zoom), &candidates, |b, candidates| {
            b.iter(|| clusterer.cluster(black_box(candidates), zoom).len())
        });

        let clusters = clusterer.cluster(&candidates, zoom);
        group.bench_with_input(BenchmarkId::new("rank", zoom), &clusters, |b, clusters| {
            b.iter(|| rank(black_box(clusters.clone()), &camera).len())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_quadtree, bench_cluster_and_rank);
criterion_main!(benches);
