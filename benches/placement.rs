use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use map_label_renderer::bitmap::Bitmap;
use map_label_renderer::canvas::RecordingCanvas;
use map_label_renderer::config::{LabelClassConfig, TileSettings};
use map_label_renderer::geometry::{BBox, Rect, to_world};
use map_label_renderer::host::RedrawSignal;
use map_label_renderer::labels::{
    CandidateBatch, LabelCandidate, LabelClass, LabelClassRegistry, LabelEngine, LabelSource, OccupancyIndex,
    Rasterizer, RenderJob, SpatialQuery,
};
use map_label_renderer::magnification::DisplayMetrics;
use map_label_renderer::tiles::{MemoryTileCache, TileRenderer};
use map_label_renderer::viewport::Viewport;
use std::hint::black_box;
use std::sync::Arc;

/// Small deterministic generator so runs are comparable.
struct Lcg(u64);

impl Lcg {
    fn next_f64(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}

struct NoSource;

impl LabelSource for NoSource {
    fn lookup_candidates(&self, _bbox: &BBox, _zoom: i32) -> CandidateBatch {
        CandidateBatch::new()
    }
}

struct NoRaster;

impl Rasterizer for NoRaster {
    fn rasterize(&self, _class: &LabelClass, _text: &str) -> Option<Bitmap> {
        None
    }
}

fn random_rects(count: usize) -> Vec<Rect> {
    let mut rng = Lcg(7);
    (0..count)
        .map(|_| {
            let x = (rng.next_f64() * 1000.0) as f32;
            let y = (rng.next_f64() * 1000.0) as f32;
            Rect::from_origin(x, y, 40.0 + (rng.next_f64() * 60.0) as f32, 18.0)
        })
        .collect()
}

fn bench_occupancy(c: &mut Criterion) {
    let mut group = c.benchmark_group("occupancy");
    for count in [100usize, 1_000, 5_000] {
        let rects = random_rects(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &rects, |b, data| {
            b.iter(|| {
                let mut index = OccupancyIndex::new();
                for rect in data {
                    if index.is_free(rect) {
                        index.add(*rect);
                    }
                }
                black_box(index.len())
            })
        });
    }
    group.finish();
}

fn loaded_engine(viewport: &Viewport, count: usize) -> LabelEngine {
    let classes = LabelClassRegistry::from_configs(
        &[LabelClassConfig {
            id: 1,
            name: "city".to_string(),
            has_dot: true,
            ..LabelClassConfig::default()
        }],
        1.0,
        true,
    )
    .unwrap();
    let class = Arc::clone(classes.get(1).unwrap());
    let engine = LabelEngine::start(classes, NoSource, NoRaster, Arc::new(RedrawSignal::new())).unwrap();

    let bbox = viewport.bbox();
    let mut rng = Lcg(11);
    let candidates: Vec<LabelCandidate> = (0..count)
        .map(|i| {
            let x = bbox.min_x + rng.next_f64() * (bbox.max_x - bbox.min_x);
            let y = bbox.min_y + rng.next_f64() * (bbox.max_y - bbox.min_y);
            LabelCandidate::new(to_world(x), to_world(y), format!("Place {i}"), 0, i as i64)
        })
        .collect();

    let reporter = engine.reporter();
    let generation = engine.generation();
    for candidate in &candidates {
        let job = RenderJob::new(generation, Arc::clone(&class), candidate.text.clone());
        let width = class.box_width(&candidate.text) as u32;
        reporter.report_bitmap(job, Bitmap::new(width, class.box_config().height as u32));
    }
    let query = SpatialQuery::new(generation, bbox, viewport.rounded_zoom());
    reporter.report_candidates(query, CandidateBatch::from([(1, candidates)]));
    engine
}

fn bench_label_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("label_frame");
    let viewport = Viewport::new(0.5, 0.5, 10.0, 1080, 1920);
    for count in [200usize, 2_000] {
        let mut engine = loaded_engine(&viewport, count);
        group.bench_function(BenchmarkId::from_parameter(count), |b| {
            b.iter(|| {
                let mut canvas = RecordingCanvas::new(viewport.width, viewport.height);
                black_box(engine.draw_frame(&viewport, &mut canvas))
            })
        });
    }
    group.finish();
}

fn bench_tile_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("tile_pass");
    let cache = Arc::new(MemoryTileCache::new(256));
    let mut tiles = TileRenderer::new(Arc::clone(&cache), &TileSettings::default(), DisplayMetrics::default());
    for zoom in [6.0, 6.4] {
        let viewport = Viewport::new(0.31, 0.42, zoom, 1080, 1920);
        let window = viewport.tile_window();
        tiles.on_geometry_changed(&window);
        for cell in &window.cells {
            if let Some(parent) = cell.key.parent() {
                cache.insert(parent, Bitmap::new(256, 256));
            }
        }
        group.bench_with_input(BenchmarkId::from_parameter(zoom), &window, |b, data| {
            b.iter(|| {
                let mut canvas = RecordingCanvas::new(viewport.width, viewport.height);
                black_box(tiles.render(data, &mut canvas))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_occupancy, bench_label_frame, bench_tile_pass);
criterion_main!(benches);
