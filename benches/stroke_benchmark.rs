//! Sketch surface benchmarks

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use sketchtale_lib::canvas::{
    Color, DrawingMode, MarksSnapshot, Point, SketchSurface, SurfaceConfig,
};

fn generate_stroke(count: usize) -> Vec<Point> {
    (0..count)
        .map(|i| {
            let t = i as f32 / count as f32;
            Point::new(
                50.0 + t * 700.0,
                (t * std::f32::consts::PI * 4.0).sin() * 100.0 + 300.0,
            )
        })
        .collect()
}

fn surface_900x600() -> SketchSurface {
    SketchSurface::with_config(SurfaceConfig {
        default_width: 600,
        default_height: 400,
        ..SurfaceConfig::default()
    })
}

fn apply_stroke(surface: &mut SketchSurface, points: &[Point], mode: &DrawingMode) {
    let mut iter = points.iter();
    if let Some(first) = iter.next() {
        surface.begin_stroke(*first, mode);
        for point in iter {
            surface.extend_stroke(*point);
        }
        surface.end_stroke();
    }
}

fn benchmark_stroke_rasterization(c: &mut Criterion) {
    let mut group = c.benchmark_group("Stroke Rasterization");

    for count in [10, 50, 100, 500].iter() {
        let points = generate_stroke(*count);
        let draw = DrawingMode::draw(Color::rgb(200, 40, 40));

        group.bench_with_input(BenchmarkId::new("draw", count), &points, |b, points| {
            let mut surface = surface_900x600();
            b.iter(|| apply_stroke(&mut surface, points, &draw))
        });
    }

    group.finish();
}

fn benchmark_erase_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("Erase Sweep");

    let points = generate_stroke(100);
    let draw = DrawingMode::draw(Color::rgb(200, 40, 40));
    let erase = DrawingMode::erase();

    group.bench_function("erase_over_paint", |b| {
        let mut surface = surface_900x600();
        apply_stroke(&mut surface, &points, &draw);
        b.iter(|| apply_stroke(&mut surface, &points, &erase))
    });

    group.finish();
}

fn benchmark_history(c: &mut Criterion) {
    let mut group = c.benchmark_group("History Snapshots");

    let points = generate_stroke(100);
    let draw = DrawingMode::draw(Color::rgb(200, 40, 40));
    let mut surface = surface_900x600();
    apply_stroke(&mut surface, &points, &draw);

    group.bench_function("capture", |b| {
        b.iter(|| MarksSnapshot::capture(surface.marks()))
    });

    group.bench_function("undo_redo", |b| {
        b.iter(|| {
            surface.undo();
            surface.redo();
        })
    });

    group.finish();
}

fn benchmark_export(c: &mut Criterion) {
    let mut group = c.benchmark_group("Marks Export");
    group.sample_size(20);

    let points = generate_stroke(200);
    let draw = DrawingMode::draw(Color::rgb(200, 40, 40));
    let mut surface = surface_900x600();
    apply_stroke(&mut surface, &points, &draw);

    group.bench_function("png_data_url", |b| {
        b.iter(|| surface.export_marks_data_url())
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_stroke_rasterization,
    benchmark_erase_sweep,
    benchmark_history,
    benchmark_export
);
criterion_main!(benches);
