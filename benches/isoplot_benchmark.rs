use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gerber_isoplot::gerber_types::{Command, Polarity, Unit};
use gerber_isoplot::testing::commands::*;
use gerber_isoplot::{
    ArcDirection, BuilderId, ConversionConfig, FillMode, IdSet, IsoPlot, IsolationLayer, PlotPoint, UsageTag,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_circles(count: usize) -> Vec<(PlotPoint, i32)> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..count)
        .map(|_| {
            (
                PlotPoint::new(rng.random_range(50..950), rng.random_range(50..950)),
                rng.random_range(5..50),
            )
        })
        .collect()
}

fn pad_grid(columns: usize, rows: usize) -> Vec<Command> {
    let mut commands = header(Unit::Millimeters);
    commands.extend([circle(10, 1.2, Some(0.6)), rectangle(11, 1.5, 1.0), select(10)]);
    for row in 0..rows {
        for column in 0..columns {
            commands.push(flash(column as f64 * 2.54, row as f64 * 2.54));
        }
    }
    commands.extend([select(11), polarity(Polarity::Clear)]);
    for column in 0..columns {
        commands.push(flash(column as f64 * 2.54, 1.27));
    }
    commands.push(end_of_file());
    commands
}

fn bench_stamping(c: &mut Criterion) {
    let circles = random_circles(500);

    c.bench_function("stamp 500 filled circles", |b| {
        b.iter(|| {
            let mut plot = IsoPlot::new(1000, 1000);
            for (center, radius) in &circles {
                plot.draw_circle(
                    UsageTag::NormalEdge,
                    *center,
                    *radius,
                    FillMode::Background,
                    ArcDirection::CounterClockwise,
                )
                .unwrap();
            }
            black_box(plot.overlay_count())
        })
    });
}

fn bench_erase(c: &mut Criterion) {
    let circles = random_circles(500);
    let mut plot = IsoPlot::new(1000, 1000);
    for (center, radius) in &circles {
        plot.draw_circle(
            UsageTag::NormalEdge,
            *center,
            *radius,
            FillMode::Background,
            ArcDirection::CounterClockwise,
        )
        .unwrap();
    }
    let eraser = plot
        .draw_circle(
            UsageTag::InvertEdge,
            PlotPoint::new(500, 500),
            300,
            FillMode::Erase,
            ArcDirection::CounterClockwise,
        )
        .unwrap();
    let targets = IdSet::Range(BuilderId::FIRST..eraser);

    c.bench_function("erase 500 circles with one eraser", |b| {
        b.iter(|| {
            let mut plot = plot.clone();
            let rect = plot.grid_rect();
            plot.erase_if_not_supported(&targets, eraser, rect)
                .unwrap();
            black_box(
                plot.erase_by_builder_id(&targets, eraser, rect)
                    .unwrap(),
            )
        })
    });
}

fn bench_conversion(c: &mut Criterion) {
    let commands = pad_grid(20, 10);
    let config = ConversionConfig::default().with_cells_per_mm(20.0);

    c.bench_function("convert 20x10 pad grid", |b| {
        b.iter(|| {
            let layer = IsolationLayer::from_commands(black_box(commands.clone()), &config).unwrap();
            black_box(layer.plot().occupied_count())
        })
    });
}

criterion_group!(benches, bench_stamping, bench_erase, bench_conversion);
criterion_main!(benches);
