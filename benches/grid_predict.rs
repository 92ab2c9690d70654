use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use wifimap::grid::evaluate;
use wifimap::model::{Fit, ModelArtifact, ModelVariant, Trainer};
use wifimap::samples::{BoundingBox, Sample};

const SAMPLE_COUNT: usize = 64;

fn samples() -> Vec<Sample> {
    (0..SAMPLE_COUNT)
        .map(|i| {
            let lat = 52.0 + (i % 8) as f64 * 0.001;
            let lon = 4.0 + (i / 8) as f64 * 0.001;
            Sample {
                latitude: lat,
                longitude: lon,
                rssi: -40.0 - ((i % 8) + (i / 8)) as f64 * 3.5,
            }
        })
        .collect()
}

fn trained(variant: ModelVariant) -> (ModelArtifact, BoundingBox) {
    let samples = samples();
    let bounds = BoundingBox::from_samples(&samples).expect("bounds");
    let artifact = Trainer::default().fit(&samples, variant).expect("fit");
    (artifact, bounds)
}

fn bench_grid(c: &mut Criterion) {
    for variant in [ModelVariant::Ensemble, ModelVariant::Neural] {
        let (artifact, bounds) = trained(variant);
        for grid_size in [32usize, 128] {
            c.bench_with_input(
                BenchmarkId::new(format!("grid_{variant}"), grid_size),
                &grid_size,
                |b, &grid_size| {
                    b.iter(|| evaluate(black_box(&artifact), &bounds, grid_size));
                },
            );
        }
    }
}

criterion_group!(benches, bench_grid);
criterion_main!(benches);
