use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use labortrend::{ModelConfig, train_model};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const SECTORS: [&str; 4] = ["agriculture", "industry", "services", "public"];
const GENDERS: [&str; 2] = ["female", "male"];
const COUNTRIES: [&str; 3] = ["Mali", "Niger", "Senegal"];

fn random_table(rows: usize) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(0x1AB0_u64 + rows as u64);
    let mut pick = |levels: &[&'static str]| -> Vec<&'static str> {
        (0..rows)
            .map(|_| *levels.choose(&mut rng).unwrap_or(&levels[0]))
            .collect()
    };
    let sector = pick(&SECTORS);
    let gender = pick(&GENDERS);
    let country = pick(&COUNTRIES);

    let mut rng = StdRng::seed_from_u64(0xA6E_u64 + rows as u64);
    let year: Vec<i64> = (0..rows).map(|_| rng.gen_range(2000..=2023)).collect();
    let age: Vec<i64> = (0..rows).map(|_| rng.gen_range(15..=64)).collect();
    let population: Vec<f64> = (0..rows).map(|_| rng.gen_range(1_000.0..50_000.0)).collect();

    DataFrame::new(vec![
        Series::new("year".into(), year).into(),
        Series::new("sector".into(), sector).into(),
        Series::new("gender".into(), gender).into(),
        Series::new("age".into(), age).into(),
        Series::new("country".into(), country).into(),
        Series::new("population".into(), population).into(),
    ])
    .expect("construct benchmark table")
}

fn benchmark_train(c: &mut Criterion) {
    let sizes = [100_usize, 1_000, 10_000];
    let tables: Vec<_> = sizes.iter().map(|&n| (n, random_table(n))).collect();
    let config = ModelConfig::default();

    let mut group = c.benchmark_group("train_model");
    group.sample_size(20);
    for (rows, table) in tables.iter() {
        group.throughput(Throughput::Elements(*rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), table, |b, input| {
            b.iter(|| {
                let output = train_model(black_box(input), &config).expect("train");
                black_box(output.metrics);
            });
        });
    }
    group.finish();
}

criterion_group!(train, benchmark_train);
criterion_main!(train);
