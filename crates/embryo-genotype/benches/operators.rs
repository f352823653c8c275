//! Benchmarks for parsing, development and the genetic operators
//!
//! Run with: cargo bench -p embryo-genotype

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use embryo_alphabet::Alphabet;
use embryo_genotype::{OperatorConfig, check_validity, crossover, mutate, parse, validate};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;

const GENOTYPES: [(&str, &str); 3] = [
    ("stick", "X>"),
    ("limb", "<<LLX>MX>N[G:1][T:-0.5]|>"),
    ("repeated", "N#3<>LN[-1:0.5]>>"),
];

fn bench_parse(c: &mut Criterion) {
    let alphabet = Alphabet::default();
    let mut group = c.benchmark_group("parse");
    for (name, text) in GENOTYPES {
        group.bench_with_input(BenchmarkId::from_parameter(name), text, |b, text| {
            b.iter(|| black_box(parse(&alphabet, text)))
        });
    }
    group.finish();
}

fn bench_develop(c: &mut Criterion) {
    let alphabet = Alphabet::default();
    let mut group = c.benchmark_group("check_validity");
    for (name, text) in GENOTYPES {
        group.bench_with_input(BenchmarkId::from_parameter(name), text, |b, text| {
            b.iter(|| black_box(check_validity(&alphabet, text)))
        });
    }
    group.finish();

    c.bench_function("validate_with_repairs", |b| {
        b.iter(|| black_box(validate(&alphabet, "L[G]X:+!:<X>X>")))
    });
}

fn bench_operators(c: &mut Criterion) {
    let alphabet = Alphabet::default();
    let config = OperatorConfig::default();
    let (_, limb) = GENOTYPES[1];

    c.bench_function("mutate", |b| {
        let mut rng = Xoshiro256StarStar::seed_from_u64(42);
        b.iter(|| black_box(mutate(&alphabet, limb, &mut rng)))
    });

    c.bench_function("crossover", |b| {
        let mut rng = Xoshiro256StarStar::seed_from_u64(42);
        b.iter(|| black_box(crossover(&alphabet, &config, limb, GENOTYPES[2].1, &mut rng)))
    });
}

criterion_group!(benches, bench_parse, bench_develop, bench_operators);
criterion_main!(benches);
