//! Benchmarks for teacher-forced scoring and generation.
//!
//! Models are randomly initialised, so the numbers measure the step loop
//! (cell, bank, context, heads) rather than model quality.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use engen::{AnnotatedToken, Document, EnGen, EnGenConfig, EntityType};

/// A document with a mention every fourth token, cycling over a few
/// entities, and a new sentence every twelve tokens.
fn synthetic_document(len: usize, vocab: usize) -> Document {
    let tokens = (0..len)
        .map(|i| {
            let token = 1 + (i * 7) % (vocab - 1);
            let sentence = i / 12;
            if i % 4 == 0 {
                AnnotatedToken::mention(token, EntityType::ENTITY, (i / 4) % 5, 1, sentence)
            } else {
                AnnotatedToken::plain(token, sentence)
            }
        })
        .collect();
    Document::new(format!("bench-{len}"), tokens)
}

fn bench_score(c: &mut Criterion) {
    let config = EnGenConfig::default().with_vocab_size(500);
    let model = EnGen::new(config).unwrap();

    let mut group = c.benchmark_group("score");
    group.sample_size(20);
    for &len in &[16, 64, 256] {
        let doc = synthetic_document(len, 500);
        group.bench_with_input(BenchmarkId::from_parameter(len), &doc, |b, doc| {
            b.iter(|| black_box(model.score(black_box(doc)).unwrap().nll))
        });
    }
    group.finish();
}

fn bench_score_batch(c: &mut Criterion) {
    let config = EnGenConfig::default().with_vocab_size(500);
    let model = EnGen::new(config).unwrap();
    let docs: Vec<Document> = (0..16).map(|_| synthetic_document(64, 500)).collect();

    let mut group = c.benchmark_group("score_batch");
    group.sample_size(10);
    group.bench_function("16x64", |b| {
        b.iter(|| black_box(model.score_batch(black_box(&docs)).len()))
    });
    group.finish();
}

fn bench_generate(c: &mut Criterion) {
    let config = EnGenConfig::default().with_vocab_size(500);
    let model = EnGen::new(config).unwrap();
    let prefix = synthetic_document(8, 500).tokens;

    let mut group = c.benchmark_group("generate");
    group.sample_size(20);
    for &steps in &[16, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(steps), &steps, |b, &steps| {
            b.iter(|| black_box(model.generate(&prefix, steps).unwrap().tokens.len()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_score, bench_score_batch, bench_generate);
criterion_main!(benches);
