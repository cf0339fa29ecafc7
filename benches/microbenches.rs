//! Criterion microbenches for the ingestion hot paths.
//!
//! Run with: `cargo bench`
//!
//! These benchmarks measure the performance of:
//! - CoNLL tag decoding and offset alignment
//! - bulk span cleaning
//! - record building from raw entries

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

use annatto::builder::{BuilderKind, RecordBuilder};
use annatto::clean::clean_spans;
use annatto::formats::scheme::{char_offsets, TaggingScheme};
use annatto::formats::RawEntry;
use annatto::ids::{ExampleId, LabelTypeId, UserId};
use annatto::model::{Project, ProjectKind, SpanAnnotation};

/// A synthetic tagged sentence: alternating two-token entities and
/// filler tokens.
fn tagged_sentence(len: usize) -> (Vec<String>, Vec<String>) {
    let mut tokens = Vec::with_capacity(len);
    let mut tags = Vec::with_capacity(len);
    for i in 0..len {
        tokens.push(format!("token{}", i));
        tags.push(match i % 4 {
            0 => "B-PER".to_string(),
            1 => "I-PER".to_string(),
            _ => "O".to_string(),
        });
    }
    (tokens, tags)
}

fn bench_scheme_decode(c: &mut Criterion) {
    let (tokens, tags) = tagged_sentence(200);
    let token_refs: Vec<&str> = tokens.iter().map(String::as_str).collect();
    let tag_refs: Vec<&str> = tags.iter().map(String::as_str).collect();

    let mut group = c.benchmark_group("scheme_decode");
    group.throughput(Throughput::Elements(tags.len() as u64));

    group.bench_function("iob2_decode_and_align", |b| {
        b.iter(|| {
            let entities = TaggingScheme::Iob2.decode(black_box(&tag_refs));
            let offsets: Vec<(usize, usize)> = entities
                .iter()
                .map(|e| char_offsets(&token_refs, " ", e))
                .collect();
            black_box(offsets)
        })
    });

    group.finish();
}

fn bench_span_cleaning(c: &mut Criterion) {
    let project = Project::new(1, "bench", ProjectKind::SpanLabeling);
    let spans: Vec<SpanAnnotation> = (0..500)
        .map(|i| SpanAnnotation {
            example: ExampleId::new(1),
            user: UserId::new(1),
            label: LabelTypeId::new(1),
            start_offset: (i * 7) % 400,
            end_offset: (i * 7) % 400 + 5,
        })
        .collect();

    let mut group = c.benchmark_group("span_clean");
    group.throughput(Throughput::Elements(spans.len() as u64));

    group.bench_function("clean_spans", |b| {
        b.iter(|| {
            let (kept, dropped) = clean_spans(black_box(&project), black_box(spans.clone()));
            black_box((kept, dropped))
        })
    });

    group.finish();
}

fn bench_record_build(c: &mut Criterion) {
    let builder = RecordBuilder::new(BuilderKind::Category, "text", "label");
    let entry = RawEntry::new(1)
        .with_field("text", "an example sentence for the builder to chew on")
        .with_field("label", serde_json::json!(["pos", "long"]))
        .with_field("source", "bench");

    let mut group = c.benchmark_group("record_build");
    group.throughput(Throughput::Elements(1));

    group.bench_function("category_record", |b| {
        b.iter(|| {
            let record = builder
                .build(black_box(entry.clone()), "bench.csv")
                .unwrap();
            black_box(record)
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_scheme_decode,
    bench_span_cleaning,
    bench_record_build
);
criterion_main!(benches);
