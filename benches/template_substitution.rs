//! Benchmarks for URL template substitution
//!
//! Tests performance of `$Identifier$` filling for segment media URLs.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use segline_media::{fill_uri_template, TemplateValues};

/// Template with no identifiers (baseline)
const TEMPLATE_NO_VARS: &str = "video/init.mp4";

/// Typical number-addressed template
const TEMPLATE_NUMBER: &str = "$RepresentationID$/seg-$Number$.m4s";

/// Padded number and bandwidth
const TEMPLATE_PADDED: &str = "$RepresentationID$/$Bandwidth$/chunk-$Number%08d$.m4s";

/// Time-addressed template with partial segments
const TEMPLATE_TIME: &str = "$RepresentationID$/t$Time%012d$-p$SubNumber$.cmfv?token=$$abc";

fn values() -> TemplateValues<'static> {
    TemplateValues {
        representation_id: Some("video-1080p-h264"),
        number: Some(123_456),
        sub_number: Some(3),
        bandwidth: Some(4_500_000),
        time: Some(8_640_000_000.0),
    }
}

fn bench_fill_single(c: &mut Criterion) {
    let mut group = c.benchmark_group("fill_single");

    let values = values();

    for (name, template) in [
        ("no_vars", TEMPLATE_NO_VARS),
        ("number", TEMPLATE_NUMBER),
        ("padded", TEMPLATE_PADDED),
        ("time", TEMPLATE_TIME),
    ] {
        group.throughput(Throughput::Bytes(template.len() as u64));
        group.bench_with_input(BenchmarkId::new("template", name), &template, |b, template| {
            b.iter(|| fill_uri_template(black_box(template), black_box(&values)));
        });
    }

    group.finish();
}

fn bench_fill_sequence(c: &mut Criterion) {
    let mut group = c.benchmark_group("fill_sequence");

    for count in [10u64, 100, 1_000] {
        group.throughput(Throughput::Elements(count));
        group.bench_with_input(BenchmarkId::new("segments", count), &count, |b, &count| {
            b.iter(|| {
                (1..=count)
                    .map(|number| {
                        fill_uri_template(
                            TEMPLATE_PADDED,
                            &TemplateValues {
                                representation_id: Some("audio-en"),
                                number: Some(number),
                                bandwidth: Some(128_000),
                                ..TemplateValues::default()
                            },
                        )
                    })
                    .collect::<Vec<_>>()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fill_single, bench_fill_sequence);
criterion_main!(benches);
