//! Benchmarks for segment index operations
//!
//! Covers timeline expansion, lookup by time, iteration and the merge and
//! eviction path taken by live manifest refreshes.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use segline_media::{
    expand_timeline, SegmentIndex, SegmentReference, StaticUris, TimelineEntry, TimelineParams,
    TimelineTemplate,
};

const SEGMENT_DURATION: f64 = 2.0;

fn references(start: f64, count: usize) -> Vec<Arc<SegmentReference>> {
    let uris = StaticUris::shared(vec!["https://cdn.example.com/media.mp4".to_string()]);
    (0..count)
        .map(|i| {
            let s = start + SEGMENT_DURATION * i as f64;
            Arc::new(
                SegmentReference::builder(s, s + SEGMENT_DURATION, Arc::clone(&uris))
                    .byte_range(i as u64 * 1_000, Some(i as u64 * 1_000 + 999))
                    .build(),
            )
        })
        .collect()
}

fn timeline_entries(count: usize) -> Vec<TimelineEntry> {
    // Alternating durations defeat repeat compression.
    (0..count)
        .map(|i| TimelineEntry::new(None, if i % 2 == 0 { 180_000 } else { 179_999 }, None))
        .collect()
}

fn bench_expand_timeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("expand_timeline");
    let params = TimelineParams::new(90_000);

    for count in [100usize, 1_000, 10_000] {
        let entries = timeline_entries(count);
        group.bench_with_input(BenchmarkId::new("entries", count), &entries, |b, entries| {
            b.iter(|| expand_timeline(black_box(entries), &params).unwrap());
        });
    }

    let repeated = vec![TimelineEntry::new(Some(0), 180_000, Some(9_999))];
    group.bench_function("repeat_10000", |b| {
        b.iter(|| expand_timeline(black_box(&repeated), &params).unwrap());
    });

    group.finish();
}

fn bench_find(c: &mut Criterion) {
    let mut group = c.benchmark_group("find");

    for count in [100usize, 10_000] {
        let index = SegmentIndex::new(references(0.0, count));
        let last = SEGMENT_DURATION * (count - 1) as f64;
        group.bench_with_input(BenchmarkId::new("explicit", count), &index, |b, index| {
            b.iter(|| index.find(black_box(last + 0.5)));
        });
    }

    let ranges = expand_timeline(
        &[TimelineEntry::new(Some(0), 180_000, Some(9_999))],
        &TimelineParams::new(90_000),
    )
    .unwrap();
    let template = TimelineTemplate::new(
        ranges,
        "$RepresentationID$/$Number$.m4s",
        "video",
        vec!["https://cdn.example.com/".to_string()],
        90_000,
    );
    let index = SegmentIndex::from_timeline(template, 0.0, f64::INFINITY, false);
    group.bench_function("timeline_10000", |b| {
        b.iter(|| {
            let position = index.find(black_box(15_000.5)).unwrap();
            index.get(position)
        });
    });

    group.finish();
}

fn bench_iterate(c: &mut Criterion) {
    let index = SegmentIndex::new(references(0.0, 1_000));

    c.bench_function("iterate_from_middle", |b| {
        b.iter(|| {
            index
                .iter_for_time(black_box(1_000.0), false, false)
                .map(|iter| iter.count())
        });
    });
}

fn bench_live_refresh(c: &mut Criterion) {
    let mut group = c.benchmark_group("live_refresh");

    // A 30-entry window advancing by 5 segments per refresh.
    group.bench_function("merge_and_evict", |b| {
        b.iter_batched(
            || (SegmentIndex::new(references(0.0, 30)), references(10.0, 30)),
            |(mut index, update)| {
                index.merge_and_evict(update, black_box(10.0));
                index
            },
            criterion::BatchSize::SmallInput,
        );
    });

    group.bench_function("evict", |b| {
        b.iter_batched(
            || SegmentIndex::new(references(0.0, 1_000)),
            |mut index| {
                index.evict(black_box(1_000.0));
                index
            },
            criterion::BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_expand_timeline,
    bench_find,
    bench_iterate,
    bench_live_refresh
);
criterion_main!(benches);
