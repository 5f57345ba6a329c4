//! Tracked reads, change detection, and dispatch through a mounted slice.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use parking_lot::Mutex;
use serde_json::json;
use slate_core::{has_changed, track, Action, DepSet, Draft, SliceOptions, Store, Value};

fn wide_state(n: usize) -> Value {
    let rows: Vec<serde_json::Value> = (0..n)
        .map(|i| json!({ "id": i, "name": format!("row {i}"), "meta": { "score": i * 3 } }))
        .collect();
    Value::from(json!({ "rows": rows, "filter": { "query": "", "page": 0 } }))
}

fn bench_tracked_reads(c: &mut Criterion) {
    let state = wide_state(1_000);
    c.bench_function("track/nested_read", |b| {
        b.iter_batched(
            || Arc::new(Mutex::new(DepSet::new())),
            |deps| {
                let view = track(Some(state.clone()), deps);
                black_box(view.at("rows.500.meta.score").as_i64());
            },
            BatchSize::SmallInput,
        )
    });
    c.bench_function("track/iterate_rows", |b| {
        b.iter_batched(
            || Arc::new(Mutex::new(DepSet::new())),
            |deps| {
                let view = track(Some(state.clone()), deps);
                let total: i64 = view.get("rows").items().iter().filter_map(|r| r.get("id").as_i64()).sum();
                black_box(total);
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_has_changed(c: &mut Criterion) {
    let before = wide_state(1_000);
    let mut draft = Draft::new(&before);
    draft.set("filter.page", 1).ok();
    let after = draft.finish();

    let mut deps = DepSet::new();
    for i in 0..100 {
        deps.record(format!("rows.{i}.name"));
    }
    c.bench_function("has_changed/100_untouched_paths", |b| {
        b.iter(|| black_box(has_changed(Some(&before), Some(&after), &deps)))
    });
}

fn bench_dispatch(c: &mut Criterion) {
    let store = Store::default();
    let slice = store.create_slice(
        SliceOptions::new("list", wide_state(1_000)).mutation("page", |draft: &mut Draft, action: &Action| {
            draft.set("filter.page", action.payload.clone())
        }),
    );
    let _mount = slice.mount(None).ok();
    let mut page = 0_i64;
    c.bench_function("dispatch/structural_write", |b| {
        b.iter(|| {
            page += 1;
            slice.dispatch("page", page, None).ok();
        })
    });
}

criterion_group!(benches, bench_tracked_reads, bench_has_changed, bench_dispatch);
criterion_main!(benches);
