//! Locator Resolution Benchmarks
//!
//! Benchmarks for chain resolution and condition evaluation over snapshots
//! of increasing size.
//!
//! Run with: `cargo bench --bench resolve_ops`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use waypost::condition::evaluate;
use waypost::locator::resolve;
use waypost::{Condition, ElementHandle, Locator, LocatorChain, Snapshot};

fn snapshot(elements: usize) -> Snapshot {
    let mut snap = Snapshot::new("http://localhost:3000/forum").with_body_text("Forum");
    for i in 0..elements {
        snap = snap.with_element(
            ElementHandle::new(format!("post-{i}"), "div")
                .with_attr("id", format!("post-{i}"))
                .with_attr("name", format!("post-{i}"))
                .matching("div.post"),
        );
    }
    snap.with_element(
        ElementHandle::new("reply", "button")
            .with_attr("type", "submit")
            .matching("//button[@type='submit']"),
    )
}

fn fallback_chain() -> LocatorChain {
    LocatorChain::single(Locator::id("reply-button"))
        .or(Locator::name("reply"))
        .or(Locator::css("button.reply"))
        .or(Locator::xpath("//button[@type='submit']"))
}

fn bench_chain_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_resolution");

    for size in [10, 100, 1000] {
        let snap = snapshot(size);
        let first_hit = LocatorChain::single(Locator::id("post-0"));
        let last_resort = fallback_chain();

        group.bench_with_input(BenchmarkId::new("first_hit", size), &snap, |bench, snap| {
            bench.iter(|| black_box(resolve(black_box(&first_hit), snap).is_some()));
        });
        group.bench_with_input(BenchmarkId::new("last_resort", size), &snap, |bench, snap| {
            bench.iter(|| black_box(resolve(black_box(&last_resort), snap).is_some()));
        });
    }

    group.finish();
}

fn bench_condition_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("condition_evaluation");
    let snap = snapshot(500);

    let conditions = vec![
        ("clickable", Condition::clickable(fallback_chain())),
        ("page_contains", Condition::page_contains("Forum")),
        ("negated_url", Condition::url_matches("/login").unwrap().negate()),
    ];

    for (name, condition) in conditions {
        group.bench_function(name, |bench| {
            bench.iter(|| black_box(evaluate(black_box(&condition), &snap)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_chain_resolution, bench_condition_evaluation);
criterion_main!(benches);
