//! Ownership throughput per strategy.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fleetcache::adapters::StaticFleet;
use fleetcache::services::{relocation_ratio, ShardingFilter, ShardingStrategyKind};

fn agents(accounts: usize) -> Vec<String> {
    (0..accounts)
        .flat_map(|i| {
            ["us-east-1", "us-west-2", "eu-west-1"]
                .into_iter()
                .map(move |region| format!("account-{i}/{region}/ServerGroupCachingAgent"))
        })
        .collect()
}

fn bench_compute_owner(c: &mut Criterion) {
    let agents = agents(1000);
    let mut group = c.benchmark_group("compute_owner");
    group.throughput(Throughput::Elements(agents.len() as u64));
    for kind in ShardingStrategyKind::ALL {
        let strategy = kind.build();
        group.bench_with_input(BenchmarkId::from_parameter(strategy.name()), &agents, |b, agents| {
            b.iter(|| {
                for agent in agents {
                    black_box(strategy.compute_owner(black_box(agent), 64));
                }
            });
        });
    }
    group.finish();
}

fn bench_relocation(c: &mut Criterion) {
    let agents = agents(1000);
    let mut group = c.benchmark_group("relocation_ratio");
    for name in ["modulo", "jump"] {
        let filter =
            ShardingFilter::from_names(name, "agent-type", Arc::new(StaticFleet::new(0, 10)))
                .expect("valid sharding names");
        group.bench_function(name, |b| {
            b.iter(|| relocation_ratio(&filter, agents.iter().map(String::as_str), 10, 11));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compute_owner, bench_relocation);
criterion_main!(benches);
