//! Performance benchmarks for the cumulative tree

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rangestake::CumulativeTree;

const NBITS: u32 = 24;

/// Deterministic key stream (splitmix-style) over the operable range.
struct Keys {
    state: u64,
    max: u64,
}

impl Keys {
    fn new(max: u64) -> Self {
        Self {
            state: 0x9e37_79b9_7f4a_7c15,
            max,
        }
    }

    fn next(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.state >> 33) % self.max + 1
    }
}

fn populated(n: usize) -> CumulativeTree {
    let mut tree = CumulativeTree::new(NBITS).unwrap();
    let mut keys = Keys::new(tree.max_key());
    for _ in 0..n {
        tree.add(keys.next(), 1).unwrap();
    }
    tree
}

fn bench_add(c: &mut Criterion) {
    c.bench_function("add_10k_random_keys_24bit", |b| {
        b.iter(|| {
            let tree = populated(10_000);
            black_box(tree.node_count());
        })
    });
}

fn bench_prefix_sum(c: &mut Criterion) {
    let tree = populated(100_000);
    let mut keys = Keys::new(tree.max_key());
    c.bench_function("prefix_sum_100k_node_tree", |b| {
        b.iter(|| black_box(tree.prefix_sum(keys.next())))
    });
}

fn bench_add_remove_cycle(c: &mut Criterion) {
    let mut tree = populated(100_000);
    let mut keys = Keys::new(tree.max_key());
    c.bench_function("add_remove_cycle_100k_node_tree", |b| {
        b.iter(|| {
            let key = keys.next();
            tree.add(key, 3).unwrap();
            tree.remove(key, 3).unwrap();
        })
    });
}

criterion_group!(benches, bench_add, bench_prefix_sum, bench_add_remove_cycle);
criterion_main!(benches);
