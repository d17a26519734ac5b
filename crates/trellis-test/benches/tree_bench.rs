//! Benchmarks for tree structure and resolution

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use trellis_core::ElementType;
use trellis_test::{grow_random_tree, TestDevice};

fn bench_address_index_lookup(c: &mut Criterion) {
    let device = TestDevice::new().unwrap();
    grow_random_tree(device.tree(), 3, 1000).unwrap();
    let tree = device.tree();

    c.bench_function("address_index_lookup", |b| {
        b.iter(|| black_box(tree.element_by_address(black_box("/sensors/temp"))))
    });
}

fn bench_address_walk_through_link(c: &mut Criterion) {
    let device = TestDevice::new().unwrap();
    let tree = device.tree();

    // Not a canonical address, so resolution walks from the root.
    c.bench_function("address_walk_through_link", |b| {
        b.iter(|| black_box(tree.element_by_address(black_box("/temperature"))))
    });
}

fn bench_attach_detach(c: &mut Criterion) {
    let device = TestDevice::new().unwrap();
    let tree = device.tree();
    let child = tree.create_structure("scratch").unwrap();

    c.bench_function("attach_detach", |b| {
        b.iter(|| {
            tree.add_child(tree.root(), child, false).unwrap();
            tree.remove_child(tree.root(), child, false).unwrap();
        })
    });
}

fn bench_find_by_identifier(c: &mut Criterion) {
    let device = TestDevice::new().unwrap();
    grow_random_tree(device.tree(), 3, 1000).unwrap();
    let tree = device.tree();

    c.bench_function("find_by_identifier", |b| {
        b.iter(|| {
            black_box(
                tree.find_by_identifier(tree.root(), black_box("n999"), false, true)
                    .unwrap(),
            )
        })
    });
}

fn bench_collect_by_type(c: &mut Criterion) {
    let device = TestDevice::new().unwrap();
    grow_random_tree(device.tree(), 3, 1000).unwrap();
    let tree = device.tree();

    c.bench_function("collect_by_type", |b| {
        b.iter(|| {
            black_box(
                tree.elements_by_type(tree.root(), ElementType::Structure, false, true)
                    .unwrap(),
            )
        })
    });
}

criterion_group!(
    benches,
    bench_address_index_lookup,
    bench_address_walk_through_link,
    bench_attach_detach,
    bench_find_by_identifier,
    bench_collect_by_type
);
criterion_main!(benches);
