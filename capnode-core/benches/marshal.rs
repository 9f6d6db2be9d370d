use capnode_core::{ApiValue, Capnode};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn wide_tree(width: usize) -> ApiValue {
    ApiValue::object((0..width).map(|i| {
        (
            format!("entry-{i}"),
            ApiValue::object([
                ("label", ApiValue::from(format!("node {i}"))),
                (
                    "xs",
                    ApiValue::array((0..8).map(|n| ApiValue::from(n as i64))),
                ),
            ]),
        )
    }))
}

fn bench_marshal(c: &mut Criterion) {
    let node = Capnode::new();
    let tree = wide_tree(64);

    c.bench_function("serialize_wide_tree", |b| {
        b.iter(|| node.expose(black_box(tree.clone())))
    });

    let shape = node.expose(tree);
    c.bench_function("adopt_wide_tree", |b| b.iter(|| node.adopt(black_box(&shape))));
}

criterion_group!(benches, bench_marshal);
criterion_main!(benches);
