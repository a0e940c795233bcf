use basis_runtime::{protocol, MethodSignature, RuntimeEnv, TypeBuilder, TypeRegistry, ValueSlot};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn widget_env(depth: usize) -> (RuntimeEnv, usize) {
    let mut types = TypeRegistry::new();
    let mut parent = types
        .register(TypeBuilder::new("Base").fields(2).method(
            "area",
            MethodSignature::none(),
            |env, argv| {
                let this = argv[0].expect_handle()?;
                let w = env.get_field(this, 0)?.expect_int()?;
                let h = env.get_field(this, 1)?.expect_int()?;
                ValueSlot::int(w * h)
            },
        ))
        .unwrap();
    for i in 0..depth {
        parent = types
            .register(TypeBuilder::new(&format!("Level{}", i)).parent(parent))
            .unwrap();
    }
    (RuntimeEnv::new(types), parent)
}

fn bench_trap_inherited(c: &mut Criterion) {
    let mut group = c.benchmark_group("trap_inherited");
    for depth in [0usize, 4, 16] {
        let (env, leaf) = widget_env(depth);
        let r = env
            .instantiate_with(leaf, &[ValueSlot::small_int(3), ValueSlot::small_int(4)])
            .unwrap();
        group.bench_with_input(BenchmarkId::new("area", depth), &depth, |b, _| {
            b.iter(|| env.trap(black_box(r), "area", None).unwrap());
        });
    }
    group.finish();
}

fn bench_protocol(c: &mut Criterion) {
    let (env, leaf) = widget_env(0);
    let a = env.instantiate(leaf).unwrap();
    let b = env.instantiate(leaf).unwrap();

    c.bench_function("trap_hash", |bench| {
        bench.iter(|| env.trap(black_box(a), protocol::HASH, None).unwrap());
    });

    let args = [ValueSlot::handle(b)];
    c.bench_function("trap_equals", |bench| {
        bench.iter(|| env.trap(black_box(a), protocol::EQUALS, Some(&args)).unwrap());
    });

    c.bench_function("trap_missing", |bench| {
        bench.iter(|| env.trap(black_box(a), "doesNotExist", None).unwrap_err());
    });
}

criterion_group!(benches, bench_trap_inherited, bench_protocol);
criterion_main!(benches);
