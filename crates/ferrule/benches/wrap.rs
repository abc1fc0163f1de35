use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ferrule::{Bridge, BridgeOptions, Handle, NativeObject};
use ferrule_sdk::ScriptRuntime;
use ferrule_vm::Vm;

struct Payload(u64);

impl NativeObject for Payload {}

fn bench_wrap_collect(c: &mut Criterion) {
    let mut group = c.benchmark_group("bridge");
    for size in [256usize, 4096] {
        group.bench_with_input(BenchmarkId::new("wrap_collect", size), &size, |b, &size| {
            b.iter(|| {
                let mut vm = Vm::default();
                let bridge = Bridge::init(&mut vm, BridgeOptions::default()).unwrap();
                for i in 0..size {
                    black_box(bridge.wrap(&mut vm, Payload(i as u64)).unwrap());
                }
                // One cycle runs the finalizers, the next frees the wrappers
                vm.collect();
                vm.collect();
            });
        });
    }
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("bridge");
    for size in [256usize, 4096] {
        let mut vm = Vm::default();
        let bridge = Bridge::init(&mut vm, BridgeOptions::default()).unwrap();
        let holder = vm.new_table().unwrap();
        vm.set_global("holder", holder.clone());
        for i in 0..size {
            let value = bridge.wrap(&mut vm, Payload(i as u64)).unwrap();
            vm.raw_set(&holder, (i as i64).into(), value).unwrap();
        }
        group.bench_with_input(BenchmarkId::new("push_object", size), &size, |b, &size| {
            b.iter(|| {
                for i in 0..size {
                    black_box(bridge.push_object(&vm, Handle::new(i as i64)).unwrap());
                }
            });
        });
    }
    group.finish();
}

fn bench_method_call(c: &mut Criterion) {
    let mut vm = Vm::default();
    let bridge = Bridge::init(&mut vm, BridgeOptions::default()).unwrap();
    let value = bridge.wrap(&mut vm, Payload(7)).unwrap();
    vm.set_global("payload", value.clone());

    c.bench_function("bridge/get_refid", |b| {
        b.iter(|| black_box(vm.call_method(&value, "get_refid", &[]).unwrap()));
    });
}

criterion_group!(benches, bench_wrap_collect, bench_lookup, bench_method_call);
criterion_main!(benches);
