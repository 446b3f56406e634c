//! Benchmarks for gate dispatch and register arithmetic

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use qureg_sim::{CoherentRegister, RegisterConfig};

fn seeded(qubit_count: usize) -> CoherentRegister {
    CoherentRegister::with_config(qubit_count, 0, RegisterConfig::new().with_seed(99)).unwrap()
}

fn bench_single_qubit_gates(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_qubit_gates");

    for num_qubits in [10usize, 14, 18] {
        group.throughput(Throughput::Elements(1u64 << num_qubits));
        group.bench_with_input(
            BenchmarkId::new("h", num_qubits),
            &num_qubits,
            |b, &num_qubits| {
                let mut reg = seeded(num_qubits);
                b.iter(|| {
                    reg.h(black_box(0)).unwrap();
                });
            },
        );
        group.bench_with_input(
            BenchmarkId::new("x", num_qubits),
            &num_qubits,
            |b, &num_qubits| {
                let mut reg = seeded(num_qubits);
                b.iter(|| {
                    reg.x(black_box(num_qubits / 2)).unwrap();
                });
            },
        );
    }

    group.finish();
}

fn bench_controlled_gates(c: &mut Criterion) {
    let mut group = c.benchmark_group("controlled_gates");

    for num_qubits in [10usize, 14, 18] {
        group.throughput(Throughput::Elements(1u64 << num_qubits));
        group.bench_with_input(
            BenchmarkId::new("cnot", num_qubits),
            &num_qubits,
            |b, &num_qubits| {
                let mut reg = seeded(num_qubits);
                reg.h(0).unwrap();
                b.iter(|| {
                    reg.cnot(black_box(0), black_box(num_qubits - 1)).unwrap();
                });
            },
        );
    }

    group.finish();
}

fn bench_register_arithmetic(c: &mut Criterion) {
    let mut group = c.benchmark_group("register_arithmetic");

    for num_qubits in [10usize, 14, 18] {
        group.throughput(Throughput::Elements(1u64 << num_qubits));
        group.bench_with_input(
            BenchmarkId::new("inc", num_qubits),
            &num_qubits,
            |b, &num_qubits| {
                let mut reg = seeded(num_qubits);
                b.iter(|| {
                    reg.inc(black_box(3), 0, num_qubits).unwrap();
                });
            },
        );
        group.bench_with_input(
            BenchmarkId::new("rol", num_qubits),
            &num_qubits,
            |b, &num_qubits| {
                let mut reg = seeded(num_qubits);
                b.iter(|| {
                    reg.rol(black_box(1), 0, num_qubits).unwrap();
                });
            },
        );
    }

    group.finish();
}

fn bench_qft(c: &mut Criterion) {
    let mut group = c.benchmark_group("qft");
    group.sample_size(20);

    for num_qubits in [8usize, 12] {
        group.bench_with_input(
            BenchmarkId::from_parameter(num_qubits),
            &num_qubits,
            |b, &num_qubits| {
                let mut reg = seeded(num_qubits);
                b.iter(|| {
                    reg.qft(0, num_qubits).unwrap();
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_single_qubit_gates,
    bench_controlled_gates,
    bench_register_arithmetic,
    bench_qft
);
criterion_main!(benches);
