use bandpack_format::{CodingChooser, CodingMethod, DELTA5, UNSIGNED5};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn create_band(count: usize, spread: i32) -> Vec<i32> {
    (0..count as i32)
        .map(|i| 1_000 + (i * 7919) % spread + i / 3)
        .collect()
}

fn bench_write_array(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_array");

    for count in [1_000, 100_000] {
        let values = create_band(count, 5_000);
        for coding in [UNSIGNED5, DELTA5] {
            group.bench_with_input(
                BenchmarkId::from_parameter(format!("{}_{}", count, coding)),
                &values,
                |b, values| {
                    b.iter(|| {
                        let mut out = Vec::with_capacity(values.len() * 2);
                        coding.write_array_to(&mut out, black_box(values)).unwrap();
                        black_box(out);
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_read_array(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_array");

    for count in [1_000, 100_000] {
        let values = create_band(count, 5_000);
        let mut bytes = Vec::new();
        DELTA5.write_array_to(&mut bytes, &values).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(count), &bytes, |b, bytes| {
            b.iter(|| {
                let mut decoded = vec![0i32; count];
                DELTA5
                    .read_array_from(&mut black_box(bytes.as_slice()), &mut decoded)
                    .unwrap();
                black_box(decoded);
            });
        });
    }

    group.finish();
}

fn bench_chooser(c: &mut Criterion) {
    let mut group = c.benchmark_group("chooser");
    let values = create_band(10_000, 300);

    for effort in [1u8, 5, 7, 9] {
        group.bench_with_input(BenchmarkId::from_parameter(effort), &values, |b, values| {
            b.iter(|| {
                let mut chooser = CodingChooser::new(effort);
                let choice = chooser.choose(black_box(values), &UNSIGNED5).unwrap();
                black_box(matches!(choice.method, CodingMethod::Coding(_)));
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_write_array, bench_read_array, bench_chooser);
criterion_main!(benches);
