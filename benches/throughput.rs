use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ring_pipeline::{CollectSink, PipelineBuilder, RingBuffer};
use std::io::Cursor;
use std::time::Duration;

fn benchmark_push_pop(c: &mut Criterion) {
    c.bench_function("push_pop_under_capacity", |b| {
        let buffer = RingBuffer::new(1024);
        b.iter(|| {
            for i in 0..512i64 {
                buffer.push(black_box(i));
            }
            while let Some(v) = buffer.pop() {
                black_box(v);
            }
        });
    });
}

fn benchmark_overwrite(c: &mut Criterion) {
    c.bench_function("push_overwrite_full_buffer", |b| {
        let buffer = RingBuffer::new(3);
        b.iter(|| {
            for i in 0..1000i64 {
                black_box(buffer.push(black_box(i)));
            }
        });
    });
}

fn benchmark_pipeline_run(c: &mut Criterion) {
    let line = (1..=1000)
        .map(|n: i64| n.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    let input = format!("{line}\nend\n");

    c.bench_function("pipeline_1000_tokens", |b| {
        b.iter(|| {
            let report = PipelineBuilder::new()
                .with_capacity(64)
                .with_poll_interval(Duration::ZERO)
                .build()
                .expect("Build failed")
                .run(Cursor::new(input.clone()), CollectSink::new())
                .expect("Run failed");
            black_box(report.delivered);
        });
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(10));
    targets = benchmark_push_pop, benchmark_overwrite, benchmark_pipeline_run
);
criterion_main!(benches);
