use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use primix::Predictor;

const SAMPLE: &[u8] = b"It was the best of times, it was the worst of times, it was the age \
of wisdom, it was the age of foolishness, it was the epoch of belief, it was the epoch of \
incredulity, it was the season of Light, it was the season of Darkness.";

fn bench_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("predictor");
    group.sample_size(10);
    group.throughput(Throughput::Bytes(SAMPLE.len() as u64));
    group.bench_function("predict_perceive", |b| {
        let mut p = Predictor::new([true; 256]).unwrap();
        b.iter(|| {
            for &byte in SAMPLE {
                for i in 0..8 {
                    let bit = (byte >> (7 - i)) & 1;
                    let _ = p.predict();
                    p.perceive(bit);
                }
            }
        });
    });
    group.finish();
}

criterion_group!(benches, bench_predict);
criterion_main!(benches);
