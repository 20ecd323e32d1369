use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pefseq::Sequence;

// Deterministic pseudo-random sorted values (splitmix64).
fn sorted_values(n: usize, modulus: u64) -> Vec<u64> {
    let mut state = 0xDEAD_BEEFu64;
    let mut out: Vec<u64> = (0..n)
        .map(|_| {
            state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
            let mut z = state;
            z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
            (z ^ (z >> 31)) % modulus
        })
        .collect();
    out.sort_unstable();
    out
}

fn bench_sequence(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequence");
    let values = sorted_values(1 << 17, 1 << 24);
    let seq = Sequence::from_values(&values, 128).unwrap();

    group.bench_function("construct", |b| {
        b.iter(|| Sequence::from_values(black_box(&values), 128).unwrap())
    });

    group.bench_function("decode", |b| b.iter(|| black_box(seq.decode())));

    group.bench_function("decode_block", |b| {
        b.iter(|| {
            for i in 0..seq.num_blocks() {
                black_box(seq.decode_block(i).unwrap());
            }
        })
    });

    group.bench_function("get", |b| {
        b.iter(|| {
            for i in (0..seq.len()).step_by(101) {
                black_box(seq.get(i).unwrap());
            }
        })
    });

    group.bench_function("serialize", |b| b.iter(|| black_box(seq.serialize())));
    group.finish();
}

fn bench_set_algebra(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_algebra");
    let a = Sequence::from_values(&sorted_values(1 << 16, 1 << 20), 128).unwrap();
    let b = Sequence::from_values(&sorted_values(1 << 16, 1 << 20), 128).unwrap();

    group.bench_function("intersect", |bch| bch.iter(|| black_box(a.intersect(&b))));
    group.bench_function("union", |bch| bch.iter(|| black_box(a.union(&b))));
    group.bench_function("unique", |bch| bch.iter(|| black_box(a.unique())));
    group.finish();
}

criterion_group!(benches, bench_sequence, bench_set_algebra);
criterion_main!(benches);
