use btxz::codec::{Codec, CompressionLevel, XzCodec, ZstdCodec};
use btxz::crypto::{derive_key, random_salt};
use btxz::header::KdfParams;
use btxz::{create_archive_with, CreateOptions};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::fs;

fn bench_compression(c: &mut Criterion) {
    let data: Vec<u8> = (0..1024 * 1024u32).map(|i| (i % 251) as u8).collect();

    for level in [CompressionLevel::Fastest, CompressionLevel::Default, CompressionLevel::Best] {
        c.bench_function(&format!("zstd_compress_1mb_{level}"), |b| {
            b.iter(|| ZstdCodec.compress(black_box(&data), level).unwrap())
        });
    }
    c.bench_function("xz_compress_1mb", |b| {
        b.iter(|| XzCodec.compress(black_box(&data), CompressionLevel::Default).unwrap())
    });
}

fn bench_key_derivation(c: &mut Criterion) {
    let salt = random_salt();
    let cheap = KdfParams { time_cost: 1, memory_kib: 8 * 1024, parallelism: 1 };
    c.bench_function("argon2id_8mib", |b| {
        b.iter(|| derive_key(black_box(b"password"), &salt, &cheap).unwrap())
    });
}

fn bench_create_v2(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bench.bin");
    fs::write(&input, vec![42u8; 1024 * 1024]).unwrap();
    let dest = dir.path().join("bench.btxz");
    let opts = CreateOptions {
        level: CompressionLevel::Default,
        kdf:   KdfParams { time_cost: 1, memory_kib: 64, parallelism: 1 },
    };

    c.bench_function("create_v2_1mb", |b| {
        b.iter(|| create_archive_with(&dest, &[&input], "pw", black_box(&opts)).unwrap())
    });
}

criterion_group!(benches, bench_compression, bench_key_derivation, bench_create_v2);
criterion_main!(benches);
