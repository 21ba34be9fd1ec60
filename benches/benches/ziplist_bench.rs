use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rdbscan::engine::rdb::{decode_ziplist, decode_ziplist_hash, decode_zipmap};

/// Ziplist из `n` записей: чётные записи строки, нечётные целые разной
/// ширины.
fn build_ziplist(n: usize) -> Vec<u8> {
    let mut body = Vec::new();
    for i in 0..n {
        body.push(0x00);
        if i % 2 == 0 {
            let s = format!("field_{i:05}");
            body.push(s.len() as u8);
            body.extend_from_slice(s.as_bytes());
        } else if i % 4 == 1 {
            body.push(0xF1 + (i % 13) as u8);
        } else {
            body.push(0xD0);
            body.extend_from_slice(&(i as i32 * 1000).to_le_bytes());
        }
    }
    let mut out = vec![0u8; 8];
    out.extend_from_slice(&(n as u16).to_le_bytes());
    out.extend(body);
    out.push(0xFF);
    out
}

fn build_zipmap(n: usize) -> Vec<u8> {
    let mut out = vec![n.min(253) as u8];
    for i in 0..n {
        let k = format!("k{i}");
        let v = format!("value_{i}");
        out.push(k.len() as u8);
        out.extend_from_slice(k.as_bytes());
        out.push(v.len() as u8);
        out.push(0);
        out.extend_from_slice(v.as_bytes());
    }
    out.push(0xFF);
    out
}

fn bench_packed_containers(c: &mut Criterion) {
    let mut group = c.benchmark_group("packed_containers");

    for &n in &[16usize, 128, 512] {
        let zl = build_ziplist(n);
        let zm = build_zipmap(n);
        assert_eq!(decode_ziplist(&zl).unwrap().len(), n, "sanity: ziplist");
        assert_eq!(decode_zipmap(&zm).unwrap().len(), n, "sanity: zipmap");

        group.throughput(Throughput::Elements(n as u64));

        group.bench_with_input(BenchmarkId::new("ziplist/list", n), &zl, |b, zl| {
            b.iter(|| decode_ziplist(black_box(zl)).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("ziplist/hash", n), &zl, |b, zl| {
            b.iter(|| decode_ziplist_hash(black_box(zl)).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("zipmap", n), &zm, |b, zm| {
            b.iter(|| decode_zipmap(black_box(zm)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_packed_containers);
criterion_main!(benches);
