use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rdbscan::{CallbackHandler, CountHandler, Session, StreamingParser};

fn push_string(
    out: &mut Vec<u8>,
    s: &[u8],
) {
    assert!(s.len() < 64);
    out.push(s.len() as u8);
    out.extend_from_slice(s);
}

/// Дамп из `n` записей разных типов, включая int- и LZF-строки.
fn build_dump(n: usize) -> Vec<u8> {
    let mut out = b"REDIS0006".to_vec();
    out.extend_from_slice(&[0xFE, 0x00]);

    let payload = vec![b'x'; 512];
    let compressed = lzf::compress(&payload).expect("compressible payload");

    for i in 0..n {
        let key = format!("key_{i:06}");
        match i % 5 {
            0 => {
                out.push(0x00);
                push_string(&mut out, key.as_bytes());
                push_string(&mut out, format!("value_{i}").as_bytes());
            }
            1 => {
                out.push(0xFC);
                out.extend_from_slice(&(1_700_000_000_000u64 + i as u64).to_le_bytes());
                out.push(0x00);
                push_string(&mut out, key.as_bytes());
                out.push(0xC2);
                out.extend_from_slice(&(i as i32).to_le_bytes());
            }
            2 => {
                out.push(0x04);
                push_string(&mut out, key.as_bytes());
                out.push(10);
                for j in 0..10 {
                    push_string(&mut out, format!("field_{j}").as_bytes());
                    push_string(&mut out, format!("val_{j}").as_bytes());
                }
            }
            3 => {
                out.push(0x03);
                push_string(&mut out, key.as_bytes());
                out.push(8);
                for j in (0..8).rev() {
                    push_string(&mut out, format!("m{j}").as_bytes());
                    push_string(&mut out, format!("{j}.5").as_bytes());
                }
            }
            _ => {
                out.push(0x00);
                push_string(&mut out, key.as_bytes());
                out.push(0xC3);
                for len in [compressed.len(), payload.len()] {
                    out.push(0x40 | (len >> 8) as u8);
                    out.push(len as u8);
                }
                out.extend_from_slice(&compressed);
            }
        }
    }

    out.push(0xFF);
    out.extend_from_slice(&[0u8; 8]);
    out
}

fn bench_whole_dump(c: &mut Criterion) {
    let mut group = c.benchmark_group("whole_dump");

    for &n in &[100usize, 1_000, 10_000] {
        let data = build_dump(n);
        let decoded = Session::from_bytes(data.clone())
            .and_then(|s| s.collect::<Result<Vec<_>, _>>())
            .expect("sanity decode failed");
        assert_eq!(decoded.len(), n, "sanity: record count mismatch");

        group.throughput(Throughput::Bytes(data.len() as u64));

        group.bench_with_input(BenchmarkId::new("iterator/collect", n), &data, |b, data| {
            b.iter(|| {
                let session = Session::from_bytes(black_box(data.clone())).unwrap();
                session.collect::<Result<Vec<_>, _>>().unwrap()
            })
        });

        group.bench_with_input(BenchmarkId::new("streaming/count", n), &data, |b, data| {
            b.iter(|| {
                let mut parser = StreamingParser::from_bytes(black_box(data.clone()));
                let mut handler = CountHandler::new();
                parser.parse(&mut handler).unwrap();
                handler.total_records()
            })
        });

        group.bench_with_input(BenchmarkId::new("streaming/callback", n), &data, |b, data| {
            b.iter(|| {
                let mut key_bytes = 0usize;
                let mut parser = StreamingParser::from_bytes(black_box(data.clone()));
                let mut handler = CallbackHandler::new(|record| {
                    key_bytes += record.key.len();
                    Ok(())
                });
                parser.parse(&mut handler).unwrap();
                drop(handler);
                key_bytes
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_whole_dump);
criterion_main!(benches);
