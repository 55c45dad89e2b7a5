//! Tokenizer, framing and response writer benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use devobj_protocol::{encode_line, tokenize, LineDecoder, ResponseWriter, Status, Token};

fn read_request(names: usize) -> String {
    let list = (0..names)
        .map(|i| format!("\"Object_{}\"", i))
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{}]", list)
}

fn write_request(pairs: usize) -> String {
    let body = (0..pairs)
        .map(|i| format!("\"Object_{}\": {}.25", i, i))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{}}}", body)
}

fn bench_tokenize(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenize");
    let mut tokens = vec![Token::EMPTY; 128];

    for count in [1, 8, 32] {
        let read = read_request(count);
        group.throughput(Throughput::Bytes(read.len() as u64));
        group.bench_with_input(BenchmarkId::new("read", count), &read, |b, text| {
            b.iter(|| black_box(tokenize(text, &mut tokens).unwrap()));
        });

        let write = write_request(count);
        group.throughput(Throughput::Bytes(write.len() as u64));
        group.bench_with_input(BenchmarkId::new("write", count), &write, |b, text| {
            b.iter(|| black_box(tokenize(text, &mut tokens).unwrap()));
        });
    }

    group.finish();
}

fn bench_line_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("line_decode");

    for lines in [1, 16, 128] {
        let mut data = Vec::new();
        for i in 0..lines {
            data.extend_from_slice(&encode_line(&format!("!read \"Object_{}\"", i)));
        }

        group.throughput(Throughput::Elements(lines as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lines), &data, |b, data| {
            b.iter(|| {
                let mut decoder = LineDecoder::new(1024);
                decoder.extend(data);
                let mut count = 0;
                while let Ok(Some(line)) = decoder.decode_line() {
                    black_box(line);
                    count += 1;
                }
                count
            });
        });
    }

    group.finish();
}

fn bench_response_writer(c: &mut Criterion) {
    let mut group = c.benchmark_group("response_writer");
    let mut buf = vec![0u8; 512];

    group.bench_function("array_of_values", |b| {
        b.iter(|| {
            let mut resp = ResponseWriter::new(&mut buf);
            resp.status(Status::Success);
            resp.append(" ").unwrap();
            resp.open_array().unwrap();
            for i in 0..16 {
                resp.append_fmt(format_args!("{:.2}, ", black_box(i as f32 * 1.5)))
                    .unwrap();
            }
            resp.trim_separator();
            resp.close_array().unwrap();
            black_box(resp.len())
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_tokenize,
    bench_line_decode,
    bench_response_writer,
);
criterion_main!(benches);
