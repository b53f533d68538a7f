use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use pulsar::wire::RawRequest;

fn simple_request_parse_benchmark(c: &mut Criterion) {
    let request = b"GET / HTTP/1.1\r\nHost: localhost:8080\r\nUser-Agent: Test\r\n\r\n";

    c.bench_function("simple_request_parse", |b| {
        b.iter(|| {
            let _ = RawRequest::try_from(black_box(request), 0).unwrap();
        });
    });
}

fn complex_request_parse_benchmark(c: &mut Criterion) {
    let request = b"GET /api/v1/users/42?page=3&sort=name HTTP/1.1\r\n\
                    Host: localhost:8080\r\n\
                    User-Agent: Mozilla/5.0 (Windows NT 10.0; Win64; x64)\r\n\
                    Accept: application/json\r\n\
                    Accept-Language: en-US,en;q=0.9\r\n\
                    Accept-Encoding: gzip, deflate, br\r\n\
                    X-Token: secret\r\n\
                    \r\n";

    c.bench_function("complex_request_parse", |b| {
        b.iter(|| {
            let _ = RawRequest::try_from(black_box(request), 0).unwrap();
        });
    });
}

fn request_parse_body_size_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_parse_body_size");

    for size in [0usize, 1024, 64 * 1024].iter() {
        let mut request = format!(
            "POST /api/v1/users HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n",
            size
        )
        .into_bytes();
        request.extend(std::iter::repeat(b'x').take(*size));

        group.bench_with_input(BenchmarkId::from_parameter(size), &request, |b, request| {
            b.iter(|| {
                let _ = RawRequest::try_from(black_box(request), 0).unwrap();
            });
        });
    }

    group.finish();
}

fn accept_encoding_benchmark(c: &mut Criterion) {
    let request = RawRequest::try_from(
        b"GET / HTTP/1.1\r\nAccept-Encoding: gzip;q=0.8, deflate, br\r\n\r\n",
        0,
    )
    .unwrap();

    c.bench_function("accept_encoding", |b| {
        b.iter(|| black_box(&request).accept_encoding());
    });
}

criterion_group!(
    benches,
    simple_request_parse_benchmark,
    complex_request_parse_benchmark,
    request_parse_body_size_benchmark,
    accept_encoding_benchmark
);
criterion_main!(benches);
