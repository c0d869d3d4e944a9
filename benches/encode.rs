use bulk_index::{BulkIndexRequest, OP_CREATE};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use serde::Serialize;

#[derive(Serialize, Clone)]
struct LogLine {
    host: String,
    level: &'static str,
    message: String,
    tags: Vec<String>,
    code: u32,
    latency: f64,
}

fn log_line(i: usize) -> LogLine {
    LogLine {
        host: format!("host-{}", i % 16),
        level: "info",
        message: format!("request {} completed without incident", i),
        tags: vec!["web".to_string(), "edge".to_string()],
        code: 200,
        latency: 0.0125 * i as f64,
    }
}

fn request(i: usize) -> BulkIndexRequest<LogLine> {
    let mut req = BulkIndexRequest::new();
    req.op_type(OP_CREATE)
        .index("logs-2024.01")
        .id(i.to_string())
        .routing("edge")
        .retry_on_conflict(3)
        .pipeline("logs")
        .doc(log_line(i));
    req
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Elements(1));

    group.bench_function("struct_doc", |b| {
        let req = request(7);
        b.iter(|| {
            // A fresh clone has no cached lines
            let mut req = req.clone();
            black_box(req.source().unwrap()[1].len())
        })
    });

    group.bench_function("raw_doc", |b| {
        let raw = serde_json::to_string(&serde_json::json!({
            "host": "host-7", "level": "info", "code": 200
        }))
        .unwrap();
        let mut req: BulkIndexRequest = BulkIndexRequest::new();
        req.index("logs-2024.01").id("7");
        b.iter(|| {
            req.doc_str(raw.as_str());
            black_box(req.source().unwrap()[1].len())
        })
    });

    group.bench_function("cached", |b| {
        let mut req = request(7);
        req.source().unwrap();
        b.iter(|| black_box(req.source().unwrap()[0].len()))
    });

    group.finish();
}

fn bench_body(c: &mut Criterion) {
    let mut group = c.benchmark_group("body");

    for count in [100, 1000] {
        let reqs: Vec<_> = (0..count).map(request).collect();
        group.throughput(Throughput::Elements(count as u64));
        group.bench_function(format!("{}_actions", count), |b| {
            b.iter(|| {
                let mut body = String::new();
                for req in reqs.iter() {
                    let mut req = req.clone();
                    for line in req.source().unwrap() {
                        body.push_str(line);
                        body.push('\n');
                    }
                }
                black_box(body)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_body);
criterion_main!(benches);
