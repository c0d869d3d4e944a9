#![no_main]
use bulk_index::BulkIndexRequest;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let mut parts = text.split('\u{0}');
    let mut req: BulkIndexRequest = BulkIndexRequest::new();
    if let Some(op) = parts.next() {
        req.op_type(op);
    }
    if let Some(id) = parts.next() {
        req.id(id);
    }
    if let Some(pipeline) = parts.next() {
        req.pipeline(pipeline);
    }
    req.retry_on_conflict(data.len() as i64).doc_bytes(data);
    let lines = req.source().expect("raw documents never fail");
    serde_json::from_str::<serde_json::Value>(&lines[0]).expect("action line must be valid JSON");
    if let Ok(raw) = std::str::from_utf8(data) {
        assert_eq!(lines[1], raw);
    }
});
