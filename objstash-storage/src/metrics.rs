//! Operation counters shared by all backends.

use metrics::counter;

pub(crate) fn record_op(backend: &'static str, op: &'static str) {
    counter!("objstash_operations_total", "backend" => backend, "op" => op).increment(1);
}

pub(crate) fn record_read(backend: &'static str, bytes: usize) {
    counter!("objstash_bytes_read_total", "backend" => backend).increment(bytes as u64);
}

pub(crate) fn record_write(backend: &'static str, bytes: usize) {
    counter!("objstash_bytes_written_total", "backend" => backend).increment(bytes as u64);
}
