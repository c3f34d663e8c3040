//! Key helpers for prefix operations.

/// Rewrite `key` from under `source_prefix` to under `destination_prefix`.
///
/// Returns `None` when `key` does not start with `source_prefix`. Matching
/// is a plain string-prefix test.
pub fn rebase_key(key: &str, source_prefix: &str, destination_prefix: &str) -> Option<String> {
    key.strip_prefix(source_prefix)
        .map(|rest| format!("{destination_prefix}{rest}"))
}
