//! Storage operation metrics.

use std::time::Instant;

/// Records the outcome and latency of a unit of work.
///
/// Emits `storage_operations_total` (by operation and status) and
/// `storage_operation_duration_ms`.
pub fn record_operation_metrics<T, E>(
    operation: &'static str,
    start: Instant,
    result: &Result<T, E>,
) {
    let status = if result.is_ok() { "success" } else { "error" };
    metrics::counter!(
        "storage_operations_total",
        "backend" => "sqlite",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "storage_operation_duration_ms",
        "backend" => "sqlite",
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_without_recorder_is_noop() {
        // No global recorder is installed in unit tests; recording must not panic.
        let ok: Result<(), ()> = Ok(());
        record_operation_metrics("get_student", Instant::now(), &ok);
        let err: Result<(), ()> = Err(());
        record_operation_metrics("get_student", Instant::now(), &err);
    }
}
