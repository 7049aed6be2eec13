use std::time::Duration;

/// Transfer rate in KiB/s for `bytes` moved in `elapsed`. A zero duration
/// yields zero rather than infinity so the value is always printable.
pub fn kib_per_sec(bytes: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs == 0.0 {
        0.0
    } else {
        bytes as f64 / secs / 1024.0
    }
}

/// Format a transfer as "`bytes` bytes in `us` us -> `rate` KiB/s".
pub fn describe_transfer(bytes: usize, elapsed: Duration) -> String {
    format!("{} bytes in {} us -> {:.3} KiB/s",
            bytes, elapsed.as_micros(), kib_per_sec(bytes, elapsed))
}
