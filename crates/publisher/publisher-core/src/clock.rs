use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock milliseconds since the epoch, truncated to the 32-bit wire
/// timestamp. Wraps roughly every 49.7 days.
pub fn wall_clock_ms() -> u32 {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    since_epoch.as_millis() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successive_reads_advance_modulo_wrap() {
        let a = wall_clock_ms();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let b = wall_clock_ms();
        assert!(b.wrapping_sub(a) >= 4, "a={a} b={b}");
        assert!(b.wrapping_sub(a) < 1_000);
    }
}
