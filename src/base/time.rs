use std::sync::OnceLock;
use std::time::{Duration, Instant};

static ORIGIN: OnceLock<Instant> = OnceLock::new();

fn origin() -> Instant {
    *ORIGIN.get_or_init(Instant::now)
}

/// 单调相对时间（秒），起点为进程内第一次调用
pub fn relative_time() -> f64 {
    origin().elapsed().as_secs_f64()
}

/// 单调相对时间（微秒）
pub fn relative_time_us() -> i64 {
    origin().elapsed().as_micros() as i64
}

/// 秒转 Duration，负数和 NaN 视为 0，溢出时取 `Duration::MAX`
pub fn duration_from_secs(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_time_is_monotonic() {
        let a = relative_time();
        std::thread::sleep(Duration::from_millis(5));
        let b = relative_time();
        assert!(b > a);
        assert!(relative_time_us() >= (b * 1_000_000.0) as i64);
    }

    #[test]
    fn test_duration_from_secs_clamps() {
        assert_eq!(duration_from_secs(-1.0), Duration::ZERO);
        assert_eq!(duration_from_secs(f64::NAN), Duration::ZERO);
        assert_eq!(duration_from_secs(0.25), Duration::from_millis(250));
    }

    #[test]
    fn test_duration_from_secs_saturates() {
        assert_eq!(duration_from_secs(1e20), Duration::MAX);
        assert_eq!(duration_from_secs(f64::INFINITY), Duration::MAX);
    }
}
