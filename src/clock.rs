//! Nanosecond timespec arithmetic for the sampler and the manager pacing
//! loop. All helpers saturate instead of wrapping; peak-style fields are
//! only ever updated through [`ts_max_assign`] so they stay non-decreasing.

use nix::sys::time::{TimeSpec, TimeValLike};

pub fn ts_zero() -> TimeSpec {
    TimeSpec::nanoseconds(0)
}

/// a + b, clamped at the representable maximum.
pub fn ts_add(a: TimeSpec, b: TimeSpec) -> TimeSpec {
    match a.num_nanoseconds().checked_add(b.num_nanoseconds()) {
        Some(ns) => TimeSpec::nanoseconds(ns),
        None => TimeSpec::nanoseconds(i64::max_value()),
    }
}

/// a - b, clamped at zero.
pub fn ts_sub(a: TimeSpec, b: TimeSpec) -> TimeSpec {
    if a < b {
        ts_zero()
    } else {
        a - b
    }
}

/// Monotone-max update: `dst` never decreases.
pub fn ts_max_assign(dst: &mut TimeSpec, val: TimeSpec) {
    if *dst < val {
        *dst = val;
    }
}

pub fn ts2ms(ts: TimeSpec) -> u64 {
    (ts.tv_sec() as u64) * 1000 + (ts.tv_nsec() as u64) / 1_000_000
}

/// Fractional milliseconds, for the PID controller arithmetic.
pub fn fts2ms(ts: TimeSpec) -> f64 {
    1000.0 * ts.tv_sec() as f64 + 0.000_001 * ts.tv_nsec() as f64
}

pub fn ms2ts(ms: f64) -> TimeSpec {
    TimeSpec::nanoseconds((ms * 1_000_000.0) as i64)
}

/// Convert a clock-tick counter from /proc into a nanosecond timespec.
pub fn ts_from_ticks(ticks: u64, ticks_per_sec: u64) -> TimeSpec {
    let sec = (ticks / ticks_per_sec) as i64;
    let nsec = (1_000_000_000u64 * (ticks % ticks_per_sec) / ticks_per_sec) as i64;
    TimeSpec::nanoseconds(sec * 1_000_000_000 + nsec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_saturates_at_zero() {
        let a = TimeSpec::nanoseconds(5);
        let b = TimeSpec::nanoseconds(7);
        assert_eq!(ts_sub(a, b), ts_zero());
        assert_eq!(ts_sub(b, a), TimeSpec::nanoseconds(2));
    }

    #[test]
    fn max_assign_is_monotone() {
        let mut peak = ts_zero();
        for &ns in &[10i64, 50, 20, 50, 49] {
            ts_max_assign(&mut peak, TimeSpec::nanoseconds(ns));
        }
        assert_eq!(peak, TimeSpec::nanoseconds(50));
    }

    #[test]
    fn millisecond_conversions() {
        let ts = TimeSpec::nanoseconds(2_500_000_000);
        assert_eq!(ts2ms(ts), 2500);
        assert!((fts2ms(ts) - 2500.0).abs() < 1e-9);
        assert_eq!(ms2ts(2500.0), ts);
    }

    #[test]
    fn tick_conversion_keeps_subsecond_precision() {
        // 150 ticks at 100 Hz is 1.5s
        let ts = ts_from_ticks(150, 100);
        assert_eq!(ts.tv_sec(), 1);
        assert_eq!(ts.tv_nsec(), 500_000_000);
    }
}
