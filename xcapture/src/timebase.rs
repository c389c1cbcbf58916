//! Monotonic to wall-clock correlation
//!
//! All kernel-side timestamps are CLOCK_MONOTONIC nanoseconds. At startup a
//! single (monotonic, wall) pair is captured; every record timestamp is then
//! rendered as `wall_base + (t_mono - mono_base)`. The delta is signed: the
//! iterator's pass-wide timestamp is taken before per-task visit timestamps,
//! so small negative intervals are possible downstream and are rendered
//! verbatim, not clamped.

use chrono::{DateTime, Duration, Local};

use crate::domain::CaptureError;

#[derive(Debug, Clone, Copy)]
pub struct TimeBase {
    wall_base: DateTime<Local>,
    mono_base_ns: u64,
}

impl TimeBase {
    /// Capture the correlation base. Fatal when the monotonic clock cannot
    /// be read: without the base no timestamp can be rendered.
    pub fn establish() -> Result<Self, CaptureError> {
        let mono_base_ns = monotonic_now_ns().ok_or(CaptureError::ClockUnavailable)?;
        Ok(Self { wall_base: Local::now(), mono_base_ns })
    }

    /// Build a base from fixed values (tests).
    #[must_use]
    pub fn with_bases(wall_base: DateTime<Local>, mono_base_ns: u64) -> Self {
        Self { wall_base, mono_base_ns }
    }

    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn wall_from_mono(&self, mono_ns: u64) -> DateTime<Local> {
        let delta_ns = mono_ns as i64 - self.mono_base_ns as i64;
        self.wall_base + Duration::nanoseconds(delta_ns)
    }

    /// Microsecond-resolution timestamp for CSV rows.
    #[must_use]
    pub fn format_timestamp(wall: &DateTime<Local>) -> String {
        wall.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
    }

    /// Hour key used for file rotation, e.g. `2026-08-01.14`.
    #[must_use]
    pub fn hour_key(wall: &DateTime<Local>) -> String {
        wall.format("%Y-%m-%d.%H").to_string()
    }
}

/// CLOCK_MONOTONIC in nanoseconds.
#[must_use]
#[allow(unsafe_code, clippy::cast_sign_loss)]
pub fn monotonic_now_ns() -> Option<u64> {
    let mut ts = libc::timespec { tv_sec: 0, tv_nsec: 0 };
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    if rc != 0 {
        return None;
    }
    Some(ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_base() -> TimeBase {
        let wall = Local.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        TimeBase::with_bases(wall, 1_000_000_000)
    }

    #[test]
    fn test_wall_conversion() {
        let tb = fixed_base();
        let wall = tb.wall_from_mono(1_000_000_000 + 1_500_000);
        assert_eq!(TimeBase::format_timestamp(&wall), "2026-08-01 12:00:00.001500");
    }

    #[test]
    fn test_negative_delta_preserved() {
        // Timestamps captured before the base render as earlier wall times.
        let tb = fixed_base();
        let wall = tb.wall_from_mono(999_000_000);
        assert_eq!(TimeBase::format_timestamp(&wall), "2026-08-01 11:59:59.999000");
    }

    #[test]
    fn test_hour_key() {
        let tb = fixed_base();
        let wall = tb.wall_from_mono(1_000_000_000);
        assert_eq!(TimeBase::hour_key(&wall), "2026-08-01.12");
    }

    #[test]
    fn test_monotonic_clock_available() {
        let a = monotonic_now_ns().unwrap();
        let b = monotonic_now_ns().unwrap();
        assert!(b >= a);
    }
}
