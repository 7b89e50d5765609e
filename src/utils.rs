//! Wall-clock timestamps in the Windows FILETIME convention.
//!
//! Journal records carry 100 ns ticks since 1601-01-01 UTC so that consumers
//! on every platform read the same clock.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// 100 ns ticks between 1601-01-01 and 1970-01-01.
pub const FILETIME_UNIX_EPOCH_OFFSET: i64 = 116_444_736_000_000_000;

const TICKS_PER_SECOND: i64 = 10_000_000;
const NANOS_PER_TICK: u32 = 100;

/// Current wall-clock time as FILETIME ticks.
#[must_use]
pub fn current_filetime() -> i64 {
    filetime_from_system_time(SystemTime::now())
}

/// Converts a [`SystemTime`] to FILETIME ticks, saturating at the bounds of
/// `i64` and never going below the FILETIME epoch.
#[must_use]
pub fn filetime_from_system_time(time: SystemTime) -> i64 {
    let ticks = match time.duration_since(UNIX_EPOCH) {
        Ok(after) => FILETIME_UNIX_EPOCH_OFFSET.saturating_add(duration_to_ticks(after)),
        Err(before) => {
            FILETIME_UNIX_EPOCH_OFFSET.saturating_sub(duration_to_ticks(before.duration()))
        }
    };
    ticks.max(0)
}

/// Converts FILETIME ticks back to a [`SystemTime`].
#[must_use]
pub fn system_time_from_filetime(ticks: i64) -> SystemTime {
    let since_unix = ticks.saturating_sub(FILETIME_UNIX_EPOCH_OFFSET);
    let magnitude = since_unix.unsigned_abs();
    let secs = magnitude / TICKS_PER_SECOND as u64;
    let nanos = (magnitude % TICKS_PER_SECOND as u64) as u32 * NANOS_PER_TICK;
    let duration = Duration::new(secs, nanos);
    if since_unix >= 0 {
        UNIX_EPOCH + duration
    } else {
        UNIX_EPOCH - duration
    }
}

fn duration_to_ticks(duration: Duration) -> i64 {
    let ticks = duration.as_nanos() / u128::from(NANOS_PER_TICK);
    i64::try_from(ticks).unwrap_or(i64::MAX)
}
