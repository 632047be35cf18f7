//! Protocol time base.
//!
//! The server counts seconds since 2000 on a simplified calendar where every
//! year has 365 days and every month 30 days. Tokens are only accepted when
//! computed on exactly this scale.

use chrono::{Datelike, Local, Timelike};

const SECONDS_PER_YEAR: i64 = 31_536_000;
const SECONDS_PER_MONTH: i64 = 2_592_000;
const SECONDS_PER_DAY: i64 = 86_400;

/// Protocol epoch of a wall-clock time.
pub fn protocol_epoch<T: Datelike + Timelike>(at: &T) -> u32 {
    let seconds = (at.year() as i64 - 2000) * SECONDS_PER_YEAR
        + at.month0() as i64 * SECONDS_PER_MONTH
        + at.day0() as i64 * SECONDS_PER_DAY
        + at.hour() as i64 * 3600
        + at.minute() as i64 * 60
        + at.second() as i64;
    seconds as u32
}

/// Source of the current protocol epoch.
pub trait Clock {
    fn now(&self) -> u32;
}

/// Local wall clock, as the official client uses.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u32 {
        protocol_epoch(&Local::now())
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> u32 {
        (**self).now()
    }
}
