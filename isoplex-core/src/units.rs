// Isoplex
// Copyright (c) 2026 The Project Isoplex Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `units` module provides definitions for common units.

use std::cmp::Ordering;
use std::fmt;

/// A `TimeStamp` represents an instantenous instant in time since the start of a track. One
/// `TimeStamp` "tick" is equivalent to the track's `TimeBase` in seconds.
pub type TimeStamp = u64;

/// A `Duration` indicates a positive span of time in ticks.
pub type Duration = u64;

/// `Time` represents a duration of time in seconds, or the number of seconds since an arbitrary
/// epoch. `Time` is stored as an integer number of seconds plus any remaining fraction of a second
/// as a floating point value.
#[derive(Copy, Clone, Debug, Default, PartialEq, PartialOrd)]
pub struct Time {
    pub seconds: u64,
    pub frac: f64,
}

impl Time {
    pub fn new(seconds: u64, frac: f64) -> Self {
        Time { seconds, frac }
    }

    /// Get the time as a number of seconds.
    pub fn as_secs_f64(&self) -> f64 {
        self.seconds as f64 + self.frac
    }
}

impl From<u32> for Time {
    fn from(seconds: u32) -> Self {
        Time::new(u64::from(seconds), 0.0)
    }
}

impl From<u64> for Time {
    fn from(seconds: u64) -> Self {
        Time::new(seconds, 0.0)
    }
}

impl From<f64> for Time {
    fn from(seconds: f64) -> Self {
        // Negative times, and NaN, clamp to 0.
        if seconds >= 0.0 {
            Time::new(seconds.trunc() as u64, seconds.fract())
        }
        else {
            Time::new(0, 0.0)
        }
    }
}

impl From<std::time::Duration> for Time {
    fn from(duration: std::time::Duration) -> Self {
        Time::new(duration.as_secs(), f64::from(duration.subsec_nanos()) / 1_000_000_000.0)
    }
}

/// A `TimeBase` is the conversion factor between time, expressed in seconds, and a `TimeStamp` or
/// `Duration`.
///
/// In other words, a `TimeBase` is the length in seconds of one tick of a `TimeStamp` or
/// `Duration`. For an ISO media track the time base is the reciprocal of the track's timescale.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimeBase {
    /// The numerator.
    pub numer: u32,
    /// The denominator.
    pub denom: u32,
}

impl TimeBase {
    /// Creates a new `TimeBase`. Panics if either the numerator or denominator is 0.
    pub fn new(numer: u32, denom: u32) -> Self {
        if numer == 0 || denom == 0 {
            panic!("TimeBase cannot have 0 numerator or denominator");
        }

        TimeBase { numer, denom }
    }

    /// Create a `TimeBase` of `1/timescale` seconds per tick. Returns `None` if the timescale is 0.
    pub fn from_timescale(timescale: u32) -> Option<Self> {
        if timescale == 0 {
            None
        }
        else {
            Some(TimeBase { numer: 1, denom: timescale })
        }
    }

    /// Accurately calculates a `Time` using the `TimeBase` and the provided `TimeStamp`. On
    /// overflow, the seconds field of `Time` wraps.
    pub fn calc_time(&self, ts: TimeStamp) -> Time {
        // The dividend requires up-to 96-bits (32-bit timebase numerator * 64-bit timestamp).
        let dividend = u128::from(ts) * u128::from(self.numer);

        // A 64-bit float can accurately represent a 52-bit integer. If the dividend fits, a plain
        // floating point division is exact enough.
        if dividend < (1 << 52) {
            let seconds = (dividend as f64) / f64::from(self.denom);

            Time::new(seconds.trunc() as u64, seconds.fract())
        }
        else {
            // Otherwise, calculate the integer portion using integer arithmetic, then calculate the
            // fractional part separately.
            let quotient = dividend / u128::from(self.denom);

            // The remainder never equals or exceeds the 32-bit denominator.
            let rem = (dividend - (quotient * u128::from(self.denom))) as u32;

            let frac = f64::from(rem) / f64::from(self.denom);

            Time::new(quotient as u64, frac)
        }
    }

    /// Calculates the number of seconds for a signed tick count, such as a composition offset.
    pub fn calc_secs_signed(&self, ticks: i64) -> f64 {
        let secs = self.calc_time(ticks.unsigned_abs()).as_secs_f64();

        if ticks < 0 {
            -secs
        }
        else {
            secs
        }
    }

    /// Accurately calculates a `TimeStamp` from the given `Time` using the `TimeBase` as the
    /// conversion factor. The result is rounded down to a whole tick, unless it is within floating
    /// point error of the next tick. On overflow, the `TimeStamp` saturates.
    pub fn calc_timestamp(&self, time: Time) -> TimeStamp {
        debug_assert!(time.frac >= 0.0 && time.frac < 1.0, "invalid range for fractional part");

        // Whole seconds are converted exactly with integer arithmetic.
        let whole = u128::from(time.seconds) * u128::from(self.denom) / u128::from(self.numer);

        // The fractional portion can be calculate directly using floating point arithemtic.
        let scale = f64::from(self.denom) / f64::from(self.numer);
        let ticks = time.frac * scale;

        // A time such as 0.29 is not exactly representable, and may fall just short of its tick.
        // The error is bounded by the scale.
        let nearest = ticks.round();

        let part = if (nearest - ticks).abs() <= scale.max(1.0) * 1e-12 { nearest } else { ticks };

        u64::try_from(whole + part as u128).unwrap_or(u64::MAX)
    }

    /// Converts the timestamp `ts` in this `TimeBase` to a timestamp in the `TimeBase` `to`, rounded
    /// down to a whole tick. The conversion is exact. On overflow, the `TimeStamp` saturates.
    pub fn rescale(&self, ts: TimeStamp, to: TimeBase) -> TimeStamp {
        // The dividend is less than 2^128 (64-bit timestamp * two 32-bit factors).
        let dividend = u128::from(ts) * u128::from(self.numer) * u128::from(to.denom);
        let divisor = u128::from(self.denom) * u128::from(to.numer);

        u64::try_from(dividend / divisor).unwrap_or(u64::MAX)
    }

    /// Compares the instants `a` and `b`, each in ticks of their own `TimeBase`, exactly.
    pub fn cmp_instants(a: (TimeStamp, TimeBase), b: (TimeStamp, TimeBase)) -> Ordering {
        // a.ts * a.numer / a.denom <=> b.ts * b.numer / b.denom. Each side is at most 128 bits.
        let lhs = u128::from(a.0) * u128::from(a.1.numer) * u128::from(b.1.denom);
        let rhs = u128::from(b.0) * u128::from(b.1.numer) * u128::from(a.1.denom);
        lhs.cmp(&rhs)
    }
}

impl From<TimeBase> for f64 {
    fn from(timebase: TimeBase) -> Self {
        f64::from(timebase.numer) / f64::from(timebase.denom)
    }
}

impl fmt::Display for TimeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numer, self.denom)
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use super::{Time, TimeBase};

    #[test]
    fn verify_timebase() {
        // Verify accuracy of timestamp -> time
        let tb1 = TimeBase::new(1, 320);

        assert_eq!(tb1.calc_time(0), Time::new(0, 0.0));
        assert_eq!(tb1.calc_time(12_345), Time::new(38, 0.578125));
        assert_eq!(tb1.calc_time(0x0f_ffff_ffff_ffff), Time::new(14_073_748_835_532, 0.796875));
        assert_eq!(tb1.calc_time(0x10_0000_0000_0001), Time::new(14_073_748_835_532, 0.803125));

        // Verify accuracy of time -> timestamp
        assert_eq!(tb1.calc_timestamp(Time::new(0, 0.0)), 0);
        assert_eq!(tb1.calc_timestamp(Time::new(38, 0.578125)), 12_345);
        assert_eq!(
            tb1.calc_timestamp(Time::new(14_073_748_835_532, 0.796875)),
            0x0f_ffff_ffff_ffff
        );
    }

    #[test]
    fn verify_timescale() {
        assert_eq!(TimeBase::from_timescale(0), None);

        let tb = TimeBase::from_timescale(1000).unwrap();
        assert_eq!(tb.calc_time(2000).as_secs_f64(), 2.0);
        assert_eq!(tb.calc_timestamp(Time::from(2.5)), 2500);
        assert_eq!(tb.calc_secs_signed(-500), -0.5);

        // Rounds down to a whole tick.
        assert_eq!(tb.calc_timestamp(Time::new(1, 0.0015)), 1001);
    }

    #[test]
    fn verify_calc_timestamp_exact_ticks() {
        // Every tick converted to seconds and back lands on the same tick.
        for timescale in [100, 1000, 30_000, 44_100, 90_000] {
            let tb = TimeBase::from_timescale(timescale).unwrap();

            for ts in 0..u64::from(timescale) * 2 {
                let secs = tb.calc_time(ts).as_secs_f64();
                assert_eq!(tb.calc_timestamp(Time::from(secs)), ts, "{}/{}", ts, timescale);
            }
        }

        let tb = TimeBase::from_timescale(100).unwrap();
        assert_eq!(tb.calc_timestamp(Time::from(0.29)), 29);
        assert_eq!(tb.calc_timestamp(Time::from(0.57)), 57);
    }

    #[test]
    fn verify_rescale() {
        let ms = TimeBase::from_timescale(1000).unwrap();
        let khz = TimeBase::from_timescale(44_100).unwrap();
        let cs = TimeBase::from_timescale(100).unwrap();

        assert_eq!(cs.rescale(29, ms), 290);
        assert_eq!(ms.rescale(290, cs), 29);
        assert_eq!(ms.rescale(299, cs), 29);
        assert_eq!(khz.rescale(44_100, ms), 1000);
        assert_eq!(ms.rescale(1, khz), 44);
        assert_eq!(TimeBase::new(1, 1).rescale(u64::MAX, ms), u64::MAX);

        // The rescaled instant never lies after the original.
        for ts in 0..1000 {
            let rescaled = ms.rescale(ts, khz);
            assert_ne!(TimeBase::cmp_instants((rescaled, khz), (ts, ms)), Ordering::Greater);
        }
    }

    #[test]
    fn verify_negative_time_clamps() {
        assert_eq!(Time::from(-3.5), Time::new(0, 0.0));
        assert_eq!(Time::from(f64::NAN), Time::new(0, 0.0));
    }

    #[test]
    fn verify_cmp_instants() {
        let ms = TimeBase::from_timescale(1000).unwrap();
        let khz = TimeBase::from_timescale(44_100).unwrap();

        // 1s in both time bases.
        assert_eq!(TimeBase::cmp_instants((1000, ms), (44_100, khz)), Ordering::Equal);
        // 1ms vs. 1 tick at 44.1kHz.
        assert_eq!(TimeBase::cmp_instants((1, ms), (1, khz)), Ordering::Greater);
        assert_eq!(TimeBase::cmp_instants((0, ms), (1, khz)), Ordering::Less);
    }
}
