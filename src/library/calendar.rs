//! Opening hours and the delay a visitor has to wait before the library lets them in.

use super::Config;
use crate::time::ONE_DAY;
use crate::SimTime;
use rand::Rng;

/// Daily opening window plus the one weekday on which the library stays shut.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpeningHours {
    /// Opening time, minutes after midnight.
    pub open: f64,
    /// Closing time, minutes after midnight.
    pub close: f64,
    /// 0 for Monday through 6 for Sunday.
    pub closed_weekday: u32,
}

impl OpeningHours {
    pub fn from_config(config: &Config) -> Self {
        Self {
            open: config.open_time,
            close: config.close_time,
            closed_weekday: config.closed_weekday,
        }
    }

    /// Whether arrivals are accepted at `time`. Both ends of the window count as open.
    pub fn is_open(&self, time: SimTime) -> bool {
        let time_of_day = time.time_of_day();
        time.weekday() != self.closed_weekday && time_of_day >= self.open && time_of_day <= self.close
    }

    fn random_instant<R>(&self, rng: &mut R) -> f64
    where
        R: Rng + ?Sized,
    {
        rng.random_range(self.open..=self.close)
    }
}

/// Delay from `now` until a visitor may arrive, never negative.
///
/// Two corrections are applied one after the other. First the time of day: before opening the visitor comes at a
/// random instant of today's window, after closing at a random instant of tomorrow's. Then the weekday, judged at the
/// time reached by the first correction: if that falls on the closed day, the visitor comes back at a random instant
/// of the following day's window instead.
///
/// The second correction is computed from the jittered instant of the first, so close to the closed day the two can
/// add up to almost two days. This is kept as is rather than folded into one computation.
pub fn delay_until_open<R>(now: SimTime, hours: &OpeningHours, rng: &mut R) -> f64
where
    R: Rng + ?Sized,
{
    let time_of_day = now.time_of_day();
    let day_correction = if time_of_day < hours.open {
        hours.random_instant(rng) - time_of_day
    } else if time_of_day > hours.close {
        ONE_DAY + hours.random_instant(rng) - time_of_day
    } else {
        0.0
    };

    let arrival = now + day_correction;
    let week_correction = if arrival.weekday() == hours.closed_weekday {
        ONE_DAY + hours.random_instant(rng) - arrival.time_of_day()
    } else {
        0.0
    };

    (day_correction + week_correction).max(0.0)
}
