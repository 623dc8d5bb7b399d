use ordered_float::OrderedFloat;
use std::fmt::{Display, Formatter};
use std::ops::{Add, Sub};

/// Minutes in one simulated hour.
pub const ONE_HOUR: f64 = 60.0;
/// Minutes in one simulated day.
pub const ONE_DAY: f64 = 24.0 * ONE_HOUR;
/// Minutes in one simulated week.
pub const ONE_WEEK: f64 = 7.0 * ONE_DAY;

/// The clock used by every simulation in this crate, measured in minutes since Monday 00:00.
///
/// Floating-point time does not implement [`Ord`] on its own, so the value is wrapped in an [`OrderedFloat`], which
/// gives the total ordering the event queue sorts by. Events with equal times are further ordered by the queue's
/// insertion sequence; see [`Scheduler`].
///
/// [`Scheduler`]: crate::engine::Scheduler
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimTime(OrderedFloat<f64>);

impl SimTime {
    /// Monday 00:00 of the first simulated week.
    pub const ZERO: Self = Self(OrderedFloat(0.0));

    pub const fn from_minutes(minutes: f64) -> Self {
        Self(OrderedFloat(minutes))
    }

    pub fn from_days(days: f64) -> Self {
        Self(OrderedFloat(days * ONE_DAY))
    }

    pub const fn minutes(self) -> f64 {
        self.0 .0
    }

    /// Zero-based index of the current day.
    // truncation is intended: the clock never runs backwards past zero
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn day(self) -> u64 {
        (self.minutes() / ONE_DAY).floor() as u64
    }

    /// Minutes elapsed since midnight of the current day.
    pub fn time_of_day(self) -> f64 {
        self.minutes().rem_euclid(ONE_DAY)
    }

    /// Minutes elapsed since Monday 00:00 of the current week.
    pub fn time_of_week(self) -> f64 {
        self.minutes().rem_euclid(ONE_WEEK)
    }

    /// Day of the week, 0 for Monday through 6 for Sunday.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn weekday(self) -> u32 {
        (self.time_of_week() / ONE_DAY).floor() as u32
    }
}

impl Add<f64> for SimTime {
    type Output = Self;

    fn add(self, rhs: f64) -> Self::Output {
        Self::from_minutes(self.minutes() + rhs)
    }
}

impl Sub for SimTime {
    type Output = f64;

    fn sub(self, rhs: Self) -> Self::Output {
        self.minutes() - rhs.minutes()
    }
}

impl Display for SimTime {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let time_of_day = self.time_of_day();
        write!(
            f,
            "day {:03} {:02}:{:05.2}",
            self.day(),
            (time_of_day / ONE_HOUR).floor(),
            time_of_day % ONE_HOUR
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekday_counts_from_monday() {
        assert_eq!(0, SimTime::ZERO.weekday());
        assert_eq!(6, SimTime::from_days(6.5).weekday());
        assert_eq!(0, SimTime::from_days(7.0).weekday());
        assert_eq!(2, SimTime::from_days(16.0).weekday());
    }

    #[test]
    fn time_of_day_wraps_at_midnight() {
        let time = SimTime::from_days(3.0) + 9.0 * ONE_HOUR;
        assert_eq!(3, time.day());
        assert_eq!(9.0 * ONE_HOUR, time.time_of_day());
    }

    #[test]
    fn times_order_by_value() {
        let earlier = SimTime::from_minutes(10.0);
        let later = earlier + 0.5;
        assert!(earlier < later);
        assert_eq!(0.5, later - earlier);
    }
}
