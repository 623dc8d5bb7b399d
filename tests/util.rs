#![allow(dead_code)]

use shelfsim::library::{Config, TimeRange};
use shelfsim::ONE_DAY;

/// Check whether two floats have a relative difference of at most 5e-5 times the larger magnitude.
#[macro_export]
macro_rules! assert_floats_near_equal {
    ($val1:expr, $val2:expr, $msg:expr) => {{
        let a: f64 = $val1;
        let b: f64 = $val2;
        let scale = a.abs().max(b.abs());
        let relative_diff = if scale == 0.0 { 0.0 } else { (a - b).abs() / scale };
        assert!(relative_diff < 0.00005, "{}: {} vs {}", $msg, a, b);
    }};
}

/// A library small enough to run for a simulated year in a test, with the default timings.
pub fn small_library() -> Config {
    Config {
        titles: 200,
        copies_per_title: 5,
        students: 500,
        ..Config::default()
    }
}

/// One title, one copy, a fixed browsing time and nothing else going on.
pub fn single_copy(students: usize) -> Config {
    Config {
        titles: 1,
        copies_per_title: 1,
        students,
        search_time_range: TimeRange::new(5.0, 5.0),
        ..Config::default()
    }
}

/// [`single_copy`] with the library open all day on every day but the closed weekday, and no copy ever lost.
pub fn open_around_the_clock(students: usize) -> Config {
    Config {
        open_time: 0.0,
        close_time: ONE_DAY,
        loss_probability: 0.0,
        ..single_copy(students)
    }
}
