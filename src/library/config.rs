//! Run configuration for the library model.
//!
//! Every option is constant for the duration of a run. Defaults reproduce the reference scenario: a library open
//! 09:00-17:00 Monday to Saturday with two counters, 2000 titles of 5 copies each, 5000 students and a one-year
//! horizon. All durations are in simulated minutes.

use crate::time::{ONE_DAY, ONE_HOUR};
use serde::Deserialize;
use std::path::Path;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse TOML content.
    #[error("failed to parse config TOML: {source}")]
    Toml {
        /// The underlying TOML parse error.
        #[from]
        source: toml::de::Error,
    },

    /// A value is out of its valid range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

/// An inclusive range of durations, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TimeRange {
    pub min: f64,
    pub max: f64,
}

impl TimeRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    fn check(&self, name: &str) -> Result<(), ConfigError> {
        if !(self.min >= 0.0 && self.min <= self.max && self.max.is_finite()) {
            return Err(invalid(format!(
                "{name} must satisfy 0 <= min <= max, got {}..={}",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Full set of named options for one run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Opening time, minutes after midnight.
    pub open_time: f64,
    /// Closing time, minutes after midnight.
    pub close_time: f64,
    /// Day of the week the library stays closed, 0 for Monday through 6 for Sunday.
    pub closed_weekday: u32,
    /// Number of service counters shared by checkout and check-in.
    pub counter_capacity: usize,
    /// Number of distinct titles in the initial catalog.
    pub titles: usize,
    /// Copies of each title in the initial catalog.
    pub copies_per_title: usize,
    /// Number of students.
    pub students: usize,
    /// Time after checkout at which a copy becomes due.
    pub borrow_duration: f64,
    /// Mean of the exponential interval between new copies.
    pub new_copy_mean_interval: f64,
    /// Mean of the exponential interval before a student wants a book, scaled by `1 + held copies`.
    pub decision_mean_interval: f64,
    /// Mean of the exponential draw for each student's need probability, clamped into [0, 1].
    pub need_probability_mean: f64,
    /// Mean of each student's normally distributed patience at a counter.
    pub patience_mean: f64,
    /// Standard deviation of patience.
    pub patience_sd: f64,
    /// Probability that a copy turns out lost when it is returned.
    pub loss_probability: f64,
    /// Copies a student may hold at once.
    pub max_held_copies: usize,
    /// Time spent looking for a title on the shelves (uniform real).
    pub search_time_range: TimeRange,
    /// Counter service time for a checkout (uniform integer).
    pub checkout_time_range: TimeRange,
    /// Counter service time for an on-time return (uniform integer).
    pub checkin_time_range: TimeRange,
    /// Counter service time for a late return (uniform integer).
    pub late_checkin_time_range: TimeRange,
    /// Counter service time when a copy is reported lost (uniform integer).
    pub lost_service_time_range: TimeRange,
    /// Mean of the normally distributed time a student reads before returning a copy.
    pub reading_time_mean: f64,
    /// Standard deviation of the reading time.
    pub reading_time_sd: f64,
    /// Lower bound applied to every reading-time sample.
    pub reading_time_floor: f64,
    /// Simulated minutes to run for.
    pub run_horizon: f64,
    /// Seed for the single random-number stream of the run.
    pub random_seed: u64,
    /// Log every entity transition.
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            open_time: 9.0 * ONE_HOUR,
            close_time: 17.0 * ONE_HOUR,
            closed_weekday: 6,
            counter_capacity: 2,
            titles: 2000,
            copies_per_title: 5,
            students: 5000,
            borrow_duration: 15.0 * ONE_DAY,
            new_copy_mean_interval: 15.0 * ONE_DAY,
            decision_mean_interval: 30.0 * ONE_DAY,
            need_probability_mean: 0.5,
            patience_mean: 20.0,
            patience_sd: 5.0,
            loss_probability: 0.001,
            max_held_copies: 3,
            search_time_range: TimeRange::new(1.0, 10.0),
            checkout_time_range: TimeRange::new(1.0, 2.0),
            checkin_time_range: TimeRange::new(1.0, 3.0),
            late_checkin_time_range: TimeRange::new(2.0, 5.0),
            lost_service_time_range: TimeRange::new(5.0, 10.0),
            reading_time_mean: 15.0 * ONE_DAY,
            reading_time_sd: ONE_DAY,
            reading_time_floor: ONE_HOUR,
            run_horizon: 365.0 * ONE_DAY,
            random_seed: 42,
            verbose_logging: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, [`ConfigError::Toml`] if the content is not valid TOML
    /// for this struct, or [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from a TOML string. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the string is not valid TOML for this struct, or [`ConfigError::Invalid`] if a
    /// value is out of range.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validated()
    }

    /// Check ranges and clamp probabilities into [0, 1].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending option.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        if !(0.0..=ONE_DAY).contains(&self.open_time)
            || !(0.0..=ONE_DAY).contains(&self.close_time)
            || self.open_time >= self.close_time
        {
            return Err(invalid(format!(
                "opening hours must satisfy 0 <= open_time < close_time <= {ONE_DAY}, got {}..{}",
                self.open_time, self.close_time
            )));
        }
        if self.closed_weekday > 6 {
            return Err(invalid(format!(
                "closed_weekday must be 0..=6, got {}",
                self.closed_weekday
            )));
        }
        if self.counter_capacity == 0 {
            return Err(invalid("counter_capacity must be at least 1".to_owned()));
        }
        if self.titles == 0 {
            return Err(invalid("titles must be at least 1".to_owned()));
        }
        if self.max_held_copies == 0 {
            return Err(invalid("max_held_copies must be at least 1".to_owned()));
        }

        for (name, value) in [
            ("borrow_duration", self.borrow_duration),
            ("new_copy_mean_interval", self.new_copy_mean_interval),
            ("decision_mean_interval", self.decision_mean_interval),
            ("reading_time_floor", self.reading_time_floor),
            ("run_horizon", self.run_horizon),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(invalid(format!("{name} must be positive, got {value}")));
            }
        }
        for (name, value) in [
            ("need_probability_mean", self.need_probability_mean),
            ("patience_mean", self.patience_mean),
            ("patience_sd", self.patience_sd),
            ("reading_time_mean", self.reading_time_mean),
            ("reading_time_sd", self.reading_time_sd),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(invalid(format!("{name} must be non-negative, got {value}")));
            }
        }

        self.search_time_range.check("search_time_range")?;
        self.checkout_time_range.check("checkout_time_range")?;
        self.checkin_time_range.check("checkin_time_range")?;
        self.late_checkin_time_range.check("late_checkin_time_range")?;
        self.lost_service_time_range.check("lost_service_time_range")?;

        if self.loss_probability.is_nan() {
            return Err(invalid("loss_probability must be a number".to_owned()));
        }
        self.loss_probability = self.loss_probability.clamp(0.0, 1.0);
        Ok(self)
    }
}

fn invalid(reason: String) -> ConfigError {
    ConfigError::Invalid { reason }
}
