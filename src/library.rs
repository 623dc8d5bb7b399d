//! The lending-library model built on top of [`engine`](crate::engine).

mod calendar;
mod catalog;
mod config;
mod generator;
mod model;
mod stats;
mod student;

pub use calendar::{delay_until_open, OpeningHours};
pub use catalog::{BookCopy, BookStatus, Catalog, CopyId, InvalidTransition, StatusCounts, Title, TitleId};
pub use config::{Config, ConfigError, TimeRange};
pub use generator::BookGenerator;
pub use model::{Library, LibraryState};
pub use stats::{DailySample, DailySampler, StatsCollector, StatsSnapshot, Statistics};
pub use student::{CheckIn, Search, Student, StudentId, StudentLife};
