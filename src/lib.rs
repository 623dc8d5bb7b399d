//! # Overview
//!
//! shelfsim is a discrete-event simulation of a lending library. Students decide at random moments that they need a
//! book, look for a copy on the shelves, queue at a small number of service counters to check it out, read it and queue
//! again to bring it back. Counters are contended, students run out of patience, copies get lost and new ones are
//! bought. The run produces a daily report of stock, loans, lateness and abandoned queues.
//!
//! The crate is split in two layers:
//!
//! * [`engine`] is a generic, single-threaded simulation kernel. [`Process`]es are explicit state machines that the
//!   [`Scheduler`] resumes one at a time, in ascending order of the events they wait on, with ties broken by insertion
//!   order. A process may wait on a single event or race several against each other; the losers of a race are
//!   cancelled explicitly, and the [`Simulation`] loop refuses to continue if one is left dangling. [`ResourcePool`]
//!   provides counted resources with FIFO queues, used for both the counters and the per-copy locks.
//! * [`library`] is the model itself: configuration, opening hours, the catalog, students and their processes, and
//!   the statistics.
//!
//! Every run draws from a single seeded random-number stream and the event order depends only on the order of the
//! scheduling calls, so a given [`Config`] always reproduces the same run.
//!
//! Time is measured in minutes since Monday 00:00 of the first simulated week; see [`SimTime`].
//!
//! [`Process`]: engine::Process
//! [`Scheduler`]: engine::Scheduler
//! [`Simulation`]: engine::Simulation
//! [`ResourcePool`]: engine::ResourcePool
//! [`Config`]: library::Config

pub mod engine;
mod error;
pub mod library;
mod time;

pub use error::{Error, Result};
pub use time::{SimTime, ONE_DAY, ONE_HOUR, ONE_WEEK};
