//! Run-wide counters and the once-a-day sampler that turns them into a daily report.

use super::LibraryState;
use crate::engine::{Process, Scheduler, Step, Wake};
use crate::time::ONE_DAY;

use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

/// Cumulative counters for one run.
///
/// Counters are atomics so that a handle can be shared through an [`Arc`] with whoever reports on the run, e.g. the
/// binary printing a summary, while the processes keep updating them. The simulation itself is single-threaded, so
/// every access uses [`Ordering::Relaxed`].
///
/// [`Arc`]: std::sync::Arc
#[derive(Debug, Default)]
pub struct Statistics {
    created: AtomicU64,
    lost: AtomicU64,
    borrowed: AtomicU64,
    returned: AtomicU64,
    /// Sum of `return time - due time` over every return, stored as the bits of an `f64`.
    return_time_bits: AtomicU64,
    reneged: AtomicU64,
}

impl Statistics {
    pub fn record_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lost(&self) {
        self.lost.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_borrowed(&self) {
        self.borrowed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a return that happened `lateness` minutes after the due time; early returns are negative.
    pub fn record_return(&self, lateness: f64) {
        self.returned.fetch_add(1, Ordering::Relaxed);
        // the closure always yields a value, so the update cannot fail
        let _ = self
            .return_time_bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + lateness).to_bits())
            });
    }

    pub fn record_renege(&self) {
        self.reneged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            created: self.created.load(Ordering::Relaxed),
            lost: self.lost.load(Ordering::Relaxed),
            borrowed: self.borrowed.load(Ordering::Relaxed),
            returned: self.returned.load(Ordering::Relaxed),
            return_time_total: f64::from_bits(self.return_time_bits.load(Ordering::Relaxed)),
            reneged: self.reneged.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`Statistics`].
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct StatsSnapshot {
    /// Copies ever added to the catalog, initial stock included.
    pub created: u64,
    pub lost: u64,
    /// Completed checkouts.
    pub borrowed: u64,
    /// Completed returns, lost copies excluded.
    pub returned: u64,
    /// Sum of return lateness in minutes.
    pub return_time_total: f64,
    /// Counter queues abandoned, at checkout and at return.
    pub reneged: u64,
}

impl StatsSnapshot {
    /// Copies that have not been lost.
    pub fn active_stock(&self) -> u64 {
        self.created.saturating_sub(self.lost)
    }

    /// Checkouts that have neither been returned nor lost yet.
    pub fn outstanding_loans(&self) -> u64 {
        self.borrowed.saturating_sub(self.returned + self.lost)
    }

    /// Mean lateness of all returns so far, in minutes; zero before the first return.
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_return_lateness(&self) -> f64 {
        if self.returned == 0 {
            0.0
        } else {
            self.return_time_total / self.returned as f64
        }
    }
}

impl Display for StatsSnapshot {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} copies created, {} lost, {} checkouts, {} returns (mean lateness {:.2} days), {} reneges",
            self.created,
            self.lost,
            self.borrowed,
            self.returned,
            self.mean_return_lateness() / ONE_DAY,
            self.reneged
        )
    }
}

/// One row of the daily report. Changes are relative to the previous sample.
#[derive(Clone, Debug, PartialEq)]
pub struct DailySample {
    /// Zero-based index of the day the sample was taken on.
    pub day: u64,
    pub active_stock: u64,
    pub outstanding_loans: u64,
    /// Change in outstanding loans since the previous sample.
    pub loans_change: i64,
    pub copies_added: u64,
    pub returns: u64,
    /// Mean lateness of the returns made since the previous sample, in days; zero when there were none.
    pub mean_lateness_days: f64,
    pub reneges: u64,
}

impl DailySample {
    /// Column titles matching the [`Display`] layout.
    pub const HEADER: &'static str = " day   stock   loans  change  added  returns  lateness  reneges";
}

impl Display for DailySample {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{:>4} {:>7} {:>7} {:>+7} {:>6} {:>8} {:>9.2} {:>8}",
            self.day,
            self.active_stock,
            self.outstanding_loans,
            self.loans_change,
            self.copies_added,
            self.returns,
            self.mean_lateness_days,
            self.reneges
        )
    }
}

/// Turns successive snapshots into [`DailySample`]s and keeps them for the end of the run.
#[derive(Debug, Default)]
pub struct StatsCollector {
    previous: StatsSnapshot,
    samples: Vec<DailySample>,
}

impl StatsCollector {
    /// Start collecting from `baseline`, normally the snapshot taken right after the initial stock was added.
    pub fn new(baseline: StatsSnapshot) -> Self {
        Self {
            previous: baseline,
            samples: Vec::new(),
        }
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
    pub fn record(&mut self, day: u64, current: StatsSnapshot) -> &DailySample {
        let previous = std::mem::replace(&mut self.previous, current);
        let returns = current.returned - previous.returned;
        let lateness = current.return_time_total - previous.return_time_total;

        self.samples.push(DailySample {
            day,
            active_stock: current.active_stock(),
            outstanding_loans: current.outstanding_loans(),
            loans_change: current.outstanding_loans() as i64 - previous.outstanding_loans() as i64,
            copies_added: current.created - previous.created,
            returns,
            mean_lateness_days: if returns == 0 {
                0.0
            } else {
                lateness / returns as f64 / ONE_DAY
            },
            reneges: current.reneged - previous.reneged,
        });
        &self.samples[self.samples.len() - 1]
    }

    pub fn samples(&self) -> &[DailySample] {
        &self.samples
    }
}

/// Samples the statistics one minute before every midnight.
#[derive(Debug, Default)]
pub struct DailySampler {
    started: bool,
}

impl DailySampler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Process<LibraryState> for DailySampler {
    fn resume(
        &mut self,
        _: Wake,
        state: &mut LibraryState,
        scheduler: &mut Scheduler<LibraryState>,
    ) -> crate::Result<Step> {
        if !self.started {
            self.started = true;
            return Ok(Step::wait(scheduler.schedule_timeout(ONE_DAY - 1.0)?));
        }

        let now = scheduler.now();
        let snapshot = state.stats.snapshot();
        let sample = state.collector.record(now.day(), snapshot);
        tracing::debug!(%now, %sample, "daily sample");
        Ok(Step::wait(scheduler.schedule_timeout(ONE_DAY)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_events() {
        let stats = Statistics::default();
        for _ in 0..4 {
            stats.record_created();
        }
        stats.record_borrowed();
        stats.record_borrowed();
        stats.record_borrowed();
        stats.record_return(-2.0 * ONE_DAY);
        stats.record_return(ONE_DAY);
        stats.record_lost();
        stats.record_renege();

        let snapshot = stats.snapshot();
        assert_eq!(3, snapshot.active_stock());
        assert_eq!(0, snapshot.outstanding_loans());
        assert_eq!(-ONE_DAY, snapshot.return_time_total);
        assert_eq!(-ONE_DAY / 2.0, snapshot.mean_return_lateness());
        assert_eq!(1, snapshot.reneged);
    }

    #[test]
    fn collector_reports_daily_differences() {
        let stats = Statistics::default();
        stats.record_created();
        stats.record_created();
        let mut collector = StatsCollector::new(stats.snapshot());

        stats.record_borrowed();
        stats.record_borrowed();
        stats.record_renege();
        let first = collector.record(0, stats.snapshot()).clone();
        assert_eq!(0, first.copies_added);
        assert_eq!(2, first.loans_change);
        assert_eq!(0.0, first.mean_lateness_days);
        assert_eq!(1, first.reneges);

        stats.record_return(ONE_DAY);
        stats.record_return(3.0 * ONE_DAY);
        stats.record_created();
        let second = collector.record(1, stats.snapshot()).clone();
        assert_eq!(1, second.copies_added);
        assert_eq!(-2, second.loans_change);
        assert_eq!(2, second.returns);
        assert_eq!(2.0, second.mean_lateness_days);
        assert_eq!(0, second.reneges);
        assert_eq!(3, second.active_stock);
        assert_eq!(2, collector.samples().len());
    }
}
