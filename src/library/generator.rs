use super::LibraryState;
use crate::engine::{Process, Scheduler, Step, Wake};

/// Buys new copies for the library: after every exponentially distributed interval, one more copy of a random title is
/// appended to the catalog.
#[derive(Debug, Default)]
pub struct BookGenerator {
    started: bool,
}

impl BookGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Process<LibraryState> for BookGenerator {
    fn resume(
        &mut self,
        _: Wake,
        state: &mut LibraryState,
        scheduler: &mut Scheduler<LibraryState>,
    ) -> crate::Result<Step> {
        if self.started {
            let title = state.random_title();
            let copy = state.catalog.add_copy(title);
            state.stats.record_created();
            tracing::debug!(
                now = %scheduler.now(),
                title = %state.catalog.title(title).name(),
                ?copy,
                "new copy on the shelf"
            );
        }
        self.started = true;

        let interval = state.exponential(state.config.new_copy_mean_interval);
        Ok(Step::wait(scheduler.schedule_timeout(interval)?))
    }
}
