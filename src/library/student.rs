//! Students and the processes that make up their lives: the main decision loop, one search per wanted book and one
//! check-in per borrowed copy.

use super::catalog::{CopyId, TitleId};
use super::LibraryState;
use crate::engine::{EventId, Process, Scheduler, Step, Ticket, Wake};
use crate::time::ONE_DAY;
use crate::SimTime;

use tracing::debug;

/// How long a searcher waits for a copy's lock before deciding the copy is taken.
const PROBE_TIMEOUT: f64 = 1.0;

/// Index of a student in the library's student list.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StudentId(pub usize);

#[derive(Debug, Clone)]
pub struct Student {
    id: StudentId,
    name: String,
    /// Copies currently on loan to the student, in checkout order.
    held: Vec<CopyId>,
    patience: f64,
    need_probability: f64,
    searching: bool,
    /// The signal the main loop is parked on, while it is parked.
    free_signal: Option<EventId>,
}

impl Student {
    /// Patience is clamped to be non-negative and the need probability into [0, 1].
    pub fn new(id: StudentId, name: impl Into<String>, patience: f64, need_probability: f64) -> Self {
        Self {
            id,
            name: name.into(),
            held: Vec::new(),
            patience: patience.max(0.0),
            need_probability: need_probability.clamp(0.0, 1.0),
            searching: false,
            free_signal: None,
        }
    }

    pub fn id(&self) -> StudentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn held(&self) -> &[CopyId] {
        &self.held
    }

    /// Minutes the student will queue at a counter before giving up.
    pub fn patience(&self) -> f64 {
        self.patience
    }

    pub fn set_patience(&mut self, patience: f64) {
        self.patience = patience.max(0.0);
    }

    pub fn need_probability(&self) -> f64 {
        self.need_probability
    }

    pub fn set_need_probability(&mut self, need_probability: f64) {
        self.need_probability = need_probability.clamp(0.0, 1.0);
    }

    /// Whether a search is in flight.
    pub fn is_searching(&self) -> bool {
        self.searching
    }

    fn release_copy(&mut self, copy: CopyId) {
        self.held.retain(|&held| held != copy);
    }

    /// Wake the main loop if it is parked. A student that is busy deciding or travelling has nothing to be woken from
    /// and re-checks its limits on its own.
    fn notify<State>(&mut self, scheduler: &mut Scheduler<State>) {
        if let Some(signal) = self.free_signal.take() {
            scheduler.trigger(signal);
        }
    }
}

/// A student's main loop.
///
/// While the student holds fewer copies than the limit and has no search in flight, it repeatedly rolls against its
/// need probability. A failed roll waits an exponential interval whose mean grows with every copy held; a successful
/// one sends the student to the library, respecting opening hours, and starts a [`Search`]. The loop then parks until
/// a search concludes or a held copy is given back.
#[derive(Debug)]
pub struct StudentLife {
    student: StudentId,
    phase: LifePhase,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum LifePhase {
    Deciding,
    Travelling,
    Parked,
}

impl StudentLife {
    pub fn new(student: StudentId) -> Self {
        Self {
            student,
            phase: LifePhase::Deciding,
        }
    }

    fn park(&mut self, state: &mut LibraryState, scheduler: &mut Scheduler<LibraryState>) -> crate::Result<Step> {
        let signal = scheduler.new_event()?;
        state.students[self.student.0].free_signal = Some(signal);
        self.phase = LifePhase::Parked;
        Ok(Step::wait(signal))
    }
}

impl Process<LibraryState> for StudentLife {
    #[allow(clippy::cast_precision_loss)]
    fn resume(
        &mut self,
        _: Wake,
        state: &mut LibraryState,
        scheduler: &mut Scheduler<LibraryState>,
    ) -> crate::Result<Step> {
        let now = scheduler.now();
        if self.phase == LifePhase::Travelling {
            let student = &mut state.students[self.student.0];
            student.searching = true;
            debug!(%now, student = %student.name, "arrives at the library");
            scheduler.spawn(Search::new(self.student));
            return self.park(state, scheduler);
        }

        let student = &state.students[self.student.0];
        if student.searching || student.held.len() >= state.config.max_held_copies {
            return self.park(state, scheduler);
        }

        let need_probability = student.need_probability;
        let held = student.held.len();
        if state.chance(need_probability) {
            let delay = state.delay_until_open(now);
            self.phase = LifePhase::Travelling;
            Ok(Step::wait(scheduler.schedule_timeout(delay)?))
        } else {
            let mean = state.config.decision_mean_interval * (1 + held) as f64;
            let delay = state.exponential(mean);
            self.phase = LifePhase::Deciding;
            Ok(Step::wait(scheduler.schedule_timeout(delay)?))
        }
    }
}

/// One trip to the shelves for a random title.
///
/// The student browses for a while, then probes the first copy on the shelf: the copy's lock is raced against a short
/// timeout, and a lost race means someone else got there first. A won copy is carried to the counters, where the
/// student queues for at most its patience. Either way the search ends by waking the student's main loop.
#[derive(Debug)]
pub struct Search {
    student: StudentId,
    phase: SearchPhase,
}

#[derive(Copy, Clone, Debug)]
enum SearchPhase {
    Start,
    Browsing { title: TitleId },
    Probing { copy: CopyId, lock: Ticket, probe: EventId },
    Queueing { copy: CopyId, counter: Ticket, patience: EventId },
    CheckingOut { copy: CopyId, counter: Ticket },
}

impl Search {
    pub fn new(student: StudentId) -> Self {
        Self {
            student,
            phase: SearchPhase::Start,
        }
    }

    fn conclude(&self, state: &mut LibraryState, scheduler: &mut Scheduler<LibraryState>) -> Step {
        let student = &mut state.students[self.student.0];
        student.searching = false;
        student.notify(scheduler);
        Step::Finished
    }
}

impl Process<LibraryState> for Search {
    fn resume(
        &mut self,
        wake: Wake,
        state: &mut LibraryState,
        scheduler: &mut Scheduler<LibraryState>,
    ) -> crate::Result<Step> {
        let now = scheduler.now();
        match self.phase {
            SearchPhase::Start => {
                state.students[self.student.0].searching = true;
                let title = state.random_title();
                let browsing = state.uniform(state.config.search_time_range);
                debug!(
                    %now,
                    student = %state.students[self.student.0].name,
                    title = %state.catalog.title(title).name(),
                    "is looking for a copy"
                );
                self.phase = SearchPhase::Browsing { title };
                Ok(Step::wait(scheduler.schedule_timeout(browsing)?))
            },
            SearchPhase::Browsing { title } => {
                let Some(copy) = state.catalog.first_available(title) else {
                    debug!(%now, student = %state.students[self.student.0].name, "found no copy on the shelf");
                    return Ok(self.conclude(state, scheduler));
                };
                let lock = state.catalog[copy].lock_mut().acquire(scheduler)?;
                let probe = scheduler.schedule_timeout(PROBE_TIMEOUT)?;
                self.phase = SearchPhase::Probing { copy, lock, probe };
                Ok(Step::race([lock.event(), probe]))
            },
            SearchPhase::Probing { copy, lock, probe } => {
                if wake.index == 1 {
                    state.catalog[copy].lock_mut().withdraw(lock, scheduler)?;
                    debug!(%now, student = %state.students[self.student.0].name, ?copy, "copy was taken first");
                    return Ok(self.conclude(state, scheduler));
                }
                scheduler.cancel(probe);
                state.catalog[copy].begin_borrowing(lock)?;

                let counter = state.counters.acquire(scheduler)?;
                let patience = scheduler.schedule_timeout(state.students[self.student.0].patience)?;
                self.phase = SearchPhase::Queueing {
                    copy,
                    counter,
                    patience,
                };
                Ok(Step::race([counter.event(), patience]))
            },
            SearchPhase::Queueing {
                copy,
                counter,
                patience,
            } => {
                if wake.index == 1 {
                    state.counters.withdraw(counter, scheduler)?;
                    state.stats.record_renege();
                    let lock = state.catalog[copy].abandon_borrowing()?;
                    state.catalog[copy].lock_mut().release(lock, scheduler)?;
                    debug!(%now, student = %state.students[self.student.0].name, ?copy, "gave up on checkout");
                    return Ok(self.conclude(state, scheduler));
                }
                scheduler.cancel(patience);
                let service = state.whole_minutes(state.config.checkout_time_range);
                self.phase = SearchPhase::CheckingOut { copy, counter };
                Ok(Step::wait(scheduler.schedule_timeout(service)?))
            },
            SearchPhase::CheckingOut { copy, counter } => {
                let due = now + state.config.borrow_duration;
                state.catalog[copy].check_out(self.student, due)?;
                state.students[self.student.0].held.push(copy);
                state.stats.record_borrowed();
                state.counters.release(counter, scheduler)?;
                debug!(%now, student = %state.students[self.student.0].name, ?copy, %due, "checked out");

                scheduler.spawn(CheckIn::new(self.student, copy, due));
                Ok(self.conclude(state, scheduler))
            },
        }
    }
}

/// Returning one borrowed copy: read it, come back during opening hours, queue at the counters.
///
/// A student who runs out of patience comes back later: at once when the copy is already overdue (reading it again
/// first), a day later otherwise. At the counter the copy may turn out lost, in which case it leaves the student's
/// hands and the catalog's active stock for good.
#[derive(Debug)]
pub struct CheckIn {
    student: StudentId,
    copy: CopyId,
    due: SimTime,
    phase: CheckInPhase,
}

#[derive(Copy, Clone, Debug)]
enum CheckInPhase {
    Start,
    Reading,
    Travelling,
    Queueing { counter: Ticket, patience: EventId },
    Serving { counter: Ticket, lost: bool },
}

impl CheckIn {
    pub fn new(student: StudentId, copy: CopyId, due: SimTime) -> Self {
        Self {
            student,
            copy,
            due,
            phase: CheckInPhase::Start,
        }
    }

    fn start_reading(
        &mut self,
        state: &mut LibraryState,
        scheduler: &mut Scheduler<LibraryState>,
    ) -> crate::Result<Step> {
        let config = &state.config;
        let (mean, sd, floor) = (config.reading_time_mean, config.reading_time_sd, config.reading_time_floor);
        let reading = state.normal(mean, sd).max(floor);
        self.phase = CheckInPhase::Reading;
        Ok(Step::wait(scheduler.schedule_timeout(reading)?))
    }
}

impl Process<LibraryState> for CheckIn {
    fn resume(
        &mut self,
        wake: Wake,
        state: &mut LibraryState,
        scheduler: &mut Scheduler<LibraryState>,
    ) -> crate::Result<Step> {
        let now = scheduler.now();
        match self.phase {
            CheckInPhase::Start => self.start_reading(state, scheduler),
            CheckInPhase::Reading => {
                let delay = state.delay_until_open(now);
                self.phase = CheckInPhase::Travelling;
                Ok(Step::wait(scheduler.schedule_timeout(delay)?))
            },
            CheckInPhase::Travelling => {
                state.catalog[self.copy].begin_return()?;
                let counter = state.counters.acquire(scheduler)?;
                let patience = scheduler.schedule_timeout(state.students[self.student.0].patience)?;
                self.phase = CheckInPhase::Queueing { counter, patience };
                Ok(Step::race([counter.event(), patience]))
            },
            CheckInPhase::Queueing { counter, patience } => {
                if wake.index == 1 {
                    state.counters.withdraw(counter, scheduler)?;
                    state.stats.record_renege();
                    let overdue = now > self.due;
                    debug!(%now, student = %state.students[self.student.0].name, copy = ?self.copy, overdue, "gave up on return");
                    if overdue {
                        return self.start_reading(state, scheduler);
                    }
                    self.phase = CheckInPhase::Start;
                    return Ok(Step::wait(scheduler.schedule_timeout(ONE_DAY)?));
                }
                scheduler.cancel(patience);

                let lost = state.chance(state.config.loss_probability);
                let range = if lost {
                    state.catalog[self.copy].mark_lost()?;
                    state.stats.record_lost();
                    state.students[self.student.0].release_copy(self.copy);
                    debug!(%now, student = %state.students[self.student.0].name, copy = ?self.copy, "lost a copy");
                    state.config.lost_service_time_range
                } else if now <= self.due {
                    state.config.checkin_time_range
                } else {
                    state.config.late_checkin_time_range
                };
                let service = state.whole_minutes(range);
                self.phase = CheckInPhase::Serving { counter, lost };
                Ok(Step::wait(scheduler.schedule_timeout(service)?))
            },
            CheckInPhase::Serving { counter, lost } => {
                let student = &mut state.students[self.student.0];
                if !lost {
                    let copy = &mut state.catalog[self.copy];
                    let (lock, due) = copy.check_in()?;
                    copy.lock_mut().release(lock, scheduler)?;
                    state.stats.record_return(now - due);
                    student.release_copy(self.copy);
                    debug!(%now, student = %student.name, copy = ?self.copy, lateness = now - due, "returned a copy");
                }
                state.counters.release(counter, scheduler)?;
                student.notify(scheduler);
                Ok(Step::Finished)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn student_parameters_are_clamped() {
        let mut student = Student::new(StudentId(0), "Ada", -3.0, 2.5);
        assert_eq!(0.0, student.patience());
        assert_eq!(1.0, student.need_probability());

        student.set_patience(12.0);
        student.set_need_probability(-1.0);
        assert_eq!(12.0, student.patience());
        assert_eq!(0.0, student.need_probability());
        assert!(!student.is_searching());
        assert!(student.held().is_empty());
    }

    #[test]
    fn releasing_a_copy_keeps_the_others_in_order() {
        let mut student = Student::new(StudentId(0), "Ada", 10.0, 0.5);
        student.held = vec![CopyId(4), CopyId(9), CopyId(2)];
        student.release_copy(CopyId(9));
        assert_eq!(&[CopyId(4), CopyId(2)], student.held());
    }
}
