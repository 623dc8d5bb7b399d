use super::{EventId, Scheduler};
use std::fmt::Debug;

/// A logical process: a resumable unit of sequential logic that runs against the shared simulation state.
///
/// Processes are explicit state machines. Each call to [`resume()`] runs the process from its current suspension
/// point up to the next one, then returns a [`Step`] naming what it waits for. Exactly one process is resumed per
/// scheduler step, so everything a process does inside one call is atomic with respect to the simulated clock: no
/// other process can observe a half-finished mutation of the state.
///
/// Requiring implementors to be [`Debug`] enables printing the full contents of a [`Scheduler`] when necessary.
///
/// [`resume()`]: Process::resume
pub trait Process<State>: Debug {
    /// Advance the process after one of the events it awaited has fired. `wake` names the event and its position in
    /// the awaited [`Race`]; the first call after [`Scheduler::spawn()`] is woken by the process's start event.
    ///
    /// Exclusive access is provided to both the simulation's state and the scheduler, allowing the process to mutate
    /// the state, request timeouts, acquire resources and spawn further processes. The scheduler's clock has already
    /// advanced to the time of the waking event.
    ///
    /// Every losing branch of the race that just resolved must be cancelled ([`Scheduler::cancel()`]) or withdrawn
    /// ([`ResourcePool::withdraw()`]) before this method returns.
    ///
    /// # Errors
    ///
    /// Errors returned here stop [`Simulation::run()`] and are passed back to its caller unchanged.
    ///
    /// [`ResourcePool::withdraw()`]: super::ResourcePool::withdraw
    /// [`Simulation::run()`]: super::Simulation::run
    fn resume(&mut self, wake: Wake, state: &mut State, scheduler: &mut Scheduler<State>) -> crate::Result<Step>;
}

/// What a process does after returning control to the scheduler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// Suspend until the first of these events fires.
    Await(Race),
    /// The process is done and will never be resumed again.
    Finished,
}

impl Step {
    /// Suspend until `event` fires.
    pub fn wait(event: EventId) -> Self {
        Self::Await(Race::single(event))
    }

    /// Suspend until the earliest of `events` fires.
    pub fn race<Events>(events: Events) -> Self
    where
        Events: IntoIterator<Item = EventId>,
    {
        Self::Await(Race::new(events))
    }
}

/// A list of events raced against each other. The process awaiting it resumes as soon as any one of them fires.
///
/// The events that did not win are left unresolved. They are not cancelled automatically: the resumed process decides
/// what happens to each of them, since dropping a timeout and withdrawing a resource request are different operations
/// with different side effects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Race {
    events: Vec<EventId>,
}

impl Race {
    pub fn new<Events>(events: Events) -> Self
    where
        Events: IntoIterator<Item = EventId>,
    {
        Self {
            events: events.into_iter().collect(),
        }
    }

    pub fn single(event: EventId) -> Self {
        Self { events: vec![event] }
    }

    pub fn events(&self) -> &[EventId] {
        &self.events
    }

    /// Index of `event` within the race, if it takes part.
    pub fn position(&self, event: EventId) -> Option<usize> {
        self.events.iter().position(|&candidate| candidate == event)
    }

    /// Every event other than the one at `winner`.
    pub(crate) fn losers(&self, winner: usize) -> impl Iterator<Item = EventId> + '_ {
        self.events
            .iter()
            .enumerate()
            .filter(move |(index, _)| *index != winner)
            .map(|(_, &event)| event)
    }
}

/// Identifies the event that resumed a process: the winner of the race it was awaiting.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Wake {
    /// The event that fired.
    pub event: EventId,
    /// Position of that event within the awaited [`Race`].
    pub index: usize,
}
