use super::{EventId, Process, ProcessId, Scheduler, Step, Wake};
use crate::SimTime;

use std::fmt::Formatter;

/// Contains the scheduler and the shared state belonging to a simulation.
///
/// A [`Simulation`] owns both its state and its scheduler, providing both shared and mutable access to each so
/// clients can set up and tear down instances as needed - for example, spawning the initial processes or reading the
/// final statistics.
///
/// The expected workflow for a Simulation is:
///
/// 1. Build the shared state.
/// 2. Pass it and the start time to [`new()`].
/// 3. Spawn at least one process.
/// 4. Call [`run()`]. Handle any error it might return.
/// 5. Use the [`state()`] accessor to finish processing the results.
///
/// [`new()`]: Simulation::new
/// [`run()`]: Simulation::run
/// [`state()`]: Simulation::state
#[derive(Debug)]
pub struct Simulation<State> {
    /// Clock, pending events and process table.
    scheduler: Scheduler<State>,
    /// The current shared state. Exclusive access is granted to each process while it runs.
    state: State,
}

impl<State> Simulation<State> {
    /// Initialize a Simulation instance with the provided starting state and a scheduler whose clock is set to the
    /// provided starting time.
    pub fn new(initial_state: State, start_time: SimTime) -> Self {
        Self {
            scheduler: Scheduler::new(start_time),
            state: initial_state,
        }
    }

    /// Resume processes one at a time, in ascending order of the events that wake them, until the next event is due
    /// at or after `until` or nothing is left to fire. The clock then reads `until`.
    ///
    /// Each step pops the earliest live event, advances the clock to its time and resumes exactly the one process
    /// awaiting it.
    ///
    /// # Errors
    ///
    /// Errors returned by a process are passed back unchanged. The loop also stops with an error when process
    /// discipline breaks down:
    ///
    /// 1. [`Error::UnawaitedEvent`] if an event fires for a process that is not waiting on it.
    /// 2. [`Error::UnresolvedRaceLoser`] if a process suspends again while a losing branch of the race that woke it is
    ///    still pending. Every losing timeout must be cancelled and every losing ticket withdrawn.
    /// 3. [`Error::ForeignEvent`] if a process awaits an event that is not pending on its behalf.
    ///
    /// [`Error::UnawaitedEvent`]: crate::Error::UnawaitedEvent
    /// [`Error::UnresolvedRaceLoser`]: crate::Error::UnresolvedRaceLoser
    /// [`Error::ForeignEvent`]: crate::Error::ForeignEvent
    pub fn run(&mut self, until: SimTime) -> crate::Result {
        while let Some((event, owner)) = self.scheduler.next_before(until) {
            self.resume(owner, event)?;
        }
        self.scheduler.advance_to(until);
        Ok(())
    }

    fn resume(&mut self, owner: ProcessId, event: EventId) -> crate::Result {
        let unawaited = crate::Error::UnawaitedEvent { process: owner, event };
        let Some((mut process, awaiting)) = self.scheduler.take(owner) else {
            return Err(unawaited);
        };
        let Some((race, index)) = awaiting.and_then(|race| race.position(event).map(|index| (race, index))) else {
            return Err(unawaited);
        };

        tracing::trace!(?owner, ?event, now = %self.scheduler.now(), "resuming process");
        self.scheduler.set_current(Some(owner));
        let step = process.resume(Wake { event, index }, &mut self.state, &mut self.scheduler);
        self.scheduler.set_current(None);
        let step = step?;

        if let Some(loser) = race.losers(index).find(|&loser| self.scheduler.is_pending(loser)) {
            return Err(crate::Error::UnresolvedRaceLoser {
                process: owner,
                event: loser,
            });
        }

        match step {
            Step::Await(next) => {
                if let Some(&foreign) = next
                    .events()
                    .iter()
                    .find(|&&awaited| self.scheduler.owner(awaited) != Some(owner))
                {
                    return Err(crate::Error::ForeignEvent {
                        process: owner,
                        event: foreign,
                    });
                }
                self.scheduler.park(owner, process, next);
            },
            Step::Finished => {
                tracing::trace!(?owner, "process finished");
                self.scheduler.retire(owner);
            },
        }
        Ok(())
    }

    /// Register a process; it starts at the current simulation time. See [`Scheduler::spawn()`].
    pub fn spawn<ProcessType>(&mut self, process: ProcessType) -> ProcessId
    where
        ProcessType: Process<State> + 'static,
    {
        self.scheduler.spawn(process)
    }

    pub fn now(&self) -> SimTime {
        self.scheduler.now()
    }

    /// Get a shared reference to the simulation state.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Get an exclusive reference to the simulation state.
    pub fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }

    /// Get a shared reference to the scheduler.
    pub fn scheduler(&self) -> &Scheduler<State> {
        &self.scheduler
    }

    /// Get an exclusive reference to the scheduler.
    pub fn scheduler_mut(&mut self) -> &mut Scheduler<State> {
        &mut self.scheduler
    }
}

impl<State> std::fmt::Display for Simulation<State> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Simulation at time {}", self.scheduler.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ResourcePool;

    #[derive(Debug, Default)]
    struct State {
        log: Vec<(u32, f64)>,
        pool: Option<ResourcePool>,
    }

    /// Sleeps for `delay`, logs its label, repeats `count` times.
    #[derive(Debug)]
    struct Sleeper {
        label: u32,
        delay: f64,
        count: u32,
    }

    impl Process<State> for Sleeper {
        fn resume(&mut self, _: Wake, state: &mut State, scheduler: &mut Scheduler<State>) -> crate::Result<Step> {
            if self.count == 0 {
                return Ok(Step::Finished);
            }
            self.count -= 1;
            state.log.push((self.label, scheduler.now().minutes()));
            Ok(Step::wait(scheduler.schedule_timeout(self.delay)?))
        }
    }

    #[derive(Debug)]
    enum Impatient {
        Start { patience: f64, hold_for: f64 },
        Waiting { ticket: crate::engine::Ticket, timeout: EventId, hold_for: f64 },
        Holding { ticket: crate::engine::Ticket },
    }

    /// Races a pool acquisition against its patience; logs 1 when served and 0 when it gives up.
    impl Process<State> for Impatient {
        fn resume(&mut self, wake: Wake, state: &mut State, scheduler: &mut Scheduler<State>) -> crate::Result<Step> {
            let Some(pool) = state.pool.as_mut() else {
                return Ok(Step::Finished);
            };
            match *self {
                Self::Start { patience, hold_for } => {
                    let ticket = pool.acquire(scheduler)?;
                    let timeout = scheduler.schedule_timeout(patience)?;
                    *self = Self::Waiting {
                        ticket,
                        timeout,
                        hold_for,
                    };
                    Ok(Step::race([ticket.event(), timeout]))
                },
                Self::Waiting {
                    ticket,
                    timeout,
                    hold_for,
                } => {
                    if wake.index == 0 {
                        scheduler.cancel(timeout);
                        state.log.push((1, scheduler.now().minutes()));
                        *self = Self::Holding { ticket };
                        Ok(Step::wait(scheduler.schedule_timeout(hold_for)?))
                    } else {
                        pool.withdraw(ticket, scheduler)?;
                        state.log.push((0, scheduler.now().minutes()));
                        Ok(Step::Finished)
                    }
                },
                Self::Holding { ticket } => {
                    pool.release(ticket, scheduler)?;
                    Ok(Step::Finished)
                },
            }
        }
    }

    /// Races two timeouts and forgets to cancel the loser.
    #[derive(Debug)]
    struct Careless {
        raced: bool,
    }

    impl Process<State> for Careless {
        fn resume(&mut self, _: Wake, _: &mut State, scheduler: &mut Scheduler<State>) -> crate::Result<Step> {
            if self.raced {
                return Ok(Step::wait(scheduler.schedule_timeout(1.0)?));
            }
            self.raced = true;
            let short = scheduler.schedule_timeout(1.0)?;
            let long = scheduler.schedule_timeout(2.0)?;
            Ok(Step::race([short, long]))
        }
    }

    #[test]
    fn processes_interleave_by_time_then_spawn_order() {
        let mut sim = Simulation::new(State::default(), SimTime::ZERO);
        sim.spawn(Sleeper {
            label: 1,
            delay: 2.0,
            count: 3,
        });
        sim.spawn(Sleeper {
            label: 2,
            delay: 3.0,
            count: 2,
        });
        sim.run(SimTime::from_minutes(100.0)).unwrap();

        let expected = vec![(1, 0.0), (2, 0.0), (1, 2.0), (2, 3.0), (1, 4.0)];
        assert_eq!(expected, sim.state().log, "processes did not resume in the correct order");
        assert_eq!(SimTime::from_minutes(100.0), sim.now());
    }

    #[test]
    fn run_stops_before_the_horizon() {
        let mut sim = Simulation::new(State::default(), SimTime::ZERO);
        sim.spawn(Sleeper {
            label: 1,
            delay: 5.0,
            count: 10,
        });
        sim.run(SimTime::from_minutes(10.0)).unwrap();

        assert_eq!(vec![(1, 0.0), (1, 5.0)], sim.state().log);
        sim.run(SimTime::from_minutes(11.0)).unwrap();
        assert_eq!(3, sim.state().log.len(), "event at the old horizon should fire on the next run");
    }

    #[test]
    fn finished_processes_free_their_slots() {
        let mut sim = Simulation::new(State::default(), SimTime::ZERO);
        for round in 0..10 {
            let id = sim.spawn(Sleeper {
                label: round,
                delay: 1.0,
                count: 1,
            });
            assert_eq!(0, id.index, "round {round} did not reuse the free slot");
            sim.run(SimTime::from_minutes(f64::from(round + 1) * 10.0)).unwrap();
            assert_eq!(0, sim.scheduler().process_count());
        }
        assert_eq!(10, sim.state().log.len());
    }

    #[test]
    fn immediate_grant_beats_zero_patience() {
        let state = State {
            pool: Some(ResourcePool::new("counter", 1)),
            ..State::default()
        };
        let mut sim = Simulation::new(state, SimTime::ZERO);
        sim.spawn(Impatient::Start {
            patience: 0.0,
            hold_for: 5.0,
        });
        sim.run(SimTime::from_minutes(10.0)).unwrap();
        assert_eq!(vec![(1, 0.0)], sim.state().log);
    }

    #[test]
    fn impatient_requester_reneges_and_leaves_the_queue() {
        let state = State {
            pool: Some(ResourcePool::new("counter", 1)),
            ..State::default()
        };
        let mut sim = Simulation::new(state, SimTime::ZERO);
        sim.spawn(Impatient::Start {
            patience: 1.0,
            hold_for: 10.0,
        });
        sim.spawn(Impatient::Start {
            patience: 3.0,
            hold_for: 1.0,
        });
        sim.spawn(Impatient::Start {
            patience: 20.0,
            hold_for: 1.0,
        });
        sim.run(SimTime::from_minutes(50.0)).unwrap();

        assert_eq!(vec![(1, 0.0), (0, 3.0), (1, 10.0)], sim.state().log);
        let pool = sim.state().pool.as_ref().unwrap();
        assert_eq!(0, pool.in_use());
        assert_eq!(0, pool.queue_len());
    }

    #[test]
    fn unresolved_race_loser_stops_the_run() {
        let mut sim = Simulation::new(State::default(), SimTime::ZERO);
        sim.spawn(Careless { raced: false });
        let result = sim.run(SimTime::from_minutes(10.0));
        assert!(matches!(result, Err(crate::Error::UnresolvedRaceLoser { .. })));
    }
}
