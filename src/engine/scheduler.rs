mod event_holder;

use super::process::{Process, Race};
use crate::SimTime;
use event_holder::EventHolder;

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt::{Display, Formatter};

/// Identity of a schedulable event: a timeout, a resource ticket, a signal or a process start.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(pub(crate) u64);

/// Identity of a process registered with a [`Scheduler`].
///
/// Slots of finished processes are handed to new ones, so an identity pairs the slot index with the slot's generation
/// at spawn time. An identity left over from a finished process never matches the slot's new occupant.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId {
    pub(crate) index: usize,
    pub(crate) generation: u32,
}

/// A registered process together with the race it is suspended on. The process is taken out of its slot while it
/// runs, so a slot without a process belongs either to the running process or sits on the free list.
#[derive(Debug)]
struct ProcessSlot<State> {
    generation: u32,
    process: Option<Box<dyn Process<State>>>,
    awaiting: Option<Race>,
}

/// Owner of the simulated clock, the pending-event queue and the process table.
///
/// Events fire in ascending order of execution time, with ties broken by the order in which they were pushed onto the
/// queue. The insertion sequence is a counter that only grows, which makes the order of simultaneous events depend on
/// nothing but the order of the calls that scheduled them; for a fixed random-number stream every run is identical.
///
/// An event exists in one of two forms. A *pending* event is owned by a process and may still fire; it is either
/// sitting in the heap (timeouts, granted tickets, triggered signals) or waiting to be triggered (queued tickets,
/// untriggered signals). Cancelling an event only forgets that it is pending: a heap entry left behind is skipped when
/// it reaches the front of the queue, so a dropped timeout never wakes a process that has already moved on.
///
/// # Errors
///
/// Requests that need an owning process ([`schedule_timeout()`], [`new_event()`]) fail with
/// [`Error::NoCurrentProcess`] outside of [`Process::resume()`]. A negative delay is rejected with
/// [`Error::NegativeDelay`] without modifying the queue.
///
/// [`schedule_timeout()`]: Scheduler::schedule_timeout
/// [`new_event()`]: Scheduler::new_event
/// [`Error::NoCurrentProcess`]: crate::Error::NoCurrentProcess
/// [`Error::NegativeDelay`]: crate::Error::NegativeDelay
#[derive(Debug)]
pub struct Scheduler<State> {
    events: BinaryHeap<Reverse<EventHolder>>,
    now: SimTime,
    events_added: u64,
    /// Every event that may still fire, mapped to the process it will resume.
    pending: HashMap<EventId, ProcessId>,
    processes: Vec<ProcessSlot<State>>,
    /// Indices of slots whose process has finished.
    free_slots: Vec<usize>,
    current: Option<ProcessId>,
}

impl<State> Scheduler<State> {
    /// Construct a new [`Scheduler`] with no processes, no pending events and a clock set to `start_time`.
    pub(crate) fn new(start_time: SimTime) -> Self {
        Self {
            events: BinaryHeap::default(),
            now: start_time,
            events_added: 0,
            pending: HashMap::new(),
            processes: Vec::new(),
            free_slots: Vec::new(),
            current: None,
        }
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    /// The process currently being resumed.
    ///
    /// # Errors
    ///
    /// [`Error::NoCurrentProcess`] when called outside of [`Process::resume()`].
    ///
    /// [`Error::NoCurrentProcess`]: crate::Error::NoCurrentProcess
    pub fn current_process(&self) -> crate::Result<ProcessId> {
        self.current.ok_or(crate::Error::NoCurrentProcess)
    }

    /// Schedule a timeout owned by the running process that fires `delay` minutes from now.
    ///
    /// # Errors
    ///
    /// [`Error::NegativeDelay`] if `delay` is negative or NaN, [`Error::NoCurrentProcess`] outside of a process.
    ///
    /// [`Error::NegativeDelay`]: crate::Error::NegativeDelay
    /// [`Error::NoCurrentProcess`]: crate::Error::NoCurrentProcess
    pub fn schedule_timeout(&mut self, delay: f64) -> crate::Result<EventId> {
        // also rejects NaN
        if !(delay >= 0.0) {
            return Err(crate::Error::NegativeDelay { delay });
        }

        let event = self.new_event()?;
        let execution_time = self.now + delay;
        self.push(event, execution_time);
        Ok(event)
    }

    /// Create an event owned by the running process that fires only once [`trigger()`] is called on it. Resource
    /// tickets and wake-up signals are built on these.
    ///
    /// # Errors
    ///
    /// [`Error::NoCurrentProcess`] outside of a process.
    ///
    /// [`trigger()`]: Scheduler::trigger
    /// [`Error::NoCurrentProcess`]: crate::Error::NoCurrentProcess
    pub fn new_event(&mut self) -> crate::Result<EventId> {
        let owner = self.current_process()?;
        Ok(self.allocate(owner))
    }

    /// Make a pending event fire at the current time, after any event already queued for now. Returns `false`, and
    /// does nothing, if the event is no longer pending.
    pub fn trigger(&mut self, event: EventId) -> bool {
        if !self.pending.contains_key(&event) {
            return false;
        }

        let now = self.now;
        self.push(event, now);
        true
    }

    /// Forget a pending event so that it never fires. Returns whether the event was still pending.
    pub fn cancel(&mut self, event: EventId) -> bool {
        self.pending.remove(&event).is_some()
    }

    pub fn is_pending(&self, event: EventId) -> bool {
        self.pending.contains_key(&event)
    }

    /// The process that a pending event will resume.
    pub fn owner(&self, event: EventId) -> Option<ProcessId> {
        self.pending.get(&event).copied()
    }

    /// Register a new process. Its start event is pushed at the current time, so it runs up to its first suspension
    /// point as soon as the events already queued for now have fired.
    pub fn spawn<ProcessType>(&mut self, process: ProcessType) -> ProcessId
    where
        ProcessType: Process<State> + 'static,
    {
        self.spawn_from_boxed(Box::new(process))
    }

    /// Register a new, already boxed process. See [`spawn()`].
    ///
    /// [`spawn()`]: Scheduler::spawn
    pub fn spawn_from_boxed(&mut self, process: Box<dyn Process<State>>) -> ProcessId {
        let index = self.free_slots.pop().unwrap_or_else(|| {
            self.processes.push(ProcessSlot {
                generation: 0,
                process: None,
                awaiting: None,
            });
            self.processes.len() - 1
        });
        let id = ProcessId {
            index,
            generation: self.processes[index].generation,
        };
        let start = self.allocate(id);
        let slot = &mut self.processes[index];
        slot.process = Some(process);
        slot.awaiting = Some(Race::single(start));

        let now = self.now;
        self.push(start, now);
        id
    }

    /// Number of processes that have not finished yet.
    pub fn process_count(&self) -> usize {
        self.processes.len() - self.free_slots.len()
    }

    /// Number of events that may still fire.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn allocate(&mut self, owner: ProcessId) -> EventId {
        let event = EventId(self.increment_event_count());
        self.pending.insert(event, owner);
        event
    }

    fn push(&mut self, event: EventId, execution_time: SimTime) {
        let insertion_sequence = self.increment_event_count();
        self.events.push(Reverse(EventHolder {
            execution_time,
            insertion_sequence,
            event,
        }));
    }

    /// Helper function to make sure incrementing the internal count of added events occurs the same way for event
    /// identities and heap insertions.
    fn increment_event_count(&mut self) -> u64 {
        let count = self.events_added;
        self.events_added += 1;
        count
    }

    /// Crate-internal function to pop the next live event due strictly before `until`. Updates the clock to its
    /// execution time and returns it with the process it resumes. Cancelled entries are discarded on the way.
    pub(crate) fn next_before(&mut self, until: SimTime) -> Option<(EventId, ProcessId)> {
        loop {
            let due = self.events.peek()?.0.execution_time;
            if due >= until {
                return None;
            }

            let Reverse(holder) = self.events.pop()?;
            if let Some(owner) = self.pending.remove(&holder.event) {
                self.now = holder.execution_time;
                return Some((holder.event, owner));
            }
        }
    }

    /// Move the clock forward to `time` if it is behind.
    pub(crate) fn advance_to(&mut self, time: SimTime) {
        if time > self.now {
            self.now = time;
        }
    }

    fn slot_mut(&mut self, id: ProcessId) -> Option<&mut ProcessSlot<State>> {
        self.processes
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
    }

    /// Take a process out of its slot along with the race it was suspended on.
    pub(crate) fn take(&mut self, id: ProcessId) -> Option<(Box<dyn Process<State>>, Option<Race>)> {
        let slot = self.slot_mut(id)?;
        let process = slot.process.take()?;
        Some((process, slot.awaiting.take()))
    }

    /// Put a suspended process back into its slot.
    pub(crate) fn park(&mut self, id: ProcessId, process: Box<dyn Process<State>>, awaiting: Race) {
        if let Some(slot) = self.slot_mut(id) {
            slot.process = Some(process);
            slot.awaiting = Some(awaiting);
        }
    }

    /// Free the slot of a process that has finished. Events it still owns stay pending and fail with
    /// [`Error::UnawaitedEvent`] if they fire, since the slot's next occupant carries a new generation.
    ///
    /// [`Error::UnawaitedEvent`]: crate::Error::UnawaitedEvent
    pub(crate) fn retire(&mut self, id: ProcessId) {
        let Some(slot) = self.slot_mut(id) else {
            return;
        };
        slot.generation = slot.generation.wrapping_add(1);
        slot.process = None;
        slot.awaiting = None;
        self.free_slots.push(id.index);
    }

    pub(crate) fn set_current(&mut self, current: Option<ProcessId>) {
        self.current = current;
    }
}

impl<State> Display for Scheduler<State> {
    fn fmt(&self, formatter: &mut Formatter) -> std::fmt::Result {
        write!(
            formatter,
            "Scheduler with {} pending events and {} processes at current time {}",
            self.pending.len(),
            self.process_count(),
            self.now
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Step, Wake};

    #[derive(Debug)]
    struct Idle;

    impl Process<()> for Idle {
        fn resume(&mut self, _: Wake, _: &mut (), _: &mut Scheduler<()>) -> crate::Result<Step> {
            Ok(Step::Finished)
        }
    }

    fn scheduler_inside_process() -> Scheduler<()> {
        let mut scheduler = Scheduler::new(SimTime::ZERO);
        let id = scheduler.spawn(Idle);
        scheduler.set_current(Some(id));
        scheduler
    }

    fn drain(scheduler: &mut Scheduler<()>) -> Vec<EventId> {
        let mut fired = Vec::new();
        while let Some((event, _)) = scheduler.next_before(SimTime::from_minutes(f64::MAX)) {
            fired.push(event);
        }
        fired
    }

    #[test]
    fn negative_delay_is_rejected() {
        let mut scheduler = scheduler_inside_process();
        assert!(matches!(
            scheduler.schedule_timeout(-1.0),
            Err(crate::Error::NegativeDelay { .. })
        ));
        assert!(matches!(
            scheduler.schedule_timeout(f64::NAN),
            Err(crate::Error::NegativeDelay { .. })
        ));
    }

    #[test]
    fn timeouts_need_a_running_process() {
        let mut scheduler: Scheduler<()> = Scheduler::new(SimTime::ZERO);
        assert!(matches!(
            scheduler.schedule_timeout(1.0),
            Err(crate::Error::NoCurrentProcess)
        ));
    }

    #[test]
    fn simultaneous_events_fire_in_scheduling_order() {
        let mut scheduler = scheduler_inside_process();
        let late = scheduler.schedule_timeout(5.0).unwrap();
        let first = scheduler.schedule_timeout(2.0).unwrap();
        let second = scheduler.schedule_timeout(2.0).unwrap();
        let immediate = scheduler.new_event().unwrap();
        assert!(scheduler.trigger(immediate));

        let fired = drain(&mut scheduler);
        // the spawn's start event is first in line
        assert_eq!(vec![immediate, first, second, late], fired[1..].to_vec());
        assert_eq!(SimTime::from_minutes(5.0), scheduler.now());
    }

    #[test]
    fn cancelled_events_never_fire() {
        let mut scheduler = scheduler_inside_process();
        let dropped = scheduler.schedule_timeout(1.0).unwrap();
        let kept = scheduler.schedule_timeout(3.0).unwrap();
        assert!(scheduler.cancel(dropped));
        assert!(!scheduler.cancel(dropped));
        assert!(!scheduler.trigger(dropped));

        let fired = drain(&mut scheduler);
        assert_eq!(vec![kept], fired[1..].to_vec());
    }

    #[test]
    fn finished_slots_are_reused_under_a_new_generation() {
        let mut scheduler: Scheduler<()> = Scheduler::new(SimTime::ZERO);
        let first = scheduler.spawn(Idle);
        let (_, owner) = scheduler.next_before(SimTime::from_minutes(1.0)).unwrap();
        assert_eq!(first, owner);
        assert!(scheduler.take(first).is_some());
        scheduler.retire(first);
        assert_eq!(0, scheduler.process_count());

        let second = scheduler.spawn(Idle);
        assert_eq!(first.index, second.index);
        assert_ne!(first, second);
        assert_eq!(1, scheduler.processes.len());
        assert_eq!(1, scheduler.process_count());
        assert!(scheduler.take(first).is_none(), "a stale identity must not reach the new occupant");
        assert!(scheduler.take(second).is_some());
    }

    #[test]
    fn events_at_the_horizon_stay_queued() {
        let mut scheduler = scheduler_inside_process();
        let at_horizon = scheduler.schedule_timeout(10.0).unwrap();
        while scheduler.next_before(SimTime::from_minutes(10.0)).is_some() {}
        assert!(scheduler.is_pending(at_horizon));
        scheduler.advance_to(SimTime::from_minutes(10.0));
        assert_eq!(SimTime::from_minutes(10.0), scheduler.now());
    }
}
