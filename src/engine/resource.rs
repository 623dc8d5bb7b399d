use super::{EventId, Scheduler};
use std::collections::VecDeque;

/// A claim on one unit of a [`ResourcePool`]. The ticket's event fires once the unit is granted to its owner.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Ticket {
    event: EventId,
}

impl Ticket {
    /// The event to race or wait on for the grant.
    pub fn event(self) -> EventId {
        self.event
    }
}

/// A shared resource with a fixed number of units and a FIFO queue of waiting requesters.
///
/// Library counters are a pool of capacity two; every book copy carries a pool of capacity one as its exclusive lock.
///
/// Units move between three places: free, granted (the ticket's event is pending in the scheduler, so the owner has not
/// yet been woken) and held (the owner has been woken by the grant). A unit is only ever handed to the head of the
/// queue, and only through [`release()`] or [`withdraw()`], so the number of granted and held tickets never exceeds the
/// capacity.
///
/// [`release()`]: ResourcePool::release
/// [`withdraw()`]: ResourcePool::withdraw
#[derive(Clone, Debug)]
pub struct ResourcePool {
    name: String,
    capacity: usize,
    /// Tickets that have been granted a unit, whether or not the grant has been delivered yet.
    holders: Vec<EventId>,
    queue: VecDeque<EventId>,
}

impl ResourcePool {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
            holders: Vec::with_capacity(capacity),
            queue: VecDeque::new(),
        }
    }

    /// Request one unit for the running process.
    ///
    /// With a unit free, the grant happens on the spot: the returned ticket's event is already scheduled for the
    /// current time. Since it is pushed before anything the caller schedules next, it wins a tie against a zero-delay
    /// timeout raced with it. Otherwise the ticket joins the back of the queue and its event stays dormant until an
    /// earlier holder lets go.
    ///
    /// # Errors
    ///
    /// [`Error::NoCurrentProcess`] outside of a process.
    ///
    /// [`Error::NoCurrentProcess`]: crate::Error::NoCurrentProcess
    pub fn acquire<State>(&mut self, scheduler: &mut Scheduler<State>) -> crate::Result<Ticket> {
        let event = scheduler.new_event()?;
        if self.holders.len() < self.capacity {
            self.holders.push(event);
            scheduler.trigger(event);
        } else {
            self.queue.push_back(event);
        }
        Ok(Ticket { event })
    }

    /// Give back the unit held through `ticket` and hand it to the head of the queue, if anyone is waiting.
    ///
    /// # Errors
    ///
    /// [`Error::ReleaseNotHeld`] if the ticket does not hold a unit, including a ticket whose grant has not been
    /// delivered yet. This always points at a state-machine bug in the caller.
    ///
    /// [`Error::ReleaseNotHeld`]: crate::Error::ReleaseNotHeld
    pub fn release<State>(&mut self, ticket: Ticket, scheduler: &mut Scheduler<State>) -> crate::Result {
        let slot = self
            .holders
            .iter()
            .position(|&holder| holder == ticket.event)
            .filter(|_| !scheduler.is_pending(ticket.event));
        let Some(slot) = slot else {
            return Err(crate::Error::ReleaseNotHeld {
                pool: self.name.clone(),
                ticket: ticket.event,
            });
        };

        self.holders.swap_remove(slot);
        self.grant_next(scheduler);
        Ok(())
    }

    /// Take back a ticket whose owner stopped waiting for it, typically because a timeout won the race against it.
    ///
    /// A queued ticket simply leaves the queue. A ticket that was granted a unit whose grant has not been delivered
    /// yet gives the unit up again, and it goes to the next requester in line. Either way the ticket's event is
    /// cancelled, so it never fires.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownTicket`] if the ticket is neither queued nor waiting for the delivery of a grant.
    ///
    /// [`Error::UnknownTicket`]: crate::Error::UnknownTicket
    pub fn withdraw<State>(&mut self, ticket: Ticket, scheduler: &mut Scheduler<State>) -> crate::Result {
        if let Some(position) = self.queue.iter().position(|&queued| queued == ticket.event) {
            self.queue.remove(position);
            scheduler.cancel(ticket.event);
            return Ok(());
        }

        if let Some(slot) = self.holders.iter().position(|&holder| holder == ticket.event) {
            if scheduler.cancel(ticket.event) {
                self.holders.swap_remove(slot);
                self.grant_next(scheduler);
                return Ok(());
            }
        }

        Err(crate::Error::UnknownTicket {
            pool: self.name.clone(),
            ticket: ticket.event,
        })
    }

    /// Grant free units to the front of the queue. Entries whose events were cancelled behind the pool's back are
    /// dropped rather than granted, since nobody would ever collect their unit.
    fn grant_next<State>(&mut self, scheduler: &mut Scheduler<State>) {
        while self.holders.len() < self.capacity {
            let Some(next) = self.queue.pop_front() else {
                break;
            };
            if scheduler.trigger(next) {
                self.holders.push(next);
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Units currently granted or held.
    pub fn in_use(&self) -> usize {
        self.holders.len()
    }

    /// Requesters waiting for a unit.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Whether `ticket` has been granted a unit, delivered or not.
    pub fn is_granted(&self, ticket: Ticket) -> bool {
        self.holders.contains(&ticket.event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Process, Step, Wake};
    use crate::SimTime;

    #[derive(Debug)]
    struct Idle;

    impl Process<()> for Idle {
        fn resume(&mut self, _: Wake, _: &mut (), _: &mut Scheduler<()>) -> crate::Result<Step> {
            Ok(Step::Finished)
        }
    }

    fn scheduler() -> Scheduler<()> {
        let mut scheduler = Scheduler::new(SimTime::ZERO);
        let id = scheduler.spawn(Idle);
        scheduler.set_current(Some(id));
        // deliver the start event so it does not get in the way
        scheduler.next_before(SimTime::from_minutes(1.0));
        scheduler
    }

    /// Deliver every event due before the horizon, as the simulation loop would.
    fn deliver(scheduler: &mut Scheduler<()>) -> Vec<EventId> {
        let mut fired = Vec::new();
        while let Some((event, _)) = scheduler.next_before(SimTime::from_minutes(1000.0)) {
            fired.push(event);
        }
        fired
    }

    #[test]
    fn grants_up_to_capacity_then_queues() {
        let mut scheduler = scheduler();
        let mut pool = ResourcePool::new("counters", 2);
        let first = pool.acquire(&mut scheduler).unwrap();
        let second = pool.acquire(&mut scheduler).unwrap();
        let third = pool.acquire(&mut scheduler).unwrap();

        assert_eq!(2, pool.in_use());
        assert_eq!(1, pool.queue_len());
        assert!(pool.is_granted(first) && pool.is_granted(second));
        assert!(!pool.is_granted(third));
        assert_eq!(vec![first.event(), second.event()], deliver(&mut scheduler));
    }

    #[test]
    fn release_hands_unit_to_head_of_queue() {
        let mut scheduler = scheduler();
        let mut pool = ResourcePool::new("lock", 1);
        let holder = pool.acquire(&mut scheduler).unwrap();
        let waiter = pool.acquire(&mut scheduler).unwrap();
        let last = pool.acquire(&mut scheduler).unwrap();
        deliver(&mut scheduler);

        pool.release(holder, &mut scheduler).unwrap();
        assert!(pool.is_granted(waiter));
        assert_eq!(1, pool.queue_len());
        assert_eq!(vec![waiter.event()], deliver(&mut scheduler));

        pool.release(waiter, &mut scheduler).unwrap();
        assert_eq!(vec![last.event()], deliver(&mut scheduler));
    }

    #[test]
    fn withdrawn_ticket_is_never_granted() {
        let mut scheduler = scheduler();
        let mut pool = ResourcePool::new("lock", 1);
        let holder = pool.acquire(&mut scheduler).unwrap();
        let quitter = pool.acquire(&mut scheduler).unwrap();
        deliver(&mut scheduler);

        pool.withdraw(quitter, &mut scheduler).unwrap();
        assert_eq!(0, pool.queue_len());

        pool.release(holder, &mut scheduler).unwrap();
        assert_eq!(0, pool.in_use());
        assert!(deliver(&mut scheduler).is_empty());
    }

    #[test]
    fn withdrawing_an_undelivered_grant_passes_it_on() {
        let mut scheduler = scheduler();
        let mut pool = ResourcePool::new("lock", 1);
        let holder = pool.acquire(&mut scheduler).unwrap();
        let next = pool.acquire(&mut scheduler).unwrap();
        deliver(&mut scheduler);

        let waiter = pool.acquire(&mut scheduler).unwrap();
        pool.release(holder, &mut scheduler).unwrap();
        assert!(pool.is_granted(next));

        pool.withdraw(next, &mut scheduler).unwrap();
        assert!(pool.is_granted(waiter));
        assert_eq!(1, pool.in_use());
        assert_eq!(vec![waiter.event()], deliver(&mut scheduler));
    }

    #[test]
    fn releasing_without_holding_fails_fast() {
        let mut scheduler = scheduler();
        let mut pool = ResourcePool::new("lock", 1);
        let holder = pool.acquire(&mut scheduler).unwrap();
        let waiter = pool.acquire(&mut scheduler).unwrap();

        // granted but not yet delivered
        assert!(matches!(
            pool.release(holder, &mut scheduler),
            Err(crate::Error::ReleaseNotHeld { .. })
        ));
        assert!(matches!(
            pool.release(waiter, &mut scheduler),
            Err(crate::Error::ReleaseNotHeld { .. })
        ));

        deliver(&mut scheduler);
        pool.release(holder, &mut scheduler).unwrap();
        deliver(&mut scheduler);
        pool.release(waiter, &mut scheduler).unwrap();
        assert!(matches!(
            pool.release(waiter, &mut scheduler),
            Err(crate::Error::ReleaseNotHeld { .. })
        ));
    }

    #[test]
    fn withdrawing_a_held_ticket_is_rejected() {
        let mut scheduler = scheduler();
        let mut pool = ResourcePool::new("lock", 1);
        let holder = pool.acquire(&mut scheduler).unwrap();
        deliver(&mut scheduler);

        assert!(matches!(
            pool.withdraw(holder, &mut scheduler),
            Err(crate::Error::UnknownTicket { .. })
        ));
        assert_eq!(1, pool.in_use());
    }
}
