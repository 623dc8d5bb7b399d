use super::EventId;
use crate::SimTime;
use std::cmp::Ordering;

/// Entry of the pending-event heap: the event that fires plus the key it sorts by, namely the execution time and the
/// insertion sequence.
///
/// Entries compare by execution time first and by insertion sequence only to break ties, so two events due at the
/// same instant fire in the order they were pushed. The event itself takes no part in the comparison; a given
/// insertion sequence is only ever handed out once.
#[derive(Debug)]
pub(super) struct EventHolder {
    pub execution_time: SimTime,
    pub insertion_sequence: u64,
    pub event: EventId,
}

impl EventHolder {
    fn key(&self) -> (SimTime, u64) {
        (self.execution_time, self.insertion_sequence)
    }
}

impl PartialEq<Self> for EventHolder {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for EventHolder {}

impl PartialOrd<Self> for EventHolder {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventHolder {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holder(minutes: f64, insertion_sequence: u64) -> EventHolder {
        EventHolder {
            execution_time: SimTime::from_minutes(minutes),
            insertion_sequence,
            event: EventId(insertion_sequence),
        }
    }

    #[test]
    fn time_beats_insertion_order() {
        assert!(holder(1.0, 9) < holder(2.0, 0));
        assert!(holder(2.0, 3) < holder(2.0, 4));
        assert_eq!(Ordering::Equal, holder(2.0, 3).cmp(&holder(2.0, 3)));
    }
}
