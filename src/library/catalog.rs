use super::StudentId;
use crate::engine::{ResourcePool, Ticket};
use crate::SimTime;

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::ops::{Index, IndexMut};

/// Index of a title in the [`Catalog`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TitleId(pub usize);

/// Index of a physical copy in the [`Catalog`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CopyId(pub usize);

/// Where a copy is in its lending cycle.
///
/// ```text
/// Available -> Borrowing -> Borrowed -> Returning -> Available
///                  |                      |    ^
///                  v                      v    |
///              Available                 Lost  +-- (failed return attempt)
/// ```
///
/// `Lost` is terminal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BookStatus {
    Available,
    Borrowing,
    Borrowed,
    Returning,
    Lost,
}

impl Display for BookStatus {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let name = match self {
            Self::Available => "available",
            Self::Borrowing => "borrowing",
            Self::Borrowed => "borrowed",
            Self::Returning => "returning",
            Self::Lost => "lost",
        };
        f.write_str(name)
    }
}

/// A copy was asked to move along an edge its status machine does not have.
///
/// Raised inside a process, it reaches the caller of [`Library::run()`] wrapped in [`Error::Model`].
///
/// [`Library::run()`]: super::Library::run
/// [`Error::Model`]: crate::Error::Model
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{copy:?} cannot move from {from} to {to}")]
pub struct InvalidTransition {
    /// The copy whose status was being changed.
    pub copy: CopyId,
    /// Its status at the time.
    pub from: BookStatus,
    /// The status it was asked to take.
    pub to: BookStatus,
}

impl From<InvalidTransition> for crate::Error {
    fn from(error: InvalidTransition) -> Self {
        Self::Model(Box::new(error))
    }
}

/// One physical copy of a title.
///
/// A copy carries its own exclusive lock, a [`ResourcePool`] of capacity one. Whoever holds it may move the copy out of
/// `Available`; the lock is held from the moment a borrower claims the copy until it is checked back in, and forever
/// once the copy is lost. The ticket of the current holder is kept on the copy so that whichever process ends the loan
/// can release it.
#[derive(Debug)]
pub struct BookCopy {
    id: CopyId,
    title: TitleId,
    status: BookStatus,
    /// Set exactly while the copy is `Borrowed` or `Returning`.
    due: Option<SimTime>,
    borrower: Option<StudentId>,
    lock: ResourcePool,
    lock_ticket: Option<Ticket>,
}

impl BookCopy {
    fn new(id: CopyId, title: TitleId) -> Self {
        Self {
            id,
            title,
            status: BookStatus::Available,
            due: None,
            borrower: None,
            lock: ResourcePool::new(format!("copy #{}", id.0), 1),
            lock_ticket: None,
        }
    }

    pub fn id(&self) -> CopyId {
        self.id
    }

    pub fn title(&self) -> TitleId {
        self.title
    }

    pub fn status(&self) -> BookStatus {
        self.status
    }

    pub fn due(&self) -> Option<SimTime> {
        self.due
    }

    pub fn borrower(&self) -> Option<StudentId> {
        self.borrower
    }

    pub fn lock(&self) -> &ResourcePool {
        &self.lock
    }

    pub fn lock_mut(&mut self) -> &mut ResourcePool {
        &mut self.lock
    }

    /// A searcher that won the lock claims the copy for checkout.
    ///
    /// # Errors
    ///
    /// [`InvalidTransition`] unless the copy is `Available`.
    pub fn begin_borrowing(&mut self, lock_ticket: Ticket) -> Result<(), InvalidTransition> {
        self.transition(&[BookStatus::Available], BookStatus::Borrowing)?;
        self.lock_ticket = Some(lock_ticket);
        Ok(())
    }

    /// The claimant gave up at the counter. Returns the lock ticket so it can be released.
    ///
    /// # Errors
    ///
    /// [`InvalidTransition`] unless the copy is `Borrowing`.
    pub fn abandon_borrowing(&mut self) -> Result<Ticket, InvalidTransition> {
        self.transition(&[BookStatus::Borrowing], BookStatus::Available)?;
        self.take_lock_ticket(BookStatus::Available)
    }

    /// # Errors
    ///
    /// [`InvalidTransition`] unless the copy is `Borrowing`.
    pub fn check_out(&mut self, borrower: StudentId, due: SimTime) -> Result<(), InvalidTransition> {
        self.transition(&[BookStatus::Borrowing], BookStatus::Borrowed)?;
        self.borrower = Some(borrower);
        self.due = Some(due);
        Ok(())
    }

    /// The borrower brought the copy to the counter. A copy already `Returning` after a failed attempt stays so.
    ///
    /// # Errors
    ///
    /// [`InvalidTransition`] unless the copy is `Borrowed` or `Returning`.
    pub fn begin_return(&mut self) -> Result<(), InvalidTransition> {
        self.transition(&[BookStatus::Borrowed, BookStatus::Returning], BookStatus::Returning)
    }

    /// Put the copy back on the shelf. Returns the lock ticket to release and the due time the loan had.
    ///
    /// # Errors
    ///
    /// [`InvalidTransition`] unless the copy is `Returning`.
    pub fn check_in(&mut self) -> Result<(Ticket, SimTime), InvalidTransition> {
        let due = self.due.ok_or_else(|| self.invalid(BookStatus::Available))?;
        self.transition(&[BookStatus::Returning], BookStatus::Available)?;
        self.due = None;
        self.borrower = None;
        let ticket = self.take_lock_ticket(BookStatus::Available)?;
        Ok((ticket, due))
    }

    /// The copy turned out lost at return. Its lock is never released again.
    ///
    /// # Errors
    ///
    /// [`InvalidTransition`] unless the copy is `Returning`.
    pub fn mark_lost(&mut self) -> Result<(), InvalidTransition> {
        self.transition(&[BookStatus::Returning], BookStatus::Lost)?;
        self.due = None;
        self.borrower = None;
        Ok(())
    }

    fn transition(&mut self, allowed: &[BookStatus], to: BookStatus) -> Result<(), InvalidTransition> {
        if !allowed.contains(&self.status) {
            return Err(self.invalid(to));
        }
        self.status = to;
        Ok(())
    }

    fn take_lock_ticket(&mut self, to: BookStatus) -> Result<Ticket, InvalidTransition> {
        self.lock_ticket.take().ok_or_else(|| self.invalid(to))
    }

    fn invalid(&self, to: BookStatus) -> InvalidTransition {
        InvalidTransition {
            copy: self.id,
            from: self.status,
            to,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Title {
    name: String,
    copies: Vec<CopyId>,
}

impl Title {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Copies in the order they were added, lost ones included.
    pub fn copies(&self) -> &[CopyId] {
        &self.copies
    }
}

/// Number of copies in each status.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub available: usize,
    pub borrowing: usize,
    pub borrowed: usize,
    pub returning: usize,
    pub lost: usize,
}

impl StatusCounts {
    /// Copies that still exist, i.e. everything but the lost ones.
    pub fn active(&self) -> usize {
        self.available + self.borrowing + self.borrowed + self.returning
    }
}

/// Every title the library knows and every copy it ever owned. Copies are never removed; lost ones stay with their
/// status set to [`BookStatus::Lost`].
#[derive(Debug, Default)]
pub struct Catalog {
    titles: Vec<Title>,
    by_name: HashMap<String, TitleId>,
    copies: Vec<BookCopy>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a title with no copies, or return the existing one of the same name.
    pub fn add_title(&mut self, name: impl Into<String>) -> TitleId {
        let name = name.into();
        if let Some(&id) = self.by_name.get(&name) {
            return id;
        }
        let id = TitleId(self.titles.len());
        self.by_name.insert(name.clone(), id);
        self.titles.push(Title {
            name,
            copies: Vec::new(),
        });
        id
    }

    /// Append a new `Available` copy to the end of a title's copy sequence.
    pub fn add_copy(&mut self, title: TitleId) -> CopyId {
        let id = CopyId(self.copies.len());
        self.copies.push(BookCopy::new(id, title));
        self.titles[title.0].copies.push(id);
        id
    }

    pub fn find_title(&self, name: &str) -> Option<TitleId> {
        self.by_name.get(name).copied()
    }

    pub fn title(&self, id: TitleId) -> &Title {
        &self.titles[id.0]
    }

    pub fn title_count(&self) -> usize {
        self.titles.len()
    }

    /// Copies ever added, lost ones included.
    pub fn copy_count(&self) -> usize {
        self.copies.len()
    }

    pub fn copies(&self) -> impl Iterator<Item = &BookCopy> {
        self.copies.iter()
    }

    /// The first copy of `title`, in insertion order, that is on the shelf.
    pub fn first_available(&self, title: TitleId) -> Option<CopyId> {
        self.titles[title.0]
            .copies
            .iter()
            .copied()
            .find(|&copy| self[copy].status == BookStatus::Available)
    }

    /// Copies of `title` that are not lost.
    pub fn active_stock_of(&self, title: TitleId) -> usize {
        self.titles[title.0]
            .copies
            .iter()
            .filter(|&&copy| self[copy].status != BookStatus::Lost)
            .count()
    }

    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for copy in &self.copies {
            match copy.status {
                BookStatus::Available => counts.available += 1,
                BookStatus::Borrowing => counts.borrowing += 1,
                BookStatus::Borrowed => counts.borrowed += 1,
                BookStatus::Returning => counts.returning += 1,
                BookStatus::Lost => counts.lost += 1,
            }
        }
        counts
    }
}

impl Index<CopyId> for Catalog {
    type Output = BookCopy;

    fn index(&self, id: CopyId) -> &Self::Output {
        &self.copies[id.0]
    }
}

impl IndexMut<CopyId> for Catalog {
    fn index_mut(&mut self, id: CopyId) -> &mut Self::Output {
        &mut self.copies[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Process, Scheduler, Step, Wake};

    #[derive(Debug)]
    struct Idle;

    impl Process<()> for Idle {
        fn resume(&mut self, _: Wake, _: &mut (), _: &mut Scheduler<()>) -> crate::Result<Step> {
            Ok(Step::Finished)
        }
    }

    fn locked(copy: &mut BookCopy) -> Ticket {
        let mut scheduler = Scheduler::new(SimTime::ZERO);
        let id = scheduler.spawn(Idle);
        scheduler.set_current(Some(id));
        copy.lock_mut().acquire(&mut scheduler).unwrap()
    }

    #[test]
    fn copies_keep_insertion_order_per_title() {
        let mut catalog = Catalog::new();
        let dune = catalog.add_title("Dune");
        let emma = catalog.add_title("Emma");
        let first = catalog.add_copy(dune);
        catalog.add_copy(emma);
        let second = catalog.add_copy(dune);

        assert_eq!(&[first, second], catalog.title(dune).copies());
        assert_eq!(Some(dune), catalog.find_title("Dune"));
        assert_eq!(dune, catalog.add_title("Dune"));
        assert_eq!(Some(first), catalog.first_available(dune));
        assert_eq!(3, catalog.status_counts().active());
    }

    #[test]
    fn full_lending_cycle() {
        let mut catalog = Catalog::new();
        let title = catalog.add_title("Dune");
        let id = catalog.add_copy(title);
        let copy = &mut catalog[id];
        let ticket = locked(copy);

        copy.begin_borrowing(ticket).unwrap();
        copy.check_out(StudentId(3), SimTime::from_minutes(100.0)).unwrap();
        assert_eq!(Some(StudentId(3)), copy.borrower());
        copy.begin_return().unwrap();
        copy.begin_return().unwrap();
        let (returned, due) = copy.check_in().unwrap();

        assert_eq!(ticket, returned);
        assert_eq!(SimTime::from_minutes(100.0), due);
        assert_eq!(BookStatus::Available, copy.status());
        assert_eq!(None, copy.due());
    }

    #[test]
    fn lost_copies_leave_active_stock() {
        let mut catalog = Catalog::new();
        let title = catalog.add_title("Dune");
        let id = catalog.add_copy(title);
        catalog.add_copy(title);
        let ticket = locked(&mut catalog[id]);

        let copy = &mut catalog[id];
        copy.begin_borrowing(ticket).unwrap();
        copy.check_out(StudentId(0), SimTime::ZERO).unwrap();
        copy.begin_return().unwrap();
        copy.mark_lost().unwrap();

        assert_eq!(1, catalog.active_stock_of(title));
        assert_eq!(1, catalog.status_counts().lost);
        assert_ne!(Some(id), catalog.first_available(title));
    }

    #[test]
    fn skipping_a_state_is_rejected() {
        let mut catalog = Catalog::new();
        let title = catalog.add_title("Dune");
        let id = catalog.add_copy(title);
        let copy = &mut catalog[id];

        assert!(matches!(
            copy.check_out(StudentId(0), SimTime::ZERO),
            Err(InvalidTransition {
                from: BookStatus::Available,
                to: BookStatus::Borrowed,
                ..
            })
        ));
        assert!(copy.mark_lost().is_err());
        assert!(copy.abandon_borrowing().is_err());
        assert_eq!(BookStatus::Available, copy.status());
    }

    #[test]
    fn transition_errors_reach_the_caller_as_model_errors() {
        let mut catalog = Catalog::new();
        let title = catalog.add_title("Dune");
        let id = catalog.add_copy(title);

        let error: crate::Error = catalog[id].begin_return().unwrap_err().into();
        assert!(matches!(error, crate::Error::Model(_)));
        let source = std::error::Error::source(&error).and_then(|source| source.downcast_ref::<InvalidTransition>());
        let expected = InvalidTransition {
            copy: id,
            from: BookStatus::Available,
            to: BookStatus::Returning,
        };
        assert_eq!(Some(&expected), source);
    }
}
