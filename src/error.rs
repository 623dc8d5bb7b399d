use crate::engine::{EventId, ProcessId};

/// Errors that may be encountered while executing a simulation.
///
/// The [`NegativeDelay`] variant originates from the scheduling interface of the [`Scheduler`] to indicate that a
/// timeout would fire before the current simulation time. This error likely corresponds to a logical bug on the
/// client side, e.g. subtracting instead of adding an offset.
///
/// The [`Model`] variant wraps an error raised by model code inside a process, so it can pass through
/// [`Simulation::run()`] without the engine knowing its type. [`std::error::Error::source()`] on this variant returns
/// the wrapped error.
///
/// The remaining variants report broken process or resource discipline. None of them is recoverable: each one means a
/// state machine took a transition it should never take, so [`Simulation::run()`] stops and hands the error back
/// instead of letting the simulation continue with corrupted accounting.
///
/// [`Scheduler`]: crate::engine::Scheduler
/// [`Simulation::run()`]: crate::engine::Simulation::run
/// [`NegativeDelay`]: Error::NegativeDelay
/// [`Model`]: Error::Model
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A timeout was requested with a negative or NaN delay.
    #[error("timeout delay {delay} is negative; events cannot be scheduled in the past")]
    NegativeDelay {
        /// The rejected delay, in simulated minutes.
        delay: f64,
    },

    /// A resource unit was released through a ticket that does not currently hold it.
    #[error("release on pool `{pool}` through {ticket:?}, which does not hold a unit")]
    ReleaseNotHeld {
        /// Name of the pool.
        pool: String,
        /// The offending ticket's event.
        ticket: EventId,
    },

    /// A ticket was withdrawn from a pool that neither queues it nor has a pending grant for it.
    #[error("withdraw on pool `{pool}` through {ticket:?}, which is neither queued nor pending")]
    UnknownTicket {
        /// Name of the pool.
        pool: String,
        /// The offending ticket's event.
        ticket: EventId,
    },

    /// An event fired for a process that was not awaiting it.
    #[error("{event:?} fired for {process:?}, which is not awaiting it")]
    UnawaitedEvent {
        /// The process that owns the event.
        process: ProcessId,
        /// The event that fired.
        event: EventId,
    },

    /// A process suspended again without cancelling or withdrawing a losing branch of its last race.
    #[error("{process:?} left losing race branch {event:?} unresolved")]
    UnresolvedRaceLoser {
        /// The process that ran the race.
        process: ProcessId,
        /// The losing event that is still pending.
        event: EventId,
    },

    /// A process tried to await an event that is not pending on its behalf.
    #[error("{process:?} awaited {event:?}, which it does not own")]
    ForeignEvent {
        /// The process that returned the race.
        process: ProcessId,
        /// The event it tried to await.
        event: EventId,
    },

    /// A scheduling call that needs an owning process was made outside of any process.
    #[error("no process is running; events can only be requested from inside a process")]
    NoCurrentProcess,

    /// An error raised by model code while a process was running. Call [`source()`] or unpack this value to handle it
    /// directly.
    ///
    /// [`source()`]: std::error::Error::source
    #[error("error while executing process: {0}")]
    Model(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

/// [`std::result::Result`]`<T, `[`shelfsim::Error`]`>`
///
/// A type alias that simplifies the signatures of the engine and model. The success type defaults to `()` since most
/// engine operations only report whether they succeeded.
///
/// [`shelfsim::Error`]: Error
pub type Result<T = ()> = std::result::Result<T, Error>;
