mod process;
mod resource;
mod scheduler;
mod simulation;

pub use process::{Process, Race, Step, Wake};
pub use resource::{ResourcePool, Ticket};
pub use scheduler::{EventId, ProcessId, Scheduler};
pub use simulation::Simulation;
