pub mod clock;
pub mod driver;
pub mod event;
pub mod observer;
pub mod state;

pub use clock::Stamp;
pub use driver::{RunStats, Scheduled, Scheduler, Tunables};
pub use event::Command;
pub use state::{Assignment, FleetCtx, Queue, Vm, VmId};
