//! UI-thread dispatch: work queue, timers, the display and its registry

mod display;
pub mod queue;
mod registry;
pub mod timer;

pub(crate) use display::DisplayInner;
pub use display::{Display, DisplayId};
pub use queue::{Completion, DispatchQueue, Outcome, WorkItem};
pub use registry::DisplayRegistry;
pub use timer::TimerId;
