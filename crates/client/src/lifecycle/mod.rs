//! Generation lifecycle: the state machine and the store operations its
//! effects run.

pub mod manager;
pub mod state;

pub use manager::{ActivationReport, CacheLifecycle, InstallReport};
pub use state::{Effect, LifecycleEvent, Transition, WorkerState, transition};
