//! Worker lifecycle state machine.
//!
//! `transition` is a pure function from (state, event) to the next state and
//! the side effects the worker must perform. The worker owns the only copy of
//! the state and is the only caller.

use offcache_core::Error;
use serde::{Deserialize, Serialize};

/// Lifecycle states of one generation's worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Registered, nothing installed yet.
    Parsed,
    /// Populating the generation's store.
    Installing,
    /// Installed; waiting to take over from the previous generation.
    Waiting,
    /// Purging stale generations.
    Activating,
    /// Authoritative for every request.
    Active,
    /// The last install attempt failed. A new install may be attempted.
    Redundant,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Parsed => write!(f, "parsed"),
            WorkerState::Installing => write!(f, "installing"),
            WorkerState::Waiting => write!(f, "waiting"),
            WorkerState::Activating => write!(f, "activating"),
            WorkerState::Active => write!(f, "active"),
            WorkerState::Redundant => write!(f, "redundant"),
        }
    }
}

/// Events delivered by the host runtime, or raised by the worker itself when
/// a phase finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Install,
    InstallSucceeded,
    InstallFailed,
    Activate,
    /// Forced activation, from the install phase or a control message.
    SkipWaiting,
    Activated,
}

impl std::fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleEvent::Install => write!(f, "install"),
            LifecycleEvent::InstallSucceeded => write!(f, "install-succeeded"),
            LifecycleEvent::InstallFailed => write!(f, "install-failed"),
            LifecycleEvent::Activate => write!(f, "activate"),
            LifecycleEvent::SkipWaiting => write!(f, "skip-waiting"),
            LifecycleEvent::Activated => write!(f, "activated"),
        }
    }
}

/// Side effects requested by a transition, performed in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Fetch and store every manifest entry.
    PopulateCache,
    /// Ask the host to activate without waiting for open clients to close.
    RequestSkipWaiting,
    /// Delete every store with the prefix except the current one.
    DeleteStaleCaches,
    /// Start serving every open client from this generation.
    ClaimClients,
}

/// Result of a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: WorkerState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(state: WorkerState, effects: &[Effect]) -> Self {
        Self { state, effects: effects.to_vec() }
    }
}

/// Compute the next state for `event` arriving in `state`.
///
/// Skip-waiting outside the waiting state is a no-op; every other event that
/// does not fit the current state is an `InvalidTransition` error.
pub fn transition(state: WorkerState, event: LifecycleEvent) -> Result<Transition, Error> {
    use Effect::*;
    use LifecycleEvent as E;
    use WorkerState as S;

    let next = match (state, event) {
        (S::Parsed | S::Redundant, E::Install) => Transition::to(S::Installing, &[PopulateCache]),
        (S::Installing, E::InstallSucceeded) => Transition::to(S::Waiting, &[RequestSkipWaiting]),
        (S::Installing, E::InstallFailed) => Transition::to(S::Redundant, &[]),
        (S::Waiting | S::Activating, E::Activate) => Transition::to(S::Activating, &[DeleteStaleCaches]),
        (S::Waiting, E::SkipWaiting) => Transition::to(S::Activating, &[DeleteStaleCaches]),
        (_, E::SkipWaiting) => Transition::to(state, &[]),
        (S::Activating, E::Activated) => Transition::to(S::Active, &[ClaimClients]),
        _ => return Err(Error::InvalidTransition { state: state.to_string(), event: event.to_string() }),
    };

    Ok(next)
}
