//! Election rules: candidacies, the voting window, ballots and resets.
//!
//! Every component shares one [`ElectionStore`]; the store provides atomicity,
//! the components decide what is allowed.

use std::sync::Arc;

use crate::store::{ElectionStore, MemoryStore};

mod ballot_box;
pub mod eligibility;
mod lifecycle;
mod reset;
mod window;

pub use ballot_box::{BallotBox, ElectionResults, Tally};
pub use lifecycle::{CandidateLifecycle, Review, MAX_CGPA};
pub use reset::ResetCoordinator;
pub use window::{ElectionStatus, ElectionWindow, TurnoutPolicy, WindowSettings};

/// Handle on the whole election, managed as Rocket state.
#[derive(Clone)]
pub struct ElectionEngine {
    store: Arc<dyn ElectionStore>,
    policy: TurnoutPolicy,
}

impl ElectionEngine {
    pub fn new(store: Arc<dyn ElectionStore>, policy: TurnoutPolicy) -> Self {
        Self { store, policy }
    }

    /// An engine over a fresh, empty in-process store.
    pub fn in_memory(policy: TurnoutPolicy) -> Self {
        Self::new(Arc::new(MemoryStore::new()), policy)
    }

    pub fn store(&self) -> &Arc<dyn ElectionStore> {
        &self.store
    }

    pub fn lifecycle(&self) -> CandidateLifecycle {
        CandidateLifecycle::new(self.store.clone())
    }

    pub fn window(&self) -> WindowSettings {
        WindowSettings::new(self.store.clone(), self.policy)
    }

    pub fn ballot_box(&self) -> BallotBox {
        BallotBox::new(self.store.clone(), self.policy)
    }

    pub fn reset_coordinator(&self) -> ResetCoordinator {
        ResetCoordinator::new(self.store.clone())
    }
}
