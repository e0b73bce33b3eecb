//! The transactional storage contract the engine runs on.
//!
//! Two primitives matter: an atomic read-check-write over one voter and one
//! candidate ([`ElectionStore::record_ballot`]), and an atomic multi-record
//! commit over every candidate and voter ([`ElectionStore::reset`]). Everything
//! else is ordinary single-record access.

use chrono::{DateTime, Utc};
use mongodb::bson::{doc, to_bson, Document};
use serde::{Deserialize, Serialize};

use crate::engine::ElectionWindow;
use crate::error::Result;
use crate::model::{
    candidate::{Candidate, CandidateCore, CandidateStatus, Criteria, NewCandidate},
    mongodb::Id,
    voter::{NewVoter, Turnout, Voter},
};

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// A lifecycle write to one candidate. Never touches the vote tally.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateChange {
    /// Replace the public profile and put the candidacy back up for review.
    Profile(ProfileUpdate),
    /// Move to a new review status.
    Status {
        status: CandidateStatus,
        at: DateTime<Utc>,
    },
}

/// Validated profile fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileUpdate {
    pub name: String,
    pub description: String,
    pub image: String,
    pub criteria: Option<Criteria>,
    pub submitted_at: DateTime<Utc>,
}

impl CandidateChange {
    /// Apply this change to an in-memory record, bumping its revision.
    pub fn apply(&self, candidate: &mut CandidateCore) {
        match self {
            Self::Profile(profile) => {
                candidate.name = profile.name.clone();
                candidate.description = profile.description.clone();
                candidate.image = profile.image.clone();
                candidate.criteria = profile.criteria.clone();
                candidate.submitted_at = profile.submitted_at;
                candidate.status = CandidateStatus::Pending;
            }
            Self::Status { status, at } => {
                candidate.status = *status;
                match status {
                    CandidateStatus::Approved => candidate.approved_at = Some(*at),
                    CandidateStatus::Rejected => candidate.rejected_at = Some(*at),
                    CandidateStatus::Pending => {}
                }
            }
        }
        candidate.revision += 1;
    }

    /// The equivalent MongoDB update document.
    pub fn to_update(&self) -> Result<Document> {
        let set = match self {
            Self::Profile(profile) => doc! {
                "name": &profile.name,
                "description": &profile.description,
                "image": &profile.image,
                "criteria": to_bson(&profile.criteria)?,
                "submitted_at": profile.submitted_at,
                "status": CandidateStatus::Pending,
            },
            Self::Status { status, at } => {
                let mut set = doc! { "status": *status };
                match status {
                    CandidateStatus::Approved => {
                        set.insert("approved_at", *at);
                    }
                    CandidateStatus::Rejected => {
                        set.insert("rejected_at", *at);
                    }
                    CandidateStatus::Pending => {}
                }
                set
            }
        };
        Ok(doc! {
            "$set": set,
            "$inc": { "revision": 1 },
        })
    }
}

/// The paired records produced by a successful ballot.
#[derive(Debug, Clone, PartialEq)]
pub struct BallotRecord {
    pub voter: Voter,
    pub candidate: Candidate,
}

/// Confirmation of an election reset.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetSummary {
    pub candidates_reset: u64,
    pub voters_reset: u64,
}

/// Backing storage for the election.
#[rocket::async_trait]
pub trait ElectionStore: Send + Sync {
    async fn candidate(&self, id: Id) -> Result<Option<Candidate>>;

    /// All candidates, or only those in the given status.
    async fn candidates(&self, status: Option<CandidateStatus>) -> Result<Vec<Candidate>>;

    /// Insert a new candidacy. Fails with a validation error if the owner already has one.
    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Candidate>;

    /// Apply `change` iff the candidate's revision is still `revision`.
    ///
    /// Returns `None` when the candidate is gone or was changed concurrently.
    async fn update_candidate(
        &self,
        id: Id,
        revision: u32,
        change: CandidateChange,
    ) -> Result<Option<Candidate>>;

    /// Remove a candidacy. Returns whether anything was removed.
    async fn delete_candidate(&self, id: Id) -> Result<bool>;

    async fn voter(&self, id: Id) -> Result<Option<Voter>>;

    /// Add an account. Registration itself happens elsewhere; this is how its
    /// result reaches the engine.
    async fn insert_voter(&self, voter: NewVoter) -> Result<Voter>;

    /// Count non-admin voters, and how many of them have voted, as one consistent view.
    async fn turnout(&self) -> Result<Turnout>;

    async fn window(&self) -> Result<Option<ElectionWindow>>;

    async fn set_window(&self, window: ElectionWindow) -> Result<()>;

    /// Atomically record one ballot: mark the voter as voted and add one vote to
    /// the candidate, or change nothing.
    ///
    /// Checks, in order: the voter exists and is not an admin (`NotFound`), has not
    /// voted (`AlreadyVoted`), the candidate exists and is approved
    /// (`InvalidCandidate`), and `polls_open` (`ElectionClosed`).
    async fn record_ballot(&self, voter: Id, candidate: Id, polls_open: bool)
        -> Result<BallotRecord>;

    /// Atomically zero every tally and clear every non-admin voter's flag.
    async fn reset(&self) -> Result<ResetSummary>;
}
