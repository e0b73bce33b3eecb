use std::collections::HashMap;
use std::sync::Arc;

use rocket::tokio::sync::{Mutex, RwLock};

use crate::engine::ElectionWindow;
use crate::error::{Error, Result};
use crate::model::{
    candidate::{Candidate, CandidateStatus, NewCandidate},
    mongodb::Id,
    voter::{NewVoter, Turnout, Voter},
};

use super::{BallotRecord, CandidateChange, ElectionStore, ResetSummary};

/// A candidate record behind its own lock. `None` once the candidate is removed,
/// so anyone still holding the slot sees the removal.
type CandidateSlot = Arc<Mutex<Option<Candidate>>>;

/// Voters are never removed by the engine.
type VoterSlot = Arc<Mutex<Voter>>;

#[derive(Default)]
struct CandidateTable {
    records: HashMap<Id, CandidateSlot>,
    /// Owner account ID to candidate ID.
    owners: HashMap<Id, Id>,
}

#[derive(Default)]
struct VoterTable {
    records: HashMap<Id, VoterSlot>,
    usernames: HashMap<String, Id>,
}

/// Process-local election storage.
///
/// Every record has its own lock, so ballots for unrelated voters and
/// candidates never wait on each other. The reset gate is held shared by
/// every ballot and by whole-table reads, and exclusively by a reset: a reset
/// waits for in-flight ballots, then commits with nobody able to observe a
/// half-cleared table. Locks are always taken in the order gate, voter,
/// candidate.
#[derive(Default)]
pub struct MemoryStore {
    candidates: RwLock<CandidateTable>,
    voters: RwLock<VoterTable>,
    window: RwLock<Option<ElectionWindow>>,
    reset_gate: RwLock<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn candidate_slot(&self, id: Id) -> Option<CandidateSlot> {
        self.candidates.read().await.records.get(&id).cloned()
    }

    async fn candidate_slots(&self) -> Vec<CandidateSlot> {
        self.candidates.read().await.records.values().cloned().collect()
    }

    async fn voter_slot(&self, id: Id) -> Option<VoterSlot> {
        self.voters.read().await.records.get(&id).cloned()
    }

    async fn voter_slots(&self) -> Vec<VoterSlot> {
        self.voters.read().await.records.values().cloned().collect()
    }
}

#[rocket::async_trait]
impl ElectionStore for MemoryStore {
    async fn candidate(&self, id: Id) -> Result<Option<Candidate>> {
        match self.candidate_slot(id).await {
            Some(slot) => Ok(slot.lock().await.clone()),
            None => Ok(None),
        }
    }

    async fn candidates(&self, status: Option<CandidateStatus>) -> Result<Vec<Candidate>> {
        let _gate = self.reset_gate.read().await;
        let mut candidates = Vec::new();
        for slot in self.candidate_slots().await {
            if let Some(candidate) = slot.lock().await.as_ref() {
                if status.map_or(true, |s| candidate.status == s) {
                    candidates.push(candidate.clone());
                }
            }
        }
        candidates.sort_by_key(|c| c.id);
        Ok(candidates)
    }

    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Candidate> {
        let mut table = self.candidates.write().await;
        if table.owners.contains_key(&candidate.owner) {
            return Err(Error::Validation(format!(
                "Account {} already has a candidacy",
                candidate.owner
            )));
        }
        let candidate = Candidate {
            id: Id::new(),
            candidate,
        };
        table.owners.insert(candidate.owner, candidate.id);
        table
            .records
            .insert(candidate.id, Arc::new(Mutex::new(Some(candidate.clone()))));
        Ok(candidate)
    }

    async fn update_candidate(
        &self,
        id: Id,
        revision: u32,
        change: CandidateChange,
    ) -> Result<Option<Candidate>> {
        let Some(slot) = self.candidate_slot(id).await else {
            return Ok(None);
        };
        let mut record = slot.lock().await;
        match record.as_mut() {
            Some(candidate) if candidate.revision == revision => {
                change.apply(candidate);
                Ok(Some(candidate.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_candidate(&self, id: Id) -> Result<bool> {
        let Some(slot) = self.candidate_slot(id).await else {
            return Ok(false);
        };
        let removed = slot.lock().await.take();
        let Some(candidate) = removed else {
            return Ok(false);
        };
        let mut table = self.candidates.write().await;
        table.records.remove(&id);
        table.owners.remove(&candidate.owner);
        Ok(true)
    }

    async fn voter(&self, id: Id) -> Result<Option<Voter>> {
        match self.voter_slot(id).await {
            Some(slot) => Ok(Some(slot.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn insert_voter(&self, voter: NewVoter) -> Result<Voter> {
        let mut table = self.voters.write().await;
        if table.usernames.contains_key(&voter.username) {
            return Err(Error::Validation(format!(
                "Username {} is already in use",
                voter.username
            )));
        }
        let voter = Voter {
            id: Id::new(),
            voter,
        };
        table.usernames.insert(voter.username.clone(), voter.id);
        table
            .records
            .insert(voter.id, Arc::new(Mutex::new(voter.clone())));
        Ok(voter)
    }

    async fn turnout(&self) -> Result<Turnout> {
        let _gate = self.reset_gate.read().await;
        let mut turnout = Turnout::default();
        for slot in self.voter_slots().await {
            let voter = slot.lock().await;
            if voter.is_voter() {
                turnout.total += 1;
                if voter.has_voted {
                    turnout.voted += 1;
                }
            }
        }
        Ok(turnout)
    }

    async fn window(&self) -> Result<Option<ElectionWindow>> {
        Ok(*self.window.read().await)
    }

    async fn set_window(&self, window: ElectionWindow) -> Result<()> {
        *self.window.write().await = Some(window);
        Ok(())
    }

    async fn record_ballot(
        &self,
        voter_id: Id,
        candidate_id: Id,
        polls_open: bool,
    ) -> Result<BallotRecord> {
        let _gate = self.reset_gate.read().await;

        let voter_slot = self
            .voter_slot(voter_id)
            .await
            .ok_or_else(|| Error::not_found(format!("Voter {voter_id}")))?;
        let mut voter = voter_slot.lock().await;
        if !voter.is_voter() {
            return Err(Error::not_found(format!("Voter {voter_id}")));
        }
        if voter.has_voted {
            return Err(Error::AlreadyVoted(voter_id));
        }

        let candidate_slot = self
            .candidate_slot(candidate_id)
            .await
            .ok_or(Error::InvalidCandidate(candidate_id))?;
        let mut record = candidate_slot.lock().await;
        let candidate = record
            .as_mut()
            .filter(|candidate| candidate.is_votable())
            .ok_or(Error::InvalidCandidate(candidate_id))?;

        if !polls_open {
            return Err(Error::ElectionClosed);
        }

        // Both writes happen with both locks held and no await in between.
        candidate.votes += 1;
        voter.has_voted = true;

        Ok(BallotRecord {
            voter: voter.clone(),
            candidate: candidate.clone(),
        })
    }

    async fn reset(&self) -> Result<ResetSummary> {
        let _gate = self.reset_gate.write().await;
        let mut summary = ResetSummary::default();
        for slot in self.candidate_slots().await {
            if let Some(candidate) = slot.lock().await.as_mut() {
                candidate.votes = 0;
                summary.candidates_reset += 1;
            }
        }
        for slot in self.voter_slots().await {
            let mut voter = slot.lock().await;
            if voter.is_voter() {
                voter.has_voted = false;
                summary.voters_reset += 1;
            }
        }
        Ok(summary)
    }
}
