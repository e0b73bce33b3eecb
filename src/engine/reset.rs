use std::sync::Arc;

use crate::error::Result;
use crate::store::{ElectionStore, ResetSummary};

/// Starts a fresh election cycle over the same candidates and voters.
#[derive(Clone)]
pub struct ResetCoordinator {
    store: Arc<dyn ElectionStore>,
}

impl ResetCoordinator {
    pub fn new(store: Arc<dyn ElectionStore>) -> Self {
        Self { store }
    }

    /// Zero every tally and clear every voter's flag, all at once.
    ///
    /// Candidate statuses, criteria and the election window are left alone.
    pub async fn reset(&self) -> Result<ResetSummary> {
        let summary = self.store.reset().await?;
        warn!(
            "Election reset: {} candidate tallies and {} voters cleared",
            summary.candidates_reset, summary.voters_reset
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::engine::ElectionEngine;
    use crate::error::Error;
    use crate::model::{
        candidate::{CandidateCore, CandidateStatus},
        mongodb::Id,
        voter::{Turnout, VoterCore},
    };

    #[backend_test]
    async fn reset_zeroes_everything(engine: ElectionEngine) {
        let store = engine.store();
        let mut ids = Vec::new();
        for (name, votes) in [("A", 5), ("B", 3)] {
            let mut candidate = CandidateCore::example(Id::new());
            candidate.name = name.to_string();
            candidate.status = CandidateStatus::Approved;
            candidate.votes = votes;
            ids.push(store.insert_candidate(candidate).await.unwrap().id);
        }
        let pending = store
            .insert_candidate(CandidateCore::example(Id::new()))
            .await
            .unwrap();
        let mut voters = Vec::new();
        for (name, has_voted) in [("X", true), ("Y", true), ("Z", false)] {
            let mut voter = VoterCore::new(name);
            voter.has_voted = has_voted;
            voters.push(store.insert_voter(voter).await.unwrap().id);
        }

        let summary = engine.reset_coordinator().reset().await.unwrap();
        assert_eq!(summary.candidates_reset, 3);
        assert_eq!(summary.voters_reset, 3);

        for id in ids {
            let candidate = store.candidate(id).await.unwrap().unwrap();
            assert_eq!(candidate.votes, 0);
            assert_eq!(candidate.status, CandidateStatus::Approved);
            assert!(candidate.criteria.is_some());
        }
        let pending_after = store.candidate(pending.id).await.unwrap().unwrap();
        assert_eq!(pending_after.status, CandidateStatus::Pending);
        assert_eq!(pending_after.criteria, pending.criteria);
        for id in voters {
            assert!(!store.voter(id).await.unwrap().unwrap().has_voted);
        }
        assert_eq!(store.turnout().await.unwrap(), Turnout { voted: 0, total: 3 });
    }

    #[backend_test]
    async fn voting_resumes_after_reset(engine: ElectionEngine) {
        engine.open_for_testing().await;
        let mut candidate = CandidateCore::example(Id::new());
        candidate.status = CandidateStatus::Approved;
        let candidate = engine.store().insert_candidate(candidate).await.unwrap();
        let voter = engine.enroll_for_testing("again").await;
        let ballot_box = engine.ballot_box();

        ballot_box
            .cast_vote(voter.id, candidate.id, Utc::now())
            .await
            .unwrap();
        assert!(matches!(
            ballot_box.cast_vote(voter.id, candidate.id, Utc::now()).await,
            Err(Error::AlreadyVoted(_))
        ));

        engine.reset_coordinator().reset().await.unwrap();
        let record = ballot_box
            .cast_vote(voter.id, candidate.id, Utc::now())
            .await
            .unwrap();
        assert_eq!(record.candidate.votes, 1);
    }

    #[backend_test]
    async fn reset_of_empty_election(engine: ElectionEngine) {
        let summary = engine.reset_coordinator().reset().await.unwrap();
        assert_eq!(summary.candidates_reset, 0);
        assert_eq!(summary.voters_reset, 0);
    }
}
