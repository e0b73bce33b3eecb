use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{candidate::CandidateStatus, mongodb::Id, voter::Turnout};
use crate::store::{BallotRecord, ElectionStore};

use super::window::{ElectionWindow, TurnoutPolicy};

/// One approved candidate's current tally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    pub id: Id,
    pub name: String,
    pub votes: u64,
}

/// Current tallies for every approved candidate, most votes first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionResults {
    pub tallies: Vec<Tally>,
    pub turnout: Turnout,
    pub complete: bool,
}

/// Records ballots, one per voter per election cycle.
#[derive(Clone)]
pub struct BallotBox {
    store: Arc<dyn ElectionStore>,
    policy: TurnoutPolicy,
}

impl BallotBox {
    pub fn new(store: Arc<dyn ElectionStore>, policy: TurnoutPolicy) -> Self {
        Self { store, policy }
    }

    /// Cast `voter`'s ballot for `candidate`.
    ///
    /// Fails, checking in this order, with `NotFound` for an unknown (or admin)
    /// voter, `AlreadyVoted`, `InvalidCandidate` for a missing or unapproved
    /// candidate, and `ElectionClosed` outside the window. Retrying after any
    /// failure is safe: a ballot that did commit makes the retry report
    /// `AlreadyVoted`.
    pub async fn cast_vote(
        &self,
        voter: Id,
        candidate: Id,
        now: DateTime<Utc>,
    ) -> Result<BallotRecord> {
        let polls_open = self.polls_open(now).await?;
        match self.store.record_ballot(voter, candidate, polls_open).await {
            Ok(record) => {
                info!(
                    "Voter {voter} cast a ballot for candidate {candidate} (tally now {})",
                    record.candidate.votes
                );
                Ok(record)
            }
            Err(err) => {
                if err.is_retryable() {
                    warn!("Ballot from voter {voter} failed in storage: {err}");
                } else {
                    debug!("Ballot from voter {voter} refused: {err}");
                }
                Err(err)
            }
        }
    }

    /// Current tallies of the approved candidates.
    pub async fn results(&self) -> Result<ElectionResults> {
        let mut tallies: Vec<_> = self
            .store
            .candidates(Some(CandidateStatus::Approved))
            .await?
            .into_iter()
            .map(|candidate| Tally {
                id: candidate.id,
                name: candidate.candidate.name,
                votes: candidate.candidate.votes,
            })
            .collect();
        tallies.sort_by(|a, b| b.votes.cmp(&a.votes).then_with(|| a.name.cmp(&b.name)));
        let turnout = self.store.turnout().await?;
        Ok(ElectionResults {
            tallies,
            turnout,
            complete: ElectionWindow::is_complete(turnout.voted, turnout.total),
        })
    }

    /// Is the window open, and (under [`TurnoutPolicy::ClosesVoting`]) is
    /// turnout still incomplete?
    async fn polls_open(&self, now: DateTime<Utc>) -> Result<bool> {
        let Some(window) = self.store.window().await? else {
            return Ok(false);
        };
        if !window.is_open(now) {
            return Ok(false);
        }
        if self.policy == TurnoutPolicy::ClosesVoting {
            let turnout = self.store.turnout().await?;
            return Ok(!ElectionWindow::is_complete(turnout.voted, turnout.total));
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::engine::ElectionEngine;
    use crate::error::Error;
    use crate::model::{
        candidate::{Candidate, CandidateCore},
        voter::VoterCore,
    };

    async fn approved(engine: &ElectionEngine, name: &str, votes: u64) -> Candidate {
        let mut candidate = CandidateCore::example(Id::new());
        candidate.name = name.to_string();
        candidate.status = CandidateStatus::Approved;
        candidate.votes = votes;
        engine.store().insert_candidate(candidate).await.unwrap()
    }

    #[backend_test]
    async fn second_ballot_is_refused(engine: ElectionEngine) {
        engine.open_for_testing().await;
        let candidate = approved(&engine, "Ada", 3).await;
        let voter = engine.enroll_for_testing("v1").await;
        let ballot_box = engine.ballot_box();

        let record = ballot_box
            .cast_vote(voter.id, candidate.id, Utc::now())
            .await
            .unwrap();
        assert_eq!(record.candidate.votes, 4);
        assert!(record.voter.has_voted);

        let again = ballot_box.cast_vote(voter.id, candidate.id, Utc::now()).await;
        assert!(matches!(again, Err(Error::AlreadyVoted(id)) if id == voter.id));
        let stored = engine.store().candidate(candidate.id).await.unwrap().unwrap();
        assert_eq!(stored.votes, 4);
    }

    #[backend_test]
    async fn refusals_are_reported_in_order(engine: ElectionEngine) {
        let ballot_box = engine.ballot_box();
        let store = engine.store();
        let pending = store
            .insert_candidate(CandidateCore::example(Id::new()))
            .await
            .unwrap();
        let candidate = approved(&engine, "Ada", 0).await;
        let voter = engine.enroll_for_testing("v1").await;
        let admin = store.insert_voter(VoterCore::admin("root")).await.unwrap();

        // No window has been set: closed, but only after every other check.
        let closed = ballot_box.cast_vote(voter.id, candidate.id, Utc::now()).await;
        assert!(matches!(closed, Err(Error::ElectionClosed)));
        let unapproved = ballot_box.cast_vote(voter.id, pending.id, Utc::now()).await;
        assert!(matches!(unapproved, Err(Error::InvalidCandidate(_))));
        let missing = ballot_box.cast_vote(voter.id, Id::new(), Utc::now()).await;
        assert!(matches!(missing, Err(Error::InvalidCandidate(_))));
        let unknown = ballot_box.cast_vote(Id::new(), candidate.id, Utc::now()).await;
        assert!(matches!(unknown, Err(Error::NotFound(_))));
        let admin_ballot = ballot_box.cast_vote(admin.id, candidate.id, Utc::now()).await;
        assert!(matches!(admin_ballot, Err(Error::NotFound(_))));

        engine.open_for_testing().await;
        ballot_box
            .cast_vote(voter.id, candidate.id, Utc::now())
            .await
            .unwrap();
        // Already voted wins over a bad candidate.
        let both = ballot_box.cast_vote(voter.id, pending.id, Utc::now()).await;
        assert!(matches!(both, Err(Error::AlreadyVoted(_))));

        let stored = store.candidate(pending.id).await.unwrap().unwrap();
        assert_eq!(stored.votes, 0);
    }

    #[backend_test]
    async fn window_bounds_are_enforced(engine: ElectionEngine) {
        let start = Utc::now() + Duration::hours(1);
        let end = start + Duration::hours(1);
        engine.window().set_window(start, end).await.unwrap();
        let candidate = approved(&engine, "Ada", 0).await;
        let voter = engine.enroll_for_testing("v1").await;
        let ballot_box = engine.ballot_box();

        let early = ballot_box
            .cast_vote(voter.id, candidate.id, start - Duration::milliseconds(1))
            .await;
        assert!(matches!(early, Err(Error::ElectionClosed)));
        let late = ballot_box.cast_vote(voter.id, candidate.id, end).await;
        assert!(matches!(late, Err(Error::ElectionClosed)));
        assert!(!engine.store().voter(voter.id).await.unwrap().unwrap().has_voted);

        ballot_box.cast_vote(voter.id, candidate.id, start).await.unwrap();
    }

    /// Race `attempts` ballots from a single voter; exactly one may land.
    async fn race_one_voter(engine: &ElectionEngine, attempts: usize) {
        engine.open_for_testing().await;
        let candidate = approved(engine, "Ada", 0).await;
        let voter = engine.enroll_for_testing("v1").await;

        let tasks: Vec<_> = (0..attempts)
            .map(|_| {
                let ballot_box = engine.ballot_box();
                rocket::tokio::spawn(async move {
                    ballot_box.cast_vote(voter.id, candidate.id, Utc::now()).await
                })
            })
            .collect();
        let mut successes = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => successes += 1,
                Err(err) => assert!(matches!(err, Error::AlreadyVoted(_)), "{err}"),
            }
        }
        assert_eq!(successes, 1);
        let stored = engine.store().candidate(candidate.id).await.unwrap().unwrap();
        assert_eq!(stored.votes, 1);
    }

    /// Race one ballot from each of `voters` voters onto the same candidate.
    async fn race_many_voters(engine: &ElectionEngine, voters: u64) {
        engine.open_for_testing().await;
        let candidate = approved(engine, "Ada", 0).await;
        let mut enrolled = Vec::new();
        for i in 0..voters {
            enrolled.push(engine.enroll_for_testing(&format!("voter-{i}")).await);
        }

        let tasks: Vec<_> = enrolled
            .iter()
            .map(|voter| {
                let ballot_box = engine.ballot_box();
                let voter = voter.id;
                rocket::tokio::spawn(async move {
                    ballot_box.cast_vote(voter, candidate.id, Utc::now()).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let stored = engine.store().candidate(candidate.id).await.unwrap().unwrap();
        assert_eq!(stored.votes, voters);
        let turnout = engine.store().turnout().await.unwrap();
        assert_eq!(turnout, Turnout { voted: voters, total: voters });
    }

    /// Interleave ballots with resets. A reset may give up after repeated
    /// conflicts, but every committed state pairs each tally with one voted flag.
    async fn race_ballots_and_resets(engine: &ElectionEngine, voters: usize) {
        engine.open_for_testing().await;
        let candidates = [
            approved(engine, "Ada", 0).await.id,
            approved(engine, "Bea", 0).await.id,
        ];
        let mut enrolled = Vec::new();
        for i in 0..voters {
            enrolled.push(engine.enroll_for_testing(&format!("voter-{i}")).await.id);
        }

        let mut tasks = Vec::new();
        for (i, voter) in enrolled.into_iter().enumerate() {
            let ballot_box = engine.ballot_box();
            let candidate = candidates[i % 2];
            tasks.push(rocket::tokio::spawn(async move {
                let _ = ballot_box.cast_vote(voter, candidate, Utc::now()).await;
            }));
            if i % 4 == 0 {
                let coordinator = engine.reset_coordinator();
                tasks.push(rocket::tokio::spawn(async move {
                    if let Err(err) = coordinator.reset().await {
                        assert!(err.is_retryable(), "{err}");
                    }
                }));
            }
        }
        for task in tasks {
            task.await.unwrap();
        }

        let mut tallied = 0;
        for id in candidates {
            tallied += engine.store().candidate(id).await.unwrap().unwrap().votes;
        }
        assert_eq!(tallied, engine.store().turnout().await.unwrap().voted);
    }

    #[backend_test]
    async fn concurrent_ballots_from_one_voter(engine: ElectionEngine) {
        race_one_voter(&engine, 32).await;
    }

    #[backend_test]
    async fn concurrent_ballots_lose_no_updates(engine: ElectionEngine) {
        race_many_voters(&engine, 24).await;
    }

    #[backend_test]
    async fn resets_interleave_with_ballots(engine: ElectionEngine) {
        race_ballots_and_resets(&engine, 32).await;
    }

    // The MongoDB runs stay below the transaction retry limit, so every
    // ballot can commit within its attempts.

    #[backend_test(mongo)]
    async fn concurrent_ballots_from_one_voter_in_mongo(engine: ElectionEngine) {
        race_one_voter(&engine, 8).await;
    }

    #[backend_test(mongo)]
    async fn concurrent_ballots_lose_no_updates_in_mongo(engine: ElectionEngine) {
        race_many_voters(&engine, 6).await;
    }

    #[backend_test(mongo)]
    async fn resets_interleave_with_ballots_in_mongo(engine: ElectionEngine) {
        race_ballots_and_resets(&engine, 12).await;
    }

    #[backend_test]
    async fn results_rank_approved_candidates(engine: ElectionEngine) {
        let b = approved(&engine, "Bea", 5).await;
        let a = approved(&engine, "Ada", 5).await;
        let c = approved(&engine, "Cal", 9).await;
        engine
            .store()
            .insert_candidate(CandidateCore::example(Id::new()))
            .await
            .unwrap();

        let results = engine.ballot_box().results().await.unwrap();
        let order: Vec<_> = results.tallies.iter().map(|t| t.id).collect();
        assert_eq!(order, vec![c.id, a.id, b.id]);
        assert!(!results.complete);
    }

    #[backend_test]
    async fn full_turnout_closes_status_only_when_configured(engine: ElectionEngine) {
        use crate::engine::WindowSettings;

        engine.open_for_testing().await;
        let candidate = approved(&engine, "Ada", 0).await;
        let voter = engine.enroll_for_testing("only-voter").await;
        let strict = WindowSettings::new(engine.store().clone(), TurnoutPolicy::ClosesVoting);
        assert!(strict.status(Utc::now()).await.unwrap().open);

        BallotBox::new(engine.store().clone(), TurnoutPolicy::ClosesVoting)
            .cast_vote(voter.id, candidate.id, Utc::now())
            .await
            .unwrap();
        let status = strict.status(Utc::now()).await.unwrap();
        assert!(status.complete);
        assert!(!status.open);

        let relaxed = engine.window().status(Utc::now()).await.unwrap();
        assert!(relaxed.complete);
        assert!(relaxed.open);
        assert!(engine.ballot_box().results().await.unwrap().complete);

        // A newly enrolled voter reopens a strict election.
        let late = engine.enroll_for_testing("late").await;
        assert!(strict.status(Utc::now()).await.unwrap().open);
        BallotBox::new(engine.store().clone(), TurnoutPolicy::ClosesVoting)
            .cast_vote(late.id, candidate.id, Utc::now())
            .await
            .unwrap();
    }
}
