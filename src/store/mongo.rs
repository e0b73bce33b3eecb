use std::future::Future;

use mongodb::{
    bson::doc,
    error::TRANSIENT_TRANSACTION_ERROR,
    options::{FindOneAndUpdateOptions, ReplaceOptions, ReturnDocument, SessionOptions},
    Client, Database,
};
use rocket::futures::TryStreamExt;

use crate::engine::ElectionWindow;
use crate::error::{Error, Result};
use crate::model::{
    candidate::{Candidate, CandidateStatus, NewCandidate},
    mongodb::{ensure_indexes_exist, is_duplicate_key_error, Coll, Id},
    voter::{NewVoter, Turnout, Voter},
};

use super::{BallotRecord, CandidateChange, ElectionStore, ResetSummary};

/// `_id` of the singleton settings document holding the election window.
const WINDOW_ID: &str = "election_window";

/// How many times a transaction is re-run after losing a write conflict.
const MAX_TRANSACTION_ATTEMPTS: u32 = 8;

/// Election storage backed by MongoDB.
///
/// Ballots and resets run as multi-document transactions, which need a replica
/// set (a single-node one is enough).
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    candidates: Coll<Candidate>,
    new_candidates: Coll<NewCandidate>,
    voters: Coll<Voter>,
    new_voters: Coll<NewVoter>,
    settings: Coll<ElectionWindow>,
}

impl MongoStore {
    /// Wrap the given database. Does not touch the database itself.
    pub fn new(client: Client, db: &Database) -> Self {
        Self {
            client,
            candidates: Coll::from_db(db),
            new_candidates: Coll::from_db(db),
            voters: Coll::from_db(db),
            new_voters: Coll::from_db(db),
            settings: Coll::from_db(db),
        }
    }

    /// Wrap the given database, first making sure its indexes exist.
    pub async fn open(client: Client, db: &Database) -> Result<Self> {
        ensure_indexes_exist(db).await?;
        Ok(Self::new(client, db))
    }

    async fn try_record_ballot(
        &self,
        voter_id: Id,
        candidate_id: Id,
        polls_open: bool,
    ) -> Result<BallotRecord> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        // Returning early leaves the transaction uncommitted; dropping the
        // session aborts it.
        let voter = self
            .voters
            .find_one_with_session(voter_id.as_doc(), None, &mut session)
            .await?
            .filter(|voter| voter.is_voter())
            .ok_or_else(|| Error::not_found(format!("Voter {voter_id}")))?;
        if voter.has_voted {
            return Err(Error::AlreadyVoted(voter_id));
        }

        let candidate = self
            .candidates
            .find_one_with_session(candidate_id.as_doc(), None, &mut session)
            .await?;
        if !candidate.map_or(false, |candidate| candidate.is_votable()) {
            return Err(Error::InvalidCandidate(candidate_id));
        }

        if !polls_open {
            return Err(Error::ElectionClosed);
        }

        // Conditional writes: a concurrent ballot for the same voter either
        // conflicts with this transaction or has already flipped the flag.
        let filter = doc! {
            "_id": voter_id,
            "has_voted": false,
        };
        let update = doc! {
            "$set": { "has_voted": true },
        };
        let result = self
            .voters
            .update_one_with_session(filter, update, None, &mut session)
            .await?;
        if result.modified_count != 1 {
            return Err(Error::AlreadyVoted(voter_id));
        }

        let filter = doc! {
            "_id": candidate_id,
            "status": CandidateStatus::Approved,
        };
        let update = doc! {
            "$inc": { "votes": 1_i64 },
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let candidate = self
            .candidates
            .find_one_and_update_with_session(filter, update, options, &mut session)
            .await?
            .ok_or(Error::InvalidCandidate(candidate_id))?;

        session.commit_transaction().await?;

        let mut voter = voter;
        voter.has_voted = true;
        Ok(BallotRecord { voter, candidate })
    }

    async fn try_reset(&self) -> Result<ResetSummary> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        let update = doc! {
            "$set": { "votes": 0_i64 },
        };
        let candidates = self
            .candidates
            .update_many_with_session(doc! {}, update, None, &mut session)
            .await?;

        let filter = doc! {
            "is_admin": false,
        };
        let update = doc! {
            "$set": { "has_voted": false },
        };
        let voters = self
            .voters
            .update_many_with_session(filter, update, None, &mut session)
            .await?;

        session.commit_transaction().await?;

        Ok(ResetSummary {
            candidates_reset: candidates.matched_count,
            voters_reset: voters.matched_count,
        })
    }
}

/// Run `transaction`, re-running it whenever it aborts with a transient
/// transaction error (a write conflict with a concurrent transaction).
async fn with_conflict_retry<T, F, Fut>(operation: &str, mut transaction: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match transaction().await {
            Err(Error::Db(err))
                if attempt < MAX_TRANSACTION_ATTEMPTS
                    && err.contains_label(TRANSIENT_TRANSACTION_ERROR) =>
            {
                debug!("{operation}: transaction conflict on attempt {attempt}, retrying: {err}");
                attempt += 1;
            }
            result => return result,
        }
    }
}

#[rocket::async_trait]
impl ElectionStore for MongoStore {
    async fn candidate(&self, id: Id) -> Result<Option<Candidate>> {
        Ok(self.candidates.find_one(id.as_doc(), None).await?)
    }

    async fn candidates(&self, status: Option<CandidateStatus>) -> Result<Vec<Candidate>> {
        let filter = status.map(|status| doc! { "status": status });
        let candidates = self
            .candidates
            .find(filter, None)
            .await?
            .try_collect()
            .await?;
        Ok(candidates)
    }

    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Candidate> {
        let inserted = match self.new_candidates.insert_one(&candidate, None).await {
            Ok(inserted) => inserted,
            Err(err) if is_duplicate_key_error(&err) => {
                return Err(Error::Validation(format!(
                    "Account {} already has a candidacy",
                    candidate.owner
                )));
            }
            Err(err) => return Err(err.into()),
        };
        let id: Id = inserted
            .inserted_id
            .as_object_id()
            .ok_or_else(|| Error::Storage("inserted candidate has no ObjectId".to_string()))?
            .into();
        Ok(Candidate { id, candidate })
    }

    async fn update_candidate(
        &self,
        id: Id,
        revision: u32,
        change: CandidateChange,
    ) -> Result<Option<Candidate>> {
        let filter = doc! {
            "_id": id,
            "revision": i64::from(revision),
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let candidate = self
            .candidates
            .find_one_and_update(filter, change.to_update()?, options)
            .await?;
        Ok(candidate)
    }

    async fn delete_candidate(&self, id: Id) -> Result<bool> {
        let result = self.candidates.delete_one(id.as_doc(), None).await?;
        Ok(result.deleted_count == 1)
    }

    async fn voter(&self, id: Id) -> Result<Option<Voter>> {
        Ok(self.voters.find_one(id.as_doc(), None).await?)
    }

    async fn insert_voter(&self, voter: NewVoter) -> Result<Voter> {
        let inserted = match self.new_voters.insert_one(&voter, None).await {
            Ok(inserted) => inserted,
            Err(err) if is_duplicate_key_error(&err) => {
                return Err(Error::Validation(format!(
                    "Username {} is already in use",
                    voter.username
                )));
            }
            Err(err) => return Err(err.into()),
        };
        let id: Id = inserted
            .inserted_id
            .as_object_id()
            .ok_or_else(|| Error::Storage("inserted voter has no ObjectId".to_string()))?
            .into();
        Ok(Voter { id, voter })
    }

    async fn turnout(&self) -> Result<Turnout> {
        // Both counts come from one snapshot so `voted <= total` always holds.
        let options = SessionOptions::builder().snapshot(true).build();
        let mut session = self.client.start_session(Some(options)).await?;
        let total = self
            .voters
            .count_documents_with_session(doc! { "is_admin": false }, None, &mut session)
            .await?;
        let filter = doc! {
            "is_admin": false,
            "has_voted": true,
        };
        let voted = self
            .voters
            .count_documents_with_session(filter, None, &mut session)
            .await?;
        Ok(Turnout { voted, total })
    }

    async fn window(&self) -> Result<Option<ElectionWindow>> {
        Ok(self.settings.find_one(doc! { "_id": WINDOW_ID }, None).await?)
    }

    async fn set_window(&self, window: ElectionWindow) -> Result<()> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.settings
            .replace_one(doc! { "_id": WINDOW_ID }, &window, options)
            .await?;
        Ok(())
    }

    async fn record_ballot(
        &self,
        voter: Id,
        candidate: Id,
        polls_open: bool,
    ) -> Result<BallotRecord> {
        with_conflict_retry("record ballot", || {
            self.try_record_ballot(voter, candidate, polls_open)
        })
        .await
    }

    async fn reset(&self) -> Result<ResetSummary> {
        with_conflict_retry("reset election", || self.try_reset()).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::engine::ElectionEngine;
    use crate::model::{candidate::CandidateCore, voter::VoterCore};

    use super::*;

    #[backend_test(mongo)]
    async fn ballot_commits_both_documents(engine: ElectionEngine) {
        let store = engine.store();
        let now = Utc::now();
        engine
            .window()
            .set_window(now - Duration::hours(1), now + Duration::hours(1))
            .await
            .unwrap();
        let mut candidate = CandidateCore::example(Id::new());
        candidate.status = CandidateStatus::Approved;
        let candidate = store.insert_candidate(candidate).await.unwrap();
        let voter = store.insert_voter(VoterCore::new("mongo-voter")).await.unwrap();

        let record = store.record_ballot(voter.id, candidate.id, true).await.unwrap();
        assert_eq!(record.candidate.votes, 1);
        assert!(record.voter.has_voted);

        let again = store.record_ballot(voter.id, candidate.id, true).await;
        assert!(matches!(again, Err(Error::AlreadyVoted(_))));
        let stored = store.candidate(candidate.id).await.unwrap().unwrap();
        assert_eq!(stored.votes, 1);
    }

    #[backend_test(mongo)]
    async fn reset_clears_tallies_and_flags(engine: ElectionEngine) {
        let store = engine.store();
        let mut candidate = CandidateCore::example(Id::new());
        candidate.status = CandidateStatus::Approved;
        let candidate = store.insert_candidate(candidate).await.unwrap();
        let admin = store.insert_voter(VoterCore::admin("mongo-admin")).await.unwrap();
        let voter = store.insert_voter(VoterCore::new("mongo-voter")).await.unwrap();
        store.record_ballot(voter.id, candidate.id, true).await.unwrap();

        let summary = store.reset().await.unwrap();
        assert_eq!(summary.candidates_reset, 1);
        assert_eq!(summary.voters_reset, 1);
        assert_eq!(store.candidate(candidate.id).await.unwrap().unwrap().votes, 0);
        assert!(!store.voter(voter.id).await.unwrap().unwrap().has_voted);
        assert!(store.voter(admin.id).await.unwrap().unwrap().is_admin);
        assert_eq!(store.turnout().await.unwrap(), Turnout { voted: 0, total: 1 });
    }

    #[backend_test(mongo)]
    async fn window_is_a_singleton(engine: ElectionEngine) {
        let store = engine.store();
        assert_eq!(store.window().await.unwrap(), None);
        let start = Utc::now();
        let first = ElectionWindow::new(start, start + Duration::hours(1)).unwrap();
        let second = ElectionWindow::new(start, start + Duration::hours(2)).unwrap();
        store.set_window(first).await.unwrap();
        store.set_window(second).await.unwrap();
        let stored = store.window().await.unwrap().unwrap();
        assert_eq!(stored, second);
    }
}
