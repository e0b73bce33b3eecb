//! The candidacy state machine.
//!
//! ```text
//!            submit                 approve
//!   (new) ──────────▶ pending ─────────────────▶ approved
//!                      ▲  │ ▲                       │
//!             resubmit │  │ └───────── reopen ──────┘
//!                      │  │ reject
//!                      │  ▼
//!                     rejected
//! ```
//!
//! Candidates may edit their profile while pending or rejected; once approved,
//! only an admin reopening the review lets the profile change again.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::candidate::{CriteriaSpec, Profile},
    candidate::{Candidate, CandidateCore, CandidateStatus, Criteria},
    mongodb::Id,
};
use crate::store::{CandidateChange, ElectionStore, ProfileUpdate};

use super::eligibility::{assess, EligibilityInput};

/// Largest cgpa on the grading scale.
pub const MAX_CGPA: f64 = 4.0;

/// An admin's decision on a candidacy.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Review {
    Approve,
    Reject,
    /// Send an approved candidacy back for re-review.
    Reopen,
}

impl Review {
    fn verb(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Reopen => "reopen",
        }
    }
}

impl CandidateStatus {
    /// The state a review moves this candidacy to, if the review is allowed at all.
    pub fn after_review(self, review: Review) -> Option<CandidateStatus> {
        use CandidateStatus::*;
        match (self, review) {
            (Pending, Review::Approve) => Some(Approved),
            (Pending, Review::Reject) => Some(Rejected),
            (Approved, Review::Reopen) => Some(Pending),
            _ => None,
        }
    }

    /// May the candidate edit and (re)submit their profile in this state?
    pub fn accepts_submission(self) -> bool {
        self != CandidateStatus::Approved
    }
}

/// Manages candidacies from registration through review.
#[derive(Clone)]
pub struct CandidateLifecycle {
    store: Arc<dyn ElectionStore>,
}

impl CandidateLifecycle {
    pub fn new(store: Arc<dyn ElectionStore>) -> Self {
        Self { store }
    }

    /// Open a new candidacy for `owner`, pending review.
    pub async fn register(
        &self,
        owner: Id,
        profile: Profile,
        now: DateTime<Utc>,
    ) -> Result<Candidate> {
        let profile = validate(profile, now)?;
        let candidate = CandidateCore {
            owner,
            name: profile.name,
            description: profile.description,
            image: profile.image,
            votes: 0,
            status: CandidateStatus::Pending,
            criteria: profile.criteria,
            revision: 0,
            submitted_at: now,
            approved_at: None,
            rejected_at: None,
        };
        let candidate = self.store.insert_candidate(candidate).await?;
        info!("Account {owner} registered candidacy {}", candidate.id);
        Ok(candidate)
    }

    /// Replace a candidate's profile and put it up for review.
    ///
    /// Pending and rejected candidacies may change every field; approved ones
    /// may not change at all.
    pub async fn submit(&self, id: Id, profile: Profile, now: DateTime<Utc>) -> Result<Candidate> {
        let candidate = self.find(id).await?;
        if !candidate.status.accepts_submission() {
            return Err(Error::InvalidTransition(format!(
                "Candidate {id} is {} and can no longer be edited",
                candidate.status
            )));
        }
        let profile = validate(profile, now)?;
        let updated = self
            .write(&candidate, "submit", CandidateChange::Profile(profile))
            .await?;
        info!(
            "Candidate {id} submitted profile ({} -> {})",
            candidate.status, updated.status
        );
        Ok(updated)
    }

    /// Apply an admin review decision.
    pub async fn review(&self, id: Id, review: Review, now: DateTime<Utc>) -> Result<Candidate> {
        let candidate = self.find(id).await?;
        let status = candidate.status.after_review(review).ok_or_else(|| {
            Error::InvalidTransition(format!(
                "Cannot {} candidate {id} while it is {}",
                review.verb(),
                candidate.status
            ))
        })?;
        if review == Review::Approve && candidate.criteria.is_none() {
            return Err(Error::InvalidTransition(format!(
                "Cannot approve candidate {id} without a criteria bundle"
            )));
        }
        let change = CandidateChange::Status { status, at: now };
        let updated = self.write(&candidate, review.verb(), change).await?;
        info!(
            "Candidate {id} review: {} ({} -> {status})",
            review.verb(),
            candidate.status
        );
        Ok(updated)
    }

    pub async fn approve(&self, id: Id, now: DateTime<Utc>) -> Result<Candidate> {
        self.review(id, Review::Approve, now).await
    }

    pub async fn reject(&self, id: Id, now: DateTime<Utc>) -> Result<Candidate> {
        self.review(id, Review::Reject, now).await
    }

    pub async fn reopen(&self, id: Id, now: DateTime<Utc>) -> Result<Candidate> {
        self.review(id, Review::Reopen, now).await
    }

    /// Delete a candidacy outright.
    pub async fn remove(&self, id: Id) -> Result<()> {
        if !self.store.delete_candidate(id).await? {
            return Err(Error::not_found(format!("Candidate {id}")));
        }
        warn!("Candidate {id} removed");
        Ok(())
    }

    /// Look up a candidate in any state.
    pub async fn find(&self, id: Id) -> Result<Candidate> {
        self.store
            .candidate(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Candidate {id}")))
    }

    /// Candidates visible to voters.
    pub async fn approved(&self) -> Result<Vec<Candidate>> {
        self.store.candidates(Some(CandidateStatus::Approved)).await
    }

    /// Every candidate, for review dashboards.
    pub async fn all(&self) -> Result<Vec<Candidate>> {
        self.store.candidates(None).await
    }

    /// Compare-and-set `change` against the revision we read.
    async fn write(
        &self,
        candidate: &Candidate,
        action: &str,
        change: CandidateChange,
    ) -> Result<Candidate> {
        let id = candidate.id;
        match self
            .store
            .update_candidate(id, candidate.revision, change)
            .await?
        {
            Some(updated) => Ok(updated),
            None => {
                // Lost a race: report what the record looks like now.
                let current = self.find(id).await?;
                debug!(
                    "Candidate {id}: {action} lost a race (revision {} -> {})",
                    candidate.revision, current.revision
                );
                Err(Error::InvalidTransition(format!(
                    "Candidate {id} changed concurrently and is now {}; cannot {action}",
                    current.status
                )))
            }
        }
    }
}

/// Check a submitted profile and compute its eligibility score.
fn validate(profile: Profile, now: DateTime<Utc>) -> Result<ProfileUpdate> {
    let name = required("name", profile.name)?;
    let description = required("description", profile.description)?;
    let image = required("image", profile.image)?;
    let criteria = profile.criteria.map(validate_criteria).transpose()?;
    Ok(ProfileUpdate {
        name,
        description,
        image,
        criteria,
        submitted_at: now,
    })
}

fn validate_criteria(spec: CriteriaSpec) -> Result<Criteria> {
    let manifesto = required("manifesto", spec.manifesto)?;
    let vision = required("vision", spec.vision)?;
    if let Some(cgpa) = spec.cgpa {
        if !(0.0..=MAX_CGPA).contains(&cgpa) {
            return Err(Error::Validation(format!(
                "cgpa must be between 0 and {MAX_CGPA}, got {cgpa}"
            )));
        }
    }
    let department = spec
        .department
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    let score = assess(EligibilityInput {
        cgpa: spec.cgpa,
        year: spec.year,
        experience: spec.experience,
        department: department.as_deref(),
    })
    .score;
    Ok(Criteria {
        manifesto,
        vision,
        experience: spec.experience,
        department,
        cgpa: spec.cgpa,
        year: spec.year,
        eligibility_score: score,
    })
}

fn required(field: &str, value: String) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::Validation(format!("`{field}` must not be empty")));
    }
    Ok(value.to_string())
}
