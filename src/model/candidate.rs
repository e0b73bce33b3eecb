use std::fmt::{Display, Formatter};
use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::{serde_helpers::chrono_datetime_as_bson_datetime, to_bson, Bson};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::{optional_bson_datetime, Id};

/// States in the candidacy lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    /// Submitted, awaiting admin review. Hidden from voters.
    Pending,
    /// Reviewed and accepted. Visible to voters and able to receive votes.
    Approved,
    /// Reviewed and turned down. The candidate may resubmit.
    Rejected,
}

impl Display for CandidateStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

impl From<CandidateStatus> for Bson {
    fn from(status: CandidateStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}

/// Year of study as declared on a candidate's criteria bundle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum YearOfStudy {
    #[serde(rename = "0 Year")]
    Zero,
    Freshman,
    Remedial,
    #[serde(rename = "1st Year")]
    First,
    #[serde(rename = "2nd Year")]
    Second,
    #[serde(rename = "3rd Year")]
    Third,
    #[serde(rename = "4th Year")]
    Fourth,
    #[serde(rename = "5th Year")]
    Fifth,
    Graduate,
}

impl YearOfStudy {
    /// Years of study that may not stand for election.
    pub fn is_disqualified(self) -> bool {
        matches!(
            self,
            Self::Zero | Self::Freshman | Self::Remedial | Self::Graduate
        )
    }
}

/// The candidacy criteria bundle, as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criteria {
    pub manifesto: String,
    pub vision: String,
    /// Years of relevant experience.
    pub experience: u32,
    pub department: Option<String>,
    pub cgpa: Option<f64>,
    pub year: Option<YearOfStudy>,
    /// Eligibility score computed when the bundle was last submitted.
    pub eligibility_score: u32,
}

/// Core candidate data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateCore {
    /// The account that registered this candidacy.
    pub owner: Id,
    pub name: String,
    pub description: String,
    /// Reference to the profile image; encoding and hosting are handled elsewhere.
    pub image: String,
    /// Vote tally. Only ever written by ballot casting and election reset.
    pub votes: u64,
    pub status: CandidateStatus,
    pub criteria: Option<Criteria>,
    /// Bumped on every lifecycle write so concurrent reviews and edits cannot
    /// silently overwrite each other.
    pub revision: u32,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub submitted_at: DateTime<Utc>,
    #[serde(default, with = "optional_bson_datetime")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default, with = "optional_bson_datetime")]
    pub rejected_at: Option<DateTime<Utc>>,
}

impl CandidateCore {
    /// Is this candidate visible to voters and able to receive votes?
    pub fn is_votable(&self) -> bool {
        self.status == CandidateStatus::Approved
    }
}

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;

/// A candidate from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Criteria {
        /// A bundle scoring the full 100 points.
        pub fn example() -> Self {
            Self {
                manifesto: "Longer library hours".to_string(),
                vision: "A campus that listens".to_string(),
                experience: 4,
                department: Some("Computer Science".to_string()),
                cgpa: Some(3.8),
                year: Some(YearOfStudy::Third),
                eligibility_score: 100,
            }
        }
    }

    impl CandidateCore {
        pub fn example(owner: Id) -> Self {
            Self {
                owner,
                name: "Ada Okafor".to_string(),
                description: "Third year, class representative".to_string(),
                image: "candidates/ada.png".to_string(),
                votes: 0,
                status: CandidateStatus::Pending,
                criteria: Some(Criteria::example()),
                revision: 0,
                submitted_at: Utc::now(),
                approved_at: None,
                rejected_at: None,
            }
        }
    }
}
