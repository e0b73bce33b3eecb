use serde::{Deserialize, Serialize};

use crate::model::voter::Voter;
use crate::store::BallotRecord;

use super::candidate::CandidateDescription;

/// Request body for casting a ballot: the chosen candidate's hex ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotSpec {
    pub candidate: String,
}

/// A voter as returned by the API. Role flags stay internal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterDescription {
    pub id: String,
    pub username: String,
    pub has_voted: bool,
}

impl From<Voter> for VoterDescription {
    fn from(voter: Voter) -> Self {
        Self {
            id: voter.id.to_string(),
            username: voter.voter.username,
            has_voted: voter.voter.has_voted,
        }
    }
}

/// Confirmation of a recorded ballot: the voter and candidate as they stand after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallotReceipt {
    pub voter: VoterDescription,
    pub candidate: CandidateDescription,
}

impl From<BallotRecord> for BallotReceipt {
    fn from(record: BallotRecord) -> Self {
        Self {
            voter: record.voter.into(),
            candidate: record.candidate.into(),
        }
    }
}
