use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core account data, as stored in the database.
///
/// Every account lives in the voters collection; the role flags say what else
/// it may do. Admin accounts never vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCore {
    pub username: String,
    /// Has this account cast its ballot in the current election cycle?
    pub has_voted: bool,
    pub is_admin: bool,
    pub is_candidate: bool,
}

impl VoterCore {
    /// A plain voter that has not voted yet.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            has_voted: false,
            is_admin: false,
            is_candidate: false,
        }
    }

    /// An administrative account.
    pub fn admin(username: impl Into<String>) -> Self {
        Self {
            is_admin: true,
            ..Self::new(username)
        }
    }

    /// A voter that is also allowed to register a candidacy.
    pub fn candidate(username: impl Into<String>) -> Self {
        Self {
            is_candidate: true,
            ..Self::new(username)
        }
    }

    /// May this account cast a ballot at all?
    pub fn is_voter(&self) -> bool {
        !self.is_admin
    }
}

/// A voter without an ID.
pub type NewVoter = VoterCore;

/// A voter from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl DerefMut for Voter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voter
    }
}

/// How many voters exist and how many of them have voted.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turnout {
    pub voted: u64,
    pub total: u64,
}
