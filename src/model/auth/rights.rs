use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::model::voter::VoterCore;

/// What an account may do, as carried in its auth token.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rights {
    Voter,
    /// A voter that may also run for office.
    Candidate,
    Admin,
}

impl Rights {
    /// The rights an account is entitled to by its role flags.
    pub fn of(account: &VoterCore) -> Self {
        if account.is_admin {
            Self::Admin
        } else if account.is_candidate {
            Self::Candidate
        } else {
            Self::Voter
        }
    }

    /// Do these rights cover `target`? Candidates are voters too; admins are not.
    pub fn permits(self, target: Rights) -> bool {
        match self {
            Self::Candidate => matches!(target, Self::Candidate | Self::Voter),
            _ => self == target,
        }
    }
}

impl Display for Rights {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Voter => "voter",
                Self::Candidate => "candidate",
                Self::Admin => "admin",
            }
        )
    }
}

/// A role a route may require of its caller.
pub trait Role: Send + Sync + 'static {
    const RIGHTS: Rights;
}

/// Election administrators.
pub struct Admin;

/// Accounts allowed to register and edit a candidacy.
pub struct CandidateAccount;

/// Accounts allowed to cast a ballot.
pub struct VoterAccount;

impl Role for Admin {
    const RIGHTS: Rights = Rights::Admin;
}

impl Role for CandidateAccount {
    const RIGHTS: Rights = Rights::Candidate;
}

impl Role for VoterAccount {
    const RIGHTS: Rights = Rights::Voter;
}
