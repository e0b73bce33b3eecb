use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::{ElectionResults, ElectionStatus, ElectionWindow, Review};

/// Request body for setting the election window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// The election window as returned by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowDescription {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl From<ElectionWindow> for WindowDescription {
    fn from(window: ElectionWindow) -> Self {
        Self {
            start_time: window.start_time,
            end_time: window.end_time,
        }
    }
}

/// Request body for an admin review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub decision: Review,
}

/// Election status for dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDescription {
    pub window: Option<WindowDescription>,
    pub open: bool,
    pub complete: bool,
    pub voted: u64,
    pub total_voters: u64,
}

impl From<ElectionStatus> for StatusDescription {
    fn from(status: ElectionStatus) -> Self {
        Self {
            window: status.window.map(Into::into),
            open: status.open,
            complete: status.complete,
            voted: status.turnout.voted,
            total_voters: status.turnout.total,
        }
    }
}

/// One approved candidate's tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyDescription {
    pub id: String,
    pub name: String,
    pub votes: u64,
}

/// Current results, most votes first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsDescription {
    pub candidates: Vec<TallyDescription>,
    pub voted: u64,
    pub total_voters: u64,
    pub complete: bool,
}

impl From<ElectionResults> for ResultsDescription {
    fn from(results: ElectionResults) -> Self {
        Self {
            candidates: results
                .tallies
                .into_iter()
                .map(|tally| TallyDescription {
                    id: tally.id.to_string(),
                    name: tally.name,
                    votes: tally.votes,
                })
                .collect(),
            voted: results.turnout.voted,
            total_voters: results.turnout.total,
            complete: results.complete,
        }
    }
}
