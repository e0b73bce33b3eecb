use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::voter::Turnout;
use crate::store::ElectionStore;

/// The half-open interval `[start_time, end_time)` during which ballots may be cast.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionWindow {
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_time: DateTime<Utc>,
}

impl ElectionWindow {
    /// Create a window, rejecting any range that does not start strictly before it ends.
    ///
    /// Both bounds are truncated to the millisecond, the precision they are stored at.
    pub fn new(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Result<Self> {
        let start_time = start_time.trunc_subsecs(3);
        let end_time = end_time.trunc_subsecs(3);
        if start_time >= end_time {
            return Err(Error::InvalidRange {
                start: start_time,
                end: end_time,
            });
        }
        Ok(Self {
            start_time,
            end_time,
        })
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now && now < self.end_time
    }

    /// Has every voter voted? Independent of the window itself: full turnout
    /// completes an election early.
    pub fn is_complete(voted: u64, total_voters: u64) -> bool {
        total_voters > 0 && voted == total_voters
    }
}

/// What full turnout means for voting.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnoutPolicy {
    /// Completion only changes how results are presented.
    #[default]
    DisplayOnly,
    /// A complete election refuses further ballots, even before its end time.
    ClosesVoting,
}

/// A point-in-time summary of the election, for dashboards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionStatus {
    pub window: Option<ElectionWindow>,
    pub open: bool,
    pub complete: bool,
    pub turnout: Turnout,
}

/// Reads and administers the election window.
#[derive(Clone)]
pub struct WindowSettings {
    store: Arc<dyn ElectionStore>,
    policy: TurnoutPolicy,
}

impl WindowSettings {
    pub fn new(store: Arc<dyn ElectionStore>, policy: TurnoutPolicy) -> Self {
        Self { store, policy }
    }

    /// Replace the election window.
    pub async fn set_window(
        &self,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<ElectionWindow> {
        let window = ElectionWindow::new(start_time, end_time)?;
        self.store.set_window(window).await?;
        info!("Election window set to [{start_time}, {end_time})");
        Ok(window)
    }

    /// The current window, if one has ever been set.
    pub async fn current(&self) -> Result<Option<ElectionWindow>> {
        self.store.window().await
    }

    pub async fn status(&self, now: DateTime<Utc>) -> Result<ElectionStatus> {
        let window = self.store.window().await?;
        let turnout = self.store.turnout().await?;
        let complete = ElectionWindow::is_complete(turnout.voted, turnout.total);
        let mut open = window.map_or(false, |w| w.is_open(now));
        if complete && self.policy == TurnoutPolicy::ClosesVoting {
            open = false;
        }
        Ok(ElectionStatus {
            window,
            open,
            complete,
            turnout,
        })
    }
}
