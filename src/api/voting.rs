use chrono::Utc;
use rocket::{post, routes, serde::json::Json, Route, State};

use crate::{
    engine::ElectionEngine,
    error::{Error, Result},
    model::{
        api::ballot::{BallotReceipt, BallotSpec},
        auth::{AuthToken, VoterAccount},
        mongodb::Id,
    },
};

pub fn routes() -> Vec<Route> {
    routes![cast_vote]
}

/// Cast the caller's ballot, timed by the server clock.
#[post("/votes", data = "<ballot>", format = "json")]
async fn cast_vote(
    token: AuthToken<VoterAccount>,
    ballot: Json<BallotSpec>,
    engine: &State<ElectionEngine>,
) -> Result<Json<BallotReceipt>> {
    let candidate: Id = ballot.candidate.parse().map_err(|_| {
        Error::Validation(format!("Malformed candidate ID: {:?}", ballot.candidate))
    })?;
    let record = engine
        .ballot_box()
        .cast_vote(token.id(), candidate, Utc::now())
        .await?;
    Ok(Json(record.into()))
}
