use chrono::Utc;
use rocket::{delete, get, post, put, routes, serde::json::Json, Route, State};

use crate::{
    engine::ElectionEngine,
    error::Result,
    model::{
        api::{
            candidate::CandidateDescription,
            election::{ReviewRequest, WindowDescription, WindowSpec},
        },
        auth::{Admin, AuthToken},
        mongodb::Id,
    },
    store::ResetSummary,
};

pub fn routes() -> Vec<Route> {
    routes![
        list_candidates,
        review_candidate,
        remove_candidate,
        reset_election,
        set_window,
    ]
}

#[get("/admin/candidates")]
async fn list_candidates(
    _token: AuthToken<Admin>,
    engine: &State<ElectionEngine>,
) -> Result<Json<Vec<CandidateDescription>>> {
    let candidates = engine.lifecycle().all().await?;
    Ok(Json(candidates.into_iter().map(Into::into).collect()))
}

#[post(
    "/admin/candidates/<candidate_id>/review",
    data = "<review>",
    format = "json"
)]
async fn review_candidate(
    token: AuthToken<Admin>,
    candidate_id: Id,
    review: Json<ReviewRequest>,
    engine: &State<ElectionEngine>,
) -> Result<Json<CandidateDescription>> {
    debug!(
        "Admin {} reviewing candidate {candidate_id}: {:?}",
        token.id(),
        review.decision
    );
    let candidate = engine
        .lifecycle()
        .review(candidate_id, review.decision, Utc::now())
        .await?;
    Ok(Json(candidate.into()))
}

#[delete("/admin/candidates/<candidate_id>")]
async fn remove_candidate(
    _token: AuthToken<Admin>,
    candidate_id: Id,
    engine: &State<ElectionEngine>,
) -> Result<()> {
    engine.lifecycle().remove(candidate_id).await
}

#[post("/admin/reset")]
async fn reset_election(
    token: AuthToken<Admin>,
    engine: &State<ElectionEngine>,
) -> Result<Json<ResetSummary>> {
    info!("Admin {} requested an election reset", token.id());
    let summary = engine.reset_coordinator().reset().await?;
    Ok(Json(summary))
}

#[put("/admin/window", data = "<spec>", format = "json")]
async fn set_window(
    _token: AuthToken<Admin>,
    spec: Json<WindowSpec>,
    engine: &State<ElectionEngine>,
) -> Result<Json<WindowDescription>> {
    let window = engine
        .window()
        .set_window(spec.start_time, spec.end_time)
        .await?;
    Ok(Json(window.into()))
}
