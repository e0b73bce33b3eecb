use chrono::Utc;
use rocket::{get, routes, serde::json::Json, Route, State};

use crate::{
    engine::ElectionEngine,
    error::Result,
    model::api::election::{ResultsDescription, StatusDescription},
};

pub fn routes() -> Vec<Route> {
    routes![election_status, election_results]
}

#[get("/election")]
async fn election_status(engine: &State<ElectionEngine>) -> Result<Json<StatusDescription>> {
    let status = engine.window().status(Utc::now()).await?;
    Ok(Json(status.into()))
}

#[get("/election/results")]
async fn election_results(engine: &State<ElectionEngine>) -> Result<Json<ResultsDescription>> {
    let results = engine.ballot_box().results().await?;
    Ok(Json(results.into()))
}

#[cfg(test)]
mod tests {
    use rocket::{http::Status, local::asynchronous::Client, uri};

    use super::*;
    use crate::model::{
        candidate::{CandidateCore, CandidateStatus},
        mongodb::Id,
    };

    #[backend_test]
    async fn status_before_any_window(client: Client) {
        let response = client.get(uri!(election_status)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let status: StatusDescription = response.into_json().await.unwrap();
        assert_eq!(status.window, None);
        assert!(!status.open);
        assert!(!status.complete);
        assert_eq!(status.total_voters, 0);
    }

    #[backend_test]
    async fn status_and_results_track_ballots(client: Client, engine: ElectionEngine) {
        engine.open_for_testing().await;
        let mut candidate = CandidateCore::example(Id::new());
        candidate.status = CandidateStatus::Approved;
        let candidate = engine.store().insert_candidate(candidate).await.unwrap();
        let first = engine.enroll_for_testing("first").await;
        engine.enroll_for_testing("second").await;
        engine
            .ballot_box()
            .cast_vote(first.id, candidate.id, Utc::now())
            .await
            .unwrap();

        let status: StatusDescription = client
            .get(uri!(election_status))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert!(status.open);
        assert!(!status.complete);
        assert_eq!((status.voted, status.total_voters), (1, 2));

        let results: ResultsDescription = client
            .get(uri!(election_results))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(results.candidates.len(), 1);
        assert_eq!(results.candidates[0].id, candidate.id.to_string());
        assert_eq!(results.candidates[0].votes, 1);
    }

    #[backend_test]
    async fn unknown_routes_get_json_errors(client: Client) {
        let response = client.get("/no/such/route").dispatch().await;
        assert_eq!(Status::NotFound, response.status());
        let body = response.into_string().await.unwrap();
        assert!(body.contains("\"kind\":\"not_found\""));
    }
}
