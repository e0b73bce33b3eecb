use chrono::Utc;
use rocket::{get, post, put, routes, serde::json::Json, Route, State};

use crate::{
    engine::ElectionEngine,
    error::{Error, Result},
    model::{
        api::candidate::{CandidateDescription, Profile},
        auth::{Admin, AuthToken, CandidateAccount},
        candidate::CandidateStatus,
        mongodb::Id,
    },
};

pub fn routes() -> Vec<Route> {
    routes![register, submit, view, list_approved]
}

#[post("/candidates", data = "<profile>", format = "json")]
async fn register(
    token: AuthToken<CandidateAccount>,
    profile: Json<Profile>,
    engine: &State<ElectionEngine>,
) -> Result<Json<CandidateDescription>> {
    let candidate = engine
        .lifecycle()
        .register(token.id(), profile.0, Utc::now())
        .await?;
    Ok(Json(candidate.into()))
}

#[put("/candidates/<candidate_id>", data = "<profile>", format = "json")]
async fn submit(
    token: AuthToken<CandidateAccount>,
    candidate_id: Id,
    profile: Json<Profile>,
    engine: &State<ElectionEngine>,
) -> Result<Json<CandidateDescription>> {
    let lifecycle = engine.lifecycle();
    let candidate = lifecycle.find(candidate_id).await?;
    if candidate.owner != token.id() {
        return Err(Error::Unauthorized(format!(
            "Candidate {candidate_id} belongs to another account"
        )));
    }
    let candidate = lifecycle.submit(candidate_id, profile.0, Utc::now()).await?;
    Ok(Json(candidate.into()))
}

/// Approved candidates are public; the rest are only visible to their owner and admins.
#[get("/candidates/<candidate_id>")]
async fn view(
    admin: Option<AuthToken<Admin>>,
    owner: Option<AuthToken<CandidateAccount>>,
    candidate_id: Id,
    engine: &State<ElectionEngine>,
) -> Result<Json<CandidateDescription>> {
    let candidate = engine.lifecycle().find(candidate_id).await?;
    let visible = candidate.status == CandidateStatus::Approved
        || admin.is_some()
        || owner.map_or(false, |token| token.id() == candidate.owner);
    if !visible {
        return Err(Error::not_found(format!("Candidate {candidate_id}")));
    }
    Ok(Json(candidate.into()))
}

#[get("/candidates")]
async fn list_approved(engine: &State<ElectionEngine>) -> Result<Json<Vec<CandidateDescription>>> {
    let candidates = engine.lifecycle().approved().await?;
    Ok(Json(candidates.into_iter().map(Into::into).collect()))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json::json,
        uri,
    };

    use super::*;
    use crate::model::voter::{Voter, VoterCore};
    use crate::test_support::bearer;

    async fn account(engine: &ElectionEngine, core: VoterCore) -> Voter {
        engine.store().insert_voter(core).await.unwrap()
    }

    #[backend_test]
    async fn register_and_edit_own_candidacy(client: Client, engine: ElectionEngine) {
        let owner = account(&engine, VoterCore::candidate("ada")).await;

        let response = client
            .post(uri!(register))
            .header(ContentType::JSON)
            .header(bearer::<CandidateAccount>(&client, &owner))
            .body(json!(Profile::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let created: CandidateDescription = response.into_json().await.unwrap();
        assert_eq!(created.owner, owner.id.to_string());
        assert_eq!(created.status, CandidateStatus::Pending);
        assert_eq!(created.criteria.unwrap().eligibility.score, 100);

        let id: Id = created.id.parse().unwrap();
        let mut profile = Profile::example();
        profile.description = "Now with a plan".to_string();
        let response = client
            .put(uri!(submit(id)))
            .header(ContentType::JSON)
            .header(bearer::<CandidateAccount>(&client, &owner))
            .body(json!(profile).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let edited: CandidateDescription = response.into_json().await.unwrap();
        assert_eq!(edited.description, "Now with a plan");
    }

    #[backend_test]
    async fn plain_voters_cannot_register(client: Client, engine: ElectionEngine) {
        let voter = account(&engine, VoterCore::new("sam")).await;

        let response = client
            .post(uri!(register))
            .header(ContentType::JSON)
            .header(bearer::<CandidateAccount>(&client, &voter))
            .body(json!(Profile::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Forbidden, response.status());

        let response = client
            .post(uri!(register))
            .header(ContentType::JSON)
            .body(json!(Profile::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
        assert!(engine.lifecycle().all().await.unwrap().is_empty());
    }

    #[backend_test]
    async fn others_cannot_edit(client: Client, engine: ElectionEngine) {
        let owner = account(&engine, VoterCore::candidate("ada")).await;
        let rival = account(&engine, VoterCore::candidate("bea")).await;
        let candidate = engine
            .lifecycle()
            .register(owner.id, Profile::example(), Utc::now())
            .await
            .unwrap();

        let response = client
            .put(uri!(submit(candidate.id)))
            .header(ContentType::JSON)
            .header(bearer::<CandidateAccount>(&client, &rival))
            .body(json!(Profile::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Forbidden, response.status());
        let body = response.into_string().await.unwrap();
        assert!(body.contains("\"kind\":\"unauthorized\""));
    }

    #[backend_test]
    async fn invalid_profile_is_a_validation_error(client: Client, engine: ElectionEngine) {
        let owner = account(&engine, VoterCore::candidate("ada")).await;
        let mut profile = Profile::example();
        profile.name = " ".to_string();

        let response = client
            .post(uri!(register))
            .header(ContentType::JSON)
            .header(bearer::<CandidateAccount>(&client, &owner))
            .body(json!(profile).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        let body = response.into_string().await.unwrap();
        assert!(body.contains("validation_error"));
    }

    #[backend_test]
    async fn pending_candidates_are_hidden(client: Client, engine: ElectionEngine) {
        let owner = account(&engine, VoterCore::candidate("ada")).await;
        let admin = account(&engine, VoterCore::admin("root")).await;
        let candidate = engine
            .lifecycle()
            .register(owner.id, Profile::example(), Utc::now())
            .await
            .unwrap();

        let response = client.get(uri!(view(candidate.id))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
        let response = client
            .get(uri!(view(candidate.id)))
            .header(bearer::<CandidateAccount>(&client, &owner))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let response = client
            .get(uri!(view(candidate.id)))
            .header(bearer::<Admin>(&client, &admin))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let listed: Vec<CandidateDescription> = client
            .get(uri!(list_approved))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert!(listed.is_empty());

        engine.lifecycle().approve(candidate.id, Utc::now()).await.unwrap();
        let response = client.get(uri!(view(candidate.id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let listed: Vec<CandidateDescription> = client
            .get(uri!(list_approved))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
    }
}
