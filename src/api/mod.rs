use rocket::{catch, catchers, http::Status, serde::json::Json, Catcher, Request, Route};
use serde::Serialize;

mod admin;
mod candidates;
mod public;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(candidates::routes());
    routes.extend(public::routes());
    routes.extend(voting::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![default_catcher]
}

/// Same shape as the body of an [`crate::error::Error`] response.
#[derive(Serialize)]
struct CaughtError {
    kind: &'static str,
    message: String,
}

/// Errors Rocket raises itself (failed guards, unmatched routes, bad bodies)
/// get the same JSON body as engine errors.
#[catch(default)]
fn default_catcher(status: Status, req: &Request<'_>) -> Json<CaughtError> {
    let kind = match status.code {
        401 | 403 => "unauthorized",
        404 => "not_found",
        400 | 415 | 422 => "validation_error",
        _ => "storage_failure",
    };
    debug!("Caught {status} for {} {}", req.method(), req.uri());
    Json(CaughtError {
        kind,
        message: status.reason_lossy().to_string(),
    })
}
