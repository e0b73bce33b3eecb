use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{
    errors::Error as JwtError, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use rocket::{
    http::Status,
    outcome::try_outcome,
    request::{self, FromRequest},
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::engine::ElectionEngine;
use crate::error::Error;
use crate::model::{mongodb::Id, voter::Voter};
use crate::Config;

use super::rights::{Rights, Role};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// An authentication token representing a specific account with specific rights.
///
/// Tokens are minted by whatever issues identities; this service only checks them.
#[derive(Serialize, Deserialize)]
pub struct AuthToken<R> {
    id: Id,
    #[serde(rename = "rgt")]
    rights: Rights,
    #[serde(skip)]
    phantom: PhantomData<R>,
}

impl<R> AuthToken<R> {
    /// Get the account ID.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Get the account's rights.
    pub fn rights(&self) -> Rights {
        self.rights
    }

    /// Create a token for the given account, with the rights its role flags grant.
    pub fn new(account: &Voter) -> Self {
        Self {
            id: account.id,
            rights: Rights::of(account),
            phantom: PhantomData,
        }
    }

    /// Sign this token.
    pub fn encode(self, config: &Config) -> Result<String, JwtError> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
    }

    /// Verify and decode a signed token.
    pub fn decode(token: &str, config: &Config) -> Result<Self, JwtError> {
        jsonwebtoken::decode(
            token,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims<R>>| claims.claims.token)
    }
}

/// Token claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<R> {
    #[serde(flatten, bound = "")]
    token: AuthToken<R>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

/// The raw token, from the auth cookie or else an `Authorization: Bearer` header.
fn raw_token<'r>(req: &'r Request<'_>) -> Option<String> {
    if let Some(cookie) = req.cookies().get(AUTH_TOKEN_COOKIE) {
        return Some(cookie.value().to_string());
    }
    req.headers()
        .get_one("Authorization")
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

#[rocket::async_trait]
impl<'r, R> FromRequest<'r> for AuthToken<R>
where
    R: Role,
{
    type Error = Error;

    /// Verify the token, then check that the account still exists and still
    /// holds the rights this route needs.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let config = try_outcome!(req.guard::<&State<Config>>().await.map_failure(|_| {
            (
                Status::InternalServerError,
                Error::Storage("Config is not managed".to_string()),
            )
        }));
        let engine = try_outcome!(req.guard::<&State<ElectionEngine>>().await.map_failure(
            |_| {
                (
                    Status::InternalServerError,
                    Error::Storage("Election engine is not managed".to_string()),
                )
            }
        ));

        let Some(raw) = raw_token(req) else {
            return request::Outcome::Failure((
                Status::Unauthorized,
                Error::Unauthorized("No auth token".to_string()),
            ));
        };
        let token = match Self::decode(&raw, config) {
            Ok(token) => token,
            Err(err) => {
                debug!("Rejected auth token: {err}");
                return request::Outcome::Failure((
                    Status::Unauthorized,
                    Error::Unauthorized(err.to_string()),
                ));
            }
        };
        if !token.rights.permits(R::RIGHTS) {
            return request::Outcome::Failure((
                Status::Forbidden,
                Error::Unauthorized(format!("{} rights required", R::RIGHTS)),
            ));
        }

        match engine.store().voter(token.id).await {
            Ok(Some(account)) if Rights::of(&account).permits(R::RIGHTS) => {
                request::Outcome::Success(token)
            }
            Ok(_) => request::Outcome::Failure((
                Status::Forbidden,
                Error::Unauthorized(format!(
                    "Account {} no longer holds {} rights",
                    token.id,
                    R::RIGHTS
                )),
            )),
            Err(err) => {
                error!("Failed to look up account {}: {err}", token.id);
                request::Outcome::Failure((Status::InternalServerError, err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        auth::{Admin, VoterAccount},
        voter::VoterCore,
    };

    fn account(core: VoterCore) -> Voter {
        Voter {
            id: Id::new(),
            voter: core,
        }
    }

    #[test]
    fn token_round_trips_and_keeps_rights() {
        let config = Config::example();
        let admin = account(VoterCore::admin("root"));
        let encoded = AuthToken::<Admin>::new(&admin).encode(&config).unwrap();

        let decoded = AuthToken::<Admin>::decode(&encoded, &config).unwrap();
        assert_eq!(decoded.id(), admin.id);
        assert_eq!(decoded.rights(), Rights::Admin);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let config = Config::example();
        let voter = account(VoterCore::new("sam"));
        let encoded = AuthToken::<VoterAccount>::new(&voter)
            .encode(&config)
            .unwrap();

        let mut other = Config::example();
        other.set_jwt_secret("not the same secret");
        assert!(AuthToken::<VoterAccount>::decode(&encoded, &other).is_err());
        assert!(AuthToken::<VoterAccount>::decode("garbage", &config).is_err());
    }
}
