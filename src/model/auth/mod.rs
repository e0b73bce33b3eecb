mod rights;
mod token;

pub use rights::{Admin, CandidateAccount, Rights, Role, VoterAccount};
pub use token::{AuthToken, AUTH_TOKEN_COOKIE};
