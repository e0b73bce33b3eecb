//! Data types: stored records, API request/response bodies, auth tokens and
//! MongoDB helpers.

pub mod api;
pub mod auth;
pub mod candidate;
pub mod mongodb;
pub mod voter;
