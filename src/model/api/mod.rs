//! API-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in a client-friendly way: IDs are
//! hex strings and datetimes are RFC 3339.

pub mod ballot;
pub mod candidate;
pub mod election;
