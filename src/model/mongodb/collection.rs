use std::ops::Deref;

use mongodb::{
    bson::doc,
    error::{Error as DbError, ErrorKind, WriteFailure},
    options::IndexOptions,
    Collection, Database, IndexModel,
};

use crate::engine::ElectionWindow;
use crate::model::{
    candidate::{Candidate, NewCandidate},
    voter::{NewVoter, Voter},
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Candidate collections
const CANDIDATES: &str = "candidates";
impl MongoCollection for Candidate {
    const NAME: &'static str = CANDIDATES;
}
impl MongoCollection for NewCandidate {
    const NAME: &'static str = CANDIDATES;
}

// Voter collections
const VOTERS: &str = "voters";
impl MongoCollection for Voter {
    const NAME: &'static str = VOTERS;
}
impl MongoCollection for NewVoter {
    const NAME: &'static str = VOTERS;
}

// Settings collection; holds the singleton election window.
const SETTINGS: &str = "settings";
impl MongoCollection for ElectionWindow {
    const NAME: &'static str = SETTINGS;
}

/// The mongodb crate doesn't provide error code constants.
const DUPLICATE_KEY: i32 = 11000;

/// Return true if the given error is a duplicate key write error.
pub fn is_duplicate_key_error(err: &DbError) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref e)) if e.code == DUPLICATE_KEY
    )
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // One candidacy per account.
    let owner_index = IndexModel::builder()
        .keys(doc! {"owner": 1})
        .options(unique.clone())
        .build();
    Coll::<Candidate>::from_db(db)
        .create_index(owner_index, None)
        .await?;

    // Tallies are listed by status on every results view.
    let status_index = IndexModel::builder().keys(doc! {"status": 1}).build();
    Coll::<Candidate>::from_db(db)
        .create_index(status_index, None)
        .await?;

    // Voter collection.
    let voter_index = IndexModel::builder()
        .keys(doc! {"username": 1})
        .options(unique)
        .build();
    Coll::<Voter>::from_db(db)
        .create_index(voter_index, None)
        .await?;

    Ok(())
}
