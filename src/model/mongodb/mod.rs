mod bson;
mod collection;

pub use bson::{optional_bson_datetime, Id};
pub use collection::{ensure_indexes_exist, is_duplicate_key_error, Coll, MongoCollection};
