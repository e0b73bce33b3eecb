#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, DatabaseFairing};
use crate::engine::ElectionEngine;
use crate::logging::LoggerFairing;

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod model;
pub mod store;

pub use config::Config;

/// Build a rocket backed by the MongoDB named in the config.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(LoggerFairing)
}

/// Build a rocket around an existing engine and config, skipping the fairings.
pub fn rocket_for_engine(engine: ElectionEngine, config: Config) -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(LoggerFairing)
        .manage(config)
        .manage(engine)
}
