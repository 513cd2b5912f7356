#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{figment::Figment, Build, Rocket};

use crate::config::{ConfigFairing, StorageFairing};
use crate::logging::LoggerFairing;
use crate::store::Storage;

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod store;
pub mod voting;

/// Build the server from `Rocket.toml` and the environment, connecting to
/// whichever storage backend is configured.
pub fn build() -> Rocket<Build> {
    mount(rocket::build()).attach(StorageFairing)
}

/// Build the server over an existing storage backend.
pub fn rocket_for_storage(figment: Figment, storage: Storage) -> Rocket<Build> {
    mount(rocket::custom(figment)).manage(storage)
}

fn mount(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .attach(ConfigFairing)
        .attach(LoggerFairing)
        .mount("/", api::routes())
        .register("/", api::catchers())
}

/// Configuration for route tests, independent of `Rocket.toml`.
#[cfg(test)]
pub(crate) fn test_figment() -> Figment {
    Figment::from(rocket::Config::debug_default())
        .merge(("jwt_secret", "test-jwt-secret"))
        .merge(("auth_ttl", 3600))
        .merge(("enforce_voting_window", true))
        .merge(("log_level", "off"))
}

/// Environment variable naming the MongoDB server used by database-backed
/// tests. Votes commit in transactions, so it must be a replica set.
#[cfg(test)]
pub(crate) const TEST_DB_URI_VAR: &str = "ROCKET_DB_URI";

/// Storage over a fresh, uniquely named database on the test server, or
/// `None` if no test server is configured.
#[cfg(test)]
pub(crate) async fn mongo_test_storage() -> Option<(Storage, mongodb::Database)> {
    let Ok(db_uri) = std::env::var(TEST_DB_URI_VAR) else {
        eprintln!("{TEST_DB_URI_VAR} is not set, skipping MongoDB-backed test");
        return None;
    };
    let db_name = format!("evote_test_{}", model::mongodb::Id::new());
    let store = store::MongoStore::connect(&db_uri, &db_name).await.unwrap();
    let db = store.database();
    Some((Storage::new(store), db))
}
