use chrono::Duration;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::store::{MongoStore, Storage};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    #[serde(default = "enforce_voting_window_default")]
    enforce_voting_window: bool,
    // secrets
    jwt_secret: String,
}

fn enforce_voting_window_default() -> bool {
    true
}

impl Config {
    /// Valid lifetime of auth tokens in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Whether votes are only admitted while their election is active.
    pub fn enforce_voting_window(&self) -> bool {
        self.enforce_voting_window
    }

    /// Secret key used to sign and verify JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with [`StorageFairing`] and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if !config.enforce_voting_window {
            warn!("Voting windows are not enforced, votes are admitted at any time");
        }

        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Which storage backend to run on.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    MongoDb,
    Memory,
}

/// Configuration for the storage backend.
#[derive(Deserialize)]
struct StorageConfig {
    #[serde(default)]
    storage: StorageKind,
    // secrets
    db_uri: Option<String>,
    #[serde(default = "db_name_default")]
    db_name: String,
}

fn db_name_default() -> String {
    "evote".to_string()
}

/// A fairing that loads the storage config, connects to the backend,
/// performs any setup necessary, and places a [`Storage`] handle into
/// managed state.
pub struct StorageFairing;

#[rocket::async_trait]
impl Fairing for StorageFairing {
    fn info(&self) -> Info {
        Info {
            name: "Storage",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<StorageConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load storage config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let storage = match config.storage {
            StorageKind::Memory => {
                warn!("Using in-memory storage, nothing will survive a restart");
                Storage::memory()
            }
            StorageKind::MongoDb => {
                let Some(db_uri) = config.db_uri else {
                    error!("Failed to load storage config: `db_uri` is required for MongoDB");
                    return Err(rocket);
                };
                info!("Loaded database config, connecting...");
                match MongoStore::connect(&db_uri, &config.db_name).await {
                    Ok(store) => {
                        info!("...database connection online!");
                        Storage::new(store)
                    }
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                }
            }
        };

        Ok(rocket.manage(storage))
    }
}
