pub mod audit;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod finance;
pub mod handlers;
pub mod middleware;
pub mod permissions;
pub mod route_rules;
pub mod routes;
pub mod utils;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

pub use config::Config;
pub use error::{AppError, AppResult};

/// Shared by every handler. The pool sits behind an `Arc` so the state stays
/// cheap to clone whichever sea-orm backend features are enabled.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Config,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    pub(crate) fn config() -> Config {
        Config {
            database_url: "postgres://localhost/fleet_ledger_test".to_string(),
            database_max_connections: 1,
            jwt_secret: "secret".to_string(),
            jwt_expiration_hours: 1,
            server_host: "127.0.0.1".to_string(),
            server_port: 3000,
            admin_national_id: "0000000000".to_string(),
            admin_email: "admin@fleet.test".to_string(),
            admin_password: "change-me-now".to_string(),
        }
    }

    #[test]
    fn test_state_clones_share_one_pool() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let state = AppState {
            db: Arc::new(db),
            config: config(),
        };

        let cloned = state.clone();
        assert!(Arc::ptr_eq(&state.db, &cloned.db));
        assert_eq!(cloned.config.server_addr(), "127.0.0.1:3000");
    }
}
