use std::net::SocketAddr;
use std::sync::Arc;

use axum::middleware;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use sea_orm_migration::MigratorTrait;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use fleet_ledger::{
    config::Config,
    db,
    entities::user::{self, UserRole},
    middleware::rate_limit::{create_global_governor, log_request},
    routes,
    utils::password::hash_password,
    AppState,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleet_ledger=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!("Starting server at {}", config.server_addr());

    let db = db::connect(&config)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Connected to database");

    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    tracing::info!("Migrations complete");

    seed_admin(&db, &config).await;

    let state = AppState {
        db: Arc::new(db),
        config: config.clone(),
    };

    let app = routes::create_router(state)
        .layer(create_global_governor())
        .layer(middleware::from_fn(log_request))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    // Peer address is needed by the per-IP governors and request logging
    let addr: SocketAddr = config.server_addr().parse().expect("Invalid address");
    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}

/// Create the bootstrap admin unless an admin account already exists.
async fn seed_admin(db: &sea_orm::DatabaseConnection, config: &Config) {
    let existing = user::Entity::find()
        .filter(user::Column::Role.eq(UserRole::Admin))
        .one(db)
        .await
        .expect("Failed to check for admin");

    if existing.is_some() {
        return;
    }

    let password_hash =
        hash_password(&config.admin_password).expect("Failed to hash admin password");

    let admin = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        full_name: Set("Administrator".to_string()),
        national_id: Set(config.admin_national_id.clone()),
        email: Set(config.admin_email.clone()),
        password_hash: Set(password_hash),
        role: Set(UserRole::Admin),
        assigned_bus_id: Set(None),
        is_active: Set(true),
        ..Default::default()
    };

    admin.insert(db).await.expect("Failed to create admin");
    tracing::info!("Admin account created: {}", config.admin_national_id);
}
