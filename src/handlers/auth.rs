use axum::{extract::State, Extension, Json};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::{self, AuditEntry};
use crate::entities::audit_log::AuditAction;
use crate::entities::user::{self, UserRole};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthContext;
use crate::permissions::{grants_for, Grant};
use crate::utils::jwt::create_token;
use crate::utils::password::verify_password;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub national_id: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: SessionInfo,
}

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub full_name: String,
    pub role: UserRole,
    pub assigned_bus_id: Option<Uuid>,
    pub permissions: Vec<Grant>,
}

impl SessionInfo {
    fn new(id: Uuid, full_name: String, role: UserRole, assigned_bus_id: Option<Uuid>) -> Self {
        Self {
            id,
            full_name,
            role,
            assigned_bus_id,
            permissions: grants_for(role),
        }
    }
}

/// Login with national id and password
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let invalid = || AppError::Unauthorized("Invalid national id or password".to_string());

    let user = user::Entity::find()
        .filter(user::Column::NationalId.eq(payload.national_id.trim()))
        .one(state.db.as_ref())
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&payload.password, &user.password_hash)? {
        return Err(invalid());
    }

    if !user.is_active {
        return Err(AppError::Unauthorized("Account is inactive".to_string()));
    }

    let token = create_token(&user, &state.config.jwt_secret, state.config.jwt_expiration_hours)?;

    audit::record_as(
        state.db.as_ref(),
        Some(user.id),
        AuditEntry::new(AuditAction::Login, "user", user.id, "User logged in"),
    )
    .await;
    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(AuthResponse {
        token,
        user: SessionInfo::new(user.id, user.full_name, user.role, user.assigned_bus_id),
    }))
}

/// Current session, including the caller's permission grants
pub async fn me(Extension(ctx): Extension<AuthContext>) -> Json<SessionInfo> {
    Json(SessionInfo::new(ctx.user_id, ctx.full_name, ctx.role, ctx.assigned_bus_id))
}
