//! User management. Mounted behind `require_admin`.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Deserialize;
use uuid::Uuid;

use crate::audit::{self, AuditEntry};
use crate::entities::audit_log::AuditAction;
use crate::entities::bus;
use crate::entities::user::{self, UserRole};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthContext;
use crate::permissions::{Action, Module};
use crate::utils::pagination::{fetch_page, Page, PageParams};
use crate::utils::password::hash_password;
use crate::AppState;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
pub struct UserFilter {
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    pub assigned_bus_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub full_name: String,
    pub national_id: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,
    pub assigned_bus_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<UserRole>,
    pub assigned_bus_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

fn validate_password(password: &str) -> AppResult<()> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Workers only ever see one bus, so they cannot exist without one.
fn validate_assignment(role: UserRole, assigned_bus_id: Option<Uuid>) -> AppResult<()> {
    if role == UserRole::Worker && assigned_bus_id.is_none() {
        return Err(AppError::BadRequest("A worker must be assigned to a bus".to_string()));
    }
    Ok(())
}

fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(AppError::BadRequest("Invalid email".to_string()));
    }
    Ok(email)
}

async fn find_user(state: &AppState, id: Uuid) -> AppResult<user::Model> {
    user::Entity::find_by_id(id)
        .one(state.db.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

async fn ensure_bus(state: &AppState, bus_id: Uuid) -> AppResult<()> {
    bus::Entity::find_by_id(bus_id)
        .one(state.db.as_ref())
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid bus".to_string()))?;
    Ok(())
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(filter): Query<UserFilter>,
    Query(page): Query<PageParams>,
) -> AppResult<Json<Page<user::Model>>> {
    ctx.require(Module::Users, Action::View)?;

    let mut query = user::Entity::find().order_by_asc(user::Column::FullName);
    if let Some(role) = filter.role {
        query = query.filter(user::Column::Role.eq(role));
    }
    if let Some(active) = filter.is_active {
        query = query.filter(user::Column::IsActive.eq(active));
    }
    if let Some(bus_id) = filter.assigned_bus_id {
        query = query.filter(user::Column::AssignedBusId.eq(bus_id));
    }

    Ok(Json(fetch_page(query, state.db.as_ref(), page).await?))
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<CreateUserRequest>,
) -> AppResult<Json<user::Model>> {
    ctx.require(Module::Users, Action::Create)?;

    let full_name = payload.full_name.trim().to_string();
    let national_id = payload.national_id.trim().to_string();
    if full_name.is_empty() || national_id.is_empty() {
        return Err(AppError::BadRequest("Name and national id are required".to_string()));
    }
    let email = normalize_email(&payload.email)?;
    validate_password(&payload.password)?;
    validate_assignment(payload.role, payload.assigned_bus_id)?;
    if let Some(bus_id) = payload.assigned_bus_id {
        ensure_bus(&state, bus_id).await?;
    }

    let taken = user::Entity::find()
        .filter(
            Condition::any()
                .add(user::Column::NationalId.eq(national_id.as_str()))
                .add(user::Column::Email.eq(email.as_str())),
        )
        .one(state.db.as_ref())
        .await?;
    if taken.is_some() {
        return Err(AppError::Conflict("National id or email already registered".to_string()));
    }

    let password_hash = hash_password(&payload.password)?;

    let user = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        full_name: Set(full_name),
        national_id: Set(national_id),
        email: Set(email),
        password_hash: Set(password_hash),
        role: Set(payload.role),
        assigned_bus_id: Set(payload.assigned_bus_id),
        is_active: Set(true),
        ..Default::default()
    }
    .insert(state.db.as_ref())
    .await?;

    tracing::info!(user_id = %user.id, role = ?user.role, "User created");

    audit::record(
        state.db.as_ref(),
        &ctx,
        AuditEntry::new(AuditAction::Create, "user", user.id, format!("Created user {}", user.full_name)),
    )
    .await;

    Ok(Json(user))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<Json<user::Model>> {
    ctx.require(Module::Users, Action::Edit)?;

    let existing = find_user(&state, id).await?;

    let role = payload.role.unwrap_or(existing.role);
    let assigned_bus_id = payload.assigned_bus_id.or(existing.assigned_bus_id);
    validate_assignment(role, assigned_bus_id)?;
    if let Some(bus_id) = payload.assigned_bus_id {
        ensure_bus(&state, bus_id).await?;
    }
    if id == ctx.user_id && (role != UserRole::Admin || payload.is_active == Some(false)) {
        return Err(AppError::BadRequest(
            "You cannot demote or deactivate your own account".to_string(),
        ));
    }

    let mut active: user::ActiveModel = existing.into();
    active.role = Set(role);
    active.assigned_bus_id = Set(assigned_bus_id);

    if let Some(name) = payload.full_name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::BadRequest("Name is required".to_string()));
        }
        active.full_name = Set(name);
    }
    if let Some(email) = payload.email {
        let email = normalize_email(&email)?;
        let taken = user::Entity::find()
            .filter(user::Column::Email.eq(email.as_str()))
            .filter(user::Column::Id.ne(id))
            .one(state.db.as_ref())
            .await?;
        if taken.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }
        active.email = Set(email);
    }
    if let Some(password) = payload.password {
        validate_password(&password)?;
        active.password_hash = Set(hash_password(&password)?);
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }

    let user = active.update(state.db.as_ref()).await?;

    audit::record(
        state.db.as_ref(),
        &ctx,
        AuditEntry::new(AuditAction::Update, "user", user.id, format!("Updated user {}", user.full_name)),
    )
    .await;

    Ok(Json(user))
}

pub async fn deactivate_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<user::Model>> {
    ctx.require(Module::Users, Action::Delete)?;

    if id == ctx.user_id {
        return Err(AppError::BadRequest("You cannot deactivate your own account".to_string()));
    }

    let mut active: user::ActiveModel = find_user(&state, id).await?.into();
    active.is_active = Set(false);
    let user = active.update(state.db.as_ref()).await?;

    tracing::info!(user_id = %user.id, "User deactivated");

    audit::record(
        state.db.as_ref(),
        &ctx,
        AuditEntry::new(
            AuditAction::Deactivate,
            "user",
            user.id,
            format!("Deactivated user {}", user.full_name),
        ),
    )
    .await;

    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_needs_a_bus() {
        assert!(validate_assignment(UserRole::Admin, None).is_ok());
        assert!(validate_assignment(UserRole::Worker, Some(Uuid::new_v4())).is_ok());
        assert!(matches!(
            validate_assignment(UserRole::Worker, None),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_email_is_normalized() {
        assert_eq!(normalize_email("  Ana@Fleet.COM ").unwrap(), "ana@fleet.com");
        assert!(normalize_email("not-an-email").is_err());
    }

    #[test]
    fn test_short_password_rejected() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("long enough").is_ok());
    }
}
