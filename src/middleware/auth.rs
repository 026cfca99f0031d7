use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use sea_orm::EntityTrait;
use uuid::Uuid;

use crate::entities::user::{self, UserRole};
use crate::error::{AppError, AppResult};
use crate::permissions::{self, Action, Module};
use crate::utils::jwt::verify_token;
use crate::AppState;

/// Per-request view of the caller, passed to handlers as an extension.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub full_name: String,
    pub role: UserRole,
    pub assigned_bus_id: Option<Uuid>,
}

impl AuthContext {
    pub fn from_user(user: &user::Model) -> Self {
        Self {
            user_id: user.id,
            full_name: user.full_name.clone(),
            role: user.role,
            assigned_bus_id: user.assigned_bus_id,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn require(&self, module: Module, action: Action) -> AppResult<()> {
        if permissions::can(self.role, module, action) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "{:?} cannot {:?} {:?}",
                self.role, action, module
            )))
        }
    }

    /// Bus filter to force onto queries: `None` for admins, the assigned bus
    /// for workers.
    pub fn bus_scope(&self) -> AppResult<Option<Uuid>> {
        match self.role {
            UserRole::Admin => Ok(None),
            UserRole::Worker => self
                .assigned_bus_id
                .map(Some)
                .ok_or_else(|| AppError::Forbidden("No bus assigned to this worker".to_string())),
        }
    }

    pub fn ensure_bus_access(&self, bus_id: Uuid) -> AppResult<()> {
        match self.bus_scope()? {
            Some(assigned) if assigned != bus_id => Err(AppError::Forbidden(
                "You do not have access to this bus".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Validate the bearer token and load the caller.
///
/// The user row is re-read on every request so deactivation and bus
/// reassignment take effect without waiting for token expiry.
pub async fn auth_middleware(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    mut request: Request,
    next: Next,
) -> AppResult<Response> {
    let claims = verify_token(auth.token(), &state.config.jwt_secret)?;

    let user = user::Entity::find_by_id(claims.sub)
        .one(state.db.as_ref())
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::Unauthorized("Account is inactive or missing".to_string()))?;

    request.extensions_mut().insert(AuthContext::from_user(&user));
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Require admin role
pub async fn require_admin(
    request: Request,
    next: Next,
) -> AppResult<Response> {
    let ctx = request
        .extensions()
        .get::<AuthContext>()
        .ok_or_else(|| AppError::Unauthorized("No authentication found".to_string()))?;

    if !ctx.is_admin() {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }

    Ok(next.run(request).await)
}
