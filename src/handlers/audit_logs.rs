use axum::{
    extract::{Query, State},
    Extension, Json,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::audit_log::{self, AuditAction};
use crate::error::AppResult;
use crate::middleware::auth::AuthContext;
use crate::permissions::{Action, Module};
use crate::utils::pagination::{fetch_page, Page, PageParams};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AuditLogFilter {
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub action: Option<AuditAction>,
}

/// Newest first.
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(filter): Query<AuditLogFilter>,
    Query(page): Query<PageParams>,
) -> AppResult<Json<Page<audit_log::Model>>> {
    ctx.require(Module::AuditLogs, Action::View)?;

    let mut query = audit_log::Entity::find().order_by_desc(audit_log::Column::CreatedAt);
    if let Some(entity_type) = filter.entity_type {
        query = query.filter(audit_log::Column::EntityType.eq(entity_type));
    }
    if let Some(entity_id) = filter.entity_id {
        query = query.filter(audit_log::Column::EntityId.eq(entity_id));
    }
    if let Some(actor_id) = filter.actor_id {
        query = query.filter(audit_log::Column::ActorId.eq(actor_id));
    }
    if let Some(action) = filter.action {
        query = query.filter(audit_log::Column::Action.eq(action));
    }

    Ok(Json(fetch_page(query, state.db.as_ref(), page).await?))
}
