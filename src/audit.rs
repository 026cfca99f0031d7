//! Append-only audit trail for mutating API actions.

use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use uuid::Uuid;

use crate::entities::audit_log::{self, AuditAction};
use crate::middleware::auth::AuthContext;

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub entity_type: &'static str,
    pub entity_id: Option<Uuid>,
    pub description: String,
    pub metadata: Option<serde_json::Value>,
}

impl AuditEntry {
    pub fn new(
        action: AuditAction,
        entity_type: &'static str,
        entity_id: Uuid,
        description: impl Into<String>,
    ) -> Self {
        Self {
            action,
            entity_type,
            entity_id: Some(entity_id),
            description: description.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Record an action taken by the current caller.
pub async fn record(db: &DatabaseConnection, ctx: &AuthContext, entry: AuditEntry) {
    record_as(db, Some(ctx.user_id), entry).await;
}

/// Record an action for an explicit actor.
///
/// Runs after the mutation has been committed, so a failed write is logged
/// and swallowed instead of failing the request.
pub async fn record_as(db: &DatabaseConnection, actor_id: Option<Uuid>, entry: AuditEntry) {
    let row = audit_log::ActiveModel {
        id: Set(Uuid::new_v4()),
        action: Set(entry.action),
        actor_id: Set(actor_id),
        entity_type: Set(entry.entity_type.to_string()),
        entity_id: Set(entry.entity_id),
        description: Set(entry.description),
        metadata: Set(entry.metadata),
        ..Default::default()
    };

    if let Err(e) = row.insert(db).await {
        tracing::warn!(
            error = %e,
            action = ?entry.action,
            entity_type = entry.entity_type,
            "Failed to write audit log"
        );
    }
}
