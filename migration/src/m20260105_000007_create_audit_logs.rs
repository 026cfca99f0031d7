use sea_orm_migration::{prelude::*, schema::*};

use super::m20260105_000002_create_users::User;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AuditLog::Table)
                    .if_not_exists()
                    .col(uuid(AuditLog::Id).primary_key())
                    .col(string_len(AuditLog::Action, 20).not_null())
                    .col(uuid_null(AuditLog::ActorId))
                    .col(string_len(AuditLog::EntityType, 50).not_null())
                    .col(uuid_null(AuditLog::EntityId))
                    .col(text(AuditLog::Description).not_null())
                    .col(json_binary_null(AuditLog::Metadata))
                    .col(
                        timestamp_with_time_zone(AuditLog::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_audit_log_actor")
                            .from(AuditLog::Table, AuditLog::ActorId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_audit_log_entity")
                    .table(AuditLog::Table)
                    .col(AuditLog::EntityType)
                    .col(AuditLog::EntityId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AuditLog::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum AuditLog {
    Table,
    Id,
    Action,
    ActorId,
    EntityType,
    EntityId,
    Description,
    Metadata,
    CreatedAt,
}
