use sea_orm_migration::{prelude::*, schema::*, sea_orm::sea_query::extension::postgres::Type};

use super::m20260105_000001_create_buses::Bus;
use super::m20260105_000002_create_users::User;

const ACTIVE_MEMBERSHIP_INDEX_SQL: &str = "CREATE UNIQUE INDEX IF NOT EXISTS uq_profit_sharing_member_active \
     ON profit_sharing_member (group_id, user_id) WHERE is_active";

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(ShareRole::Enum)
                    .values([ShareRole::Owner, ShareRole::Driver, ShareRole::Partner])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ProfitSharingGroup::Table)
                    .if_not_exists()
                    .col(uuid(ProfitSharingGroup::Id).primary_key())
                    .col(uuid(ProfitSharingGroup::BusId).not_null())
                    .col(string_len(ProfitSharingGroup::Name, 150).not_null())
                    .col(date(ProfitSharingGroup::StartDate).not_null())
                    .col(date_null(ProfitSharingGroup::EndDate))
                    .col(boolean(ProfitSharingGroup::IsActive).not_null().default(true))
                    .col(
                        timestamp_with_time_zone(ProfitSharingGroup::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_profit_sharing_group_bus")
                            .from(ProfitSharingGroup::Table, ProfitSharingGroup::BusId)
                            .to(Bus::Table, Bus::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ProfitSharingMember::Table)
                    .if_not_exists()
                    .col(uuid(ProfitSharingMember::Id).primary_key())
                    .col(uuid(ProfitSharingMember::GroupId).not_null())
                    .col(uuid(ProfitSharingMember::UserId).not_null())
                    .col(
                        ColumnDef::new(ProfitSharingMember::RoleInShare)
                            .custom(ShareRole::Enum)
                            .not_null(),
                    )
                    .col(decimal_len(ProfitSharingMember::Percentage, 5, 2).not_null())
                    .col(boolean(ProfitSharingMember::IsActive).not_null().default(true))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_profit_sharing_member_group")
                            .from(ProfitSharingMember::Table, ProfitSharingMember::GroupId)
                            .to(ProfitSharingGroup::Table, ProfitSharingGroup::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_profit_sharing_member_user")
                            .from(ProfitSharingMember::Table, ProfitSharingMember::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // A user holds at most one active share per group
        manager
            .get_connection()
            .execute_unprepared(ACTIVE_MEMBERSHIP_INDEX_SQL)
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProfitSharingMember::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(ProfitSharingGroup::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(ShareRole::Enum).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ProfitSharingGroup {
    Table,
    Id,
    BusId,
    Name,
    StartDate,
    EndDate,
    IsActive,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum ProfitSharingMember {
    Table,
    Id,
    GroupId,
    UserId,
    RoleInShare,
    Percentage,
    IsActive,
}

#[derive(DeriveIden)]
pub enum ShareRole {
    #[sea_orm(iden = "share_role")]
    Enum,
    #[sea_orm(iden = "owner")]
    Owner,
    #[sea_orm(iden = "driver")]
    Driver,
    #[sea_orm(iden = "partner")]
    Partner,
}
