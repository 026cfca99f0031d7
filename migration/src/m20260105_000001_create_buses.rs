use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Bus::Table)
                    .if_not_exists()
                    .col(uuid(Bus::Id).primary_key())
                    .col(string_len(Bus::Code, 20).not_null().unique_key())
                    .col(string_len(Bus::Plate, 20).not_null().unique_key())
                    .col(decimal_len(Bus::MonthlyTarget, 14, 2).not_null().default(0))
                    .col(boolean(Bus::IsActive).not_null().default(true))
                    .col(
                        timestamp_with_time_zone(Bus::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Bus::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Bus {
    Table,
    Id,
    Code,
    Plate,
    MonthlyTarget,
    IsActive,
    CreatedAt,
}
