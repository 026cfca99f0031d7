use sea_orm_migration::{prelude::*, schema::*};

use super::m20260105_000001_create_buses::Bus;
use super::m20260105_000002_create_users::User;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Route::Table)
                    .if_not_exists()
                    .col(uuid(Route::Id).primary_key())
                    .col(uuid(Route::BusId).not_null())
                    .col(uuid(Route::WorkerId).not_null())
                    .col(date(Route::RouteDate).not_null())
                    .col(time_null(Route::StartTime))
                    .col(time_null(Route::EndTime))
                    .col(decimal_len(Route::TotalIncome, 14, 2).not_null().default(0))
                    .col(decimal_len(Route::TotalExpenses, 14, 2).not_null().default(0))
                    .col(decimal_len(Route::NetIncome, 14, 2).not_null().default(0))
                    .col(boolean(Route::IsLocked).not_null().default(false))
                    .col(
                        timestamp_with_time_zone(Route::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_route_bus")
                            .from(Route::Table, Route::BusId)
                            .to(Bus::Table, Bus::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_route_worker")
                            .from(Route::Table, Route::WorkerId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_route_bus_date")
                    .table(Route::Table)
                    .col(Route::BusId)
                    .col(Route::RouteDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RouteExpense::Table)
                    .if_not_exists()
                    .col(uuid(RouteExpense::Id).primary_key())
                    .col(uuid(RouteExpense::RouteId).not_null())
                    .col(string_len(RouteExpense::Name, 100).not_null())
                    .col(decimal_len(RouteExpense::Amount, 14, 2).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_route_expense_route")
                            .from(RouteExpense::Table, RouteExpense::RouteId)
                            .to(Route::Table, Route::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RouteExpense::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Route::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Route {
    Table,
    Id,
    BusId,
    WorkerId,
    RouteDate,
    StartTime,
    EndTime,
    TotalIncome,
    TotalExpenses,
    NetIncome,
    IsLocked,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum RouteExpense {
    Table,
    Id,
    RouteId,
    Name,
    Amount,
}
