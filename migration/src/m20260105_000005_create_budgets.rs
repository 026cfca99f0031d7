use sea_orm_migration::{prelude::*, schema::*};

use super::m20260105_000001_create_buses::Bus;
use super::m20260105_000004_create_expenses::ExpenseCategory;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Budget::Table)
                    .if_not_exists()
                    .col(uuid(Budget::Id).primary_key())
                    .col(uuid_null(Budget::BusId))
                    .col(string_len(Budget::Name, 150).not_null())
                    .col(date(Budget::StartDate).not_null())
                    .col(date_null(Budget::EndDate))
                    .col(decimal_len(Budget::PlannedIncome, 14, 2).not_null().default(0))
                    .col(decimal_len(Budget::PlannedExpenses, 14, 2).not_null().default(0))
                    .col(boolean(Budget::IsActive).not_null().default(true))
                    .col(
                        timestamp_with_time_zone(Budget::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_budget_bus")
                            .from(Budget::Table, Budget::BusId)
                            .to(Bus::Table, Bus::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BudgetItem::Table)
                    .if_not_exists()
                    .col(uuid(BudgetItem::Id).primary_key())
                    .col(uuid(BudgetItem::BudgetId).not_null())
                    .col(uuid(BudgetItem::CategoryId).not_null())
                    .col(decimal_len(BudgetItem::PlannedAmount, 14, 2).not_null().default(0))
                    .col(decimal_len(BudgetItem::CommittedAmount, 14, 2).not_null().default(0))
                    .col(decimal_len(BudgetItem::ExecutedAmount, 14, 2).not_null().default(0))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_budget_item_budget")
                            .from(BudgetItem::Table, BudgetItem::BudgetId)
                            .to(Budget::Table, Budget::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_budget_item_category")
                            .from(BudgetItem::Table, BudgetItem::CategoryId)
                            .to(ExpenseCategory::Table, ExpenseCategory::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // One line per category within a budget
        manager
            .create_index(
                Index::create()
                    .name("uq_budget_item_budget_category")
                    .table(BudgetItem::Table)
                    .col(BudgetItem::BudgetId)
                    .col(BudgetItem::CategoryId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BudgetItem::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Budget::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Budget {
    Table,
    Id,
    BusId,
    Name,
    StartDate,
    EndDate,
    PlannedIncome,
    PlannedExpenses,
    IsActive,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum BudgetItem {
    Table,
    Id,
    BudgetId,
    CategoryId,
    PlannedAmount,
    CommittedAmount,
    ExecutedAmount,
}
