use sea_orm_migration::{prelude::*, schema::*};

use super::m20260105_000001_create_buses::Bus;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ExpenseCategory::Table)
                    .if_not_exists()
                    .col(uuid(ExpenseCategory::Id).primary_key())
                    .col(string_len(ExpenseCategory::Name, 100).not_null().unique_key())
                    .col(text_null(ExpenseCategory::Description))
                    .col(boolean(ExpenseCategory::IsActive).not_null().default(true))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Invoice::Table)
                    .if_not_exists()
                    .col(uuid(Invoice::Id).primary_key())
                    .col(string_len(Invoice::Number, 50).not_null())
                    .col(string_len(Invoice::Provider, 150).not_null())
                    .col(date(Invoice::IssueDate).not_null())
                    .col(decimal_len(Invoice::TotalAmount, 14, 2).not_null())
                    .col(string_len(Invoice::FileKey, 255).not_null())
                    .col(
                        timestamp_with_time_zone(Invoice::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Expense::Table)
                    .if_not_exists()
                    .col(uuid(Expense::Id).primary_key())
                    .col(uuid(Expense::BusId).not_null())
                    .col(uuid(Expense::CategoryId).not_null())
                    .col(decimal_len(Expense::Amount, 14, 2).not_null())
                    .col(date(Expense::ExpenseDate).not_null())
                    .col(text_null(Expense::Description))
                    .col(uuid_null(Expense::InvoiceId))
                    .col(
                        timestamp_with_time_zone(Expense::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_expense_bus")
                            .from(Expense::Table, Expense::BusId)
                            .to(Bus::Table, Bus::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_expense_category")
                            .from(Expense::Table, Expense::CategoryId)
                            .to(ExpenseCategory::Table, ExpenseCategory::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_expense_invoice")
                            .from(Expense::Table, Expense::InvoiceId)
                            .to(Invoice::Table, Invoice::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_expense_bus_date")
                    .table(Expense::Table)
                    .col(Expense::BusId)
                    .col(Expense::ExpenseDate)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Expense::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Invoice::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(ExpenseCategory::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ExpenseCategory {
    Table,
    Id,
    Name,
    Description,
    IsActive,
}

#[derive(DeriveIden)]
pub enum Invoice {
    Table,
    Id,
    Number,
    Provider,
    IssueDate,
    TotalAmount,
    FileKey,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum Expense {
    Table,
    Id,
    BusId,
    CategoryId,
    Amount,
    ExpenseDate,
    Description,
    InvoiceId,
    CreatedAt,
}
