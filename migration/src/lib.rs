pub use sea_orm_migration::prelude::*;

mod m20260105_000001_create_buses;
mod m20260105_000002_create_users;
mod m20260105_000003_create_routes;
mod m20260105_000004_create_expenses;
mod m20260105_000005_create_budgets;
mod m20260105_000006_create_profit_sharing;
mod m20260105_000007_create_audit_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260105_000001_create_buses::Migration),
            Box::new(m20260105_000002_create_users::Migration),
            Box::new(m20260105_000003_create_routes::Migration),
            Box::new(m20260105_000004_create_expenses::Migration),
            Box::new(m20260105_000005_create_budgets::Migration),
            Box::new(m20260105_000006_create_profit_sharing::Migration),
            Box::new(m20260105_000007_create_audit_logs::Migration),
        ]
    }
}
