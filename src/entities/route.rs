use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "route")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub bus_id: Uuid,
    /// Driver who ran the route.
    pub worker_id: Uuid,
    pub route_date: Date,
    pub start_time: Option<Time>,
    pub end_time: Option<Time>,
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub total_income: Decimal,
    /// Sum of the route's expense lines, kept in sync on every write.
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub total_expenses: Decimal,
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub net_income: Decimal,
    pub is_locked: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::bus::Entity",
        from = "Column::BusId",
        to = "super::bus::Column::Id"
    )]
    Bus,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::WorkerId",
        to = "super::user::Column::Id"
    )]
    Worker,
    #[sea_orm(has_many = "super::route_expense::Entity")]
    Expenses,
}

impl Related<super::bus::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bus.def()
    }
}

impl Related<super::route_expense::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
