use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "budget")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub bus_id: Option<Uuid>,
    pub name: String,
    pub start_date: Date,
    /// `None` means the budget is open-ended.
    pub end_date: Option<Date>,
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub planned_income: Decimal,
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub planned_expenses: Decimal,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::budget_item::Entity")]
    Items,
}

impl Related<super::budget_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
