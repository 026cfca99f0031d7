use std::collections::HashMap;

use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::Serialize;
use uuid::Uuid;

use crate::entities::{budget, budget_item, expense_category};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    OnTrack,
    NearLimit,
    OverExecuted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemExecution {
    pub item_id: Uuid,
    pub category_id: Uuid,
    pub category_name: String,
    pub planned_amount: Decimal,
    pub committed_amount: Decimal,
    pub executed_amount: Decimal,
    pub execution_percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetExecutionSummary {
    pub budget_id: Uuid,
    pub budget_name: String,
    pub items: Vec<ItemExecution>,
    pub total_planned: Decimal,
    pub total_committed: Decimal,
    pub total_executed: Decimal,
    pub overall_execution_percentage: Decimal,
    pub status: ExecutionStatus,
}

/// Executed as a percentage of planned. Zero when nothing is planned, so an
/// unplanned spend never divides by zero.
pub fn execution_percentage(planned: Decimal, executed: Decimal) -> Decimal {
    if planned > Decimal::ZERO {
        executed / planned * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    }
}

pub fn classify(total_planned: Decimal, total_executed: Decimal) -> ExecutionStatus {
    let near_limit = total_planned * Decimal::new(9, 1);

    if total_executed > total_planned {
        ExecutionStatus::OverExecuted
    } else if total_executed > near_limit {
        ExecutionStatus::NearLimit
    } else {
        ExecutionStatus::OnTrack
    }
}

/// Per-item percentages plus totals. `category_names` is only used for labels.
pub fn summarize_items(
    items: &[budget_item::Model],
    category_names: &HashMap<Uuid, String>,
) -> (Vec<ItemExecution>, Decimal, Decimal, Decimal) {
    let rows = items
        .iter()
        .map(|item| ItemExecution {
            item_id: item.id,
            category_id: item.category_id,
            category_name: category_names.get(&item.category_id).cloned().unwrap_or_default(),
            planned_amount: item.planned_amount,
            committed_amount: item.committed_amount,
            executed_amount: item.executed_amount,
            execution_percentage: execution_percentage(item.planned_amount, item.executed_amount),
        })
        .collect();

    let total_planned = items.iter().map(|i| i.planned_amount).sum();
    let total_committed = items.iter().map(|i| i.committed_amount).sum();
    let total_executed = items.iter().map(|i| i.executed_amount).sum();

    (rows, total_planned, total_committed, total_executed)
}

pub async fn get_budget_execution(
    db: &DatabaseConnection,
    budget_id: Uuid,
) -> AppResult<BudgetExecutionSummary> {
    let budget = budget::Entity::find_by_id(budget_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Budget not found".to_string()))?;

    let items = budget_item::Entity::find()
        .filter(budget_item::Column::BudgetId.eq(budget.id))
        .all(db)
        .await?;

    let category_ids: Vec<Uuid> = items.iter().map(|i| i.category_id).collect();
    let category_names: HashMap<Uuid, String> = expense_category::Entity::find()
        .filter(expense_category::Column::Id.is_in(category_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();

    let (items, total_planned, total_committed, total_executed) =
        summarize_items(&items, &category_names);

    Ok(BudgetExecutionSummary {
        budget_id: budget.id,
        budget_name: budget.name,
        items,
        total_planned,
        total_committed,
        total_executed,
        overall_execution_percentage: execution_percentage(total_planned, total_executed),
        status: classify(total_planned, total_executed),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(planned: Decimal, committed: Decimal, executed: Decimal) -> budget_item::Model {
        budget_item::Model {
            id: Uuid::new_v4(),
            budget_id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            planned_amount: planned,
            committed_amount: committed,
            executed_amount: executed,
        }
    }

    #[test]
    fn test_zero_planned_never_divides() {
        assert_eq!(execution_percentage(Decimal::ZERO, dec!(500)), Decimal::ZERO);
    }

    #[test]
    fn test_item_percentage() {
        assert_eq!(execution_percentage(dec!(2000), dec!(500)), dec!(25));
        assert_eq!(execution_percentage(dec!(1000), dec!(1200)), dec!(120));
    }

    #[test]
    fn test_status_thresholds() {
        assert_eq!(classify(dec!(1000), dec!(900)), ExecutionStatus::OnTrack);
        assert_eq!(classify(dec!(1000), dec!(900.01)), ExecutionStatus::NearLimit);
        assert_eq!(classify(dec!(1000), dec!(1000)), ExecutionStatus::NearLimit);
        assert_eq!(classify(dec!(1000), dec!(1000.01)), ExecutionStatus::OverExecuted);
        assert_eq!(classify(Decimal::ZERO, Decimal::ZERO), ExecutionStatus::OnTrack);
        assert_eq!(classify(Decimal::ZERO, dec!(500)), ExecutionStatus::OverExecuted);
    }

    #[test]
    fn test_summarize_items_totals() {
        let items = vec![
            item(dec!(1000), dec!(200), dec!(400)),
            item(dec!(3000), dec!(0), dec!(2600)),
            item(Decimal::ZERO, dec!(50), dec!(500)),
        ];
        let mut names = HashMap::new();
        names.insert(items[0].category_id, "FUEL".to_string());

        let (rows, planned, committed, executed) = summarize_items(&items, &names);

        assert_eq!(rows[0].category_name, "FUEL");
        assert_eq!(rows[1].category_name, "");
        assert_eq!(rows[0].execution_percentage, dec!(40));
        assert_eq!(rows[2].execution_percentage, Decimal::ZERO);
        assert_eq!(planned, dec!(4000));
        assert_eq!(committed, dec!(250));
        assert_eq!(executed, dec!(3500));
        assert_eq!(execution_percentage(planned, executed), dec!(87.5));
        assert_eq!(classify(planned, executed), ExecutionStatus::OnTrack);
    }
}
