use std::collections::HashSet;

use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use uuid::Uuid;

use crate::entities::{bus, expense, route, route_expense};
use crate::error::{AppError, AppResult};
use crate::finance::period::DateRange;

/// Income, expenses and profit of one bus over a date range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodTotals {
    pub total_income: Decimal,
    /// Route-level (operational) expenses.
    pub total_expenses: Decimal,
    pub operational_profit: Decimal,
    pub administrative_expenses: Decimal,
    pub net_profit: Decimal,
    pub routes_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyStats {
    pub bus_id: Uuid,
    pub bus_code: String,
    pub year: i32,
    pub month: u32,
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub operational_profit: Decimal,
    pub administrative_expenses: Decimal,
    pub net_profit: Decimal,
    pub monthly_target: Decimal,
    /// Percentage of the monthly target reached. Not clamped.
    pub target_progress: Decimal,
    pub routes_count: u64,
}

/// Aggregate already-fetched rows.
///
/// Route expenses are summed from the expense lines rather than the stored
/// `route.total_expenses` column; lines belonging to routes outside `routes`
/// are ignored.
pub fn summarize(
    routes: &[route::Model],
    route_expenses: &[route_expense::Model],
    admin_expenses: &[expense::Model],
) -> PeriodTotals {
    let route_ids: HashSet<Uuid> = routes.iter().map(|r| r.id).collect();

    let total_income: Decimal = routes.iter().map(|r| r.total_income).sum();
    let total_expenses: Decimal = route_expenses
        .iter()
        .filter(|e| route_ids.contains(&e.route_id))
        .map(|e| e.amount)
        .sum();
    let administrative_expenses: Decimal = admin_expenses.iter().map(|e| e.amount).sum();

    let operational_profit = total_income - total_expenses;

    PeriodTotals {
        total_income,
        total_expenses,
        operational_profit,
        administrative_expenses,
        net_profit: operational_profit - administrative_expenses,
        routes_count: routes.len() as u64,
    }
}

/// Net profit as a percentage of the monthly target; zero when no target is set.
pub fn target_progress(net_profit: Decimal, monthly_target: Decimal) -> Decimal {
    if monthly_target > Decimal::ZERO {
        net_profit / monthly_target * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    }
}

/// Fetch the rows for one bus and range and aggregate them.
pub async fn load_period_totals(
    db: &DatabaseConnection,
    bus_id: Uuid,
    range: DateRange,
) -> AppResult<PeriodTotals> {
    let routes = route::Entity::find()
        .filter(route::Column::BusId.eq(bus_id))
        .filter(route::Column::RouteDate.between(range.start, range.end))
        .order_by_asc(route::Column::RouteDate)
        .all(db)
        .await?;

    let route_ids: Vec<Uuid> = routes.iter().map(|r| r.id).collect();
    let route_expenses = route_expense::Entity::find()
        .filter(route_expense::Column::RouteId.is_in(route_ids))
        .all(db)
        .await?;

    let admin_expenses = expense::Entity::find()
        .filter(expense::Column::BusId.eq(bus_id))
        .filter(expense::Column::ExpenseDate.between(range.start, range.end))
        .all(db)
        .await?;

    Ok(summarize(&routes, &route_expenses, &admin_expenses))
}

/// Monthly profit report for one bus.
pub async fn get_monthly_stats(
    db: &DatabaseConnection,
    bus_id: Uuid,
    year: i32,
    month: u32,
) -> AppResult<MonthlyStats> {
    let range = DateRange::month(year, month)?;

    let bus = bus::Entity::find_by_id(bus_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Bus not found".to_string()))?;

    let totals = load_period_totals(db, bus.id, range).await?;

    tracing::debug!(
        bus_id = %bus.id,
        year,
        month,
        routes = totals.routes_count,
        net_profit = %totals.net_profit,
        "Computed monthly stats"
    );

    Ok(MonthlyStats {
        bus_id: bus.id,
        bus_code: bus.code,
        year,
        month,
        total_income: totals.total_income,
        total_expenses: totals.total_expenses,
        operational_profit: totals.operational_profit,
        administrative_expenses: totals.administrative_expenses,
        net_profit: totals.net_profit,
        monthly_target: bus.monthly_target,
        target_progress: target_progress(totals.net_profit, bus.monthly_target),
        routes_count: totals.routes_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;

    fn route_with_income(income: Decimal) -> route::Model {
        route::Model {
            id: Uuid::new_v4(),
            bus_id: Uuid::new_v4(),
            worker_id: Uuid::new_v4(),
            route_date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            start_time: None,
            end_time: None,
            total_income: income,
            total_expenses: Decimal::ZERO,
            net_income: income,
            is_locked: false,
            created_at: Utc::now().into(),
        }
    }

    fn line(route_id: Uuid, amount: Decimal) -> route_expense::Model {
        route_expense::Model {
            id: Uuid::new_v4(),
            route_id,
            name: "FUEL".to_string(),
            amount,
        }
    }

    fn admin_expense(amount: Decimal) -> expense::Model {
        expense::Model {
            id: Uuid::new_v4(),
            bus_id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            amount,
            expense_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            description: None,
            invoice_id: None,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn test_single_route_scenario() {
        let route = route_with_income(dec!(500000));
        let lines = vec![line(route.id, dec!(50000)), line(route.id, dec!(30000))];

        let totals = summarize(&[route], &lines, &[]);

        assert_eq!(totals.total_income, dec!(500000));
        assert_eq!(totals.total_expenses, dec!(80000));
        assert_eq!(totals.operational_profit, dec!(420000));
        assert_eq!(totals.net_profit, dec!(420000));
        assert_eq!(totals.routes_count, 1);
        assert_eq!(target_progress(totals.net_profit, dec!(1000000)), dec!(42));
    }

    #[test]
    fn test_administrative_expenses_reduce_net_profit() {
        let a = route_with_income(dec!(200000));
        let b = route_with_income(dec!(150000));
        let lines = vec![line(a.id, dec!(20000)), line(b.id, dec!(10000))];
        let admin = vec![admin_expense(dec!(45000)), admin_expense(dec!(5000))];

        let totals = summarize(&[a, b], &lines, &admin);

        assert_eq!(totals.total_income, dec!(350000));
        assert_eq!(totals.total_expenses, dec!(30000));
        assert_eq!(totals.administrative_expenses, dec!(50000));
        assert_eq!(totals.net_profit, dec!(270000));
        assert_eq!(totals.routes_count, 2);
    }

    #[test]
    fn test_lines_of_other_routes_are_ignored() {
        let route = route_with_income(dec!(1000));
        let lines = vec![line(route.id, dec!(100)), line(Uuid::new_v4(), dec!(900))];

        let totals = summarize(&[route], &lines, &[]);
        assert_eq!(totals.total_expenses, dec!(100));
    }

    #[test]
    fn test_empty_period_is_all_zero() {
        let totals = summarize(&[], &[], &[]);
        assert_eq!(totals.net_profit, Decimal::ZERO);
        assert_eq!(totals.routes_count, 0);
    }

    #[test]
    fn test_target_progress_without_target_is_zero() {
        assert_eq!(target_progress(dec!(420000), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(target_progress(dec!(420000), dec!(-5)), Decimal::ZERO);
    }

    #[test]
    fn test_target_progress_is_not_clamped() {
        assert_eq!(target_progress(dec!(1500000), dec!(1000000)), dec!(150));
        assert_eq!(target_progress(dec!(-250000), dec!(1000000)), dec!(-25));
    }
}
