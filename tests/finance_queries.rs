use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};
use uuid::Uuid;

use fleet_ledger::entities::profit_sharing_member::ShareRole;
use fleet_ledger::entities::user::UserRole;
use fleet_ledger::entities::{
    budget, budget_item, bus, expense, expense_category, profit_sharing_group,
    profit_sharing_member, route, route_expense, user,
};
use fleet_ledger::finance::{
    get_budget_execution, get_monthly_stats, get_profit_distribution, ExecutionStatus,
};
use fleet_ledger::AppError;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn bus(target: Decimal) -> bus::Model {
    bus::Model {
        id: Uuid::new_v4(),
        code: "BUS-07".to_string(),
        plate: "ABC123".to_string(),
        monthly_target: target,
        is_active: true,
        created_at: Utc::now().into(),
    }
}

fn route(bus_id: Uuid, income: Decimal, expenses: Decimal) -> route::Model {
    route::Model {
        id: Uuid::new_v4(),
        bus_id,
        worker_id: Uuid::new_v4(),
        route_date: date(2026, 3, 14),
        start_time: None,
        end_time: None,
        total_income: income,
        total_expenses: expenses,
        net_income: income - expenses,
        is_locked: false,
        created_at: Utc::now().into(),
    }
}

fn line(route_id: Uuid, name: &str, amount: Decimal) -> route_expense::Model {
    route_expense::Model {
        id: Uuid::new_v4(),
        route_id,
        name: name.to_string(),
        amount,
    }
}

fn admin_expense(bus_id: Uuid, amount: Decimal) -> expense::Model {
    expense::Model {
        id: Uuid::new_v4(),
        bus_id,
        category_id: Uuid::new_v4(),
        amount,
        expense_date: date(2026, 3, 3),
        description: Some("Insurance".to_string()),
        invoice_id: None,
        created_at: Utc::now().into(),
    }
}

fn person(name: &str) -> user::Model {
    user::Model {
        id: Uuid::new_v4(),
        full_name: name.to_string(),
        national_id: Uuid::new_v4().to_string(),
        email: format!("{}@fleet.test", name.to_lowercase()),
        password_hash: String::new(),
        role: UserRole::Worker,
        assigned_bus_id: None,
        is_active: true,
        created_at: Utc::now().into(),
    }
}

fn member(group_id: Uuid, user_id: Uuid, role: ShareRole, percentage: Decimal) -> profit_sharing_member::Model {
    profit_sharing_member::Model {
        id: Uuid::new_v4(),
        group_id,
        user_id,
        role_in_share: role,
        percentage,
        is_active: true,
    }
}

fn empty() -> DatabaseConnection {
    MockDatabase::new(DatabaseBackend::Postgres).into_connection()
}

#[tokio::test]
async fn test_monthly_stats_for_single_route() {
    let bus = bus(dec!(1000000));
    let route = route(bus.id, dec!(500000), dec!(80000));
    let lines = vec![
        line(route.id, "FUEL", dec!(50000)),
        line(route.id, "TOLLS", dec!(30000)),
    ];

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![bus.clone()]])
        .append_query_results([vec![route]])
        .append_query_results([lines])
        .append_query_results([Vec::<expense::Model>::new()])
        .into_connection();

    let stats = get_monthly_stats(&db, bus.id, 2026, 3).await.unwrap();

    assert_eq!(stats.bus_code, "BUS-07");
    assert_eq!(stats.total_income, dec!(500000));
    assert_eq!(stats.total_expenses, dec!(80000));
    assert_eq!(stats.operational_profit, dec!(420000));
    assert_eq!(stats.administrative_expenses, Decimal::ZERO);
    assert_eq!(stats.net_profit, dec!(420000));
    assert_eq!(stats.target_progress, dec!(42));
    assert_eq!(stats.routes_count, 1);
}

#[tokio::test]
async fn test_monthly_stats_subtracts_administrative_expenses() {
    let bus = bus(Decimal::ZERO);
    let route = route(bus.id, dec!(300000), dec!(20000));
    let lines = vec![line(route.id, "FUEL", dec!(20000))];

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![bus.clone()]])
        .append_query_results([vec![route]])
        .append_query_results([lines])
        .append_query_results([vec![admin_expense(bus.id, dec!(60000))]])
        .into_connection();

    let stats = get_monthly_stats(&db, bus.id, 2026, 3).await.unwrap();

    assert_eq!(stats.operational_profit, dec!(280000));
    assert_eq!(stats.net_profit, dec!(220000));
    // No target configured
    assert_eq!(stats.target_progress, Decimal::ZERO);
}

#[tokio::test]
async fn test_monthly_stats_unknown_bus() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<bus::Model>::new()])
        .into_connection();

    let result = get_monthly_stats(&db, Uuid::new_v4(), 2026, 3).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_monthly_stats_rejects_invalid_month() {
    let result = get_monthly_stats(&empty(), Uuid::new_v4(), 2026, 13).await;
    assert!(matches!(result, Err(AppError::InvalidRange(_))));
}

#[tokio::test]
async fn test_distribution_with_unassigned_remainder() {
    let bus_id = Uuid::new_v4();
    let group = profit_sharing_group::Model {
        id: Uuid::new_v4(),
        bus_id,
        name: "BUS-07 partners".to_string(),
        start_date: date(2026, 1, 1),
        end_date: None,
        is_active: true,
        created_at: Utc::now().into(),
    };
    let route = route(bus_id, dec!(1100000), dec!(100000));
    let lines = vec![line(route.id, "FUEL", dec!(100000))];
    let owner = person("Owner");
    let driver = person("Driver");
    let members = vec![
        member(group.id, owner.id, ShareRole::Owner, dec!(60)),
        member(group.id, driver.id, ShareRole::Driver, dec!(30)),
    ];

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![group.clone()]])
        .append_query_results([vec![route]])
        .append_query_results([lines])
        .append_query_results([Vec::<expense::Model>::new()])
        .append_query_results([members])
        .append_query_results([vec![owner, driver]])
        .into_connection();

    let result = get_profit_distribution(&db, group.id, Some(date(2026, 3, 1)), Some(date(2026, 3, 31)))
        .await
        .unwrap();

    assert_eq!(result.totals.net_profit, dec!(1000000));
    assert_eq!(result.distribution.len(), 2);
    assert_eq!(result.distribution[0].user_name, "Owner");
    assert_eq!(result.distribution[0].amount, dec!(600000));
    assert_eq!(result.distribution[1].user_name, "Driver");
    assert_eq!(result.distribution[1].amount, dec!(300000));
    assert_eq!(result.summary.unassigned_percentage, dec!(10));
    assert_eq!(result.summary.unassigned_amount, dec!(100000));
    assert_eq!(result.start_date, date(2026, 3, 1));
    assert_eq!(result.end_date, date(2026, 3, 31));
}

#[tokio::test]
async fn test_distribution_of_zero_profit() {
    let group = profit_sharing_group::Model {
        id: Uuid::new_v4(),
        bus_id: Uuid::new_v4(),
        name: "Quiet month".to_string(),
        start_date: date(2026, 1, 1),
        end_date: None,
        is_active: true,
        created_at: Utc::now().into(),
    };
    let owner = person("Owner");

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![group.clone()]])
        .append_query_results([Vec::<route::Model>::new()])
        .append_query_results([Vec::<route_expense::Model>::new()])
        .append_query_results([Vec::<expense::Model>::new()])
        .append_query_results([vec![member(group.id, owner.id, ShareRole::Owner, dec!(100))]])
        .append_query_results([vec![owner]])
        .into_connection();

    let result = get_profit_distribution(&db, group.id, Some(date(2026, 2, 1)), Some(date(2026, 2, 28)))
        .await
        .unwrap();

    assert!(result.distribution[0].amount.is_zero());
    assert!(result.summary.unassigned_percentage.is_zero());
    assert!(result.summary.unassigned_amount.is_zero());
}

#[tokio::test]
async fn test_distribution_rejects_inverted_range() {
    let result = get_profit_distribution(
        &empty(),
        Uuid::new_v4(),
        Some(date(2026, 3, 31)),
        Some(date(2026, 3, 1)),
    )
    .await;

    assert!(matches!(result, Err(AppError::InvalidRange(_))));
}

#[tokio::test]
async fn test_distribution_unknown_group() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<profit_sharing_group::Model>::new()])
        .into_connection();

    let result = get_profit_distribution(&db, Uuid::new_v4(), None, None).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_budget_execution_with_unplanned_spend() {
    let budget = budget::Model {
        id: Uuid::new_v4(),
        bus_id: None,
        name: "2026 operations".to_string(),
        start_date: date(2026, 1, 1),
        end_date: Some(date(2026, 12, 31)),
        planned_income: dec!(12000000),
        planned_expenses: dec!(4000000),
        is_active: true,
        created_at: Utc::now().into(),
    };
    let fuel = expense_category::Model {
        id: Uuid::new_v4(),
        name: "FUEL".to_string(),
        description: None,
        is_active: true,
    };
    let repairs = expense_category::Model {
        id: Uuid::new_v4(),
        name: "REPAIRS".to_string(),
        description: None,
        is_active: true,
    };
    let items = vec![
        budget_item::Model {
            id: Uuid::new_v4(),
            budget_id: budget.id,
            category_id: fuel.id,
            planned_amount: dec!(1000),
            committed_amount: dec!(100),
            executed_amount: dec!(950),
        },
        budget_item::Model {
            id: Uuid::new_v4(),
            budget_id: budget.id,
            category_id: repairs.id,
            planned_amount: Decimal::ZERO,
            committed_amount: Decimal::ZERO,
            executed_amount: dec!(500),
        },
    ];

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![budget.clone()]])
        .append_query_results([items])
        .append_query_results([vec![fuel, repairs]])
        .into_connection();

    let summary = get_budget_execution(&db, budget.id).await.unwrap();

    assert_eq!(summary.items[0].category_name, "FUEL");
    assert_eq!(summary.items[0].execution_percentage, dec!(95));
    assert_eq!(summary.items[1].category_name, "REPAIRS");
    assert_eq!(summary.items[1].execution_percentage, Decimal::ZERO);
    assert_eq!(summary.total_planned, dec!(1000));
    assert_eq!(summary.total_committed, dec!(100));
    assert_eq!(summary.total_executed, dec!(1450));
    assert_eq!(summary.overall_execution_percentage, dec!(145));
    assert_eq!(summary.status, ExecutionStatus::OverExecuted);
}

#[tokio::test]
async fn test_budget_execution_unknown_budget() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<budget::Model>::new()])
        .into_connection();

    let result = get_budget_execution(&db, Uuid::new_v4()).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}
