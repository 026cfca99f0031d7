use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use fleet_ledger::entities::profit_sharing_member::ShareRole;
use fleet_ledger::entities::{expense, route, route_expense};
use fleet_ledger::finance::budget_execution::{classify, execution_percentage, ExecutionStatus};
use fleet_ledger::finance::distribution::{distribute, Share};
use fleet_ledger::finance::stats::{summarize, target_progress};

fn money() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn signed_money() -> impl Strategy<Value = Decimal> {
    (-1_000_000_000i64..1_000_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn percentage() -> impl Strategy<Value = Decimal> {
    (1i64..=10_000).prop_map(|hundredths| Decimal::new(hundredths, 2))
}

fn route(income: Decimal) -> route::Model {
    route::Model {
        id: Uuid::new_v4(),
        bus_id: Uuid::new_v4(),
        worker_id: Uuid::new_v4(),
        route_date: NaiveDate::from_ymd_opt(2026, 5, 10).unwrap(),
        start_time: None,
        end_time: None,
        total_income: income,
        total_expenses: Decimal::ZERO,
        net_income: income,
        is_locked: false,
        created_at: Utc::now().into(),
    }
}

fn admin_expense(amount: Decimal) -> expense::Model {
    expense::Model {
        id: Uuid::new_v4(),
        bus_id: Uuid::new_v4(),
        category_id: Uuid::new_v4(),
        amount,
        expense_date: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
        description: None,
        invoice_id: None,
        created_at: Utc::now().into(),
    }
}

fn share(percentage: Decimal) -> Share {
    Share {
        member_id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        user_name: "Member".to_string(),
        role_in_share: ShareRole::Partner,
        percentage,
    }
}

proptest! {
    #[test]
    fn prop_net_profit_identity(
        incomes in prop::collection::vec(money(), 0..8),
        line_amounts in prop::collection::vec(money(), 0..16),
        admin_amounts in prop::collection::vec(money(), 0..6),
    ) {
        let routes: Vec<route::Model> = incomes.iter().copied().map(route).collect();
        let lines: Vec<route_expense::Model> = if routes.is_empty() {
            Vec::new()
        } else {
            line_amounts
                .iter()
                .enumerate()
                .map(|(i, amount)| route_expense::Model {
                    id: Uuid::new_v4(),
                    route_id: routes[i % routes.len()].id,
                    name: "FUEL".to_string(),
                    amount: *amount,
                })
                .collect()
        };
        let admin: Vec<expense::Model> = admin_amounts.iter().copied().map(admin_expense).collect();

        let totals = summarize(&routes, &lines, &admin);

        prop_assert_eq!(totals.total_income, incomes.iter().copied().sum::<Decimal>());
        prop_assert_eq!(totals.total_expenses, lines.iter().map(|l| l.amount).sum::<Decimal>());
        prop_assert_eq!(totals.administrative_expenses, admin_amounts.iter().copied().sum::<Decimal>());
        prop_assert_eq!(totals.operational_profit, totals.total_income - totals.total_expenses);
        prop_assert_eq!(totals.net_profit, totals.operational_profit - totals.administrative_expenses);
        prop_assert_eq!(totals.routes_count, routes.len() as u64);
    }

    #[test]
    fn prop_doubling_target_halves_progress(
        net in signed_money(),
        target in (1i64..1_000_000_000).prop_map(|c| Decimal::new(c, 2)),
    ) {
        let single = target_progress(net, target);
        let doubled = target_progress(net, target * Decimal::TWO);
        // Division keeps 28 significant digits, so the error grows with the quotient
        let tolerance = single.abs() * Decimal::new(1, 20) + Decimal::new(1, 16);
        prop_assert!((single - doubled * Decimal::TWO).abs() <= tolerance);
    }

    #[test]
    fn prop_distribution_accounts_for_all_profit(
        net in signed_money(),
        percentages in prop::collection::vec(percentage(), 0..6),
    ) {
        let shares = percentages.iter().copied().map(share).collect();
        let (lines, summary) = distribute(net, shares);

        let distributed: Decimal = lines.iter().map(|l| l.amount).sum();
        prop_assert_eq!(distributed + summary.unassigned_amount, net);
        prop_assert_eq!(summary.assigned_percentage, percentages.iter().copied().sum::<Decimal>());
    }

    #[test]
    fn prop_full_allocation_leaves_nothing(net in signed_money(), split in 1i64..10_000) {
        let first = Decimal::new(split, 2);
        let shares = vec![share(first), share(Decimal::ONE_HUNDRED - first)];

        let (_, summary) = distribute(net, shares);

        prop_assert!(summary.unassigned_percentage.is_zero());
        prop_assert!(summary.unassigned_amount.is_zero());
        prop_assert!(!summary.over_assigned);
    }

    #[test]
    fn prop_over_allocation_goes_negative(
        net in (1i64..1_000_000_000).prop_map(|c| Decimal::new(c, 2)),
        percentages in prop::collection::vec(percentage(), 2..5),
    ) {
        let assigned: Decimal = percentages.iter().copied().sum();
        prop_assume!(assigned > Decimal::ONE_HUNDRED);

        let (_, summary) = distribute(net, percentages.into_iter().map(share).collect());

        prop_assert!(summary.over_assigned);
        prop_assert!(summary.unassigned_percentage < Decimal::ZERO);
        prop_assert!(summary.unassigned_amount < Decimal::ZERO);
    }

    #[test]
    fn prop_nothing_planned_means_zero_percent(executed in money()) {
        prop_assert_eq!(execution_percentage(Decimal::ZERO, executed), Decimal::ZERO);
    }

    #[test]
    fn prop_status_matches_thresholds(planned in money(), executed in money()) {
        let status = classify(planned, executed);
        if executed > planned {
            prop_assert_eq!(status, ExecutionStatus::OverExecuted);
        } else if executed * Decimal::TEN > planned * Decimal::from(9) {
            prop_assert_eq!(status, ExecutionStatus::NearLimit);
        } else {
            prop_assert_eq!(status, ExecutionStatus::OnTrack);
        }
    }
}

#[test]
fn test_halving_holds_for_non_terminating_quotients() {
    let net = Decimal::new(999_999_999, 2);
    for cents in (3i64..=37).step_by(4) {
        let target = Decimal::new(cents, 2);
        let single = target_progress(net, target);
        let doubled = target_progress(net, target * Decimal::TWO);

        let tolerance = single.abs() * Decimal::new(1, 20) + Decimal::new(1, 16);
        assert!(
            (single - doubled * Decimal::TWO).abs() <= tolerance,
            "target {} drifted: {} vs {}",
            target,
            single,
            doubled
        );
    }
}
