//! Editing rules for routes.
//!
//! A route is either unlocked (editable) or locked (read-only). Only an admin
//! moves it between the two, and toggling the lock is the one change allowed
//! on a locked route.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::entities::user::UserRole;
use crate::error::{AppError, AppResult};
use crate::utils::money::ensure_cents;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockTransition {
    Unchanged,
    Lock,
    Unlock,
}

/// Shape of a requested route update, as far as the lock rules care.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteChange {
    /// Any field other than `is_locked` is being modified.
    pub edits_fields: bool,
    pub is_locked: Option<bool>,
}

/// Whether a route may be created with the requested lock flag.
pub fn check_create(role: UserRole, is_locked: Option<bool>) -> AppResult<bool> {
    let locked = is_locked.unwrap_or(false);
    if locked && role != UserRole::Admin {
        return Err(AppError::Forbidden(
            "Only an admin can create a locked route".to_string(),
        ));
    }
    Ok(locked)
}

pub fn check_update(
    currently_locked: bool,
    role: UserRole,
    change: RouteChange,
) -> AppResult<LockTransition> {
    let transition = match change.is_locked {
        Some(true) if !currently_locked => LockTransition::Lock,
        Some(false) if currently_locked => LockTransition::Unlock,
        _ => LockTransition::Unchanged,
    };

    if transition != LockTransition::Unchanged && role != UserRole::Admin {
        return Err(AppError::Forbidden(
            "Only an admin can lock or unlock a route".to_string(),
        ));
    }

    // Field edits are judged against the state before this request: unlock
    // first, then edit.
    if change.edits_fields && currently_locked {
        return Err(AppError::Conflict("Route is locked".to_string()));
    }

    Ok(transition)
}

/// Nothing to save: no field edits and the lock flag already matches.
pub fn is_no_op(change: RouteChange, transition: LockTransition) -> bool {
    !change.edits_fields && transition == LockTransition::Unchanged
}

/// Hard delete is admin-only and, for now, ignores the lock.
pub fn check_delete(role: UserRole) -> AppResult<()> {
    if role != UserRole::Admin {
        return Err(AppError::Forbidden(
            "Only an admin can delete a route".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExpenseLineInput {
    pub name: String,
    pub amount: Decimal,
}

/// Validated expense line: upper-case name, non-negative amount.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseLine {
    pub name: String,
    pub amount: Decimal,
}

pub fn normalize_expense_lines(lines: Vec<ExpenseLineInput>) -> AppResult<Vec<ExpenseLine>> {
    lines
        .into_iter()
        .map(|line| {
            let name = line.name.trim().to_uppercase();
            if name.is_empty() {
                return Err(AppError::BadRequest("Expense name is required".to_string()));
            }
            if line.amount < Decimal::ZERO {
                return Err(AppError::BadRequest(format!(
                    "Expense {} has a negative amount",
                    name
                )));
            }
            ensure_cents(&format!("Expense {}", name), line.amount)?;
            Ok(ExpenseLine { name, amount: line.amount })
        })
        .collect()
}

/// `(total_expenses, net_income)` for a route.
pub fn route_totals(total_income: Decimal, lines: &[ExpenseLine]) -> (Decimal, Decimal) {
    let total_expenses: Decimal = lines.iter().map(|l| l.amount).sum();
    (total_expenses, total_income - total_expenses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn fields() -> RouteChange {
        RouteChange { edits_fields: true, is_locked: None }
    }

    fn lock_only(value: bool) -> RouteChange {
        RouteChange { edits_fields: false, is_locked: Some(value) }
    }

    #[test]
    fn test_create_defaults_unlocked() {
        assert!(!check_create(UserRole::Worker, None).unwrap());
        assert!(check_create(UserRole::Admin, Some(true)).unwrap());
        assert!(matches!(
            check_create(UserRole::Worker, Some(true)),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_unlocked_route_is_editable_by_anyone() {
        assert_eq!(check_update(false, UserRole::Worker, fields()).unwrap(), LockTransition::Unchanged);
        assert_eq!(check_update(false, UserRole::Admin, fields()).unwrap(), LockTransition::Unchanged);
    }

    #[test]
    fn test_locked_route_rejects_field_edits() {
        assert!(matches!(
            check_update(true, UserRole::Worker, fields()),
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            check_update(true, UserRole::Admin, fields()),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn test_admin_toggles_lock_at_any_time() {
        assert_eq!(check_update(true, UserRole::Admin, lock_only(false)).unwrap(), LockTransition::Unlock);
        assert_eq!(check_update(false, UserRole::Admin, lock_only(true)).unwrap(), LockTransition::Lock);
    }

    #[test]
    fn test_worker_cannot_toggle_lock() {
        assert!(matches!(
            check_update(false, UserRole::Worker, lock_only(true)),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            check_update(true, UserRole::Worker, lock_only(false)),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_resending_current_lock_state_is_a_no_op() {
        // A worker form that echoes is_locked=false must still save
        let change = RouteChange { edits_fields: true, is_locked: Some(false) };
        assert_eq!(check_update(false, UserRole::Worker, change).unwrap(), LockTransition::Unchanged);
    }

    #[test]
    fn test_empty_update_writes_nothing() {
        let empty = RouteChange::default();
        for locked in [false, true] {
            let transition = check_update(locked, UserRole::Worker, empty).unwrap();
            assert!(is_no_op(empty, transition));
        }

        let same = lock_only(true);
        let transition = check_update(true, UserRole::Admin, same).unwrap();
        assert!(is_no_op(same, transition));

        let unlock = lock_only(false);
        let transition = check_update(true, UserRole::Admin, unlock).unwrap();
        assert!(!is_no_op(unlock, transition));
        assert!(!is_no_op(fields(), LockTransition::Unchanged));
    }

    #[test]
    fn test_admin_can_edit_and_lock_in_one_request() {
        let change = RouteChange { edits_fields: true, is_locked: Some(true) };
        assert_eq!(check_update(false, UserRole::Admin, change).unwrap(), LockTransition::Lock);
    }

    #[test]
    fn test_only_admin_deletes() {
        assert!(check_delete(UserRole::Admin).is_ok());
        assert!(matches!(check_delete(UserRole::Worker), Err(AppError::Forbidden(_))));
    }

    #[test]
    fn test_expense_lines_are_normalized() {
        let lines = normalize_expense_lines(vec![
            ExpenseLineInput { name: "  fuel ".to_string(), amount: dec!(50000) },
            ExpenseLineInput { name: "Tolls".to_string(), amount: dec!(30000) },
        ])
        .unwrap();

        assert_eq!(lines[0].name, "FUEL");
        assert_eq!(lines[1].name, "TOLLS");
        assert_eq!(route_totals(dec!(500000), &lines), (dec!(80000), dec!(420000)));
    }

    #[test]
    fn test_expense_lines_reject_bad_input() {
        assert!(normalize_expense_lines(vec![ExpenseLineInput {
            name: "   ".to_string(),
            amount: dec!(1),
        }])
        .is_err());
        assert!(normalize_expense_lines(vec![ExpenseLineInput {
            name: "fuel".to_string(),
            amount: dec!(-1),
        }])
        .is_err());
        assert!(matches!(
            normalize_expense_lines(vec![ExpenseLineInput {
                name: "fuel".to_string(),
                amount: dec!(10.005),
            }]),
            Err(AppError::BadRequest(_))
        ));
        // Zero is a valid amount
        assert!(normalize_expense_lines(vec![ExpenseLineInput {
            name: "fuel".to_string(),
            amount: Decimal::ZERO,
        }])
        .is_ok());
    }
}
