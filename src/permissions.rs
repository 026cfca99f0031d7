//! Static role → module action table.
//!
//! Every (role, module, action) triple is decided by an exhaustive match, so
//! adding a module or an action fails to compile until the table covers it.

use serde::Serialize;

use crate::entities::user::UserRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Module {
    Dashboard,
    Buses,
    Routes,
    Expenses,
    ExpenseCategories,
    Budgets,
    ProfitSharing,
    Invoices,
    Users,
    AuditLogs,
    Reports,
}

impl Module {
    pub const ALL: [Module; 11] = [
        Module::Dashboard,
        Module::Buses,
        Module::Routes,
        Module::Expenses,
        Module::ExpenseCategories,
        Module::Budgets,
        Module::ProfitSharing,
        Module::Invoices,
        Module::Users,
        Module::AuditLogs,
        Module::Reports,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::View, Action::Create, Action::Edit, Action::Delete];
}

/// Whether `role` may perform `action` on `module`.
pub fn can(role: UserRole, module: Module, action: Action) -> bool {
    match role {
        UserRole::Admin => true,
        UserRole::Worker => worker_can(module, action),
    }
}

fn worker_can(module: Module, action: Action) -> bool {
    use Action::*;

    match module {
        Module::Dashboard | Module::Buses | Module::ExpenseCategories | Module::Reports => {
            matches!(action, View)
        }
        Module::Routes => matches!(action, View | Create | Edit),
        Module::Expenses | Module::Invoices => matches!(action, View | Create),
        Module::Budgets | Module::ProfitSharing | Module::Users | Module::AuditLogs => false,
    }
}

/// One allowed pair, as sent to clients that build their menus from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Grant {
    pub module: Module,
    pub action: Action,
}

/// Every grant held by `role`.
pub fn grants_for(role: UserRole) -> Vec<Grant> {
    Module::ALL
        .iter()
        .flat_map(|&module| Action::ALL.iter().map(move |&action| Grant { module, action }))
        .filter(|grant| can(role, grant.module, grant.action))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_can_do_everything() {
        for module in Module::ALL {
            for action in Action::ALL {
                assert!(can(UserRole::Admin, module, action), "{module:?} {action:?}");
            }
        }
    }

    #[test]
    fn test_worker_route_permissions() {
        assert!(can(UserRole::Worker, Module::Routes, Action::View));
        assert!(can(UserRole::Worker, Module::Routes, Action::Create));
        assert!(can(UserRole::Worker, Module::Routes, Action::Edit));
        assert!(!can(UserRole::Worker, Module::Routes, Action::Delete));
    }

    #[test]
    fn test_worker_is_kept_out_of_admin_modules() {
        for module in [Module::Users, Module::AuditLogs, Module::Budgets, Module::ProfitSharing] {
            for action in Action::ALL {
                assert!(!can(UserRole::Worker, module, action), "{module:?} {action:?}");
            }
        }
    }

    #[test]
    fn test_grants_for_worker_matches_table() {
        let grants = grants_for(UserRole::Worker);
        assert_eq!(grants.len(), 11);
        assert!(grants.contains(&Grant { module: Module::Expenses, action: Action::Create }));
        assert!(!grants.contains(&Grant { module: Module::Expenses, action: Action::Edit }));
        assert_eq!(grants_for(UserRole::Admin).len(), Module::ALL.len() * Action::ALL.len());
    }
}
