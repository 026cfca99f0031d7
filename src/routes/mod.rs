use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::handlers::{
    audit_logs, auth, budgets, buses, expenses, invoices, profit_sharing, routes, users,
};
use crate::middleware::auth::{auth_middleware, require_admin};
use crate::middleware::rate_limit::create_public_governor;
use crate::middleware::role_rate_limit::create_user_governor;
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    let user_governor = create_user_governor();
    // Per IP, tighter than the global limit to slow down password guessing
    let public_governor = create_public_governor();

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .layer(public_governor);

    // Any active account. Per-module permissions and bus scope are checked
    // in the handlers against the AuthContext.
    let app_routes = Router::new()
        .route("/auth/me", get(auth::me))
        // Buses
        .route("/buses", get(buses::list_buses).post(buses::create_bus))
        .route(
            "/buses/{id}",
            get(buses::get_bus)
                .put(buses::update_bus)
                .delete(buses::deactivate_bus),
        )
        .route("/buses/{id}/stats", get(buses::monthly_stats))
        // Routes
        .route("/routes", get(routes::list_routes).post(routes::create_route))
        .route(
            "/routes/{id}",
            get(routes::get_route)
                .put(routes::update_route)
                .delete(routes::delete_route),
        )
        // Expenses
        .route(
            "/expense-categories",
            get(expenses::list_categories).post(expenses::create_category),
        )
        .route(
            "/expense-categories/{id}",
            put(expenses::update_category).delete(expenses::deactivate_category),
        )
        .route("/expenses", get(expenses::list_expenses).post(expenses::create_expense))
        .route(
            "/expenses/{id}",
            put(expenses::update_expense).delete(expenses::delete_expense),
        )
        // Budgets
        .route("/budgets", get(budgets::list_budgets).post(budgets::create_budget))
        .route(
            "/budgets/{id}",
            get(budgets::get_budget)
                .put(budgets::update_budget)
                .delete(budgets::deactivate_budget),
        )
        .route("/budgets/{id}/items", post(budgets::add_item))
        .route("/budgets/{id}/execution", get(budgets::budget_execution))
        .route(
            "/budget-items/{id}",
            put(budgets::update_item).delete(budgets::delete_item),
        )
        // Profit sharing
        .route(
            "/profit-sharing/groups",
            get(profit_sharing::list_groups).post(profit_sharing::create_group),
        )
        .route(
            "/profit-sharing/groups/{id}",
            get(profit_sharing::get_group)
                .put(profit_sharing::update_group)
                .delete(profit_sharing::deactivate_group),
        )
        .route(
            "/profit-sharing/groups/{id}/members",
            post(profit_sharing::add_member),
        )
        .route(
            "/profit-sharing/groups/{id}/distribution",
            get(profit_sharing::distribution),
        )
        .route(
            "/profit-sharing/members/{id}",
            put(profit_sharing::update_member).delete(profit_sharing::deactivate_member),
        )
        // Invoices
        .route("/invoices", get(invoices::list_invoices).post(invoices::create_invoice))
        .route("/invoices/{id}", get(invoices::get_invoice))
        .layer(user_governor.clone())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/{id}",
            put(users::update_user).delete(users::deactivate_user),
        )
        .route("/audit-logs", get(audit_logs::list_audit_logs))
        .layer(user_governor)
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api", app_routes.merge(admin_routes))
        .with_state(state)
}
