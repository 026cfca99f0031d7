use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::{self, AuditEntry};
use crate::entities::audit_log::AuditAction;
use crate::entities::{bus, route, route_expense, user};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthContext;
use crate::permissions::{Action, Module};
use crate::route_rules::{self, ExpenseLine, ExpenseLineInput, LockTransition, RouteChange};
use crate::utils::money::ensure_cents;
use crate::utils::pagination::{fetch_page, Page, PageParams};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RouteFilter {
    pub bus_id: Option<Uuid>,
    pub worker_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_locked: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRouteRequest {
    pub bus_id: Uuid,
    /// Defaults to the caller for workers; required for admins.
    pub worker_id: Option<Uuid>,
    pub route_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub total_income: Decimal,
    #[serde(default)]
    pub expenses: Vec<ExpenseLineInput>,
    pub is_locked: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRouteRequest {
    pub bus_id: Option<Uuid>,
    pub worker_id: Option<Uuid>,
    pub route_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub total_income: Option<Decimal>,
    /// Replaces every expense line when present.
    pub expenses: Option<Vec<ExpenseLineInput>>,
    pub is_locked: Option<bool>,
}

impl UpdateRouteRequest {
    fn change(&self) -> RouteChange {
        RouteChange {
            edits_fields: self.bus_id.is_some()
                || self.worker_id.is_some()
                || self.route_date.is_some()
                || self.start_time.is_some()
                || self.end_time.is_some()
                || self.total_income.is_some()
                || self.expenses.is_some(),
            is_locked: self.is_locked,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RouteExpenseInfo {
    pub id: Uuid,
    pub name: String,
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct RouteResponse {
    #[serde(flatten)]
    pub route: route::Model,
    pub expenses: Vec<RouteExpenseInfo>,
}

impl RouteResponse {
    fn new(route: route::Model, lines: Vec<route_expense::Model>) -> Self {
        Self {
            route,
            expenses: lines
                .into_iter()
                .map(|l| RouteExpenseInfo {
                    id: l.id,
                    name: l.name,
                    amount: l.amount,
                })
                .collect(),
        }
    }
}

fn validate_schedule(start: Option<NaiveTime>, end: Option<NaiveTime>) -> AppResult<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(AppError::InvalidRange("Route ends before it starts".to_string()));
        }
    }
    Ok(())
}

fn validate_income(income: Decimal) -> AppResult<()> {
    if income < Decimal::ZERO {
        return Err(AppError::BadRequest("Total income cannot be negative".to_string()));
    }
    ensure_cents("Total income", income)
}

async fn find_route(state: &AppState, id: Uuid) -> AppResult<route::Model> {
    route::Entity::find_by_id(id)
        .one(state.db.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("Route not found".to_string()))
}

async fn load_lines(state: &AppState, route_ids: Vec<Uuid>) -> AppResult<Vec<route_expense::Model>> {
    Ok(route_expense::Entity::find()
        .filter(route_expense::Column::RouteId.is_in(route_ids))
        .order_by_asc(route_expense::Column::Name)
        .all(state.db.as_ref())
        .await?)
}

async fn ensure_active_bus(state: &AppState, bus_id: Uuid) -> AppResult<()> {
    let bus = bus::Entity::find_by_id(bus_id)
        .one(state.db.as_ref())
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid bus".to_string()))?;
    if !bus.is_active {
        return Err(AppError::BadRequest("Bus is inactive".to_string()));
    }
    Ok(())
}

async fn ensure_active_worker(state: &AppState, worker_id: Uuid) -> AppResult<()> {
    let worker = user::Entity::find_by_id(worker_id)
        .one(state.db.as_ref())
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid worker".to_string()))?;
    if !worker.is_active {
        return Err(AppError::BadRequest("Worker is inactive".to_string()));
    }
    Ok(())
}

async fn insert_lines(
    txn: &DatabaseTransaction,
    route_id: Uuid,
    lines: &[ExpenseLine],
) -> AppResult<Vec<route_expense::Model>> {
    let mut saved = Vec::with_capacity(lines.len());
    for line in lines {
        let row = route_expense::ActiveModel {
            id: Set(Uuid::new_v4()),
            route_id: Set(route_id),
            name: Set(line.name.clone()),
            amount: Set(line.amount),
        }
        .insert(txn)
        .await?;
        saved.push(row);
    }
    Ok(saved)
}

/// List routes with filters. Workers are pinned to their assigned bus.
pub async fn list_routes(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(filter): Query<RouteFilter>,
    Query(page): Query<PageParams>,
) -> AppResult<Json<Page<RouteResponse>>> {
    ctx.require(Module::Routes, Action::View)?;

    let mut query = route::Entity::find()
        .order_by_desc(route::Column::RouteDate)
        .order_by_desc(route::Column::CreatedAt);

    match (ctx.bus_scope()?, filter.bus_id) {
        (Some(scoped), Some(requested)) if scoped != requested => {
            return Err(AppError::Forbidden("You do not have access to this bus".to_string()));
        }
        (Some(bus_id), _) | (None, Some(bus_id)) => {
            query = query.filter(route::Column::BusId.eq(bus_id));
        }
        (None, None) => {}
    }
    if let Some(worker_id) = filter.worker_id {
        query = query.filter(route::Column::WorkerId.eq(worker_id));
    }
    if let (Some(start), Some(end)) = (filter.start_date, filter.end_date) {
        if end < start {
            return Err(AppError::InvalidRange("end_date is before start_date".to_string()));
        }
    }
    if let Some(start) = filter.start_date {
        query = query.filter(route::Column::RouteDate.gte(start));
    }
    if let Some(end) = filter.end_date {
        query = query.filter(route::Column::RouteDate.lte(end));
    }
    if let Some(locked) = filter.is_locked {
        query = query.filter(route::Column::IsLocked.eq(locked));
    }

    let page = fetch_page(query, state.db.as_ref(), page).await?;

    let ids = page.items.iter().map(|r| r.id).collect();
    let mut lines_by_route: HashMap<Uuid, Vec<route_expense::Model>> = HashMap::new();
    for line in load_lines(&state, ids).await? {
        lines_by_route.entry(line.route_id).or_default().push(line);
    }

    Ok(Json(page.map(|r| {
        let lines = lines_by_route.remove(&r.id).unwrap_or_default();
        RouteResponse::new(r, lines)
    })))
}

pub async fn get_route(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RouteResponse>> {
    ctx.require(Module::Routes, Action::View)?;

    let route = find_route(&state, id).await?;
    ctx.ensure_bus_access(route.bus_id)?;

    let lines = load_lines(&state, vec![route.id]).await?;
    Ok(Json(RouteResponse::new(route, lines)))
}

pub async fn create_route(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<CreateRouteRequest>,
) -> AppResult<Json<RouteResponse>> {
    ctx.require(Module::Routes, Action::Create)?;
    ctx.ensure_bus_access(payload.bus_id)?;

    let worker_id = if ctx.is_admin() {
        payload
            .worker_id
            .ok_or_else(|| AppError::BadRequest("worker_id is required".to_string()))?
    } else {
        match payload.worker_id {
            Some(id) if id != ctx.user_id => {
                return Err(AppError::Forbidden(
                    "Workers can only register their own routes".to_string(),
                ));
            }
            _ => ctx.user_id,
        }
    };

    let is_locked = route_rules::check_create(ctx.role, payload.is_locked)?;
    validate_schedule(payload.start_time, payload.end_time)?;
    validate_income(payload.total_income)?;
    let lines = route_rules::normalize_expense_lines(payload.expenses)?;
    let (total_expenses, net_income) = route_rules::route_totals(payload.total_income, &lines);

    ensure_active_bus(&state, payload.bus_id).await?;
    ensure_active_worker(&state, worker_id).await?;

    let txn = state.db.begin().await?;

    let route = route::ActiveModel {
        id: Set(Uuid::new_v4()),
        bus_id: Set(payload.bus_id),
        worker_id: Set(worker_id),
        route_date: Set(payload.route_date),
        start_time: Set(payload.start_time),
        end_time: Set(payload.end_time),
        total_income: Set(payload.total_income),
        total_expenses: Set(total_expenses),
        net_income: Set(net_income),
        is_locked: Set(is_locked),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    let saved = insert_lines(&txn, route.id, &lines).await?;

    txn.commit().await?;

    audit::record(
        state.db.as_ref(),
        &ctx,
        AuditEntry::new(
            AuditAction::Create,
            "route",
            route.id,
            format!("Registered route for {}", route.route_date),
        )
        .with_metadata(serde_json::json!({
            "bus_id": route.bus_id,
            "total_income": route.total_income,
            "total_expenses": route.total_expenses,
        })),
    )
    .await;

    Ok(Json(RouteResponse::new(route, saved)))
}

/// Update a route. Field edits require the route to be unlocked; the lock
/// flag itself is admin-only and may be toggled at any time.
pub async fn update_route(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRouteRequest>,
) -> AppResult<Json<RouteResponse>> {
    ctx.require(Module::Routes, Action::Edit)?;

    let existing = find_route(&state, id).await?;
    ctx.ensure_bus_access(existing.bus_id)?;

    let change = payload.change();
    let transition = route_rules::check_update(existing.is_locked, ctx.role, change)?;
    if route_rules::is_no_op(change, transition) {
        let lines = load_lines(&state, vec![existing.id]).await?;
        return Ok(Json(RouteResponse::new(existing, lines)));
    }

    if let Some(bus_id) = payload.bus_id {
        ctx.ensure_bus_access(bus_id)?;
        if bus_id != existing.bus_id {
            ensure_active_bus(&state, bus_id).await?;
        }
    }
    if let Some(worker_id) = payload.worker_id {
        if !ctx.is_admin() && worker_id != ctx.user_id {
            return Err(AppError::Forbidden(
                "Workers can only register their own routes".to_string(),
            ));
        }
        ensure_active_worker(&state, worker_id).await?;
    }

    let start_time = payload.start_time.or(existing.start_time);
    let end_time = payload.end_time.or(existing.end_time);
    validate_schedule(start_time, end_time)?;

    let total_income = payload.total_income.unwrap_or(existing.total_income);
    validate_income(total_income)?;

    let new_lines = payload
        .expenses
        .map(route_rules::normalize_expense_lines)
        .transpose()?;

    let txn = state.db.begin().await?;

    let lines = match &new_lines {
        Some(lines) => {
            route_expense::Entity::delete_many()
                .filter(route_expense::Column::RouteId.eq(existing.id))
                .exec(&txn)
                .await?;
            insert_lines(&txn, existing.id, lines).await?
        }
        None => route_expense::Entity::find()
            .filter(route_expense::Column::RouteId.eq(existing.id))
            .all(&txn)
            .await?,
    };
    let total_expenses: Decimal = lines.iter().map(|l| l.amount).sum();

    let mut active: route::ActiveModel = existing.into();
    if let Some(bus_id) = payload.bus_id {
        active.bus_id = Set(bus_id);
    }
    if let Some(worker_id) = payload.worker_id {
        active.worker_id = Set(worker_id);
    }
    if let Some(date) = payload.route_date {
        active.route_date = Set(date);
    }
    active.start_time = Set(start_time);
    active.end_time = Set(end_time);
    active.total_income = Set(total_income);
    active.total_expenses = Set(total_expenses);
    active.net_income = Set(total_income - total_expenses);
    match transition {
        LockTransition::Lock => active.is_locked = Set(true),
        LockTransition::Unlock => active.is_locked = Set(false),
        LockTransition::Unchanged => {}
    }

    let route = active.update(&txn).await?;
    txn.commit().await?;

    let (action, description) = match transition {
        LockTransition::Lock => (AuditAction::Lock, "Locked route"),
        LockTransition::Unlock => (AuditAction::Unlock, "Unlocked route"),
        LockTransition::Unchanged => (AuditAction::Update, "Updated route"),
    };
    audit::record(state.db.as_ref(), &ctx, AuditEntry::new(action, "route", route.id, description)).await;

    Ok(Json(RouteResponse::new(route, lines)))
}

/// Hard delete, admin only.
pub async fn delete_route(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    ctx.require(Module::Routes, Action::Delete)?;
    route_rules::check_delete(ctx.role)?;

    let route = find_route(&state, id).await?;

    let txn = state.db.begin().await?;
    route_expense::Entity::delete_many()
        .filter(route_expense::Column::RouteId.eq(route.id))
        .exec(&txn)
        .await?;
    route::Entity::delete_by_id(route.id).exec(&txn).await?;
    txn.commit().await?;

    audit::record(
        state.db.as_ref(),
        &ctx,
        AuditEntry::new(AuditAction::Delete, "route", route.id, "Deleted route").with_metadata(
            serde_json::json!({
                "bus_id": route.bus_id,
                "route_date": route.route_date,
                "was_locked": route.is_locked,
            }),
        ),
    )
    .await;

    Ok(Json(serde_json::json!({ "message": "Route deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn locked_route() -> route::Model {
        route::Model {
            id: Uuid::new_v4(),
            bus_id: Uuid::new_v4(),
            worker_id: Uuid::new_v4(),
            route_date: NaiveDate::from_ymd_opt(2026, 5, 10).unwrap(),
            start_time: None,
            end_time: None,
            total_income: dec!(500000),
            total_expenses: dec!(80000),
            net_income: dec!(420000),
            is_locked: true,
            created_at: Utc::now().into(),
        }
    }

    fn worker_on(bus_id: Uuid) -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            full_name: "Driver".to_string(),
            role: user::UserRole::Worker,
            assigned_bus_id: Some(bus_id),
        }
    }

    fn state(db: sea_orm::DatabaseConnection) -> AppState {
        AppState {
            db: std::sync::Arc::new(db),
            config: crate::tests::config(),
        }
    }

    #[test]
    fn test_income_keeps_two_places() {
        assert!(validate_income(dec!(1500.50)).is_ok());
        assert!(matches!(validate_income(dec!(1500.505)), Err(AppError::BadRequest(_))));
    }

    // The mock has no rows queued for an UPDATE or an audit insert, so any
    // write would surface as an error.
    #[tokio::test]
    async fn test_empty_update_on_locked_route_returns_it_unchanged() {
        let route = locked_route();
        let line = route_expense::Model {
            id: Uuid::new_v4(),
            route_id: route.id,
            name: "FUEL".to_string(),
            amount: dec!(80000),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![route.clone()]])
            .append_query_results([vec![line]])
            .into_connection();
        let payload: UpdateRouteRequest = serde_json::from_value(serde_json::json!({})).unwrap();

        let Json(response) = update_route(
            State(state(db)),
            Extension(worker_on(route.bus_id)),
            Path(route.id),
            Json(payload),
        )
        .await
        .unwrap();

        assert_eq!(response.route, route);
        assert_eq!(response.expenses.len(), 1);
    }

    #[tokio::test]
    async fn test_resending_lock_state_writes_nothing() {
        let route = locked_route();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![route.clone()]])
            .append_query_results([Vec::<route_expense::Model>::new()])
            .into_connection();
        let payload: UpdateRouteRequest =
            serde_json::from_value(serde_json::json!({ "is_locked": true })).unwrap();

        let Json(response) = update_route(
            State(state(db)),
            Extension(worker_on(route.bus_id)),
            Path(route.id),
            Json(payload),
        )
        .await
        .unwrap();

        assert!(response.route.is_locked);
        assert!(response.expenses.is_empty());
    }
}
