use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::{self, AuditEntry};
use crate::entities::audit_log::AuditAction;
use crate::entities::{budget, budget_item, bus, expense_category};
use crate::error::{AppError, AppResult};
use crate::finance::{self, BudgetExecutionSummary};
use crate::middleware::auth::AuthContext;
use crate::permissions::{Action, Module};
use crate::utils::money::ensure_cents;
use crate::utils::pagination::{fetch_page, Page, PageParams};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct BudgetFilter {
    pub bus_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBudgetRequest {
    /// `None` for a fleet-wide budget.
    pub bus_id: Option<Uuid>,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub planned_income: Decimal,
    #[serde(default)]
    pub planned_expenses: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBudgetRequest {
    pub name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub planned_income: Option<Decimal>,
    pub planned_expenses: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub category_id: Uuid,
    pub planned_amount: Decimal,
    #[serde(default)]
    pub committed_amount: Decimal,
    #[serde(default)]
    pub executed_amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub planned_amount: Option<Decimal>,
    pub committed_amount: Option<Decimal>,
    pub executed_amount: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct BudgetDetail {
    #[serde(flatten)]
    pub budget: budget::Model,
    pub items: Vec<budget_item::Model>,
}

fn non_negative(field: &str, value: Decimal) -> AppResult<()> {
    if value < Decimal::ZERO {
        return Err(AppError::BadRequest(format!("{} cannot be negative", field)));
    }
    ensure_cents(field, value)
}

fn validate_period(start: NaiveDate, end: Option<NaiveDate>) -> AppResult<()> {
    match end {
        Some(end) if end < start => Err(AppError::InvalidRange(
            "Budget ends before it starts".to_string(),
        )),
        _ => Ok(()),
    }
}

async fn find_budget(state: &AppState, id: Uuid) -> AppResult<budget::Model> {
    budget::Entity::find_by_id(id)
        .one(state.db.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("Budget not found".to_string()))
}

async fn find_item(state: &AppState, id: Uuid) -> AppResult<budget_item::Model> {
    budget_item::Entity::find_by_id(id)
        .one(state.db.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("Budget item not found".to_string()))
}

pub async fn list_budgets(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(filter): Query<BudgetFilter>,
    Query(page): Query<PageParams>,
) -> AppResult<Json<Page<budget::Model>>> {
    ctx.require(Module::Budgets, Action::View)?;

    let mut query = budget::Entity::find().order_by_desc(budget::Column::StartDate);
    if let Some(bus_id) = filter.bus_id {
        query = query.filter(budget::Column::BusId.eq(bus_id));
    }
    if let Some(active) = filter.is_active {
        query = query.filter(budget::Column::IsActive.eq(active));
    }

    Ok(Json(fetch_page(query, state.db.as_ref(), page).await?))
}

pub async fn get_budget(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BudgetDetail>> {
    ctx.require(Module::Budgets, Action::View)?;

    let budget = find_budget(&state, id).await?;
    let items = budget_item::Entity::find()
        .filter(budget_item::Column::BudgetId.eq(budget.id))
        .all(state.db.as_ref())
        .await?;

    Ok(Json(BudgetDetail { budget, items }))
}

pub async fn create_budget(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<CreateBudgetRequest>,
) -> AppResult<Json<budget::Model>> {
    ctx.require(Module::Budgets, Action::Create)?;

    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("Budget name is required".to_string()));
    }
    validate_period(payload.start_date, payload.end_date)?;
    non_negative("planned_income", payload.planned_income)?;
    non_negative("planned_expenses", payload.planned_expenses)?;

    if let Some(bus_id) = payload.bus_id {
        bus::Entity::find_by_id(bus_id)
            .one(state.db.as_ref())
            .await?
            .ok_or_else(|| AppError::BadRequest("Invalid bus".to_string()))?;
    }

    let budget = budget::ActiveModel {
        id: Set(Uuid::new_v4()),
        bus_id: Set(payload.bus_id),
        name: Set(name),
        start_date: Set(payload.start_date),
        end_date: Set(payload.end_date),
        planned_income: Set(payload.planned_income),
        planned_expenses: Set(payload.planned_expenses),
        is_active: Set(true),
        ..Default::default()
    }
    .insert(state.db.as_ref())
    .await?;

    audit::record(
        state.db.as_ref(),
        &ctx,
        AuditEntry::new(AuditAction::Create, "budget", budget.id, format!("Created budget {}", budget.name)),
    )
    .await;

    Ok(Json(budget))
}

pub async fn update_budget(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateBudgetRequest>,
) -> AppResult<Json<budget::Model>> {
    ctx.require(Module::Budgets, Action::Edit)?;

    let existing = find_budget(&state, id).await?;
    let start = payload.start_date.unwrap_or(existing.start_date);
    let end = payload.end_date.or(existing.end_date);
    validate_period(start, end)?;

    let mut active: budget::ActiveModel = existing.into();
    active.start_date = Set(start);
    active.end_date = Set(end);

    if let Some(name) = payload.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::BadRequest("Budget name is required".to_string()));
        }
        active.name = Set(name);
    }
    if let Some(income) = payload.planned_income {
        non_negative("planned_income", income)?;
        active.planned_income = Set(income);
    }
    if let Some(expenses) = payload.planned_expenses {
        non_negative("planned_expenses", expenses)?;
        active.planned_expenses = Set(expenses);
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }

    let budget = active.update(state.db.as_ref()).await?;

    audit::record(
        state.db.as_ref(),
        &ctx,
        AuditEntry::new(AuditAction::Update, "budget", budget.id, format!("Updated budget {}", budget.name)),
    )
    .await;

    Ok(Json(budget))
}

pub async fn deactivate_budget(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<budget::Model>> {
    ctx.require(Module::Budgets, Action::Delete)?;

    let mut active: budget::ActiveModel = find_budget(&state, id).await?.into();
    active.is_active = Set(false);
    let budget = active.update(state.db.as_ref()).await?;

    audit::record(
        state.db.as_ref(),
        &ctx,
        AuditEntry::new(
            AuditAction::Deactivate,
            "budget",
            budget.id,
            format!("Deactivated budget {}", budget.name),
        ),
    )
    .await;

    Ok(Json(budget))
}

/// Add a category line. A category appears at most once per budget.
pub async fn add_item(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(budget_id): Path<Uuid>,
    Json(payload): Json<CreateItemRequest>,
) -> AppResult<Json<budget_item::Model>> {
    ctx.require(Module::Budgets, Action::Edit)?;

    let budget = find_budget(&state, budget_id).await?;
    non_negative("planned_amount", payload.planned_amount)?;
    non_negative("committed_amount", payload.committed_amount)?;
    non_negative("executed_amount", payload.executed_amount)?;

    let category = expense_category::Entity::find_by_id(payload.category_id)
        .one(state.db.as_ref())
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid expense category".to_string()))?;

    let duplicate = budget_item::Entity::find()
        .filter(budget_item::Column::BudgetId.eq(budget.id))
        .filter(budget_item::Column::CategoryId.eq(category.id))
        .one(state.db.as_ref())
        .await?;
    if duplicate.is_some() {
        return Err(AppError::Conflict(format!(
            "Category {} is already in this budget",
            category.name
        )));
    }

    let item = budget_item::ActiveModel {
        id: Set(Uuid::new_v4()),
        budget_id: Set(budget.id),
        category_id: Set(category.id),
        planned_amount: Set(payload.planned_amount),
        committed_amount: Set(payload.committed_amount),
        executed_amount: Set(payload.executed_amount),
    }
    .insert(state.db.as_ref())
    .await?;

    audit::record(
        state.db.as_ref(),
        &ctx,
        AuditEntry::new(
            AuditAction::Create,
            "budget_item",
            item.id,
            format!("Added {} to budget {}", category.name, budget.name),
        ),
    )
    .await;

    Ok(Json(item))
}

pub async fn update_item(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateItemRequest>,
) -> AppResult<Json<budget_item::Model>> {
    ctx.require(Module::Budgets, Action::Edit)?;

    let mut active: budget_item::ActiveModel = find_item(&state, id).await?.into();

    if let Some(planned) = payload.planned_amount {
        non_negative("planned_amount", planned)?;
        active.planned_amount = Set(planned);
    }
    if let Some(committed) = payload.committed_amount {
        non_negative("committed_amount", committed)?;
        active.committed_amount = Set(committed);
    }
    if let Some(executed) = payload.executed_amount {
        non_negative("executed_amount", executed)?;
        active.executed_amount = Set(executed);
    }

    let item = active.update(state.db.as_ref()).await?;

    audit::record(
        state.db.as_ref(),
        &ctx,
        AuditEntry::new(AuditAction::Update, "budget_item", item.id, "Updated budget item").with_metadata(
            serde_json::json!({
                "planned_amount": item.planned_amount,
                "committed_amount": item.committed_amount,
                "executed_amount": item.executed_amount,
            }),
        ),
    )
    .await;

    Ok(Json(item))
}

pub async fn delete_item(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    ctx.require(Module::Budgets, Action::Delete)?;

    let item = find_item(&state, id).await?;
    budget_item::Entity::delete_by_id(item.id).exec(state.db.as_ref()).await?;

    audit::record(
        state.db.as_ref(),
        &ctx,
        AuditEntry::new(AuditAction::Delete, "budget_item", item.id, "Removed budget item")
            .with_metadata(serde_json::json!({ "budget_id": item.budget_id })),
    )
    .await;

    Ok(Json(serde_json::json!({ "message": "Budget item deleted" })))
}

pub async fn budget_execution(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BudgetExecutionSummary>> {
    ctx.require(Module::Budgets, Action::View)?;

    Ok(Json(finance::get_budget_execution(state.db.as_ref(), id).await?))
}
