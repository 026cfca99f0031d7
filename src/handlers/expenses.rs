use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Deserialize;
use uuid::Uuid;

use crate::audit::{self, AuditEntry};
use crate::entities::audit_log::AuditAction;
use crate::entities::{bus, expense, expense_category, invoice};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthContext;
use crate::permissions::{Action, Module};
use crate::utils::money::ensure_cents;
use crate::utils::pagination::{fetch_page, Page, PageParams};
use crate::AppState;

// ----- Expense categories -----

#[derive(Debug, Deserialize)]
pub struct CategoryFilter {
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

async fn find_category(state: &AppState, id: Uuid) -> AppResult<expense_category::Model> {
    expense_category::Entity::find_by_id(id)
        .one(state.db.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("Expense category not found".to_string()))
}

fn category_name(raw: &str) -> AppResult<String> {
    let name = raw.trim().to_uppercase();
    if name.is_empty() {
        return Err(AppError::BadRequest("Category name is required".to_string()));
    }
    Ok(name)
}

async fn ensure_category_name_free(state: &AppState, name: &str, except: Option<Uuid>) -> AppResult<()> {
    let mut query = expense_category::Entity::find().filter(expense_category::Column::Name.eq(name));
    if let Some(id) = except {
        query = query.filter(expense_category::Column::Id.ne(id));
    }
    if query.one(state.db.as_ref()).await?.is_some() {
        return Err(AppError::Conflict(format!("Category {} already exists", name)));
    }
    Ok(())
}

pub async fn list_categories(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(filter): Query<CategoryFilter>,
    Query(page): Query<PageParams>,
) -> AppResult<Json<Page<expense_category::Model>>> {
    ctx.require(Module::ExpenseCategories, Action::View)?;

    let mut query = expense_category::Entity::find().order_by_asc(expense_category::Column::Name);
    if let Some(active) = filter.is_active {
        query = query.filter(expense_category::Column::IsActive.eq(active));
    }

    Ok(Json(fetch_page(query, state.db.as_ref(), page).await?))
}

pub async fn create_category(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<CreateCategoryRequest>,
) -> AppResult<Json<expense_category::Model>> {
    ctx.require(Module::ExpenseCategories, Action::Create)?;

    let name = category_name(&payload.name)?;
    ensure_category_name_free(&state, &name, None).await?;

    let category = expense_category::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        description: Set(payload.description),
        is_active: Set(true),
    }
    .insert(state.db.as_ref())
    .await?;

    audit::record(
        state.db.as_ref(),
        &ctx,
        AuditEntry::new(
            AuditAction::Create,
            "expense_category",
            category.id,
            format!("Created expense category {}", category.name),
        ),
    )
    .await;

    Ok(Json(category))
}

pub async fn update_category(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> AppResult<Json<expense_category::Model>> {
    ctx.require(Module::ExpenseCategories, Action::Edit)?;

    let existing = find_category(&state, id).await?;
    let mut active: expense_category::ActiveModel = existing.into();

    if let Some(raw) = payload.name {
        let name = category_name(&raw)?;
        ensure_category_name_free(&state, &name, Some(id)).await?;
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }

    let category = active.update(state.db.as_ref()).await?;

    audit::record(
        state.db.as_ref(),
        &ctx,
        AuditEntry::new(
            AuditAction::Update,
            "expense_category",
            category.id,
            format!("Updated expense category {}", category.name),
        ),
    )
    .await;

    Ok(Json(category))
}

/// Categories are referenced by expenses and budget items, so they are only
/// ever deactivated.
pub async fn deactivate_category(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<expense_category::Model>> {
    ctx.require(Module::ExpenseCategories, Action::Delete)?;

    let mut active: expense_category::ActiveModel = find_category(&state, id).await?.into();
    active.is_active = Set(false);
    let category = active.update(state.db.as_ref()).await?;

    audit::record(
        state.db.as_ref(),
        &ctx,
        AuditEntry::new(
            AuditAction::Deactivate,
            "expense_category",
            category.id,
            format!("Deactivated expense category {}", category.name),
        ),
    )
    .await;

    Ok(Json(category))
}

// ----- Administrative expenses -----

#[derive(Debug, Deserialize)]
pub struct ExpenseFilter {
    pub bus_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct CreateExpenseRequest {
    pub bus_id: Uuid,
    pub category_id: Uuid,
    pub amount: Decimal,
    pub expense_date: NaiveDate,
    pub description: Option<String>,
    pub invoice_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateExpenseRequest {
    pub category_id: Option<Uuid>,
    pub amount: Option<Decimal>,
    pub expense_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub invoice_id: Option<Uuid>,
}

fn validate_amount(amount: Decimal) -> AppResult<()> {
    if amount < Decimal::ZERO {
        return Err(AppError::BadRequest("Amount cannot be negative".to_string()));
    }
    ensure_cents("Amount", amount)
}

async fn find_expense(state: &AppState, id: Uuid) -> AppResult<expense::Model> {
    expense::Entity::find_by_id(id)
        .one(state.db.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("Expense not found".to_string()))
}

/// Expenses may only be booked against an active category.
async fn ensure_active_category(state: &AppState, id: Uuid) -> AppResult<()> {
    let category = expense_category::Entity::find_by_id(id)
        .one(state.db.as_ref())
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid expense category".to_string()))?;
    if !category.is_active {
        return Err(AppError::BadRequest(format!("Category {} is inactive", category.name)));
    }
    Ok(())
}

async fn ensure_invoice(state: &AppState, id: Uuid) -> AppResult<()> {
    invoice::Entity::find_by_id(id)
        .one(state.db.as_ref())
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid invoice".to_string()))?;
    Ok(())
}

pub async fn list_expenses(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(filter): Query<ExpenseFilter>,
    Query(page): Query<PageParams>,
) -> AppResult<Json<Page<expense::Model>>> {
    ctx.require(Module::Expenses, Action::View)?;

    let mut query = expense::Entity::find()
        .order_by_desc(expense::Column::ExpenseDate)
        .order_by_desc(expense::Column::CreatedAt);

    match (ctx.bus_scope()?, filter.bus_id) {
        (Some(scoped), Some(requested)) if scoped != requested => {
            return Err(AppError::Forbidden("You do not have access to this bus".to_string()));
        }
        (Some(bus_id), _) | (None, Some(bus_id)) => {
            query = query.filter(expense::Column::BusId.eq(bus_id));
        }
        (None, None) => {}
    }
    if let Some(category_id) = filter.category_id {
        query = query.filter(expense::Column::CategoryId.eq(category_id));
    }
    if let (Some(start), Some(end)) = (filter.start_date, filter.end_date) {
        if end < start {
            return Err(AppError::InvalidRange("end_date is before start_date".to_string()));
        }
    }
    if let Some(start) = filter.start_date {
        query = query.filter(expense::Column::ExpenseDate.gte(start));
    }
    if let Some(end) = filter.end_date {
        query = query.filter(expense::Column::ExpenseDate.lte(end));
    }

    Ok(Json(fetch_page(query, state.db.as_ref(), page).await?))
}

pub async fn create_expense(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<CreateExpenseRequest>,
) -> AppResult<Json<expense::Model>> {
    ctx.require(Module::Expenses, Action::Create)?;
    ctx.ensure_bus_access(payload.bus_id)?;
    validate_amount(payload.amount)?;

    bus::Entity::find_by_id(payload.bus_id)
        .one(state.db.as_ref())
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid bus".to_string()))?;
    ensure_active_category(&state, payload.category_id).await?;
    if let Some(invoice_id) = payload.invoice_id {
        ensure_invoice(&state, invoice_id).await?;
    }

    let expense = expense::ActiveModel {
        id: Set(Uuid::new_v4()),
        bus_id: Set(payload.bus_id),
        category_id: Set(payload.category_id),
        amount: Set(payload.amount),
        expense_date: Set(payload.expense_date),
        description: Set(payload.description),
        invoice_id: Set(payload.invoice_id),
        ..Default::default()
    }
    .insert(state.db.as_ref())
    .await?;

    audit::record(
        state.db.as_ref(),
        &ctx,
        AuditEntry::new(
            AuditAction::Create,
            "expense",
            expense.id,
            format!("Registered expense of {}", expense.amount),
        )
        .with_metadata(serde_json::json!({ "bus_id": expense.bus_id })),
    )
    .await;

    Ok(Json(expense))
}

pub async fn update_expense(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateExpenseRequest>,
) -> AppResult<Json<expense::Model>> {
    ctx.require(Module::Expenses, Action::Edit)?;

    let existing = find_expense(&state, id).await?;
    let mut active: expense::ActiveModel = existing.into();

    if let Some(category_id) = payload.category_id {
        ensure_active_category(&state, category_id).await?;
        active.category_id = Set(category_id);
    }
    if let Some(amount) = payload.amount {
        validate_amount(amount)?;
        active.amount = Set(amount);
    }
    if let Some(date) = payload.expense_date {
        active.expense_date = Set(date);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(invoice_id) = payload.invoice_id {
        ensure_invoice(&state, invoice_id).await?;
        active.invoice_id = Set(Some(invoice_id));
    }

    let expense = active.update(state.db.as_ref()).await?;

    audit::record(
        state.db.as_ref(),
        &ctx,
        AuditEntry::new(AuditAction::Update, "expense", expense.id, "Updated expense"),
    )
    .await;

    Ok(Json(expense))
}

pub async fn delete_expense(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    ctx.require(Module::Expenses, Action::Delete)?;

    let expense = find_expense(&state, id).await?;
    expense::Entity::delete_by_id(expense.id).exec(state.db.as_ref()).await?;

    audit::record(
        state.db.as_ref(),
        &ctx,
        AuditEntry::new(
            AuditAction::Delete,
            "expense",
            expense.id,
            format!("Deleted expense of {}", expense.amount),
        )
        .with_metadata(serde_json::json!({
            "bus_id": expense.bus_id,
            "expense_date": expense.expense_date,
        })),
    )
    .await;

    Ok(Json(serde_json::json!({ "message": "Expense deleted" })))
}
