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
use crate::entities::invoice;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthContext;
use crate::permissions::{Action, Module};
use crate::utils::money::ensure_cents;
use crate::utils::pagination::{fetch_page, Page, PageParams};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct InvoiceFilter {
    pub provider: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Invoice metadata. The file itself is uploaded to object storage by the
/// client; only its key is stored here.
#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    pub number: String,
    pub provider: String,
    pub issue_date: NaiveDate,
    pub total_amount: Decimal,
    pub file_key: String,
}

pub async fn list_invoices(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(filter): Query<InvoiceFilter>,
    Query(page): Query<PageParams>,
) -> AppResult<Json<Page<invoice::Model>>> {
    ctx.require(Module::Invoices, Action::View)?;

    let mut query = invoice::Entity::find().order_by_desc(invoice::Column::IssueDate);
    if let Some(provider) = filter.provider.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        query = query.filter(invoice::Column::Provider.contains(provider));
    }
    if let Some(start) = filter.start_date {
        query = query.filter(invoice::Column::IssueDate.gte(start));
    }
    if let Some(end) = filter.end_date {
        query = query.filter(invoice::Column::IssueDate.lte(end));
    }

    Ok(Json(fetch_page(query, state.db.as_ref(), page).await?))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<invoice::Model>> {
    ctx.require(Module::Invoices, Action::View)?;

    let invoice = invoice::Entity::find_by_id(id)
        .one(state.db.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("Invoice not found".to_string()))?;

    Ok(Json(invoice))
}

pub async fn create_invoice(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<CreateInvoiceRequest>,
) -> AppResult<Json<invoice::Model>> {
    ctx.require(Module::Invoices, Action::Create)?;

    let number = payload.number.trim().to_string();
    let provider = payload.provider.trim().to_string();
    let file_key = payload.file_key.trim().to_string();
    if number.is_empty() || provider.is_empty() || file_key.is_empty() {
        return Err(AppError::BadRequest(
            "Number, provider and file key are required".to_string(),
        ));
    }
    if payload.total_amount < Decimal::ZERO {
        return Err(AppError::BadRequest("Total amount cannot be negative".to_string()));
    }
    ensure_cents("Total amount", payload.total_amount)?;

    let invoice = invoice::ActiveModel {
        id: Set(Uuid::new_v4()),
        number: Set(number),
        provider: Set(provider),
        issue_date: Set(payload.issue_date),
        total_amount: Set(payload.total_amount),
        file_key: Set(file_key),
        ..Default::default()
    }
    .insert(state.db.as_ref())
    .await?;

    audit::record(
        state.db.as_ref(),
        &ctx,
        AuditEntry::new(
            AuditAction::Create,
            "invoice",
            invoice.id,
            format!("Registered invoice {} from {}", invoice.number, invoice.provider),
        ),
    )
    .await;

    Ok(Json(invoice))
}
