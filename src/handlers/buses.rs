use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Deserialize;
use uuid::Uuid;

use crate::audit::{self, AuditEntry};
use crate::entities::audit_log::AuditAction;
use crate::entities::bus;
use crate::error::{AppError, AppResult};
use crate::finance::{self, MonthlyStats};
use crate::middleware::auth::AuthContext;
use crate::permissions::{Action, Module};
use crate::utils::money::ensure_cents;
use crate::utils::pagination::{fetch_page, Page, PageParams};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct BusFilter {
    pub is_active: Option<bool>,
    /// Matches code or plate, case-insensitive.
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBusRequest {
    pub code: String,
    pub plate: String,
    pub monthly_target: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBusRequest {
    pub code: Option<String>,
    pub plate: Option<String>,
    pub monthly_target: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

pub(crate) async fn find_bus(state: &AppState, id: Uuid) -> AppResult<bus::Model> {
    bus::Entity::find_by_id(id)
        .one(state.db.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("Bus not found".to_string()))
}

fn validate_target(target: Decimal) -> AppResult<()> {
    if target < Decimal::ZERO {
        return Err(AppError::BadRequest("Monthly target cannot be negative".to_string()));
    }
    ensure_cents("Monthly target", target)
}

async fn ensure_unique(state: &AppState, code: &str, plate: &str, except: Option<Uuid>) -> AppResult<()> {
    let mut query = bus::Entity::find().filter(
        Condition::any()
            .add(bus::Column::Code.eq(code))
            .add(bus::Column::Plate.eq(plate)),
    );
    if let Some(id) = except {
        query = query.filter(bus::Column::Id.ne(id));
    }

    if query.one(state.db.as_ref()).await?.is_some() {
        return Err(AppError::Conflict("Bus code or plate already registered".to_string()));
    }
    Ok(())
}

/// List buses. Workers only see their assigned bus.
pub async fn list_buses(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(filter): Query<BusFilter>,
    Query(page): Query<PageParams>,
) -> AppResult<Json<Page<bus::Model>>> {
    ctx.require(Module::Buses, Action::View)?;

    let mut query = bus::Entity::find().order_by_asc(bus::Column::Code);

    if let Some(bus_id) = ctx.bus_scope()? {
        query = query.filter(bus::Column::Id.eq(bus_id));
    }
    if let Some(active) = filter.is_active {
        query = query.filter(bus::Column::IsActive.eq(active));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search.to_uppercase());
        query = query.filter(
            Condition::any()
                .add(bus::Column::Code.like(pattern.clone()))
                .add(bus::Column::Plate.like(pattern)),
        );
    }

    Ok(Json(fetch_page(query, state.db.as_ref(), page).await?))
}

pub async fn get_bus(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<bus::Model>> {
    ctx.require(Module::Buses, Action::View)?;
    ctx.ensure_bus_access(id)?;

    Ok(Json(find_bus(&state, id).await?))
}

pub async fn create_bus(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<CreateBusRequest>,
) -> AppResult<Json<bus::Model>> {
    ctx.require(Module::Buses, Action::Create)?;

    let code = payload.code.trim().to_uppercase();
    let plate = payload.plate.trim().to_uppercase();
    if code.is_empty() || plate.is_empty() {
        return Err(AppError::BadRequest("Code and plate are required".to_string()));
    }
    let monthly_target = payload.monthly_target.unwrap_or(Decimal::ZERO);
    validate_target(monthly_target)?;
    ensure_unique(&state, &code, &plate, None).await?;

    let bus = bus::ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set(code),
        plate: Set(plate),
        monthly_target: Set(monthly_target),
        is_active: Set(true),
        ..Default::default()
    }
    .insert(state.db.as_ref())
    .await?;

    audit::record(
        state.db.as_ref(),
        &ctx,
        AuditEntry::new(AuditAction::Create, "bus", bus.id, format!("Created bus {}", bus.code)),
    )
    .await;

    Ok(Json(bus))
}

pub async fn update_bus(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateBusRequest>,
) -> AppResult<Json<bus::Model>> {
    ctx.require(Module::Buses, Action::Edit)?;

    let existing = find_bus(&state, id).await?;

    let code = payload.code.map(|c| c.trim().to_uppercase()).unwrap_or_else(|| existing.code.clone());
    let plate = payload.plate.map(|p| p.trim().to_uppercase()).unwrap_or_else(|| existing.plate.clone());
    if code != existing.code || plate != existing.plate {
        ensure_unique(&state, &code, &plate, Some(id)).await?;
    }

    let mut active: bus::ActiveModel = existing.into();
    active.code = Set(code);
    active.plate = Set(plate);

    if let Some(target) = payload.monthly_target {
        validate_target(target)?;
        active.monthly_target = Set(target);
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }

    let bus = active.update(state.db.as_ref()).await?;

    audit::record(
        state.db.as_ref(),
        &ctx,
        AuditEntry::new(AuditAction::Update, "bus", bus.id, format!("Updated bus {}", bus.code)),
    )
    .await;

    Ok(Json(bus))
}

/// Soft-delete: buses own financial history and are never removed.
pub async fn deactivate_bus(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<bus::Model>> {
    ctx.require(Module::Buses, Action::Delete)?;

    let mut active: bus::ActiveModel = find_bus(&state, id).await?.into();
    active.is_active = Set(false);
    let bus = active.update(state.db.as_ref()).await?;

    audit::record(
        state.db.as_ref(),
        &ctx,
        AuditEntry::new(AuditAction::Deactivate, "bus", bus.id, format!("Deactivated bus {}", bus.code)),
    )
    .await;

    Ok(Json(bus))
}

/// Monthly profit stats. Defaults to the current month.
pub async fn monthly_stats(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<StatsQuery>,
) -> AppResult<Json<MonthlyStats>> {
    ctx.require(Module::Reports, Action::View)?;
    ctx.ensure_bus_access(id)?;

    let today = Utc::now().date_naive();
    let year = query.year.unwrap_or(today.year());
    let month = query.month.unwrap_or(today.month());

    Ok(Json(finance::get_monthly_stats(state.db.as_ref(), id, year, month).await?))
}
