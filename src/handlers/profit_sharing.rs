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
use crate::entities::profit_sharing_member::ShareRole;
use crate::entities::{bus, profit_sharing_group, profit_sharing_member, user};
use crate::error::{AppError, AppResult};
use crate::finance::{self, Distribution};
use crate::middleware::auth::AuthContext;
use crate::permissions::{Action, Module};
use crate::utils::money::ensure_cents;
use crate::utils::pagination::{fetch_page, Page, PageParams};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct GroupFilter {
    pub bus_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub bus_id: Uuid,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateGroupRequest {
    pub name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    pub role_in_share: ShareRole,
    pub percentage: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMemberRequest {
    pub role_in_share: Option<ShareRole>,
    pub percentage: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct DistributionQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct GroupDetail {
    #[serde(flatten)]
    pub group: profit_sharing_group::Model,
    pub members: Vec<profit_sharing_member::Model>,
    pub assigned_percentage: Decimal,
}

/// A saved member plus the group's allocation after the change. Saving
/// past 100% succeeds with a warning.
#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub member: profit_sharing_member::Model,
    pub assigned_percentage: Decimal,
    pub warning: Option<String>,
}

fn validate_percentage(percentage: Decimal) -> AppResult<()> {
    if percentage <= Decimal::ZERO || percentage > Decimal::ONE_HUNDRED {
        return Err(AppError::BadRequest(
            "Percentage must be greater than 0 and at most 100".to_string(),
        ));
    }
    ensure_cents("Percentage", percentage)
}

fn validate_period(start: NaiveDate, end: Option<NaiveDate>) -> AppResult<()> {
    match end {
        Some(end) if end < start => Err(AppError::InvalidRange(
            "Group ends before it starts".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Reactivating a member must not give the same user a second live share.
fn ensure_single_membership(
    member: &profit_sharing_member::Model,
    active: &[profit_sharing_member::Model],
) -> AppResult<()> {
    if active.iter().any(|m| m.user_id == member.user_id && m.id != member.id) {
        return Err(AppError::Conflict(
            "This user already holds an active share in the group".to_string(),
        ));
    }
    Ok(())
}

fn allocation_warning(assigned: Decimal) -> Option<String> {
    (assigned > Decimal::ONE_HUNDRED)
        .then(|| format!("Members now hold {}% of the profit, more than 100%", assigned))
}

async fn find_group(state: &AppState, id: Uuid) -> AppResult<profit_sharing_group::Model> {
    profit_sharing_group::Entity::find_by_id(id)
        .one(state.db.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("Profit sharing group not found".to_string()))
}

async fn find_member(state: &AppState, id: Uuid) -> AppResult<profit_sharing_member::Model> {
    profit_sharing_member::Entity::find_by_id(id)
        .one(state.db.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("Profit sharing member not found".to_string()))
}

async fn active_members(state: &AppState, group_id: Uuid) -> AppResult<Vec<profit_sharing_member::Model>> {
    Ok(profit_sharing_member::Entity::find()
        .filter(profit_sharing_member::Column::GroupId.eq(group_id))
        .filter(profit_sharing_member::Column::IsActive.eq(true))
        .order_by_desc(profit_sharing_member::Column::Percentage)
        .all(state.db.as_ref())
        .await?)
}

async fn assigned_percentage(state: &AppState, group_id: Uuid) -> AppResult<Decimal> {
    Ok(active_members(state, group_id)
        .await?
        .iter()
        .map(|m| m.percentage)
        .sum())
}

pub async fn list_groups(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(filter): Query<GroupFilter>,
    Query(page): Query<PageParams>,
) -> AppResult<Json<Page<profit_sharing_group::Model>>> {
    ctx.require(Module::ProfitSharing, Action::View)?;

    let mut query = profit_sharing_group::Entity::find().order_by_asc(profit_sharing_group::Column::Name);
    if let Some(bus_id) = filter.bus_id {
        query = query.filter(profit_sharing_group::Column::BusId.eq(bus_id));
    }
    if let Some(active) = filter.is_active {
        query = query.filter(profit_sharing_group::Column::IsActive.eq(active));
    }

    Ok(Json(fetch_page(query, state.db.as_ref(), page).await?))
}

pub async fn get_group(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<GroupDetail>> {
    ctx.require(Module::ProfitSharing, Action::View)?;

    let group = find_group(&state, id).await?;
    let members = active_members(&state, group.id).await?;
    let assigned_percentage = members.iter().map(|m| m.percentage).sum();

    Ok(Json(GroupDetail {
        group,
        members,
        assigned_percentage,
    }))
}

pub async fn create_group(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<CreateGroupRequest>,
) -> AppResult<Json<profit_sharing_group::Model>> {
    ctx.require(Module::ProfitSharing, Action::Create)?;

    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("Group name is required".to_string()));
    }
    validate_period(payload.start_date, payload.end_date)?;

    bus::Entity::find_by_id(payload.bus_id)
        .one(state.db.as_ref())
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid bus".to_string()))?;

    let group = profit_sharing_group::ActiveModel {
        id: Set(Uuid::new_v4()),
        bus_id: Set(payload.bus_id),
        name: Set(name),
        start_date: Set(payload.start_date),
        end_date: Set(payload.end_date),
        is_active: Set(true),
        ..Default::default()
    }
    .insert(state.db.as_ref())
    .await?;

    audit::record(
        state.db.as_ref(),
        &ctx,
        AuditEntry::new(
            AuditAction::Create,
            "profit_sharing_group",
            group.id,
            format!("Created profit sharing group {}", group.name),
        ),
    )
    .await;

    Ok(Json(group))
}

pub async fn update_group(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateGroupRequest>,
) -> AppResult<Json<profit_sharing_group::Model>> {
    ctx.require(Module::ProfitSharing, Action::Edit)?;

    let existing = find_group(&state, id).await?;
    let start = payload.start_date.unwrap_or(existing.start_date);
    let end = payload.end_date.or(existing.end_date);
    validate_period(start, end)?;

    let mut active: profit_sharing_group::ActiveModel = existing.into();
    active.start_date = Set(start);
    active.end_date = Set(end);
    if let Some(name) = payload.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::BadRequest("Group name is required".to_string()));
        }
        active.name = Set(name);
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }

    let group = active.update(state.db.as_ref()).await?;

    audit::record(
        state.db.as_ref(),
        &ctx,
        AuditEntry::new(
            AuditAction::Update,
            "profit_sharing_group",
            group.id,
            format!("Updated profit sharing group {}", group.name),
        ),
    )
    .await;

    Ok(Json(group))
}

pub async fn deactivate_group(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<profit_sharing_group::Model>> {
    ctx.require(Module::ProfitSharing, Action::Delete)?;

    let mut active: profit_sharing_group::ActiveModel = find_group(&state, id).await?.into();
    active.is_active = Set(false);
    let group = active.update(state.db.as_ref()).await?;

    audit::record(
        state.db.as_ref(),
        &ctx,
        AuditEntry::new(
            AuditAction::Deactivate,
            "profit_sharing_group",
            group.id,
            format!("Deactivated profit sharing group {}", group.name),
        ),
    )
    .await;

    Ok(Json(group))
}

pub async fn add_member(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(group_id): Path<Uuid>,
    Json(payload): Json<AddMemberRequest>,
) -> AppResult<Json<MemberResponse>> {
    ctx.require(Module::ProfitSharing, Action::Edit)?;
    validate_percentage(payload.percentage)?;

    let group = find_group(&state, group_id).await?;
    let member_user = user::Entity::find_by_id(payload.user_id)
        .one(state.db.as_ref())
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid user".to_string()))?;

    let existing = active_members(&state, group.id).await?;
    if existing.iter().any(|m| m.user_id == member_user.id) {
        return Err(AppError::Conflict(format!(
            "{} is already a member of this group",
            member_user.full_name
        )));
    }

    let member = profit_sharing_member::ActiveModel {
        id: Set(Uuid::new_v4()),
        group_id: Set(group.id),
        user_id: Set(member_user.id),
        role_in_share: Set(payload.role_in_share),
        percentage: Set(payload.percentage),
        is_active: Set(true),
    }
    .insert(state.db.as_ref())
    .await?;

    let assigned_percentage: Decimal =
        existing.iter().map(|m| m.percentage).sum::<Decimal>() + member.percentage;
    let warning = allocation_warning(assigned_percentage);
    if warning.is_some() {
        tracing::warn!(group_id = %group.id, assigned = %assigned_percentage, "Group over-assigned");
    }

    audit::record(
        state.db.as_ref(),
        &ctx,
        AuditEntry::new(
            AuditAction::Create,
            "profit_sharing_member",
            member.id,
            format!("Added {} to {} with {}%", member_user.full_name, group.name, member.percentage),
        ),
    )
    .await;

    Ok(Json(MemberResponse {
        member,
        assigned_percentage,
        warning,
    }))
}

pub async fn update_member(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateMemberRequest>,
) -> AppResult<Json<MemberResponse>> {
    ctx.require(Module::ProfitSharing, Action::Edit)?;

    let existing = find_member(&state, id).await?;
    let group_id = existing.group_id;
    if payload.is_active == Some(true) && !existing.is_active {
        ensure_single_membership(&existing, &active_members(&state, group_id).await?)?;
    }
    let mut active: profit_sharing_member::ActiveModel = existing.into();

    if let Some(role) = payload.role_in_share {
        active.role_in_share = Set(role);
    }
    if let Some(percentage) = payload.percentage {
        validate_percentage(percentage)?;
        active.percentage = Set(percentage);
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }

    let member = active.update(state.db.as_ref()).await?;
    let assigned_percentage = assigned_percentage(&state, group_id).await?;

    audit::record(
        state.db.as_ref(),
        &ctx,
        AuditEntry::new(
            AuditAction::Update,
            "profit_sharing_member",
            member.id,
            format!("Updated profit share to {}%", member.percentage),
        ),
    )
    .await;

    Ok(Json(MemberResponse {
        member,
        assigned_percentage,
        warning: allocation_warning(assigned_percentage),
    }))
}

/// Members are deactivated so past distributions stay explainable.
pub async fn deactivate_member(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<profit_sharing_member::Model>> {
    ctx.require(Module::ProfitSharing, Action::Delete)?;

    let mut active: profit_sharing_member::ActiveModel = find_member(&state, id).await?.into();
    active.is_active = Set(false);
    let member = active.update(state.db.as_ref()).await?;

    audit::record(
        state.db.as_ref(),
        &ctx,
        AuditEntry::new(
            AuditAction::Deactivate,
            "profit_sharing_member",
            member.id,
            "Removed member from profit sharing group",
        )
        .with_metadata(serde_json::json!({ "group_id": member.group_id })),
    )
    .await;

    Ok(Json(member))
}

pub async fn distribution(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<DistributionQuery>,
) -> AppResult<Json<Distribution>> {
    ctx.require(Module::ProfitSharing, Action::View)?;

    Ok(Json(
        finance::get_profit_distribution(state.db.as_ref(), id, query.start_date, query.end_date).await?,
    ))
}
