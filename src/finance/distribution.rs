use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use uuid::Uuid;

use crate::entities::profit_sharing_member::ShareRole;
use crate::entities::{profit_sharing_group, profit_sharing_member, user};
use crate::error::{AppError, AppResult};
use crate::finance::period::DateRange;
use crate::finance::stats::{load_period_totals, PeriodTotals};

/// A member's claim on the group's profit, as input to [`distribute`].
#[derive(Debug, Clone, PartialEq)]
pub struct Share {
    pub member_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub role_in_share: ShareRole,
    pub percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionLine {
    pub member_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub role_in_share: ShareRole,
    pub percentage: Decimal,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionSummary {
    pub assigned_percentage: Decimal,
    /// `100 - assigned`; negative when the group is over-assigned.
    pub unassigned_percentage: Decimal,
    pub unassigned_amount: Decimal,
    /// Set when members hold more than 100% between them. Reported, never enforced.
    pub over_assigned: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Distribution {
    pub group_id: Uuid,
    pub group_name: String,
    pub bus_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub totals: PeriodTotals,
    pub distribution: Vec<DistributionLine>,
    pub summary: DistributionSummary,
}

/// `net_profit * percentage / 100`, unrounded. Negative profit gives a
/// negative amount.
pub fn share_amount(net_profit: Decimal, percentage: Decimal) -> Decimal {
    net_profit * percentage / Decimal::ONE_HUNDRED
}

/// Split `net_profit` by percentage. Amounts keep full precision; rounding
/// is left to whoever displays them.
pub fn distribute(net_profit: Decimal, shares: Vec<Share>) -> (Vec<DistributionLine>, DistributionSummary) {
    let assigned_percentage: Decimal = shares.iter().map(|s| s.percentage).sum();
    let unassigned_percentage = Decimal::ONE_HUNDRED - assigned_percentage;

    let lines = shares
        .into_iter()
        .map(|s| DistributionLine {
            amount: share_amount(net_profit, s.percentage),
            member_id: s.member_id,
            user_id: s.user_id,
            user_name: s.user_name,
            role_in_share: s.role_in_share,
            percentage: s.percentage,
        })
        .collect();

    let summary = DistributionSummary {
        assigned_percentage,
        unassigned_percentage,
        unassigned_amount: share_amount(net_profit, unassigned_percentage),
        over_assigned: assigned_percentage > Decimal::ONE_HUNDRED,
    };

    (lines, summary)
}

/// Profit distribution of a group over a range. Missing bounds default to
/// the current calendar month.
pub async fn get_profit_distribution(
    db: &DatabaseConnection,
    group_id: Uuid,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> AppResult<Distribution> {
    let range = DateRange::resolve(start_date, end_date, Utc::now().date_naive())?;

    let group = profit_sharing_group::Entity::find_by_id(group_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Profit sharing group not found".to_string()))?;

    let totals = load_period_totals(db, group.bus_id, range).await?;

    let members = profit_sharing_member::Entity::find()
        .filter(profit_sharing_member::Column::GroupId.eq(group.id))
        .filter(profit_sharing_member::Column::IsActive.eq(true))
        .order_by_desc(profit_sharing_member::Column::Percentage)
        .all(db)
        .await?;

    let user_ids: Vec<Uuid> = members.iter().map(|m| m.user_id).collect();
    let names: HashMap<Uuid, String> = user::Entity::find()
        .filter(user::Column::Id.is_in(user_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u.full_name))
        .collect();

    let shares = members
        .into_iter()
        .map(|m| Share {
            member_id: m.id,
            user_id: m.user_id,
            user_name: names.get(&m.user_id).cloned().unwrap_or_default(),
            role_in_share: m.role_in_share,
            percentage: m.percentage,
        })
        .collect();

    let (distribution, summary) = distribute(totals.net_profit, shares);

    if summary.over_assigned {
        tracing::warn!(
            group_id = %group.id,
            assigned = %summary.assigned_percentage,
            "Profit sharing group is assigned more than 100%"
        );
    }

    Ok(Distribution {
        group_id: group.id,
        group_name: group.name,
        bus_id: group.bus_id,
        start_date: range.start,
        end_date: range.end,
        totals,
        distribution,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn share(percentage: Decimal, role: ShareRole) -> Share {
        Share {
            member_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            user_name: "Member".to_string(),
            role_in_share: role,
            percentage,
        }
    }

    #[test]
    fn test_ninety_percent_assigned() {
        let shares = vec![share(dec!(60), ShareRole::Owner), share(dec!(30), ShareRole::Driver)];

        let (lines, summary) = distribute(dec!(1000000), shares);

        assert_eq!(lines[0].amount, dec!(600000));
        assert_eq!(lines[1].amount, dec!(300000));
        assert_eq!(summary.assigned_percentage, dec!(90));
        assert_eq!(summary.unassigned_percentage, dec!(10));
        assert_eq!(summary.unassigned_amount, dec!(100000));
        assert!(!summary.over_assigned);
    }

    #[test]
    fn test_zero_profit_gives_zero_amounts() {
        let shares = vec![share(dec!(75), ShareRole::Owner), share(dec!(25), ShareRole::Partner)];

        let (lines, summary) = distribute(Decimal::ZERO, shares);

        assert!(lines.iter().all(|l| l.amount.is_zero()));
        assert!(summary.unassigned_amount.is_zero());
    }

    #[test]
    fn test_no_members_leaves_everything_unassigned() {
        let (lines, summary) = distribute(dec!(500000), Vec::new());

        assert!(lines.is_empty());
        assert_eq!(summary.assigned_percentage, Decimal::ZERO);
        assert_eq!(summary.unassigned_percentage, dec!(100));
        assert_eq!(summary.unassigned_amount, dec!(500000));
    }

    #[test]
    fn test_over_assignment_is_reported_not_rejected() {
        let shares = vec![share(dec!(70), ShareRole::Owner), share(dec!(40), ShareRole::Driver)];

        let (lines, summary) = distribute(dec!(200000), shares);

        assert_eq!(lines.len(), 2);
        assert_eq!(summary.unassigned_percentage, dec!(-10));
        assert_eq!(summary.unassigned_amount, dec!(-20000));
        assert!(summary.over_assigned);
    }

    #[test]
    fn test_negative_profit_flows_through() {
        let (lines, summary) = distribute(dec!(-100000), vec![share(dec!(50), ShareRole::Owner)]);

        assert_eq!(lines[0].amount, dec!(-50000));
        assert_eq!(summary.unassigned_amount, dec!(-50000));
    }

    #[test]
    fn test_amounts_are_not_rounded() {
        let (lines, _) = distribute(dec!(100), vec![share(dec!(33.33), ShareRole::Partner)]);
        assert_eq!(lines[0].amount, dec!(33.33));

        // Sub-cent shares keep every digit
        let (lines, summary) = distribute(dec!(0.01), vec![share(dec!(33.33), ShareRole::Partner)]);
        assert_eq!(lines[0].amount, dec!(0.003333));
        assert_eq!(summary.unassigned_amount, dec!(0.006667));
    }
}
