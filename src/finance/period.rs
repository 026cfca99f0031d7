use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::error::{AppError, AppResult};

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> AppResult<Self> {
        if end < start {
            return Err(AppError::InvalidRange(format!(
                "end date {} is before start date {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    /// First through last day of the given month.
    pub fn month(year: i32, month: u32) -> AppResult<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| AppError::InvalidRange(format!("invalid month {}-{}", year, month)))?;
        let end = last_day_of_month(year, month)
            .ok_or_else(|| AppError::InvalidRange(format!("invalid month {}-{}", year, month)))?;
        Ok(Self { start, end })
    }

    /// Month containing `today`.
    pub fn current_month(today: NaiveDate) -> Self {
        let start = today.with_day(1).unwrap_or(today);
        let end = last_day_of_month(today.year(), today.month()).unwrap_or(today);
        Self { start, end }
    }

    /// Fill missing bounds from the month containing `today`, then validate.
    pub fn resolve(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        today: NaiveDate,
    ) -> AppResult<Self> {
        let month = Self::current_month(today);
        Self::new(start.unwrap_or(month.start), end.unwrap_or(month.end))
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };

    next_month?.pred_opt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_bounds() {
        let range = DateRange::month(2026, 2).unwrap();
        assert_eq!(range.start, date(2026, 2, 1));
        assert_eq!(range.end, date(2026, 2, 28));

        // Leap year
        assert_eq!(DateRange::month(2024, 2).unwrap().end, date(2024, 2, 29));
        assert_eq!(DateRange::month(2026, 12).unwrap().end, date(2026, 12, 31));
    }

    #[test]
    fn test_invalid_month_is_invalid_range() {
        assert!(matches!(DateRange::month(2026, 13), Err(AppError::InvalidRange(_))));
        assert!(matches!(DateRange::month(2026, 0), Err(AppError::InvalidRange(_))));
    }

    #[test]
    fn test_end_before_start_rejected() {
        let err = DateRange::new(date(2026, 3, 10), date(2026, 3, 9)).unwrap_err();
        assert!(matches!(err, AppError::InvalidRange(_)));

        // Single-day range is fine
        assert!(DateRange::new(date(2026, 3, 10), date(2026, 3, 10)).is_ok());
    }

    #[test]
    fn test_resolve_defaults_to_current_month() {
        let today = date(2026, 10, 17);
        let range = DateRange::resolve(None, None, today).unwrap();
        assert_eq!(range, DateRange::month(2026, 10).unwrap());

        let range = DateRange::resolve(Some(date(2026, 10, 5)), None, today).unwrap();
        assert_eq!(range.start, date(2026, 10, 5));
        assert_eq!(range.end, date(2026, 10, 31));
    }

    #[test]
    fn test_resolve_validates_filled_range() {
        let today = date(2026, 10, 17);
        // Start after the default end
        let err = DateRange::resolve(Some(date(2026, 11, 5)), None, today).unwrap_err();
        assert!(matches!(err, AppError::InvalidRange(_)));
    }

    #[test]
    fn test_contains_is_inclusive() {
        let range = DateRange::month(2026, 4).unwrap();
        assert!(range.contains(date(2026, 4, 1)));
        assert!(range.contains(date(2026, 4, 30)));
        assert!(!range.contains(date(2026, 5, 1)));
    }
}
