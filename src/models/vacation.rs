//! Vacation entitlement periods.
//!
//! Each period has two windows:
//! - the **acquisition** window (12 months of service that earn the entitlement)
//! - the **concession** window (the following 12 months, in which it must be taken)
//!
//! # Lifecycle
//!
//! ```text
//! PENDING ──(acquisition ends)──► AVAILABLE ──schedule──► SCHEDULED ──start──► IN_PROGRESS
//!                                   ▲   │  ◄──cancel_schedule──┘                   │
//!                                   │   └──sell (all days)──► SOLD                  │
//!                                   └────────────complete (days left)───────────────┤
//!                                                                 COMPLETED ◄───────┘
//! PENDING / AVAILABLE ──(concession ends)──► EXPIRED
//! ```

use chrono::{DateTime, Days, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::absence::inclusive_days;

/// Days earned per acquisition window.
pub const ENTITLEMENT_DAYS: i32 = 30;

/// Shortest fraction that can be scheduled at once.
pub const MIN_SCHEDULED_DAYS: i32 = 5;

string_enum! {
    pub enum VacationStatus {
        Pending => "PENDING",
        Available => "AVAILABLE",
        Scheduled => "SCHEDULED",
        InProgress => "IN_PROGRESS",
        Completed => "COMPLETED",
        Expired => "EXPIRED",
        Sold => "SOLD",
    }
}

impl VacationStatus {
    /// Statuses whose remaining days still count towards the balance.
    pub fn counts_towards_balance(&self) -> bool {
        matches!(
            self,
            VacationStatus::Available | VacationStatus::Scheduled | VacationStatus::InProgress
        )
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct VacationPeriod {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub employee_id: Uuid,
    pub acquisition_start: NaiveDate,
    pub acquisition_end: NaiveDate,
    pub concession_start: NaiveDate,
    pub concession_end: NaiveDate,
    pub total_days: i32,
    pub used_days: i32,
    pub sold_days: i32,
    pub scheduled_start: Option<NaiveDate>,
    pub scheduled_end: Option<NaiveDate>,
    pub status: VacationStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

tenant_record!(VacationPeriod);

/// Add whole months, then step back one day: the last day of a window starting at `start`.
fn window_end(start: NaiveDate, months: u32) -> Result<NaiveDate, AppError> {
    start
        .checked_add_months(Months::new(months))
        .and_then(|d| d.checked_sub_days(Days::new(1)))
        .ok_or_else(|| AppError::bad_request("Date out of range"))
}

impl VacationPeriod {
    /// Open a new entitlement period whose acquisition window starts at `acquisition_start`.
    pub fn open(
        tenant_id: Uuid,
        employee_id: Uuid,
        acquisition_start: NaiveDate,
        notes: Option<String>,
        today: NaiveDate,
    ) -> Result<Self, AppError> {
        let acquisition_end = window_end(acquisition_start, 12)?;
        let concession_start = acquisition_end
            .checked_add_days(Days::new(1))
            .ok_or_else(|| AppError::bad_request("Date out of range"))?;
        let concession_end = window_end(concession_start, 12)?;
        let now = Utc::now();

        let mut period = Self {
            id: Uuid::new_v4(),
            tenant_id,
            employee_id,
            acquisition_start,
            acquisition_end,
            concession_start,
            concession_end,
            total_days: ENTITLEMENT_DAYS,
            used_days: 0,
            sold_days: 0,
            scheduled_start: None,
            scheduled_end: None,
            status: VacationStatus::Pending,
            notes,
            created_at: now,
            updated_at: now,
        };
        period.refresh(today);
        Ok(period)
    }

    pub fn remaining_days(&self) -> i32 {
        self.total_days - self.used_days - self.sold_days
    }

    /// Length of the scheduled leave, if any.
    pub fn scheduled_days(&self) -> Option<i32> {
        match (self.scheduled_start, self.scheduled_end) {
            (Some(start), Some(end)) => Some(inclusive_days(start, end)),
            _ => None,
        }
    }

    pub fn schedule(&mut self, start: NaiveDate, end: NaiveDate) -> Result<(), AppError> {
        self.ensure_status(VacationStatus::Available, "scheduled")?;

        if end < start {
            return Err(AppError::bad_request("End date must not be before start date"));
        }

        let days = inclusive_days(start, end);
        if days < MIN_SCHEDULED_DAYS {
            return Err(AppError::BadRequest(format!(
                "Vacation must last at least {MIN_SCHEDULED_DAYS} days"
            )));
        }
        if days > self.remaining_days() {
            return Err(AppError::BadRequest(format!(
                "Only {} vacation days remain in this period",
                self.remaining_days()
            )));
        }
        if start < self.concession_start || start > self.concession_end {
            return Err(AppError::bad_request(
                "Vacation must start inside the concession period",
            ));
        }

        self.scheduled_start = Some(start);
        self.scheduled_end = Some(end);
        self.transition(VacationStatus::Scheduled);
        Ok(())
    }

    pub fn cancel_schedule(&mut self) -> Result<(), AppError> {
        self.ensure_status(VacationStatus::Scheduled, "unscheduled")?;
        self.scheduled_start = None;
        self.scheduled_end = None;
        self.transition(VacationStatus::Available);
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), AppError> {
        self.ensure_status(VacationStatus::Scheduled, "started")?;
        self.transition(VacationStatus::InProgress);
        Ok(())
    }

    /// Close the running leave and book its days as used.
    pub fn complete(&mut self) -> Result<(), AppError> {
        self.ensure_status(VacationStatus::InProgress, "completed")?;

        let days = self.scheduled_days().unwrap_or(0);
        self.used_days += days;
        self.scheduled_start = None;
        self.scheduled_end = None;

        if self.remaining_days() == 0 {
            self.transition(VacationStatus::Completed);
        } else {
            self.transition(VacationStatus::Available);
        }
        Ok(())
    }

    /// Convert up to a third of the entitlement into pay.
    pub fn sell_days(&mut self, days: i32) -> Result<(), AppError> {
        self.ensure_status(VacationStatus::Available, "sold")?;

        if days < 1 {
            return Err(AppError::bad_request("At least one day must be sold"));
        }
        let sell_limit = self.total_days / 3;
        if self.sold_days + days > sell_limit {
            return Err(AppError::BadRequest(format!(
                "At most {sell_limit} days of this period can be sold"
            )));
        }
        if days > self.remaining_days() {
            return Err(AppError::BadRequest(format!(
                "Only {} vacation days remain in this period",
                self.remaining_days()
            )));
        }

        self.sold_days += days;
        if self.remaining_days() == 0 {
            self.transition(VacationStatus::Sold);
        } else {
            self.updated_at = Utc::now();
        }
        Ok(())
    }

    /// Apply date-driven transitions. Returns `true` when the status changed.
    pub fn refresh(&mut self, today: NaiveDate) -> bool {
        let next = match self.status {
            VacationStatus::Pending | VacationStatus::Available if today > self.concession_end => {
                VacationStatus::Expired
            }
            VacationStatus::Pending if today > self.acquisition_end => VacationStatus::Available,
            _ => return false,
        };

        self.transition(next);
        true
    }

    fn ensure_status(&self, expected: VacationStatus, verb: &str) -> Result<(), AppError> {
        if self.status != expected {
            return Err(AppError::BadRequest(format!(
                "Vacation period in status {} cannot be {verb}",
                self.status
            )));
        }
        Ok(())
    }

    fn transition(&mut self, status: VacationStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// Vacation period plus its derived remaining balance.
#[derive(Debug, Serialize)]
pub struct VacationPeriodResponse {
    #[serde(flatten)]
    pub period: VacationPeriod,
    pub remaining_days: i32,
}

impl From<VacationPeriod> for VacationPeriodResponse {
    fn from(period: VacationPeriod) -> Self {
        let remaining_days = period.remaining_days();
        Self {
            period,
            remaining_days,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VacationBalance {
    pub employee_id: Uuid,
    pub available_days: i32,
    pub periods: Vec<VacationPeriodResponse>,
}

impl VacationBalance {
    pub fn compute(employee_id: Uuid, periods: Vec<VacationPeriod>) -> Self {
        let available_days = periods
            .iter()
            .filter(|p| p.status.counts_towards_balance())
            .map(VacationPeriod::remaining_days)
            .sum();

        Self {
            employee_id,
            available_days,
            periods: periods.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateVacationPeriodRequest {
    pub employee_id: Uuid,
    pub acquisition_start: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleVacationRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct SellVacationDaysRequest {
    pub days: i32,
}

/// Outcome of a calendar refresh over the tenant's open periods.
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub updated: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct VacationFilter {
    pub employee_id: Option<Uuid>,
    pub status: Option<VacationStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn available_period() -> VacationPeriod {
        VacationPeriod::open(
            Uuid::new_v4(),
            Uuid::new_v4(),
            date(2023, 3, 1),
            None,
            date(2024, 3, 10),
        )
        .unwrap()
    }

    #[test]
    fn windows_span_twelve_months_each() {
        let p = available_period();
        assert_eq!(p.acquisition_end, date(2024, 2, 29));
        assert_eq!(p.concession_start, date(2024, 3, 1));
        assert_eq!(p.concession_end, date(2025, 2, 28));
        assert_eq!(p.status, VacationStatus::Available);
    }

    #[test]
    fn still_acquiring_is_pending() {
        let p = VacationPeriod::open(
            Uuid::new_v4(),
            Uuid::new_v4(),
            date(2024, 1, 1),
            None,
            date(2024, 6, 1),
        )
        .unwrap();
        assert_eq!(p.status, VacationStatus::Pending);
    }

    #[test]
    fn full_cycle_uses_days() {
        let mut p = available_period();
        p.schedule(date(2024, 4, 1), date(2024, 4, 20)).unwrap();
        assert_eq!(p.status, VacationStatus::Scheduled);
        p.start().unwrap();
        p.complete().unwrap();
        assert_eq!(p.used_days, 20);
        assert_eq!(p.remaining_days(), 10);
        assert_eq!(p.status, VacationStatus::Available);

        p.schedule(date(2024, 7, 1), date(2024, 7, 10)).unwrap();
        p.start().unwrap();
        p.complete().unwrap();
        assert_eq!(p.status, VacationStatus::Completed);
    }

    #[test]
    fn schedule_guards() {
        let mut p = available_period();
        assert!(p.schedule(date(2024, 4, 1), date(2024, 4, 3)).is_err());
        assert!(p.schedule(date(2024, 4, 1), date(2024, 5, 10)).is_err());
        assert!(p.schedule(date(2023, 12, 1), date(2023, 12, 10)).is_err());
        assert!(p.schedule(date(2024, 4, 10), date(2024, 4, 1)).is_err());
        assert_eq!(p.status, VacationStatus::Available);
    }

    #[test]
    fn cannot_start_unscheduled() {
        let mut p = available_period();
        assert!(p.start().is_err());
        assert!(p.complete().is_err());
    }

    #[test]
    fn cancel_schedule_restores_availability() {
        let mut p = available_period();
        p.schedule(date(2024, 4, 1), date(2024, 4, 10)).unwrap();
        p.cancel_schedule().unwrap();
        assert_eq!(p.status, VacationStatus::Available);
        assert!(p.scheduled_start.is_none());
    }

    #[test]
    fn selling_limited_to_a_third() {
        let mut p = available_period();
        p.sell_days(6).unwrap();
        assert!(p.sell_days(5).is_err());
        p.sell_days(4).unwrap();
        assert_eq!(p.sold_days, 10);
        assert_eq!(p.remaining_days(), 20);
        assert!(p.sell_days(0).is_err());
    }

    #[test]
    fn refresh_expires_after_concession() {
        let mut p = available_period();
        assert!(!p.refresh(date(2025, 2, 28)));
        assert!(p.refresh(date(2025, 3, 1)));
        assert_eq!(p.status, VacationStatus::Expired);
    }

    #[test]
    fn balance_sums_open_periods_only() {
        let open = available_period();
        let mut expired = available_period();
        expired.refresh(date(2026, 1, 1));
        let mut scheduled = available_period();
        scheduled.schedule(date(2024, 4, 1), date(2024, 4, 10)).unwrap();

        let balance = VacationBalance::compute(open.employee_id, vec![open, expired, scheduled]);
        assert_eq!(balance.available_days, 60);
        assert_eq!(balance.periods.len(), 3);
    }
}
