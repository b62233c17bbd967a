//! Employee absences and the absence type value object.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

string_enum! {
    /// Why an employee is away.
    pub enum AbsenceType {
        Vacation => "VACATION",
        SickLeave => "SICK_LEAVE",
        PersonalLeave => "PERSONAL_LEAVE",
        MaternityLeave => "MATERNITY_LEAVE",
        PaternityLeave => "PATERNITY_LEAVE",
        Bereavement => "BEREAVEMENT",
        Wedding => "WEDDING",
        JuryDuty => "JURY_DUTY",
        UnpaidLeave => "UNPAID_LEAVE",
        Other => "OTHER",
    }
}

impl AbsenceType {
    pub fn is_paid(&self) -> bool {
        *self != AbsenceType::UnpaidLeave
    }

    /// Types that must be backed by a supporting document (medical certificate, court summons, ...).
    pub fn requires_document(&self) -> bool {
        matches!(
            self,
            AbsenceType::SickLeave
                | AbsenceType::MaternityLeave
                | AbsenceType::PaternityLeave
                | AbsenceType::Bereavement
                | AbsenceType::JuryDuty
        )
    }

    pub fn is_vacation(&self) -> bool {
        *self == AbsenceType::Vacation
    }
}

string_enum! {
    pub enum AbsenceStatus {
        Pending => "PENDING",
        Approved => "APPROVED",
        Rejected => "REJECTED",
        Cancelled => "CANCELLED",
    }
}

impl AbsenceStatus {
    /// Statuses that block the employee's calendar.
    pub fn is_blocking(&self) -> bool {
        matches!(self, AbsenceStatus::Pending | AbsenceStatus::Approved)
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Absence {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub employee_id: Uuid,
    pub absence_type: AbsenceType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Calendar days, both ends inclusive.
    pub total_days: i32,
    pub reason: Option<String>,
    pub document_url: Option<String>,
    pub status: AbsenceStatus,
    /// User who filed the request; notified when it is reviewed.
    pub requested_by: Uuid,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

tenant_record!(Absence);

/// Inclusive day count between two dates.
pub fn inclusive_days(start: NaiveDate, end: NaiveDate) -> i32 {
    (end - start).num_days() as i32 + 1
}

impl Absence {
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date <= end && start <= self.end_date
    }

    pub fn approve(&mut self, reviewer: Uuid) -> Result<(), AppError> {
        self.ensure_pending("approved")?;
        self.status = AbsenceStatus::Approved;
        self.mark_reviewed(reviewer);
        Ok(())
    }

    pub fn reject(&mut self, reviewer: Uuid, reason: String) -> Result<(), AppError> {
        self.ensure_pending("rejected")?;
        if reason.trim().is_empty() {
            return Err(AppError::bad_request("A rejection reason is required"));
        }
        self.status = AbsenceStatus::Rejected;
        self.rejection_reason = Some(reason);
        self.mark_reviewed(reviewer);
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), AppError> {
        if !self.status.is_blocking() {
            return Err(AppError::BadRequest(format!(
                "Absence in status {} cannot be cancelled",
                self.status
            )));
        }
        self.status = AbsenceStatus::Cancelled;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn ensure_pending(&self, verb: &str) -> Result<(), AppError> {
        if self.status != AbsenceStatus::Pending {
            return Err(AppError::BadRequest(format!(
                "Only pending absences can be {verb}"
            )));
        }
        Ok(())
    }

    fn mark_reviewed(&mut self, reviewer: Uuid) {
        let now = Utc::now();
        self.reviewed_by = Some(reviewer);
        self.reviewed_at = Some(now);
        self.updated_at = now;
    }
}

/// Request body for filing an absence.
///
/// # JSON Example
///
/// ```json
/// {
///   "employee_id": "550e8400-e29b-41d4-a716-446655440000",
///   "absence_type": "SICK_LEAVE",
///   "start_date": "2025-02-03",
///   "end_date": "2025-02-05",
///   "document_url": "/files/tenant/absences/certificate.pdf"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct RequestAbsenceRequest {
    pub employee_id: Uuid,
    pub absence_type: AbsenceType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
    pub document_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectAbsenceRequest {
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AbsenceFilter {
    pub employee_id: Option<Uuid>,
    pub status: Option<AbsenceStatus>,
    pub absence_type: Option<AbsenceType>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn absence(status: AbsenceStatus) -> Absence {
        let now = Utc::now();
        Absence {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            employee_id: Uuid::new_v4(),
            absence_type: AbsenceType::PersonalLeave,
            start_date: date(2025, 2, 3),
            end_date: date(2025, 2, 5),
            total_days: 3,
            reason: None,
            document_url: None,
            status,
            requested_by: Uuid::new_v4(),
            reviewed_by: None,
            reviewed_at: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn absence_type_predicates() {
        assert!(AbsenceType::SickLeave.requires_document());
        assert!(!AbsenceType::Wedding.requires_document());
        assert!(!AbsenceType::UnpaidLeave.is_paid());
        assert!(AbsenceType::Vacation.is_paid());
        assert!(AbsenceType::Vacation.is_vacation());
    }

    #[test]
    fn inclusive_day_count() {
        assert_eq!(inclusive_days(date(2025, 2, 3), date(2025, 2, 3)), 1);
        assert_eq!(inclusive_days(date(2025, 2, 27), date(2025, 3, 2)), 4);
    }

    #[test]
    fn overlap_is_inclusive() {
        let a = absence(AbsenceStatus::Pending);
        assert!(a.overlaps(date(2025, 2, 5), date(2025, 2, 9)));
        assert!(a.overlaps(date(2025, 1, 30), date(2025, 2, 3)));
        assert!(!a.overlaps(date(2025, 2, 6), date(2025, 2, 9)));
    }

    #[test]
    fn review_only_from_pending() {
        let reviewer = Uuid::new_v4();
        let mut a = absence(AbsenceStatus::Pending);
        a.approve(reviewer).unwrap();
        assert_eq!(a.status, AbsenceStatus::Approved);
        assert_eq!(a.reviewed_by, Some(reviewer));
        assert!(a.approve(reviewer).is_err());
        assert!(a.reject(reviewer, "late".into()).is_err());
    }

    #[test]
    fn reject_requires_reason() {
        let mut a = absence(AbsenceStatus::Pending);
        assert!(a.reject(Uuid::new_v4(), "  ".into()).is_err());
        assert_eq!(a.status, AbsenceStatus::Pending);
    }

    #[test]
    fn cancel_from_approved_but_not_rejected() {
        let mut approved = absence(AbsenceStatus::Approved);
        approved.cancel().unwrap();
        assert_eq!(approved.status, AbsenceStatus::Cancelled);

        let mut rejected = absence(AbsenceStatus::Rejected);
        assert!(rejected.cancel().is_err());
    }
}
