//! Employee records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

string_enum! {
    pub enum EmployeeStatus {
        Active => "ACTIVE",
        OnLeave => "ON_LEAVE",
        Terminated => "TERMINATED",
    }
}

/// Represents an employee record from the database.
///
/// Salaries are stored as `i64` cents, like every other amount in this crate.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Employee {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    /// Company-issued registration number, unique per tenant.
    pub registration_number: String,
    pub full_name: String,
    pub email: Option<String>,
    pub position: Option<String>,
    pub department: Option<String>,
    pub hire_date: NaiveDate,
    pub base_salary_cents: i64,
    pub status: EmployeeStatus,
    pub termination_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

tenant_record!(Employee);

impl Employee {
    /// Active and on-leave employees are on the payroll.
    pub fn is_employed(&self) -> bool {
        self.status != EmployeeStatus::Terminated
    }

    /// End the employment relationship.
    pub fn terminate(&mut self, date: NaiveDate) -> Result<(), AppError> {
        if self.status == EmployeeStatus::Terminated {
            return Err(AppError::bad_request("Employee is already terminated"));
        }
        if date < self.hire_date {
            return Err(AppError::bad_request(
                "Termination date cannot be before the hire date",
            ));
        }

        self.status = EmployeeStatus::Terminated;
        self.termination_date = Some(date);
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Request body for creating an employee.
///
/// # JSON Example
///
/// ```json
/// {
///   "registration_number": "EMP-0042",
///   "full_name": "Dana Reyes",
///   "hire_date": "2024-03-01",
///   "base_salary_cents": 450000
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateEmployeeRequest {
    pub registration_number: String,
    pub full_name: String,
    pub email: Option<String>,
    pub position: Option<String>,
    pub department: Option<String>,
    pub hire_date: NaiveDate,
    pub base_salary_cents: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEmployeeRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub position: Option<String>,
    pub department: Option<String>,
    pub base_salary_cents: Option<i64>,
    /// Only ACTIVE and ON_LEAVE can be set here; termination has its own operation.
    pub status: Option<EmployeeStatus>,
}

#[derive(Debug, Deserialize)]
pub struct TerminateEmployeeRequest {
    pub termination_date: NaiveDate,
}

#[derive(Debug, Default, Deserialize)]
pub struct EmployeeFilter {
    pub status: Option<EmployeeStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee() -> Employee {
        let now = Utc::now();
        Employee {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            registration_number: "EMP-1".into(),
            full_name: "Dana Reyes".into(),
            email: None,
            position: None,
            department: None,
            hire_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            base_salary_cents: 450_000,
            status: EmployeeStatus::Active,
            termination_date: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn terminate_sets_status_and_date() {
        let mut e = employee();
        let date = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        e.terminate(date).unwrap();
        assert_eq!(e.status, EmployeeStatus::Terminated);
        assert_eq!(e.termination_date, Some(date));
        assert!(!e.is_employed());
    }

    #[test]
    fn terminate_twice_fails() {
        let mut e = employee();
        let date = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        e.terminate(date).unwrap();
        assert!(e.terminate(date).is_err());
    }

    #[test]
    fn terminate_before_hire_fails() {
        let mut e = employee();
        assert!(e
            .terminate(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap())
            .is_err());
    }

    #[test]
    fn status_round_trips_through_text() {
        assert_eq!("ON_LEAVE".parse::<EmployeeStatus>().unwrap(), EmployeeStatus::OnLeave);
        assert!("FIRED".parse::<EmployeeStatus>().is_err());
    }
}
