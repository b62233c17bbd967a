//! Accounts payable and receivable.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

string_enum! {
    pub enum EntryType {
        Payable => "PAYABLE",
        Receivable => "RECEIVABLE",
    }
}

string_enum! {
    pub enum EntryStatus {
        Pending => "PENDING",
        PartiallyPaid => "PARTIALLY_PAID",
        Paid => "PAID",
        Overdue => "OVERDUE",
        Cancelled => "CANCELLED",
    }
}

impl EntryStatus {
    /// Statuses that still expect money to move.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            EntryStatus::Pending | EntryStatus::PartiallyPaid | EntryStatus::Overdue
        )
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FinanceEntry {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub entry_type: EntryType,
    pub description: String,
    pub category: Option<String>,
    pub counterparty: Option<String>,
    pub amount_cents: i64,
    pub paid_amount_cents: i64,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: EntryStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

tenant_record!(FinanceEntry);

impl FinanceEntry {
    pub fn new(tenant_id: Uuid, request: CreateFinanceEntryRequest) -> Result<Self, AppError> {
        crate::money::ensure_positive("Amount", request.amount_cents)?;
        if request.description.trim().is_empty() {
            return Err(AppError::bad_request("Description is required"));
        }
        if request.due_date < request.issue_date {
            return Err(AppError::bad_request(
                "Due date cannot be before the issue date",
            ));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            tenant_id,
            entry_type: request.entry_type,
            description: request.description,
            category: request.category,
            counterparty: request.counterparty,
            amount_cents: request.amount_cents,
            paid_amount_cents: 0,
            issue_date: request.issue_date,
            due_date: request.due_date,
            status: EntryStatus::Pending,
            paid_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    pub fn open_amount_cents(&self) -> i64 {
        self.amount_cents - self.paid_amount_cents
    }

    pub fn register_payment(&mut self, amount_cents: i64) -> Result<(), AppError> {
        if !self.status.is_open() {
            return Err(AppError::BadRequest(format!(
                "Entry in status {} cannot receive payments",
                self.status
            )));
        }
        if amount_cents <= 0 {
            return Err(AppError::bad_request("Payment amount must be positive"));
        }
        if amount_cents > self.open_amount_cents() {
            return Err(AppError::BadRequest(format!(
                "Payment exceeds the open amount of {} cents",
                self.open_amount_cents()
            )));
        }

        let now = Utc::now();
        self.paid_amount_cents += amount_cents;
        if self.open_amount_cents() == 0 {
            self.status = EntryStatus::Paid;
            self.paid_at = Some(now);
        } else if self.status == EntryStatus::Pending {
            self.status = EntryStatus::PartiallyPaid;
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), AppError> {
        if !self.status.is_open() {
            return Err(AppError::BadRequest(format!(
                "Entry in status {} cannot be cancelled",
                self.status
            )));
        }
        if self.paid_amount_cents > 0 {
            return Err(AppError::bad_request(
                "Entries with registered payments cannot be cancelled",
            ));
        }
        self.status = EntryStatus::Cancelled;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Flag as overdue when past due. Returns whether the status changed.
    pub fn mark_overdue(&mut self, today: NaiveDate) -> bool {
        let eligible = matches!(
            self.status,
            EntryStatus::Pending | EntryStatus::PartiallyPaid
        );
        if eligible && self.due_date < today {
            self.status = EntryStatus::Overdue;
            self.updated_at = Utc::now();
            return true;
        }
        false
    }
}

/// Totals for entries due inside a date window.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct FinanceSummary {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub receivable_total_cents: i64,
    pub receivable_paid_cents: i64,
    pub receivable_open_cents: i64,
    pub payable_total_cents: i64,
    pub payable_paid_cents: i64,
    pub payable_open_cents: i64,
    pub overdue_count: u64,
    /// Receivable minus payable, over the full amounts.
    pub net_balance_cents: i64,
}

impl FinanceSummary {
    /// Cancelled entries are ignored.
    pub fn compute(from: Option<NaiveDate>, to: Option<NaiveDate>, entries: &[FinanceEntry]) -> Self {
        let mut summary = Self {
            from,
            to,
            ..Self::default()
        };

        for entry in entries.iter().filter(|e| e.status != EntryStatus::Cancelled) {
            let open = entry.open_amount_cents();
            match entry.entry_type {
                EntryType::Receivable => {
                    summary.receivable_total_cents += entry.amount_cents;
                    summary.receivable_paid_cents += entry.paid_amount_cents;
                    summary.receivable_open_cents += open;
                }
                EntryType::Payable => {
                    summary.payable_total_cents += entry.amount_cents;
                    summary.payable_paid_cents += entry.paid_amount_cents;
                    summary.payable_open_cents += open;
                }
            }
            if entry.status == EntryStatus::Overdue {
                summary.overdue_count += 1;
            }
        }

        summary.net_balance_cents = summary.receivable_total_cents - summary.payable_total_cents;
        summary
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateFinanceEntryRequest {
    pub entry_type: EntryType,
    pub description: String,
    pub category: Option<String>,
    pub counterparty: Option<String>,
    pub amount_cents: i64,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct RegisterPaymentRequest {
    pub amount_cents: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct FinanceEntryFilter {
    pub entry_type: Option<EntryType>,
    pub status: Option<EntryStatus>,
    pub due_from: Option<NaiveDate>,
    pub due_to: Option<NaiveDate>,
}

impl FinanceEntryFilter {
    pub fn matches(&self, entry: &FinanceEntry) -> bool {
        self.entry_type.is_none_or(|t| entry.entry_type == t)
            && self.status.is_none_or(|s| entry.status == s)
            && self.due_from.is_none_or(|d| entry.due_date >= d)
            && self.due_to.is_none_or(|d| entry.due_date <= d)
    }
}

#[derive(Debug, Serialize)]
pub struct MarkOverdueResponse {
    pub updated: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(entry_type: EntryType, amount: i64) -> FinanceEntry {
        FinanceEntry::new(
            Uuid::new_v4(),
            CreateFinanceEntryRequest {
                entry_type,
                description: "Invoice 17".into(),
                category: None,
                counterparty: Some("Globex".into()),
                amount_cents: amount,
                issue_date: date(2025, 1, 1),
                due_date: date(2025, 1, 31),
            },
        )
        .unwrap()
    }

    #[test]
    fn due_date_must_follow_issue_date() {
        let result = FinanceEntry::new(
            Uuid::new_v4(),
            CreateFinanceEntryRequest {
                entry_type: EntryType::Payable,
                description: "Rent".into(),
                category: None,
                counterparty: None,
                amount_cents: 100,
                issue_date: date(2025, 2, 1),
                due_date: date(2025, 1, 31),
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn partial_then_full_payment() {
        let mut e = entry(EntryType::Receivable, 10_000);
        e.register_payment(4_000).unwrap();
        assert_eq!(e.status, EntryStatus::PartiallyPaid);
        assert!(e.register_payment(6_001).is_err());
        e.register_payment(6_000).unwrap();
        assert_eq!(e.status, EntryStatus::Paid);
        assert!(e.paid_at.is_some());
        assert!(e.register_payment(1).is_err());
    }

    #[test]
    fn overdue_entries_still_accept_payments() {
        let mut e = entry(EntryType::Payable, 5_000);
        assert!(!e.mark_overdue(date(2025, 1, 31)));
        assert!(e.mark_overdue(date(2025, 2, 1)));
        assert_eq!(e.status, EntryStatus::Overdue);
        e.register_payment(1_000).unwrap();
        assert_eq!(e.status, EntryStatus::Overdue);
    }

    #[test]
    fn cancel_rules() {
        let mut paid_in_part = entry(EntryType::Payable, 5_000);
        paid_in_part.register_payment(1).unwrap();
        assert!(paid_in_part.cancel().is_err());

        let mut fresh = entry(EntryType::Payable, 5_000);
        fresh.cancel().unwrap();
        assert!(fresh.cancel().is_err());
        assert!(!fresh.mark_overdue(date(2026, 1, 1)));
    }

    #[test]
    fn summary_splits_by_type() {
        let mut receivable = entry(EntryType::Receivable, 10_000);
        receivable.register_payment(2_500).unwrap();
        let payable = entry(EntryType::Payable, 4_000);
        let mut cancelled = entry(EntryType::Payable, 99_999);
        cancelled.cancel().unwrap();

        let summary = FinanceSummary::compute(None, None, &[receivable, payable, cancelled]);
        assert_eq!(summary.receivable_total_cents, 10_000);
        assert_eq!(summary.receivable_paid_cents, 2_500);
        assert_eq!(summary.receivable_open_cents, 7_500);
        assert_eq!(summary.payable_open_cents, 4_000);
        assert_eq!(summary.net_balance_cents, 6_000);
    }
}
