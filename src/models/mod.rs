//! Data models representing database entities.
//!
//! Each module holds the row structs of one functional area, the request
//! bodies and filters its handlers accept, and the domain rules that act on
//! a single row (state transitions, validation, derived values).

/// Tenants, roles, users, API keys and permission codes
pub mod auth;
/// Employee records
pub mod employee;
/// Absences and absence types
pub mod absence;
/// Vacation acquisition periods
pub mod vacation;
/// Payroll runs and items
pub mod payroll;
/// Employee loans and payroll deductions
pub mod loan;
/// Payables and receivables
pub mod finance;
/// Warehouses, zones and bins
pub mod location;
/// Categories, products, variants and stock items
pub mod catalog;
/// Stock movements
pub mod movement;
/// Shipping volumes
pub mod volume;
/// Customers
pub mod customer;
/// Variant promotions
pub mod promotion;
/// Signed audit trail
pub mod audit;
/// In-app notifications
pub mod notification;
/// Outbound webhook endpoints
pub mod webhook;
/// Uploaded files
pub mod file;
