//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, query string)
//! 2. Checks the caller's permission and calls the matching service
//! 3. Returns HTTP response (JSON, status code)

/// Caller identity, roles, users and API keys
pub mod auth;
/// Health check endpoint
pub mod health;

pub mod absences;
pub mod employees;
pub mod loans;
pub mod payroll;
pub mod vacations;

pub mod finance;

pub mod catalog;
pub mod locations;
pub mod movements;
pub mod volumes;

pub mod customers;
pub mod promotions;

pub mod audit;
pub mod files;
pub mod notifications;
/// Webhook endpoint management
pub mod webhooks;
