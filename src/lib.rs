//! Multi-tenant ERP backend: HR, finance, stock, sales and the platform
//! services around them (RBAC, audit trail, notifications, webhooks, files).
//!
//! The binary in `main.rs` wires configuration, Postgres and the optional
//! Redis counter store into [`app::build_router`]. Integration tests build
//! the same router over the in-memory repositories.

#[macro_use]
mod macros;

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod money;
pub mod pagination;
pub mod repositories;
pub mod resilience;
pub mod services;
