//! Router assembly and shared handler state.

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware;
use crate::services::Context;
use crate::services::rate_limit_service::RateLimiter;
use crate::services::storage_service::FileStorage;

/// Everything a handler can reach through `State`.
#[derive(Clone)]
pub struct AppState {
    pub ctx: Context,
    pub storage: Arc<dyn FileStorage>,
    pub rate_limiter: RateLimiter,
    pub upload_max_bytes: u64,
}

/// Build the full application router.
///
/// `/health` is public. Everything under `/v1` needs a bearer API key, and
/// every request (public or not) counts against the caller's rate limit.
pub fn build_router(state: AppState) -> Router {
    let upload_limit = usize::try_from(state.upload_max_bytes).unwrap_or(usize::MAX);

    let authenticated_routes = Router::new()
        .merge(rbac_routes())
        .merge(hr_routes())
        .merge(finance_routes())
        .merge(stock_routes())
        .merge(sales_routes())
        .merge(platform_routes(upload_limit))
        // Apply authentication middleware to all routes in this group
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        // Public routes (no authentication required)
        .route("/health", get(handlers::health::health_check))
        .nest("/v1", authenticated_routes)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit_middleware,
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn rbac_routes() -> Router<AppState> {
    use handlers::auth;

    Router::new()
        .route("/me", get(auth::me))
        .route("/roles", post(auth::create_role).get(auth::list_roles))
        .route(
            "/roles/{id}",
            get(auth::get_role)
                .put(auth::update_role)
                .delete(auth::delete_role),
        )
        .route("/users", post(auth::create_user).get(auth::list_users))
        .route(
            "/users/{id}",
            get(auth::get_user)
                .put(auth::update_user)
                .delete(auth::deactivate_user),
        )
        .route(
            "/users/{id}/api-keys",
            post(auth::issue_api_key).get(auth::list_api_keys),
        )
        .route(
            "/api-keys/{id}",
            delete(auth::revoke_api_key),
        )
}

fn hr_routes() -> Router<AppState> {
    use handlers::{absences, employees, loans, payroll, vacations};

    Router::new()
        // Employees
        .route(
            "/employees",
            post(employees::create_employee).get(employees::list_employees),
        )
        .route(
            "/employees/{id}",
            get(employees::get_employee)
                .put(employees::update_employee)
                .delete(employees::delete_employee),
        )
        .route(
            "/employees/{id}/terminate",
            post(employees::terminate_employee),
        )
        .route(
            "/employees/{id}/vacation-balance",
            get(employees::vacation_balance),
        )
        // Absences
        .route(
            "/absences",
            post(absences::request_absence).get(absences::list_absences),
        )
        .route("/absences/{id}", get(absences::get_absence))
        .route("/absences/{id}/approve", post(absences::approve_absence))
        .route("/absences/{id}/reject", post(absences::reject_absence))
        .route("/absences/{id}/cancel", post(absences::cancel_absence))
        // Vacations
        .route(
            "/vacations",
            post(vacations::create_period).get(vacations::list_periods),
        )
        .route("/vacations/refresh", post(vacations::refresh))
        .route("/vacations/{id}", get(vacations::get_period))
        .route("/vacations/{id}/schedule", post(vacations::schedule))
        .route(
            "/vacations/{id}/cancel-schedule",
            post(vacations::cancel_schedule),
        )
        .route("/vacations/{id}/start", post(vacations::start))
        .route("/vacations/{id}/complete", post(vacations::complete))
        .route("/vacations/{id}/sell", post(vacations::sell_days))
        // Payroll
        .route(
            "/payrolls",
            post(payroll::create_payroll).get(payroll::list_payrolls),
        )
        .route("/payrolls/{id}", get(payroll::get_payroll))
        .route("/payrolls/{id}/calculate", post(payroll::calculate_payroll))
        .route("/payrolls/{id}/approve", post(payroll::approve_payroll))
        .route("/payrolls/{id}/pay", post(payroll::pay_payroll))
        .route("/payrolls/{id}/cancel", post(payroll::cancel_payroll))
        // Loans and deductions
        .route("/loans", post(loans::create_loan).get(loans::list_loans))
        .route("/loans/{id}", get(loans::get_loan))
        .route("/loans/{id}/payments", post(loans::register_payment))
        .route("/loans/{id}/cancel", post(loans::cancel_loan))
        .route(
            "/deductions",
            post(loans::create_deduction).get(loans::list_deductions),
        )
        .route("/deductions/{id}", get(loans::get_deduction))
        .route(
            "/deductions/{id}/deactivate",
            post(loans::deactivate_deduction),
        )
}

fn finance_routes() -> Router<AppState> {
    use handlers::finance;

    Router::new()
        .route(
            "/finance/entries",
            post(finance::create_entry).get(finance::list_entries),
        )
        .route(
            "/finance/entries/mark-overdue",
            post(finance::mark_overdue),
        )
        .route(
            "/finance/entries/{id}",
            get(finance::get_entry).delete(finance::delete_entry),
        )
        .route(
            "/finance/entries/{id}/payments",
            post(finance::register_payment),
        )
        .route("/finance/entries/{id}/cancel", post(finance::cancel_entry))
        .route("/finance/summary", get(finance::summary))
}

fn stock_routes() -> Router<AppState> {
    use handlers::{catalog, locations, movements, volumes};

    Router::new()
        // Locations
        .route(
            "/warehouses",
            post(locations::create_warehouse).get(locations::list_warehouses),
        )
        .route(
            "/warehouses/{id}",
            get(locations::get_warehouse)
                .put(locations::update_warehouse)
                .delete(locations::delete_warehouse),
        )
        .route(
            "/warehouses/{id}/zones",
            post(locations::create_zone).get(locations::list_zones),
        )
        .route(
            "/zones/{id}/bins",
            post(locations::create_bin).get(locations::list_bins),
        )
        .route("/zones/{id}/bins/generate", post(locations::generate_bins))
        .route("/zones/{id}/occupancy", get(locations::zone_occupancy))
        .route("/bins/{id}", get(locations::get_bin))
        .route("/bins/{id}/block", post(locations::block_bin))
        .route("/bins/{id}/unblock", post(locations::unblock_bin))
        // Catalog
        .route(
            "/categories",
            post(catalog::create_category).get(catalog::list_categories),
        )
        .route("/categories/tree", get(catalog::category_tree))
        .route(
            "/categories/{id}",
            get(catalog::get_category)
                .put(catalog::update_category)
                .delete(catalog::delete_category),
        )
        .route(
            "/products",
            post(catalog::create_product).get(catalog::list_products),
        )
        .route(
            "/products/{id}",
            get(catalog::get_product)
                .put(catalog::update_product)
                .delete(catalog::delete_product),
        )
        .route(
            "/products/{id}/variants",
            post(catalog::create_variant).get(catalog::list_variants),
        )
        .route(
            "/variants/{id}",
            get(catalog::get_variant).put(catalog::update_variant),
        )
        .route("/variants/{id}/items", get(catalog::list_variant_items))
        .route("/variants/{id}/stock", get(catalog::variant_stock))
        .route(
            "/variants/{id}/promotions/quote",
            get(handlers::promotions::quote),
        )
        // Movements
        .route(
            "/movements",
            post(movements::register_movement).get(movements::list_movements),
        )
        // Volumes
        .route(
            "/volumes",
            post(volumes::create_volume).get(volumes::list_volumes),
        )
        .route("/volumes/{id}", get(volumes::get_volume))
        .route("/volumes/{id}/items", post(volumes::add_item))
        .route(
            "/volumes/{id}/items/{item_id}",
            delete(volumes::remove_item),
        )
        .route("/volumes/{id}/close", post(volumes::close_volume))
        .route("/volumes/{id}/reopen", post(volumes::reopen_volume))
        .route("/volumes/{id}/deliver", post(volumes::deliver_volume))
        .route("/volumes/{id}/return", post(volumes::return_volume))
        .route("/volumes/{id}/packing-list", get(volumes::packing_list))
}

fn sales_routes() -> Router<AppState> {
    use handlers::{customers, promotions};

    Router::new()
        .route(
            "/customers",
            post(customers::create_customer).get(customers::list_customers),
        )
        .route(
            "/customers/{id}",
            get(customers::get_customer)
                .put(customers::update_customer)
                .delete(customers::delete_customer),
        )
        .route(
            "/promotions",
            post(promotions::create_promotion).get(promotions::list_promotions),
        )
        .route(
            "/promotions/{id}",
            get(promotions::get_promotion)
                .put(promotions::update_promotion)
                .delete(promotions::delete_promotion),
        )
        .route(
            "/promotions/{id}/deactivate",
            post(promotions::deactivate_promotion),
        )
}

fn platform_routes(upload_limit: usize) -> Router<AppState> {
    use handlers::{audit, files, notifications, webhooks};

    Router::new()
        // Audit
        .route("/audit-logs", get(audit::list_logs))
        .route("/audit-logs/{id}", get(audit::get_log))
        .route("/audit-logs/{id}/verify", get(audit::verify_log))
        // Notifications
        .route(
            "/notifications",
            post(notifications::create_notification).get(notifications::list_notifications),
        )
        .route(
            "/notifications/unread-count",
            get(notifications::unread_count),
        )
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route(
            "/notifications/{id}",
            delete(notifications::delete_notification),
        )
        .route("/notifications/{id}/read", post(notifications::mark_read))
        // Webhooks
        .route(
            "/webhooks",
            post(webhooks::create_webhook).get(webhooks::list_webhooks),
        )
        .route(
            "/webhooks/{id}",
            delete(webhooks::delete_webhook),
        )
        .route(
            "/webhooks/{id}/deliveries",
            get(webhooks::list_deliveries),
        )
        // Files: the body limit must cover the configured upload size
        .route(
            "/files",
            post(files::upload_file)
                .delete(files::delete_file)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
}
