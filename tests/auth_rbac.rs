mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{ADMIN_KEY, TestApp, id};
use erp_server::services::auth_service;

#[tokio::test]
async fn requests_without_a_valid_key_are_rejected() {
    let app = TestApp::new().await;

    let (status, body) = app.call(Method::GET, "/v1/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");

    let (status, _) = app
        .call(Method::GET, "/v1/me", Some("erp_not_a_real_key_000000"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_describes_the_bootstrap_admin() {
    let app = TestApp::new().await;

    let (status, me) = app.get("/v1/me").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["user"]["email"], "admin@acme.test");
    assert_eq!(me["tenant"]["slug"], "acme");
    assert_eq!(me["role"]["permissions"], json!(["*"]));
}

#[tokio::test]
async fn role_permissions_gate_each_route() {
    let app = TestApp::new().await;
    let key = app
        .restricted_key("clerk@acme.test", &["hr.employees.read"])
        .await;

    let (status, _) = app
        .call(Method::GET, "/v1/employees", Some(&key), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .call(
            Method::POST,
            "/v1/employees",
            Some(&key),
            Some(json!({
                "registration_number": "E-1",
                "full_name": "Jane Doe",
                "hire_date": "2024-01-15",
                "base_salary_cents": 100_000,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "forbidden");

    let (status, _) = app.call(Method::GET, "/v1/finance/entries", Some(&key), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn module_wildcards_cover_nested_codes() {
    let app = TestApp::new().await;
    let key = app.restricted_key("hr@acme.test", &["hr.*"]).await;

    let (status, _) = app
        .call(
            Method::POST,
            "/v1/employees",
            Some(&key),
            Some(json!({
                "registration_number": "E-1",
                "full_name": "Jane Doe",
                "hire_date": "2024-01-15",
                "base_salary_cents": 100_000,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app.call(Method::GET, "/v1/warehouses", Some(&key), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn invalid_permission_codes_and_duplicate_roles_are_refused() {
    let app = TestApp::new().await;

    let (status, _) = app
        .post("/v1/roles", json!({ "name": "Broken", "permissions": ["HR.Payroll"] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/v1/roles", json!({ "name": "Auditor", "permissions": ["audit.*"] }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app
        .post("/v1/roles", json!({ "name": "Auditor", "permissions": [] }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn roles_in_use_cannot_be_deleted() {
    let app = TestApp::new().await;
    app.restricted_key("clerk@acme.test", &["hr.employees.read"]).await;

    let (_, roles) = app.get("/v1/roles").await;
    let clerk_role = roles
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["name"] == "Role for clerk@acme.test")
        .unwrap()
        .clone();

    let (status, _) = app.delete(&format!("/v1/roles/{}", id(&clerk_role))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn revoked_keys_and_deactivated_users_lose_access() {
    let app = TestApp::new().await;
    let key = app.restricted_key("clerk@acme.test", &["hr.*"]).await;

    let (_, me) = app.call(Method::GET, "/v1/me", Some(&key), None).await;
    let user_id = me["user"]["id"].as_str().unwrap().to_string();

    let (status, keys) = app.get(&format!("/v1/users/{user_id}/api-keys")).await;
    assert_eq!(status, StatusCode::OK);
    let listed = &keys.as_array().unwrap()[0];
    assert!(listed.get("key").is_none(), "plaintext is only shown once");

    let (status, _) = app.delete(&format!("/v1/api-keys/{}", id(listed))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.call(Method::GET, "/v1/me", Some(&key), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, issued) = app
        .post(&format!("/v1/users/{user_id}/api-keys"), json!({ "label": "second" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let second = issued["key"].as_str().unwrap().to_string();

    let (status, _) = app.delete(&format!("/v1/users/{user_id}")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.call(Method::GET, "/v1/me", Some(&second), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admins_cannot_deactivate_themselves() {
    let app = TestApp::new().await;
    let (_, me) = app.get("/v1/me").await;

    let (status, _) = app
        .delete(&format!("/v1/users/{}", me["user"]["id"].as_str().unwrap()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn tenants_never_see_each_other() {
    let app = TestApp::new().await;
    let other_key = "erp_globex_admin_key_987654321";
    auth_service::bootstrap(&app.ctx, "Globex", "admin@globex.test", other_key)
        .await
        .unwrap();

    let employee = app.employee("E-1", 250_000).await;

    let (status, _) = app
        .call(
            Method::GET,
            &format!("/v1/employees/{}", id(&employee)),
            Some(other_key),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, listed) = app
        .call(Method::GET, "/v1/employees", Some(other_key), None)
        .await;
    assert_eq!(listed["meta"]["total"], 0);

    let (_, listed) = app
        .call(Method::GET, "/v1/employees", Some(ADMIN_KEY), None)
        .await;
    assert_eq!(listed["meta"]["total"], 1);
}
