mod common;

use axum::http::StatusCode;
use chrono::{Days, Months, NaiveDate, Utc};
use serde_json::json;

use common::{TestApp, id};

#[tokio::test]
async fn employee_lifecycle() {
    let app = TestApp::new().await;
    let employee = app.employee("E-001", 350_000).await;
    assert_eq!(employee["status"], "ACTIVE");

    let (status, _) = app
        .post(
            "/v1/employees",
            json!({
                "registration_number": "E-001",
                "full_name": "Someone Else",
                "hire_date": "2024-02-01",
                "base_salary_cents": 100_000,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let uri = format!("/v1/employees/{}", id(&employee));
    let (status, updated) = app
        .put(&uri, json!({ "position": "Buyer", "base_salary_cents": 380_000 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["position"], "Buyer");
    assert_eq!(updated["base_salary_cents"], 380_000);

    let (status, _) = app
        .post(&format!("{uri}/terminate"), json!({ "termination_date": "2023-12-31" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, terminated) = app
        .post(&format!("{uri}/terminate"), json!({ "termination_date": "2025-06-30" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(terminated["status"], "TERMINATED");

    let (_, active) = app.get("/v1/employees?status=ACTIVE").await;
    assert_eq!(active["meta"]["total"], 0);

    let (status, _) = app.delete(&uri).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = app.get(&uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "resource_not_found");
}

#[tokio::test]
async fn absence_review_flow() {
    let app = TestApp::new().await;
    let employee = app.employee("E-001", 350_000).await;

    let request = json!({
        "employee_id": id(&employee),
        "absence_type": "PERSONAL_LEAVE",
        "start_date": "2025-03-10",
        "end_date": "2025-03-12",
        "reason": "Moving house",
    });
    let (status, absence) = app.post("/v1/absences", request.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(absence["status"], "PENDING");
    assert_eq!(absence["total_days"], 3);

    let (status, _) = app
        .post(
            "/v1/absences",
            json!({
                "employee_id": id(&employee),
                "absence_type": "UNPAID_LEAVE",
                "start_date": "2025-03-12",
                "end_date": "2025-03-14",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "overlapping absence");

    let (status, _) = app
        .post(
            "/v1/absences",
            json!({
                "employee_id": id(&employee),
                "absence_type": "SICK_LEAVE",
                "start_date": "2025-04-01",
                "end_date": "2025-04-02",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "sick leave needs a document");

    let uri = format!("/v1/absences/{}", id(&absence));
    let (status, _) = app.post(&format!("{uri}/reject"), json!({ "reason": " " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, approved) = app.post(&format!("{uri}/approve"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "APPROVED");
    assert!(approved["reviewed_by"].is_string());

    let (status, _) = app.post(&format!("{uri}/approve"), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, cancelled) = app.post(&format!("{uri}/cancel"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "CANCELLED");

    // The cancelled absence no longer blocks the dates.
    let (status, _) = app.post("/v1/absences", request).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn approving_requires_the_approve_permission() {
    let app = TestApp::new().await;
    let employee = app.employee("E-001", 350_000).await;
    let key = app
        .restricted_key("clerk@acme.test", &["hr.absences.read", "hr.absences.write"])
        .await;

    let (status, absence) = app
        .call(
            axum::http::Method::POST,
            "/v1/absences",
            Some(&key),
            Some(json!({
                "employee_id": id(&employee),
                "absence_type": "WEDDING",
                "start_date": "2025-05-02",
                "end_date": "2025-05-04",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .call(
            axum::http::Method::POST,
            &format!("/v1/absences/{}/approve", id(&absence)),
            Some(&key),
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn vacation_days_can_be_sold_and_scheduled() {
    let app = TestApp::new().await;
    let today = Utc::now().date_naive();
    let hired = today.checked_sub_months(Months::new(24)).unwrap();

    let (status, employee) = app
        .post(
            "/v1/employees",
            json!({
                "registration_number": "E-100",
                "full_name": "Vacation Taker",
                "hire_date": hired,
                "base_salary_cents": 300_000,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .post(
            "/v1/vacations",
            json!({
                "employee_id": id(&employee),
                "acquisition_start": hired.checked_sub_days(Days::new(1)).unwrap(),
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "before the hire date");

    let acquisition_start = today.checked_sub_months(Months::new(15)).unwrap();
    let (status, period) = app
        .post(
            "/v1/vacations",
            json!({ "employee_id": id(&employee), "acquisition_start": acquisition_start }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(period["status"], "AVAILABLE");
    assert_eq!(period["remaining_days"], 30);

    let uri = format!("/v1/vacations/{}", id(&period));
    let (status, _) = app.post(&format!("{uri}/sell"), json!({ "days": 11 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "at most a third can be sold");

    let (status, sold) = app.post(&format!("{uri}/sell"), json!({ "days": 10 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sold["remaining_days"], 20);

    let start: NaiveDate = today.checked_add_days(Days::new(7)).unwrap();
    let (status, _) = app
        .post(
            &format!("{uri}/schedule"),
            json!({ "start_date": start, "end_date": start.checked_add_days(Days::new(2)).unwrap() }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "too short");

    let (status, scheduled) = app
        .post(
            &format!("{uri}/schedule"),
            json!({ "start_date": start, "end_date": start.checked_add_days(Days::new(9)).unwrap() }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(scheduled["status"], "SCHEDULED");

    let (status, balance) = app
        .get(&format!("/v1/employees/{}/vacation-balance", id(&employee)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(balance["available_days"], 20);
}

#[tokio::test]
async fn payroll_settles_loans_and_deductions() {
    let app = TestApp::new().await;
    let employee = app.employee("E-001", 500_000).await;

    let (status, loan) = app
        .post(
            "/v1/loans",
            json!({
                "employee_id": id(&employee),
                "description": "Salary advance",
                "principal_cents": 120_000,
                "installment_count": 12,
                "start_date": "2025-01-01",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(loan["installment_cents"], 10_000);

    let (status, _) = app
        .post(
            "/v1/deductions",
            json!({
                "employee_id": id(&employee),
                "name": "Health plan",
                "amount_cents": 5_000,
                "is_recurring": true,
                "effective_date": "2024-06-01",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, payroll) = app
        .post("/v1/payrolls", json!({ "reference_month": 1, "reference_year": 2025 }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(payroll["status"], "DRAFT");

    let (status, _) = app
        .post("/v1/payrolls", json!({ "reference_month": 1, "reference_year": 2025 }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let uri = format!("/v1/payrolls/{}", id(&payroll));
    let (status, _) = app.post(&format!("{uri}/pay"), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "draft payrolls cannot be paid");

    let (status, calculated) = app.post(&format!("{uri}/calculate"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(calculated["status"], "CALCULATED");
    assert_eq!(calculated["total_gross_cents"], 500_000);
    assert_eq!(calculated["total_deductions_cents"], 15_000);
    assert_eq!(calculated["total_net_cents"], 485_000);
    assert_eq!(calculated["items"].as_array().unwrap().len(), 3);

    let (status, approved) = app.post(&format!("{uri}/approve"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "APPROVED");

    let (status, paid) = app.post(&format!("{uri}/pay"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["status"], "PAID");

    let (_, loan) = app.get(&format!("/v1/loans/{}", id(&loan))).await;
    assert_eq!(loan["paid_installments"], 1);
    assert_eq!(loan["outstanding_cents"], 110_000);

    let (status, _) = app.post(&format!("{uri}/cancel"), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "paid payrolls are final");
}

#[tokio::test]
async fn loans_can_be_paid_off_outside_payroll() {
    let app = TestApp::new().await;
    let employee = app.employee("E-001", 500_000).await;

    let (_, loan) = app
        .post(
            "/v1/loans",
            json!({
                "employee_id": id(&employee),
                "description": "Laptop",
                "principal_cents": 1_000,
                "installment_count": 3,
                "start_date": "2025-01-01",
            }),
        )
        .await;
    let uri = format!("/v1/loans/{}/payments", id(&loan));

    let (_, first) = app.post(&uri, json!({})).await;
    assert_eq!(first["outstanding_cents"], 666);
    app.post(&uri, json!({})).await;
    let (status, last) = app.post(&uri, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(last["outstanding_cents"], 0);
    assert_eq!(last["status"], "PAID");

    let (status, _) = app.post(&uri, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
