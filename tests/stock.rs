mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::{Value, json};

use common::{TestApp, id};

/// Warehouse WH1 with zone A and a 2x2x1 grid of bins holding 50 each.
async fn layout(app: &TestApp) -> (Value, Vec<Value>) {
    let (status, warehouse) = app
        .post("/v1/warehouses", json!({ "code": "wh1", "name": "Main warehouse" }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{warehouse}");
    assert_eq!(warehouse["code"], "WH1");

    let (status, zone) = app
        .post(
            &format!("/v1/warehouses/{}/zones", id(&warehouse)),
            json!({ "code": "A", "name": "Picking" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{zone}");

    let (status, generated) = app
        .post(
            &format!("/v1/zones/{}/bins/generate", id(&zone)),
            json!({ "aisles": 2, "shelves_per_aisle": 2, "levels_per_shelf": 1, "capacity": 50 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{generated}");
    assert_eq!(generated["created"], 4);

    let bins = generated["bins"].as_array().unwrap().clone();
    (zone, bins)
}

async fn variant(app: &TestApp, sku: &str, price_cents: i64) -> Value {
    let (status, product) = app
        .post("/v1/products", json!({ "name": format!("Product {sku}") }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{product}");

    let (status, variant) = app
        .post(
            &format!("/v1/products/{}/variants", id(&product)),
            json!({ "sku": sku, "name": format!("Variant {sku}"), "price_cents": price_cents }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{variant}");
    variant
}

async fn receive(app: &TestApp, variant: &Value, bin: &Value, quantity: i32) -> Value {
    let (status, movement) = app
        .post(
            "/v1/movements",
            json!({
                "movement_type": "INBOUND",
                "quantity": quantity,
                "variant_id": id(variant),
                "to_bin_id": id(bin),
                "reference": "PO-42",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{movement}");
    movement
}

#[tokio::test]
async fn generating_bins_twice_skips_existing_addresses() {
    let app = TestApp::new().await;
    let (zone, bins) = layout(&app).await;
    assert_eq!(bins[0]["address"], "A-01-01-01");

    let (status, again) = app
        .post(
            &format!("/v1/zones/{}/bins/generate", id(&zone)),
            json!({ "aisles": 3, "shelves_per_aisle": 2, "levels_per_shelf": 1, "capacity": 50 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(again["created"], 2);
    assert_eq!(again["skipped"], 4);

    let (_, listed) = app.get(&format!("/v1/zones/{}/bins", id(&zone))).await;
    assert_eq!(listed.as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn movements_track_stock_per_bin() {
    let app = TestApp::new().await;
    let (zone, bins) = layout(&app).await;
    let shirt = variant(&app, "SHIRT-M", 4_990).await;

    let received = receive(&app, &shirt, &bins[0], 30).await;
    let item_id = received["item_id"].as_str().unwrap().to_string();

    let (status, _) = app
        .post(
            "/v1/movements",
            json!({
                "movement_type": "INBOUND",
                "quantity": 21,
                "variant_id": id(&shirt),
                "to_bin_id": id(&bins[0]),
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "bin capacity is 50");

    let (status, transfer) = app
        .post(
            "/v1/movements",
            json!({
                "movement_type": "TRANSFER",
                "quantity": 10,
                "item_id": item_id,
                "to_bin_id": id(&bins[1]),
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{transfer}");
    assert_eq!(transfer["from_bin_id"], bins[0]["id"]);

    let (status, _) = app
        .post(
            "/v1/movements",
            json!({ "movement_type": "LOSS", "quantity": 1, "item_id": item_id }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "losses need a reason");

    let (status, stock) = app.get(&format!("/v1/variants/{}/stock", id(&shirt))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stock["total_quantity"], 30);
    assert_eq!(stock["bins"].as_array().unwrap().len(), 2);

    let (_, bin) = app.get(&format!("/v1/bins/{}", id(&bins[0]))).await;
    assert_eq!(bin["current_occupancy"], 20);
    assert_eq!(bin["available_capacity"], 30);

    let (status, occupancy) = app.get(&format!("/v1/zones/{}/occupancy", id(&zone))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(occupancy["total_bins"], 4);
    assert_eq!(occupancy["total_capacity"], 200);
    assert_eq!(occupancy["total_occupancy"], 30);

    let (_, history) = app
        .get(&format!("/v1/movements?variant_id={}", id(&shirt)))
        .await;
    assert_eq!(history["meta"]["total"], 2);
}

#[tokio::test]
async fn blocked_bins_refuse_stock() {
    let app = TestApp::new().await;
    let (_, bins) = layout(&app).await;
    let shirt = variant(&app, "SHIRT-M", 4_990).await;
    let uri = format!("/v1/bins/{}", id(&bins[2]));

    let (status, _) = app.post(&format!("{uri}/block"), json!({ "reason": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, blocked) = app
        .post(&format!("{uri}/block"), json!({ "reason": "Damaged shelf" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(blocked["is_blocked"], true);

    let (status, _) = app
        .post(
            "/v1/movements",
            json!({
                "movement_type": "INBOUND",
                "quantity": 1,
                "variant_id": id(&shirt),
                "to_bin_id": id(&bins[2]),
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post(&format!("{uri}/unblock"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    receive(&app, &shirt, &bins[2], 1).await;
}

#[tokio::test]
async fn catalog_rules() {
    let app = TestApp::new().await;

    let (_, apparel) = app.post("/v1/categories", json!({ "name": "Apparel" })).await;
    let (status, shirts) = app
        .post(
            "/v1/categories",
            json!({ "name": "Shirts", "parent_id": id(&apparel) }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app.post("/v1/categories", json!({ "name": "apparel" })).await;
    assert_eq!(status, StatusCode::CONFLICT, "slugs are unique");

    let (status, tree) = app.get("/v1/categories/tree").await;
    assert_eq!(status, StatusCode::OK);
    let roots = tree.as_array().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0]["children"][0]["name"], "Shirts");

    let (status, _) = app.delete(&format!("/v1/categories/{}", id(&apparel))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "has a subcategory");

    variant(&app, "SHIRT-M", 4_990).await;
    let (_, product) = app.post("/v1/products", json!({ "name": "Other" })).await;
    let (status, _) = app
        .post(
            &format!("/v1/products/{}/variants", id(&product)),
            json!({ "sku": "SHIRT-M", "name": "Duplicate", "price_cents": 100 }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "SKUs are unique");

    let (status, _) = app.delete(&format!("/v1/categories/{}", id(&shirts))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn volumes_pack_ship_and_return() {
    let app = TestApp::new().await;
    let (_, bins) = layout(&app).await;
    let shirt = variant(&app, "SHIRT-M", 4_990).await;
    let received = receive(&app, &shirt, &bins[0], 10).await;

    let (status, volume) = app
        .post("/v1/volumes", json!({ "destination": "Store 12" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(volume["status"], "OPEN");
    let uri = format!("/v1/volumes/{}", id(&volume));

    let (status, _) = app.post(&format!("{uri}/close"), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "empty volumes stay open");

    let (status, _) = app
        .post(
            &format!("{uri}/items"),
            json!({ "item_id": received["item_id"], "quantity": 11 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "more than the item holds");

    let (status, line) = app
        .post(
            &format!("{uri}/items"),
            json!({ "item_id": received["item_id"], "quantity": 4 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, packing) = app.get(&format!("{uri}/packing-list")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(packing["total_quantity"], 4);
    assert_eq!(packing["lines"][0]["sku"], "SHIRT-M");
    assert_eq!(packing["lines"][0]["bin_address"], "A-01-01-01");

    let (status, _) = app.post(&format!("{uri}/deliver"), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "only closed volumes ship");

    let (_, closed) = app.post(&format!("{uri}/close"), json!({})).await;
    assert_eq!(closed["status"], "CLOSED");

    let (status, _) = app.delete(&format!("{uri}/items/{}", id(&line))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "closed volumes are sealed");

    let (_, delivered) = app.post(&format!("{uri}/deliver"), json!({})).await;
    assert_eq!(delivered["status"], "DELIVERED");
    let (_, returned) = app.post(&format!("{uri}/return"), json!({})).await;
    assert_eq!(returned["status"], "RETURNED");

    let (status, detail) = app.get(&uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_volumes_have_their_own_error_code() {
    let app = TestApp::new().await;

    let (status, body) = app
        .get(&format!("/v1/volumes/{}", uuid::Uuid::new_v4()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "volume_not_found");
}

#[tokio::test]
async fn customers_are_unique_by_document() {
    let app = TestApp::new().await;

    let (status, customer) = app
        .post(
            "/v1/customers",
            json!({ "name": "Initech", "document": "12.345.678/0001-90", "customer_type": "BUSINESS" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(customer["customer_type"], "BUSINESS");

    let (status, _) = app
        .post(
            "/v1/customers",
            json!({ "name": "Initech again", "document": "12.345.678/0001-90" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, found) = app.get("/v1/customers?search=initech").await;
    assert_eq!(found["meta"]["total"], 1);

    let (status, _) = app.delete(&format!("/v1/customers/{}", id(&customer))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, found) = app.get("/v1/customers").await;
    assert_eq!(found["meta"]["total"], 0);
}

#[tokio::test]
async fn quotes_pick_the_best_running_promotion() {
    let app = TestApp::new().await;
    let shirt = variant(&app, "SHIRT-M", 10_000).await;
    let now = Utc::now();

    let (status, _) = app
        .post(
            "/v1/promotions",
            json!({
                "variant_id": id(&shirt),
                "name": "Broken",
                "discount_type": "PERCENTAGE",
                "discount_value": 150,
                "starts_at": now - Duration::days(1),
                "ends_at": now + Duration::days(1),
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for (name, kind, value) in [
        ("Ten percent", "PERCENTAGE", 10),
        ("Fifteen off", "FIXED_AMOUNT", 1_500),
    ] {
        let (status, _) = app
            .post(
                "/v1/promotions",
                json!({
                    "variant_id": id(&shirt),
                    "name": name,
                    "discount_type": kind,
                    "discount_value": value,
                    "starts_at": now - Duration::days(1),
                    "ends_at": now + Duration::days(1),
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, quote) = app
        .get(&format!("/v1/variants/{}/promotions/quote", id(&shirt)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quote["base_price_cents"], 10_000);
    assert_eq!(quote["final_price_cents"], 8_500);
    assert_eq!(quote["promotion"]["name"], "Fifteen off");
}
