//! Scenario: the HTTP surface over an in-memory workflow.
//!
//! # Invariants under test
//!
//! - Every actor route needs `x-user-id`; without it the answer is 401.
//! - Role gates answer 403 with the gate name in the body.
//! - A product submitted over HTTP reaches the public catalog only after the
//!   admin and finance steps.
//! - Validation failures are 422 with per-row details; illegal transitions are 409.
//! - Uploaded images are served back from the media route.
//! - The change stream delivers row changes as SSE events, scoped to what the
//!   caller may read: anonymous callers get catalog products only.
//!
//! All tests are pure in-process; no DB or network required.

use std::{sync::Arc, time::Duration};

use axum::http::{Request, StatusCode};
use base64::Engine;
use http_body_util::BodyExt;
use sf_daemon::{routes, state};
use sf_testkit::Harness;
use tower::ServiceExt; // oneshot
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn call(router: axum::Router, req: Request<axum::body::Body>) -> (StatusCode, bytes::Bytes) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, body)
}

fn parse_json(b: bytes::Bytes) -> serde_json::Value {
    serde_json::from_slice(&b).expect("body is not valid JSON")
}

fn router(h: &Harness) -> axum::Router {
    let st = Arc::new(state::AppState::new(h.workflow.clone(), h.feed.clone()));
    routes::build_router(st)
}

fn get(uri: &str, user: Option<Uuid>) -> Request<axum::body::Body> {
    let mut b = Request::builder().method("GET").uri(uri);
    if let Some(u) = user {
        b = b.header(routes::USER_HEADER, u.to_string());
    }
    b.body(axum::body::Body::empty()).unwrap()
}

fn post(uri: &str, user: Uuid, body: serde_json::Value) -> Request<axum::body::Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(routes::USER_HEADER, user.to_string())
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap()
}

async fn submit_one(h: &Harness, name: &str, price: &str) -> serde_json::Value {
    let req = post(
        "/v1/supplier/products",
        h.supplier,
        serde_json::json!({
            "products": [{ "name": name, "price": price, "stock_quantity": 12, "sku": "PCS" }]
        }),
    );
    let (status, body) = call(router(h), req).await;
    assert_eq!(status, StatusCode::CREATED, "{}", String::from_utf8_lossy(&body));
    parse_json(body)["created"][0].clone()
}

// ---------------------------------------------------------------------------
// Health and identity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_needs_no_identity() {
    let h = Harness::new().await;
    let (status, body) = call(router(&h), get("/v1/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "sf-daemon");
}

#[tokio::test]
async fn actor_routes_refuse_missing_or_garbled_identity() {
    let h = Harness::new().await;

    let (status, body) = call(router(&h), get("/v1/admin/queue", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(parse_json(body)["code"], "UNAUTHENTICATED");

    let req = Request::builder()
        .method("GET")
        .uri("/v1/cart")
        .header(routes::USER_HEADER, "not-a-uuid")
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, _) = call(router(&h), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn capabilities_reflect_roles() {
    let h = Harness::new().await;
    let (status, body) = call(router(&h), get("/v1/me/capabilities", Some(h.admin))).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["admin"], true);
    assert_eq!(json["finance"], false);
}

// ---------------------------------------------------------------------------
// Gates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn customer_is_refused_at_the_admin_gate() {
    let h = Harness::new().await;
    let (status, body) = call(router(&h), get("/v1/admin/queue", Some(h.customer))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let json = parse_json(body);
    assert_eq!(json["gate"], "admin");
    assert!(json["error"].as_str().unwrap().starts_with("GATE_REFUSED"));
}

#[tokio::test]
async fn pending_supplier_cannot_submit() {
    let h = Harness::new().await;
    let pending = h
        .add_supplier(sf_schemas::SupplierApprovalStatus::Pending)
        .await;
    let req = post(
        "/v1/supplier/products",
        pending,
        serde_json::json!({ "products": [{ "name": "Tea", "price": "10" }] }),
    );
    let (status, body) = call(router(&h), req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(parse_json(body)["gate"], "approved_supplier");
}

// ---------------------------------------------------------------------------
// Lifecycle over HTTP
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submitted_product_goes_live_after_admin_and_finance() {
    let h = Harness::new().await;
    let created = submit_one(&h, "Cold Pressed Oil", "200").await;
    assert_eq!(created["approval_status"], "pending");
    let id = created["id"].as_str().unwrap().to_string();

    let (status, body) = call(router(&h), get("/v1/catalog/products", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body).as_array().unwrap().len(), 0);

    let req = post(
        &format!("/v1/admin/products/{id}/approve"),
        h.admin,
        serde_json::json!({}),
    );
    let (status, body) = call(router(&h), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["approval_status"], "finance_pending");

    let uri = format!("/v1/finance/margin?product_id={id}&price=260");
    let (status, body) = call(router(&h), get(&uri, Some(h.finance))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["margin_percent"], "30.00");

    let req = post(
        &format!("/v1/finance/products/{id}/price"),
        h.finance,
        serde_json::json!({ "price": "260.00" }),
    );
    let (status, body) = call(router(&h), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["approval_status"], "approved");

    let (status, body) = call(router(&h), get(&format!("/v1/catalog/products/{id}"), None)).await;
    assert_eq!(status, StatusCode::OK);
    let entry = parse_json(body);
    assert_eq!(entry["display_price"], "260.00");
    assert_eq!(entry["currency_symbol"], "₹");
}

#[tokio::test]
async fn approve_without_body_keeps_stock() {
    let h = Harness::new().await;
    let created = submit_one(&h, "Jaggery", "90").await;
    let id = created["id"].as_str().unwrap();

    let req = Request::builder()
        .method("POST")
        .uri(format!("/v1/admin/products/{id}/approve"))
        .header(routes::USER_HEADER, h.admin.to_string())
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, body) = call(router(&h), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["stock_quantity"], 12);
}

#[tokio::test]
async fn invalid_rows_are_422_with_details() {
    let h = Harness::new().await;
    let req = post(
        "/v1/supplier/products",
        h.supplier,
        serde_json::json!({ "products": [{ "name": "", "price": "abc" }] }),
    );
    let (status, body) = call(router(&h), req).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let json = parse_json(body);
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert!(!json["details"].as_array().unwrap().is_empty());
    assert_eq!(h.backend.product_count().await, 0);
}

#[tokio::test]
async fn unparsable_finance_price_is_422() {
    let h = Harness::new().await;
    let created = submit_one(&h, "Ghee", "500").await;
    let id = created["id"].as_str().unwrap();
    h.workflow
        .admin_approve(h.admin, Uuid::parse_str(id).unwrap(), None)
        .await
        .unwrap();

    let req = post(
        &format!("/v1/finance/products/{id}/price"),
        h.finance,
        serde_json::json!({ "price": "five hundred" }),
    );
    let (status, body) = call(router(&h), req).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(parse_json(body)["details"][0]["field"], "price");
}

#[tokio::test]
async fn pricing_a_pending_product_is_409() {
    let h = Harness::new().await;
    let created = submit_one(&h, "Saffron", "900").await;
    let id = created["id"].as_str().unwrap();

    let req = post(
        &format!("/v1/finance/products/{id}/price"),
        h.finance,
        serde_json::json!({ "price": "1000" }),
    );
    let (status, body) = call(router(&h), req).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(parse_json(body)["code"], "ILLEGAL_TRANSITION");
}

#[tokio::test]
async fn unknown_product_is_404() {
    let h = Harness::new().await;
    let uri = format!("/v1/catalog/products/{}", Uuid::new_v4());
    let (status, body) = call(router(&h), get(&uri, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(parse_json(body)["code"], "NOT_FOUND");
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

#[tokio::test]
async fn uploaded_image_is_served_from_media_route() {
    let h = Harness::new().await;
    let bytes = vec![0x89, b'P', b'N', b'G', 1, 2, 3];
    let data = base64::engine::general_purpose::STANDARD.encode(&bytes);
    let req = post(
        "/v1/supplier/products",
        h.supplier,
        serde_json::json!({
            "products": [{
                "name": "Clay Lamp",
                "price": "45",
                "sku": "PCS",
                "stock_quantity": 3,
                "image": { "file_name": "lamp.png", "content_type": "image/png", "data_base64": data }
            }]
        }),
    );
    let (status, body) = call(router(&h), req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(parse_json(body)["warnings"].as_array().unwrap().is_empty());

    let names = h.objects.names().await;
    assert_eq!(names.len(), 1);
    assert!(names[0].ends_with(".png"));

    let resp = router(&h)
        .oneshot(get(&format!("{}/{}", routes::MEDIA_PREFIX, names[0]), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-type"], "image/png");
    let served = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(served.as_ref(), bytes.as_slice());
}

#[tokio::test]
async fn bad_base64_is_400_and_creates_nothing() {
    let h = Harness::new().await;
    let req = post(
        "/v1/supplier/products",
        h.supplier,
        serde_json::json!({
            "products": [{
                "name": "Clay Lamp",
                "price": "45",
                "sku": "PCS",
                "stock_quantity": 3,
                "image": { "file_name": "lamp.png", "content_type": "image/png", "data_base64": "!!!" }
            }]
        }),
    );
    let (status, _) = call(router(&h), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(h.backend.product_count().await, 0);
}

#[tokio::test]
async fn edit_with_image_replaces_the_product_image() {
    let h = Harness::new().await;
    let mut d = sf_testkit::draft("Clay Lamp", "45", 3);
    d.image = Some(sf_testkit::png_upload("lamp.png"));
    let p = h.submit(d).await.unwrap();
    assert_eq!(h.backend.images_for(p.id).await.len(), 1);

    let data = base64::engine::general_purpose::STANDARD.encode([0x89, b'P', b'N', b'G', 9]);
    let req = post(
        &format!("/v1/supplier/products/{}/edit", p.id),
        h.supplier,
        serde_json::json!({
            "name": "Clay Lamp Large",
            "price": "55",
            "stock_quantity": 3,
            "image": { "file_name": "large.png", "content_type": "image/png", "data_base64": data }
        }),
    );
    let (status, body) = call(router(&h), req).await;
    assert_eq!(status, StatusCode::OK, "{}", String::from_utf8_lossy(&body));
    let json = parse_json(body);
    assert_eq!(json["product"]["name"], "Clay Lamp Large");
    assert!(json["warnings"].as_array().unwrap().is_empty());

    let images = h.backend.images_for(p.id).await;
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].alt_text.as_deref(), Some("Clay Lamp Large"));
}

#[tokio::test]
async fn edit_with_bad_base64_is_400_and_changes_nothing() {
    let h = Harness::new().await;
    let p = h.submit(sf_testkit::draft("Clay Lamp", "45", 3)).await.unwrap();
    let req = post(
        &format!("/v1/supplier/products/{}/edit", p.id),
        h.supplier,
        serde_json::json!({
            "name": "Renamed",
            "price": "55",
            "stock_quantity": 3,
            "image": { "file_name": "x.png", "content_type": "image/png", "data_base64": "!!!" }
        }),
    );
    let (status, _) = call(router(&h), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, body) = call(router(&h), get("/v1/supplier/products", Some(h.supplier))).await;
    assert_eq!(parse_json(body)[0]["name"], "Clay Lamp");
}

#[tokio::test]
async fn missing_media_is_404() {
    let h = Harness::new().await;
    let (status, _) = call(router(&h), get("/media/product-images/nope.png", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Shopping
// ---------------------------------------------------------------------------

#[tokio::test]
async fn customer_adds_to_cart_and_places_order() {
    let h = Harness::new().await;
    let p = h.seed_approved("Steel Tumbler", None).await;

    let req = post(
        "/v1/cart",
        h.customer,
        serde_json::json!({ "product_id": p.id, "quantity": 2 }),
    );
    let (status, _) = call(router(&h), req).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(router(&h), get("/v1/cart", Some(h.customer))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body).as_array().unwrap().len(), 1);

    let req = post(
        "/v1/orders",
        h.customer,
        serde_json::json!({ "address": sf_testkit::address(), "payment_method": "cod", "notes": null }),
    );
    let (status, body) = call(router(&h), req).await;
    assert_eq!(status, StatusCode::CREATED, "{}", String::from_utf8_lossy(&body));
    let json = parse_json(body);
    assert_eq!(json["items"].as_array().unwrap().len(), 1);
    assert_eq!(json["items"][0]["quantity"], 2);
}

#[tokio::test]
async fn customer_lists_only_their_own_orders() {
    let h = Harness::new().await;
    let p = h.seed_approved("Steel Tumbler", None).await;
    let stranger = Uuid::new_v4();
    for buyer in [h.customer, stranger] {
        h.workflow.add_to_cart(buyer, p.id, 1).await.unwrap();
        h.workflow
            .place_order(
                buyer,
                sf_workflow::PlaceOrder {
                    address: sf_testkit::address(),
                    payment_method: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
    }

    let (status, _) = call(router(&h), get("/v1/orders", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(router(&h), get("/v1/orders?limit=10", Some(h.customer))).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    let orders = json.as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["user_id"], h.customer.to_string());
}

#[tokio::test]
async fn address_book_over_http() {
    let h = Harness::new().await;
    let mut body = serde_json::to_value(sf_testkit::address()).unwrap();
    body["is_default"] = serde_json::json!(false);

    let (status, first) = call(router(&h), post("/v1/addresses", h.customer, body.clone())).await;
    assert_eq!(status, StatusCode::CREATED, "{}", String::from_utf8_lossy(&first));
    let first = parse_json(first);
    assert_eq!(first["is_default"], true);
    assert_eq!(first["city"], "Pune");

    body["city"] = serde_json::json!("Nashik");
    let (_, second) = call(router(&h), post("/v1/addresses", h.customer, body)).await;
    let second_id = parse_json(second)["id"].as_str().unwrap().to_string();

    let uri = format!("/v1/addresses/{second_id}/default");
    let (status, _) = call(router(&h), post(&uri, Uuid::new_v4(), serde_json::json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(router(&h), post(&uri, h.customer, serde_json::json!({}))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, book) = call(router(&h), get("/v1/addresses", Some(h.customer))).await;
    let book = parse_json(book);
    assert_eq!(book.as_array().unwrap().len(), 2);
    assert_eq!(book[0]["id"], second_id);
    assert_eq!(book[0]["city"], "Nashik");
}

#[tokio::test]
async fn finance_users_need_admin() {
    let h = Harness::new().await;
    h.backend
        .put_profile(h.finance, sf_schemas::SupplierApprovalStatus::Approved)
        .await;

    let (status, _) = call(router(&h), get("/v1/admin/finance-users", Some(h.customer))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(router(&h), get("/v1/admin/finance-users", Some(h.admin))).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["id"], h.finance.to_string());
}

#[tokio::test]
async fn wishlist_toggle_flips() {
    let h = Harness::new().await;
    let p = h.seed_approved("Brass Bell", None).await;
    let uri = format!("/v1/wishlist/{}/toggle", p.id);

    let (_, body) = call(router(&h), post(&uri, h.customer, serde_json::json!({}))).await;
    assert_eq!(parse_json(body)["wishlisted"], true);
    let (_, body) = call(router(&h), post(&uri, h.customer, serde_json::json!({}))).await;
    assert_eq!(parse_json(body)["wishlisted"], false);
}

// ---------------------------------------------------------------------------
// Stream
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_stream_table_is_400() {
    let h = Harness::new().await;
    let (status, _) = call(router(&h), get("/v1/stream?table=ledger", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

async fn next_frame(body: &mut axum::body::Body) -> String {
    let frame = tokio::time::timeout(Duration::from_secs(2), body.frame())
        .await
        .expect("no SSE frame within 2s")
        .expect("stream ended")
        .expect("frame error");
    let data = frame.into_data().expect("not a data frame");
    String::from_utf8_lossy(&data).into_owned()
}

#[tokio::test]
async fn stream_delivers_product_insert_to_admin() {
    let h = Harness::new().await;
    let resp = router(&h)
        .oneshot(get("/v1/stream?table=products", Some(h.admin)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let mut body = resp.into_body();

    h.submit(sf_testkit::draft("Neem Comb", "60", 5)).await.unwrap();

    let text = next_frame(&mut body).await;
    assert!(text.contains("event: products"), "{text}");
    assert!(text.contains("Neem Comb"), "{text}");
}

#[tokio::test]
async fn anonymous_stream_of_private_tables_is_401() {
    let h = Harness::new().await;
    for table in ["orders", "profiles", "cart", "wishlist", "order_items", "user_roles"] {
        let uri = format!("/v1/stream?table={table}");
        let (status, _) = call(router(&h), get(&uri, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{table}");
    }
}

#[tokio::test]
async fn anonymous_stream_sees_only_catalog_products() {
    let h = Harness::new().await;
    let resp = router(&h).oneshot(get("/v1/stream", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let mut body = resp.into_body();

    h.submit(sf_testkit::draft("Hidden Comb", "60", 5)).await.unwrap();
    h.publish(sf_testkit::draft("Neem Comb", "60", 5), 90).await.unwrap();

    let text = next_frame(&mut body).await;
    assert!(text.contains("event: products"), "{text}");
    assert!(text.contains("Neem Comb"), "{text}");
    assert!(text.contains(r#""approval_status":"approved""#), "{text}");
    assert!(!text.contains("Hidden Comb"), "{text}");
}

#[tokio::test]
async fn order_events_reach_only_the_buyer() {
    let h = Harness::new().await;
    let p = h.seed_approved("Brass Bell", None).await;
    let resp = router(&h)
        .oneshot(get("/v1/stream?table=orders", Some(h.customer)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let mut body = resp.into_body();

    let stranger = Uuid::new_v4();
    for buyer in [stranger, h.customer] {
        h.workflow.add_to_cart(buyer, p.id, 1).await.unwrap();
        h.workflow
            .place_order(
                buyer,
                sf_workflow::PlaceOrder {
                    address: sf_testkit::address(),
                    payment_method: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
    }

    let text = next_frame(&mut body).await;
    assert!(text.contains("event: orders"), "{text}");
    assert!(text.contains(&h.customer.to_string()), "{text}");
    assert!(!text.contains(&stranger.to_string()), "{text}");
}
