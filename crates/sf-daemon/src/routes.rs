//! Axum router and all HTTP handlers for sf-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. The caller's identity is the `x-user-id` header; every
//! role check happens inside the workflow.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use futures_util::{Stream, StreamExt};
use sf_catalog::{
    parse_price_micros, ImageUpload, ProductDraft, ProductEdit, ValidationError, DEFAULT_CURRENCY,
};
use sf_schemas::{ChangeEvent, SupplierApprovalStatus, Table};
use sf_workflow::{AdminDecision, CatalogQuery, PlaceOrder, SaveAddress, WorkflowError};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;
use uuid::Uuid;

use crate::{
    api_types::{
        ActiveRequest, ApproveRequest, BrandRequest, CartAddRequest, CategoryRequest,
        EditRequest, HealthResponse, ImagePayload, MarginQuery, OrderItemStatusRequest,
        OrderItemsQuery, OrderResponse, OrdersQuery, PriceRequest, SignOutResponse, StreamQuery,
        SubmitProductsRequest, WishlistResponse,
    },
    error::{ApiError, ApiResult},
    scope::Viewer,
    state::{uptime_secs, AppState},
};

pub const USER_HEADER: &str = "x-user-id";

/// URL path under which stored product images are served.
pub const MEDIA_PREFIX: &str = "/media/product-images";

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/stream", get(stream))
        .route("/v1/me/capabilities", get(my_capabilities))
        .route("/v1/session/sign-out", post(sign_out))
        // catalog (public)
        .route("/v1/catalog/products", get(catalog))
        .route("/v1/catalog/products/:id", get(catalog_product))
        .route("/v1/catalog/products/:id/similar", get(similar_products))
        .route("/v1/categories", get(categories))
        .route("/v1/brands", get(brands))
        .route("/media/product-images/:name", get(media))
        // supplier
        .route(
            "/v1/supplier/products",
            get(supplier_products).post(submit_products),
        )
        .route("/v1/supplier/products/:id/edit", post(supplier_edit))
        .route("/v1/supplier/products/:id/delete", post(supplier_delete))
        .route("/v1/supplier/order-items", get(supplier_order_items))
        .route("/v1/supplier/order-items/:id/status", post(decide_order_item))
        .route("/v1/products/:id/active", post(set_active))
        // admin
        .route("/v1/admin/queue", get(admin_queue))
        .route("/v1/admin/products", get(admin_products))
        .route("/v1/admin/products/:id/approve", post(admin_approve))
        .route("/v1/admin/products/:id/reject", post(admin_reject))
        .route("/v1/admin/products/:id/delete", post(admin_delete))
        .route("/v1/admin/suppliers", get(supplier_profiles))
        .route("/v1/admin/suppliers/:id/approve", post(approve_supplier))
        .route("/v1/admin/suppliers/:id/reject", post(reject_supplier))
        .route("/v1/admin/finance-users", get(finance_users))
        .route("/v1/admin/categories", post(create_category))
        .route("/v1/admin/brands", post(create_brand))
        // finance
        .route("/v1/finance/queue", get(finance_queue))
        .route("/v1/finance/margin", get(finance_margin))
        .route("/v1/finance/products/:id/price", post(finance_price))
        // shopping
        .route("/v1/cart", get(cart).post(add_to_cart))
        .route("/v1/wishlist/:product_id/toggle", post(toggle_wishlist))
        .route("/v1/orders", get(my_orders).post(place_order))
        // account
        .route("/v1/addresses", get(addresses).post(add_address))
        .route("/v1/addresses/:id/default", post(set_default_address))
        .with_state(state)
}

/// Caller identity from `x-user-id`.
fn actor(headers: &HeaderMap) -> ApiResult<Uuid> {
    let raw = headers
        .get(USER_HEADER)
        .ok_or_else(|| ApiError::Unauthenticated(format!("missing {USER_HEADER} header")))?;
    raw.to_str()
        .ok()
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
        .ok_or_else(|| ApiError::Unauthenticated(format!("{USER_HEADER} is not a uuid")))
}

fn price_field(raw: &str) -> ApiResult<i64> {
    parse_price_micros(raw)
        .map_err(|e| WorkflowError::from(ValidationError::single("price", e.to_string())).into())
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.clone(),
            version: st.build.version.clone(),
            uptime_secs: uptime_secs(),
        }),
    )
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub(crate) async fn my_capabilities(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let user = actor(&headers)?;
    let caps = st.workflow.capabilities(user).await?;
    Ok(Json(caps).into_response())
}

pub(crate) async fn sign_out(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let user = actor(&headers)?;
    st.workflow.sign_out(user).await;
    Ok(Json(SignOutResponse { signed_out: true }).into_response())
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

pub(crate) async fn catalog(
    State(st): State<Arc<AppState>>,
    Query(q): Query<CatalogQuery>,
) -> ApiResult<Response> {
    let entries = st.workflow.catalog(&q).await?;
    Ok(Json(entries).into_response())
}

pub(crate) async fn catalog_product(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let entry = st.workflow.catalog_product(id).await?;
    Ok(Json(entry).into_response())
}

pub(crate) async fn similar_products(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let entries = st.workflow.similar_products(id).await?;
    Ok(Json(entries).into_response())
}

pub(crate) async fn categories(State(st): State<Arc<AppState>>) -> ApiResult<Response> {
    Ok(Json(st.workflow.categories().await?).into_response())
}

pub(crate) async fn brands(State(st): State<Arc<AppState>>) -> ApiResult<Response> {
    Ok(Json(st.workflow.brands().await?).into_response())
}

fn content_type_for(name: &str) -> &'static str {
    match name.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase()).as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

pub(crate) async fn media(
    State(st): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Response {
    match st.workflow.objects().get(&name).await {
        Ok(Some(bytes)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, content_type_for(&name))],
            bytes,
        )
            .into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => ApiError::from(WorkflowError::from(e)).into_response(),
    }
}

// ---------------------------------------------------------------------------
// Supplier
// ---------------------------------------------------------------------------

pub(crate) async fn submit_products(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SubmitProductsRequest>,
) -> ApiResult<Response> {
    let user = actor(&headers)?;
    let mut drafts: Vec<ProductDraft> = Vec::with_capacity(req.products.len());
    for (row, p) in req.products.into_iter().enumerate() {
        let mut draft = p.draft;
        if let Some(img) = p.image {
            draft.image = Some(decode_image(img, &format!("row {}", row + 1))?);
        }
        drafts.push(draft);
    }

    let report = st.workflow.submit_products(user, drafts).await?;
    info!(supplier_id = %user, created = report.created.len(), warnings = report.warnings.len(), "supplier/products");
    Ok((StatusCode::CREATED, Json(report)).into_response())
}

fn decode_image(img: ImagePayload, what: &str) -> ApiResult<ImageUpload> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(img.data_base64.trim())
        .map_err(|e| ApiError::BadRequest(format!("{what}: image is not base64: {e}")))?;
    Ok(ImageUpload {
        file_name: img.file_name,
        content_type: img.content_type,
        bytes,
    })
}

pub(crate) async fn supplier_products(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let user = actor(&headers)?;
    Ok(Json(st.workflow.supplier_products(user).await?).into_response())
}

pub(crate) async fn supplier_edit(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<EditRequest>,
) -> ApiResult<Response> {
    let user = actor(&headers)?;
    let image = req.image.map(|img| decode_image(img, "image")).transpose()?;
    let edit = ProductEdit {
        price_micros: price_field(&req.price)?,
        name: req.name,
        description: req.description,
        category_id: req.category_id,
        brand_id: req.brand_id,
        weight: req.weight,
        currency: req.currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        stock_quantity: req.stock_quantity,
        discount_percent: req.discount_percent,
    };
    let report = st.workflow.supplier_edit(user, id, edit, image).await?;
    Ok(Json(report).into_response())
}

pub(crate) async fn supplier_delete(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let user = actor(&headers)?;
    st.workflow.supplier_delete(user, id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn set_active(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<ActiveRequest>,
) -> ApiResult<Response> {
    let user = actor(&headers)?;
    Ok(Json(st.workflow.set_active(user, id, req.active).await?).into_response())
}

pub(crate) async fn supplier_order_items(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<OrderItemsQuery>,
) -> ApiResult<Response> {
    let user = actor(&headers)?;
    Ok(Json(st.workflow.supplier_order_items(user, q.pending).await?).into_response())
}

pub(crate) async fn decide_order_item(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<OrderItemStatusRequest>,
) -> ApiResult<Response> {
    let user = actor(&headers)?;
    Ok(Json(st.workflow.decide_order_item(user, id, req.status).await?).into_response())
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

pub(crate) async fn admin_queue(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let user = actor(&headers)?;
    Ok(Json(st.workflow.admin_queue(user).await?).into_response())
}

pub(crate) async fn admin_products(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let user = actor(&headers)?;
    Ok(Json(st.workflow.admin_products(user).await?).into_response())
}

pub(crate) async fn admin_approve(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    body: Option<Json<ApproveRequest>>,
) -> ApiResult<Response> {
    let user = actor(&headers)?;
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let decision = AdminDecision::Approve {
        stock_override: req.stock_override,
    };
    Ok(Json(st.workflow.admin_decide(user, id, decision).await?).into_response())
}

pub(crate) async fn admin_reject(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let user = actor(&headers)?;
    Ok(Json(st.workflow.admin_decide(user, id, AdminDecision::Reject).await?).into_response())
}

pub(crate) async fn admin_delete(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let user = actor(&headers)?;
    st.workflow.admin_delete(user, id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn supplier_profiles(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let user = actor(&headers)?;
    Ok(Json(st.workflow.supplier_profiles(user).await?).into_response())
}

pub(crate) async fn finance_users(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let user = actor(&headers)?;
    Ok(Json(st.workflow.finance_users(user).await?).into_response())
}

pub(crate) async fn approve_supplier(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let user = actor(&headers)?;
    let profile = st
        .workflow
        .decide_supplier(user, id, SupplierApprovalStatus::Approved)
        .await?;
    Ok(Json(profile).into_response())
}

pub(crate) async fn reject_supplier(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let user = actor(&headers)?;
    let profile = st
        .workflow
        .decide_supplier(user, id, SupplierApprovalStatus::Rejected)
        .await?;
    Ok(Json(profile).into_response())
}

pub(crate) async fn create_category(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CategoryRequest>,
) -> ApiResult<Response> {
    let user = actor(&headers)?;
    let c = st
        .workflow
        .create_category(user, &req.name, req.parent_id, req.display_order)
        .await?;
    Ok((StatusCode::CREATED, Json(c)).into_response())
}

pub(crate) async fn create_brand(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<BrandRequest>,
) -> ApiResult<Response> {
    let user = actor(&headers)?;
    let b = st
        .workflow
        .create_brand(user, &req.name, req.country, req.is_featured)
        .await?;
    Ok((StatusCode::CREATED, Json(b)).into_response())
}

// ---------------------------------------------------------------------------
// Finance
// ---------------------------------------------------------------------------

pub(crate) async fn finance_queue(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let user = actor(&headers)?;
    Ok(Json(st.workflow.finance_queue(user).await?).into_response())
}

pub(crate) async fn finance_margin(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<MarginQuery>,
) -> ApiResult<Response> {
    let user = actor(&headers)?;
    let preview = st.workflow.margin_preview(user, q.product_id, &q.price).await?;
    Ok(Json(preview).into_response())
}

pub(crate) async fn finance_price(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<PriceRequest>,
) -> ApiResult<Response> {
    let user = actor(&headers)?;
    let price = price_field(&req.price)?;
    Ok(Json(st.workflow.finance_approve(user, id, price).await?).into_response())
}

// ---------------------------------------------------------------------------
// Shopping
// ---------------------------------------------------------------------------

pub(crate) async fn cart(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let user = actor(&headers)?;
    Ok(Json(st.workflow.cart(user).await?).into_response())
}

pub(crate) async fn add_to_cart(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CartAddRequest>,
) -> ApiResult<Response> {
    let user = actor(&headers)?;
    let item = st
        .workflow
        .add_to_cart(user, req.product_id, req.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(item)).into_response())
}

pub(crate) async fn toggle_wishlist(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(product_id): Path<Uuid>,
) -> ApiResult<Response> {
    let user = actor(&headers)?;
    let wishlisted = st.workflow.toggle_wishlist(user, product_id).await?;
    Ok(Json(WishlistResponse { wishlisted }).into_response())
}

pub(crate) async fn place_order(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<PlaceOrder>,
) -> ApiResult<Response> {
    let user = actor(&headers)?;
    let (order, items) = st.workflow.place_order(user, req).await?;
    Ok((StatusCode::CREATED, Json(OrderResponse { order, items })).into_response())
}

pub(crate) async fn my_orders(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<OrdersQuery>,
) -> ApiResult<Response> {
    let user = actor(&headers)?;
    Ok(Json(st.workflow.my_orders(user, q.limit).await?).into_response())
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

pub(crate) async fn addresses(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let user = actor(&headers)?;
    Ok(Json(st.workflow.addresses(user).await?).into_response())
}

pub(crate) async fn add_address(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SaveAddress>,
) -> ApiResult<Response> {
    let user = actor(&headers)?;
    let saved = st.workflow.add_address(user, req).await?;
    Ok((StatusCode::CREATED, Json(saved)).into_response())
}

pub(crate) async fn set_default_address(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let user = actor(&headers)?;
    Ok(Json(st.workflow.set_default_address(user, id).await?).into_response())
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<StreamQuery>,
) -> ApiResult<Response> {
    let table = match q.table.as_deref() {
        None | Some("") => None,
        Some(t) => Some(
            Table::parse(t).ok_or_else(|| ApiError::BadRequest(format!("unknown table {t:?}")))?,
        ),
    };

    let viewer = if headers.contains_key(USER_HEADER) {
        let user = actor(&headers)?;
        Viewer::User {
            id: user,
            caps: st.workflow.capabilities(user).await?,
        }
    } else {
        Viewer::Anonymous
    };
    if let Some(t) = table {
        if !viewer.may_watch(t) {
            return Err(ApiError::Unauthenticated(format!(
                "sign in to stream {}",
                t.as_str()
            )));
        }
    }

    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.feed.subscribe();
    let events = broadcast_to_sse(rx, table, viewer);

    Ok((headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response())
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<ChangeEvent>,
    table: Option<Table>,
    viewer: Viewer,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(move |msg| async move {
        match msg {
            Ok(ev) if table.map_or(true, |t| t == ev.table) => {
                let ev = viewer.admit(ev)?;
                let data = serde_json::to_string(&ev).ok()?;
                Some(Ok(Event::default().event(ev.table.as_str()).data(data)))
            }
            Ok(_) => None,
            // Lagged: tell the client to re-query everything it shows.
            Err(_) => Some(Ok(Event::default().event("resync").data("{}"))),
        }
    })
}
