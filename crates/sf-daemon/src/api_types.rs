//! Request and response types for all sf-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests. No business logic lives here.

use serde::{Deserialize, Serialize};
use sf_catalog::ProductDraft;
use sf_schemas::{Order, OrderItem, SupplierItemStatus};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    pub uptime_secs: u64,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Body of every 403: the caller lacks a capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateRefusedResponse {
    pub error: String,
    /// Which capability was required: "admin" | "supplier" | "finance" | "approved_supplier"
    pub gate: String,
}

/// Body of every other non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    /// Per-row validation failures, when any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Supplier submission
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePayload {
    pub file_name: String,
    pub content_type: String,
    /// Standard base64 with padding.
    pub data_base64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftPayload {
    #[serde(flatten)]
    pub draft: ProductDraft,
    #[serde(default)]
    pub image: Option<ImagePayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitProductsRequest {
    pub products: Vec<DraftPayload>,
}

/// Full replacement of the supplier-editable fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub brand_id: Option<Uuid>,
    #[serde(default)]
    pub weight: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    pub price: String,
    pub stock_quantity: i64,
    #[serde(default)]
    pub discount_percent: i32,
    /// Replaces every current image of the product.
    #[serde(default)]
    pub image: Option<ImagePayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveRequest {
    pub active: bool,
}

// ---------------------------------------------------------------------------
// Admin / finance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApproveRequest {
    #[serde(default)]
    pub stock_override: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRequest {
    /// Decimal string as typed by the operator, e.g. `"260.00"`.
    pub price: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginQuery {
    pub product_id: Uuid,
    #[serde(default)]
    pub price: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub display_order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandRequest {
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
}

// ---------------------------------------------------------------------------
// Shopping / fulfilment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartAddRequest {
    pub product_id: Uuid,
    #[serde(default = "one")]
    pub quantity: i64,
}

fn one() -> i64 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WishlistResponse {
    pub wishlisted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrdersQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderItemsQuery {
    #[serde(default)]
    pub pending: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemStatusRequest {
    pub status: SupplierItemStatus,
}

// ---------------------------------------------------------------------------
// /v1/stream
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamQuery {
    /// Restrict the stream to one table, e.g. `products`.
    #[serde(default)]
    pub table: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignOutResponse {
    pub signed_out: bool,
}
