//! Row types for every persisted storefront table.
//!
//! Money is carried as `i64` micros (see `sf_catalog::pricing`); timestamps
//! are UTC. These types are plain data: no lifecycle rules live here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod change;
mod status;

pub use change::{ChangeEvent, ChangeKind, Table};
pub use status::{
    ApprovalStatus, FinanceStatus, OrderStatus, Role, SupplierApprovalStatus, SupplierItemStatus,
    UnknownStatus,
};

// ---------------------------------------------------------------------------
// products / product_images
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    /// Stock-keeping unit code (PCS, KG, ...).
    pub sku: Option<String>,
    pub weight: Option<String>,
    pub currency: String,
    /// Supplier cost basis until finance approval, customer-facing price after.
    pub price_micros: i64,
    /// Snapshot of the supplier's price taken when admin forwards to finance.
    pub supplier_price_micros: Option<i64>,
    pub finance_price_micros: Option<i64>,
    pub discount_percent: i32,
    pub stock_quantity: i64,
    pub is_active: bool,
    pub is_featured: bool,
    pub approval_status: ApprovalStatus,
    pub finance_status: Option<FinanceStatus>,
    pub finance_approved_at: Option<DateTime<Utc>>,
    pub finance_approved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for `products`; the store assigns `id` and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub sku: Option<String>,
    pub weight: Option<String>,
    pub currency: String,
    pub price_micros: i64,
    pub discount_percent: i32,
    pub stock_quantity: i64,
    pub is_active: bool,
    pub approval_status: ApprovalStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    pub id: Uuid,
    pub product_id: Uuid,
    pub image_url: String,
    pub alt_text: Option<String>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProductImage {
    pub product_id: Uuid,
    pub image_url: String,
    pub alt_text: Option<String>,
    pub sort_order: i32,
}

// ---------------------------------------------------------------------------
// profiles / user_roles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub business_name: Option<String>,
    pub business_address: Option<String>,
    pub gst_number: Option<String>,
    pub is_verified: bool,
    pub approval_status: SupplierApprovalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRole {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// categories / brands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub parent_id: Option<Uuid>,
    pub image_url: Option<String>,
    pub display_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub slug: String,
    pub parent_id: Option<Uuid>,
    pub display_order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brand {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub logo_url: Option<String>,
    pub country: Option<String>,
    pub is_featured: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBrand {
    pub name: String,
    pub slug: String,
    pub country: Option<String>,
    pub is_featured: bool,
}

// ---------------------------------------------------------------------------
// orders / order_items / addresses
// ---------------------------------------------------------------------------

/// Delivery address. Stored verbatim inside `orders.address_snapshot`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub full_name: String,
    pub phone: String,
    pub address_line: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
}

/// An entry in a customer's address book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedAddress {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(flatten)]
    pub address: Address,
    /// At most one per user.
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub address_snapshot: Address,
    pub subtotal_micros: i64,
    pub shipping_cost_micros: i64,
    pub total_micros: i64,
    pub payment_method: String,
    pub payment_status: String,
    pub order_status: OrderStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub user_id: Option<Uuid>,
    pub address_snapshot: Address,
    pub subtotal_micros: i64,
    pub shipping_cost_micros: i64,
    pub total_micros: i64,
    pub payment_method: String,
    pub payment_status: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Option<Uuid>,
    /// The product as it was at purchase time.
    pub product_snapshot: Product,
    pub quantity: i64,
    pub price_micros: i64,
    pub supplier_status: SupplierItemStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: Uuid,
    pub product_snapshot: Product,
    pub quantity: i64,
    pub price_micros: i64,
}

// ---------------------------------------------------------------------------
// cart / wishlist
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub created_at: DateTime<Utc>,
}
