//! Row decoding and sqlx error mapping.

use sf_schemas::{
    Address, ApprovalStatus, Brand, CartItem, Category, FinanceStatus, Order, OrderItem,
    OrderStatus, Product, ProductImage, Profile, SavedAddress, SupplierApprovalStatus,
    SupplierItemStatus, UnknownStatus, WishlistItem,
};
use sf_workflow::StoreError;
use sqlx::postgres::PgRow;
use sqlx::Row;

pub(crate) const PRODUCT_COLUMNS: &str = r#"
    id, name, slug, description, category_id, brand_id, supplier_id, sku, weight,
    currency, price_micros, supplier_price_micros, finance_price_micros,
    discount_percent, stock_quantity, is_active, is_featured, approval_status,
    finance_status, finance_approved_at, finance_approved_by, created_at, updated_at
"#;

pub(crate) const ORDER_ITEM_COLUMNS: &str = r#"
    id, order_id, product_id, product_snapshot, quantity, price_micros,
    supplier_status, created_at
"#;

pub(crate) const ORDER_COLUMNS: &str = r#"
    id, user_id, address_snapshot, subtotal_micros, shipping_cost_micros,
    total_micros, payment_method, payment_status, order_status, notes, created_at
"#;

pub(crate) const ADDRESS_COLUMNS: &str = r#"
    id, user_id, full_name, phone, address_line, city, state, pincode, is_default,
    created_at
"#;

pub(crate) const PROFILE_COLUMNS: &str = r#"
    id, full_name, email, phone, business_name, business_address, gst_number,
    is_verified, approval_status, created_at, updated_at
"#;

/// Unique violations become `Duplicate`; everything else is a backend failure.
pub(crate) fn store_err(context: &str, e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some("23505") {
            return StoreError::Duplicate(format!("{context}: {}", db.message()));
        }
    }
    StoreError::Backend(format!("{context}: {e}"))
}

fn status_err(e: UnknownStatus) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn decode(e: sqlx::Error) -> StoreError {
    StoreError::Backend(format!("row decode failed: {e}"))
}

pub(crate) fn product(row: &PgRow) -> Result<Product, StoreError> {
    let approval: String = row.try_get("approval_status").map_err(decode)?;
    let finance: Option<String> = row.try_get("finance_status").map_err(decode)?;
    Ok(Product {
        id: row.try_get("id").map_err(decode)?,
        name: row.try_get("name").map_err(decode)?,
        slug: row.try_get("slug").map_err(decode)?,
        description: row.try_get("description").map_err(decode)?,
        category_id: row.try_get("category_id").map_err(decode)?,
        brand_id: row.try_get("brand_id").map_err(decode)?,
        supplier_id: row.try_get("supplier_id").map_err(decode)?,
        sku: row.try_get("sku").map_err(decode)?,
        weight: row.try_get("weight").map_err(decode)?,
        currency: row.try_get("currency").map_err(decode)?,
        price_micros: row.try_get("price_micros").map_err(decode)?,
        supplier_price_micros: row.try_get("supplier_price_micros").map_err(decode)?,
        finance_price_micros: row.try_get("finance_price_micros").map_err(decode)?,
        discount_percent: row.try_get("discount_percent").map_err(decode)?,
        stock_quantity: row.try_get("stock_quantity").map_err(decode)?,
        is_active: row.try_get("is_active").map_err(decode)?,
        is_featured: row.try_get("is_featured").map_err(decode)?,
        approval_status: ApprovalStatus::parse(&approval).map_err(status_err)?,
        finance_status: finance
            .as_deref()
            .map(FinanceStatus::parse)
            .transpose()
            .map_err(status_err)?,
        finance_approved_at: row.try_get("finance_approved_at").map_err(decode)?,
        finance_approved_by: row.try_get("finance_approved_by").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
    })
}

pub(crate) fn image(row: &PgRow) -> Result<ProductImage, StoreError> {
    Ok(ProductImage {
        id: row.try_get("id").map_err(decode)?,
        product_id: row.try_get("product_id").map_err(decode)?,
        image_url: row.try_get("image_url").map_err(decode)?,
        alt_text: row.try_get("alt_text").map_err(decode)?,
        sort_order: row.try_get("sort_order").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
    })
}

pub(crate) fn profile(row: &PgRow) -> Result<Profile, StoreError> {
    let status: String = row.try_get("approval_status").map_err(decode)?;
    Ok(Profile {
        id: row.try_get("id").map_err(decode)?,
        full_name: row.try_get("full_name").map_err(decode)?,
        email: row.try_get("email").map_err(decode)?,
        phone: row.try_get("phone").map_err(decode)?,
        business_name: row.try_get("business_name").map_err(decode)?,
        business_address: row.try_get("business_address").map_err(decode)?,
        gst_number: row.try_get("gst_number").map_err(decode)?,
        is_verified: row.try_get("is_verified").map_err(decode)?,
        approval_status: SupplierApprovalStatus::parse(&status).map_err(status_err)?,
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
    })
}

pub(crate) fn category(row: &PgRow) -> Result<Category, StoreError> {
    Ok(Category {
        id: row.try_get("id").map_err(decode)?,
        name: row.try_get("name").map_err(decode)?,
        slug: row.try_get("slug").map_err(decode)?,
        parent_id: row.try_get("parent_id").map_err(decode)?,
        image_url: row.try_get("image_url").map_err(decode)?,
        display_order: row.try_get("display_order").map_err(decode)?,
        is_active: row.try_get("is_active").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
    })
}

pub(crate) fn brand(row: &PgRow) -> Result<Brand, StoreError> {
    Ok(Brand {
        id: row.try_get("id").map_err(decode)?,
        name: row.try_get("name").map_err(decode)?,
        slug: row.try_get("slug").map_err(decode)?,
        logo_url: row.try_get("logo_url").map_err(decode)?,
        country: row.try_get("country").map_err(decode)?,
        is_featured: row.try_get("is_featured").map_err(decode)?,
        is_active: row.try_get("is_active").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
    })
}

pub(crate) fn cart_item(row: &PgRow) -> Result<CartItem, StoreError> {
    Ok(CartItem {
        id: row.try_get("id").map_err(decode)?,
        user_id: row.try_get("user_id").map_err(decode)?,
        product_id: row.try_get("product_id").map_err(decode)?,
        quantity: row.try_get("quantity").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
    })
}

pub(crate) fn wishlist_item(row: &PgRow) -> Result<WishlistItem, StoreError> {
    Ok(WishlistItem {
        id: row.try_get("id").map_err(decode)?,
        user_id: row.try_get("user_id").map_err(decode)?,
        product_id: row.try_get("product_id").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
    })
}

pub(crate) fn address(row: &PgRow) -> Result<SavedAddress, StoreError> {
    Ok(SavedAddress {
        id: row.try_get("id").map_err(decode)?,
        user_id: row.try_get("user_id").map_err(decode)?,
        address: Address {
            full_name: row.try_get("full_name").map_err(decode)?,
            phone: row.try_get("phone").map_err(decode)?,
            address_line: row.try_get("address_line").map_err(decode)?,
            city: row.try_get("city").map_err(decode)?,
            state: row.try_get("state").map_err(decode)?,
            pincode: row.try_get("pincode").map_err(decode)?,
        },
        is_default: row.try_get("is_default").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
    })
}

pub(crate) fn order(row: &PgRow) -> Result<Order, StoreError> {
    let address: serde_json::Value = row.try_get("address_snapshot").map_err(decode)?;
    let status: String = row.try_get("order_status").map_err(decode)?;
    Ok(Order {
        id: row.try_get("id").map_err(decode)?,
        user_id: row.try_get("user_id").map_err(decode)?,
        address_snapshot: serde_json::from_value(address)
            .map_err(|e| StoreError::Backend(format!("address_snapshot: {e}")))?,
        subtotal_micros: row.try_get("subtotal_micros").map_err(decode)?,
        shipping_cost_micros: row.try_get("shipping_cost_micros").map_err(decode)?,
        total_micros: row.try_get("total_micros").map_err(decode)?,
        payment_method: row.try_get("payment_method").map_err(decode)?,
        payment_status: row.try_get("payment_status").map_err(decode)?,
        order_status: OrderStatus::parse(&status).map_err(status_err)?,
        notes: row.try_get("notes").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
    })
}

pub(crate) fn order_item(row: &PgRow) -> Result<OrderItem, StoreError> {
    let snapshot: serde_json::Value = row.try_get("product_snapshot").map_err(decode)?;
    let status: String = row.try_get("supplier_status").map_err(decode)?;
    Ok(OrderItem {
        id: row.try_get("id").map_err(decode)?,
        order_id: row.try_get("order_id").map_err(decode)?,
        product_id: row.try_get("product_id").map_err(decode)?,
        product_snapshot: serde_json::from_value(snapshot)
            .map_err(|e| StoreError::Backend(format!("product_snapshot: {e}")))?,
        quantity: row.try_get("quantity").map_err(decode)?,
        price_micros: row.try_get("price_micros").map_err(decode)?,
        supplier_status: SupplierItemStatus::parse(&status).map_err(status_err)?,
        created_at: row.try_get("created_at").map_err(decode)?,
    })
}
