use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tables that publish change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Products,
    ProductImages,
    Profiles,
    UserRoles,
    Orders,
    OrderItems,
    Categories,
    Brands,
    Wishlist,
    Cart,
    Addresses,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Products => "products",
            Table::ProductImages => "product_images",
            Table::Profiles => "profiles",
            Table::UserRoles => "user_roles",
            Table::Orders => "orders",
            Table::OrderItems => "order_items",
            Table::Categories => "categories",
            Table::Brands => "brands",
            Table::Wishlist => "wishlist",
            Table::Cart => "cart",
            Table::Addresses => "addresses",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let t = match s {
            "products" => Table::Products,
            "product_images" => Table::ProductImages,
            "profiles" => Table::Profiles,
            "user_roles" => Table::UserRoles,
            "orders" => Table::Orders,
            "order_items" => Table::OrderItems,
            "categories" => Table::Categories,
            "brands" => Table::Brands,
            "wishlist" => Table::Wishlist,
            "cart" => Table::Cart,
            "addresses" => Table::Addresses,
            _ => return None,
        };
        Some(t)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row-level change, carrying the before/after images as JSON.
///
/// `old` is `None` for inserts and `new` is `None` for deletes. Consumers must
/// not assume either image decodes into a typed row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub row_id: Uuid,
    pub old: Option<serde_json::Value>,
    pub new: Option<serde_json::Value>,
}

impl ChangeEvent {
    pub fn insert<T: Serialize>(table: Table, row_id: Uuid, new: &T) -> Self {
        Self {
            table,
            kind: ChangeKind::Insert,
            row_id,
            old: None,
            new: serde_json::to_value(new).ok(),
        }
    }

    pub fn update<T: Serialize>(table: Table, row_id: Uuid, old: &T, new: &T) -> Self {
        Self {
            table,
            kind: ChangeKind::Update,
            row_id,
            old: serde_json::to_value(old).ok(),
            new: serde_json::to_value(new).ok(),
        }
    }

    pub fn delete<T: Serialize>(table: Table, row_id: Uuid, old: &T) -> Self {
        Self {
            table,
            kind: ChangeKind::Delete,
            row_id,
            old: serde_json::to_value(old).ok(),
            new: None,
        }
    }
}
