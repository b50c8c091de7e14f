//! Collaborator boundary: persistence and object storage.
//!
//! The workflow never talks to a database or bucket directly. It holds an
//! `Arc<dyn Backend>` and an `Arc<dyn ObjectStore>`; `sf-db` provides the
//! Postgres implementation and `sf-testkit` an in-memory one.
//!
//! Every write is expected to publish the matching [`sf_schemas::ChangeEvent`]
//! on the backend's change feed after it commits.

use std::fmt;

use sf_catalog::{ProductFilter, ProductPatch};
use sf_schemas::{
    Address, ApprovalStatus, Brand, CartItem, Category, NewBrand, NewCategory, NewOrder,
    NewOrderItem, NewProduct, NewProductImage, Order, OrderItem, Product, ProductImage, Profile,
    Role, SavedAddress, SupplierApprovalStatus, SupplierItemStatus,
};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    NotFound { table: &'static str, id: Uuid },
    /// Compare-and-set lost: the row moved on since it was read.
    Conflict { table: &'static str, id: Uuid },
    /// Unique constraint violated (e.g. product already in cart).
    Duplicate(String),
    /// Transport, driver or decoding failure.
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound { table, id } => write!(f, "{table} row {id} not found"),
            StoreError::Conflict { table, id } => {
                write!(f, "{table} row {id} was changed by someone else")
            }
            StoreError::Duplicate(msg) => write!(f, "{msg}"),
            StoreError::Backend(msg) => write!(f, "backend error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Store traits
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
pub trait ProductStore: Send + Sync {
    async fn insert_product(&self, new: NewProduct) -> StoreResult<Product>;

    async fn fetch_product(&self, id: Uuid) -> StoreResult<Option<Product>>;

    /// Products matching `filter`, newest first.
    async fn list_products(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>>;

    /// Apply `patch` only if the row's status is still `expected`.
    ///
    /// Returns [`StoreError::Conflict`] when the status has moved and
    /// [`StoreError::NotFound`] when the row is gone.
    async fn update_product(
        &self,
        id: Uuid,
        expected: ApprovalStatus,
        patch: &ProductPatch,
    ) -> StoreResult<Product>;

    /// Delete the row, only while its status is still `expected` when given.
    ///
    /// Returns `false` when the row is already gone and
    /// [`StoreError::Conflict`] when the status has moved.
    async fn delete_product(&self, id: Uuid, expected: Option<ApprovalStatus>)
        -> StoreResult<bool>;

    async fn insert_image(&self, new: NewProductImage) -> StoreResult<ProductImage>;

    /// Remove every image row of `product_id`; returns how many went.
    async fn delete_images(&self, product_id: Uuid) -> StoreResult<u64>;

    /// Images for the given products ordered by `sort_order`, then age.
    async fn list_images(&self, product_ids: &[Uuid]) -> StoreResult<Vec<ProductImage>>;
}

#[async_trait::async_trait]
pub trait IdentityStore: Send + Sync {
    async fn roles_for(&self, user_id: Uuid) -> StoreResult<Vec<Role>>;

    async fn fetch_profile(&self, user_id: Uuid) -> StoreResult<Option<Profile>>;

    /// Profiles of every user holding `role`, newest first. Users without a
    /// profile row are left out.
    async fn list_profiles_with_role(&self, role: Role) -> StoreResult<Vec<Profile>>;

    async fn list_supplier_profiles(&self) -> StoreResult<Vec<Profile>> {
        self.list_profiles_with_role(Role::Supplier).await
    }

    /// Sets `approval_status` and `is_verified = (status == approved)`.
    async fn set_supplier_approval(
        &self,
        user_id: Uuid,
        status: SupplierApprovalStatus,
    ) -> StoreResult<Profile>;
}

#[async_trait::async_trait]
pub trait TaxonomyStore: Send + Sync {
    /// Active categories ordered by name.
    async fn list_categories(&self) -> StoreResult<Vec<Category>>;

    async fn insert_category(&self, new: NewCategory) -> StoreResult<Category>;

    /// Active brands ordered by name.
    async fn list_brands(&self) -> StoreResult<Vec<Brand>>;

    async fn insert_brand(&self, new: NewBrand) -> StoreResult<Brand>;
}

#[async_trait::async_trait]
pub trait CommerceStore: Send + Sync {
    /// [`StoreError::Duplicate`] when the product is already in the cart.
    async fn add_to_cart(&self, user_id: Uuid, product_id: Uuid, quantity: i64)
        -> StoreResult<CartItem>;

    async fn list_cart(&self, user_id: Uuid) -> StoreResult<Vec<CartItem>>;

    async fn clear_cart(&self, user_id: Uuid) -> StoreResult<u64>;

    /// Returns `true` when the product is now wishlisted.
    async fn toggle_wishlist(&self, user_id: Uuid, product_id: Uuid) -> StoreResult<bool>;

    /// Insert the order and all its items as one unit.
    async fn create_order(
        &self,
        order: NewOrder,
        items: Vec<NewOrderItem>,
    ) -> StoreResult<(Order, Vec<OrderItem>)>;

    /// The user's orders, newest first.
    async fn list_orders(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<Order>>;

    /// The default address first, then newest first.
    async fn list_addresses(&self, user_id: Uuid) -> StoreResult<Vec<SavedAddress>>;

    /// With `make_default`, every other address of the user stops being the
    /// default in the same unit of work.
    async fn insert_address(
        &self,
        user_id: Uuid,
        address: Address,
        make_default: bool,
    ) -> StoreResult<SavedAddress>;

    /// [`StoreError::NotFound`] unless `id` belongs to `user_id`.
    async fn set_default_address(&self, user_id: Uuid, id: Uuid) -> StoreResult<SavedAddress>;

    /// Items whose product snapshot belongs to `supplier_id`, newest first.
    async fn list_supplier_order_items(
        &self,
        supplier_id: Uuid,
        pending_only: bool,
    ) -> StoreResult<Vec<OrderItem>>;

    async fn fetch_order_item(&self, id: Uuid) -> StoreResult<Option<OrderItem>>;

    /// Compare-and-set on `supplier_status`.
    async fn set_order_item_status(
        &self,
        id: Uuid,
        expected: SupplierItemStatus,
        status: SupplierItemStatus,
    ) -> StoreResult<OrderItem>;
}

/// Everything the workflow needs from persistence, as one object.
pub trait Backend: ProductStore + IdentityStore + TaxonomyStore + CommerceStore {}

impl<T> Backend for T where T: ProductStore + IdentityStore + TaxonomyStore + CommerceStore {}

// ---------------------------------------------------------------------------
// ObjectStore
// ---------------------------------------------------------------------------

/// Public-read object bucket for product images.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, name: &str, bytes: Vec<u8>, content_type: &str) -> StoreResult<()>;

    async fn get(&self, name: &str) -> StoreResult<Option<Vec<u8>>>;

    /// URL under which `name` is publicly readable.
    fn public_url(&self, name: &str) -> String;
}
