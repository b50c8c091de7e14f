//! In-memory backend implementing every store port.
//!
//! Behaves like the Postgres backend where the workflow can observe it:
//! compare-and-set updates, unique (user, product) cart/wishlist rows,
//! newest-first listing, cascade on product delete, and one change event per
//! committed write. Fault switches let scenarios fail specific writes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use sf_catalog::{ProductFilter, ProductPatch};
use sf_schemas::{
    Address, ApprovalStatus, Brand, CartItem, Category, ChangeEvent, NewBrand, NewCategory,
    NewOrder, NewOrderItem, NewProduct, NewProductImage, Order, OrderItem, OrderStatus, Product,
    ProductImage, Profile, Role, SavedAddress, SupplierApprovalStatus, SupplierItemStatus, Table,
    UserRole, WishlistItem,
};
use sf_workflow::{
    ChangeFeed, CommerceStore, IdentityStore, ProductStore, StoreError, StoreResult,
    TaxonomyStore,
};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    products: Vec<Product>,
    images: Vec<ProductImage>,
    profiles: HashMap<Uuid, Profile>,
    roles: Vec<UserRole>,
    categories: Vec<Category>,
    brands: Vec<Brand>,
    orders: Vec<Order>,
    order_items: Vec<OrderItem>,
    cart: Vec<CartItem>,
    wishlist: Vec<WishlistItem>,
    addresses: Vec<SavedAddress>,
}

pub struct MemoryBackend {
    tables: Mutex<Tables>,
    feed: ChangeFeed,
    /// Remaining product inserts before every further insert fails.
    product_inserts_left: Mutex<Option<usize>>,
    fail_image_rows: AtomicBool,
}

impl MemoryBackend {
    pub fn new(feed: ChangeFeed) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            feed,
            product_inserts_left: Mutex::new(None),
            fail_image_rows: AtomicBool::new(false),
        }
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    // -----------------------------------------------------------------------
    // Fault injection
    // -----------------------------------------------------------------------

    /// Allow `n` more product inserts, then fail every one after.
    pub async fn fail_product_inserts_after(&self, n: usize) {
        *self.product_inserts_left.lock().await = Some(n);
    }

    pub fn fail_image_rows(&self, fail: bool) {
        self.fail_image_rows.store(fail, Ordering::SeqCst);
    }

    // -----------------------------------------------------------------------
    // Seeding
    // -----------------------------------------------------------------------

    pub async fn grant_role(&self, user_id: Uuid, role: Role) {
        let row = UserRole {
            id: Uuid::new_v4(),
            user_id,
            role,
            created_at: Utc::now(),
        };
        self.tables.lock().await.roles.push(row.clone());
        self.feed
            .publish(ChangeEvent::insert(Table::UserRoles, row.id, &row));
    }

    pub async fn put_profile(&self, user_id: Uuid, status: SupplierApprovalStatus) -> Profile {
        let now = Utc::now();
        let profile = Profile {
            id: user_id,
            full_name: Some("Test Supplier".into()),
            email: Some(format!("{user_id}@example.test")),
            phone: None,
            business_name: Some("Test Traders".into()),
            business_address: None,
            gst_number: None,
            is_verified: status == SupplierApprovalStatus::Approved,
            approval_status: status,
            created_at: now,
            updated_at: now,
        };
        self.tables
            .lock()
            .await
            .profiles
            .insert(user_id, profile.clone());
        profile
    }

    /// Insert a fully-formed row, bypassing the lifecycle.
    pub async fn seed_product(&self, product: Product) {
        self.tables.lock().await.products.push(product.clone());
        self.feed
            .publish(ChangeEvent::insert(Table::Products, product.id, &product));
    }

    pub async fn images_for(&self, product_id: Uuid) -> Vec<ProductImage> {
        self.tables
            .lock()
            .await
            .images
            .iter()
            .filter(|i| i.product_id == product_id)
            .cloned()
            .collect()
    }

    pub async fn product_count(&self) -> usize {
        self.tables.lock().await.products.len()
    }

    fn publish_demoted(&self, demoted: &[(SavedAddress, SavedAddress)]) {
        for (old, new) in demoted {
            self.feed
                .publish(ChangeEvent::update(Table::Addresses, new.id, old, new));
        }
    }

    pub async fn orders_for(&self, user_id: Uuid) -> Vec<Order> {
        self.tables
            .lock()
            .await
            .orders
            .iter()
            .filter(|o| o.user_id == Some(user_id))
            .cloned()
            .collect()
    }
}

/// Newest first: `created_at` descending, later insertion wins ties.
fn newest_first<T: Clone>(rows: &[T], created: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    let mut out: Vec<T> = rows.iter().rev().cloned().collect();
    out.sort_by_key(|r| std::cmp::Reverse(created(r)));
    out
}

/// Clear `is_default` on the user's other addresses; returns `(old, new)` pairs.
fn demote_defaults(
    rows: &mut [SavedAddress],
    user_id: Uuid,
    keep: Uuid,
) -> Vec<(SavedAddress, SavedAddress)> {
    let mut changed = Vec::new();
    for a in rows
        .iter_mut()
        .filter(|a| a.user_id == user_id && a.id != keep && a.is_default)
    {
        let old = a.clone();
        a.is_default = false;
        changed.push((old, a.clone()));
    }
    changed
}

fn not_found(table: &'static str, id: Uuid) -> StoreError {
    StoreError::NotFound { table, id }
}

// ---------------------------------------------------------------------------
// ProductStore
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl ProductStore for MemoryBackend {
    async fn insert_product(&self, new: NewProduct) -> StoreResult<Product> {
        {
            let mut left = self.product_inserts_left.lock().await;
            match left.as_mut() {
                Some(0) => return Err(StoreError::Backend("product insert refused".into())),
                Some(n) => *n -= 1,
                None => {}
            }
        }
        let now = Utc::now();
        let p = Product {
            id: Uuid::new_v4(),
            name: new.name,
            slug: new.slug,
            description: new.description,
            category_id: new.category_id,
            brand_id: new.brand_id,
            supplier_id: new.supplier_id,
            sku: new.sku,
            weight: new.weight,
            currency: new.currency,
            price_micros: new.price_micros,
            supplier_price_micros: None,
            finance_price_micros: None,
            discount_percent: new.discount_percent,
            stock_quantity: new.stock_quantity,
            is_active: new.is_active,
            is_featured: false,
            approval_status: new.approval_status,
            finance_status: None,
            finance_approved_at: None,
            finance_approved_by: None,
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().await.products.push(p.clone());
        self.feed.publish(ChangeEvent::insert(Table::Products, p.id, &p));
        Ok(p)
    }

    async fn fetch_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        let t = self.tables.lock().await;
        Ok(t.products.iter().find(|p| p.id == id).cloned())
    }

    async fn list_products(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>> {
        let t = self.tables.lock().await;
        let matching: Vec<Product> = t
            .products
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        let mut out = newest_first(&matching, |p| p.created_at);
        if let Some(n) = filter.limit {
            out.truncate(n.max(0) as usize);
        }
        Ok(out)
    }

    async fn update_product(
        &self,
        id: Uuid,
        expected: ApprovalStatus,
        patch: &ProductPatch,
    ) -> StoreResult<Product> {
        let (old, new) = {
            let mut t = self.tables.lock().await;
            let row = t
                .products
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or_else(|| not_found("products", id))?;
            if row.approval_status != expected {
                return Err(StoreError::Conflict {
                    table: "products",
                    id,
                });
            }
            let old = row.clone();
            patch.apply_to(row, Utc::now());
            (old, row.clone())
        };
        self.feed
            .publish(ChangeEvent::update(Table::Products, id, &old, &new));
        Ok(new)
    }

    async fn delete_product(
        &self,
        id: Uuid,
        expected: Option<ApprovalStatus>,
    ) -> StoreResult<bool> {
        let removed = {
            let mut t = self.tables.lock().await;
            let Some(pos) = t.products.iter().position(|p| p.id == id) else {
                return Ok(false);
            };
            if expected.is_some_and(|s| t.products[pos].approval_status != s) {
                return Err(StoreError::Conflict {
                    table: "products",
                    id,
                });
            }
            let removed = t.products.remove(pos);
            t.images.retain(|i| i.product_id != id);
            t.cart.retain(|c| c.product_id != id);
            t.wishlist.retain(|w| w.product_id != id);
            for item in t.order_items.iter_mut().filter(|i| i.product_id == Some(id)) {
                item.product_id = None;
            }
            removed
        };
        self.feed
            .publish(ChangeEvent::delete(Table::Products, id, &removed));
        Ok(true)
    }

    async fn insert_image(&self, new: NewProductImage) -> StoreResult<ProductImage> {
        if self.fail_image_rows.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("product_images insert refused".into()));
        }
        let img = ProductImage {
            id: Uuid::new_v4(),
            product_id: new.product_id,
            image_url: new.image_url,
            alt_text: new.alt_text,
            sort_order: new.sort_order,
            created_at: Utc::now(),
        };
        {
            let mut t = self.tables.lock().await;
            if !t.products.iter().any(|p| p.id == img.product_id) {
                return Err(not_found("products", img.product_id));
            }
            t.images.push(img.clone());
        }
        self.feed
            .publish(ChangeEvent::insert(Table::ProductImages, img.id, &img));
        Ok(img)
    }

    async fn delete_images(&self, product_id: Uuid) -> StoreResult<u64> {
        let removed: Vec<ProductImage> = {
            let mut t = self.tables.lock().await;
            let (gone, kept) = std::mem::take(&mut t.images)
                .into_iter()
                .partition(|i| i.product_id == product_id);
            t.images = kept;
            gone
        };
        for img in &removed {
            self.feed
                .publish(ChangeEvent::delete(Table::ProductImages, img.id, img));
        }
        Ok(removed.len() as u64)
    }

    async fn list_images(&self, product_ids: &[Uuid]) -> StoreResult<Vec<ProductImage>> {
        let t = self.tables.lock().await;
        let mut out: Vec<ProductImage> = t
            .images
            .iter()
            .filter(|i| product_ids.contains(&i.product_id))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// IdentityStore
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl IdentityStore for MemoryBackend {
    async fn roles_for(&self, user_id: Uuid) -> StoreResult<Vec<Role>> {
        let t = self.tables.lock().await;
        Ok(t.roles
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.role)
            .collect())
    }

    async fn fetch_profile(&self, user_id: Uuid) -> StoreResult<Option<Profile>> {
        Ok(self.tables.lock().await.profiles.get(&user_id).cloned())
    }

    async fn list_profiles_with_role(&self, role: Role) -> StoreResult<Vec<Profile>> {
        let t = self.tables.lock().await;
        let mut out: Vec<Profile> = t
            .profiles
            .values()
            .filter(|p| t.roles.iter().any(|r| r.user_id == p.id && r.role == role))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn set_supplier_approval(
        &self,
        user_id: Uuid,
        status: SupplierApprovalStatus,
    ) -> StoreResult<Profile> {
        let (old, new) = {
            let mut t = self.tables.lock().await;
            let row = t
                .profiles
                .get_mut(&user_id)
                .ok_or_else(|| not_found("profiles", user_id))?;
            let old = row.clone();
            row.approval_status = status;
            row.is_verified = status == SupplierApprovalStatus::Approved;
            row.updated_at = Utc::now();
            (old, row.clone())
        };
        self.feed
            .publish(ChangeEvent::update(Table::Profiles, user_id, &old, &new));
        Ok(new)
    }
}

// ---------------------------------------------------------------------------
// TaxonomyStore
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl TaxonomyStore for MemoryBackend {
    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let t = self.tables.lock().await;
        let mut out: Vec<Category> = t.categories.iter().filter(|c| c.is_active).cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn insert_category(&self, new: NewCategory) -> StoreResult<Category> {
        let c = Category {
            id: Uuid::new_v4(),
            name: new.name,
            slug: new.slug,
            parent_id: new.parent_id,
            image_url: None,
            display_order: new.display_order,
            is_active: true,
            created_at: Utc::now(),
        };
        {
            let mut t = self.tables.lock().await;
            if t.categories.iter().any(|x| x.slug == c.slug) {
                return Err(StoreError::Duplicate(format!("category {} already exists", c.slug)));
            }
            t.categories.push(c.clone());
        }
        self.feed
            .publish(ChangeEvent::insert(Table::Categories, c.id, &c));
        Ok(c)
    }

    async fn list_brands(&self) -> StoreResult<Vec<Brand>> {
        let t = self.tables.lock().await;
        let mut out: Vec<Brand> = t.brands.iter().filter(|b| b.is_active).cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn insert_brand(&self, new: NewBrand) -> StoreResult<Brand> {
        let b = Brand {
            id: Uuid::new_v4(),
            name: new.name,
            slug: new.slug,
            logo_url: None,
            country: new.country,
            is_featured: new.is_featured,
            is_active: true,
            created_at: Utc::now(),
        };
        {
            let mut t = self.tables.lock().await;
            if t.brands.iter().any(|x| x.slug == b.slug) {
                return Err(StoreError::Duplicate(format!("brand {} already exists", b.slug)));
            }
            t.brands.push(b.clone());
        }
        self.feed.publish(ChangeEvent::insert(Table::Brands, b.id, &b));
        Ok(b)
    }
}

// ---------------------------------------------------------------------------
// CommerceStore
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl CommerceStore for MemoryBackend {
    async fn add_to_cart(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i64,
    ) -> StoreResult<CartItem> {
        let item = CartItem {
            id: Uuid::new_v4(),
            user_id,
            product_id,
            quantity,
            created_at: Utc::now(),
        };
        {
            let mut t = self.tables.lock().await;
            if t
                .cart
                .iter()
                .any(|c| c.user_id == user_id && c.product_id == product_id)
            {
                return Err(StoreError::Duplicate("product already in cart".into()));
            }
            t.cart.push(item.clone());
        }
        self.feed.publish(ChangeEvent::insert(Table::Cart, item.id, &item));
        Ok(item)
    }

    async fn list_cart(&self, user_id: Uuid) -> StoreResult<Vec<CartItem>> {
        let t = self.tables.lock().await;
        let mine: Vec<CartItem> = t
            .cart
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        Ok(newest_first(&mine, |c| c.created_at))
    }

    async fn clear_cart(&self, user_id: Uuid) -> StoreResult<u64> {
        let removed: Vec<CartItem> = {
            let mut t = self.tables.lock().await;
            let (gone, keep): (Vec<CartItem>, Vec<CartItem>) =
                t.cart.drain(..).partition(|c| c.user_id == user_id);
            t.cart = keep;
            gone
        };
        for c in &removed {
            self.feed.publish(ChangeEvent::delete(Table::Cart, c.id, c));
        }
        Ok(removed.len() as u64)
    }

    async fn toggle_wishlist(&self, user_id: Uuid, product_id: Uuid) -> StoreResult<bool> {
        let mut t = self.tables.lock().await;
        if let Some(pos) = t
            .wishlist
            .iter()
            .position(|w| w.user_id == user_id && w.product_id == product_id)
        {
            let gone = t.wishlist.remove(pos);
            drop(t);
            self.feed
                .publish(ChangeEvent::delete(Table::Wishlist, gone.id, &gone));
            return Ok(false);
        }
        let w = WishlistItem {
            id: Uuid::new_v4(),
            user_id,
            product_id,
            created_at: Utc::now(),
        };
        t.wishlist.push(w.clone());
        drop(t);
        self.feed.publish(ChangeEvent::insert(Table::Wishlist, w.id, &w));
        Ok(true)
    }

    async fn create_order(
        &self,
        order: NewOrder,
        items: Vec<NewOrderItem>,
    ) -> StoreResult<(Order, Vec<OrderItem>)> {
        let now = Utc::now();
        let o = Order {
            id: Uuid::new_v4(),
            user_id: order.user_id,
            address_snapshot: order.address_snapshot,
            subtotal_micros: order.subtotal_micros,
            shipping_cost_micros: order.shipping_cost_micros,
            total_micros: order.total_micros,
            payment_method: order.payment_method,
            payment_status: order.payment_status,
            order_status: OrderStatus::Placed,
            notes: order.notes,
            created_at: now,
        };
        let rows: Vec<OrderItem> = items
            .into_iter()
            .map(|i| OrderItem {
                id: Uuid::new_v4(),
                order_id: o.id,
                product_id: Some(i.product_id),
                product_snapshot: i.product_snapshot,
                quantity: i.quantity,
                price_micros: i.price_micros,
                supplier_status: SupplierItemStatus::Pending,
                created_at: now,
            })
            .collect();
        {
            let mut t = self.tables.lock().await;
            t.orders.push(o.clone());
            t.order_items.extend(rows.iter().cloned());
        }
        self.feed.publish(ChangeEvent::insert(Table::Orders, o.id, &o));
        for r in &rows {
            self.feed
                .publish(ChangeEvent::insert(Table::OrderItems, r.id, r));
        }
        Ok((o, rows))
    }

    async fn list_orders(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<Order>> {
        let t = self.tables.lock().await;
        let mine: Vec<Order> = t
            .orders
            .iter()
            .filter(|o| o.user_id == Some(user_id))
            .cloned()
            .collect();
        let mut out = newest_first(&mine, |o| o.created_at);
        out.truncate(limit.max(0) as usize);
        Ok(out)
    }

    async fn list_addresses(&self, user_id: Uuid) -> StoreResult<Vec<SavedAddress>> {
        let t = self.tables.lock().await;
        let mine: Vec<SavedAddress> = t
            .addresses
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        let mut out = newest_first(&mine, |a| a.created_at);
        out.sort_by_key(|a| !a.is_default);
        Ok(out)
    }

    async fn insert_address(
        &self,
        user_id: Uuid,
        address: Address,
        make_default: bool,
    ) -> StoreResult<SavedAddress> {
        let row = SavedAddress {
            id: Uuid::new_v4(),
            user_id,
            address,
            is_default: make_default,
            created_at: Utc::now(),
        };
        let demoted = {
            let mut t = self.tables.lock().await;
            let demoted = if make_default {
                demote_defaults(&mut t.addresses, user_id, row.id)
            } else {
                Vec::new()
            };
            t.addresses.push(row.clone());
            demoted
        };
        self.publish_demoted(&demoted);
        self.feed
            .publish(ChangeEvent::insert(Table::Addresses, row.id, &row));
        Ok(row)
    }

    async fn set_default_address(&self, user_id: Uuid, id: Uuid) -> StoreResult<SavedAddress> {
        let (demoted, old, new) = {
            let mut t = self.tables.lock().await;
            let pos = t
                .addresses
                .iter()
                .position(|a| a.id == id && a.user_id == user_id)
                .ok_or_else(|| not_found("addresses", id))?;
            let demoted = demote_defaults(&mut t.addresses, user_id, id);
            let old = t.addresses[pos].clone();
            t.addresses[pos].is_default = true;
            (demoted, old, t.addresses[pos].clone())
        };
        self.publish_demoted(&demoted);
        if old != new {
            self.feed
                .publish(ChangeEvent::update(Table::Addresses, id, &old, &new));
        }
        Ok(new)
    }

    async fn list_supplier_order_items(
        &self,
        supplier_id: Uuid,
        pending_only: bool,
    ) -> StoreResult<Vec<OrderItem>> {
        let t = self.tables.lock().await;
        let mine: Vec<OrderItem> = t
            .order_items
            .iter()
            .filter(|i| i.product_snapshot.supplier_id == Some(supplier_id))
            .filter(|i| !pending_only || i.supplier_status == SupplierItemStatus::Pending)
            .cloned()
            .collect();
        Ok(newest_first(&mine, |i| i.created_at))
    }

    async fn fetch_order_item(&self, id: Uuid) -> StoreResult<Option<OrderItem>> {
        let t = self.tables.lock().await;
        Ok(t.order_items.iter().find(|i| i.id == id).cloned())
    }

    async fn set_order_item_status(
        &self,
        id: Uuid,
        expected: SupplierItemStatus,
        status: SupplierItemStatus,
    ) -> StoreResult<OrderItem> {
        let (old, new) = {
            let mut t = self.tables.lock().await;
            let row = t
                .order_items
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| not_found("order_items", id))?;
            if row.supplier_status != expected {
                return Err(StoreError::Conflict {
                    table: "order_items",
                    id,
                });
            }
            let old = row.clone();
            row.supplier_status = status;
            (old, row.clone())
        };
        self.feed
            .publish(ChangeEvent::update(Table::OrderItems, id, &old, &new));
        Ok(new)
    }
}
