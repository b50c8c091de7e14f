//! Postgres implementation of the workflow's store ports.
//!
//! Status changes are compare-and-set: the row is locked with `for update`,
//! its status checked against the caller's expectation, and the patched row
//! written back in the same transaction. Change events go out only after
//! commit.

use chrono::Utc;
use sf_catalog::{ProductFilter, ProductPatch};
use sf_schemas::{
    Address, ApprovalStatus, Brand, CartItem, Category, ChangeEvent, NewBrand, NewCategory,
    NewOrder, NewOrderItem, NewProduct, NewProductImage, Order, OrderItem, OrderStatus, Product,
    ProductImage, Profile, Role, SavedAddress, SupplierApprovalStatus, SupplierItemStatus, Table,
};
use sf_workflow::{
    ChangeFeed, CommerceStore, IdentityStore, ProductStore, StoreError, StoreResult,
    TaxonomyStore,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::rows::{
    self, store_err, ADDRESS_COLUMNS, ORDER_COLUMNS, ORDER_ITEM_COLUMNS, PRODUCT_COLUMNS,
    PROFILE_COLUMNS,
};

#[derive(Clone)]
pub struct PgBackend {
    pool: PgPool,
    feed: ChangeFeed,
}

impl PgBackend {
    pub fn new(pool: PgPool, feed: ChangeFeed) -> Self {
        Self { pool, feed }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    fn publish_demoted(&self, demoted: &[(SavedAddress, SavedAddress)]) {
        for (old, new) in demoted {
            self.feed
                .publish(ChangeEvent::update(Table::Addresses, new.id, old, new));
        }
    }

    /// Idempotent role grant. Roles are provisioned by operators, not by the workflow.
    pub async fn grant_role(&self, user_id: Uuid, role: Role) -> StoreResult<()> {
        let id = Uuid::new_v4();
        let res = sqlx::query(
            r#"
            insert into user_roles (id, user_id, role)
            values ($1, $2, $3)
            on conflict (user_id, role) do nothing
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("grant_role", e))?;
        if res.rows_affected() == 1 {
            self.feed.publish(ChangeEvent::insert(
                Table::UserRoles,
                id,
                &serde_json::json!({ "id": id, "user_id": user_id, "role": role.as_str() }),
            ));
        }
        Ok(())
    }

    /// Create the profile row if missing; never overwrites an existing one.
    pub async fn ensure_profile(&self, user_id: Uuid, email: Option<&str>) -> StoreResult<()> {
        sqlx::query(
            r#"
            insert into profiles (id, email)
            values ($1, $2)
            on conflict (id) do nothing
            "#,
        )
        .bind(user_id)
        .bind(email)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("ensure_profile", e))?;
        Ok(())
    }

    async fn fetch_product_in(
        &self,
        tx: &mut sqlx::Transaction<'_, Postgres>,
        id: Uuid,
    ) -> StoreResult<Option<Product>> {
        let sql = format!("select {PRODUCT_COLUMNS} from products where id = $1 for update");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| store_err("fetch_product", e))?;
        row.as_ref().map(rows::product).transpose()
    }
}

/// Clear `is_default` on the user's other addresses; returns `(old, new)` pairs.
async fn demote_defaults(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    user_id: Uuid,
    keep: Uuid,
) -> StoreResult<Vec<(SavedAddress, SavedAddress)>> {
    let sql = format!(
        r#"
        update addresses
        set is_default = false
        where user_id = $1 and id <> $2 and is_default
        returning {ADDRESS_COLUMNS}
        "#
    );
    let found = sqlx::query(&sql)
        .bind(user_id)
        .bind(keep)
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| store_err("demote_defaults", e))?;
    found
        .iter()
        .map(|row| {
            let new = rows::address(row)?;
            let old = SavedAddress {
                is_default: true,
                ..new.clone()
            };
            Ok((old, new))
        })
        .collect()
}

fn push_product_filter(qb: &mut QueryBuilder<'_, Postgres>, f: &ProductFilter) {
    qb.push(" where true");
    if let Some(s) = f.approval_status {
        qb.push(" and approval_status = ").push_bind(s.as_str());
    }
    if let Some(a) = f.is_active {
        qb.push(" and is_active = ").push_bind(a);
    }
    if let Some(c) = f.category_id {
        qb.push(" and category_id = ").push_bind(c);
    }
    if let Some(b) = f.brand_id {
        qb.push(" and brand_id = ").push_bind(b);
    }
    if let Some(s) = f.supplier_id {
        qb.push(" and supplier_id = ").push_bind(s);
    }
    if let Some(x) = f.exclude_id {
        qb.push(" and id <> ").push_bind(x);
    }
    if let Some(feat) = f.is_featured {
        qb.push(" and is_featured = ").push_bind(feat);
    }
    if let Some(d) = f.min_discount_percent {
        qb.push(" and discount_percent > ").push_bind(d);
    }
    qb.push(" order by created_at desc");
    if let Some(n) = f.limit {
        qb.push(" limit ").push_bind(n.max(0));
    }
}

// ---------------------------------------------------------------------------
// ProductStore
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl ProductStore for PgBackend {
    async fn insert_product(&self, new: NewProduct) -> StoreResult<Product> {
        let sql = format!(
            r#"
            insert into products (
              id, name, slug, description, category_id, brand_id, supplier_id, sku, weight,
              currency, price_micros, discount_percent, stock_quantity, is_active, approval_status
            ) values (
              $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15
            )
            returning {PRODUCT_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(&new.name)
            .bind(&new.slug)
            .bind(&new.description)
            .bind(new.category_id)
            .bind(new.brand_id)
            .bind(new.supplier_id)
            .bind(&new.sku)
            .bind(&new.weight)
            .bind(&new.currency)
            .bind(new.price_micros)
            .bind(new.discount_percent)
            .bind(new.stock_quantity)
            .bind(new.is_active)
            .bind(new.approval_status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_err("insert_product", e))?;
        let p = rows::product(&row)?;
        self.feed.publish(ChangeEvent::insert(Table::Products, p.id, &p));
        Ok(p)
    }

    async fn fetch_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        let sql = format!("select {PRODUCT_COLUMNS} from products where id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_err("fetch_product", e))?;
        row.as_ref().map(rows::product).transpose()
    }

    async fn list_products(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("select {PRODUCT_COLUMNS} from products"));
        push_product_filter(&mut qb, filter);
        let found = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_err("list_products", e))?;
        found.iter().map(rows::product).collect()
    }

    async fn update_product(
        &self,
        id: Uuid,
        expected: ApprovalStatus,
        patch: &ProductPatch,
    ) -> StoreResult<Product> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_err("update_product begin", e))?;

        let old = self
            .fetch_product_in(&mut tx, id)
            .await?
            .ok_or(StoreError::NotFound {
                table: "products",
                id,
            })?;
        if old.approval_status != expected {
            return Err(StoreError::Conflict {
                table: "products",
                id,
            });
        }

        let mut new = old.clone();
        patch.apply_to(&mut new, Utc::now());

        sqlx::query(
            r#"
            update products
            set name = $2,
                description = $3,
                category_id = $4,
                brand_id = $5,
                weight = $6,
                currency = $7,
                price_micros = $8,
                supplier_price_micros = $9,
                finance_price_micros = $10,
                discount_percent = $11,
                stock_quantity = $12,
                is_active = $13,
                approval_status = $14,
                finance_status = $15,
                finance_approved_at = $16,
                finance_approved_by = $17,
                updated_at = $18
            where id = $1
            "#,
        )
        .bind(id)
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.category_id)
        .bind(new.brand_id)
        .bind(&new.weight)
        .bind(&new.currency)
        .bind(new.price_micros)
        .bind(new.supplier_price_micros)
        .bind(new.finance_price_micros)
        .bind(new.discount_percent)
        .bind(new.stock_quantity)
        .bind(new.is_active)
        .bind(new.approval_status.as_str())
        .bind(new.finance_status.map(|s| s.as_str()))
        .bind(new.finance_approved_at)
        .bind(new.finance_approved_by)
        .bind(new.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| store_err("update_product", e))?;

        tx.commit()
            .await
            .map_err(|e| store_err("update_product commit", e))?;

        self.feed
            .publish(ChangeEvent::update(Table::Products, id, &old, &new));
        Ok(new)
    }

    async fn delete_product(
        &self,
        id: Uuid,
        expected: Option<ApprovalStatus>,
    ) -> StoreResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_err("delete_product begin", e))?;

        let Some(old) = self.fetch_product_in(&mut tx, id).await? else {
            return Ok(false);
        };
        if expected.is_some_and(|s| old.approval_status != s) {
            return Err(StoreError::Conflict {
                table: "products",
                id,
            });
        }

        sqlx::query("delete from products where id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| store_err("delete_product", e))?;

        tx.commit()
            .await
            .map_err(|e| store_err("delete_product commit", e))?;

        self.feed
            .publish(ChangeEvent::delete(Table::Products, id, &old));
        Ok(true)
    }

    async fn insert_image(&self, new: NewProductImage) -> StoreResult<ProductImage> {
        let row = sqlx::query(
            r#"
            insert into product_images (id, product_id, image_url, alt_text, sort_order)
            values ($1, $2, $3, $4, $5)
            returning id, product_id, image_url, alt_text, sort_order, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.product_id)
        .bind(&new.image_url)
        .bind(&new.alt_text)
        .bind(new.sort_order)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| store_err("insert_image", e))?;
        let img = rows::image(&row)?;
        self.feed
            .publish(ChangeEvent::insert(Table::ProductImages, img.id, &img));
        Ok(img)
    }

    async fn delete_images(&self, product_id: Uuid) -> StoreResult<u64> {
        let gone = sqlx::query(
            r#"
            delete from product_images
            where product_id = $1
            returning id, product_id, image_url, alt_text, sort_order, created_at
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_err("delete_images", e))?;
        for row in &gone {
            let img = rows::image(row)?;
            self.feed
                .publish(ChangeEvent::delete(Table::ProductImages, img.id, &img));
        }
        Ok(gone.len() as u64)
    }

    async fn list_images(&self, product_ids: &[Uuid]) -> StoreResult<Vec<ProductImage>> {
        let found = sqlx::query(
            r#"
            select id, product_id, image_url, alt_text, sort_order, created_at
            from product_images
            where product_id = any($1)
            order by sort_order asc, created_at asc
            "#,
        )
        .bind(product_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_err("list_images", e))?;
        found.iter().map(rows::image).collect()
    }
}

// ---------------------------------------------------------------------------
// IdentityStore
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl IdentityStore for PgBackend {
    async fn roles_for(&self, user_id: Uuid) -> StoreResult<Vec<Role>> {
        let found = sqlx::query_as::<_, (String,)>(
            "select role from user_roles where user_id = $1 order by created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_err("roles_for", e))?;
        found
            .into_iter()
            .map(|(r,)| Role::parse(&r).map_err(|e| StoreError::Backend(e.to_string())))
            .collect()
    }

    async fn fetch_profile(&self, user_id: Uuid) -> StoreResult<Option<Profile>> {
        let sql = format!("select {PROFILE_COLUMNS} from profiles where id = $1");
        let row = sqlx::query(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_err("fetch_profile", e))?;
        row.as_ref().map(rows::profile).transpose()
    }

    async fn list_profiles_with_role(&self, role: Role) -> StoreResult<Vec<Profile>> {
        let sql = format!(
            r#"
            select {PROFILE_COLUMNS}
            from profiles
            where id in (select user_id from user_roles where role = $1)
            order by created_at desc
            "#
        );
        let found = sqlx::query(&sql)
            .bind(role.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_err("list_profiles_with_role", e))?;
        found.iter().map(rows::profile).collect()
    }

    async fn set_supplier_approval(
        &self,
        user_id: Uuid,
        status: SupplierApprovalStatus,
    ) -> StoreResult<Profile> {
        let old = self
            .fetch_profile(user_id)
            .await?
            .ok_or(StoreError::NotFound {
                table: "profiles",
                id: user_id,
            })?;
        let sql = format!(
            r#"
            update profiles
            set approval_status = $2,
                is_verified = $3,
                updated_at = now()
            where id = $1
            returning {PROFILE_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(status.as_str())
            .bind(status == SupplierApprovalStatus::Approved)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_err("set_supplier_approval", e))?;
        let new = rows::profile(&row)?;
        self.feed
            .publish(ChangeEvent::update(Table::Profiles, user_id, &old, &new));
        Ok(new)
    }
}

// ---------------------------------------------------------------------------
// TaxonomyStore
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl TaxonomyStore for PgBackend {
    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let found = sqlx::query(
            r#"
            select id, name, slug, parent_id, image_url, display_order, is_active, created_at
            from categories
            where is_active
            order by name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_err("list_categories", e))?;
        found.iter().map(rows::category).collect()
    }

    async fn insert_category(&self, new: NewCategory) -> StoreResult<Category> {
        let row = sqlx::query(
            r#"
            insert into categories (id, name, slug, parent_id, display_order)
            values ($1, $2, $3, $4, $5)
            returning id, name, slug, parent_id, image_url, display_order, is_active, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.slug)
        .bind(new.parent_id)
        .bind(new.display_order)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| store_err("insert_category", e))?;
        let c = rows::category(&row)?;
        self.feed
            .publish(ChangeEvent::insert(Table::Categories, c.id, &c));
        Ok(c)
    }

    async fn list_brands(&self) -> StoreResult<Vec<Brand>> {
        let found = sqlx::query(
            r#"
            select id, name, slug, logo_url, country, is_featured, is_active, created_at
            from brands
            where is_active
            order by name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_err("list_brands", e))?;
        found.iter().map(rows::brand).collect()
    }

    async fn insert_brand(&self, new: NewBrand) -> StoreResult<Brand> {
        let row = sqlx::query(
            r#"
            insert into brands (id, name, slug, country, is_featured)
            values ($1, $2, $3, $4, $5)
            returning id, name, slug, logo_url, country, is_featured, is_active, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.slug)
        .bind(&new.country)
        .bind(new.is_featured)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| store_err("insert_brand", e))?;
        let b = rows::brand(&row)?;
        self.feed.publish(ChangeEvent::insert(Table::Brands, b.id, &b));
        Ok(b)
    }
}

// ---------------------------------------------------------------------------
// CommerceStore
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl CommerceStore for PgBackend {
    async fn add_to_cart(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i64,
    ) -> StoreResult<CartItem> {
        let row = sqlx::query(
            r#"
            insert into cart (id, user_id, product_id, quantity)
            values ($1, $2, $3, $4)
            returning id, user_id, product_id, quantity, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| store_err("product already in cart", e))?;
        let item = rows::cart_item(&row)?;
        self.feed.publish(ChangeEvent::insert(Table::Cart, item.id, &item));
        Ok(item)
    }

    async fn list_cart(&self, user_id: Uuid) -> StoreResult<Vec<CartItem>> {
        let found = sqlx::query(
            r#"
            select id, user_id, product_id, quantity, created_at
            from cart
            where user_id = $1
            order by created_at desc
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_err("list_cart", e))?;
        found.iter().map(rows::cart_item).collect()
    }

    async fn clear_cart(&self, user_id: Uuid) -> StoreResult<u64> {
        let gone = sqlx::query(
            r#"
            delete from cart
            where user_id = $1
            returning id, user_id, product_id, quantity, created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_err("clear_cart", e))?;
        for row in &gone {
            let item = rows::cart_item(row)?;
            self.feed.publish(ChangeEvent::delete(Table::Cart, item.id, &item));
        }
        Ok(gone.len() as u64)
    }

    async fn toggle_wishlist(&self, user_id: Uuid, product_id: Uuid) -> StoreResult<bool> {
        let removed = sqlx::query(
            r#"
            delete from wishlist
            where user_id = $1 and product_id = $2
            returning id, user_id, product_id, created_at
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_err("toggle_wishlist", e))?;
        if let Some(row) = removed {
            let w = rows::wishlist_item(&row)?;
            self.feed.publish(ChangeEvent::delete(Table::Wishlist, w.id, &w));
            return Ok(false);
        }

        let row = sqlx::query(
            r#"
            insert into wishlist (id, user_id, product_id)
            values ($1, $2, $3)
            returning id, user_id, product_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(product_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| store_err("toggle_wishlist", e))?;
        let w = rows::wishlist_item(&row)?;
        self.feed.publish(ChangeEvent::insert(Table::Wishlist, w.id, &w));
        Ok(true)
    }

    async fn create_order(
        &self,
        order: NewOrder,
        items: Vec<NewOrderItem>,
    ) -> StoreResult<(Order, Vec<OrderItem>)> {
        let address = serde_json::to_value(&order.address_snapshot)
            .map_err(|e| StoreError::Backend(format!("address_snapshot: {e}")))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_err("create_order begin", e))?;

        let sql = format!(
            r#"
            insert into orders (
              id, user_id, address_snapshot, subtotal_micros, shipping_cost_micros,
              total_micros, payment_method, payment_status, order_status, notes
            ) values (
              $1, $2, $3, $4, $5, $6, $7, $8, $9, $10
            )
            returning {ORDER_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(order.user_id)
            .bind(&address)
            .bind(order.subtotal_micros)
            .bind(order.shipping_cost_micros)
            .bind(order.total_micros)
            .bind(&order.payment_method)
            .bind(&order.payment_status)
            .bind(OrderStatus::Placed.as_str())
            .bind(&order.notes)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| store_err("create_order", e))?;
        let created = rows::order(&row)?;

        let sql = format!(
            r#"
            insert into order_items (
              id, order_id, product_id, product_snapshot, quantity, price_micros, supplier_status
            ) values (
              $1, $2, $3, $4, $5, $6, $7
            )
            returning {ORDER_ITEM_COLUMNS}
            "#
        );
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let snapshot = serde_json::to_value(&item.product_snapshot)
                .map_err(|e| StoreError::Backend(format!("product_snapshot: {e}")))?;
            let row = sqlx::query(&sql)
                .bind(Uuid::new_v4())
                .bind(created.id)
                .bind(item.product_id)
                .bind(&snapshot)
                .bind(item.quantity)
                .bind(item.price_micros)
                .bind(SupplierItemStatus::Pending.as_str())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| store_err("create_order item", e))?;
            out.push(rows::order_item(&row)?);
        }

        tx.commit()
            .await
            .map_err(|e| store_err("create_order commit", e))?;

        self.feed
            .publish(ChangeEvent::insert(Table::Orders, created.id, &created));
        for item in &out {
            self.feed
                .publish(ChangeEvent::insert(Table::OrderItems, item.id, item));
        }
        Ok((created, out))
    }

    async fn list_orders(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<Order>> {
        let sql = format!(
            "select {ORDER_COLUMNS} from orders where user_id = $1 order by created_at desc limit $2"
        );
        let found = sqlx::query(&sql)
            .bind(user_id)
            .bind(limit.max(0))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_err("list_orders", e))?;
        found.iter().map(rows::order).collect()
    }

    async fn list_addresses(&self, user_id: Uuid) -> StoreResult<Vec<SavedAddress>> {
        let sql = format!(
            r#"
            select {ADDRESS_COLUMNS}
            from addresses
            where user_id = $1
            order by is_default desc, created_at desc
            "#
        );
        let found = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_err("list_addresses", e))?;
        found.iter().map(rows::address).collect()
    }

    async fn insert_address(
        &self,
        user_id: Uuid,
        address: Address,
        make_default: bool,
    ) -> StoreResult<SavedAddress> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_err("insert_address begin", e))?;

        let id = Uuid::new_v4();
        let demoted = if make_default {
            demote_defaults(&mut tx, user_id, id).await?
        } else {
            Vec::new()
        };

        let sql = format!(
            r#"
            insert into addresses (
              id, user_id, full_name, phone, address_line, city, state, pincode, is_default
            ) values (
              $1, $2, $3, $4, $5, $6, $7, $8, $9
            )
            returning {ADDRESS_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(user_id)
            .bind(&address.full_name)
            .bind(&address.phone)
            .bind(&address.address_line)
            .bind(&address.city)
            .bind(&address.state)
            .bind(&address.pincode)
            .bind(make_default)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| store_err("insert_address", e))?;
        let created = rows::address(&row)?;

        tx.commit()
            .await
            .map_err(|e| store_err("insert_address commit", e))?;

        self.publish_demoted(&demoted);
        self.feed
            .publish(ChangeEvent::insert(Table::Addresses, created.id, &created));
        Ok(created)
    }

    async fn set_default_address(&self, user_id: Uuid, id: Uuid) -> StoreResult<SavedAddress> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_err("set_default_address begin", e))?;

        let sql = format!(
            "select {ADDRESS_COLUMNS} from addresses where id = $1 and user_id = $2 for update"
        );
        let old = sqlx::query(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| store_err("set_default_address", e))?
            .as_ref()
            .map(rows::address)
            .transpose()?
            .ok_or(StoreError::NotFound {
                table: "addresses",
                id,
            })?;

        let demoted = demote_defaults(&mut tx, user_id, id).await?;
        let sql = format!(
            "update addresses set is_default = true where id = $1 returning {ADDRESS_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| store_err("set_default_address", e))?;
        let new = rows::address(&row)?;

        tx.commit()
            .await
            .map_err(|e| store_err("set_default_address commit", e))?;

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
        let sql = format!(
            r#"
            select {ORDER_ITEM_COLUMNS}
            from order_items
            where product_snapshot->>'supplier_id' = $1
              and ($2 = false or supplier_status = 'pending')
            order by created_at desc
            "#
        );
        let found = sqlx::query(&sql)
            .bind(supplier_id.to_string())
            .bind(pending_only)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_err("list_supplier_order_items", e))?;
        found.iter().map(rows::order_item).collect()
    }

    async fn fetch_order_item(&self, id: Uuid) -> StoreResult<Option<OrderItem>> {
        let sql = format!("select {ORDER_ITEM_COLUMNS} from order_items where id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_err("fetch_order_item", e))?;
        row.as_ref().map(rows::order_item).transpose()
    }

    async fn set_order_item_status(
        &self,
        id: Uuid,
        expected: SupplierItemStatus,
        status: SupplierItemStatus,
    ) -> StoreResult<OrderItem> {
        let old = self
            .fetch_order_item(id)
            .await?
            .ok_or(StoreError::NotFound {
                table: "order_items",
                id,
            })?;
        let sql = format!(
            r#"
            update order_items
            set supplier_status = $3
            where id = $1 and supplier_status = $2
            returning {ORDER_ITEM_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(expected.as_str())
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_err("set_order_item_status", e))?;
        let Some(row) = row else {
            return Err(StoreError::Conflict {
                table: "order_items",
                id,
            });
        };
        let new = rows::order_item(&row)?;
        self.feed
            .publish(ChangeEvent::update(Table::OrderItems, id, &old, &new));
        Ok(new)
    }
}
