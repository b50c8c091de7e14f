//! The storefront workflow: every role's operations over the collaborator ports.
//!
//! Each operation resolves the caller's capabilities first, validates before
//! any write, and persists lifecycle changes as compare-and-set updates on
//! the status the change was planned against.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use sf_catalog::{
    check_supplier_delete, currency_symbol, discounted_price, format_price, image_object_name,
    is_catalog_visible, margin_preview, plan, price_order, slug_of, supplier_item_transition,
    validate_batch, Capabilities, CartLine, ImageUpload, LifecycleAction, OrderError,
    ProductDraft, ProductEdit, ProductFilter, ProductView, ValidationError,
};
use sf_schemas::{
    Address, ApprovalStatus, Brand, CartItem, Category, NewBrand, NewCategory, NewOrder,
    NewProductImage, Order, OrderItem, Product, ProductImage, Profile, Role, SavedAddress,
    SupplierApprovalStatus, SupplierItemStatus,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::caps::CapabilityService;
use crate::error::{WorkflowError, WorkflowResult};
use crate::ports::{Backend, ObjectStore, StoreError, StoreResult};
use crate::queue::QueueView;

/// Similar-products rail size on the product page.
pub const SIMILAR_LIMIT: i64 = 4;

/// Orders shown on the account page.
pub const RECENT_ORDERS_LIMIT: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowSettings {
    pub max_submission_rows: usize,
    pub default_list_limit: i64,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            max_submission_rows: 50,
            default_list_limit: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionWarning {
    pub product_id: Uuid,
    pub message: String,
}

/// Outcome of a successful batch. Image failures are warnings, not errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionReport {
    pub created: Vec<Product>,
    pub warnings: Vec<SubmissionWarning>,
}

/// Outcome of a supplier edit. A failed image replacement is a warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditReport {
    pub product: Product,
    pub warnings: Vec<SubmissionWarning>,
}

/// A catalog-visible product as a customer sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub product: Product,
    pub image_url: Option<String>,
    pub display_price_micros: i64,
    pub display_price: String,
    pub currency_symbol: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogQuery {
    pub category_id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub offers: bool,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginPreview {
    pub product_id: Uuid,
    pub supplier_price_micros: i64,
    /// `None` when the input is empty/unparsable or the supplier price is zero.
    pub margin_percent: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AdminDecision {
    Approve { stock_override: Option<i64> },
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveAddress {
    #[serde(flatten)]
    pub address: Address,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub address: Address,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Workflow {
    backend: Arc<dyn Backend>,
    objects: Arc<dyn ObjectStore>,
    caps: CapabilityService,
    settings: WorkflowSettings,
}

impl Workflow {
    pub fn new(
        backend: Arc<dyn Backend>,
        objects: Arc<dyn ObjectStore>,
        settings: WorkflowSettings,
    ) -> Self {
        let caps = CapabilityService::new(Arc::clone(&backend));
        Self {
            backend,
            objects,
            caps,
            settings,
        }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn objects(&self) -> &Arc<dyn ObjectStore> {
        &self.objects
    }

    pub fn settings(&self) -> WorkflowSettings {
        self.settings
    }

    /// A live queue over this workflow's backend.
    pub fn queue(&self, view: ProductView) -> Arc<QueueView> {
        QueueView::new(view, Arc::clone(&self.backend), self.settings.default_list_limit)
    }

    // -----------------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------------

    pub async fn capabilities(&self, actor: Uuid) -> WorkflowResult<Capabilities> {
        Ok(self.caps.resolve(actor).await?)
    }

    pub async fn sign_out(&self, actor: Uuid) {
        self.caps.invalidate(actor).await;
        info!(user_id = %actor, "session closed");
    }

    async fn require(&self, actor: Uuid, role: Role) -> WorkflowResult<Capabilities> {
        let caps = self.caps.resolve(actor).await?;
        caps.require(role)?;
        Ok(caps)
    }

    async fn require_approved_supplier(&self, actor: Uuid) -> WorkflowResult<()> {
        self.require(actor, Role::Supplier).await?;
        let status = self
            .backend
            .fetch_profile(actor)
            .await?
            .map(|p| p.approval_status);
        match status {
            Some(SupplierApprovalStatus::Approved) => Ok(()),
            status => Err(WorkflowError::SupplierNotApproved { status }),
        }
    }

    // -----------------------------------------------------------------------
    // Supplier submission
    // -----------------------------------------------------------------------

    /// Validate the whole batch, then create one pending product per row.
    ///
    /// A failed product insert stops the batch; rows created before it stay.
    /// A failed image upload or image row insert keeps the product and is
    /// reported as a warning.
    pub async fn submit_products(
        &self,
        actor: Uuid,
        drafts: Vec<ProductDraft>,
    ) -> WorkflowResult<SubmissionReport> {
        self.require_approved_supplier(actor).await?;
        let valid = validate_batch(drafts, self.settings.max_submission_rows)?;

        let mut report = SubmissionReport::default();
        for draft in valid {
            let millis = Utc::now().timestamp_millis();
            let product = match self
                .backend
                .insert_product(draft.to_new_product(actor, millis))
                .await
            {
                Ok(p) => p,
                Err(e) => {
                    error!(
                        supplier_id = %actor,
                        created = report.created.len(),
                        error = %e,
                        "product insert failed; batch stopped"
                    );
                    return Err(e.into());
                }
            };
            info!(product_id = %product.id, supplier_id = %actor, "product submitted");

            if let Some(image) = draft.image {
                if let Err(e) = self.attach_image(&product, image, millis).await {
                    warn!(product_id = %product.id, error = %e, "product added but image failed");
                    report.warnings.push(SubmissionWarning {
                        product_id: product.id,
                        message: format!("product added but image failed: {e}"),
                    });
                }
            }
            report.created.push(product);
        }
        Ok(report)
    }

    async fn attach_image(
        &self,
        product: &Product,
        image: ImageUpload,
        millis: i64,
    ) -> StoreResult<ProductImage> {
        let row = self.store_image(product, image, millis).await?;
        self.backend.insert_image(row).await
    }

    /// Upload first; the old image rows go only once the new object is stored.
    async fn replace_image(
        &self,
        product: &Product,
        image: ImageUpload,
        millis: i64,
    ) -> StoreResult<ProductImage> {
        let row = self.store_image(product, image, millis).await?;
        let dropped = self.backend.delete_images(product.id).await?;
        if dropped > 0 {
            info!(product_id = %product.id, dropped, "old product images removed");
        }
        self.backend.insert_image(row).await
    }

    async fn store_image(
        &self,
        product: &Product,
        image: ImageUpload,
        millis: i64,
    ) -> StoreResult<NewProductImage> {
        let name = image_object_name(millis, product.id, &image.file_name);
        self.objects
            .put(&name, image.bytes, &image.content_type)
            .await?;
        Ok(NewProductImage {
            product_id: product.id,
            image_url: self.objects.public_url(&name),
            alt_text: Some(product.name.clone()),
            sort_order: 0,
        })
    }

    // -----------------------------------------------------------------------
    // Supplier product management
    // -----------------------------------------------------------------------

    pub async fn supplier_products(&self, actor: Uuid) -> WorkflowResult<Vec<Product>> {
        self.require(actor, Role::Supplier).await?;
        Ok(self
            .backend
            .list_products(&ProductFilter::default().supplier(actor))
            .await?)
    }

    /// Replace the editable fields; with `image`, also replace the product's
    /// image once the update has landed.
    pub async fn supplier_edit(
        &self,
        actor: Uuid,
        id: Uuid,
        edit: ProductEdit,
        image: Option<ImageUpload>,
    ) -> WorkflowResult<EditReport> {
        self.require(actor, Role::Supplier).await?;
        let product = self.load_owned(actor, id).await?;
        let product = self
            .transition(&product, LifecycleAction::SupplierEdit(edit))
            .await?;

        let mut warnings = Vec::new();
        if let Some(image) = image {
            let millis = Utc::now().timestamp_millis();
            if let Err(e) = self.replace_image(&product, image, millis).await {
                warn!(product_id = %product.id, error = %e, "product updated but image failed");
                warnings.push(SubmissionWarning {
                    product_id: product.id,
                    message: format!("product updated but image failed: {e}"),
                });
            }
        }
        Ok(EditReport { product, warnings })
    }

    pub async fn supplier_delete(&self, actor: Uuid, id: Uuid) -> WorkflowResult<()> {
        self.require(actor, Role::Supplier).await?;
        let product = self.load_owned(actor, id).await?;
        check_supplier_delete(&product)?;
        self.delete(id, Some(product.approval_status)).await
    }

    /// Admins toggle any product; suppliers only their own, before approval.
    pub async fn set_active(&self, actor: Uuid, id: Uuid, active: bool) -> WorkflowResult<Product> {
        let caps = self.caps.resolve(actor).await?;
        if caps.admin {
            let product = self.load_product(id).await?;
            return self
                .transition(&product, LifecycleAction::AdminSetActive(active))
                .await;
        }
        caps.require(Role::Supplier)?;
        let product = self.load_owned(actor, id).await?;
        self.transition(&product, LifecycleAction::SupplierSetActive(active))
            .await
    }

    // -----------------------------------------------------------------------
    // Admin gate
    // -----------------------------------------------------------------------

    pub async fn admin_queue(&self, actor: Uuid) -> WorkflowResult<Vec<Product>> {
        self.require(actor, Role::Admin).await?;
        self.list_view(ProductView::AdminQueue).await
    }

    pub async fn admin_approve(
        &self,
        actor: Uuid,
        id: Uuid,
        stock_override: Option<i64>,
    ) -> WorkflowResult<Product> {
        self.require(actor, Role::Admin).await?;
        let product = self.load_product(id).await?;
        self.transition(&product, LifecycleAction::AdminApprove { stock_override })
            .await
    }

    pub async fn admin_reject(&self, actor: Uuid, id: Uuid) -> WorkflowResult<Product> {
        self.require(actor, Role::Admin).await?;
        let product = self.load_product(id).await?;
        self.transition(&product, LifecycleAction::AdminReject).await
    }

    pub async fn admin_decide(
        &self,
        actor: Uuid,
        id: Uuid,
        decision: AdminDecision,
    ) -> WorkflowResult<Product> {
        match decision {
            AdminDecision::Approve { stock_override } => {
                self.admin_approve(actor, id, stock_override).await
            }
            AdminDecision::Reject => self.admin_reject(actor, id).await,
        }
    }

    /// Decide from a live admin queue: the row leaves `queue` immediately and
    /// comes back if the write fails.
    pub async fn admin_decide_in(
        &self,
        queue: &QueueView,
        actor: Uuid,
        id: Uuid,
        decision: AdminDecision,
    ) -> WorkflowResult<Product> {
        let wf = self.clone();
        let remote = async move { wf.admin_decide(actor, id, decision).await }.boxed();
        queue.remove_optimistically(id, remote).await
    }

    pub async fn admin_products(&self, actor: Uuid) -> WorkflowResult<Vec<Product>> {
        self.require(actor, Role::Admin).await?;
        Ok(self.backend.list_products(&ProductFilter::default()).await?)
    }

    pub async fn admin_delete(&self, actor: Uuid, id: Uuid) -> WorkflowResult<()> {
        self.require(actor, Role::Admin).await?;
        self.delete(id, None).await
    }

    // -----------------------------------------------------------------------
    // Finance
    // -----------------------------------------------------------------------

    pub async fn finance_queue(&self, actor: Uuid) -> WorkflowResult<Vec<Product>> {
        self.require(actor, Role::Finance).await?;
        self.list_view(ProductView::FinanceQueue).await
    }

    /// Live margin feedback for a price being typed. Never persisted.
    pub async fn margin_preview(
        &self,
        actor: Uuid,
        id: Uuid,
        input: &str,
    ) -> WorkflowResult<MarginPreview> {
        self.require(actor, Role::Finance).await?;
        let product = self.load_product(id).await?;
        let supplier = product.supplier_price_micros.unwrap_or(product.price_micros);
        Ok(MarginPreview {
            product_id: id,
            supplier_price_micros: supplier,
            margin_percent: margin_preview(supplier, input),
        })
    }

    pub async fn finance_approve(
        &self,
        actor: Uuid,
        id: Uuid,
        price_micros: i64,
    ) -> WorkflowResult<Product> {
        self.require(actor, Role::Finance).await?;
        let product = self.load_product(id).await?;
        self.transition(
            &product,
            LifecycleAction::FinanceApprove {
                price_micros,
                approved_by: actor,
                at: Utc::now(),
            },
        )
        .await
    }

    /// Price from a live finance queue, with optimistic removal.
    pub async fn finance_approve_in(
        &self,
        queue: &QueueView,
        actor: Uuid,
        id: Uuid,
        price_micros: i64,
    ) -> WorkflowResult<Product> {
        let wf = self.clone();
        let remote = async move { wf.finance_approve(actor, id, price_micros).await }.boxed();
        queue.remove_optimistically(id, remote).await
    }

    // -----------------------------------------------------------------------
    // Supplier approvals
    // -----------------------------------------------------------------------

    /// Supplier profiles, pending first, then newest first.
    pub async fn supplier_profiles(&self, actor: Uuid) -> WorkflowResult<Vec<Profile>> {
        self.require(actor, Role::Admin).await?;
        let mut profiles = self.backend.list_supplier_profiles().await?;
        profiles.sort_by(|a, b| {
            let a_pending = a.approval_status == SupplierApprovalStatus::Pending;
            let b_pending = b.approval_status == SupplierApprovalStatus::Pending;
            b_pending
                .cmp(&a_pending)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(profiles)
    }

    pub async fn decide_supplier(
        &self,
        actor: Uuid,
        supplier_id: Uuid,
        status: SupplierApprovalStatus,
    ) -> WorkflowResult<Profile> {
        self.require(actor, Role::Admin).await?;
        let profile = self
            .backend
            .set_supplier_approval(supplier_id, status)
            .await?;
        info!(supplier_id = %supplier_id, status = status.as_str(), "supplier decision");
        Ok(profile)
    }

    /// Users holding the finance role who have a profile, newest first.
    pub async fn finance_users(&self, actor: Uuid) -> WorkflowResult<Vec<Profile>> {
        self.require(actor, Role::Admin).await?;
        Ok(self.backend.list_profiles_with_role(Role::Finance).await?)
    }

    // -----------------------------------------------------------------------
    // Catalog (public)
    // -----------------------------------------------------------------------

    pub async fn catalog(&self, q: &CatalogQuery) -> WorkflowResult<Vec<CatalogEntry>> {
        let mut filter = ProductFilter::catalog().limit(
            q.limit
                .filter(|n| *n > 0)
                .unwrap_or(self.settings.default_list_limit),
        );
        if let Some(c) = q.category_id {
            filter = filter.category(c);
        }
        if let Some(b) = q.brand_id {
            filter = filter.brand(b);
        }
        if q.featured {
            filter = filter.featured();
        }
        if q.offers {
            filter = filter.on_offer();
        }
        let products = self.backend.list_products(&filter).await?;
        self.decorate(products).await
    }

    pub async fn catalog_product(&self, id: Uuid) -> WorkflowResult<CatalogEntry> {
        let product = self.load_visible(id).await?;
        let mut entries = self.decorate(vec![product]).await?;
        entries
            .pop()
            .ok_or(WorkflowError::Store(StoreError::NotFound {
                table: "products",
                id,
            }))
    }

    /// Same category, excluding the product itself.
    pub async fn similar_products(&self, id: Uuid) -> WorkflowResult<Vec<CatalogEntry>> {
        let product = self.load_visible(id).await?;
        let Some(category) = product.category_id else {
            return Ok(Vec::new());
        };
        let filter = ProductFilter::catalog()
            .category(category)
            .excluding(id)
            .limit(SIMILAR_LIMIT);
        let products = self.backend.list_products(&filter).await?;
        self.decorate(products).await
    }

    async fn load_visible(&self, id: Uuid) -> WorkflowResult<Product> {
        match self.backend.fetch_product(id).await? {
            Some(p) if is_catalog_visible(&p) => Ok(p),
            _ => Err(StoreError::NotFound {
                table: "products",
                id,
            }
            .into()),
        }
    }

    async fn decorate(&self, products: Vec<Product>) -> WorkflowResult<Vec<CatalogEntry>> {
        let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
        let mut first_image: HashMap<Uuid, String> = HashMap::new();
        if !ids.is_empty() {
            for img in self.backend.list_images(&ids).await? {
                first_image.entry(img.product_id).or_insert(img.image_url);
            }
        }
        Ok(products
            .into_iter()
            .map(|p| {
                let price = discounted_price(p.price_micros, p.discount_percent);
                CatalogEntry {
                    image_url: first_image.remove(&p.id),
                    display_price_micros: price,
                    display_price: format_price(price),
                    currency_symbol: currency_symbol(&p.currency).to_string(),
                    product: p,
                }
            })
            .collect())
    }

    // -----------------------------------------------------------------------
    // Taxonomy
    // -----------------------------------------------------------------------

    pub async fn categories(&self) -> WorkflowResult<Vec<Category>> {
        Ok(self.backend.list_categories().await?)
    }

    pub async fn brands(&self) -> WorkflowResult<Vec<Brand>> {
        Ok(self.backend.list_brands().await?)
    }

    pub async fn create_category(
        &self,
        actor: Uuid,
        name: &str,
        parent_id: Option<Uuid>,
        display_order: i32,
    ) -> WorkflowResult<Category> {
        self.require(actor, Role::Admin).await?;
        let name = required_name(name)?;
        let category = self
            .backend
            .insert_category(NewCategory {
                slug: slug_of(&name),
                name,
                parent_id,
                display_order,
            })
            .await?;
        info!(category_id = %category.id, "category created");
        Ok(category)
    }

    pub async fn create_brand(
        &self,
        actor: Uuid,
        name: &str,
        country: Option<String>,
        is_featured: bool,
    ) -> WorkflowResult<Brand> {
        self.require(actor, Role::Admin).await?;
        let name = required_name(name)?;
        let brand = self
            .backend
            .insert_brand(NewBrand {
                slug: slug_of(&name),
                name,
                country,
                is_featured,
            })
            .await?;
        info!(brand_id = %brand.id, "brand created");
        Ok(brand)
    }

    // -----------------------------------------------------------------------
    // Shopping
    // -----------------------------------------------------------------------

    pub async fn add_to_cart(
        &self,
        actor: Uuid,
        product_id: Uuid,
        quantity: i64,
    ) -> WorkflowResult<CartItem> {
        self.caps.resolve(actor).await?;
        if quantity <= 0 {
            return Err(ValidationError::single("quantity", "must be at least 1").into());
        }
        self.load_visible(product_id).await?;
        Ok(self
            .backend
            .add_to_cart(actor, product_id, quantity)
            .await?)
    }

    pub async fn cart(&self, actor: Uuid) -> WorkflowResult<Vec<CartItem>> {
        self.caps.resolve(actor).await?;
        Ok(self.backend.list_cart(actor).await?)
    }

    pub async fn toggle_wishlist(&self, actor: Uuid, product_id: Uuid) -> WorkflowResult<bool> {
        self.caps.resolve(actor).await?;
        Ok(self.backend.toggle_wishlist(actor, product_id).await?)
    }

    /// Snapshot the cart into an order and empty it.
    pub async fn place_order(
        &self,
        actor: Uuid,
        req: PlaceOrder,
    ) -> WorkflowResult<(Order, Vec<OrderItem>)> {
        self.caps.resolve(actor).await?;
        validate_address(&req.address)?;

        let cart = self.backend.list_cart(actor).await?;
        let mut lines = Vec::with_capacity(cart.len());
        for item in cart {
            let product = self
                .backend
                .fetch_product(item.product_id)
                .await?
                .ok_or(OrderError::NotPurchasable {
                    product_id: item.product_id,
                })?;
            lines.push(CartLine {
                product,
                quantity: item.quantity,
            });
        }
        let priced = price_order(&lines)?;

        let order = NewOrder {
            user_id: Some(actor),
            address_snapshot: req.address,
            subtotal_micros: priced.subtotal_micros,
            shipping_cost_micros: priced.shipping_cost_micros,
            total_micros: priced.total_micros,
            payment_method: req
                .payment_method
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| "cod".to_string()),
            payment_status: "pending".to_string(),
            notes: req.notes,
        };
        let (order, items) = self.backend.create_order(order, priced.items).await?;
        self.backend.clear_cart(actor).await?;
        info!(order_id = %order.id, user_id = %actor, items = items.len(), "order placed");
        Ok((order, items))
    }

    // -----------------------------------------------------------------------
    // Account
    // -----------------------------------------------------------------------

    /// The caller's own orders, newest first; `limit` defaults to
    /// [`RECENT_ORDERS_LIMIT`] and is capped at the list limit.
    pub async fn my_orders(&self, actor: Uuid, limit: Option<i64>) -> WorkflowResult<Vec<Order>> {
        self.caps.resolve(actor).await?;
        let limit = limit
            .filter(|n| *n > 0)
            .unwrap_or(RECENT_ORDERS_LIMIT)
            .min(self.settings.default_list_limit);
        Ok(self.backend.list_orders(actor, limit).await?)
    }

    pub async fn addresses(&self, actor: Uuid) -> WorkflowResult<Vec<SavedAddress>> {
        self.caps.resolve(actor).await?;
        Ok(self.backend.list_addresses(actor).await?)
    }

    /// The first saved address becomes the default whatever `is_default` says.
    pub async fn add_address(&self, actor: Uuid, req: SaveAddress) -> WorkflowResult<SavedAddress> {
        self.caps.resolve(actor).await?;
        validate_address(&req.address)?;
        let first = self.backend.list_addresses(actor).await?.is_empty();
        let saved = self
            .backend
            .insert_address(actor, req.address, req.is_default || first)
            .await?;
        info!(user_id = %actor, address_id = %saved.id, is_default = saved.is_default, "address saved");
        Ok(saved)
    }

    pub async fn set_default_address(&self, actor: Uuid, id: Uuid) -> WorkflowResult<SavedAddress> {
        self.caps.resolve(actor).await?;
        Ok(self.backend.set_default_address(actor, id).await?)
    }

    // -----------------------------------------------------------------------
    // Supplier fulfilment
    // -----------------------------------------------------------------------

    pub async fn supplier_order_items(
        &self,
        actor: Uuid,
        pending_only: bool,
    ) -> WorkflowResult<Vec<OrderItem>> {
        self.require(actor, Role::Supplier).await?;
        Ok(self
            .backend
            .list_supplier_order_items(actor, pending_only)
            .await?)
    }

    pub async fn decide_order_item(
        &self,
        actor: Uuid,
        item_id: Uuid,
        decision: SupplierItemStatus,
    ) -> WorkflowResult<OrderItem> {
        self.require(actor, Role::Supplier).await?;
        let item = match self.backend.fetch_order_item(item_id).await? {
            Some(i) if i.product_snapshot.supplier_id == Some(actor) => i,
            _ => {
                return Err(StoreError::NotFound {
                    table: "order_items",
                    id: item_id,
                }
                .into())
            }
        };
        let next = supplier_item_transition(item.supplier_status, decision)?;
        let updated = self
            .backend
            .set_order_item_status(item_id, item.supplier_status, next)
            .await?;
        info!(order_item_id = %item_id, status = next.as_str(), "supplier item decision");
        Ok(updated)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn list_view(&self, view: ProductView) -> WorkflowResult<Vec<Product>> {
        let filter = view.filter().limit(self.settings.default_list_limit);
        Ok(self.backend.list_products(&filter).await?)
    }

    async fn load_product(&self, id: Uuid) -> WorkflowResult<Product> {
        self.backend.fetch_product(id).await?.ok_or_else(|| {
            StoreError::NotFound {
                table: "products",
                id,
            }
            .into()
        })
    }

    /// Another supplier's product is reported as missing.
    async fn load_owned(&self, actor: Uuid, id: Uuid) -> WorkflowResult<Product> {
        let product = self.load_product(id).await?;
        if product.supplier_id != Some(actor) {
            return Err(StoreError::NotFound {
                table: "products",
                id,
            }
            .into());
        }
        Ok(product)
    }

    async fn transition(&self, product: &Product, action: LifecycleAction) -> WorkflowResult<Product> {
        let patch = plan(product, &action).inspect_err(|e| {
            warn!(product_id = %product.id, action = action.name(), error = %e, "transition refused");
        })?;
        let updated = self
            .backend
            .update_product(product.id, product.approval_status, &patch)
            .await
            .inspect_err(|e| {
                warn!(product_id = %product.id, action = action.name(), error = %e, "transition write failed");
            })?;
        info!(
            product_id = %product.id,
            action = action.name(),
            from = product.approval_status.as_str(),
            to = updated.approval_status.as_str(),
            "product transition"
        );
        Ok(updated)
    }

    /// `expected` pins the status the delete was checked against.
    async fn delete(&self, id: Uuid, expected: Option<ApprovalStatus>) -> WorkflowResult<()> {
        let deleted = self
            .backend
            .delete_product(id, expected)
            .await
            .inspect_err(|e| warn!(product_id = %id, error = %e, "delete refused"))?;
        if !deleted {
            return Err(StoreError::NotFound {
                table: "products",
                id,
            }
            .into());
        }
        info!(product_id = %id, "product deleted");
        Ok(())
    }
}

fn required_name(name: &str) -> WorkflowResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::single("name", "is required").into());
    }
    Ok(name.to_string())
}

fn validate_address(a: &Address) -> WorkflowResult<()> {
    let fields = [
        ("full_name", &a.full_name),
        ("phone", &a.phone),
        ("address_line", &a.address_line),
        ("city", &a.city),
        ("state", &a.state),
        ("pincode", &a.pincode),
    ];
    for (field, value) in fields {
        if value.trim().is_empty() {
            return Err(ValidationError::single(field, "is required").into());
        }
    }
    Ok(())
}
