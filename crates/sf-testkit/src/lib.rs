//! sf-testkit
//!
//! In-memory collaborators and a seeded harness for exercising the workflow
//! without Postgres. Used by the scenario tests here and by sf-daemon's
//! router tests.

pub mod memory;
pub mod objects;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use sf_catalog::{ImageUpload, ProductDraft, MICROS_PER_UNIT};
use sf_schemas::{Address, ApprovalStatus, Product, Role, SupplierApprovalStatus};
use sf_workflow::{ChangeFeed, ObjectStore, Workflow, WorkflowSettings};
use uuid::Uuid;

pub use memory::MemoryBackend;
pub use objects::{FailingObjectStore, MemoryObjectStore, MEMORY_BASE_URL};

/// One backend, one feed and one user per role.
pub struct Harness {
    pub backend: Arc<MemoryBackend>,
    pub objects: Arc<MemoryObjectStore>,
    pub feed: ChangeFeed,
    pub workflow: Workflow,
    pub admin: Uuid,
    pub finance: Uuid,
    /// Holds the supplier role and an approved profile.
    pub supplier: Uuid,
    /// Holds no role.
    pub customer: Uuid,
}

impl Harness {
    pub async fn new() -> Self {
        let objects = Arc::new(MemoryObjectStore::new());
        Self::with_objects(Arc::clone(&objects) as Arc<dyn ObjectStore>, objects).await
    }

    /// Harness whose uploads always fail.
    pub async fn with_failing_uploads() -> Self {
        Self::with_objects(Arc::new(FailingObjectStore), Arc::new(MemoryObjectStore::new())).await
    }

    async fn with_objects(store: Arc<dyn ObjectStore>, objects: Arc<MemoryObjectStore>) -> Self {
        let feed = ChangeFeed::new(256);
        let backend = Arc::new(MemoryBackend::new(feed.clone()));
        let workflow = Workflow::new(
            Arc::clone(&backend) as Arc<dyn sf_workflow::Backend>,
            store,
            WorkflowSettings::default(),
        );

        let admin = Uuid::new_v4();
        let finance = Uuid::new_v4();
        let supplier = Uuid::new_v4();
        let customer = Uuid::new_v4();
        backend.grant_role(admin, Role::Admin).await;
        backend.grant_role(finance, Role::Finance).await;
        backend.grant_role(supplier, Role::Supplier).await;
        backend
            .put_profile(supplier, SupplierApprovalStatus::Approved)
            .await;

        Self {
            backend,
            objects,
            feed,
            workflow,
            admin,
            finance,
            supplier,
            customer,
        }
    }

    /// A second supplier with the given approval status.
    pub async fn add_supplier(&self, status: SupplierApprovalStatus) -> Uuid {
        let id = Uuid::new_v4();
        self.backend.grant_role(id, Role::Supplier).await;
        self.backend.put_profile(id, status).await;
        id
    }

    /// Submit one draft as the harness supplier and return the created row.
    pub async fn submit(&self, draft: ProductDraft) -> Result<Product> {
        let report = self
            .workflow
            .submit_products(self.supplier, vec![draft])
            .await
            .context("submit draft")?;
        report
            .created
            .into_iter()
            .next()
            .context("submission created no rows")
    }

    /// Walk a product through admin and finance approval.
    pub async fn publish(&self, draft: ProductDraft, price_units: i64) -> Result<Product> {
        let p = self.submit(draft).await?;
        self.workflow
            .admin_approve(self.admin, p.id, None)
            .await
            .context("admin approve")?;
        self.workflow
            .finance_approve(self.finance, p.id, price_units * MICROS_PER_UNIT)
            .await
            .context("finance approve")
    }

    /// Insert an already-approved row directly.
    pub async fn seed_approved(&self, name: &str, category_id: Option<Uuid>) -> Product {
        let now = Utc::now();
        let p = Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: format!("{}-{}", name.to_lowercase().replace(' ', "-"), Uuid::new_v4()),
            description: None,
            category_id,
            brand_id: None,
            supplier_id: Some(self.supplier),
            sku: Some("PCS".into()),
            weight: None,
            currency: "INR".into(),
            price_micros: 100 * MICROS_PER_UNIT,
            supplier_price_micros: Some(80 * MICROS_PER_UNIT),
            finance_price_micros: Some(100 * MICROS_PER_UNIT),
            discount_percent: 0,
            stock_quantity: 10,
            is_active: true,
            is_featured: false,
            approval_status: ApprovalStatus::Approved,
            finance_status: None,
            finance_approved_at: Some(now),
            finance_approved_by: Some(self.finance),
            created_at: now,
            updated_at: now,
        };
        self.backend.seed_product(p.clone()).await;
        p
    }
}

/// A valid single-row draft.
pub fn draft(name: &str, price: &str, stock: i64) -> ProductDraft {
    ProductDraft {
        name: name.to_string(),
        price: Some(price.to_string()),
        stock_quantity: Some(stock),
        sku: Some("PCS".into()),
        ..ProductDraft::default()
    }
}

pub fn png_upload(file_name: &str) -> ImageUpload {
    ImageUpload {
        file_name: file_name.to_string(),
        content_type: "image/png".to_string(),
        bytes: vec![0x89, b'P', b'N', b'G'],
    }
}

pub fn address() -> Address {
    Address {
        full_name: "Asha Rao".into(),
        phone: "9000000000".into(),
        address_line: "12 Market Road".into(),
        city: "Pune".into(),
        state: "MH".into(),
        pincode: "411001".into(),
    }
}
