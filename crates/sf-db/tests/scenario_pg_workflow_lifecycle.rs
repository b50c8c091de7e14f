//! Scenario: the workflow over the Postgres backend.
//!
//! DB-backed tests, skipped if SF_DATABASE_URL is not set.

use std::sync::Arc;

use sf_catalog::{plan, LifecycleAction, ProductFilter, MICROS_PER_UNIT};
use sf_db::PgBackend;
use sf_schemas::{ApprovalStatus, ChangeKind, Role, SupplierApprovalStatus, Table};
use sf_testkit::{address, draft, MemoryObjectStore};
use sf_workflow::{
    ChangeFeed, IdentityStore, PlaceOrder, ProductStore, SaveAddress, StoreError, Workflow,
    WorkflowError, WorkflowSettings,
};
use uuid::Uuid;

struct Fixture {
    backend: Arc<PgBackend>,
    workflow: Workflow,
    admin: Uuid,
    finance: Uuid,
    supplier: Uuid,
}

async fn fixture() -> anyhow::Result<Option<Fixture>> {
    let url = match std::env::var(sf_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: SF_DATABASE_URL not set");
            return Ok(None);
        }
    };
    let pool = sf_db::connect(&url, 4).await?;
    sf_db::migrate(&pool).await?;

    let backend = Arc::new(PgBackend::new(pool, ChangeFeed::new(64)));
    let admin = Uuid::new_v4();
    let finance = Uuid::new_v4();
    let supplier = Uuid::new_v4();
    backend.grant_role(admin, Role::Admin).await?;
    backend.grant_role(finance, Role::Finance).await?;
    backend.grant_role(supplier, Role::Supplier).await?;
    backend.ensure_profile(supplier, None).await?;
    backend
        .set_supplier_approval(supplier, SupplierApprovalStatus::Approved)
        .await?;

    let workflow = Workflow::new(
        Arc::clone(&backend) as Arc<dyn sf_workflow::Backend>,
        Arc::new(MemoryObjectStore::new()),
        WorkflowSettings::default(),
    );
    Ok(Some(Fixture {
        backend,
        workflow,
        admin,
        finance,
        supplier,
    }))
}

#[tokio::test]
async fn product_reaches_catalog_and_is_purchasable() -> anyhow::Result<()> {
    let Some(f) = fixture().await? else {
        return Ok(());
    };
    let mut rx = f.backend.feed().subscribe();

    let name = format!("Pg Rice {}", Uuid::new_v4());
    let report = f
        .workflow
        .submit_products(f.supplier, vec![draft(&name, "200", 50)])
        .await?;
    let p = &report.created[0];

    let ev = rx.recv().await?;
    assert_eq!(ev.table, Table::Products);
    assert_eq!(ev.kind, ChangeKind::Insert);
    assert_eq!(ev.row_id, p.id);

    f.workflow.admin_approve(f.admin, p.id, Some(40)).await?;
    let live = f
        .workflow
        .finance_approve(f.finance, p.id, 260 * MICROS_PER_UNIT)
        .await?;
    assert_eq!(live.approval_status, ApprovalStatus::Approved);
    assert_eq!(live.stock_quantity, 40);
    assert_eq!(live.supplier_price_micros, Some(200 * MICROS_PER_UNIT));

    let visible = f
        .backend
        .list_products(&ProductFilter::catalog().supplier(f.supplier))
        .await?;
    assert!(visible.iter().any(|x| x.id == p.id));

    let customer = Uuid::new_v4();
    f.workflow.add_to_cart(customer, p.id, 2).await?;
    let dup = f.workflow.add_to_cart(customer, p.id, 1).await.unwrap_err();
    assert!(matches!(dup, WorkflowError::Store(StoreError::Duplicate(_))));

    let (order, items) = f
        .workflow
        .place_order(
            customer,
            PlaceOrder {
                address: address(),
                payment_method: None,
                notes: None,
            },
        )
        .await?;
    assert_eq!(order.total_micros, 520 * MICROS_PER_UNIT);
    assert_eq!(items[0].product_snapshot.id, p.id);
    assert!(f.workflow.cart(customer).await?.is_empty());

    let mine = f.workflow.supplier_order_items(f.supplier, true).await?;
    assert!(mine.iter().any(|i| i.order_id == order.id));
    Ok(())
}

#[tokio::test]
async fn stale_status_update_conflicts() -> anyhow::Result<()> {
    let Some(f) = fixture().await? else {
        return Ok(());
    };
    let name = format!("Pg Jar {}", Uuid::new_v4());
    let report = f
        .workflow
        .submit_products(f.supplier, vec![draft(&name, "30", 5)])
        .await?;
    let stale = report.created[0].clone();

    f.workflow.admin_reject(f.admin, stale.id).await?;

    let patch = plan(&stale, &LifecycleAction::AdminApprove { stock_override: None })?;
    let err = f
        .backend
        .update_product(stale.id, stale.approval_status, &patch)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict { .. }));

    let row = f.backend.fetch_product(stale.id).await?.unwrap();
    assert_eq!(row.approval_status, ApprovalStatus::Rejected);
    Ok(())
}

#[tokio::test]
async fn stale_status_delete_conflicts() -> anyhow::Result<()> {
    let Some(f) = fixture().await? else {
        return Ok(());
    };
    let name = format!("Pg Bell {}", Uuid::new_v4());
    let report = f
        .workflow
        .submit_products(f.supplier, vec![draft(&name, "60", 4)])
        .await?;
    let stale = report.created[0].clone();

    f.workflow.admin_approve(f.admin, stale.id, None).await?;

    let err = f
        .backend
        .delete_product(stale.id, Some(stale.approval_status))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict { .. }));
    assert!(f.backend.fetch_product(stale.id).await?.is_some());

    assert!(f.backend.delete_product(stale.id, None).await?);
    assert!(!f.backend.delete_product(stale.id, None).await?);
    Ok(())
}

#[tokio::test]
async fn account_orders_addresses_and_finance_users() -> anyhow::Result<()> {
    let Some(f) = fixture().await? else {
        return Ok(());
    };
    let name = format!("Pg Cup {}", Uuid::new_v4());
    let report = f
        .workflow
        .submit_products(f.supplier, vec![draft(&name, "20", 9)])
        .await?;
    let p = &report.created[0];
    f.workflow.admin_approve(f.admin, p.id, None).await?;
    f.workflow
        .finance_approve(f.finance, p.id, 25 * MICROS_PER_UNIT)
        .await?;

    let customer = Uuid::new_v4();
    let mut placed = Vec::new();
    for _ in 0..2 {
        f.workflow.add_to_cart(customer, p.id, 1).await?;
        let (order, _) = f
            .workflow
            .place_order(
                customer,
                PlaceOrder {
                    address: address(),
                    payment_method: None,
                    notes: None,
                },
            )
            .await?;
        placed.push(order.id);
    }
    let recent = f.workflow.my_orders(customer, None).await?;
    assert_eq!(
        recent.iter().map(|o| o.id).collect::<Vec<_>>(),
        placed.iter().rev().copied().collect::<Vec<_>>()
    );

    let home = f
        .workflow
        .add_address(customer, SaveAddress { address: address(), is_default: false })
        .await?;
    assert!(home.is_default);
    let work = f
        .workflow
        .add_address(customer, SaveAddress { address: address(), is_default: true })
        .await?;
    let book = f.workflow.addresses(customer).await?;
    assert_eq!(book[0].id, work.id);
    assert_eq!(book.iter().filter(|a| a.is_default).count(), 1);

    f.workflow.set_default_address(customer, home.id).await?;
    let book = f.workflow.addresses(customer).await?;
    assert_eq!(book[0].id, home.id);

    f.backend.ensure_profile(f.finance, None).await?;
    let finance = f.workflow.finance_users(f.admin).await?;
    assert!(finance.iter().any(|p| p.id == f.finance));
    assert!(!finance.iter().any(|p| p.id == f.supplier));
    Ok(())
}
