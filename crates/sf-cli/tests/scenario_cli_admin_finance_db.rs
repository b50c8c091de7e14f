//! `sf admin approve` and `sf finance price` walk a product to the catalog.
//!
//! DB-backed, skipped if SF_DATABASE_URL is not set.

use std::sync::Arc;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use sf_catalog::ProductDraft;
use sf_db::PgBackend;
use sf_schemas::{Role, SupplierApprovalStatus};
use sf_workflow::{ChangeFeed, IdentityStore, LocalDirStore, Workflow, WorkflowSettings};
use uuid::Uuid;

fn sf(url: &str) -> std::process::Command {
    let mut cmd = std::process::Command::cargo_bin("sf-cli").expect("sf-cli binary");
    cmd.env(sf_db::ENV_DB_URL, url);
    cmd
}

#[tokio::test]
async fn cli_forwards_and_prices_a_submitted_product() -> anyhow::Result<()> {
    let url = match std::env::var(sf_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: SF_DATABASE_URL not set");
            return Ok(());
        }
    };

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await?;
    sf_db::migrate(&pool).await?;

    let admin = Uuid::new_v4();
    let finance = Uuid::new_v4();
    let supplier = Uuid::new_v4();

    for (user, role) in [(admin, "admin"), (finance, "finance")] {
        sf(&url)
            .args(["role", "grant", "--user", &user.to_string(), "--role", role])
            .assert()
            .success()
            .stdout(predicate::str::contains("granted=true"));
    }

    let backend = Arc::new(PgBackend::new(pool, ChangeFeed::new(8)));
    backend.grant_role(supplier, Role::Supplier).await?;
    backend.ensure_profile(supplier, None).await?;
    backend
        .set_supplier_approval(supplier, SupplierApprovalStatus::Approved)
        .await?;
    let wf = Workflow::new(
        backend,
        Arc::new(LocalDirStore::new("./target/cli-test-images", "http://localhost/media")),
        WorkflowSettings::default(),
    );
    let report = wf
        .submit_products(
            supplier,
            vec![ProductDraft {
                name: format!("Cli Tea {}", Uuid::new_v4()),
                sku: Some("PCS".into()),
                stock_quantity: Some(20),
                price: Some("200".into()),
                ..ProductDraft::default()
            }],
        )
        .await?;
    let id = report.created[0].id.to_string();

    // A finance user is not an admin.
    sf(&url)
        .args(["admin", "approve", "--actor", &finance.to_string(), "--id", &id])
        .assert()
        .failure();

    sf(&url)
        .args([
            "admin",
            "approve",
            "--actor",
            &admin.to_string(),
            "--id",
            &id,
            "--stock-override",
            "5",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("status=finance_pending"))
        .stdout(predicate::str::contains("stock=5"));

    sf(&url)
        .args([
            "finance",
            "price",
            "--actor",
            &finance.to_string(),
            "--id",
            &id,
            "--price",
            "260.00",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("status=approved price=260.00"));

    sf(&url)
        .args(["queue", "--view", "catalog"])
        .assert()
        .success()
        .stdout(predicate::str::contains(id.as_str()));

    Ok(())
}
