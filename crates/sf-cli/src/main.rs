use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sf_catalog::{margin_preview, parse_price_micros, ProductView};
use sf_config::StorageSettings;
use sf_db::PgBackend;
use sf_schemas::{Product, Role};
use sf_workflow::{ChangeFeed, LocalDirStore, ProductStore, Workflow, WorkflowSettings};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "sf")]
#[command(about = "Storefront operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> local -> ...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Margin a finance price would give over the supplier price
    Margin {
        #[arg(long)]
        supplier_price: String,

        #[arg(long)]
        price: String,
    },

    /// List the products in one role view
    Queue {
        /// admin | finance | catalog
        #[arg(long)]
        view: String,

        #[arg(long)]
        limit: Option<i64>,
    },

    /// Admin gate actions
    Admin {
        #[command(subcommand)]
        cmd: AdminCmd,
    },

    /// Finance gate actions
    Finance {
        #[command(subcommand)]
        cmd: FinanceCmd,
    },

    /// Role assignment (bootstrap the first admin)
    Role {
        #[command(subcommand)]
        cmd: RoleCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,
    Migrate,
}

#[derive(Subcommand)]
enum AdminCmd {
    /// Forward a pending product to finance (pending -> finance_pending)
    Approve {
        /// Acting admin user id
        #[arg(long)]
        actor: String,

        #[arg(long)]
        id: String,

        /// Lower the stock on approval; never raises it
        #[arg(long)]
        stock_override: Option<i64>,
    },

    /// Reject a pending product
    Reject {
        #[arg(long)]
        actor: String,

        #[arg(long)]
        id: String,
    },
}

#[derive(Subcommand)]
enum FinanceCmd {
    /// Set the customer price and publish (finance_pending -> approved)
    Price {
        /// Acting finance user id
        #[arg(long)]
        actor: String,

        #[arg(long)]
        id: String,

        /// Decimal price, e.g. 260.00
        #[arg(long)]
        price: String,
    },
}

#[derive(Subcommand)]
enum RoleCmd {
    Grant {
        #[arg(long)]
        user: String,

        /// admin | supplier | finance | user
        #[arg(long)]
        role: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = sf_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = sf_db::status(&pool).await?;
                    println!("db_ok={} has_products_table={}", s.ok, s.has_products_table);
                    if s.has_products_table {
                        for (status, n) in sf_db::count_by_status(&pool).await? {
                            println!("products_{status}={n}");
                        }
                    }
                }
                DbCmd::Migrate => {
                    sf_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = sf_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Margin {
            supplier_price,
            price,
        } => {
            let supplier = parse_price_micros(&supplier_price).context("invalid --supplier-price")?;
            match margin_preview(supplier, &price) {
                Some(m) => println!("margin_percent={m}"),
                None => println!("margin_percent=n/a"),
            }
        }

        Commands::Queue { view, limit } => {
            let v = ProductView::parse(&view)
                .with_context(|| format!("unknown view {view:?} (admin|finance|catalog)"))?;
            let (backend, _) = open_workflow().await?;
            let mut filter = v.filter();
            if let Some(n) = limit {
                filter = filter.limit(n);
            }
            let rows = backend.list_products(&filter).await?;
            println!("view={} count={}", v.as_str(), rows.len());
            for p in &rows {
                print_product(p);
            }
        }

        Commands::Admin { cmd } => {
            let (_, wf) = open_workflow().await?;
            let p = match cmd {
                AdminCmd::Approve {
                    actor,
                    id,
                    stock_override,
                } => {
                    wf.admin_approve(parse_id(&actor, "actor")?, parse_id(&id, "id")?, stock_override)
                        .await?
                }
                AdminCmd::Reject { actor, id } => {
                    wf.admin_reject(parse_id(&actor, "actor")?, parse_id(&id, "id")?)
                        .await?
                }
            };
            print_product(&p);
        }

        Commands::Finance { cmd } => match cmd {
            FinanceCmd::Price { actor, id, price } => {
                let micros = parse_price_micros(&price).context("invalid --price")?;
                let (_, wf) = open_workflow().await?;
                let p = wf
                    .finance_approve(parse_id(&actor, "actor")?, parse_id(&id, "id")?, micros)
                    .await?;
                print_product(&p);
            }
        },

        Commands::Role { cmd } => match cmd {
            RoleCmd::Grant { user, role } => {
                let user = parse_id(&user, "user")?;
                let role = Role::parse(&role).context("invalid --role")?;
                let (backend, _) = open_workflow().await?;
                backend.grant_role(user, role).await?;
                println!("granted=true user_id={} role={}", user, role.as_str());
            }
        },
    }

    Ok(())
}

/// Workflow over Postgres. The CLI never uploads images, so the object store
/// is the default local directory.
async fn open_workflow() -> Result<(Arc<PgBackend>, Workflow)> {
    let pool = sf_db::connect_from_env().await?;
    let backend = Arc::new(PgBackend::new(pool, ChangeFeed::new(16)));
    let storage = StorageSettings::default();
    let objects = Arc::new(LocalDirStore::new(storage.root_dir, storage.public_base_url));
    let wf = Workflow::new(backend.clone(), objects, WorkflowSettings::default());
    Ok((backend, wf))
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).with_context(|| format!("invalid {what} uuid"))
}

fn print_product(p: &Product) {
    println!(
        "product_id={} status={} price={} stock={} name={:?}",
        p.id,
        p.approval_status.as_str(),
        sf_catalog::format_price(p.price_micros),
        p.stock_quantity,
        p.name
    );
}
