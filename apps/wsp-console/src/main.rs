//! # WSP Console
//!
//! A standalone CLI that runs the wholesale portal sync engine against an
//! in-memory remote and narrates what each client sees.
//!
//! ## Clients
//!
//! ```text
//! admin    (Role::Admin)     edits the catalog, receives order alerts
//! buyer-*  (Role::Customer)  fills carts and checks out
//! ```
//!
//! Every client has its own storage area unless a scenario opens a second
//! tab on the same one.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::*;
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;
use wsp_core::{OrderStatus, Product, ProductPatch, Role, Stamp};
use wsp_store::{MemoryStorage, RecoveryOutcome, Storage, DATA_KEY};
use wsp_sync::{EngineConfigBuilder, EngineError, MemoryRemote, SyncEngine, PRODUCTS};

// ─── CLI ───────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "wsp-console")]
#[command(about = "Wholesale portal sync scenarios on an in-memory remote")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Basic demo: catalog replication, cart totals and a confirmed order
    Demo,
    /// Two buyers race for the last units of a product
    Conflict,
    /// A buyer loses the remote, keeps shopping, then reconnects
    Outage,
    /// Local data is damaged and restored from a rolling backup
    Recover,
}

// ─── Node: one client engine ───────────────────────────────────────────────

struct Node {
    name: String,
    engine: SyncEngine,
    connection: Arc<MemoryRemote>,
}

impl Node {
    async fn start(
        remote: &MemoryRemote,
        storage: MemoryStorage,
        name: &str,
        role: Role,
    ) -> Result<Self, EngineError> {
        let connection = Arc::new(remote.client(name));
        let config = EngineConfigBuilder::new()
            .client_id(name)
            .user(name, role)
            .readiness(1, 0)
            .command_debounce(0)
            .retry_delay(20)
            .background_tasks(false)
            .build();
        let engine = SyncEngine::start(config, Arc::new(storage), connection.clone()).await?;
        Ok(Self {
            name: name.to_string(),
            engine,
            connection,
        })
    }
}

async fn settle(nodes: &[&Node]) {
    for _ in 0..3 {
        for node in nodes {
            node.engine.settle().await;
        }
    }
}

fn item(id: &str, name: &str, price: i64, stock: u32) -> Product {
    Product::new(id, name, Decimal::new(price, 0), stock, Stamp::now("console"))
}

// ─── Pretty printing ──────────────────────────────────────────────────────

fn header(text: &str) {
    let bar = "═".repeat(60);
    println!("\n{}", bar.bright_cyan());
    println!("  {}", text.bold().bright_white());
    println!("{}", bar.bright_cyan());
}

fn section(text: &str) {
    println!("\n{} {}", "▸".bright_yellow(), text.bold());
}

fn step(text: &str) {
    println!("  {} {}", "•".bright_green(), text);
}

fn sync_arrow(from: &str, to: &str) {
    println!(
        "  {} {} {} {}",
        from.bright_magenta(),
        "──sync──▶".bright_cyan(),
        to.bright_magenta(),
        "✓".bright_green()
    );
}

fn show_node(node: &Node) {
    let border = "─".repeat(52);
    let engine = &node.engine;
    println!("  ┌{}┐", border);
    println!(
        "  │ {:^50} │",
        format!("{} [{}]", node.name, engine.status())
            .bright_yellow()
            .to_string()
    );
    println!("  ├{}┤", border);

    let products = engine.products();
    if products.is_empty() {
        println!("  │ {:^50} │", "(empty catalog)".dimmed().to_string());
    }
    for p in &products {
        let line = format!(
            "{:<8} {:<16} {:>8} x{:<4} {}",
            p.id,
            p.name,
            p.price.to_string(),
            p.stock(),
            p.status()
        );
        println!("  │ {:<50} │", line);
    }

    let cart = engine.cart();
    if !cart.is_empty() {
        println!("  ├{}┤", border);
        for line in cart.items() {
            println!("  │ {:<50} │", format!("cart: {} x{}", line.product_id, line.quantity));
        }
        let totals = engine.cart_totals();
        println!(
            "  │ {:<50} │",
            format!(
                "sub {} + ship {} + tax {} = {}",
                totals.subtotal, totals.shipping, totals.tax, totals.total
            )
        );
    }

    let orders = engine.orders();
    if !orders.is_empty() {
        println!("  ├{}┤", border);
        for o in &orders {
            let status = match o.status {
                OrderStatus::Cancelled => o.status.to_string().bright_red().to_string(),
                _ => o.status.to_string(),
            };
            let line = format!("{} {} {} r{}", o.user_id, o.totals.total, status, o.revision);
            println!("  │ {:<50} │", line);
        }
    }
    println!("  └{}┘", border);
}

fn show_inbox(node: &Node) {
    let inbox = node.engine.notifications().inbox();
    if inbox.is_empty() {
        step(&format!("{}: no notifications", node.name));
    }
    for n in inbox {
        step(&format!(
            "{} ◂ [{:?}] {}: {}",
            node.name.bright_magenta(),
            n.kind,
            n.title.bold(),
            n.message
        ));
    }
}

/// Every node holds the same catalog (id, price, stock).
fn convergence_check(nodes: &[&Node]) -> bool {
    let view = |node: &Node| {
        node.engine
            .products()
            .into_iter()
            .map(|p| (p.id.clone(), p.price, p.stock()))
            .collect::<Vec<_>>()
    };
    match nodes.split_first() {
        Some((first, rest)) => {
            let base = view(first);
            rest.iter().all(|n| view(n) == base)
        }
        None => true,
    }
}

fn convergence_result(converged: bool) {
    if converged {
        println!(
            "\n  {} {}",
            "✓".bright_green().bold(),
            "ALL CLIENTS CONVERGED, catalogs are identical!"
                .bright_green()
                .bold()
        );
    } else {
        println!(
            "\n  {} {}",
            "✗".bright_red().bold(),
            "DIVERGENCE DETECTED, catalogs differ!".bright_red().bold()
        );
    }
}

// ─── Demo ──────────────────────────────────────────────────────────────────

async fn run_demo() -> Result<(), EngineError> {
    header("DEMO — Catalog Replication & Checkout");
    let remote = MemoryRemote::new("backend");

    section("Phase 1: Admin stocks the catalog");
    let admin = Node::start(&remote, MemoryStorage::new("admin"), "admin", Role::Admin).await?;
    let buyer = Node::start(&remote, MemoryStorage::new("buyer"), "buyer-1", Role::Customer).await?;
    admin.engine.add_product(item("tea", "Oolong 5kg", 125, 40))?;
    step("admin: add tea  (125.00, 40 units)");
    admin.engine.add_product(item("cups", "Cup set", 30, 12))?;
    step("admin: add cups (30.00, 12 units)");
    settle(&[&admin, &buyer]).await;
    sync_arrow("admin", "buyer-1");
    show_node(&buyer);

    section("Phase 2: Buyer fills a cart");
    buyer.engine.add_to_cart("tea", 2)?;
    step("buyer-1: tea x2");
    let change = buyer.engine.add_to_cart("cups", 150)?;
    step(&format!(
        "buyer-1: cups x150 requested, {} granted (clamped: {})",
        change.quantity, change.clamped
    ));
    show_node(&buyer);

    section("Phase 3: Checkout reserves stock on the remote");
    let order = buyer.engine.checkout()?;
    step(&format!("order {} placed, total {}", order.id, order.totals.total));
    settle(&[&admin, &buyer]).await;
    sync_arrow("buyer-1", "admin");
    show_node(&admin);
    show_inbox(&admin);

    convergence_result(convergence_check(&[&admin, &buyer]));
    Ok(())
}

// ─── Conflict ──────────────────────────────────────────────────────────────

async fn run_conflict() -> Result<(), EngineError> {
    header("CONFLICT — Two Buyers, Five Units");
    let remote = MemoryRemote::new("backend");

    section("Phase 1: One product with 5 units");
    let admin = Node::start(&remote, MemoryStorage::new("admin"), "admin", Role::Admin).await?;
    let left = Node::start(&remote, MemoryStorage::new("left"), "buyer-1", Role::Customer).await?;
    let right = Node::start(&remote, MemoryStorage::new("right"), "buyer-2", Role::Customer).await?;
    admin.engine.add_product(item("lamp", "Brass lamp", 90, 5))?;
    settle(&[&admin, &left, &right]).await;
    step("lamp: 5 units on every client");

    section("Phase 2: Both buyers take 3 and check out at once");
    left.engine.add_to_cart("lamp", 3)?;
    right.engine.add_to_cart("lamp", 3)?;
    left.engine.checkout()?;
    right.engine.checkout()?;
    step("buyer-1: checkout x3");
    step("buyer-2: checkout x3");
    settle(&[&admin, &left, &right]).await;

    section("Phase 3: Outcome");
    let stock = remote
        .document(PRODUCTS, "lamp")
        .and_then(|d| d.data.get("stock").and_then(|s| s.as_u64()))
        .unwrap_or_default();
    step(&format!("remote stock: {} (never below zero)", stock));
    show_node(&admin);
    show_inbox(&left);
    show_inbox(&right);

    convergence_result(convergence_check(&[&admin, &left, &right]));
    Ok(())
}

// ─── Outage ────────────────────────────────────────────────────────────────

async fn run_outage() -> Result<(), EngineError> {
    header("OUTAGE — Degraded Mode, Reconnect & Reconcile");
    let remote = MemoryRemote::new("backend");

    section("Phase 1: Shared baseline");
    let admin = Node::start(&remote, MemoryStorage::new("admin"), "admin", Role::Admin).await?;
    let buyer = Node::start(&remote, MemoryStorage::new("buyer"), "buyer-1", Role::Customer).await?;
    admin.engine.add_product(item("rug", "Wool rug", 400, 10))?;
    settle(&[&admin, &buyer]).await;
    step("rug: 400.00, 10 units");

    section("Phase 2: buyer-1 loses the remote");
    buyer.connection.set_online(false);
    let patch = ProductPatch {
        price: Some(Decimal::new(380, 0)),
        ..Default::default()
    };
    admin.engine.update_product("rug", patch)?;
    step("admin: rug price → 380.00 (buyer-1 does not see it)");
    buyer.engine.add_to_cart("rug", 3)?;
    let order = buyer.engine.checkout()?;
    step(&format!("buyer-1: offline checkout {}", order.id));
    settle(&[&admin, &buyer]).await;
    show_node(&buyer);
    step(&format!(
        "buyer-1: status {}, {} document(s) waiting to reconcile",
        buyer.engine.status(),
        buyer.engine.pending_dirty()
    ));

    section("Phase 3: Connection returns");
    buyer.connection.set_online(true);
    let reachable = buyer.engine.reconnect().await?;
    step(&format!("buyer-1: reconnect → {}", reachable));
    settle(&[&admin, &buyer]).await;
    sync_arrow("backend", "buyer-1");
    show_node(&buyer);
    show_node(&admin);

    convergence_result(convergence_check(&[&admin, &buyer]));
    Ok(())
}

// ─── Recover ───────────────────────────────────────────────────────────────

async fn run_recover() -> Result<(), EngineError> {
    header("RECOVER — Damaged Local Data & Rolling Backups");
    let remote = MemoryRemote::new("backend");
    let area = MemoryStorage::new("admin");

    section("Phase 1: Catalog plus a backup");
    let admin = Node::start(&remote, area.context("tab-1"), "admin", Role::Admin).await?;
    admin.engine.add_product(item("vase", "Glazed vase", 55, 14))?;
    admin.engine.add_product(item("bowl", "Stone bowl", 35, 22))?;
    settle(&[&admin]).await;
    let backup = admin.engine.backup_now()?;
    step(&format!("backup saved under {}", backup.key()));

    section("Phase 2: Something overwrites the live data");
    if let Err(e) = area.set(DATA_KEY, r#"{"products": "garbage"}"#) {
        step(&format!("could not damage storage: {}", e));
    }
    match admin.engine.check_integrity()? {
        Some(RecoveryOutcome::Restored { key, .. }) => step(&format!("restored from {}", key)),
        Some(RecoveryOutcome::Reset) => step("no usable backup, reset"),
        None => step("integrity check passed"),
    }
    show_node(&admin);

    section("Phase 3: A fresh tab without any backups");
    let empty = MemoryStorage::new("other");
    if let Err(e) = empty.set(DATA_KEY, "not json at all") {
        step(&format!("could not damage storage: {}", e));
    }
    let fresh = Node::start(&remote, empty.context("tab-2"), "admin-2", Role::Admin).await?;
    show_inbox(&fresh);
    settle(&[&admin, &fresh]).await;
    sync_arrow("backend", "admin-2");
    show_node(&fresh);

    convergence_result(convergence_check(&[&admin, &fresh]));
    Ok(())
}

// ─── Entry point ───────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error")))
        .init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Demo => run_demo().await,
        Commands::Conflict => run_conflict().await,
        Commands::Outage => run_outage().await,
        Commands::Recover => run_recover().await,
    };
    if let Err(e) = result {
        eprintln!("{} {}", "error:".bright_red().bold(), e);
        std::process::exit(1);
    }
}
