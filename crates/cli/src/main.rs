//! DeliveryOS CLI - Shopify connection checks, order sync and migrations.
//!
//! # Usage
//!
//! ```bash
//! # Check credentials against a shop
//! dos-cli shop test --shop demo.myshopify.com --token shpat_...
//!
//! # List recent unfulfilled orders (SHOPIFY_SHOP / SHOPIFY_ACCESS_TOKEN from env)
//! dos-cli orders list --limit 20 --fulfillment-status unshipped
//!
//! # Fulfill an order with tracking
//! dos-cli orders fulfill 450789469 --tracking-number 1Z999 --tracking-company UPS
//!
//! # Register a connection and sync its orders into the database
//! dos-cli connections add --tenant <uuid> --shop demo.myshopify.com --token shpat_...
//! dos-cli orders sync --connection <uuid>
//!
//! # Run database migrations
//! dos-cli migrate
//! ```
//!
//! # Commands
//!
//! - `shop test` / `shop info` - Connection check and shop metadata
//! - `orders list` / `orders get` / `orders fulfill` - Direct API calls
//! - `orders sync` - Fetch and reconcile a stored connection's orders
//! - `connections add` - Store a tenant connection
//! - `migrate` - Run database migrations
//!
//! Results are printed to stdout as JSON; logs go to stderr.

#![cfg_attr(not(test), forbid(unsafe_code))]

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use secrecy::SecretString;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod commands;

#[derive(Parser)]
#[command(name = "dos-cli")]
#[command(author, version, about = "DeliveryOS CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Shop connectivity and metadata
    Shop {
        #[command(subcommand)]
        action: ShopAction,
    },
    /// Order operations
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
    /// Manage stored tenant connections
    Connections {
        #[command(subcommand)]
        action: ConnectionsAction,
    },
    /// Run database migrations
    Migrate,
}

/// Target shop and credentials.
#[derive(Args)]
struct ShopArgs {
    /// Shop domain (e.g., your-store.myshopify.com)
    #[arg(long, env = "SHOPIFY_SHOP")]
    shop: String,

    /// Admin API access token
    #[arg(long, env = "SHOPIFY_ACCESS_TOKEN", hide_env_values = true)]
    token: String,
}

impl ShopArgs {
    fn token(&self) -> SecretString {
        SecretString::from(self.token.clone())
    }
}

#[derive(Subcommand)]
enum ShopAction {
    /// Check that the shop accepts the credentials
    Test {
        #[command(flatten)]
        target: ShopArgs,
    },
    /// Print shop metadata
    Info {
        #[command(flatten)]
        target: ShopArgs,
    },
}

#[derive(Subcommand)]
enum OrdersAction {
    /// List one page of orders
    List {
        #[command(flatten)]
        target: ShopArgs,

        /// Page size (1-250)
        #[arg(short, long, default_value_t = 50)]
        limit: u32,

        /// Status filter (open, closed, cancelled, any)
        #[arg(long, default_value = "any")]
        status: String,

        /// Only orders after this id
        #[arg(long)]
        since_id: Option<String>,

        /// Financial status filter (e.g., paid)
        #[arg(long)]
        financial_status: Option<String>,

        /// Fulfillment status filter (e.g., unshipped)
        #[arg(long)]
        fulfillment_status: Option<String>,

        /// Only orders created at or after this RFC 3339 time
        #[arg(long)]
        created_after: Option<DateTime<Utc>>,

        /// Only orders updated at or after this RFC 3339 time
        #[arg(long)]
        updated_after: Option<DateTime<Utc>>,

        /// Comma-separated field list
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
    },
    /// Print a single order
    Get {
        #[command(flatten)]
        target: ShopArgs,

        /// Shopify order id
        id: String,
    },
    /// Create a fulfillment for an order
    Fulfill {
        #[command(flatten)]
        target: ShopArgs,

        /// Shopify order id
        id: String,

        /// Fulfilling location id
        #[arg(long)]
        location_id: Option<u64>,

        /// Carrier tracking number
        #[arg(long)]
        tracking_number: Option<String>,

        /// Carrier name
        #[arg(long)]
        tracking_company: Option<String>,

        /// Tracking URL (repeatable)
        #[arg(long = "tracking-url")]
        tracking_urls: Vec<String>,

        /// Line item to fulfill as ID:QTY (repeatable; omit to fulfill everything)
        #[arg(long = "line-item")]
        line_items: Vec<String>,

        /// Do not email the customer
        #[arg(long)]
        no_notify: bool,
    },
    /// Fetch and reconcile the latest orders for a stored connection
    Sync {
        /// Connection id
        #[arg(short, long)]
        connection: Uuid,

        /// Page size (1-250)
        #[arg(short, long, default_value_t = 100)]
        limit: u32,

        /// Only orders updated at or after this RFC 3339 time
        #[arg(long)]
        updated_after: Option<DateTime<Utc>>,
    },
}

#[derive(Subcommand)]
enum ConnectionsAction {
    /// Store a new connection
    Add {
        /// Owning tenant id
        #[arg(long)]
        tenant: Uuid,

        #[command(flatten)]
        target: ShopArgs,
    },
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

/// Log to stderr; JSON lines when `LOG_FORMAT=json`.
fn init_tracing() {
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("deliveryos_cli=info,deliveryos_integration=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Shop { action } => match action {
            ShopAction::Test { target } => {
                commands::shop::test(&target.shop, &target.token()).await?;
            }
            ShopAction::Info { target } => {
                commands::shop::info(&target.shop, &target.token()).await?;
            }
        },
        Commands::Orders { action } => match action {
            OrdersAction::List {
                target,
                limit,
                status,
                since_id,
                financial_status,
                fulfillment_status,
                created_after,
                updated_after,
                fields,
            } => {
                let filter = commands::orders::ListFilter {
                    limit,
                    status,
                    since_id,
                    financial_status,
                    fulfillment_status,
                    created_after,
                    updated_after,
                    fields,
                };
                commands::orders::list(&target.shop, &target.token(), filter).await?;
            }
            OrdersAction::Get { target, id } => {
                commands::orders::get(&target.shop, &target.token(), &id).await?;
            }
            OrdersAction::Fulfill {
                target,
                id,
                location_id,
                tracking_number,
                tracking_company,
                tracking_urls,
                line_items,
                no_notify,
            } => {
                let request = commands::orders::FulfillRequest {
                    location_id,
                    tracking_number,
                    tracking_company,
                    tracking_urls,
                    line_items,
                    notify_customer: !no_notify,
                };
                commands::orders::fulfill(&target.shop, &target.token(), &id, request).await?;
            }
            OrdersAction::Sync {
                connection,
                limit,
                updated_after,
            } => {
                commands::orders::sync(connection, limit, updated_after).await?;
            }
        },
        Commands::Connections { action } => match action {
            ConnectionsAction::Add { tenant, target } => {
                commands::connections::add(tenant, &target.shop, target.token()).await?;
            }
        },
        Commands::Migrate => commands::migrate::run().await?,
    }
    Ok(())
}
