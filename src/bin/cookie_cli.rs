use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{ArgAction, Args, Parser, Subcommand};
use cookie_delivery_api::{
    cache::TtlCache,
    config::{self, AppConfig},
    db::{self, DbPool},
    entities::StaffRole,
    handlers::AppServices,
    services::staff::CreateStaffInput,
};
use serde::Serialize;
use tracing::debug;

#[derive(Parser)]
#[command(name = "cookie-cli", about = "Operator tasks for the cookie delivery backend", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Create a back office administrator
    CreateAdmin(CreateAdminArgs),
    /// Abandon carts whose expiry has passed
    CleanupCarts,
    /// Print the order summary for a delivery day
    Dashboard(DashboardArgs),
}

#[derive(Args)]
struct CreateAdminArgs {
    #[arg(long)]
    email: String,
    #[arg(long)]
    name: String,
    #[arg(long, env = "COOKIE_ADMIN_PASSWORD")]
    password: String,
}

#[derive(Args)]
struct DashboardArgs {
    /// Delivery date (YYYY-MM-DD); today in the business timezone when omitted
    #[arg(long)]
    date: Option<NaiveDate>,
}

struct CliContext {
    config: AppConfig,
    db: Arc<DbPool>,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load configuration")?;
        config::init_tracing(config.log_level(), false);
        let pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to the database")?;
        debug!("database connection ready");
        Ok(Self {
            config,
            db: Arc::new(pool),
        })
    }

    fn services(&self) -> Result<AppServices> {
        let cache = TtlCache::new(self.config.cache_ttl());
        AppServices::from_config(self.db.clone(), &self.config, cache)
            .context("failed to build services")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize().await?;

    match cli.command {
        Commands::Migrate => {
            db::run_migrations(&context.db)
                .await
                .context("migrations failed")?;
            println!("Migrations applied");
        }
        Commands::CreateAdmin(args) => create_admin(&context, args, cli.json).await?,
        Commands::CleanupCarts => {
            let abandoned = context
                .services()?
                .cart
                .abandon_expired(Utc::now())
                .await
                .context("cart cleanup failed")?;
            if cli.json {
                print_json(&serde_json::json!({ "abandoned": abandoned }))?;
            } else {
                println!("Abandoned {} expired cart(s)", abandoned);
            }
        }
        Commands::Dashboard(args) => {
            let services = context.services()?;
            let date = args
                .date
                .unwrap_or_else(|| services.delivery.now_local().date());
            let summary = services
                .orders
                .dashboard(date)
                .await
                .context("failed to load dashboard")?;
            if cli.json {
                print_json(&summary)?;
            } else {
                println!("Orders for {}: {}", summary.date, summary.total_orders);
                for (status, count) in &summary.orders_by_status {
                    println!("  {:<18} {}", status, count);
                }
                println!("Revenue: {} {}", summary.revenue, context.config.currency);
                println!("Without courier: {}", summary.unassigned_orders);
            }
        }
    }

    Ok(())
}

async fn create_admin(context: &CliContext, args: CreateAdminArgs, json: bool) -> Result<()> {
    let staff = context
        .services()?
        .staff
        .create_staff(CreateStaffInput {
            email: args.email,
            name: args.name,
            password: args.password,
            role: StaffRole::Admin,
            kitchen_id: None,
        })
        .await
        .context("failed to create administrator")?;

    if json {
        print_json(&staff)?;
    } else {
        println!("Administrator {} created (id {})", staff.email, staff.id);
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
