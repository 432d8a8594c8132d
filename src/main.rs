use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde_json::json;

use daybook_lib::config::DaybookConfig;
use daybook_lib::recurrence::CatchUpReport;
use daybook_lib::time::{FixedClock, MonthKey};
use daybook_lib::{Orchestrator, OrchestratorBuilder};

#[derive(Debug, Parser)]
#[command(
    name = "daybook",
    about = "Inspect and maintain a daybook data directory",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("DAYBOOK_GIT_HASH"), ")")
)]
struct Cli {
    /// Data directory to use instead of the configured one.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Persistence backend inspection.
    #[command(subcommand)]
    Store(StoreCommand),
    /// Recurring expense maintenance.
    #[command(subcommand)]
    Recur(RecurCommand),
    /// Budget reporting.
    #[command(subcommand)]
    Budget(BudgetCommand),
}

#[derive(Debug, Subcommand)]
enum StoreCommand {
    /// List collections and their record counts.
    Status {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
enum RecurCommand {
    /// Generate every recurring expense that has fallen due.
    CatchUp {
        /// Treat this date as today (YYYY-MM-DD).
        #[arg(long)]
        today: Option<NaiveDate>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
enum BudgetCommand {
    /// Spending against the budget for one month.
    Summary {
        /// Month as YYYY-MM.
        #[arg(long)]
        month: MonthKey,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    daybook_lib::logging::init_logging();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let mut config = DaybookConfig::from_env().context("resolve configuration")?;
    if let Some(dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }
    let store = config
        .open_store()
        .with_context(|| format!("open store at {}", config.data_dir.display()))?;
    let builder = Orchestrator::builder(store)
        .recurrence(config.recurrence)
        .catch_up_on_start(false);

    match cli.command {
        Commands::Store(StoreCommand::Status { json }) => store_status(&config, builder, json).await,
        Commands::Recur(RecurCommand::CatchUp { today, json }) => {
            recur_catch_up(builder, today, json).await
        }
        Commands::Budget(BudgetCommand::Summary { month, json }) => {
            budget_summary(builder, month, json).await
        }
    }
}

async fn store_status(config: &DaybookConfig, builder: OrchestratorBuilder, json: bool) -> Result<i32> {
    let orchestrator = builder.start();
    let counts = orchestrator
        .collection_counts()
        .await
        .context("count collections")?;
    orchestrator.shutdown().await.context("stop orchestrator")?;

    if json {
        let payload = json!({
            "backend": config.backend,
            "data_dir": config.data_dir,
            "collections": counts,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&payload).context("serialize store status")?
        );
    } else {
        println!("Backend  : {}", config.backend);
        println!("Data dir : {}", config.data_dir.display());
        println!("\n{:<20} {:>8}", "Collection", "Records");
        for (name, count) in &counts {
            println!("{name:<20} {count:>8}");
        }
    }
    Ok(0)
}

async fn recur_catch_up(
    builder: OrchestratorBuilder,
    today: Option<NaiveDate>,
    json: bool,
) -> Result<i32> {
    let builder = match today {
        Some(date) => builder.clock(Arc::new(FixedClock::on(date))),
        None => builder,
    };
    let orchestrator = builder.start();
    let report = orchestrator
        .run_catch_up()
        .await
        .context("run recurrence catch-up")?;
    orchestrator.shutdown().await.context("stop orchestrator")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("serialize catch-up report")?
        );
    } else {
        print_catch_up(&report);
    }
    Ok(if report.stalled.is_empty() { 0 } else { 1 })
}

fn print_catch_up(report: &CatchUpReport) {
    println!("Recurring scanned : {}", report.scanned);
    println!("Expenses generated: {}", report.generated);
    println!("Already present   : {}", report.already_present);
    println!("Inactive skipped  : {}", report.skipped_inactive);
    if report.stalled.is_empty() {
        println!("Stalled           : none");
    } else {
        println!("Stalled:");
        for id in &report.stalled {
            println!("  {id}");
        }
    }
}

async fn budget_summary(builder: OrchestratorBuilder, month: MonthKey, json: bool) -> Result<i32> {
    let orchestrator = builder.start();
    let summary = orchestrator
        .month_summary(month)
        .await
        .context("summarize month")?;
    orchestrator.shutdown().await.context("stop orchestrator")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("serialize monthly summary")?
        );
        return Ok(0);
    }

    println!("Month        : {}", summary.month_key);
    println!("Total budget : {}", summary.total_budget);
    println!("Total spent  : {}", summary.total_spent);
    println!("Remaining    : {}", summary.remaining);
    println!("Spent        : {}%", summary.spent_percentage);
    if !summary.by_classification.is_empty() {
        println!("\n{:<12} {:>12}", "Class", "Spent");
        for (class, spent) in &summary.by_classification {
            println!("{:<12} {:>12}", format!("{class:?}"), spent.to_string());
        }
    }
    Ok(0)
}
