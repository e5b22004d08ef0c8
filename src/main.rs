use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use pricebook::cli::{report, setup};
use pricebook::core::config::ConfigOverrides;
use pricebook::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Append a price row to every stale workbook (default)
    Update(UpdateArgs),
}

#[derive(Args, Default)]
struct UpdateArgs {
    /// Directory containing the .xlsx workbooks
    #[arg(long)]
    sheets_path: Option<String>,

    /// Column letter receiving the currency rate
    #[arg(long)]
    usd_column: Option<String>,

    /// Minimum hours between two price rows
    #[arg(long)]
    interval: Option<u32>,

    /// Compute new rows without saving the workbooks
    #[arg(long)]
    dry_run: bool,
}

impl From<UpdateArgs> for ConfigOverrides {
    fn from(args: UpdateArgs) -> ConfigOverrides {
        ConfigOverrides {
            sheets_path: args.sheets_path,
            usd_column: args.usd_column,
            update_interval_hours: args.interval,
            dry_run: args.dry_run,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup::setup(),
        Some(Commands::Update(args)) => update(cli.config_path.as_deref(), args).await,
        None => update(cli.config_path.as_deref(), UpdateArgs::default()).await,
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

async fn update(config_path: Option<&str>, args: UpdateArgs) -> Result<()> {
    let outcomes = pricebook::run(config_path, args.into()).await?;
    println!("{}", report::display_outcomes(&outcomes));
    Ok(())
}
