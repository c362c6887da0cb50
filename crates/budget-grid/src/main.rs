//! Budget grid
//!
//! Command-line front end for the budget engine: renders the monthly grid with
//! its running balance and FX rows, calendar-year rollups, and CSV exports, and
//! applies plan and comment edits to a JSON dataset.

mod config;
mod dataset;
mod reports;
mod tables;

use anyhow::{Context, Result, bail};
use budget_engine::{
    BudgetEngine, Direction, LoadOutcome, MemorySource, Month, PlanKind, RowKey, YearStatus,
    YearTotalComputed,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use config::{Config, FileConfig, Overrides};

/// Default config file path
const CONFIG_FILE: &str = "config.toml";

type Engine = BudgetEngine<MemorySource>;

/// Load config file, falling back to defaults when there is none
fn load_config_file(path: &Path) -> Result<FileConfig> {
    if !path.exists() {
        println!(
            "Config file '{}' not found, using defaults.\n\
            Copy config.toml.example to config.toml to change them.\n",
            path.display()
        );
        return Ok(FileConfig::default());
    }
    FileConfig::load(path)
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[derive(Parser, Debug)]
#[command(name = "budget-grid")]
#[command(about = "Monthly budget grid with running balance and FX reconciliation")]
struct Args {
    /// Config file
    #[arg(short, long, default_value = CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Dataset JSON file (overrides data.dataset)
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,

    /// Output directory for CSV exports (overrides data.output_dir)
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// Treat this month (YYYY-MM) as the current one
    #[arg(long, global = true)]
    month: Option<Month>,

    /// Hide a category, as direction:category (repeatable)
    #[arg(long, global = true)]
    hide: Vec<String>,

    /// Rank a category after all others (repeatable)
    #[arg(long, global = true)]
    mask: Vec<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the grid around the current month (default)
    Grid {
        /// Extra batches to load before the window
        #[arg(long, default_value_t = 0)]
        extend_left: u32,

        /// Extra batches to load after the window
        #[arg(long, default_value_t = 0)]
        extend_right: u32,
    },

    /// Show the totals of one calendar year
    Year {
        /// Year (default: current year)
        #[arg(long, value_parser = clap::value_parser!(i32).range(1..=9999))]
        year: Option<i32>,
    },

    /// Write grid.csv, balances.csv and year.csv
    Export {
        /// Year for year.csv (default: current year)
        #[arg(long, value_parser = clap::value_parser!(i32).range(1..=9999))]
        year: Option<i32>,
    },

    /// Edit planned values
    Plan {
        #[command(subcommand)]
        action: PlanCommand,
    },

    /// Read or write cell comments
    Comment {
        #[command(subcommand)]
        action: CommentCommand,
    },
}

#[derive(Subcommand, Debug)]
enum PlanCommand {
    /// Set the base and/or modifier plan of one cell
    Set {
        /// Month (YYYY-MM)
        month: Month,

        /// income, spend or transfer
        direction: Direction,

        /// Category (omit for transfers)
        #[arg(default_value = "")]
        category: String,

        /// New base plan
        #[arg(long)]
        base: Option<f64>,

        /// New plan modifier
        #[arg(long)]
        modifier: Option<f64>,
    },

    /// Copy a base plan to every following month through December
    Fill {
        /// Month to fill from (exclusive)
        month: Month,

        /// income, spend or transfer
        direction: Direction,

        /// Category (omit for transfers)
        #[arg(default_value = "")]
        category: String,

        /// Base plan to apply
        #[arg(long)]
        base: f64,
    },
}

#[derive(Subcommand, Debug)]
enum CommentCommand {
    /// Print the comment of a cell
    Get {
        month: Month,
        direction: Direction,
        #[arg(default_value = "")]
        category: String,
    },

    /// Set the comment of a cell (empty text clears it)
    Set {
        month: Month,
        direction: Direction,
        category: String,
        text: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let file_config = load_config_file(&args.config)?;
    let config = Config::from_file(
        file_config,
        Overrides {
            dataset: args.dataset,
            output_dir: args.output_dir,
            month: args.month,
            hidden: args.hide,
            masked: args.mask,
        },
    )?;
    debug!(?config, "configuration resolved");

    let data = dataset::load(&config.dataset)?;
    let engine = BudgetEngine::new(
        MemorySource::new(data),
        config.engine.clone(),
        config.current_month,
    )?;
    engine.set_view_options(config.view_options.clone());
    engine
        .initialize()
        .await
        .context("Failed to load the budget window")?;

    let command = args.command.unwrap_or(Command::Grid {
        extend_left: 0,
        extend_right: 0,
    });

    match command {
        Command::Grid {
            extend_left,
            extend_right,
        } => show_grid(&engine, extend_left, extend_right).await,
        Command::Year { year } => {
            let year = year.unwrap_or(config.current_month.year());
            let total = load_year(&engine, year).await?;
            println!("Budget {year}\n");
            println!("{}", tables::year_table(&total));
            Ok(())
        }
        Command::Export { year } => {
            let year = year.unwrap_or(config.current_month.year());
            let total = load_year(&engine, year).await?;
            let view = engine.view()?;
            let written = reports::generate_all_reports(&config.output_dir, &view, Some(&total))?;
            for path in written {
                println!("Wrote {}", path.display());
            }
            Ok(())
        }
        Command::Plan { action } => handle_plan_command(action, &engine, &config).await,
        Command::Comment { action } => handle_comment_command(action, &engine, &config).await,
    }
}

/// Print the grid after loading any requested extra batches
async fn show_grid(engine: &Engine, extend_left: u32, extend_right: u32) -> Result<()> {
    for _ in 0..extend_left {
        report_load(engine.load_left().await?);
    }
    for _ in 0..extend_right {
        report_load(engine.load_right().await?);
    }

    let view = engine.view()?;
    if let Some((from, to)) = engine.loaded_range() {
        println!("Budget {from} to {to} (current month {})\n", engine.current_month());
    }
    println!("{}", tables::grid_table(&view));
    for note in tables::grid_notes(&view) {
        println!("{note}");
    }
    Ok(())
}

fn report_load(outcome: LoadOutcome) {
    if let LoadOutcome::Merged {
        edge, months_added, ..
    } = outcome
    {
        debug!(?edge, months_added, "extended window");
    }
}

/// Fetch (or reuse) the rollup of `year`
async fn load_year(engine: &Engine, year: i32) -> Result<Arc<YearTotalComputed>> {
    match engine
        .year_total(year)
        .await
        .with_context(|| format!("Failed to load totals for {year}"))?
    {
        YearStatus::Ready(total) => Ok(total),
        other => bail!("Totals for {year} are not available ({other:?})"),
    }
}

/// Handle plan subcommands
async fn handle_plan_command(action: PlanCommand, engine: &Engine, config: &Config) -> Result<()> {
    match action {
        PlanCommand::Set {
            month,
            direction,
            category,
            base,
            modifier,
        } => {
            if base.is_none() && modifier.is_none() {
                bail!("Nothing to set: pass --base and/or --modifier");
            }
            let key = RowKey::new(month, direction, category);
            if let Some(value) = base {
                engine.set_plan(key.clone(), PlanKind::Base, value).await?;
            }
            if let Some(value) = modifier {
                engine.set_plan(key.clone(), PlanKind::Modifier, value).await?;
            }
            let data = engine.source().dataset();
            dataset::save(&config.dataset, &data)?;

            // Read back from storage: the cell may lie outside the loaded window
            let planned = data
                .rows
                .iter()
                .find(|r| r.matches(&key))
                .map(|r| r.planned)
                .unwrap_or_default();
            println!("Updated {key}: planned {planned:.2}");
            Ok(())
        }

        PlanCommand::Fill {
            month,
            direction,
            category,
            base,
        } => {
            engine.fill_months(month, direction, &category, base).await?;
            dataset::save(&config.dataset, &engine.source().dataset())?;
            println!(
                "Set base plan {base:.2} for {direction} {category} from {} through {}",
                month.next(),
                month.december()
            );
            Ok(())
        }
    }
}

/// Handle comment subcommands
async fn handle_comment_command(
    action: CommentCommand,
    engine: &Engine,
    config: &Config,
) -> Result<()> {
    match action {
        CommentCommand::Get {
            month,
            direction,
            category,
        } => {
            let key = RowKey::new(month, direction, category);
            match engine.comment(&key).await? {
                Some(text) => println!("{key}: {text}"),
                None => println!("{key}: no comment"),
            }
            Ok(())
        }

        CommentCommand::Set {
            month,
            direction,
            category,
            text,
        } => {
            let key = RowKey::new(month, direction, category);
            engine.set_comment(key.clone(), &text).await?;
            dataset::save(&config.dataset, &engine.source().dataset())?;
            if text.trim().is_empty() {
                println!("Cleared comment on {key}");
            } else {
                println!("Saved comment on {key}");
            }
            Ok(())
        }
    }
}
