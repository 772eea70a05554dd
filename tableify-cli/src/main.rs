//! Tableify CLI — fetch ticker metrics into a table, print it, export it.
//!
//! Commands:
//! - `table` — validate tickers and metrics, fetch, print, optionally export
//! - `metrics` — list the metric catalog

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tableify_core::circuit_breaker::CircuitBreaker;
use tableify_core::export::{grid_to_delimited_text, write_delimited_text, write_spreadsheet};
use tableify_core::fixture::FixtureProvider;
use tableify_core::provider::{QuoteProvider, StderrProgress};
use tableify_core::table::{Grid, SortDirection, TableBuilder};
use tableify_core::yahoo::YahooProvider;
use tableify_core::{validate, MetricCatalog, ResultTable, TableifyConfig};

#[derive(Parser)]
#[command(
    name = "tableify",
    about = "Tableify — ticker metrics aggregated into one table"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Aligned columns for the terminal.
    Table,
    /// Tab-delimited, ready to paste into a spreadsheet.
    Tsv,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch metrics for the given tickers and print them as a table.
    Table {
        /// Comma-separated ticker symbols (e.g. "AAPL, msft,GOOG").
        #[arg(long)]
        tickers: String,

        /// Comma-separated metric ids (see `tableify metrics`).
        #[arg(long, value_delimiter = ',', conflicts_with = "all_metrics")]
        metrics: Vec<String>,

        /// Select every metric in the catalog.
        #[arg(long, default_value_t = false)]
        all_metrics: bool,

        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        /// Sort rows by this column (header or metric id).
        #[arg(long)]
        sort: Option<String>,

        /// Sort descending instead of ascending.
        #[arg(long, default_value_t = false, requires = "sort")]
        desc: bool,

        /// One row per metric, one column per ticker.
        #[arg(long, default_value_t = false)]
        transpose: bool,

        /// Write the table as a spreadsheet, one row per ticker (`.csv` paths get CSV,
        /// anything else xlsx). Without a path, uses the configured file.
        #[arg(long, num_args = 0..=1, value_name = "PATH")]
        export: Option<Option<PathBuf>>,

        /// Read quotes from a JSON fixture instead of Yahoo Finance.
        #[arg(long)]
        fixture: Option<PathBuf>,

        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Anchor the YTD window on this date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        as_of: Option<String>,
    },
    /// List the available metrics.
    Metrics {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Table {
            tickers,
            metrics,
            all_metrics,
            format,
            sort,
            desc,
            transpose,
            export,
            fixture,
            config,
            as_of,
        } => run_table(TableArgs {
            tickers,
            metrics,
            all_metrics,
            format,
            sort,
            desc,
            transpose,
            export,
            fixture,
            config,
            as_of,
        }),
        Commands::Metrics { config } => run_metrics(config.as_deref()),
    }
}

/// Logs go to stderr so stdout carries only the table.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

struct TableArgs {
    tickers: String,
    metrics: Vec<String>,
    all_metrics: bool,
    format: OutputFormat,
    sort: Option<String>,
    desc: bool,
    transpose: bool,
    export: Option<Option<PathBuf>>,
    fixture: Option<PathBuf>,
    config: Option<PathBuf>,
    as_of: Option<String>,
}

fn load_config(path: Option<&Path>) -> Result<TableifyConfig> {
    let config = match path {
        Some(path) => TableifyConfig::from_file(path)?,
        None => TableifyConfig::default(),
    };
    tracing::debug!(?config, "loaded config");
    Ok(config)
}

fn run_table(args: TableArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let catalog = config.catalog();

    let selection = metric_selection(args.all_metrics, args.metrics, &catalog);

    // Validation happens before any provider is constructed.
    let request = validate(&args.tickers, &selection, &catalog)?;

    let builder = match args.as_of.as_deref() {
        Some(s) => TableBuilder::as_of(
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .with_context(|| format!("invalid --as-of date '{s}'"))?,
        ),
        None => TableBuilder::new(),
    };

    let provider: Box<dyn QuoteProvider> = match &args.fixture {
        Some(path) => Box::new(FixtureProvider::from_file(path)?),
        None => {
            let breaker = Arc::new(CircuitBreaker::new(config.provider.breaker_cooldown()));
            Box::new(YahooProvider::new(&config.provider, breaker)?)
        }
    };

    let mut table = builder.build(&request, provider.as_ref(), &StderrProgress);

    if let Some(name) = &args.sort {
        let Some(column) = table.column_index(name) else {
            bail!(
                "unknown sort column '{name}'. Valid: {}",
                table.headers().join(", ")
            );
        };
        let direction = if args.desc {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        };
        if let Some(sorted) = table.sorted_by(column, direction) {
            table = sorted;
        }
    }

    let grid = if args.transpose {
        table.transposed()
    } else {
        table.to_grid()
    };

    print_output(&table, &grid, args.format, args.transpose)?;

    if let Some(dest) = args.export {
        let path = export_table(&table, dest, &config)?;
        eprintln!("Data exported to {}", path.display());
    }

    Ok(())
}

fn metric_selection(all_metrics: bool, metrics: Vec<String>, catalog: &MetricCatalog) -> Vec<String> {
    if all_metrics {
        catalog.ids().into_iter().map(String::from).collect()
    } else {
        metrics
    }
}

/// Spreadsheet export keeps the ticker-per-row layout whatever was displayed.
fn export_table(
    table: &ResultTable,
    dest: Option<PathBuf>,
    config: &TableifyConfig,
) -> Result<PathBuf> {
    let path = dest.unwrap_or_else(|| config.export.spreadsheet_path.clone());
    write_spreadsheet(table, &path)?;
    Ok(path)
}

fn print_output(
    table: &ResultTable,
    grid: &Grid,
    format: OutputFormat,
    transposed: bool,
) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match format {
        OutputFormat::Table => write!(out, "{}", render_table(grid))?,
        OutputFormat::Tsv if transposed => writeln!(out, "{}", grid_to_delimited_text(grid))?,
        OutputFormat::Tsv => {
            write_delimited_text(table, &mut out)?;
            writeln!(out)?;
        }
        OutputFormat::Json if transposed => {
            writeln!(out, "{}", serde_json::to_string_pretty(grid)?)?
        }
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(table)?)?,
    }

    Ok(())
}

/// Aligned plain-text table: first column left-aligned, the rest right-aligned.
fn render_table(grid: &Grid) -> String {
    let widths: Vec<usize> = (0..grid.headers.len())
        .map(|c| {
            std::iter::once(&grid.headers)
                .chain(grid.rows.iter())
                .filter_map(|line| line.get(c))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let format_line = |line: &[String]| -> String {
        line.iter()
            .zip(&widths)
            .enumerate()
            .map(|(i, (cell, &w))| {
                if i == 0 {
                    format!("{cell:<w$}")
                } else {
                    format!("{cell:>w$}")
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let rule: usize = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);

    let mut out = String::new();
    out.push_str(&format_line(&grid.headers));
    out.push('\n');
    out.push_str(&"-".repeat(rule));
    out.push('\n');
    for row in &grid.rows {
        out.push_str(&format_line(row));
        out.push('\n');
    }
    out
}

fn run_metrics(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let catalog = config.catalog();

    println!("{:<20} {:<16} FORMAT", "ID", "NAME");
    for m in catalog.iter() {
        let fallback = m
            .fallback_field
            .as_deref()
            .map(|f| format!(" (falls back to {f})"))
            .unwrap_or_default();
        println!(
            "{:<20} {:<16} {}{fallback}",
            m.id,
            m.display_name,
            m.format_kind.label()
        );
    }

    Ok(())
}
