//! Carrierview CLI
//!
//! Command-line front end for the carrier out-of-service explorer:
//! - Browse the grid (sort, filter, page)
//! - Show the monthly out-of-service chart
//! - Pivot records by any two field sets
//! - Edit fields, save / load / reset the view, generate share links

use anyhow::Context;
use carrierview::aggregate::{ChartSeries, LabelOrder};
use carrierview::app::{App, StartupOptions};
use carrierview::config::{generate_default_config, Config};
use carrierview::grid::{query_grid, ColumnFilter, GridQuery, SortDirection, SortSpec};
use carrierview::persistence::StdoutClipboard;
use carrierview::pivot::{display_key, pivot, PivotConfig, PivotTable};
use carrierview::records::Field;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "carrierview")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Explore carrier out-of-service records")]
#[command(long_about = "Carrierview loads a carrier CSV, charts out-of-service dates by month,\nand saves or shares the current view.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search standard locations)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// CSV file path or URL (overrides config)
    #[arg(long, global = true)]
    pub source: Option<String>,

    /// Start from a share link instead of the CSV
    #[arg(long, global = true)]
    pub link: Option<String>,

    /// Start from the saved snapshot instead of the CSV
    #[arg(long, global = true)]
    pub saved: bool,

    /// Chart label order (first_seen, chronological)
    #[arg(long, global = true)]
    pub order: Option<LabelOrder>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show one page of the record grid
    Grid {
        /// Sort column, optionally with direction (e.g. usdot_number:asc)
        #[arg(short, long)]
        sort: Option<String>,
        /// Match any column containing this text
        #[arg(long)]
        filter: Option<String>,
        /// Column filters in field=value format
        #[arg(short = 'w', long = "where")]
        column_filters: Vec<String>,
        /// Page number, starting at 1
        #[arg(short, long, default_value = "1")]
        page: usize,
        /// Rows per page
        #[arg(long)]
        page_size: Option<usize>,
    },

    /// Show out-of-service counts by month
    Chart,

    /// Cross-tabulate record counts
    Pivot {
        /// Row fields (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        rows: Vec<String>,
        /// Column fields (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        cols: Vec<String>,
        /// Save the pivot axes with the view
        #[arg(long)]
        save: bool,
    },

    /// Edit one field of one record
    Edit {
        /// Row index as shown in the grid's # column
        row: usize,
        /// Field name (e.g. out_of_service_date)
        field: String,
        /// New value
        value: String,
        /// Save the view afterwards
        #[arg(long)]
        save: bool,
    },

    /// Replace the view settings with a JSON object
    Settings {
        /// Settings JSON
        json: String,
        /// Save the view afterwards
        #[arg(long)]
        save: bool,
    },

    /// Save the current view
    Save,

    /// Load the saved view
    Load,

    /// Delete the saved view
    Reset,

    /// Print a share link for the current view
    Share {
        /// Page address for the link (overrides config)
        #[arg(long)]
        page_url: Option<String>,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| format!("carrierview={}", config.logging.level)),
    );
    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Stderr subscriber used while the config itself is being loaded
fn bootstrap_subscriber() -> impl tracing::Subscriber + Send + Sync {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "carrierview=warn".to_string()),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { output } = &cli.command {
        let config = generate_default_config();
        match output {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, &config)?;
                println!("Config written to {:?}", path);
            }
            None => print!("{}", config),
        }
        return Ok(());
    }

    // Config discovery logs before the configured subscriber exists
    let mut config = tracing::subscriber::with_default(bootstrap_subscriber(), || {
        match &cli.config {
            Some(path) => Config::load_with_env(path),
            None => Ok(Config::load_default()),
        }
    })?;
    if let Some(source) = &cli.source {
        config.source.location = source.clone();
    }
    if let Some(order) = cli.order {
        config.chart.label_order = order;
    }

    init_logging(&config);
    tracing::debug!("Carrierview v{}", env!("CARGO_PKG_VERSION"));

    let mut app = App::from_config(config)?;

    let options = StartupOptions {
        share_link: cli.link.clone(),
        from_saved: cli.saved,
    };
    let report = match app.startup(&options).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Startup failed: {}", e);
            std::process::exit(1);
        }
    };
    for warning in &report.warnings {
        eprintln!("Warning: {}", warning);
    }

    let json = cli.format == "json";

    match cli.command {
        Commands::Grid {
            sort,
            filter,
            column_filters,
            page,
            page_size,
        } => {
            let mut query = match app.store().settings().get("grid") {
                Some(_) => GridQuery::from_settings(app.store().settings()),
                None => GridQuery {
                    page_size: app.config().grid.page_size,
                    ..Default::default()
                },
            };
            if let Some(sort) = sort {
                query.sort = Some(parse_sort(&sort)?);
            }
            if filter.is_some() {
                query.global_filter = filter;
            }
            for raw in column_filters {
                query.column_filters.push(parse_column_filter(&raw)?);
            }
            if let Some(size) = page_size {
                query.page_size = size;
            }
            query.page = page.saturating_sub(1);

            print_grid(&app, &query, json)?;
        }

        Commands::Chart => {
            print_chart(app.store().chart_series(), json)?;
        }

        Commands::Pivot { rows, cols, save } => {
            let config = if rows.is_empty() && cols.is_empty() {
                PivotConfig::from_settings(app.store().settings()).unwrap_or_default()
            } else {
                let config = PivotConfig::new(parse_fields(&rows)?, parse_fields(&cols)?);
                let settings = config.store_in(app.store().settings());
                app.store_mut().set_settings(settings);
                config
            };

            let table = pivot(app.store().records(), &config);
            print_pivot(&table, json)?;

            if save {
                app.save().await?;
                eprintln!("Settings saved.");
            }
        }

        Commands::Edit {
            row,
            field,
            value,
            save,
        } => {
            let parsed: Field = field.parse()?;
            let date = (parsed == Field::OutOfServiceDate)
                .then(|| carrierview::aggregate::parse_service_date(&value))
                .flatten();

            let edited = match date {
                Some(date) => app.store_mut().edit_out_of_service_date(row, date),
                None => app.store_mut().edit_field(row, &field, &value),
            };
            if !edited {
                eprintln!(
                    "No change: row {} is out of range ({} rows)",
                    row,
                    app.store().records().len()
                );
                std::process::exit(1);
            }

            let record = &app.store().records()[row];
            println!("Row {}: {} = {:?}", row, parsed, record.value(parsed));
            print_chart(app.store().chart_series(), json)?;

            if save {
                app.save().await?;
                eprintln!("Settings saved.");
            }
        }

        Commands::Settings { json: raw, save } => {
            let settings: serde_json::Value =
                serde_json::from_str(&raw).context("Settings must be valid JSON")?;
            app.store_mut().set_settings(settings);
            println!("{}", serde_json::to_string_pretty(app.store().settings())?);

            if save {
                app.save().await?;
                eprintln!("Settings saved.");
            }
        }

        Commands::Save => {
            app.save().await?;
            println!("Settings saved ({} records).", app.store().records().len());
        }

        Commands::Load => match app.load().await {
            Ok(true) => {
                println!("Settings loaded ({} records).", app.store().records().len());
                print_chart(app.store().chart_series(), json)?;
            }
            Ok(false) => println!("No saved settings found."),
            Err(e) if e.is_snapshot_decode() => {
                eprintln!("Saved settings are unreadable: {}", e);
                eprintln!("Run `carrierview reset` to discard them.");
                std::process::exit(1);
            }
            Err(e) => return Err(e.into()),
        },

        Commands::Reset => {
            app.reset().await?;
            println!("Saved settings removed; the next start loads {}.", app.source());
        }

        Commands::Share { page_url } => {
            let link = match page_url {
                Some(url) => {
                    carrierview::persistence::share_link(
                        app.store().state(),
                        &url,
                        &app.config().share.param,
                        &StdoutClipboard,
                    )
                    .await?
                }
                None => app.share(&StdoutClipboard).await?,
            };
            eprintln!("Share link generated ({} characters).", link.len());
        }

        Commands::Config { .. } => unreachable!("handled before startup"),
    }

    Ok(())
}

fn parse_fields(names: &[String]) -> anyhow::Result<Vec<Field>> {
    names
        .iter()
        .filter(|n| !n.trim().is_empty())
        .map(|n| n.parse::<Field>().map_err(anyhow::Error::from))
        .collect()
}

fn parse_sort(raw: &str) -> anyhow::Result<SortSpec> {
    let (field, direction) = raw.split_once(':').unwrap_or((raw, "desc"));
    let direction = match direction.to_lowercase().as_str() {
        "asc" => SortDirection::Asc,
        "desc" => SortDirection::Desc,
        other => anyhow::bail!("Invalid sort direction: {}. Use asc or desc", other),
    };
    Ok(SortSpec {
        field: field.parse()?,
        direction,
    })
}

fn parse_column_filter(raw: &str) -> anyhow::Result<ColumnFilter> {
    let (field, value) = raw
        .split_once('=')
        .with_context(|| format!("Invalid filter {:?}. Use field=value", raw))?;
    Ok(ColumnFilter {
        field: field.parse()?,
        value: value.to_string(),
    })
}

fn print_grid(app: &App, query: &GridQuery, json: bool) -> anyhow::Result<()> {
    let page = query_grid(app.store().records(), query);

    if json {
        let rows: Vec<_> = page
            .rows
            .iter()
            .map(|(index, record)| serde_json::json!({ "index": index, "record": record }))
            .collect();
        let body = serde_json::json!({
            "rows": rows,
            "total": page.total_matches,
            "page": page.page + 1,
            "pages": page.page_count,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    if page.rows.is_empty() {
        println!("No matching records");
        return Ok(());
    }

    let widths = [12, 16, 16, 32, 20, 12];
    let header: Vec<String> = Field::ALL
        .iter()
        .zip(widths)
        .map(|(f, w)| format!("{:<w$}", f.header(), w = w))
        .collect();
    println!("{:>5}  {}", "#", header.join(" "));
    println!("{}", "-".repeat(7 + widths.iter().sum::<usize>() + widths.len() - 1));

    for (index, record) in &page.rows {
        let cells: Vec<String> = Field::ALL
            .iter()
            .zip(widths)
            .map(|(f, w)| format!("{:<w$}", truncate(record.value(*f), w), w = w))
            .collect();
        println!("{:>5}  {}", index, cells.join(" "));
    }

    println!();
    println!(
        "Page {} of {} ({} matching records)",
        page.page + 1,
        page.page_count.max(1),
        page.total_matches
    );
    Ok(())
}

fn print_chart(series: &ChartSeries, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(series)?);
        return Ok(());
    }

    let counts = series.counts();
    if counts.is_empty() {
        println!("No out-of-service dates");
        return Ok(());
    }

    let max = counts.iter().map(|(_, c)| *c).max().unwrap_or(1).max(1);
    println!("Out of Service by Month");
    for (label, count) in counts {
        let bar = "#".repeat(((count * 40).div_ceil(max)) as usize);
        println!("  {:<14} {:>6}  {}", label, count, bar);
    }
    println!("  {:<14} {:>6}", "Total", series.total());
    Ok(())
}

fn print_pivot(table: &PivotTable, json: bool) -> anyhow::Result<()> {
    if json {
        let rows: Vec<_> = table
            .row_keys
            .iter()
            .map(|row| {
                let cells: Vec<u64> = table.col_keys.iter().map(|col| table.count(row, col)).collect();
                serde_json::json!({ "key": row, "cells": cells, "total": table.row_total(row) })
            })
            .collect();
        let body = serde_json::json!({
            "rows": table.config.rows,
            "cols": table.config.cols,
            "colKeys": table.col_keys,
            "data": rows,
            "total": table.grand_total,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let col_labels: Vec<String> = table.col_keys.iter().map(|k| display_key(k)).collect();
    let first_width = table
        .row_keys
        .iter()
        .map(|k| display_key(k).len())
        .max()
        .unwrap_or(6)
        .max(6);
    let width = col_labels.iter().map(|l| l.len()).max().unwrap_or(6).max(6);

    print!("{:<first_width$}", "", first_width = first_width);
    for label in &col_labels {
        print!("  {:>width$}", label, width = width);
    }
    println!("  {:>width$}", "Totals", width = width);

    for row in &table.row_keys {
        print!("{:<first_width$}", display_key(row), first_width = first_width);
        for col in &table.col_keys {
            print!("  {:>width$}", table.count(row, col), width = width);
        }
        println!("  {:>width$}", table.row_total(row), width = width);
    }

    print!("{:<first_width$}", "Totals", first_width = first_width);
    for col in &table.col_keys {
        print!("  {:>width$}", table.col_total(col), width = width);
    }
    println!("  {:>width$}", table.grand_total, width = width);
    Ok(())
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        value.to_string()
    } else {
        let cut: String = value.chars().take(width.saturating_sub(1)).collect();
        format!("{}~", cut)
    }
}
