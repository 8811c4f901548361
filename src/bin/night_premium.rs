//! CLI tool: night-shift premium from a batch of PDF timesheets

use clap::Parser;
use night_premium::hours::format_date;
use night_premium::{BatchReport, Config, DateMode, Pipeline, Report};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "night-premium",
    version,
    about = "Computes night-shift minutes and premium from PDF timesheets"
)]
struct Cli {
    /// Timesheet PDF files
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Drop rows without their own date instead of reusing the previous one
    #[arg(long)]
    strict_dates: bool,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Employee code shown in the report
    #[arg(long)]
    employee: Option<String>,

    /// Employee full name shown in the report
    #[arg(long)]
    name: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}: {}", path.display(), e);
                process::exit(2);
            }
        },
        None => Config::default(),
    };
    if cli.strict_dates {
        config.parse.date_mode = DateMode::Strict;
    }

    let batch = Pipeline::new(&config).process_files(&cli.files);
    let all_failed = batch.documents.iter().all(|d| d.warning.is_some());

    for warning in batch.warnings() {
        eprintln!("Warning: {}: {}", warning.source, warning.message);
    }

    if cli.json {
        let rendered = match (cli.employee, cli.name) {
            (None, None) => serde_json::to_string_pretty(&batch),
            (code, name) => serde_json::to_string_pretty(&Report::new(
                code.unwrap_or_default(),
                name.unwrap_or_default(),
                batch,
            )),
        };
        match rendered {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
    } else {
        if let Some(code) = &cli.employee {
            println!("Employee: {}", code);
        }
        if let Some(name) = &cli.name {
            println!("Name: {}", name);
        }
        print_text(&batch);
    }

    if all_failed {
        process::exit(1);
    }
}

fn print_text(batch: &BatchReport) {
    println!("Night-shift premium");
    println!("===================");

    for doc in &batch.documents {
        println!();
        println!("Document: {} ({} rows)", doc.source, doc.rows_found);
        if doc.results.is_empty() {
            println!("  no shifts");
            continue;
        }
        println!(
            "  {:<10}  {:>5}  {:>5}  {:>7}  {:>10}",
            "Date", "Start", "End", "Minutes", "Amount (€)"
        );
        for r in &doc.results {
            println!(
                "  {:<10}  {:>5}  {:>5}  {:>7}  {:>10.2}",
                format_date(r.date),
                r.start.to_string(),
                r.end.to_string(),
                r.night_minutes,
                r.amount
            );
        }
    }

    let summary = &batch.summary;
    println!();
    println!("Monthly summary");
    for (month, bucket) in &summary.by_month {
        println!(
            "  {}  {:>6} min  {:>10.2} €  {:>3} days",
            month,
            bucket.minutes(),
            bucket.rounded_amount(),
            bucket.day_count()
        );
    }

    println!();
    println!("Yearly summary");
    for (year, bucket) in &summary.by_year {
        println!(
            "  {}     {:>6} min  {:>10.2} €  {:>3} days",
            year,
            bucket.minutes(),
            bucket.rounded_amount(),
            bucket.day_count()
        );
    }

    println!();
    println!(
        "Total: {} min, {:.2} €, {} days",
        summary.global.minutes(),
        summary.global.rounded_amount(),
        summary.global.day_count()
    );
}
