//! pg-typegen CLI
//!
//! Entry point for the command-line tool.

use anyhow::{Context, Result};
use clap::Parser;
use pg_typegen::{GeneratorConfig, Generator};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pg-typegen")]
#[command(about = "Static type generator for SQL queries against a PostgreSQL schema", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "pg-typegen.toml")]
    config: PathBuf,

    /// Database connection string (libpq format)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Path to a file containing one SQL query (or ;-separated statements)
    #[arg(long)]
    query_file: Option<PathBuf>,

    /// Print the built-in type catalog's family table and exit
    #[arg(long)]
    explain_types: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt::init();

    if args.explain_types {
        return explain_types();
    }

    let config = if args.config.exists() {
        GeneratorConfig::from_file(&args.config).context("failed to load configuration")?
    } else {
        eprintln!(
            "Warning: config file {} not found, using defaults",
            args.config.display()
        );
        GeneratorConfig::default()
    };

    let database_url = args
        .database_url
        .context("--database-url (or DATABASE_URL) is required")?;

    let query_path = args
        .query_file
        .context("--query-file is required")?;
    let sql = std::fs::read_to_string(&query_path).context("failed to read query file")?;

    let generator = Generator::connect(&database_url, config)
        .await
        .context("failed to connect and load schema")?;

    let result = generator.generate(&sql).context("failed to analyze query")?;
    for (i, rendered) in result.results.iter().enumerate() {
        println!("-- statement {} --", i + 1);
        println!("{rendered}");
        if let Some(params) = result.params.get(i).filter(|p| !p.is_empty()) {
            let ordinals: Vec<String> = params.iter().map(|p| format!("${}", p.ordinal)).collect();
            println!("-- params: {} --", ordinals.join(", "));
        }
    }

    Ok(())
}

fn explain_types() -> Result<()> {
    println!("Numeric family: int2 int4 int8 float4 float8 numeric decimal oid money -> number");
    println!("Text family: text varchar bpchar citext name uuid xml -> string");
    println!("Timestamp family: timestamp timestamptz date -> Date");
    println!("Array: <elem>[] -> array<mapped elem>");
    println!("Enum types render as a union of double-quoted labels");
    Ok(())
}
