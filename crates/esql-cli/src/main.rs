//! esql - translate SQL SELECT statements into Elasticsearch query DSL
//!
//! ## Usage
//!
//! ```bash
//! # Translate a statement given as argument
//! esql "SELECT colA, COUNT(*) FROM t GROUP BY colA"
//!
//! # Read the statement from stdin and pretty-print
//! echo "SELECT * FROM t WHERE colA = 'x'" | esql --pretty
//!
//! # Continue a sorted listing after the last hit of the previous page
//! esql --search-after '[1546300800000, "run-42"]' "SELECT * FROM t ORDER BY StartTime DESC, RunID"
//!
//! # Write the default configuration to esql.yml
//! esql --generate-config
//! ```
//!
//! The DSL is written to stdout; logs and sort fields go to stderr.

mod config;

use anyhow::{bail, Context, Result};
use clap::Parser;
use config::{CliConfig, DEFAULT_CONFIG_PATH};
use esql_dsl::Esql;
use serde_json::Value;
use std::io::Read;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "esql")]
#[command(author, version, about = "Translate SQL into Elasticsearch query DSL")]
struct Cli {
    /// SQL statement; read from stdin when absent
    sql: Option<String>,

    /// Path to the YAML config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Indent the DSL output
    #[arg(short, long)]
    pretty: bool,

    /// JSON array of search_after values for the next page
    #[arg(long)]
    search_after: Option<String>,

    /// Page size of non-aggregation queries (overrides config)
    #[arg(long)]
    page_size: Option<usize>,

    /// Composite aggregation size (overrides config)
    #[arg(long)]
    bucket_count: Option<usize>,

    /// Enable the visibility compatibility profile (overrides config)
    #[arg(long)]
    compatibility: bool,

    /// Write the default configuration file and exit
    #[arg(long)]
    generate_config: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Generate config and exit if requested
    if cli.generate_config {
        CliConfig::write_default(&cli.config)?;
        println!("Generated default configuration: {}", cli.config.display());
        return Ok(());
    }

    let config = load_config(&cli);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_filter())),
        )
        .with_target(config.logging.show_target)
        .with_writer(std::io::stderr)
        .init();

    let mut settings = config.query;
    if let Some(page_size) = cli.page_size {
        settings.page_size = page_size;
    }
    if let Some(bucket_count) = cli.bucket_count {
        settings.bucket_count = bucket_count;
    }
    if cli.compatibility {
        settings.compatibility_mode = true;
    }
    debug!("Query settings: {:?}", settings);

    let esql = Esql::with_config(settings.into_config())?;
    let sql = read_sql(cli.sql)?;
    let search_after = parse_search_after(cli.search_after.as_deref())?;

    let conversion = if cli.pretty {
        esql.convert_pretty(&sql, &search_after)
    } else {
        esql.convert(&sql, &search_after)
    }
    .with_context(|| format!("Failed to translate: {}", sql.trim()))?;

    println!("{}", conversion.dsl);
    if !conversion.sort_fields.is_empty() {
        info!("Sort fields: {}", conversion.sort_fields.join(", "));
        eprintln!("sort fields: {}", conversion.sort_fields.join(", "));
    }
    Ok(())
}

fn load_config(cli: &Cli) -> CliConfig {
    if !cli.config.exists() {
        return CliConfig::default();
    }
    match CliConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Failed to load {}: {}", cli.config.display(), e);
            eprintln!("Using default configuration");
            CliConfig::default()
        }
    }
}

fn read_sql(arg: Option<String>) -> Result<String> {
    let sql = match arg {
        Some(sql) => sql,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read SQL from stdin")?;
            buf
        }
    };
    if sql.trim().is_empty() {
        bail!("No SQL statement given");
    }
    Ok(sql)
}

fn parse_search_after(arg: Option<&str>) -> Result<Vec<Value>> {
    let Some(text) = arg else {
        return Ok(Vec::new());
    };
    match serde_json::from_str::<Value>(text).context("--search-after must be JSON")? {
        Value::Array(values) => Ok(values),
        _ => bail!("--search-after must be a JSON array"),
    }
}
