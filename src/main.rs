//! sqlogger - run SQL statements through the logging driver wrapper.
//!
//! Every statement is executed on one connection, in order. Each driver call
//! is logged through the default `tracing` logger.

use clap::Parser;
use serde_json::{Map, Value as JsonValue};
use sqlogger::config::Config;
use sqlogger::context::Context;
use sqlogger::models::mask_dsn;
use sqlogger::{DbError, default_logger};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

/// Statements whose results are printed as rows rather than a count.
fn returns_rows(sql: &str) -> bool {
    let keyword = sql
        .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    matches!(
        keyword.as_str(),
        "SELECT" | "WITH" | "VALUES" | "PRAGMA" | "EXPLAIN" | "SHOW" | "DESCRIBE"
    )
}

fn row_to_json(columns: &[String], row: Vec<sqlogger::models::Value>) -> JsonValue {
    let mut object = Map::with_capacity(columns.len());
    for (column, value) in columns.iter().zip(row) {
        object.insert(
            column.clone(),
            serde_json::to_value(value).unwrap_or(JsonValue::Null),
        );
    }
    JsonValue::Object(object)
}

fn statement_context(config: &Config) -> Context {
    match config.timeout() {
        Some(timeout) => Context::background().with_timeout(timeout),
        None => Context::background(),
    }
}

async fn run(config: &Config) -> Result<(), DbError> {
    let driver = config.driver_name().map_err(DbError::invalid_input)?;
    let db = sqlogger::open(
        &driver,
        &config.database,
        default_logger(),
        Some(config.options()),
    )?;

    for sql in &config.statements {
        let ctx = statement_context(config);
        if returns_rows(sql) {
            let rows = db.query(&ctx, sql, &[]).await?;
            let columns = rows.columns().to_vec();
            for row in rows.collect_all().await? {
                println!("{}", row_to_json(&columns, row));
            }
        } else {
            let result = db.exec(&ctx, sql, &[]).await?;
            match result.rows_affected() {
                Ok(count) => println!("{} row(s) affected", count),
                Err(_) => println!("OK"),
            }
        }
    }

    db.close().await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    // Initialize logging
    init_tracing(&config);

    info!(
        database = %mask_dsn(&config.database),
        statements = config.statements.len(),
        "Starting sqlogger v{}",
        env!("CARGO_PKG_VERSION")
    );

    if let Err(e) = run(&config).await {
        error!(error = %e, "Execution failed");
        if let Some(suggestion) = e.suggestion() {
            eprintln!("Hint: {}", suggestion);
        }
        return Err(e.into());
    }

    Ok(())
}
