use std::fs::File;
use std::io::{stderr, stdout, BufReader, BufWriter};
use std::process::exit;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use csv::{ReaderBuilder, Trim, WriterBuilder};
use futures::future::join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

use fraud_guard::engine::Evaluation;
use fraud_guard::models::{Transaction, TransactionStatus};
use fraud_guard::storage::{NotificationOutbox, TransactionStorage};
use fraud_guard::types::{Timestamp, TransactionId, UserId};
use fraud_guard::{EngineError, FraudConfig, FraudEngine};

/// One input row. Lifecycle fields are never read from input.
#[derive(Debug, Deserialize)]
struct SubmittedTransaction {
    transaction_id: TransactionId,
    #[serde(default)]
    user_id: UserId,
    #[serde(default)]
    amount: Option<Decimal>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    merchant: Option<String>,
    #[serde(default)]
    transaction_date: Option<Timestamp>
}

/// One output row. Fields are quoted by the writer when they contain a delimiter.
#[derive(Debug, Serialize)]
struct ResultRow<'a> {
    transaction_id: &'a str,
    status: TransactionStatus,
    suspicious_flag: bool,
    reason: &'a str
}

impl<'a> From<&'a Evaluation> for ResultRow<'a> {
    fn from(evaluation: &'a Evaluation) -> Self {
        Self {
            transaction_id: &evaluation.transaction.transaction_id,
            status: evaluation.transaction.status(),
            suspicious_flag: evaluation.transaction.is_suspicious(),
            reason: evaluation.verdict.reason()
        }
    }
}

impl From<SubmittedTransaction> for Transaction {
    fn from(row: SubmittedTransaction) -> Self {
        let currency = row.currency
            .filter(|currency| !currency.is_empty())
            .unwrap_or_else(|| "USD".to_string());

        let mut transaction = Transaction::new(
            row.transaction_id,
            row.user_id,
            Decimal::ZERO,
            currency,
            String::new(),
            row.transaction_date.unwrap_or_else(Utc::now)
        );

        transaction.amount = row.amount;
        transaction.merchant = row.merchant;
        transaction
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: fraud-guard [input].csv [log_level:optional] > [output].csv");
        eprintln!("Available log levels: error, warn, info, debug, trace (default: error)");
        exit(1);
    }

    let path = &args[1];
    let log_level = args.get(2)
        .map(|s| parse_log_level(s)).unwrap_or_else(|| LevelFilter::ERROR);

    setup_logging(log_level);

    let config = FraudConfig::from_env()?;
    let engine = FraudEngine::new(Arc::new(TransactionStorage::new()), Arc::new(NotificationOutbox::new()), config);

    let transactions = read_transactions(path)?;

    let timer = Instant::now();
    let results = join_all(transactions.into_iter().map(|transaction| engine.evaluate(transaction))).await;
    let duration = timer.elapsed();

    info!("Evaluated {} transaction(s) in: {duration:?}", results.len());

    write_results_to_stdout(&results)?;

    engine.shutdown().await;

    Ok(())
}

fn parse_log_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => {
            eprintln!("Invalid log level '{}', defaulting to 'error'", level);
            LevelFilter::ERROR
        }
    }
}

fn setup_logging(level: LevelFilter) {
    //NOTE: Results go to stdout, so logging goes to stderr
    let terminal_log = fmt::layer()
        .with_target(false)
        .with_writer(stderr)
        .with_filter(level);

    tracing_subscriber::registry()
        .with(terminal_log)
        .init();
}

fn read_transactions(path: &str) -> Result<Vec<Transaction>> {
    let file = File::open(path).with_context(|| format!("Error opening CSV at path: {path}"))?;

    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let mut transactions = Vec::new();

    for result in reader.deserialize::<SubmittedTransaction>() {
        match result {
            Ok(row) => transactions.push(Transaction::from(row)),
            Err(error) => error!("CSV deserialization error: {error}")
        }
    }

    Ok(transactions)
}

fn write_results_to_stdout(results: &[Result<Evaluation, EngineError>]) -> Result<()> {
    let mut output = WriterBuilder::new()
        .has_headers(false)
        .from_writer(BufWriter::new(stdout().lock()));

    output.write_record(["transaction_id", "status", "suspicious_flag", "reason"])?;

    for result in results {
        match result {
            Ok(evaluation) => {
                if let Some(notice) = &evaluation.notice {
                    warn!("Transaction [{}]: {notice}", evaluation.transaction.transaction_id);
                }

                output.serialize(ResultRow::from(evaluation))?;
            },
            Err(error) => error!("{}", error.user_message())
        }
    }

    output.flush()?;

    Ok(())
}
