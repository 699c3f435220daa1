use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::process::Command;

use anyhow::{anyhow, Result};
use csv::ReaderBuilder;
use tempfile::NamedTempFile;

const HEADER: &str = "transaction_id,status,suspicious_flag,reason";

fn run(path: &Path, envs: &[(&str, &str)]) -> Result<HashMap<String, (String, String, String)>> {
    let binary_path = env!("CARGO_BIN_EXE_fraud-guard");

    let output = Command::new(binary_path)
        .arg(path)
        .envs(envs.iter().copied())
        .output()?;

    assert!(output.status.success());

    let mut reader = ReaderBuilder::new().from_reader(output.stdout.as_slice());

    assert_eq!(reader.headers()?.iter().collect::<Vec<_>>().join(","), HEADER);

    let mut results = HashMap::new();

    for record in reader.records() {
        let record = record?;

        assert_eq!(record.len(), 4);

        results.insert(record[0].to_string(), (record[1].to_string(), record[2].to_string(), record[3].to_string()));
    }

    Ok(results)
}

#[test]
fn test_cli_correctly_processes_sample() -> Result<()> {
    let results = run(&Path::new("samples").join("sample.csv"), &[])?;

    assert_eq!(results.len(), 10);

    for (status, suspicious, _) in results.values() {
        assert!(status == "approved" || status == "pending", "unexpected status {status}");
        let suspicious: bool = suspicious.parse()?;
        assert_eq!(suspicious, status == "pending");
    }

    Ok(())
}

#[test]
fn test_cli_outputs_expected_decisions() -> Result<()> {
    let results = run(&Path::new("samples").join("fixed.csv"), &[])?;

    let expected = [
        ("A1", "approved", "false", "within normal parameters"),
        ("A2", "pending", "true", "amount exceeds normal range"),
        ("A3", "pending", "true", "incomplete data"),
        ("A4", "pending", "true", "merchant risk pattern"),
        ("A5", "pending", "true", "amount exceeds normal range")
    ];

    for (transaction_id, status, suspicious, reason) in expected {
        let result = results.get(transaction_id).ok_or_else(|| anyhow!("{transaction_id} missing from output"))?;

        assert_eq!(result.0, status, "{transaction_id}");
        assert_eq!(result.1, suspicious, "{transaction_id}");
        assert_eq!(result.2, reason, "{transaction_id}");
    }

    Ok(())
}

#[test]
fn test_cli_honours_threshold_from_environment() -> Result<()> {
    let mut file = NamedTempFile::new()?;

    writeln!(file, "transaction_id,user_id,amount,currency,merchant,transaction_date")?;
    writeln!(file, "B1,U001,300,USD,Amazon,2024-01-15T10:30:00Z")?;
    writeln!(file, "B2,U001,299.99,USD,Amazon,2024-01-15T10:31:00Z")?;

    let results = run(file.path(), &[("FRAUD_HIGH_AMOUNT_THRESHOLD", "300")])?;

    assert_eq!(results.get("B1").map(|result| result.0.as_str()), Some("pending"));
    assert_eq!(results.get("B2").map(|result| result.0.as_str()), Some("approved"));

    Ok(())
}

#[test]
fn test_cli_quotes_fields_containing_delimiters() -> Result<()> {
    let mut file = NamedTempFile::new()?;

    writeln!(file, "transaction_id,user_id,amount,currency,merchant,transaction_date")?;
    writeln!(file, "\"TX,1\",U001,25.00,USD,Amazon,2024-01-15T10:30:00Z")?;
    writeln!(file, "TX2,U001,25.00,USD,\"Acme, Inc\",2024-01-15T10:31:00Z")?;

    let results = run(file.path(), &[])?;

    assert_eq!(results.len(), 2);
    assert_eq!(results.get("TX,1").map(|result| result.0.as_str()), Some("approved"));
    assert_eq!(results.get("TX2").map(|result| result.0.as_str()), Some("approved"));

    Ok(())
}

#[test]
fn test_cli_rejects_invalid_configuration() -> Result<()> {
    let binary_path = env!("CARGO_BIN_EXE_fraud-guard");

    let output = Command::new(binary_path)
        .arg(Path::new("samples").join("fixed.csv"))
        .env("FRAUD_HIGH_AMOUNT_THRESHOLD", "lots")
        .output()?;

    assert!(!output.status.success());

    Ok(())
}
