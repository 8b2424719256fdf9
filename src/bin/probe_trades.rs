//! Probe: venue trade-list endpoint
//!
//! Hits GET https://openapi.opinion.trade/openapi/trade/user/<wallet> and
//! documents:
//! - Response envelope and per-record fields
//! - Which identifier fields are present (txHash / tradeNo / createdAt)
//! - Identifier uniqueness across the returned window

use std::collections::HashSet;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;

use opinion_monitor::OPINION_API_BASE;

#[derive(Parser)]
#[command(name = "probe_trades", about = "Inspect the venue trade endpoint")]
struct Args {
    /// Smart wallet address to query
    wallet: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let api_key =
        std::env::var("OPINION_API_KEY").context("OPINION_API_KEY must be set")?;

    let client = reqwest::Client::new();
    let url = format!("{OPINION_API_BASE}/trade/user/{}", args.wallet);

    println!("=== Probe: trade list ===");
    println!("Wallet: {}", args.wallet);
    println!();

    let start = Instant::now();
    let resp = client
        .get(&url)
        .header("apikey", &api_key)
        .send()
        .await?;
    let latency = start.elapsed();
    println!("Status: {}", resp.status());
    println!("Latency: {latency:?}");

    let body: Value = resp.json().await?;
    let trades = match &body {
        Value::Array(items) => items.clone(),
        Value::Object(obj) => obj
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        _ => Vec::new(),
    };
    println!("Trade count: {}", trades.len());

    if let Some(first) = trades.first() {
        println!("\nSample trade (first):");
        println!("{}", serde_json::to_string_pretty(first)?);
        if let Some(obj) = first.as_object() {
            println!("\nFields present:");
            for key in obj.keys() {
                println!("  - {key}");
            }
        }
    }

    // Identifier coverage and uniqueness across the window
    let mut ids = HashSet::new();
    let mut missing = 0usize;
    for trade in &trades {
        let id = ["txHash", "tradeNo", "createdAt", "id"]
            .iter()
            .find_map(|k| trade.get(*k))
            .filter(|v| !v.is_null());
        match id {
            Some(v) => {
                ids.insert(v.to_string());
            }
            None => missing += 1,
        }
    }
    println!();
    println!("Distinct identifiers: {} / {}", ids.len(), trades.len());
    println!("Records with no identifier field: {missing}");

    Ok(())
}
