use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info};

use crate::{MORALIS_API_BASE, SAFE_PROXY_FACTORY};

/// Pages of transaction history to scan before giving up.
const MAX_PAGES: u32 = 5;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One-shot lookup of the smart trading wallet deployed for an EOA.
///
/// Walks the EOA's BSC transaction history (via the Moralis deep-index API)
/// for a call to the Safe proxy factory, then reads the factory's event log
/// in that transaction to extract the deployed proxy address. Returns
/// `Ok(None)` when no factory transaction exists, which usually means the
/// wallet never used the venue.
pub async fn find_smart_wallet(
    http: &reqwest::Client,
    api_key: &str,
    eoa: &str,
) -> Result<Option<String>> {
    find_smart_wallet_at(http, MORALIS_API_BASE, api_key, eoa).await
}

async fn find_smart_wallet_at(
    http: &reqwest::Client,
    base: &str,
    api_key: &str,
    eoa: &str,
) -> Result<Option<String>> {
    let factory = SAFE_PROXY_FACTORY.to_lowercase();
    let url = format!("{base}/{eoa}");
    let mut cursor: Option<String> = None;

    for page in 0..MAX_PAGES {
        let mut req = http
            .get(&url)
            .header("accept", "application/json")
            .header("X-API-Key", api_key)
            .query(&[("chain", "bsc"), ("limit", "100")])
            .timeout(REQUEST_TIMEOUT);
        if let Some(c) = &cursor {
            req = req.query(&[("cursor", c.as_str())]);
        }
        let body: Value = req
            .send()
            .await
            .context("moralis transaction list request failed")?
            .json()
            .await
            .context("moralis transaction list returned malformed JSON")?;

        let txs = body["result"].as_array().cloned().unwrap_or_default();
        debug!("Page {page}: {} transactions for {eoa}", txs.len());

        for tx in &txs {
            let to = tx["to_address"].as_str().unwrap_or_default();
            if !to.eq_ignore_ascii_case(&factory) {
                continue;
            }
            let Some(hash) = tx["hash"].as_str() else {
                continue;
            };
            info!("Found factory transaction {hash} for {eoa}");
            if let Some(proxy) = extract_proxy(http, base, api_key, hash, &factory).await? {
                return Ok(Some(proxy));
            }
        }

        cursor = body["cursor"].as_str().map(str::to_owned).filter(|c| !c.is_empty());
        if cursor.is_none() {
            break;
        }
    }

    Ok(None)
}

/// Read a transaction's logs and pull the proxy address out of the factory's
/// event data.
async fn extract_proxy(
    http: &reqwest::Client,
    base: &str,
    api_key: &str,
    tx_hash: &str,
    factory: &str,
) -> Result<Option<String>> {
    let body: Value = http
        .get(format!("{base}/transaction/{tx_hash}"))
        .header("accept", "application/json")
        .header("X-API-Key", api_key)
        .query(&[("chain", "bsc")])
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await
        .context("moralis transaction detail request failed")?
        .json()
        .await
        .context("moralis transaction detail returned malformed JSON")?;

    let logs = body["logs"].as_array().cloned().unwrap_or_default();
    for log in &logs {
        let addr = log["address"].as_str().unwrap_or_default();
        if !addr.eq_ignore_ascii_case(factory) {
            continue;
        }
        let data = log["data"].as_str().unwrap_or_default();
        if let Some(proxy) = proxy_from_log_data(data) {
            return Ok(Some(proxy));
        }
    }
    Ok(None)
}

/// The factory's deployment event packs the proxy address into the low 20
/// bytes of the first 32-byte data word.
fn proxy_from_log_data(data: &str) -> Option<String> {
    let hex = data.strip_prefix("0x").unwrap_or(data);
    // get() rather than a range index: log data is venue-controlled text and
    // a multibyte character across the slice boundary must not panic.
    let addr = hex.get(24..64)?;
    if !addr.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("0x{}", addr.to_lowercase()))
}
