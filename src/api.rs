use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::OPINION_API_BASE;
use crate::types::{Position, TradeEvent};

/// Attempts per fetch before giving up.
const FETCH_ATTEMPTS: u32 = 3;
/// Fixed backoff between attempts.
const FETCH_BACKOFF: Duration = Duration::from_secs(2);
/// Per-attempt request timeout.
const FETCH_TIMEOUT: Duration = Duration::from_secs(45);

/// Venue fetch failure, classified so callers can branch on kind instead of
/// matching error strings.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("venue request failed: {0}")]
    Transient(String),
    #[error("malformed venue response: {0}")]
    Malformed(String),
    #[error("venue retries exhausted, last error: {0}")]
    Exhausted(String),
}

/// HTTP client for the opinion.trade open API.
#[derive(Clone)]
pub struct VenueClient {
    http: reqwest::Client,
    base: String,
    api_key: String,
}

impl VenueClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base(OPINION_API_BASE.to_string(), api_key)
    }

    pub fn with_base(base: String, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base,
            api_key,
        }
    }

    /// Fetch the venue's current trade list for a wallet, freshest-first.
    ///
    /// Retries transient and parse errors up to [`FETCH_ATTEMPTS`] times with
    /// a fixed backoff, then reports [`FetchError::Exhausted`]. The caller
    /// treats that as one failed poll cycle, never as fatal.
    pub async fn fetch_trades(&self, wallet: &str) -> Result<Vec<TradeEvent>, FetchError> {
        let url = format!("{}/trade/user/{wallet}", self.base);
        let mut last_err = FetchError::Transient("no attempt made".to_string());
        for attempt in 1..=FETCH_ATTEMPTS {
            match self.get_list(&url).await {
                Ok(trades) => {
                    debug!("Fetched {} trades for {wallet}", trades.len());
                    return Ok(trades);
                }
                Err(e) => {
                    debug!("Trade fetch attempt {attempt}/{FETCH_ATTEMPTS} failed: {e}");
                    last_err = e;
                }
            }
            if attempt < FETCH_ATTEMPTS {
                tokio::time::sleep(FETCH_BACKOFF).await;
            }
        }
        Err(FetchError::Exhausted(last_err.to_string()))
    }

    /// Fetch open positions for a wallet. Single attempt; presentation-layer
    /// callers degrade to an apologetic message on failure.
    pub async fn fetch_positions(&self, wallet: &str) -> Result<Vec<Position>, FetchError> {
        let url = format!("{}/positions/user/{wallet}", self.base);
        let positions = self.get_list(&url).await?;
        debug!("Fetched {} positions for {wallet}", positions.len());
        Ok(positions)
    }

    /// GET a list endpoint and unwrap the venue's envelope: an object with a
    /// `data` array, or a bare array. Anything else is an empty list, never
    /// an error.
    async fn get_list<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<Vec<T>, FetchError> {
        let resp = self
            .http
            .get(url)
            .header("apikey", &self.api_key)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::Transient(format!("HTTP {status} from {url}")));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| FetchError::Malformed(e.to_string()))?;
        Ok(unwrap_envelope(body))
    }
}

/// Pull the record list out of the venue's response envelope. Records that
/// fail to deserialize individually are dropped rather than failing the
/// batch.
fn unwrap_envelope<T: serde::de::DeserializeOwned>(body: Value) -> Vec<T> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("data") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_bare_array() {
        let trades: Vec<TradeEvent> = unwrap_envelope(json!([{ "txHash": "0x1" }]));
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].identifier(), "0x1");
    }

    #[test]
    fn envelope_data_field() {
        let trades: Vec<TradeEvent> =
            unwrap_envelope(json!({ "data": [{ "txHash": "0x1" }, { "txHash": "0x2" }] }));
        assert_eq!(trades.len(), 2);
    }

    #[test]
    fn envelope_missing_data_is_empty() {
        let trades: Vec<TradeEvent> = unwrap_envelope(json!({ "code": 0, "msg": "ok" }));
        assert!(trades.is_empty());
    }

    #[test]
    fn envelope_junk_is_empty() {
        let trades: Vec<TradeEvent> = unwrap_envelope(json!("oops"));
        assert!(trades.is_empty());
        let trades: Vec<TradeEvent> = unwrap_envelope(json!(42));
        assert!(trades.is_empty());
    }

    #[test]
    fn envelope_drops_undecodable_records() {
        // A bare string cannot become a TradeEvent; the object next to it can.
        let trades: Vec<TradeEvent> = unwrap_envelope(json!({ "data": ["junk", { "id": 1 }] }));
        assert_eq!(trades.len(), 1);
    }
}
