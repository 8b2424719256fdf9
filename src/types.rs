use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single executed trade as reported by the venue's trade-list endpoint.
///
/// The venue's schema is loose (fields appear and disappear between records,
/// numbers arrive as strings or numbers), so every field is optional and
/// numeric-ish fields are kept as raw JSON values. Unknown fields are
/// retained in `extra` so the stringified-record identifier fallback covers
/// the whole record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeEvent {
    pub side: Option<String>,
    /// Outcome side, numerically coded: 1 = YES, 2 = NO.
    pub outcome_side: Option<Value>,
    pub price: Option<Value>,
    pub amount: Option<Value>,
    pub usd_amount: Option<Value>,
    pub shares: Option<Value>,
    pub fee: Option<Value>,
    pub tx_hash: Option<String>,
    pub trade_no: Option<Value>,
    pub created_at: Option<Value>,
    pub id: Option<Value>,
    pub market_name: Option<String>,
    pub market_title: Option<String>,
    #[serde(rename = "title")]
    pub title: Option<String>,
    #[serde(rename = "question")]
    pub question: Option<String>,
    pub market_id: Option<Value>,
    /// Root market id; differs from `market_id` for multi-outcome markets
    /// grouped under a shared root.
    pub root_market_id: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TradeEvent {
    /// Best available identifier for this trade, in priority order:
    /// transaction hash, sequence number, creation timestamp, record id,
    /// and as a last resort the stringified record. Never empty.
    pub fn identifier(&self) -> String {
        if let Some(hash) = non_empty(self.tx_hash.as_deref()) {
            return hash.to_string();
        }
        for v in [&self.trade_no, &self.created_at, &self.id] {
            if let Some(s) = value_ident(v.as_ref()) {
                return s;
            }
        }
        serde_json::to_string(self).unwrap_or_else(|_| "unknown".to_string())
    }

    /// Human-readable market name, with synthesized placeholders when the
    /// venue omits every naming field.
    pub fn market_label(&self) -> String {
        for name in [
            &self.market_name,
            &self.market_title,
            &self.title,
            &self.question,
        ] {
            if let Some(s) = non_empty(name.as_deref()) {
                return s.to_string();
            }
        }
        if let Some(id) = value_ident(self.market_id.as_ref()) {
            return format!("marketId:{id}");
        }
        if let Some(id) = value_ident(self.root_market_id.as_ref()) {
            return format!("rootMarketId:{id}");
        }
        "unknown".to_string()
    }

    /// YES/NO label for the numerically coded outcome side.
    pub fn outcome_label(&self) -> String {
        outcome_label(self.outcome_side.as_ref())
    }
}

/// An open position as reported by the venue's positions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub market_title: Option<String>,
    pub market_name: Option<String>,
    #[serde(rename = "title")]
    pub title: Option<String>,
    pub market_id: Option<Value>,
    pub outcome_side: Option<Value>,
    pub shares: Option<Value>,
    pub amount: Option<Value>,
    pub current_value: Option<Value>,
    #[serde(rename = "value")]
    pub value: Option<Value>,
    pub usd_value: Option<Value>,
    pub pnl: Option<Value>,
    pub unrealized_pnl: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Position {
    pub fn market_label(&self) -> String {
        for name in [&self.market_title, &self.market_name, &self.title] {
            if let Some(s) = non_empty(name.as_deref()) {
                return s.to_string();
            }
        }
        match value_ident(self.market_id.as_ref()) {
            Some(id) => format!("Market {id}"),
            None => "Market ?".to_string(),
        }
    }

    pub fn outcome_label(&self) -> String {
        outcome_label(self.outcome_side.as_ref())
    }
}

/// Display form of an optional raw JSON field: `"?"` when absent, the bare
/// string for string values, JSON text otherwise.
pub fn display_value(v: Option<&Value>) -> String {
    match v {
        None | Some(Value::Null) => "?".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn outcome_label(side: Option<&Value>) -> String {
    let raw = display_value(side);
    match raw.as_str() {
        "1" => "YES".to_string(),
        "2" => "NO".to_string(),
        _ => raw,
    }
}

/// Identifier form of a raw JSON field; `None` for null/absent/empty.
fn value_ident(v: Option<&Value>) -> Option<String> {
    match v {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn trade(v: Value) -> TradeEvent {
        serde_json::from_value(v).expect("valid trade JSON")
    }

    #[test]
    fn identifier_prefers_tx_hash() {
        let t = trade(json!({
            "txHash": "0xabc",
            "tradeNo": 42,
            "createdAt": "2026-01-01T00:00:00Z"
        }));
        assert_eq!(t.identifier(), "0xabc");
    }

    #[test]
    fn identifier_falls_back_to_trade_no() {
        let t = trade(json!({ "tradeNo": 42, "createdAt": "later" }));
        assert_eq!(t.identifier(), "42");
    }

    #[test]
    fn identifier_falls_back_to_created_at() {
        let t = trade(json!({ "createdAt": "2026-01-01T00:00:00Z" }));
        assert_eq!(t.identifier(), "2026-01-01T00:00:00Z");
    }

    #[test]
    fn identifier_stringifies_bare_record() {
        let t = trade(json!({ "side": "buy" }));
        let id = t.identifier();
        assert!(!id.is_empty());
        assert!(id.contains("buy"));
    }

    #[test]
    fn identifier_skips_empty_tx_hash() {
        let t = trade(json!({ "txHash": "", "tradeNo": 7 }));
        assert_eq!(t.identifier(), "7");
    }

    #[test]
    fn market_label_priority() {
        let t = trade(json!({ "marketName": "A", "marketTitle": "B", "title": "C" }));
        assert_eq!(t.market_label(), "A");
        let t = trade(json!({ "marketTitle": "B", "question": "D" }));
        assert_eq!(t.market_label(), "B");
    }

    #[test]
    fn market_label_synthesized_placeholders() {
        let t = trade(json!({ "marketId": 99 }));
        assert_eq!(t.market_label(), "marketId:99");
        let t = trade(json!({ "rootMarketId": "root-1" }));
        assert_eq!(t.market_label(), "rootMarketId:root-1");
        let t = trade(json!({}));
        assert_eq!(t.market_label(), "unknown");
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(trade(json!({ "outcomeSide": 1 })).outcome_label(), "YES");
        assert_eq!(trade(json!({ "outcomeSide": "2" })).outcome_label(), "NO");
        assert_eq!(trade(json!({ "outcomeSide": 3 })).outcome_label(), "3");
        assert_eq!(trade(json!({})).outcome_label(), "?");
    }

    #[test]
    fn display_value_forms() {
        assert_eq!(display_value(None), "?");
        assert_eq!(display_value(Some(&json!("0.55"))), "0.55");
        assert_eq!(display_value(Some(&json!(0.55))), "0.55");
        assert_eq!(display_value(Some(&Value::Null)), "?");
    }

    #[test]
    fn unknown_fields_survive_roundtrip() {
        let t = trade(json!({ "txHash": "0x1", "venueInternal": { "k": 1 } }));
        let back = serde_json::to_value(&t).expect("serialize");
        assert_eq!(back["venueInternal"]["k"], 1);
    }
}
