use std::path::Path;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::state::write_atomic;
use crate::types::TradeEvent;

/// Per-calendar-day aggregate of trading activity: total executed trades and
/// the distinct markets touched.
///
/// The stored date must always equal "today" at read time; anything stale is
/// discarded and replaced with an empty rollup before further mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyRollup {
    pub date: String,
    pub total: u64,
    pub markets: Vec<String>,
}

impl Default for DailyRollup {
    fn default() -> Self {
        Self::empty_for(today())
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

impl DailyRollup {
    pub fn empty_for(date: NaiveDate) -> Self {
        Self {
            date: date.to_string(),
            total: 0,
            markets: Vec::new(),
        }
    }

    /// Load the rollup, resetting to an empty one for today on a stale date,
    /// a missing file, or a parse error.
    pub fn load(path: &Path) -> Self {
        Self::load_for(path, today())
    }

    fn load_for(path: &Path, date: NaiveDate) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to read {}: {e}", path.display());
                }
                return Self::empty_for(date);
            }
        };
        match serde_json::from_str::<Self>(&contents) {
            Ok(rollup) if rollup.date == date.to_string() => rollup,
            Ok(_) => Self::empty_for(date),
            Err(e) => {
                warn!("Discarding unparseable {}: {e}", path.display());
                Self::empty_for(date)
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, &serde_json::to_string_pretty(self)?)
    }

    /// Count a delivered trade: bump the total and record its market name
    /// once. Rolls over to an empty rollup first if the day has changed
    /// since the last write.
    pub fn record(&mut self, trade: &TradeEvent) {
        self.record_on(trade, today());
    }

    fn record_on(&mut self, trade: &TradeEvent, date: NaiveDate) {
        if self.date != date.to_string() {
            *self = Self::empty_for(date);
        }
        self.total += 1;
        let market = trade.market_label();
        if !self.markets.contains(&market) {
            self.markets.push(market);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(s: &str) -> NaiveDate {
        s.parse().expect("valid date")
    }

    fn trade(market: &str) -> TradeEvent {
        serde_json::from_value(json!({ "txHash": "0x1", "marketName": market }))
            .expect("valid trade")
    }

    #[test]
    fn stale_date_resets_on_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("daily.json");
        let yesterday = DailyRollup {
            date: "2026-08-29".to_string(),
            total: 7,
            markets: vec!["Old market".to_string()],
        };
        yesterday.save(&path).expect("save");

        let rollup = DailyRollup::load_for(&path, date("2026-08-30"));
        assert_eq!(rollup.date, "2026-08-30");
        assert_eq!(rollup.total, 0);
        assert!(rollup.markets.is_empty());
    }

    #[test]
    fn same_day_load_keeps_counts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("daily.json");
        let mut rollup = DailyRollup::empty_for(date("2026-08-30"));
        rollup.record_on(&trade("BTC above 100k"), date("2026-08-30"));
        rollup.save(&path).expect("save");

        let loaded = DailyRollup::load_for(&path, date("2026-08-30"));
        assert_eq!(loaded, rollup);
        assert_eq!(loaded.total, 1);
    }

    #[test]
    fn missing_or_corrupt_file_is_empty_today() {
        let rollup = DailyRollup::load_for(Path::new("/nonexistent/d.json"), date("2026-08-30"));
        assert_eq!(rollup, DailyRollup::empty_for(date("2026-08-30")));

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("daily.json");
        std::fs::write(&path, "nope").expect("write");
        let rollup = DailyRollup::load_for(&path, date("2026-08-30"));
        assert_eq!(rollup.total, 0);
    }

    #[test]
    fn record_deduplicates_market_names() {
        let mut rollup = DailyRollup::empty_for(date("2026-08-30"));
        rollup.record_on(&trade("Election"), date("2026-08-30"));
        rollup.record_on(&trade("Election"), date("2026-08-30"));
        rollup.record_on(&trade("Rates"), date("2026-08-30"));
        assert_eq!(rollup.total, 3);
        assert_eq!(rollup.markets, ["Election", "Rates"]);
    }

    #[test]
    fn record_rolls_over_midnight() {
        let mut rollup = DailyRollup::empty_for(date("2026-08-29"));
        rollup.record_on(&trade("Election"), date("2026-08-29"));
        rollup.record_on(&trade("Rates"), date("2026-08-30"));
        assert_eq!(rollup.date, "2026-08-30");
        assert_eq!(rollup.total, 1);
        assert_eq!(rollup.markets, ["Rates"]);
    }

    #[test]
    fn reload_after_external_reset_starts_fresh() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("daily.json");
        let mut rollup = DailyRollup::empty_for(date("2026-08-30"));
        rollup.record_on(&trade("Election"), date("2026-08-30"));
        rollup.save(&path).expect("save");

        // Another writer flushes the rollup and resets the file, as the
        // summary path does. A delivery batch must reload before recording
        // so the flushed counts are not resurrected.
        DailyRollup::empty_for(date("2026-08-30"))
            .save(&path)
            .expect("reset");

        let mut reloaded = DailyRollup::load_for(&path, date("2026-08-30"));
        reloaded.record_on(&trade("Rates"), date("2026-08-30"));
        assert_eq!(reloaded.total, 1);
        assert_eq!(reloaded.markets, ["Rates"]);
    }

    #[test]
    fn record_uses_placeholder_labels() {
        let mut rollup = DailyRollup::empty_for(date("2026-08-30"));
        let bare: TradeEvent =
            serde_json::from_value(json!({ "marketId": 7 })).expect("valid trade");
        rollup.record_on(&bare, date("2026-08-30"));
        assert_eq!(rollup.markets, ["marketId:7"]);
    }
}
