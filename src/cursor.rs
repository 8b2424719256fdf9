use crate::types::TradeEvent;

/// Result of diffing a freshly fetched trade list against the session cursor.
#[derive(Debug)]
pub struct Delta<'a> {
    /// Genuinely-new trades, oldest first, ready for delivery in the order a
    /// reader would watch them happen.
    pub fresh: Vec<&'a TradeEvent>,
    /// Cursor after this fetch: the identifier of the list head when the
    /// list is non-empty, otherwise the previous cursor untouched.
    pub cursor: Option<String>,
}

/// Diff a fetched trade list (index 0 = most recent) against the last
/// acknowledged identifier.
///
/// - No cursor yet (bootstrap): acknowledge the list head and emit nothing,
///   so pre-existing history is never replayed as new activity.
/// - Otherwise scan from the head, collecting trades until the cursor's
///   identifier is found (exclusive). A cursor that no longer appears in the
///   window (trade burst, venue reset) exhausts the scan and the whole list
///   counts as new; no deeper history is fetched.
///
/// The cursor only moves on a non-empty list; a failed fetch never reaches
/// this function, so a cursor always reflects a trade that was actually
/// observed.
pub fn diff_since<'a>(trades: &'a [TradeEvent], cursor: Option<&str>) -> Delta<'a> {
    let Some(head) = trades.first() else {
        return Delta {
            fresh: Vec::new(),
            cursor: cursor.map(str::to_owned),
        };
    };
    let head_id = head.identifier();

    let Some(cursor) = cursor else {
        return Delta {
            fresh: Vec::new(),
            cursor: Some(head_id),
        };
    };

    let mut fresh = Vec::new();
    for trade in trades {
        if trade.identifier() == cursor {
            break;
        }
        fresh.push(trade);
    }
    fresh.reverse();

    Delta {
        fresh,
        cursor: Some(head_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn trade(tx: &str) -> TradeEvent {
        serde_json::from_value(json!({ "txHash": tx, "side": "buy" })).expect("valid trade")
    }

    fn trades(txs: &[&str]) -> Vec<TradeEvent> {
        txs.iter().map(|t| trade(t)).collect()
    }

    fn ids(delta: &Delta<'_>) -> Vec<String> {
        delta.fresh.iter().map(|t| t.identifier()).collect()
    }

    #[test]
    fn bootstrap_emits_nothing_and_acknowledges_head() {
        let list = trades(&["tx3", "tx2", "tx1"]);
        let delta = diff_since(&list, None);
        assert!(delta.fresh.is_empty());
        assert_eq!(delta.cursor.as_deref(), Some("tx3"));
    }

    #[test]
    fn empty_list_leaves_cursor_untouched() {
        let delta = diff_since(&[], Some("tx1"));
        assert!(delta.fresh.is_empty());
        assert_eq!(delta.cursor.as_deref(), Some("tx1"));

        let delta = diff_since(&[], None);
        assert!(delta.fresh.is_empty());
        assert_eq!(delta.cursor, None);
    }

    #[test]
    fn new_trades_delivered_oldest_first() {
        // Fetch returns tx3, tx2, tx1 with cursor tx1 → emit tx2 then tx3.
        let list = trades(&["tx3", "tx2", "tx1"]);
        let delta = diff_since(&list, Some("tx1"));
        assert_eq!(ids(&delta), ["tx2", "tx3"]);
        assert_eq!(delta.cursor.as_deref(), Some("tx3"));
    }

    #[test]
    fn prepended_trades_are_exactly_the_delta() {
        let old = trades(&["tx2", "tx1"]);
        let delta = diff_since(&old, None);
        let cursor = delta.cursor;

        let new = trades(&["tx5", "tx4", "tx3", "tx2", "tx1"]);
        let delta = diff_since(&new, cursor.as_deref());
        assert_eq!(ids(&delta), ["tx3", "tx4", "tx5"]);
        assert_eq!(delta.cursor.as_deref(), Some("tx5"));
    }

    #[test]
    fn idempotent_when_nothing_new() {
        let list = trades(&["tx3", "tx2", "tx1"]);
        let delta = diff_since(&list, Some("tx3"));
        assert!(delta.fresh.is_empty());
        assert_eq!(delta.cursor.as_deref(), Some("tx3"));

        // Second identical fetch behaves identically.
        let delta = diff_since(&list, delta.cursor.as_deref());
        assert!(delta.fresh.is_empty());
        assert_eq!(delta.cursor.as_deref(), Some("tx3"));
    }

    #[test]
    fn cursor_missing_from_window_treats_all_as_new() {
        // Burst of more trades than the window holds: the acknowledged id
        // fell off the end of the list.
        let list = trades(&["tx9", "tx8", "tx7"]);
        let delta = diff_since(&list, Some("tx1"));
        assert_eq!(ids(&delta), ["tx7", "tx8", "tx9"]);
        assert_eq!(delta.cursor.as_deref(), Some("tx9"));
    }

    #[test]
    fn duplicate_identifiers_stop_at_first_match() {
        let list = trades(&["tx3", "tx2", "tx2", "tx1"]);
        let delta = diff_since(&list, Some("tx2"));
        // Scan stops at the first tx2; only tx3 is new.
        assert_eq!(ids(&delta), ["tx3"]);
    }

    #[test]
    fn identifierless_trades_still_participate() {
        let bare: TradeEvent =
            serde_json::from_value(json!({ "side": "sell", "price": "0.40" })).expect("trade");
        let list = vec![trade("tx2"), bare, trade("tx1")];
        let delta = diff_since(&list, Some("tx1"));
        // The bare record's stringified fallback keeps it in the delta.
        assert_eq!(delta.fresh.len(), 2);
        assert_eq!(delta.fresh[1].identifier(), "tx2");
        assert!(!delta.fresh[0].identifier().is_empty());
        assert_eq!(delta.cursor.as_deref(), Some("tx2"));
    }

    #[test]
    fn bootstrap_on_single_trade() {
        let list = trades(&["tx1"]);
        let delta = diff_since(&list, None);
        assert!(delta.fresh.is_empty());
        assert_eq!(delta.cursor.as_deref(), Some("tx1"));
    }
}
