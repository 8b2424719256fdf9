use crate::daily::DailyRollup;
use crate::telegram::{InlineButton, InlineKeyboard};
use crate::types::{Position, TradeEvent, display_value};

/// Inline main menu shown by `/start` and `/menu`.
pub fn main_menu() -> InlineKeyboard {
    InlineKeyboard::rows(vec![
        vec![InlineButton::new("🔍 Find Smart Wallet", "find_wallet")],
        vec![InlineButton::new("👁 Monitor Wallet", "monitor_wallet")],
        vec![InlineButton::new("📊 View Positions", "view_positions")],
        vec![InlineButton::new("🕘 Recent Trades", "view_history")],
    ])
}

/// Single "back to menu" button appended to most replies.
pub fn menu_markup() -> InlineKeyboard {
    InlineKeyboard::single("🏠 Main menu", "main_menu")
}

pub const WELCOME_TEXT: &str = "👋 Welcome! Pick a feature:";

/// Confirm/cancel keyboard for switching the watched wallet.
pub fn confirm_change_markup(new_wallet: &str) -> InlineKeyboard {
    InlineKeyboard::rows(vec![vec![
        InlineButton::new("✅ Yes, switch", &format!("confirm_change:{new_wallet}")),
        InlineButton::new("❌ No, keep current", "cancel_change"),
    ]])
}

/// One notification per newly executed trade.
pub fn trade_message(wallet: &str, trade: &TradeEvent) -> String {
    let mut lines = vec![
        "✅ TRADE EXECUTED (Opinion)".to_string(),
        format!("Wallet: `{wallet}`"),
        format!(
            "Side: {} | Outcome: {}",
            trade.side.as_deref().unwrap_or(""),
            trade.outcome_label()
        ),
        format!("Price: {}", display_value(trade.price.as_ref())),
        format!(
            "Amount: {} | USD: {}",
            display_value(trade.amount.as_ref()),
            display_value(trade.usd_amount.as_ref())
        ),
        format!("Shares: {}", display_value(trade.shares.as_ref())),
        format!("Fee: {}", display_value(trade.fee.as_ref())),
    ];
    if let Some(hash) = trade.tx_hash.as_deref().filter(|h| !h.is_empty()) {
        lines.push(format!("Tx: `{hash}`"));
    }
    if let Some(ts) = trade.created_at.as_ref() {
        lines.push(format!("Time: {}", display_value(Some(ts))));
    }
    lines.join("\n")
}

/// Positions listing for the watched wallet.
pub fn positions_message(wallet: &str, positions: &[Position]) -> String {
    if positions.is_empty() {
        return format!("📭 Wallet `{}...` has no open positions.", short(wallet));
    }
    let mut lines = vec![format!("📊 Positions of wallet `{}...`\n", short(wallet))];
    for (i, p) in positions.iter().enumerate() {
        let title = clip(&p.market_label(), 50);
        let shares = first_value([&p.shares, &p.amount]);
        let value = first_value([&p.current_value, &p.value, &p.usd_value]);
        lines.push(format!("{}. *{title}*", i + 1));
        lines.push(format!(
            "   {} | Shares: {shares} | Value: {value}",
            p.outcome_label()
        ));
        let pnl = first_value([&p.pnl, &p.unrealized_pnl]);
        if pnl != "?" {
            lines.push(format!("   PnL: {pnl}"));
        }
    }
    lines.join("\n")
}

/// Recent-trade listing for the watched wallet, newest first.
pub fn history_message(wallet: &str, trades: &[TradeEvent], limit: usize) -> String {
    if trades.is_empty() {
        return format!("📭 No recent trades for wallet `{}...`.", short(wallet));
    }
    let mut lines = vec![format!("🕘 Recent trades of wallet `{}...`\n", short(wallet))];
    for (i, t) in trades.iter().take(limit).enumerate() {
        let title = clip(&t.market_label(), 50);
        lines.push(format!("{}. *{title}*", i + 1));
        lines.push(format!(
            "   {} {} @ {} | USD: {}",
            t.side.as_deref().unwrap_or("?"),
            t.outcome_label(),
            display_value(t.price.as_ref()),
            display_value(t.usd_amount.as_ref()),
        ));
    }
    lines.join("\n")
}

/// End-of-day rollup message.
pub fn daily_summary(wallet: &str, rollup: &DailyRollup) -> String {
    let mut lines = vec![
        format!("📊 Daily Summary ({})", rollup.date),
        format!("Wallet: {wallet}"),
        format!("Total executed trades: {}", rollup.total),
        "Markets traded today:".to_string(),
    ];
    if rollup.markets.is_empty() {
        lines.push("- (none)".to_string());
    } else {
        for market in &rollup.markets {
            lines.push(format!("- {market}"));
        }
    }
    lines.join("\n")
}

fn short(wallet: &str) -> String {
    clip(wallet, 10)
}

/// Clip to at most `max` characters without splitting a char boundary.
fn clip(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn first_value<const N: usize>(fields: [&Option<serde_json::Value>; N]) -> String {
    fields
        .iter()
        .find_map(|f| f.as_ref())
        .map(|v| display_value(Some(v)))
        .unwrap_or_else(|| "?".to_string())
}
