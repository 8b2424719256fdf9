use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use anyhow::Result;
use chrono::{Local, NaiveDate, Timelike};
use tracing::{debug, info, warn};

use crate::api::VenueClient;
use crate::config::{AppConfig, Credentials};
use crate::daily::DailyRollup;
use crate::monitor::{self, MonitorContext, MonitorHandle};
use crate::reporter;
use crate::state::SessionState;
use crate::telegram::{
    CallbackQuery, InlineButton, InlineKeyboard, Message, TelegramClient, Update,
};
use crate::wallet;

/// Processed-update-id set cap; beyond it the oldest half is dropped.
const PROCESSED_IDS_CAP: usize = 1024;

/// Pause after an ingestion-loop error before polling again.
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Trades shown by the recent-history command.
const HISTORY_LIMIT: usize = 10;

/// Pending multi-step dialogue state for a chat.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ChatStep {
    AwaitingEoa,
    AwaitingWallet,
}

/// All mutable session state, owned by the bot and passed around explicitly.
#[derive(Default)]
struct SessionRegistry {
    /// The at-most-one live polling task.
    monitor: Option<MonitorHandle>,
    /// Per-chat dialogue steps.
    chat_steps: HashMap<i64, ChatStep>,
}

impl SessionRegistry {
    fn live_wallet(&self) -> Option<&str> {
        self.monitor
            .as_ref()
            .filter(|h| h.is_alive())
            .map(|h| h.wallet.as_str())
    }
}

/// The command-surface driver: long-polls Telegram, dispatches updates, and
/// owns the monitor session lifecycle.
pub struct Bot {
    telegram: TelegramClient,
    venue: VenueClient,
    http: reqwest::Client,
    config: AppConfig,
    moralis_api_key: Option<String>,
    registry: SessionRegistry,
    /// Update ids already dispatched; the transport is at-least-once, so the
    /// offset alone does not prevent redelivery after a failed batch.
    processed_ids: BTreeSet<i64>,
    offset: i64,
    last_summary_date: Option<NaiveDate>,
}

impl Bot {
    pub fn new(config: AppConfig, credentials: Credentials) -> Self {
        Self {
            telegram: TelegramClient::new(&credentials.bot_token),
            venue: VenueClient::new(credentials.venue_api_key),
            http: reqwest::Client::new(),
            moralis_api_key: credentials.moralis_api_key,
            config,
            registry: SessionRegistry::default(),
            processed_ids: BTreeSet::new(),
            offset: 0,
            last_summary_date: None,
        }
    }

    fn monitor_context(&self) -> MonitorContext {
        MonitorContext {
            venue: self.venue.clone(),
            telegram: self.telegram.clone(),
            poll_interval: Duration::from_secs(self.config.settings.poll_interval_secs),
            heartbeat: Duration::from_secs(self.config.settings.heartbeat_secs),
            state_path: self.config.settings.state_path.clone().into(),
            daily_path: self.config.settings.daily_path.clone().into(),
        }
    }

    /// Run the ingestion loop forever. Errors are logged and retried after a
    /// short pause; nothing here terminates the process.
    pub async fn run(mut self) -> Result<()> {
        info!("Bot started, polling Telegram updates");
        self.auto_resume().await;

        loop {
            match self.telegram.get_updates(self.offset).await {
                Ok(updates) => {
                    for update in updates {
                        self.offset = self.offset.max(update.update_id + 1);
                        if !self.processed_ids.insert(update.update_id) {
                            debug!("Skipping redelivered update {}", update.update_id);
                            continue;
                        }
                        trim_processed(&mut self.processed_ids, PROCESSED_IDS_CAP);
                        self.dispatch(update).await;
                    }
                }
                Err(e) => {
                    warn!("Update loop error: {e}");
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
            self.maybe_flush_daily().await;
        }
    }

    /// Resume the persisted watch, if any, without waiting for a command.
    async fn auto_resume(&mut self) {
        let state = SessionState::load(&self.state_path());
        let Some(wallet) = state.watched_wallet else {
            return;
        };
        let chat_id = state
            .chat_id
            .or_else(|| self.config.telegram.default_chat_id.clone());
        let Some(chat_id) = chat_id else {
            warn!("Persisted wallet {wallet} has no chat id to notify, not resuming");
            return;
        };
        info!("Auto-resuming monitor for {wallet}");
        let handle = monitor::spawn(self.monitor_context(), wallet, chat_id);
        self.registry.monitor = Some(handle);
    }

    /// Start (or switch to) a watch on `wallet`, notifying `chat_id`.
    ///
    /// Stops and joins any previous task first, then persists the new
    /// session wholesale with an absent cursor before spawning the
    /// replacement, so two tasks never race on the persisted cursor.
    async fn start_monitoring(&mut self, chat_id: i64, wallet: &str) {
        // Stop the old task before touching the persisted state, or its last
        // cycle could overwrite the reset cursor.
        if let Some(old) = self.registry.monitor.take() {
            old.stop().await;
        }

        let state = SessionState {
            cursor: None,
            watched_wallet: Some(wallet.to_string()),
            chat_id: Some(chat_id.to_string()),
        };
        if let Err(e) = state.save(&self.state_path()) {
            warn!("Failed to persist new session: {e}");
        }

        let handle = monitor::spawn(
            self.monitor_context(),
            wallet.to_string(),
            chat_id.to_string(),
        );
        self.registry.monitor = Some(handle);
    }

    async fn dispatch(&mut self, update: Update) {
        let result = if let Some(message) = update.message {
            self.handle_message(message).await
        } else if let Some(callback) = update.callback_query {
            self.handle_callback(callback).await
        } else {
            debug!("Ignoring update {} with no known payload", update.update_id);
            Ok(())
        };
        if let Err(e) = result {
            warn!("Failed to handle update {}: {e}", update.update_id);
        }
    }

    // ── text commands ──────────────────────────────────────────────

    async fn handle_message(&mut self, message: Message) -> Result<()> {
        let chat_id = message.chat.id;
        let text = message.text.as_deref().unwrap_or("").trim().to_string();

        match text.as_str() {
            "/start" | "/menu" => {
                self.registry.chat_steps.remove(&chat_id);
                self.telegram
                    .send_message(
                        &chat_id.to_string(),
                        reporter::WELCOME_TEXT,
                        Some(&reporter::main_menu()),
                    )
                    .await
            }
            "/positions" => {
                let reply = self.positions_reply().await;
                self.telegram
                    .send_message(&chat_id.to_string(), &reply, Some(&reporter::menu_markup()))
                    .await
            }
            "/history" => {
                let reply = self.history_reply().await;
                self.telegram
                    .send_message(&chat_id.to_string(), &reply, Some(&reporter::menu_markup()))
                    .await
            }
            _ => match self.registry.chat_steps.remove(&chat_id) {
                Some(ChatStep::AwaitingEoa) => self.handle_eoa_input(chat_id, &text).await,
                Some(ChatStep::AwaitingWallet) => self.handle_wallet_input(chat_id, &text).await,
                None => {
                    self.telegram
                        .send_message(
                            &chat_id.to_string(),
                            "Use /start to open the menu.",
                            Some(&reporter::menu_markup()),
                        )
                        .await
                }
            },
        }
    }

    async fn handle_eoa_input(&mut self, chat_id: i64, eoa: &str) -> Result<()> {
        let chat = chat_id.to_string();
        let Some(api_key) = self.moralis_api_key.clone() else {
            self.telegram
                .send_message(
                    &chat,
                    "⚠️ Smart-wallet discovery is not configured (MORALIS_API_KEY is missing).",
                    Some(&reporter::menu_markup()),
                )
                .await?;
            return Ok(());
        };

        self.telegram
            .send_message(
                &chat,
                &format!("🔍 Looking up the smart wallet for EOA:\n`{eoa}`\n\nPlease wait..."),
                None,
            )
            .await?;

        match wallet::find_smart_wallet(&self.http, &api_key, eoa).await {
            Ok(Some(smart_wallet)) => {
                let found = format!(
                    "✅ Smart wallet found!\n\nEOA: `{eoa}`\nSmart Wallet: `{smart_wallet}`"
                );
                if let Some(current) = self.registry.live_wallet().map(str::to_owned) {
                    self.telegram.send_message(&chat, &found, None).await?;
                    self.ask_confirm_change(chat_id, &current, &smart_wallet)
                        .await
                } else {
                    let markup = InlineKeyboard::rows(vec![
                        vec![InlineButton::new(
                            "👁 Monitor this wallet",
                            &format!("monitor_found:{smart_wallet}"),
                        )],
                        vec![InlineButton::new("🏠 Main menu", "main_menu")],
                    ]);
                    self.telegram.send_message(&chat, &found, Some(&markup)).await
                }
            }
            Ok(None) => {
                self.telegram
                    .send_message(
                        &chat,
                        "❌ No smart wallet found for this EOA.\n\nIt may never have used the venue.",
                        Some(&reporter::menu_markup()),
                    )
                    .await
            }
            Err(e) => {
                warn!("Smart-wallet lookup failed: {e}");
                self.telegram
                    .send_message(
                        &chat,
                        "❌ Lookup failed. Please try again later.",
                        Some(&reporter::menu_markup()),
                    )
                    .await
            }
        }
    }

    async fn handle_wallet_input(&mut self, chat_id: i64, wallet: &str) -> Result<()> {
        match self.registry.live_wallet().map(str::to_owned) {
            Some(current) if current == wallet => {
                self.telegram
                    .send_message(
                        &chat_id.to_string(),
                        &format!("👁 Already monitoring this wallet:\n`{wallet}`"),
                        Some(&reporter::menu_markup()),
                    )
                    .await
            }
            Some(current) => self.ask_confirm_change(chat_id, &current, wallet).await,
            None => {
                self.start_monitoring(chat_id, wallet).await;
                Ok(())
            }
        }
    }

    async fn ask_confirm_change(
        &self,
        chat_id: i64,
        current_wallet: &str,
        new_wallet: &str,
    ) -> Result<()> {
        self.telegram
            .send_message(
                &chat_id.to_string(),
                &format!(
                    "⚠️ Currently monitoring:\n`{current_wallet}`\n\nSwitch to this wallet instead?\n`{new_wallet}`"
                ),
                Some(&reporter::confirm_change_markup(new_wallet)),
            )
            .await
    }

    // ── button interactions ────────────────────────────────────────

    async fn handle_callback(&mut self, callback: CallbackQuery) -> Result<()> {
        if let Err(e) = self.telegram.answer_callback(&callback.id).await {
            warn!("Failed to answer callback query: {e}");
        }
        let Some(origin) = callback.message else {
            debug!("Callback {} without originating message", callback.id);
            return Ok(());
        };
        let chat_id = origin.chat.id;
        let chat = chat_id.to_string();
        let message_id = origin.message_id;
        let data = callback.data.unwrap_or_default();

        match data.as_str() {
            "main_menu" => {
                self.registry.chat_steps.remove(&chat_id);
                self.telegram
                    .edit_message(
                        &chat,
                        message_id,
                        reporter::WELCOME_TEXT,
                        Some(&reporter::main_menu()),
                    )
                    .await
            }
            "view_positions" => {
                self.telegram
                    .edit_message(&chat, message_id, "⏳ Fetching positions...", None)
                    .await?;
                let reply = self.positions_reply().await;
                self.telegram
                    .edit_message(&chat, message_id, &reply, Some(&reporter::menu_markup()))
                    .await
            }
            "view_history" => {
                self.telegram
                    .edit_message(&chat, message_id, "⏳ Fetching recent trades...", None)
                    .await?;
                let reply = self.history_reply().await;
                self.telegram
                    .edit_message(&chat, message_id, &reply, Some(&reporter::menu_markup()))
                    .await
            }
            "find_wallet" => {
                self.registry.chat_steps.insert(chat_id, ChatStep::AwaitingEoa);
                self.telegram
                    .edit_message(
                        &chat,
                        message_id,
                        "🔍 *Find Smart Wallet*\n\nSend the trader's EOA address (the origin wallet):",
                        Some(&reporter::menu_markup()),
                    )
                    .await
            }
            "monitor_wallet" => {
                self.registry
                    .chat_steps
                    .insert(chat_id, ChatStep::AwaitingWallet);
                let prompt = match self.registry.live_wallet() {
                    Some(current) => format!(
                        "👁 Currently monitoring:\n`{current}`\n\nSend the new smart wallet to monitor:"
                    ),
                    None => {
                        "👁 *Monitor Wallet*\n\nSend the smart wallet address to monitor:".to_string()
                    }
                };
                self.telegram
                    .edit_message(&chat, message_id, &prompt, Some(&reporter::menu_markup()))
                    .await
            }
            "cancel_change" => {
                self.registry.chat_steps.remove(&chat_id);
                self.telegram
                    .edit_message(
                        &chat,
                        message_id,
                        "✅ Keeping the current wallet.",
                        Some(&reporter::menu_markup()),
                    )
                    .await
            }
            _ => {
                if let Some(wallet) = data.strip_prefix("monitor_found:") {
                    let wallet = wallet.to_string();
                    self.start_monitoring(chat_id, &wallet).await;
                    Ok(())
                } else if let Some(wallet) = data.strip_prefix("confirm_change:") {
                    let wallet = wallet.to_string();
                    self.registry.chat_steps.remove(&chat_id);
                    self.telegram
                        .edit_message(
                            &chat,
                            message_id,
                            &format!("✅ Switching to the new wallet:\n`{wallet}`"),
                            None,
                        )
                        .await?;
                    self.start_monitoring(chat_id, &wallet).await;
                    Ok(())
                } else {
                    // Unknown button state, steer back to the menu.
                    self.telegram
                        .edit_message(
                            &chat,
                            message_id,
                            reporter::WELCOME_TEXT,
                            Some(&reporter::main_menu()),
                        )
                        .await
                }
            }
        }
    }

    // ── shared replies ─────────────────────────────────────────────

    async fn positions_reply(&self) -> String {
        let Some(wallet) = self.watched_wallet() else {
            return "⚠️ No wallet is being monitored yet. Use Monitor Wallet first!".to_string();
        };
        match self.venue.fetch_positions(&wallet).await {
            Ok(positions) => reporter::positions_message(&wallet, &positions),
            Err(e) => {
                warn!("Failed to fetch positions: {e}");
                "❌ Could not fetch positions. Please try again later.".to_string()
            }
        }
    }

    async fn history_reply(&self) -> String {
        let Some(wallet) = self.watched_wallet() else {
            return "⚠️ No wallet is being monitored yet. Use Monitor Wallet first!".to_string();
        };
        match self.venue.fetch_trades(&wallet).await {
            Ok(trades) => reporter::history_message(&wallet, &trades, HISTORY_LIMIT),
            Err(e) => {
                warn!("Failed to fetch trade history: {e}");
                "❌ Could not fetch recent trades. Please try again later.".to_string()
            }
        }
    }

    fn watched_wallet(&self) -> Option<String> {
        SessionState::load(&self.state_path()).watched_wallet
    }

    fn state_path(&self) -> std::path::PathBuf {
        self.config.settings.state_path.clone().into()
    }

    // ── daily summary ──────────────────────────────────────────────

    /// Flush the daily rollup once per calendar day inside the configured
    /// local-time window, then reset it for the new day.
    async fn maybe_flush_daily(&mut self) {
        let Some(handle) = self.registry.monitor.as_ref().filter(|h| h.is_alive()) else {
            return;
        };
        let now = Local::now();
        let today = now.date_naive();
        if now.hour() != self.config.settings.summary_hour
            || now.minute() < self.config.settings.summary_minute
            || self.last_summary_date == Some(today)
        {
            return;
        }

        let daily_path: std::path::PathBuf = self.config.settings.daily_path.clone().into();
        let rollup = DailyRollup::load(&daily_path);
        let summary = reporter::daily_summary(&handle.wallet, &rollup);
        if let Err(e) = self
            .telegram
            .send_message(&handle.chat_id, &summary, None)
            .await
        {
            warn!("Failed to send daily summary: {e}");
            return;
        }
        if let Err(e) = DailyRollup::empty_for(today).save(&daily_path) {
            warn!("Failed to reset daily rollup: {e}");
        }
        self.last_summary_date = Some(today);
        info!("Daily summary sent for {today}");
    }
}

/// Keep the processed-id set bounded: past `cap` entries, drop the oldest
/// half so redelivery of anything recent is still caught.
fn trim_processed(ids: &mut BTreeSet<i64>, cap: usize) {
    if ids.len() <= cap {
        return;
    }
    if let Some(&mid) = ids.iter().nth(ids.len() / 2) {
        *ids = ids.split_off(&mid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trim_keeps_most_recent_half() {
        let mut ids: BTreeSet<i64> = (0..100).collect();
        trim_processed(&mut ids, 99);
        assert_eq!(ids.len(), 50);
        assert!(ids.contains(&99));
        assert!(ids.contains(&50));
        assert!(!ids.contains(&49));
    }

    #[test]
    fn trim_no_op_under_cap() {
        let mut ids: BTreeSet<i64> = (0..10).collect();
        trim_processed(&mut ids, 1024);
        assert_eq!(ids.len(), 10);
    }

    #[test]
    fn redelivered_ids_detected_until_trimmed() {
        let mut ids = BTreeSet::new();
        assert!(ids.insert(7));
        assert!(!ids.insert(7));
        trim_processed(&mut ids, 1024);
        assert!(!ids.insert(7));
    }

    /// Bot wired to an unroutable endpoint; no network calls can succeed and
    /// no real traffic leaves the test.
    fn offline_bot(dir: &std::path::Path) -> Bot {
        let mut config = AppConfig::default();
        config.settings.state_path = dir.join("state.json").to_string_lossy().into_owned();
        config.settings.daily_path = dir.join("daily_summary.json").to_string_lossy().into_owned();
        Bot {
            telegram: TelegramClient::with_base("http://127.0.0.1:9", "test-token"),
            venue: VenueClient::with_base("http://127.0.0.1:9".to_string(), "test-key".to_string()),
            http: reqwest::Client::new(),
            config,
            moralis_api_key: None,
            registry: SessionRegistry::default(),
            processed_ids: BTreeSet::new(),
            offset: 0,
            last_summary_date: None,
        }
    }

    #[tokio::test]
    async fn switching_wallets_leaves_single_live_session() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut bot = offline_bot(dir.path());

        bot.start_monitoring(1, "0xaaa").await;
        assert_eq!(bot.registry.live_wallet(), Some("0xaaa"));

        // The switch joins the first task before spawning the second, so the
        // registry can never hold two live handles.
        bot.start_monitoring(1, "0xbbb").await;
        let handle = bot.registry.monitor.take().expect("one handle");
        assert!(handle.is_alive());
        assert_eq!(handle.wallet, "0xbbb");
        assert!(bot.registry.monitor.is_none());

        // The persisted session was reset wholesale for the new wallet.
        let state = SessionState::load(&bot.state_path());
        assert_eq!(state.watched_wallet.as_deref(), Some("0xbbb"));
        assert_eq!(state.chat_id.as_deref(), Some("1"));
        assert!(state.cursor.is_none());

        assert!(handle.stop().await);
    }
}
