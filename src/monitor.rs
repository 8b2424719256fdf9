use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::{FetchError, VenueClient};
use crate::cursor::diff_since;
use crate::daily::DailyRollup;
use crate::reporter;
use crate::state::SessionState;
use crate::telegram::TelegramClient;

/// Bounded wait for the old polling task when replacing a session.
pub const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Consecutive failed cycles before the single "persistent failure" alert.
const FAILURE_ALERT_THRESHOLD: u32 = 10;

/// Everything a polling task needs besides its wallet binding.
#[derive(Clone)]
pub struct MonitorContext {
    pub venue: VenueClient,
    pub telegram: TelegramClient,
    pub poll_interval: Duration,
    pub heartbeat: Duration,
    pub state_path: PathBuf,
    pub daily_path: PathBuf,
}

/// Handle to the one live polling task. Dropping it does NOT stop the task;
/// call [`MonitorHandle::stop`] so replacement sessions never race the old
/// task on the persisted cursor.
pub struct MonitorHandle {
    pub wallet: String,
    pub chat_id: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn is_alive(&self) -> bool {
        !self.task.is_finished()
    }

    /// Cooperative stop: signal the token, then wait up to
    /// [`STOP_JOIN_TIMEOUT`] for the task to drain. Best-effort; a wedged
    /// task is abandoned after the wait. Returns whether the task actually
    /// finished within the bound.
    pub async fn stop(self) -> bool {
        self.cancel.cancel();
        match tokio::time::timeout(STOP_JOIN_TIMEOUT, self.task).await {
            Ok(_) => true,
            Err(_) => {
                warn!(
                    "Monitor task for {} did not stop within {STOP_JOIN_TIMEOUT:?}, abandoning it",
                    self.wallet
                );
                false
            }
        }
    }
}

/// Launch the background polling task bound to one wallet.
///
/// The task resumes the persisted cursor (an absent cursor bootstraps on the
/// first successful fetch) and polls until cancelled. Stop latency is at
/// most one poll interval.
pub fn spawn(ctx: MonitorContext, wallet: String, chat_id: String) -> MonitorHandle {
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run(ctx, wallet.clone(), chat_id.clone(), cancel.clone()));
    MonitorHandle {
        wallet,
        chat_id,
        cancel,
        task,
    }
}

async fn run(ctx: MonitorContext, wallet: String, chat_id: String, cancel: CancellationToken) {
    info!("Monitor started: {wallet}");
    if let Err(e) = ctx
        .telegram
        .send_message(&chat_id, &format!("👁 Now monitoring wallet:\n`{wallet}`"), None)
        .await
    {
        warn!("Failed to announce monitor start: {e}");
    }

    let mut cursor = SessionState::load(&ctx.state_path).cursor;
    let mut consecutive_failures: u32 = 0;
    let mut last_heartbeat: Option<Instant> = None;

    loop {
        if last_heartbeat.is_none_or(|t| t.elapsed() >= ctx.heartbeat) {
            info!("Monitor alive: {wallet}");
            last_heartbeat = Some(Instant::now());
        }

        match poll_cycle(&ctx, &wallet, &chat_id, &mut cursor).await {
            Ok(()) => consecutive_failures = 0,
            Err(e) => {
                warn!("Poll cycle failed for {wallet}: {e}");
                consecutive_failures += 1;
                if consecutive_failures == FAILURE_ALERT_THRESHOLD {
                    let alert = format!(
                        "⚠️ {FAILURE_ALERT_THRESHOLD} consecutive poll failures!\nLast error: {e}"
                    );
                    if let Err(e) = ctx.telegram.send_message(&chat_id, &alert, None).await {
                        warn!("Failed to send persistent-failure alert: {e}");
                    }
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(ctx.poll_interval) => {}
        }
    }

    info!("Monitor stopped: {wallet}");
}

/// One poll cycle: fetch, diff against the cursor, deliver the fresh trades
/// oldest-first, update the rollup, persist the cursor.
///
/// Delivery failures are logged and never hold back the cursor; a trade the
/// venue reported is considered consumed once this cycle completes.
async fn poll_cycle(
    ctx: &MonitorContext,
    wallet: &str,
    chat_id: &str,
    cursor: &mut Option<String>,
) -> Result<(), FetchError> {
    let trades = ctx.venue.fetch_trades(wallet).await?;
    let delta = diff_since(&trades, cursor.as_deref());

    if !delta.fresh.is_empty() {
        // Start from what is on disk: the ingestion loop may have flushed
        // and reset the rollup since the last batch.
        let mut daily = DailyRollup::load(&ctx.daily_path);
        for trade in &delta.fresh {
            let message = reporter::trade_message(wallet, trade);
            if let Err(e) = ctx.telegram.send_message(chat_id, &message, None).await {
                warn!("Failed to deliver trade notification: {e}");
            }
            daily.record(trade);
            if let Err(e) = daily.save(&ctx.daily_path) {
                warn!("Failed to persist daily rollup: {e}");
            }
        }
    }

    if delta.cursor != *cursor {
        *cursor = delta.cursor;
        let mut state = SessionState::load(&ctx.state_path);
        state.cursor = cursor.clone();
        if let Err(e) = state.save(&ctx.state_path) {
            warn!("Failed to persist cursor: {e}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Context pointing at an unroutable endpoint so every network call
    /// fails fast and no real traffic leaves the test.
    fn unroutable_ctx(dir: &std::path::Path) -> MonitorContext {
        MonitorContext {
            venue: VenueClient::with_base(
                "http://127.0.0.1:9".to_string(),
                "test-key".to_string(),
            ),
            telegram: TelegramClient::with_base("http://127.0.0.1:9", "test-token"),
            poll_interval: Duration::from_millis(50),
            heartbeat: Duration::from_secs(3600),
            state_path: dir.join("state.json"),
            daily_path: dir.join("daily_summary.json"),
        }
    }

    #[tokio::test]
    async fn stop_drains_task_within_join_bound() {
        let dir = tempfile::tempdir().expect("tempdir");
        let handle = spawn(
            unroutable_ctx(dir.path()),
            "0xaaa".to_string(),
            "1".to_string(),
        );
        assert!(handle.is_alive());
        assert!(
            handle.stop().await,
            "polling task should observe the stop signal and exit"
        );
    }
}
