use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use crate::notify::Notifier;
use crate::services::reminder::{ReminderService, ReminderStats};

/// リマインダースケジューラー
/// 期日を迎えたタスクとインスタンスを定期的に通知
pub struct ReminderScheduler {
    db: SqlitePool,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
}

impl ReminderScheduler {
    pub fn new(db: SqlitePool, notifier: Arc<dyn Notifier>, interval_secs: u64) -> Self {
        Self {
            db,
            notifier,
            interval: Duration::from_secs(interval_secs),
        }
    }

    /// ポーリングを無限ループで定期実行
    pub async fn start(self) {
        info!("Starting reminder scheduler (interval: {:?})", self.interval);

        loop {
            // 最初は指定時間待機
            tokio::time::sleep(self.interval).await;

            // ポーリングを実行
            match self.run_poll().await {
                Ok(stats) => {
                    info!(
                        "Reminder poll completed - Sent: {} | Already sent: {} | Failed: {}",
                        stats.sent, stats.already_sent, stats.failed
                    );
                }
                Err(e) => {
                    // エラーが発生してもループは継続
                    tracing::warn!("Reminder poll failed: {:?}", e);
                }
            }
        }
    }

    /// ポーリングを1回実行
    async fn run_poll(&self) -> Result<ReminderStats, crate::error::AppError> {
        let now = Utc::now();
        let service = ReminderService::new(self.db.clone(), self.notifier.clone());
        service.run_once(now.date_naive(), now).await
    }
}
