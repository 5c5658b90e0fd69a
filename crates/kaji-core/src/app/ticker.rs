//! Ticker - 定期 tick の駆動
//!
//! [`Scheduler::tick`] を一定間隔で呼ぶだけの薄いループです。
//! - 起動直後に 1 回 tick してから間隔待ちに入る
//! - `request_shutdown()` か Ticker の drop でループが止まる
//! - tick の失敗はログに出して続行する（次の間隔で再試行）

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::app::scheduler::Scheduler;

pub struct Ticker {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl Ticker {
    /// Spawn the tick loop.
    pub fn spawn(scheduler: Scheduler, every: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let join = tokio::spawn(async move {
            let mut ticks = interval(every);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        // 送信側が落ちたときもループを畳む
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticks.tick() => {
                        if let Err(err) = scheduler.tick().await {
                            eprintln!("[ticker] tick failed: {err}");
                        }
                    }
                }
            }
        });

        Self { shutdown_tx, join }
    }

    /// Request shutdown. 実行中の tick は中断しません。
    pub fn request_shutdown(&self) {
        // ignore send error: receiver may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for the loop to finish.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let _ = self.join.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::builder::AppBuilder;
    use crate::impls::RecordingEventSink;
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    #[tokio::test]
    async fn ticker_ticks_until_shutdown() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
        ));
        let sink = Arc::new(RecordingEventSink::new());
        let app = AppBuilder::new()
            .clock(clock)
            .event_sink(sink.clone())
            .build()
            .unwrap();

        let ticker = Ticker::spawn(app.scheduler.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        ticker.shutdown_and_join().await;

        let ticks = sink
            .take()
            .await
            .iter()
            .filter(|event| event.kind() == "tick_completed")
            .count();
        assert!(ticks >= 1);

        // 停止後は新しい tick が来ない
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(sink.events().await.is_empty());
    }
}
