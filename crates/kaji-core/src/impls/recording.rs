//! Recording event sink（テスト・デモ用）。
//!
//! 発行されたイベントをそのまま貯めるだけの sink です。テストは
//! [`RecordingEventSink::take`] で内容を検証します。

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::events::SchedulerEvent;
use crate::ports::EventSink;

#[derive(Default)]
pub struct RecordingEventSink {
    events: Arc<Mutex<Vec<SchedulerEvent>>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// これまでのイベントのコピーを返す
    pub async fn events(&self) -> Vec<SchedulerEvent> {
        self.events.lock().await.clone()
    }

    /// イベントを取り出してバッファを空にする
    pub async fn take(&self) -> Vec<SchedulerEvent> {
        let mut events = self.events.lock().await;
        std::mem::take(&mut *events)
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn emit(&self, event: SchedulerEvent) {
        self.events.lock().await.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::ReminderChannel;
    use crate::domain::ids::OccurrenceId;
    use chrono::{TimeZone, Utc};
    use ulid::Ulid;

    #[tokio::test]
    async fn take_drains_the_buffer() {
        let sink = RecordingEventSink::new();
        sink.emit(SchedulerEvent::ReminderScheduled {
            occurrence: OccurrenceId::from_ulid(Ulid::new()),
            trigger_at: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
            channel: ReminderChannel::Push,
        })
        .await;

        assert_eq!(sink.events().await.len(), 1);
        assert_eq!(sink.take().await.len(), 1);
        assert!(sink.events().await.is_empty());
    }
}
