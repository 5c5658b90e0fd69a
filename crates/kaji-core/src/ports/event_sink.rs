use async_trait::async_trait;

use crate::domain::events::SchedulerEvent;

/// Event sink port (interface).
///
/// Fire-and-forget: the scheduler never waits on delivery and never fails
/// because a notification could not be sent. Implementations decide what a
/// `reminder_scheduled` event actually turns into (push, email, nothing).
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: SchedulerEvent);
}

/// 何もしない sink。通知系を繋がない構成のデフォルト
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

#[async_trait]
impl EventSink for NullEventSink {
    async fn emit(&self, _event: SchedulerEvent) {}
}
