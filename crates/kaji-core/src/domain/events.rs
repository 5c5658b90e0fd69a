//! Scheduler events (通知系への出口).
//!
//! スケジューラは自分では通知を送らず、起きたことをイベントとして
//! [`EventSink`](crate::ports::EventSink) に流すだけです。リマインダーの
//! 配送やメール送信は受け側の責務。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{DefinitionId, OccurrenceId};

/// リマインダーの配送チャネル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderChannel {
    Push,
    Email,
}

/// スケジューラが発行するイベント
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedulerEvent {
    /// 新しいオカレンスができた。trigger_at（= due_at）にリマインドする
    ReminderScheduled {
        occurrence: OccurrenceId,
        trigger_at: DateTime<Utc>,
        channel: ReminderChannel,
    },
    /// オカレンスが期限切れになった。即時リマインドの対象
    OccurrenceOverdue {
        occurrence: OccurrenceId,
        due_at: DateTime<Utc>,
    },
    /// ある定義のオカレンス生成に失敗した（他の定義は続行している）
    GenerationFailed {
        definition: DefinitionId,
        message: String,
    },
    /// 定期 tick（生成 + sweep）が一巡した
    TickCompleted {
        generated: usize,
        marked_overdue: usize,
        resumed: usize,
        failures: usize,
    },
}

impl SchedulerEvent {
    /// ログ用の種別トークン（serde のタグと同じ値）
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ReminderScheduled { .. } => "reminder_scheduled",
            Self::OccurrenceOverdue { .. } => "occurrence_overdue",
            Self::GenerationFailed { .. } => "generation_failed",
            Self::TickCompleted { .. } => "tick_completed",
        }
    }
}
