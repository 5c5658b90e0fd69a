//! Task occurrences (one scheduled instance of a chore) and their state machine.
//!
//! # 状態遷移
//! ```text
//! pending -> done | skipped | snoozed | overdue（自動、dueAt 超過）
//! snoozed -> pending（自動、snoozedUntil 到達）| done | skipped | snoozed（再スヌーズ）
//! overdue -> done | skipped
//! done    -> pending（reopen のみ）
//! skipped -> （終端、何もできない）
//! ```
//!
//! 自動遷移（overdue 化と snoozed の復帰）はスケジューラの sweep が
//! 担当します。このモジュールの mark_* メソッドは 1 レコード分の遷移の
//! 合法性チェックと適用だけを行います。
//!
//! 完了の詳細（誰が・何分かかったか・コメント）は [`TaskCompletion`] として
//! 追記専用で別に残します。reopen してもこの記録は消えません。

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{CompletionId, DefinitionId, HouseholdId, OccurrenceId, UserId};
use crate::error::KajiError;

/// オカレンスの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceStatus {
    Pending,
    Snoozed,
    Overdue,
    Done,
    Skipped,
}

impl OccurrenceStatus {
    /// ユーザー操作を受け付ける状態かどうか（pending / snoozed / overdue）
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Snoozed | Self::Overdue)
    }

    /// 決着済みかどうか（done / skipped）
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Done | Self::Skipped)
    }

    /// 完全な終端かどうか
    ///
    /// done は reopen できるので終端扱いしません。skipped だけが終端です。
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

impl fmt::Display for OccurrenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Self::Pending => "pending",
            Self::Snoozed => "snoozed",
            Self::Overdue => "overdue",
            Self::Done => "done",
            Self::Skipped => "skipped",
        };
        f.write_str(token)
    }
}

/// オカレンスレコード
///
/// (definition, scheduled_date) の組が一意キーで、スケジューラは同じ日の
/// オカレンスを二重に作りません。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOccurrence {
    pub id: OccurrenceId,
    pub definition: DefinitionId,
    pub household: HouseholdId,
    pub scheduled_date: NaiveDate,
    /// この時刻を過ぎても pending のままなら overdue になる
    pub due_at: DateTime<Utc>,
    pub status: OccurrenceStatus,
    pub assignee: Option<UserId>,
    pub snoozed_until: Option<DateTime<Utc>>,
    pub skip_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskOccurrence {
    pub fn new(
        id: OccurrenceId,
        definition: DefinitionId,
        household: HouseholdId,
        scheduled_date: NaiveDate,
        due_at: DateTime<Utc>,
        assignee: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            definition,
            household,
            scheduled_date,
            due_at,
            status: OccurrenceStatus::Pending,
            assignee,
            snoozed_until: None,
            skip_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 完了にする（pending / snoozed / overdue から）
    pub fn mark_done(&mut self, now: DateTime<Utc>) -> Result<(), KajiError> {
        if !self.status.is_open() {
            return Err(self.illegal("complete"));
        }
        self.status = OccurrenceStatus::Done;
        self.snoozed_until = None;
        self.updated_at = now;
        Ok(())
    }

    /// スヌーズする（pending / snoozed から。再スヌーズは until を上書き）
    pub fn snooze(&mut self, until: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), KajiError> {
        if !matches!(self.status, OccurrenceStatus::Pending | OccurrenceStatus::Snoozed) {
            return Err(self.illegal("snooze"));
        }
        if until <= now {
            return Err(KajiError::InvalidSnoozeTime { until });
        }
        self.status = OccurrenceStatus::Snoozed;
        self.snoozed_until = Some(until);
        self.updated_at = now;
        Ok(())
    }

    /// スキップする（pending / snoozed / overdue から。以後は終端）
    pub fn mark_skipped(
        &mut self,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), KajiError> {
        if !self.status.is_open() {
            return Err(self.illegal("skip"));
        }
        self.status = OccurrenceStatus::Skipped;
        self.skip_reason = reason;
        self.snoozed_until = None;
        self.updated_at = now;
        Ok(())
    }

    /// 期限切れにする（sweep 用、pending からのみ）
    pub fn mark_overdue(&mut self, now: DateTime<Utc>) -> Result<(), KajiError> {
        if self.status != OccurrenceStatus::Pending {
            return Err(self.illegal("mark overdue"));
        }
        self.status = OccurrenceStatus::Overdue;
        self.updated_at = now;
        Ok(())
    }

    /// スヌーズ明けで pending に戻す（sweep 用、snoozed からのみ）
    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<(), KajiError> {
        if self.status != OccurrenceStatus::Snoozed {
            return Err(self.illegal("resume"));
        }
        self.status = OccurrenceStatus::Pending;
        self.snoozed_until = None;
        self.updated_at = now;
        Ok(())
    }

    /// 完了を取り消して再度 pending にする（done からのみ）
    ///
    /// 過去の [`TaskCompletion`] は監査用に残ります。
    pub fn reopen(&mut self, now: DateTime<Utc>) -> Result<(), KajiError> {
        if self.status != OccurrenceStatus::Done {
            return Err(self.illegal("reopen"));
        }
        self.status = OccurrenceStatus::Pending;
        self.updated_at = now;
        Ok(())
    }

    /// 担当者を付け替える（open 状態のみ。None で担当解除）
    pub fn assign(&mut self, assignee: Option<UserId>, now: DateTime<Utc>) -> Result<(), KajiError> {
        if !self.status.is_open() {
            return Err(self.illegal("assign"));
        }
        self.assignee = assignee;
        self.updated_at = now;
        Ok(())
    }

    /// sweep が overdue 化すべきか
    pub fn is_due_for_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == OccurrenceStatus::Pending && self.due_at < now
    }

    /// sweep が pending に戻すべきか
    pub fn should_resume(&self, now: DateTime<Utc>) -> bool {
        self.status == OccurrenceStatus::Snoozed
            && self.snoozed_until.is_some_and(|until| until <= now)
    }

    fn illegal(&self, action: &'static str) -> KajiError {
        KajiError::InvalidStatusTransition {
            from: self.status,
            action,
        }
    }
}

/// 完了記録（追記専用）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCompletion {
    pub id: CompletionId,
    pub occurrence: OccurrenceId,
    pub completed_by: Option<UserId>,
    pub completed_at: DateTime<Utc>,
    pub duration_minutes: Option<u32>,
    pub comment: Option<String>,
    pub photo_url: Option<String>,
}

impl TaskCompletion {
    pub fn new(
        id: CompletionId,
        occurrence: OccurrenceId,
        completed_by: Option<UserId>,
        completed_at: DateTime<Utc>,
        draft: CompletionDraft,
    ) -> Self {
        Self {
            id,
            occurrence,
            completed_by,
            completed_at,
            duration_minutes: draft.duration_minutes,
            comment: draft.comment,
            photo_url: draft.photo_url,
        }
    }
}

/// 完了時にユーザーが添えられる情報
#[derive(Debug, Clone, Default)]
pub struct CompletionDraft {
    pub duration_minutes: Option<u32>,
    pub comment: Option<String>,
    pub photo_url: Option<String>,
}
