use serde::{Deserialize, Serialize};

use crate::domain::occurrence::OccurrenceStatus;

/// 状態別のオカレンス数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccurrenceCounts {
    pub pending: usize,
    pub snoozed: usize,
    pub overdue: usize,
    pub done: usize,
    pub skipped: usize,
}

impl OccurrenceCounts {
    pub fn bump(&mut self, status: OccurrenceStatus) {
        match status {
            OccurrenceStatus::Pending => self.pending += 1,
            OccurrenceStatus::Snoozed => self.snoozed += 1,
            OccurrenceStatus::Overdue => self.overdue += 1,
            OccurrenceStatus::Done => self.done += 1,
            OccurrenceStatus::Skipped => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.pending + self.snoozed + self.overdue + self.done + self.skipped
    }
}
