use async_trait::async_trait;
use chrono::{FixedOffset, NaiveTime};

use crate::domain::ids::{HouseholdId, UserId};
use crate::error::KajiError;

/// スケジューラが世帯について知りたいことの一式
///
/// 世帯そのもの（名前、招待、権限）は別システムの持ち物で、ここには
/// 期限計算とローテーションに要る分しか出てきません。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HouseholdProfile {
    pub household: HouseholdId,
    /// 期限計算に使うタイムゾーン
    pub timezone: FixedOffset,
    /// 期限の時刻。None ならその日の終わり（23:59:59）
    pub due_time: Option<NaiveTime>,
    /// ローテーション割り当てと担当者チェックに使うメンバー一覧
    pub members: Vec<UserId>,
}

/// Household directory port (interface).
///
/// Read-only view onto the household service. `None` means the household is
/// unknown here; the scheduler then falls back to its configured defaults.
#[async_trait]
pub trait HouseholdDirectory: Send + Sync {
    async fn profile(&self, household: HouseholdId)
        -> Result<Option<HouseholdProfile>, KajiError>;
}
