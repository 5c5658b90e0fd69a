//! Clock port - 時刻の抽象化
//!
//! overdue 判定もスヌーズ明けも「今何時か」に依存するので、時刻は
//! 必ずこの trait 経由で取ります。テストでは [`FixedClock`] を使って
//! 時間を自由に進められます。

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Clock は現在時刻を提供
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// あるタイムゾーンでの「今日」の日付
    fn today_in(&self, tz: FixedOffset) -> NaiveDate {
        self.now().with_timezone(&tz).date_naive()
    }
}

/// Arc 共有された時計もそのまま Clock として渡せるようにする
/// （スケジューラと ID 生成器で同じ時計を使うときに要る）
impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// 本番用。OS の時計をそのまま返す
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// テスト用の固定時計
///
/// `&self` から進められるように epoch ミリ秒を atomic で持ちます。
/// Arc で共有したままテストが時間を進められます。
#[derive(Debug)]
pub struct FixedClock {
    millis: AtomicI64,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(now.timestamp_millis()),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.millis.store(now.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn advance(&self, delta: chrono::Duration) {
        self.millis.fetch_add(delta.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst))
            .unwrap_or(DateTime::UNIX_EPOCH)
    }
}
