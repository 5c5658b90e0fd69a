//! App - アプリケーション層
//!
//! ports を組み合わせてスケジューラ本体を実装します。
//!
//! # 主要コンポーネント
//! - **AppBuilder**: 依存のワイヤリングと起動時検証
//! - **Scheduler**: 生成・sweep・ユーザー操作のオーケストレーション
//! - **Ticker**: 定期 tick の駆動ループ
//! - **status**: 各操作が返すレポート型

pub mod builder;
pub mod scheduler;
pub mod status;
pub mod ticker;

// 主要な型を再エクスポート
pub use self::builder::{App, AppBuilder, BuildError};
pub use self::scheduler::{Scheduler, SchedulerConfig};
pub use self::status::{
    AssigneeStat, GenerationFailure, GenerationOutcome, GenerationReport, OccurrenceStats,
    RoomStat, SweepReport, TickReport,
};
pub use self::ticker::Ticker;
