//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（データベース、世帯サービス、通知基盤など）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - occurrence store が (definition, scheduled_date) の一意性の正本
//! - 状態遷移は store のメソッド内で原子的に検証・適用する
//! - 通知はイベントとして流すだけ（fire-and-forget）

pub mod clock;
pub mod definition_store;
pub mod event_sink;
pub mod household;
pub mod id_generator;
pub mod occurrence_store;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::definition_store::DefinitionStore;
pub use self::event_sink::{EventSink, NullEventSink};
pub use self::household::{HouseholdDirectory, HouseholdProfile};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::occurrence_store::{OccurrenceFilter, OccurrenceStore};
