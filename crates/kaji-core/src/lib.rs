//! kaji-core
//!
//! Core building blocks for the Kaji household chore scheduler.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, rule, presets, definition, occurrence, events）
//! - **engine**: 繰り返しルールの評価（日付列の展開、期限時刻の計算）
//! - **ports**: 抽象化レイヤー（Clock, IdGenerator, DefinitionStore, OccurrenceStore, ...）
//! - **app**: アプリケーションロジック（builder, scheduler, ticker, status）
//! - **impls**: ポート実装（開発・テスト用のインメモリストアなど）
//!
//! # 全体像
//! 定義（TaskDefinition）が「ゴミ出し、毎週月曜」のような繰り返しルールを
//! 持ち、スケジューラが水平線（今日から N 日）分のオカレンス
//! （TaskOccurrence）を前倒しで生成します。完了・スキップ・スヌーズと
//! いったユーザー操作、期限切れとスヌーズ明けの自動遷移は、すべて
//! オカレンス側の状態機械で管理します。

pub mod app;
pub mod domain;
pub mod engine;
pub mod error;
pub mod impls;
pub mod observability;
pub mod ports;

pub use error::KajiError;
