//! Scheduler reports - 生成・sweep・統計の結果型
//!
//! スケジューラの各操作は「何が起きたか」をこれらの型で返します。
//! CLI やダッシュボードがそのまま JSON にして出せるよう、全部
//! Serialize にしてあります。

use serde::Serialize;

use crate::domain::ids::{DefinitionId, RoomId, UserId};
use crate::observability::OccurrenceCounts;

/// 1 定義分の生成結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GenerationOutcome {
    /// 新しく作られたオカレンス数
    pub created: usize,
    /// すでに存在していてスキップした数
    pub already_present: usize,
}

impl GenerationOutcome {
    /// ウィンドウ内で見つかった予定日の総数
    pub fn total(&self) -> usize {
        self.created + self.already_present
    }
}

/// 生成に失敗した定義の記録
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationFailure {
    pub definition: DefinitionId,
    pub message: String,
}

/// 生成バッチ全体のレポート
///
/// 1 定義の失敗はここに記録されるだけで、他の定義の生成は続きます。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationReport {
    /// 処理した定義数（成功 + 失敗）
    pub definitions_processed: usize,
    pub created: usize,
    pub already_present: usize,
    pub failures: Vec<GenerationFailure>,
}

impl GenerationReport {
    pub fn record(&mut self, outcome: GenerationOutcome) {
        self.definitions_processed += 1;
        self.created += outcome.created;
        self.already_present += outcome.already_present;
    }

    pub fn record_failure(&mut self, definition: DefinitionId, message: String) {
        self.definitions_processed += 1;
        self.failures.push(GenerationFailure {
            definition,
            message,
        });
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// sweep（自動遷移）のレポート
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// pending から overdue に変わった数
    pub marked_overdue: usize,
    /// スヌーズ明けで pending に戻った数
    pub resumed: usize,
}

/// tick（生成 + sweep）一巡のレポート
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickReport {
    pub generation: GenerationReport,
    pub sweep: SweepReport,
}

/// 部屋ごとの集計
///
/// `room` が None の行は部屋未設定のタスクの合算です。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoomStat {
    pub room: Option<RoomId>,
    pub total: usize,
    pub done: usize,
}

/// 担当者ごとの集計
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AssigneeStat {
    pub assignee: Option<UserId>,
    pub total: usize,
    pub done: usize,
}

/// 期間内のボード統計
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OccurrenceStats {
    pub counts: OccurrenceCounts,
    /// done / 全体（%）。小数 1 桁に丸め。母数 0 のときは 0.0
    pub completion_rate: f64,
    pub by_room: Vec<RoomStat>,
    pub by_assignee: Vec<AssigneeStat>,
}

impl OccurrenceStats {
    /// done の割合を % で返す（小数 1 桁）
    pub fn rate_percent(done: usize, total: usize) -> f64 {
        if total == 0 {
            return 0.0;
        }
        (done as f64 * 1000.0 / total as f64).round() / 10.0
    }
}
