//! Scheduler - 定義からオカレンスを生成し、状態を前に進める中核
//!
//! # 役割
//! - 各定義のルールを評価して、水平線（今日から N 日）までのオカレンスを
//!   作る。すでにある日付は作り直さない（再実行は冪等）
//! - 期限切れ（pending → overdue）とスヌーズ明け（snoozed → pending）の
//!   自動遷移を sweep として適用する
//! - ユーザー操作（完了・スヌーズ・スキップ・再開・担当変更）をポート越しに
//!   仲介し、世帯メンバーシップを検証する
//!
//! # 時刻の扱い
//! 「今日」は世帯のタイムゾーンで決めます。期限時刻も世帯ローカルで
//! 解釈してから UTC に直して保存します。世帯プロフィールが引けないときは
//! [`SchedulerConfig`] のデフォルトに落ちます。
//!
//! # 隔離
//! 生成バッチでは 1 定義の失敗（壊れたルール、タイムアウト）を
//! [`GenerationReport`] に記録するだけで、他の定義の生成は止めません。

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Offset as _;
use chrono::{DateTime, Datelike, Days, FixedOffset, NaiveDate, NaiveTime, Utc};
use tokio::task::JoinSet;
use tokio::time::timeout;

use crate::app::status::{
    AssigneeStat, GenerationOutcome, GenerationReport, OccurrenceStats, RoomStat, SweepReport,
    TickReport,
};
use crate::domain::definition::{
    AssignmentHint, DefinitionDraft, DefinitionUpdate, TaskDefinition,
};
use crate::domain::events::{ReminderChannel, SchedulerEvent};
use crate::domain::ids::{DefinitionId, HouseholdId, OccurrenceId, RoomId, UserId};
use crate::domain::occurrence::{
    CompletionDraft, OccurrenceStatus, TaskCompletion, TaskOccurrence,
};
use crate::domain::rule::RecurrenceRule;
use crate::engine::{self, DEFAULT_HORIZON_DAYS, MAX_HORIZON_DAYS};
use crate::error::KajiError;
use crate::observability::OccurrenceCounts;
use crate::ports::{
    Clock, DefinitionStore, EventSink, HouseholdDirectory, IdGenerator, OccurrenceFilter,
    OccurrenceStore,
};

/// スケジューラの設定
///
/// タイムゾーンと期限時刻は「世帯プロフィールが引けないとき」の
/// フォールバックです。
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// tick と定義作成時に埋める水平線（日数、1..=90）
    pub horizon_days: u32,
    /// フォールバックの期限時刻
    pub due_time: NaiveTime,
    /// フォールバックのタイムゾーン
    pub timezone: FixedOffset,
    /// 生成バッチでの 1 定義あたりのタイムアウト
    pub definition_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            horizon_days: DEFAULT_HORIZON_DAYS,
            due_time: engine::end_of_day(),
            timezone: Utc.fix(),
            definition_timeout: Duration::from_secs(2),
        }
    }
}

/// 期限計算と担当割り当てに要る分だけの世帯情報
struct HouseholdContext {
    timezone: FixedOffset,
    due_time: NaiveTime,
    members: Vec<UserId>,
}

/// オカレンス生成と状態管理のオーケストレーター
///
/// すべての依存はポート（trait）越しなので、テストでは FixedClock と
/// インメモリ実装を差し込んで時間を自由に進められます。
#[derive(Clone)]
pub struct Scheduler {
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    definitions: Arc<dyn DefinitionStore>,
    occurrences: Arc<dyn OccurrenceStore>,
    events: Arc<dyn EventSink>,
    households: Option<Arc<dyn HouseholdDirectory>>,
    config: SchedulerConfig,
}

impl Scheduler {
    /// 通常は [`AppBuilder`](crate::app::AppBuilder) 経由で作ります。
    /// 設定の検証（水平線の範囲など）は builder 側の責務です。
    pub fn new(
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        definitions: Arc<dyn DefinitionStore>,
        occurrences: Arc<dyn OccurrenceStore>,
        events: Arc<dyn EventSink>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            clock,
            ids,
            definitions,
            occurrences,
            events,
            households: None,
            config,
        }
    }

    /// 世帯ディレクトリをつなぐ。つながないと常に設定のデフォルトで動く
    pub fn with_household_directory(mut self, directory: Arc<dyn HouseholdDirectory>) -> Self {
        self.households = Some(directory);
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    // ========================================
    // 定義の管理
    // ========================================

    /// 定義を検証して保存し、最初の水平線分のオカレンスを埋める
    ///
    /// 生成に失敗しても定義の作成は成功扱いです（次の tick が拾い直す）。
    pub async fn create_definition(
        &self,
        draft: DefinitionDraft,
    ) -> Result<TaskDefinition, KajiError> {
        let definition = TaskDefinition::create(
            self.ids.generate_definition_id(),
            draft,
            self.clock.now(),
        )?;
        self.definitions.insert(definition.clone()).await?;
        if !definition.is_catalog {
            if let Err(err) = self
                .extend_definition(&definition, self.config.horizon_days)
                .await
            {
                eprintln!(
                    "[scheduler] initial generation failed for {}: {err}",
                    definition.id
                );
            }
        }
        Ok(definition)
    }

    pub async fn get_definition(&self, id: DefinitionId) -> Result<TaskDefinition, KajiError> {
        self.definitions.get(id).await
    }

    /// 世帯の定義一覧（カタログのひな形は含まない）
    pub async fn list_definitions(
        &self,
        household: HouseholdId,
    ) -> Result<Vec<TaskDefinition>, KajiError> {
        self.definitions.list_by_household(household).await
    }

    /// 部分更新を適用する
    ///
    /// 既存のオカレンスはそのまま残ります。新しいルールや開始日が効くのは
    /// 次の生成からです。
    pub async fn update_definition(
        &self,
        id: DefinitionId,
        update: DefinitionUpdate,
    ) -> Result<TaskDefinition, KajiError> {
        let mut definition = self.definitions.get(id).await?;
        definition.apply_update(update, self.clock.now())?;
        self.definitions.update(definition.clone()).await?;
        Ok(definition)
    }

    /// 定義とそのオカレンスをまとめて消す。消したオカレンス数を返す
    pub async fn delete_definition(&self, id: DefinitionId) -> Result<usize, KajiError> {
        self.definitions.remove(id).await?;
        self.occurrences.remove_for_definition(id).await
    }

    /// カタログのひな形を世帯に取り込み、すぐに生成を始める
    pub async fn adopt_from_catalog(
        &self,
        template: DefinitionId,
        household: HouseholdId,
        start_date: NaiveDate,
    ) -> Result<TaskDefinition, KajiError> {
        let template = self.definitions.get(template).await?;
        let adopted = template.adopt_as(
            self.ids.generate_definition_id(),
            household,
            start_date,
            self.clock.now(),
        )?;
        self.definitions.insert(adopted.clone()).await?;
        if let Err(err) = self
            .extend_definition(&adopted, self.config.horizon_days)
            .await
        {
            eprintln!(
                "[scheduler] initial generation failed for {}: {err}",
                adopted.id
            );
        }
        Ok(adopted)
    }

    // ========================================
    // オカレンス生成
    // ========================================

    /// 1 定義のオカレンスを水平線まで埋める
    ///
    /// 冪等: すでにある日付は `already_present` に数えるだけです。
    /// カタログのひな形は何も生成しません。
    pub async fn ensure_occurrences(
        &self,
        id: DefinitionId,
        horizon_days: u32,
    ) -> Result<GenerationOutcome, KajiError> {
        Self::validate_horizon(horizon_days)?;
        let definition = self.definitions.get(id).await?;
        self.extend_definition(&definition, horizon_days)
            .await
            .map_err(|source| KajiError::Generation {
                definition: id,
                source: Box::new(source),
            })
    }

    /// 全定義の生成バッチ
    ///
    /// 定義ごとに並行で走り、1 定義の失敗はレポートに記録するだけで
    /// 他を止めません。失敗は定義 ID 順に並べて返します。
    pub async fn run_generation(&self, horizon_days: u32) -> Result<GenerationReport, KajiError> {
        Self::validate_horizon(horizon_days)?;
        let definitions = self.definitions.list_all().await?;

        let mut tasks = JoinSet::new();
        for definition in definitions {
            if definition.is_catalog {
                continue;
            }
            let scheduler = self.clone();
            tasks.spawn(async move {
                let id = definition.id;
                let per_definition = scheduler.config.definition_timeout;
                let result = match timeout(
                    per_definition,
                    scheduler.extend_definition(&definition, horizon_days),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(KajiError::GenerationTimeout {
                        millis: per_definition.as_millis() as u64,
                    }),
                };
                (id, result)
            });
        }

        let mut report = GenerationReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(outcome))) => report.record(outcome),
                Ok((definition, Err(err))) => {
                    let message = err.to_string();
                    self.events
                        .emit(SchedulerEvent::GenerationFailed {
                            definition,
                            message: message.clone(),
                        })
                        .await;
                    report.record_failure(definition, message);
                }
                Err(join_err) => {
                    eprintln!("[scheduler] generation task aborted: {join_err}");
                }
            }
        }
        report.failures.sort_by_key(|failure| failure.definition);
        Ok(report)
    }

    /// 自動遷移を一括適用する
    ///
    /// スヌーズ明けを先に pending へ戻してから期限切れを見るので、
    /// 起きた時点で期限も過ぎていれば同じ一回で overdue になります。
    pub async fn sweep(&self) -> Result<SweepReport, KajiError> {
        let now = self.clock.now();
        let resumed = self.occurrences.resume_snoozed(now).await?;
        let overdue = self.occurrences.sweep_overdue(now).await?;
        for occurrence in &overdue {
            self.events
                .emit(SchedulerEvent::OccurrenceOverdue {
                    occurrence: occurrence.id,
                    due_at: occurrence.due_at,
                })
                .await;
        }
        Ok(SweepReport {
            marked_overdue: overdue.len(),
            resumed: resumed.len(),
        })
    }

    /// 定期実行の一巡: 生成 + sweep + サマリーイベント
    pub async fn tick(&self) -> Result<TickReport, KajiError> {
        let generation = self.run_generation(self.config.horizon_days).await?;
        let sweep = self.sweep().await?;
        self.events
            .emit(SchedulerEvent::TickCompleted {
                generated: generation.created,
                marked_overdue: sweep.marked_overdue,
                resumed: sweep.resumed,
                failures: generation.failures.len(),
            })
            .await;
        Ok(TickReport { generation, sweep })
    }

    /// ルール文字列から次の予定日を投影する（保存はしない）
    pub fn preview_rule(
        &self,
        rrule: &str,
        from: NaiveDate,
        wanted: usize,
    ) -> Result<Vec<NaiveDate>, KajiError> {
        let rule = RecurrenceRule::parse(rrule)?;
        Ok(engine::next_occurrences(&rule, from, wanted))
    }

    // ========================================
    // オカレンスの読み取り
    // ========================================

    pub async fn get_occurrence(&self, id: OccurrenceId) -> Result<TaskOccurrence, KajiError> {
        self.occurrences.get(id).await
    }

    /// 期間内のオカレンス一覧
    ///
    /// 状態の絞り込みがない一覧で、かつ期間に「今日」が入っているときは、
    /// 先に sweep を走らせて自動遷移を反映し、期間より前に溜まったままの
    /// overdue を末尾に足します（片付くまでボードから消えない）。tick を
    /// 待たずにボードが最新になるのはこの経路だけです。
    pub async fn list_occurrences(
        &self,
        household: HouseholdId,
        from: NaiveDate,
        to: NaiveDate,
        filter: &OccurrenceFilter,
    ) -> Result<Vec<TaskOccurrence>, KajiError> {
        let mut covers_today = false;
        if filter.status.is_none() {
            let context = self.household_context(household).await?;
            let today = self.clock.today_in(context.timezone);
            covers_today = from <= today && today <= to;
            if covers_today {
                if let Err(err) = self.sweep().await {
                    eprintln!("[scheduler] sweep on read failed: {err}");
                }
            }
        }
        let mut rows = self.occurrences.list_range(household, from, to, filter).await?;
        if covers_today {
            if let Some(day_before) = from.pred_opt() {
                let backlog = OccurrenceFilter {
                    status: Some(OccurrenceStatus::Overdue),
                    ..*filter
                };
                rows.extend(
                    self.occurrences
                        .list_range(household, NaiveDate::MIN, day_before, &backlog)
                        .await?,
                );
            }
        }
        Ok(rows)
    }

    /// 状態別の件数（sweep はかけない素の読み取り）
    pub async fn counts(&self, household: HouseholdId) -> Result<OccurrenceCounts, KajiError> {
        self.occurrences.counts(household).await
    }

    /// 期間内のボード統計（sweep はかけない素の読み取り）
    pub async fn stats(
        &self,
        household: HouseholdId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<OccurrenceStats, KajiError> {
        let rows = self
            .occurrences
            .list_range(household, from, to, &OccurrenceFilter::default())
            .await?;
        let definitions = self.definitions.list_by_household(household).await?;
        let rooms: HashMap<DefinitionId, Option<RoomId>> = definitions
            .iter()
            .map(|definition| (definition.id, definition.room))
            .collect();

        let mut counts = OccurrenceCounts::default();
        let mut by_room: BTreeMap<Option<RoomId>, (usize, usize)> = BTreeMap::new();
        let mut by_assignee: BTreeMap<Option<UserId>, (usize, usize)> = BTreeMap::new();
        for occurrence in &rows {
            counts.bump(occurrence.status);
            let done = occurrence.status == OccurrenceStatus::Done;

            let room = rooms.get(&occurrence.definition).copied().flatten();
            let slot = by_room.entry(room).or_default();
            slot.0 += 1;
            if done {
                slot.1 += 1;
            }

            let slot = by_assignee.entry(occurrence.assignee).or_default();
            slot.0 += 1;
            if done {
                slot.1 += 1;
            }
        }

        Ok(OccurrenceStats {
            counts,
            completion_rate: OccurrenceStats::rate_percent(counts.done, counts.total()),
            by_room: by_room
                .into_iter()
                .map(|(room, (total, done))| RoomStat { room, total, done })
                .collect(),
            by_assignee: by_assignee
                .into_iter()
                .map(|(assignee, (total, done))| AssigneeStat {
                    assignee,
                    total,
                    done,
                })
                .collect(),
        })
    }

    // ========================================
    // オカレンスの状態遷移（ユーザー操作）
    // ========================================

    /// 完了にして [`TaskCompletion`] を残す
    ///
    /// `completed_by` がいる場合は世帯メンバーであることを確認します。
    pub async fn complete_occurrence(
        &self,
        id: OccurrenceId,
        completed_by: Option<UserId>,
        draft: CompletionDraft,
    ) -> Result<TaskOccurrence, KajiError> {
        let occurrence = self.occurrences.get(id).await?;
        if let Some(user) = completed_by {
            self.check_membership(occurrence.household, user).await?;
        }
        let now = self.clock.now();
        let completion = TaskCompletion::new(
            self.ids.generate_completion_id(),
            id,
            completed_by,
            now,
            draft,
        );
        self.occurrences.complete(id, completion, now).await
    }

    /// `until` まで棚上げする。過去の時刻は弾かれる
    pub async fn snooze_occurrence(
        &self,
        id: OccurrenceId,
        until: DateTime<Utc>,
    ) -> Result<TaskOccurrence, KajiError> {
        self.occurrences.snooze(id, until, self.clock.now()).await
    }

    /// 今回はやらないことにする（終端、理由は任意）
    pub async fn skip_occurrence(
        &self,
        id: OccurrenceId,
        reason: Option<String>,
    ) -> Result<TaskOccurrence, KajiError> {
        self.occurrences.skip(id, reason, self.clock.now()).await
    }

    /// 完了を取り消して pending に戻す。完了記録は残る
    pub async fn reopen_occurrence(&self, id: OccurrenceId) -> Result<TaskOccurrence, KajiError> {
        self.occurrences.reopen(id, self.clock.now()).await
    }

    /// 担当者を付け替える（None で解除）。メンバーシップを確認する
    pub async fn assign_occurrence(
        &self,
        id: OccurrenceId,
        assignee: Option<UserId>,
    ) -> Result<TaskOccurrence, KajiError> {
        if let Some(user) = assignee {
            let occurrence = self.occurrences.get(id).await?;
            self.check_membership(occurrence.household, user).await?;
        }
        self.occurrences.assign(id, assignee, self.clock.now()).await
    }

    /// 完了履歴（古い順）。reopen しても消えない
    pub async fn completion_history(
        &self,
        id: OccurrenceId,
    ) -> Result<Vec<TaskCompletion>, KajiError> {
        self.occurrences.completions_for(id).await
    }

    // ========================================
    // 内部
    // ========================================

    fn validate_horizon(days: u32) -> Result<(), KajiError> {
        if days == 0 || days > MAX_HORIZON_DAYS {
            return Err(KajiError::InvalidHorizon { days });
        }
        Ok(())
    }

    async fn household_context(
        &self,
        household: HouseholdId,
    ) -> Result<HouseholdContext, KajiError> {
        let profile = match &self.households {
            Some(directory) => directory.profile(household).await?,
            None => None,
        };
        Ok(match profile {
            Some(profile) => HouseholdContext {
                timezone: profile.timezone,
                due_time: profile.due_time.unwrap_or_else(engine::end_of_day),
                members: profile.members,
            },
            None => HouseholdContext {
                timezone: self.config.timezone,
                due_time: self.config.due_time,
                members: Vec::new(),
            },
        })
    }

    /// メンバー一覧が引けるときだけ検証する。引けない世帯は素通し
    async fn check_membership(
        &self,
        household: HouseholdId,
        user: UserId,
    ) -> Result<(), KajiError> {
        if let Some(directory) = &self.households {
            if let Some(profile) = directory.profile(household).await? {
                if !profile.members.contains(&user) {
                    return Err(KajiError::NotHouseholdMember { user, household });
                }
            }
        }
        Ok(())
    }

    /// 1 定義の生成本体
    ///
    /// ウィンドウは「世帯ローカルの今日」から horizon_days 日分。開始日が
    /// 未来ならそこから。すでにある日付は触りません。
    async fn extend_definition(
        &self,
        definition: &TaskDefinition,
        horizon_days: u32,
    ) -> Result<GenerationOutcome, KajiError> {
        if definition.is_catalog {
            return Ok(GenerationOutcome::default());
        }
        let context = self.household_context(definition.household).await?;
        let rule = definition.rule()?;
        let now = self.clock.now();

        let today = self.clock.today_in(context.timezone);
        let window_start = today.max(definition.start_date);
        let window_end = today
            .checked_add_days(Days::new(u64::from(horizon_days.saturating_sub(1))))
            .unwrap_or(today);

        let mut outcome = GenerationOutcome::default();
        for date in engine::occurrence_dates(&rule, definition.start_date, window_start, window_end)
        {
            if self
                .occurrences
                .find_by_definition_and_date(definition.id, date)
                .await?
                .is_some()
            {
                outcome.already_present += 1;
                continue;
            }

            let due_at = engine::due_timestamp(date, context.due_time, context.timezone);
            let assignee = Self::pick_assignee(definition, date, &context.members);
            let occurrence = TaskOccurrence::new(
                self.ids.generate_occurrence_id(),
                definition.id,
                definition.household,
                date,
                due_at,
                assignee,
                now,
            );
            let occurrence_id = occurrence.id;
            match self.occurrences.insert(occurrence).await {
                Ok(()) => {
                    outcome.created += 1;
                    self.events
                        .emit(SchedulerEvent::ReminderScheduled {
                            occurrence: occurrence_id,
                            trigger_at: due_at,
                            channel: ReminderChannel::Push,
                        })
                        .await;
                }
                // 並行生成と競合したら「すでにあった」扱いにする
                Err(KajiError::DuplicateOccurrence { .. }) => outcome.already_present += 1,
                Err(err) => return Err(err),
            }
        }
        Ok(outcome)
    }

    /// 担当者を決める
    ///
    /// Auto は日付ベースのローテーション。定義 ID で開始位置をずらすので、
    /// 同じ日の別タスクが全員同じ人に寄ることはありません。同じ定義の
    /// 同じ日付は何度生成し直しても同じ人になります。
    fn pick_assignee(
        definition: &TaskDefinition,
        date: NaiveDate,
        members: &[UserId],
    ) -> Option<UserId> {
        match definition.assignment {
            AssignmentHint::Fixed(user) => Some(user),
            AssignmentHint::Auto => {
                if members.is_empty() {
                    return None;
                }
                let len = members.len() as i64;
                let salt = (definition.id.as_ulid().0 % members.len() as u128) as i64;
                let days = i64::from(date.num_days_from_ce());
                let slot = (days + salt).rem_euclid(len) as usize;
                members.get(slot).copied()
            }
        }
    }
}
