//! Recurrence engine (純粋関数のライブラリ).
//!
//! # 役割
//! ルール + 開始日 + ウィンドウから、その範囲に入る予定日の列を作ります。
//! I/O なし、共有状態なし。同じ入力には必ず同じ出力を返すので、
//! スケジューラは何度でも安全に呼び直せます。
//!
//! # 仕様のポイント
//! - ウィンドウは両端を含む `[window_start, window_end]`。
//!   `window_start > window_end` は空列（エラーではない）
//! - COUNT は **start_date から数えた通算 N 回**。ウィンドウより前の
//!   発生分も消費します（ウィンドウを後ろにずらしても日付は動かない）
//! - UNTIL はその日自身を含む
//! - start_date より前の候補日（週の途中から始まる BYDAY など）は
//!   出力にも COUNT にも入れない
//! - MONTHLY で存在しない日（2月31日など）はその月をスキップ。
//!   翌月に繰り越さない。YEARLY の 2/29 も同様に非閏年をスキップ
//!
//! # 安全弁
//! 1 回の生成が返すのは [`MAX_OCCURRENCES`] 件まで。超える分はエラーに
//! せず切り捨てます（最密の DAILY でちょうど 1 年分）。件数で縛るので、
//! YEARLY のような疎なルールは複数年のウィンドウもそのまま追えます。

use chrono::{DateTime, Datelike, Days, FixedOffset, Months, NaiveDate, NaiveTime, Utc};

use crate::domain::rule::{Frequency, RecurrenceRule};

/// 1 回の生成で返す日付の上限（毎日 + 閏年で 1 年分）
pub const MAX_OCCURRENCES: usize = 366;

/// ensure_occurrences のデフォルト水平線（日数）
pub const DEFAULT_HORIZON_DAYS: u32 = 30;

/// ensure_occurrences が受け付ける水平線の上限（日数）
pub const MAX_HORIZON_DAYS: u32 = 90;

/// ルールに従う日付列を `[window_start, window_end]` の範囲で返す
///
/// 出力は狭義単調増加（重複なし）。不正なルールはパース時点で弾かれて
/// いるので、この関数は失敗しません。
pub fn occurrence_dates(
    rule: &RecurrenceRule,
    start_date: NaiveDate,
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> Vec<NaiveDate> {
    if window_start > window_end {
        return Vec::new();
    }
    collect_dates(rule, start_date, window_start, window_end)
}

/// `from` を新しい起点として、次の `wanted` 件の予定日を返す
///
/// 「次はいつ?」「N 回ぶん飛ばしたらいつ?」の答えに使います。COUNT 付きの
/// ルールも `from` から数え直すので、残り回数の概念はここにはありません。
pub fn next_occurrences(rule: &RecurrenceRule, from: NaiveDate, wanted: usize) -> Vec<NaiveDate> {
    if wanted == 0 {
        return Vec::new();
    }
    let wanted = wanted.min(MAX_OCCURRENCES);
    let span = scan_span_days(rule, wanted);
    let window_end = match from.checked_add_days(Days::new(span)) {
        Some(end) => end,
        None => NaiveDate::MAX,
    };
    let mut dates = collect_dates(rule, from, from, window_end);
    dates.truncate(wanted);
    dates
}

/// `from` から `skip` 回ぶん飛ばした次の予定日を返す
///
/// skip=0 は次の予定日そのもの。ルールがそこまで続かなければ None。
pub fn skip_until(rule: &RecurrenceRule, from: NaiveDate, skip: usize) -> Option<NaiveDate> {
    next_occurrences(rule, from, skip.saturating_add(1))
        .get(skip)
        .copied()
}

/// 予定日 + 時刻 + 世帯タイムゾーンから UTC の期限時刻を作る
pub fn due_timestamp(date: NaiveDate, time_of_day: NaiveTime, tz: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(time_of_day);
    let utc_naive = local - chrono::Duration::seconds(i64::from(tz.local_minus_utc()));
    DateTime::from_naive_utc_and_offset(utc_naive, Utc)
}

/// デフォルトの期限時刻（その日の終わり、23:59:59）
pub fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

/// 共通の収集ループ
///
/// 候補日イテレータを舐めながら、start_date 未満はスキップ、COUNT を
/// 消費し、ウィンドウ内だけを出力に積む。UNTIL とウィンドウ終端は
/// イテレータの上限にまとめてある。
fn collect_dates(
    rule: &RecurrenceRule,
    start_date: NaiveDate,
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> Vec<NaiveDate> {
    let limit = match rule.until() {
        Some(until) => window_end.min(until),
        None => window_end,
    };

    let mut out = Vec::new();
    let mut seen: u32 = 0;
    for date in CandidateDates::new(rule, start_date, limit) {
        if date < start_date {
            continue;
        }
        if let Some(count) = rule.count() {
            if seen >= count {
                break;
            }
        }
        seen = seen.saturating_add(1);
        if date >= window_start {
            out.push(date);
            if out.len() >= MAX_OCCURRENCES {
                break;
            }
        }
    }
    out
}

/// 次の予定を探すときに眺める日数
///
/// 周期 × (欲しい件数 + 1) に 1 年の余裕を足す。MONTHLY の存在しない日を
/// 何回か飛ばしても足りる程度に太めで、かつ有限。
fn scan_span_days(rule: &RecurrenceRule, wanted: usize) -> u64 {
    let period_days: u64 = match rule.freq() {
        Frequency::Daily => 1,
        Frequency::Weekly => 7,
        Frequency::Monthly => 31,
        Frequency::Yearly => 366,
    };
    period_days * u64::from(rule.interval()) * (wanted as u64 + 1) + 366
}

/// 頻度ごとのブロック（日 / 週 / 月 / 年）を 1 つずつ進めながら
/// 候補日を昇順に吐くイテレータ
///
/// ブロックの基準日:
/// - DAILY / BYDAY なしの WEEKLY: anchor そのもの、interval 日 / 週ずつ前進
/// - BYDAY ありの WEEKLY: anchor を含む週の月曜日
/// - MONTHLY: anchor の月の 1 日
/// - YEARLY: anchor の年の 1 月 1 日
///
/// 候補が `limit` を超えた時点で止まるので、2月30日だけを指すような
/// 「絶対に発生しないルール」でも必ず停止します。anchor より前の候補
/// （週の途中開始など）はそのまま吐き、呼び出し側が捨てます。
struct CandidateDates<'a> {
    rule: &'a RecurrenceRule,
    anchor: NaiveDate,
    block: Option<NaiveDate>,
    limit: NaiveDate,
    buf: Vec<NaiveDate>,
    next_idx: usize,
}

impl<'a> CandidateDates<'a> {
    fn new(rule: &'a RecurrenceRule, anchor: NaiveDate, limit: NaiveDate) -> Self {
        let first_block = match rule.freq() {
            Frequency::Daily => anchor,
            Frequency::Weekly => {
                if rule.by_day().is_empty() {
                    anchor
                } else {
                    week_start(anchor)
                }
            }
            Frequency::Monthly => first_of_month(anchor),
            Frequency::Yearly => first_of_year(anchor),
        };
        let mut iter = Self {
            rule,
            anchor,
            block: Some(first_block),
            limit,
            buf: Vec::new(),
            next_idx: 0,
        };
        iter.refill(first_block);
        iter
    }

    fn advance_block(&self, block: NaiveDate) -> Option<NaiveDate> {
        let interval = self.rule.interval();
        match self.rule.freq() {
            Frequency::Daily => block.checked_add_days(Days::new(u64::from(interval))),
            Frequency::Weekly => block.checked_add_days(Days::new(7 * u64::from(interval))),
            Frequency::Monthly => block.checked_add_months(Months::new(interval)),
            Frequency::Yearly => block.checked_add_months(Months::new(interval.saturating_mul(12))),
        }
    }

    fn refill(&mut self, block: NaiveDate) {
        self.buf.clear();
        self.next_idx = 0;
        match self.rule.freq() {
            Frequency::Daily => self.buf.push(block),
            Frequency::Weekly => {
                if self.rule.by_day().is_empty() {
                    self.buf.push(block);
                } else {
                    // by_day は月曜始まりでソート済みなので昇順になる
                    for day in self.rule.by_day() {
                        let offset = u64::from(day.num_days_from_monday());
                        if let Some(date) = block.checked_add_days(Days::new(offset)) {
                            self.buf.push(date);
                        }
                    }
                }
            }
            Frequency::Monthly => {
                let total = days_in_month(block.year(), block.month());
                let mut resolved: Vec<u32> = if self.rule.by_month_day().is_empty() {
                    vec![self.anchor.day()]
                } else {
                    self.rule
                        .by_month_day()
                        .iter()
                        .filter_map(|day| resolve_month_day(*day, total))
                        .collect()
                };
                // -1 と 31 が同じ日に解決されることがあるので dedup が要る
                resolved.sort_unstable();
                resolved.dedup();
                for day in resolved {
                    if let Some(date) = NaiveDate::from_ymd_opt(block.year(), block.month(), day) {
                        self.buf.push(date);
                    }
                }
            }
            Frequency::Yearly => {
                let candidate =
                    NaiveDate::from_ymd_opt(block.year(), self.anchor.month(), self.anchor.day());
                if let Some(date) = candidate {
                    self.buf.push(date);
                }
            }
        }
    }
}

impl Iterator for CandidateDates<'_> {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        loop {
            if let Some(date) = self.buf.get(self.next_idx).copied() {
                if date > self.limit {
                    return None;
                }
                self.next_idx += 1;
                return Some(date);
            }
            let current = self.block?;
            let next_block = self.advance_block(current)?;
            if next_block > self.limit {
                self.block = None;
                return None;
            }
            self.block = Some(next_block);
            self.refill(next_block);
        }
    }
}

/// 正の値はそのまま、負の値は月末から逆算。月に収まらなければ None
fn resolve_month_day(day: i8, days_in_month: u32) -> Option<u32> {
    let resolved = if day > 0 {
        i32::from(day)
    } else {
        days_in_month as i32 + i32::from(day) + 1
    };
    if resolved >= 1 && resolved <= days_in_month as i32 {
        Some(resolved as u32)
    } else {
        None
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

fn week_start(date: NaiveDate) -> NaiveDate {
    let back = u64::from(date.weekday().num_days_from_monday());
    date.checked_sub_days(Days::new(back)).unwrap_or(date)
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
}

fn first_of_year(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date)
}
