//! Recurrence rules (RFC 5545 RRULE subset).
//!
//! # 対応しているサブセット
//! - FREQ=DAILY / WEEKLY / MONTHLY / YEARLY（日未満の頻度は非対応）
//! - INTERVAL（1 以上、省略時は 1）
//! - BYDAY（WEEKLY のみ、MO..SU）
//! - BYMONTHDAY（MONTHLY のみ、-31..-1 と 1..31。-1 は月末）
//! - COUNT / UNTIL（相互排他。UNTIL は YYYYMMDD で当日を含む）
//!
//! パースは大文字小文字を区別しません。Display は常に正規形を返します:
//! キーは大文字、INTERVAL=1 は省略、BYDAY は月曜始まりでソート、
//! BYMONTHDAY は昇順。同じ意味のルールは必ず同じ文字列になるので、
//! 保存には正規形の文字列をそのまま使えます。
//!
//! 1 回だけのタスクは `FREQ=DAILY;COUNT=1` として表現する規約です
//! （[`RecurrenceRule::once`] / [`RecurrenceRule::is_once`]）。

use chrono::{NaiveDate, Weekday};
use std::fmt;
use std::str::FromStr;

use crate::error::KajiError;

/// 繰り返しの頻度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "DAILY" => Some(Self::Daily),
            "WEEKLY" => Some(Self::Weekly),
            "MONTHLY" => Some(Self::Monthly),
            "YEARLY" => Some(Self::Yearly),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// パース済みの繰り返しルール
///
/// フィールドは private で、[`RecurrenceRule::parse`] か [`RuleBuilder`]
/// 経由でしか作れません。存在するインスタンスは常に検証済みです。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    freq: Frequency,
    interval: u32,
    /// Monday-first, deduplicated. Empty unless freq is Weekly.
    by_day: Vec<Weekday>,
    /// Ascending, deduplicated. Empty unless freq is Monthly.
    by_month_day: Vec<i8>,
    count: Option<u32>,
    until: Option<NaiveDate>,
}

fn invalid(rule: &str, reason: impl Into<String>) -> KajiError {
    KajiError::InvalidRecurrenceSpec {
        rule: rule.to_string(),
        reason: reason.into(),
    }
}

impl RecurrenceRule {
    /// RRULE 文字列をパースする
    ///
    /// 未知のキー、重複キー、FREQ と合わない BYxxx はすべてエラー。
    /// 末尾の `;` だけは許容します（手入力でよく起きるため）。
    pub fn parse(input: &str) -> Result<Self, KajiError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid(input, "empty rule"));
        }

        let mut freq: Option<Frequency> = None;
        let mut interval: Option<u32> = None;
        let mut by_day: Option<Vec<Weekday>> = None;
        let mut by_month_day: Option<Vec<i8>> = None;
        let mut count: Option<u32> = None;
        let mut until: Option<NaiveDate> = None;

        for part in trimmed.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let Some((raw_key, raw_value)) = part.split_once('=') else {
                return Err(invalid(input, format!("expected KEY=VALUE, got \"{part}\"")));
            };
            let key = raw_key.trim().to_ascii_uppercase();
            let value = raw_value.trim().to_ascii_uppercase();
            if value.is_empty() {
                return Err(invalid(input, format!("{key} has no value")));
            }

            match key.as_str() {
                "FREQ" => {
                    if freq.is_some() {
                        return Err(invalid(input, "FREQ given more than once"));
                    }
                    let parsed = Frequency::from_token(&value).ok_or_else(|| {
                        invalid(
                            input,
                            format!(
                                "unsupported FREQ \"{value}\" (supported: DAILY, WEEKLY, MONTHLY, YEARLY)"
                            ),
                        )
                    })?;
                    freq = Some(parsed);
                }
                "INTERVAL" => {
                    if interval.is_some() {
                        return Err(invalid(input, "INTERVAL given more than once"));
                    }
                    let parsed = value.parse::<u32>().ok().filter(|n| *n >= 1).ok_or_else(
                        || invalid(input, format!("INTERVAL must be a positive integer, got \"{value}\"")),
                    )?;
                    interval = Some(parsed);
                }
                "BYDAY" => {
                    if by_day.is_some() {
                        return Err(invalid(input, "BYDAY given more than once"));
                    }
                    let mut days = Vec::new();
                    for token in value.split(',') {
                        let token = token.trim();
                        let day = weekday_from_token(token).ok_or_else(|| {
                            invalid(input, format!("invalid BYDAY weekday \"{token}\""))
                        })?;
                        days.push(day);
                    }
                    days.sort_by_key(|d| d.num_days_from_monday());
                    days.dedup();
                    by_day = Some(days);
                }
                "BYMONTHDAY" => {
                    if by_month_day.is_some() {
                        return Err(invalid(input, "BYMONTHDAY given more than once"));
                    }
                    let mut days = Vec::new();
                    for token in value.split(',') {
                        let token = token.trim();
                        let day = token
                            .parse::<i8>()
                            .ok()
                            .filter(|d| (1..=31).contains(d) || (-31..=-1).contains(d))
                            .ok_or_else(|| {
                                invalid(
                                    input,
                                    format!("BYMONTHDAY must be in -31..-1 or 1..31, got \"{token}\""),
                                )
                            })?;
                        days.push(day);
                    }
                    days.sort_unstable();
                    days.dedup();
                    by_month_day = Some(days);
                }
                "COUNT" => {
                    if count.is_some() {
                        return Err(invalid(input, "COUNT given more than once"));
                    }
                    let parsed = value.parse::<u32>().ok().filter(|n| *n >= 1).ok_or_else(
                        || invalid(input, format!("COUNT must be a positive integer, got \"{value}\"")),
                    )?;
                    count = Some(parsed);
                }
                "UNTIL" => {
                    if until.is_some() {
                        return Err(invalid(input, "UNTIL given more than once"));
                    }
                    let parsed = NaiveDate::parse_from_str(&value, "%Y%m%d").map_err(|_| {
                        invalid(input, format!("UNTIL must be a YYYYMMDD date, got \"{value}\""))
                    })?;
                    until = Some(parsed);
                }
                other => {
                    return Err(invalid(input, format!("unsupported key \"{other}\"")));
                }
            }
        }

        let freq = freq.ok_or_else(|| invalid(input, "FREQ is required"))?;

        if count.is_some() && until.is_some() {
            return Err(invalid(input, "COUNT and UNTIL are mutually exclusive"));
        }
        if by_day.is_some() && freq != Frequency::Weekly {
            return Err(invalid(input, "BYDAY is only valid with FREQ=WEEKLY"));
        }
        if by_month_day.is_some() && freq != Frequency::Monthly {
            return Err(invalid(input, "BYMONTHDAY is only valid with FREQ=MONTHLY"));
        }

        Ok(Self {
            freq,
            interval: interval.unwrap_or(1),
            by_day: by_day.unwrap_or_default(),
            by_month_day: by_month_day.unwrap_or_default(),
            count,
            until,
        })
    }

    /// 1 回だけのタスクを表すルール（`FREQ=DAILY;COUNT=1`）
    pub fn once() -> Self {
        Self {
            freq: Frequency::Daily,
            interval: 1,
            by_day: Vec::new(),
            by_month_day: Vec::new(),
            count: Some(1),
            until: None,
        }
    }

    /// このルールが 1 回だけのタスクの規約表現かどうか
    pub fn is_once(&self) -> bool {
        self.freq == Frequency::Daily && self.count == Some(1)
    }

    pub fn freq(&self) -> Frequency {
        self.freq
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    pub fn by_day(&self) -> &[Weekday] {
        &self.by_day
    }

    pub fn by_month_day(&self) -> &[i8] {
        &self.by_month_day
    }

    pub fn count(&self) -> Option<u32> {
        self.count
    }

    pub fn until(&self) -> Option<NaiveDate> {
        self.until
    }

    /// 人が読める英語の説明文を返す
    ///
    /// 例: "every 2 weeks on Monday, Thursday", "every month on the last day"
    pub fn describe(&self) -> String {
        if self.is_once() {
            return "one time only".to_string();
        }

        let mut out = match (self.freq, self.interval) {
            (Frequency::Daily, 1) => "every day".to_string(),
            (Frequency::Daily, n) => format!("every {n} days"),
            (Frequency::Weekly, 1) => "every week".to_string(),
            (Frequency::Weekly, n) => format!("every {n} weeks"),
            (Frequency::Monthly, 1) => "every month".to_string(),
            (Frequency::Monthly, n) => format!("every {n} months"),
            (Frequency::Yearly, 1) => "every year".to_string(),
            (Frequency::Yearly, n) => format!("every {n} years"),
        };

        if !self.by_day.is_empty() {
            let names: Vec<&str> = self.by_day.iter().map(|d| weekday_name(*d)).collect();
            out.push_str(&format!(" on {}", names.join(", ")));
        }
        if !self.by_month_day.is_empty() {
            let phrases: Vec<String> =
                self.by_month_day.iter().map(|d| month_day_phrase(*d)).collect();
            out.push_str(&format!(" on {}", phrases.join(", ")));
        }
        match self.count {
            Some(1) => out.push_str(", once"),
            Some(n) => out.push_str(&format!(", {n} times")),
            None => {}
        }
        if let Some(until) = self.until {
            out.push_str(&format!(", until {}", until.format("%Y-%m-%d")));
        }
        out
    }
}

impl FromStr for RecurrenceRule {
    type Err = KajiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RecurrenceRule {
    /// 正規形でレンダリングする
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FREQ={}", self.freq)?;
        if self.interval != 1 {
            write!(f, ";INTERVAL={}", self.interval)?;
        }
        if !self.by_day.is_empty() {
            let tokens: Vec<&str> = self.by_day.iter().map(|d| weekday_token(*d)).collect();
            write!(f, ";BYDAY={}", tokens.join(","))?;
        }
        if !self.by_month_day.is_empty() {
            let days: Vec<String> = self.by_month_day.iter().map(|d| d.to_string()).collect();
            write!(f, ";BYMONTHDAY={}", days.join(","))?;
        }
        if let Some(count) = self.count {
            write!(f, ";COUNT={count}")?;
        }
        if let Some(until) = self.until {
            write!(f, ";UNTIL={}", until.format("%Y%m%d"))?;
        }
        Ok(())
    }
}

/// RRULE 文字列を組み立てるビルダー
///
/// 部品からルール文字列をレンダリングしてから [`RecurrenceRule::parse`]
/// に通します。検証ロジックはパーサー一箇所だけに置く方針です。
#[derive(Debug, Clone, Default)]
pub struct RuleBuilder {
    freq: Option<Frequency>,
    interval: Option<u32>,
    by_day: Vec<Weekday>,
    by_month_day: Vec<i8>,
    count: Option<u32>,
    until: Option<NaiveDate>,
}

impl RuleBuilder {
    pub fn new(freq: Frequency) -> Self {
        Self {
            freq: Some(freq),
            ..Self::default()
        }
    }

    pub fn interval(mut self, interval: u32) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn by_day(mut self, days: impl IntoIterator<Item = Weekday>) -> Self {
        self.by_day.extend(days);
        self
    }

    pub fn by_month_day(mut self, days: impl IntoIterator<Item = i8>) -> Self {
        self.by_month_day.extend(days);
        self
    }

    pub fn count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    pub fn until(mut self, until: NaiveDate) -> Self {
        self.until = Some(until);
        self
    }

    pub fn build(self) -> Result<RecurrenceRule, KajiError> {
        let mut rendered = match self.freq {
            Some(freq) => format!("FREQ={freq}"),
            None => String::new(),
        };
        if let Some(interval) = self.interval {
            rendered.push_str(&format!(";INTERVAL={interval}"));
        }
        if !self.by_day.is_empty() {
            let tokens: Vec<&str> = self.by_day.iter().map(|d| weekday_token(*d)).collect();
            rendered.push_str(&format!(";BYDAY={}", tokens.join(",")));
        }
        if !self.by_month_day.is_empty() {
            let days: Vec<String> = self.by_month_day.iter().map(|d| d.to_string()).collect();
            rendered.push_str(&format!(";BYMONTHDAY={}", days.join(",")));
        }
        if let Some(count) = self.count {
            rendered.push_str(&format!(";COUNT={count}"));
        }
        if let Some(until) = self.until {
            rendered.push_str(&format!(";UNTIL={}", until.format("%Y%m%d")));
        }
        RecurrenceRule::parse(&rendered)
    }
}

fn weekday_from_token(token: &str) -> Option<Weekday> {
    match token {
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        "SU" => Some(Weekday::Sun),
        _ => None,
    }
}

fn weekday_token(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn month_day_phrase(day: i8) -> String {
    match day {
        -1 => "the last day".to_string(),
        d if d < 0 => format!("{} days before the end", -(d as i32) - 1),
        d => format!("day {d}"),
    }
}
