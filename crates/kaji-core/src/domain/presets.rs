//! よく使う繰り返しパターンのプリセット集
//!
//! UI からは RRULE を直接書かせず、まずここにある名前を選ばせる想定。
//! 値はすべて正規形の RRULE 文字列です。

use super::rule::RecurrenceRule;

/// プリセット名と RRULE 文字列の対応表
///
/// "biweekly" と "every_two_weeks" は同じルールの別名です。
const PRESETS: &[(&str, &str)] = &[
    ("daily", "FREQ=DAILY"),
    ("weekdays", "FREQ=WEEKLY;BYDAY=MO,TU,WE,TH,FR"),
    ("weekends", "FREQ=WEEKLY;BYDAY=SA,SU"),
    ("weekly", "FREQ=WEEKLY"),
    ("biweekly", "FREQ=WEEKLY;INTERVAL=2"),
    ("monthly", "FREQ=MONTHLY"),
    ("quarterly", "FREQ=MONTHLY;INTERVAL=3"),
    ("yearly", "FREQ=YEARLY"),
    ("weekly_monday", "FREQ=WEEKLY;BYDAY=MO"),
    ("weekly_friday", "FREQ=WEEKLY;BYDAY=FR"),
    ("twice_weekly", "FREQ=WEEKLY;BYDAY=MO,TH"),
    ("every_two_weeks", "FREQ=WEEKLY;INTERVAL=2"),
    ("first_of_month", "FREQ=MONTHLY;BYMONTHDAY=1"),
    ("last_of_month", "FREQ=MONTHLY;BYMONTHDAY=-1"),
    ("seasonal", "FREQ=MONTHLY;INTERVAL=3;BYMONTHDAY=1"),
];

/// プリセット名からルールを引く（大文字小文字は無視）
pub fn preset_rule(name: &str) -> Option<RecurrenceRule> {
    let key = name.trim().to_ascii_lowercase();
    PRESETS
        .iter()
        .find(|(preset_name, _)| *preset_name == key)
        .and_then(|(_, rule)| RecurrenceRule::parse(rule).ok())
}

/// 定義順のプリセット名一覧
pub fn preset_names() -> impl Iterator<Item = &'static str> {
    PRESETS.iter().map(|(name, _)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_preset_parses_and_is_already_canonical() {
        for (name, raw) in PRESETS {
            let rule = RecurrenceRule::parse(raw)
                .unwrap_or_else(|e| panic!("preset {name} does not parse: {e}"));
            assert_eq!(rule.to_string(), *raw, "preset {name} is not canonical");
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(
            preset_rule("Daily").map(|r| r.to_string()),
            Some("FREQ=DAILY".to_string())
        );
        assert_eq!(
            preset_rule("LAST_OF_MONTH").map(|r| r.to_string()),
            Some("FREQ=MONTHLY;BYMONTHDAY=-1".to_string())
        );
    }

    #[test]
    fn unknown_preset_returns_none() {
        assert!(preset_rule("fortnightly").is_none());
        assert!(preset_rule("").is_none());
    }

    #[test]
    fn weekdays_preset_covers_monday_to_friday() {
        use chrono::Weekday;

        let rule = preset_rule("weekdays").unwrap();
        assert_eq!(
            rule.by_day(),
            &[Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri]
        );
    }

    #[test]
    fn names_come_back_in_declaration_order() {
        let names: Vec<&str> = preset_names().collect();
        assert_eq!(names.len(), PRESETS.len());
        assert_eq!(names.first(), Some(&"daily"));
        assert_eq!(names.last(), Some(&"seasonal"));
    }
}
