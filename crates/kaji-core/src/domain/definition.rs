//! Task definitions (the recurring chore templates).
//!
//! # TaskDefinition
//! 「ゴミ出し、毎週月曜」のようなテンプレートです。実際にやる 1 回分は
//! [`TaskOccurrence`](super::occurrence::TaskOccurrence) で、スケジューラが
//! ルールに従ってここから生成します。
//!
//! ルールは正規形の RRULE 文字列として保存します（パース済みの構造体は
//! 保存しない）。[`TaskDefinition::rule`] で毎回パースし直します。

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{DefinitionId, HouseholdId, RoomId, UserId};
use super::rule::RecurrenceRule;
use crate::error::KajiError;

/// タスクの優先度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// 担当者の決め方
///
/// Auto はオカレンス生成時にローテーションで担当者を割り当てる。
/// Fixed は常に同じユーザーに割り当てる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentHint {
    #[default]
    Auto,
    Fixed(UserId),
}

/// 定義レコード
///
/// `is_catalog` が true のものはカタログのひな形で、そのままでは
/// オカレンスを生成しません（世帯が採用してコピーを作る）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub id: DefinitionId,
    pub household: HouseholdId,
    pub title: String,
    pub description: Option<String>,
    pub room: Option<RoomId>,
    /// Canonical RRULE string. Always parseable by [`RecurrenceRule::parse`].
    pub rrule: String,
    pub start_date: NaiveDate,
    /// 見積もり時間（分）。設定するなら 1 以上
    pub estimated_minutes: Option<u32>,
    pub priority: Priority,
    pub assignment: AssignmentHint,
    pub is_catalog: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 新規作成の入力
#[derive(Debug, Clone)]
pub struct DefinitionDraft {
    pub household: HouseholdId,
    pub title: String,
    pub description: Option<String>,
    pub room: Option<RoomId>,
    pub rrule: String,
    pub start_date: NaiveDate,
    pub estimated_minutes: Option<u32>,
    pub priority: Priority,
    pub assignment: AssignmentHint,
    pub is_catalog: bool,
}

/// 部分更新の入力
///
/// 外側の None は「変更しない」。description / room は Some(None) で
/// 値のクリアを表します。
#[derive(Debug, Clone, Default)]
pub struct DefinitionUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub room: Option<Option<RoomId>>,
    pub rrule: Option<String>,
    pub start_date: Option<NaiveDate>,
    /// Some(None) で見積もりのクリア
    pub estimated_minutes: Option<Option<u32>>,
    pub priority: Option<Priority>,
    pub assignment: Option<AssignmentHint>,
}

impl TaskDefinition {
    /// 入力を検証して定義を作成する
    ///
    /// RRULE は正規形に直してから保存します。
    pub fn create(
        id: DefinitionId,
        draft: DefinitionDraft,
        now: DateTime<Utc>,
    ) -> Result<Self, KajiError> {
        let title = draft.title.trim().to_string();
        if title.is_empty() {
            return Err(KajiError::InvalidDefinition {
                reason: "title must not be empty".to_string(),
            });
        }
        if draft.estimated_minutes == Some(0) {
            return Err(KajiError::InvalidDefinition {
                reason: "estimated_minutes must be at least 1".to_string(),
            });
        }
        let rule = RecurrenceRule::parse(&draft.rrule)?;

        Ok(Self {
            id,
            household: draft.household,
            title,
            description: draft.description,
            room: draft.room,
            rrule: rule.to_string(),
            start_date: draft.start_date,
            estimated_minutes: draft.estimated_minutes,
            priority: draft.priority,
            assignment: draft.assignment,
            is_catalog: draft.is_catalog,
            created_at: now,
            updated_at: now,
        })
    }

    /// 保存している RRULE をパースして返す
    pub fn rule(&self) -> Result<RecurrenceRule, KajiError> {
        RecurrenceRule::parse(&self.rrule)
    }

    /// 部分更新を適用する
    ///
    /// 先に全フィールドを検証してから書き込むので、エラー時に
    /// レコードが中途半端に変わることはありません。
    pub fn apply_update(
        &mut self,
        update: DefinitionUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), KajiError> {
        let title = match update.title {
            Some(raw) => {
                let title = raw.trim().to_string();
                if title.is_empty() {
                    return Err(KajiError::InvalidDefinition {
                        reason: "title must not be empty".to_string(),
                    });
                }
                Some(title)
            }
            None => None,
        };
        if update.estimated_minutes == Some(Some(0)) {
            return Err(KajiError::InvalidDefinition {
                reason: "estimated_minutes must be at least 1".to_string(),
            });
        }
        let rrule = match update.rrule {
            Some(raw) => Some(RecurrenceRule::parse(&raw)?.to_string()),
            None => None,
        };

        if let Some(title) = title {
            self.title = title;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(room) = update.room {
            self.room = room;
        }
        if let Some(rrule) = rrule {
            self.rrule = rrule;
        }
        if let Some(start_date) = update.start_date {
            self.start_date = start_date;
        }
        if let Some(minutes) = update.estimated_minutes {
            self.estimated_minutes = minutes;
        }
        if let Some(priority) = update.priority {
            self.priority = priority;
        }
        if let Some(assignment) = update.assignment {
            self.assignment = assignment;
        }
        self.updated_at = now;
        Ok(())
    }

    /// カタログのひな形から世帯用のコピーを作る
    ///
    /// 部屋と担当は世帯側で決め直すものなのでコピーしません。
    pub fn adopt_as(
        &self,
        id: DefinitionId,
        household: HouseholdId,
        start_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<TaskDefinition, KajiError> {
        if !self.is_catalog {
            return Err(KajiError::NotACatalogTask(self.id));
        }
        Ok(TaskDefinition {
            id,
            household,
            title: self.title.clone(),
            description: self.description.clone(),
            room: None,
            rrule: self.rrule.clone(),
            start_date,
            estimated_minutes: self.estimated_minutes,
            priority: self.priority,
            assignment: AssignmentHint::Auto,
            is_catalog: false,
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use ulid::Ulid;

    fn draft() -> DefinitionDraft {
        DefinitionDraft {
            household: HouseholdId::from_ulid(Ulid::new()),
            title: "Take out the trash".to_string(),
            description: None,
            room: None,
            rrule: "freq=weekly;byday=mo".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            estimated_minutes: Some(10),
            priority: Priority::Medium,
            assignment: AssignmentHint::Auto,
            is_catalog: false,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn create_canonicalizes_the_rule() {
        let definition = TaskDefinition::create(DefinitionId::from_ulid(Ulid::new()), draft(), now())
            .unwrap();
        assert_eq!(definition.rrule, "FREQ=WEEKLY;BYDAY=MO");
        assert_eq!(definition.rule().unwrap().to_string(), "FREQ=WEEKLY;BYDAY=MO");
        assert_eq!(definition.created_at, definition.updated_at);
    }

    #[rstest]
    #[case::empty_title("", Some(10), "FREQ=DAILY")]
    #[case::whitespace_title("   ", Some(10), "FREQ=DAILY")]
    #[case::zero_minutes("Vacuum", Some(0), "FREQ=DAILY")]
    fn create_rejects_invalid_drafts(
        #[case] title: &str,
        #[case] minutes: Option<u32>,
        #[case] rrule: &str,
    ) {
        let mut input = draft();
        input.title = title.to_string();
        input.estimated_minutes = minutes;
        input.rrule = rrule.to_string();

        let err = TaskDefinition::create(DefinitionId::from_ulid(Ulid::new()), input, now())
            .unwrap_err();
        assert!(matches!(err, KajiError::InvalidDefinition { .. }));
    }

    #[test]
    fn create_propagates_rule_errors() {
        let mut input = draft();
        input.rrule = "FREQ=HOURLY".to_string();

        let err = TaskDefinition::create(DefinitionId::from_ulid(Ulid::new()), input, now())
            .unwrap_err();
        assert!(matches!(err, KajiError::InvalidRecurrenceSpec { .. }));
    }

    #[test]
    fn apply_update_changes_fields_and_touches_updated_at() {
        let mut definition =
            TaskDefinition::create(DefinitionId::from_ulid(Ulid::new()), draft(), now()).unwrap();
        let later = now() + chrono::Duration::hours(2);

        definition
            .apply_update(
                DefinitionUpdate {
                    title: Some("  Take out the recycling  ".to_string()),
                    description: Some(Some("blue bin".to_string())),
                    rrule: Some("freq=weekly;byday=th".to_string()),
                    estimated_minutes: Some(Some(5)),
                    ..DefinitionUpdate::default()
                },
                later,
            )
            .unwrap();

        assert_eq!(definition.title, "Take out the recycling");
        assert_eq!(definition.description.as_deref(), Some("blue bin"));
        assert_eq!(definition.rrule, "FREQ=WEEKLY;BYDAY=TH");
        assert_eq!(definition.estimated_minutes, Some(5));
        assert_eq!(definition.updated_at, later);
    }

    #[test]
    fn failed_update_leaves_the_record_untouched() {
        let mut definition =
            TaskDefinition::create(DefinitionId::from_ulid(Ulid::new()), draft(), now()).unwrap();
        let before = definition.clone();

        let err = definition
            .apply_update(
                DefinitionUpdate {
                    title: Some("New title".to_string()),
                    rrule: Some("FREQ=NOPE".to_string()),
                    ..DefinitionUpdate::default()
                },
                now() + chrono::Duration::hours(1),
            )
            .unwrap_err();

        assert!(matches!(err, KajiError::InvalidRecurrenceSpec { .. }));
        assert_eq!(definition, before);
    }

    #[test]
    fn update_can_clear_optional_fields() {
        let mut input = draft();
        input.description = Some("old".to_string());
        input.room = Some(RoomId::from_ulid(Ulid::new()));
        let mut definition =
            TaskDefinition::create(DefinitionId::from_ulid(Ulid::new()), input, now()).unwrap();

        definition
            .apply_update(
                DefinitionUpdate {
                    description: Some(None),
                    room: Some(None),
                    estimated_minutes: Some(None),
                    ..DefinitionUpdate::default()
                },
                now(),
            )
            .unwrap();

        assert_eq!(definition.description, None);
        assert_eq!(definition.room, None);
        assert_eq!(definition.estimated_minutes, None);
    }

    #[test]
    fn adopt_copies_the_template_into_the_household() {
        let mut input = draft();
        input.is_catalog = true;
        input.room = Some(RoomId::from_ulid(Ulid::new()));
        input.assignment = AssignmentHint::Fixed(UserId::from_ulid(Ulid::new()));
        let template =
            TaskDefinition::create(DefinitionId::from_ulid(Ulid::new()), input, now()).unwrap();

        let household = HouseholdId::from_ulid(Ulid::new());
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let adopted = template
            .adopt_as(DefinitionId::from_ulid(Ulid::new()), household, start, now())
            .unwrap();

        assert_eq!(adopted.household, household);
        assert_eq!(adopted.title, template.title);
        assert_eq!(adopted.rrule, template.rrule);
        assert_eq!(adopted.start_date, start);
        assert!(!adopted.is_catalog);
        assert_eq!(adopted.room, None);
        assert_eq!(adopted.assignment, AssignmentHint::Auto);
    }

    #[test]
    fn adopt_rejects_non_catalog_definitions() {
        let definition =
            TaskDefinition::create(DefinitionId::from_ulid(Ulid::new()), draft(), now()).unwrap();

        let err = definition
            .adopt_as(
                DefinitionId::from_ulid(Ulid::new()),
                HouseholdId::from_ulid(Ulid::new()),
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                now(),
            )
            .unwrap_err();
        assert!(matches!(err, KajiError::NotACatalogTask(_)));
    }

    #[test]
    fn priority_serializes_as_snake_case() {
        assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "\"high\"");
        assert_eq!(serde_json::to_string(&AssignmentHint::Auto).unwrap(), "\"auto\"");
    }
}
