//! In-memory store implementations.
//!
//! 開発・テスト・デモ用。永続化はしませんが、ポートの契約
//! （一意キー、遷移の原子性、並び順）は本番実装と同じように守ります。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;

use crate::domain::definition::TaskDefinition;
use crate::domain::ids::{DefinitionId, HouseholdId, OccurrenceId, UserId};
use crate::domain::occurrence::{TaskCompletion, TaskOccurrence};
use crate::error::KajiError;
use crate::observability::OccurrenceCounts;
use crate::ports::{
    DefinitionStore, HouseholdDirectory, HouseholdProfile, OccurrenceFilter, OccurrenceStore,
};

#[derive(Default)]
struct DefinitionState {
    definitions: HashMap<DefinitionId, TaskDefinition>,
}

/// In-memory definition store.
#[derive(Default)]
pub struct InMemoryDefinitionStore {
    state: Arc<Mutex<DefinitionState>>,
}

impl InMemoryDefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DefinitionStore for InMemoryDefinitionStore {
    async fn insert(&self, definition: TaskDefinition) -> Result<(), KajiError> {
        let mut state = self.state.lock().await;
        if state.definitions.contains_key(&definition.id) {
            return Err(KajiError::InvalidDefinition {
                reason: format!("definition {} already exists", definition.id),
            });
        }
        state.definitions.insert(definition.id, definition);
        Ok(())
    }

    async fn get(&self, id: DefinitionId) -> Result<TaskDefinition, KajiError> {
        let state = self.state.lock().await;
        state
            .definitions
            .get(&id)
            .cloned()
            .ok_or(KajiError::DefinitionNotFound(id))
    }

    async fn update(&self, definition: TaskDefinition) -> Result<(), KajiError> {
        let mut state = self.state.lock().await;
        match state.definitions.get_mut(&definition.id) {
            Some(slot) => {
                *slot = definition;
                Ok(())
            }
            None => Err(KajiError::DefinitionNotFound(definition.id)),
        }
    }

    async fn remove(&self, id: DefinitionId) -> Result<(), KajiError> {
        let mut state = self.state.lock().await;
        state
            .definitions
            .remove(&id)
            .map(|_| ())
            .ok_or(KajiError::DefinitionNotFound(id))
    }

    async fn list_by_household(
        &self,
        household: HouseholdId,
    ) -> Result<Vec<TaskDefinition>, KajiError> {
        let state = self.state.lock().await;
        let mut found: Vec<TaskDefinition> = state
            .definitions
            .values()
            .filter(|definition| definition.household == household && !definition.is_catalog)
            .cloned()
            .collect();
        found.sort_by_key(|definition| (definition.created_at, definition.id));
        Ok(found)
    }

    async fn list_all(&self) -> Result<Vec<TaskDefinition>, KajiError> {
        let state = self.state.lock().await;
        let mut all: Vec<TaskDefinition> = state.definitions.values().cloned().collect();
        all.sort_by_key(|definition| (definition.created_at, definition.id));
        Ok(all)
    }
}

#[derive(Default)]
struct OccurrenceState {
    occurrences: HashMap<OccurrenceId, TaskOccurrence>,
    /// (definition, scheduled_date) の一意インデックス
    by_key: HashMap<(DefinitionId, NaiveDate), OccurrenceId>,
    completions: HashMap<OccurrenceId, Vec<TaskCompletion>>,
}

impl OccurrenceState {
    fn get_mut(&mut self, id: OccurrenceId) -> Result<&mut TaskOccurrence, KajiError> {
        self.occurrences
            .get_mut(&id)
            .ok_or(KajiError::OccurrenceNotFound(id))
    }
}

/// In-memory occurrence store.
#[derive(Default)]
pub struct InMemoryOccurrenceStore {
    state: Arc<Mutex<OccurrenceState>>,
}

impl InMemoryOccurrenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OccurrenceStore for InMemoryOccurrenceStore {
    async fn insert(&self, occurrence: TaskOccurrence) -> Result<(), KajiError> {
        let mut state = self.state.lock().await;
        let key = (occurrence.definition, occurrence.scheduled_date);
        if state.by_key.contains_key(&key) || state.occurrences.contains_key(&occurrence.id) {
            return Err(KajiError::DuplicateOccurrence {
                definition: occurrence.definition,
                date: occurrence.scheduled_date,
            });
        }
        state.by_key.insert(key, occurrence.id);
        state.occurrences.insert(occurrence.id, occurrence);
        Ok(())
    }

    async fn get(&self, id: OccurrenceId) -> Result<TaskOccurrence, KajiError> {
        let state = self.state.lock().await;
        state
            .occurrences
            .get(&id)
            .cloned()
            .ok_or(KajiError::OccurrenceNotFound(id))
    }

    async fn find_by_definition_and_date(
        &self,
        definition: DefinitionId,
        date: NaiveDate,
    ) -> Result<Option<TaskOccurrence>, KajiError> {
        let state = self.state.lock().await;
        let found = state
            .by_key
            .get(&(definition, date))
            .and_then(|id| state.occurrences.get(id))
            .cloned();
        Ok(found)
    }

    async fn list_range(
        &self,
        household: HouseholdId,
        from: NaiveDate,
        to: NaiveDate,
        filter: &OccurrenceFilter,
    ) -> Result<Vec<TaskOccurrence>, KajiError> {
        let state = self.state.lock().await;
        let mut found: Vec<TaskOccurrence> = state
            .occurrences
            .values()
            .filter(|occurrence| {
                occurrence.household == household
                    && occurrence.scheduled_date >= from
                    && occurrence.scheduled_date <= to
                    && filter.matches(occurrence)
            })
            .cloned()
            .collect();
        found.sort_by_key(|occurrence| (occurrence.scheduled_date, occurrence.id));
        Ok(found)
    }

    async fn complete(
        &self,
        id: OccurrenceId,
        completion: TaskCompletion,
        now: DateTime<Utc>,
    ) -> Result<TaskOccurrence, KajiError> {
        let mut state = self.state.lock().await;
        let occurrence = state.get_mut(id)?;
        occurrence.mark_done(now)?;
        let updated = occurrence.clone();
        // 遷移が通ったときだけ履歴が増える（同じロックの中で両方書く）
        state.completions.entry(id).or_default().push(completion);
        Ok(updated)
    }

    async fn snooze(
        &self,
        id: OccurrenceId,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<TaskOccurrence, KajiError> {
        let mut state = self.state.lock().await;
        let occurrence = state.get_mut(id)?;
        occurrence.snooze(until, now)?;
        Ok(occurrence.clone())
    }

    async fn skip(
        &self,
        id: OccurrenceId,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<TaskOccurrence, KajiError> {
        let mut state = self.state.lock().await;
        let occurrence = state.get_mut(id)?;
        occurrence.mark_skipped(reason, now)?;
        Ok(occurrence.clone())
    }

    async fn reopen(
        &self,
        id: OccurrenceId,
        now: DateTime<Utc>,
    ) -> Result<TaskOccurrence, KajiError> {
        let mut state = self.state.lock().await;
        let occurrence = state.get_mut(id)?;
        occurrence.reopen(now)?;
        Ok(occurrence.clone())
    }

    async fn assign(
        &self,
        id: OccurrenceId,
        assignee: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<TaskOccurrence, KajiError> {
        let mut state = self.state.lock().await;
        let occurrence = state.get_mut(id)?;
        occurrence.assign(assignee, now)?;
        Ok(occurrence.clone())
    }

    async fn sweep_overdue(&self, now: DateTime<Utc>) -> Result<Vec<TaskOccurrence>, KajiError> {
        let mut state = self.state.lock().await;
        let mut changed = Vec::new();
        for occurrence in state.occurrences.values_mut() {
            if occurrence.is_due_for_overdue(now) {
                occurrence.mark_overdue(now)?;
                changed.push(occurrence.clone());
            }
        }
        changed.sort_by_key(|occurrence| (occurrence.scheduled_date, occurrence.id));
        Ok(changed)
    }

    async fn resume_snoozed(&self, now: DateTime<Utc>) -> Result<Vec<TaskOccurrence>, KajiError> {
        let mut state = self.state.lock().await;
        let mut changed = Vec::new();
        for occurrence in state.occurrences.values_mut() {
            if occurrence.should_resume(now) {
                occurrence.resume(now)?;
                changed.push(occurrence.clone());
            }
        }
        changed.sort_by_key(|occurrence| (occurrence.scheduled_date, occurrence.id));
        Ok(changed)
    }

    async fn completions_for(&self, id: OccurrenceId) -> Result<Vec<TaskCompletion>, KajiError> {
        let state = self.state.lock().await;
        if !state.occurrences.contains_key(&id) {
            return Err(KajiError::OccurrenceNotFound(id));
        }
        Ok(state.completions.get(&id).cloned().unwrap_or_default())
    }

    async fn remove_for_definition(&self, definition: DefinitionId) -> Result<usize, KajiError> {
        let mut state = self.state.lock().await;
        let ids: Vec<OccurrenceId> = state
            .occurrences
            .values()
            .filter(|occurrence| occurrence.definition == definition)
            .map(|occurrence| occurrence.id)
            .collect();
        for id in &ids {
            if let Some(occurrence) = state.occurrences.remove(id) {
                state
                    .by_key
                    .remove(&(occurrence.definition, occurrence.scheduled_date));
            }
            state.completions.remove(id);
        }
        Ok(ids.len())
    }

    async fn counts(&self, household: HouseholdId) -> Result<OccurrenceCounts, KajiError> {
        let state = self.state.lock().await;
        let mut counts = OccurrenceCounts::default();
        for occurrence in state.occurrences.values() {
            if occurrence.household == household {
                counts.bump(occurrence.status);
            }
        }
        Ok(counts)
    }
}

/// In-memory household directory.
#[derive(Default)]
pub struct InMemoryHouseholdDirectory {
    profiles: Arc<Mutex<HashMap<HouseholdId, HouseholdProfile>>>,
}

impl InMemoryHouseholdDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, profile: HouseholdProfile) {
        let mut profiles = self.profiles.lock().await;
        profiles.insert(profile.household, profile);
    }
}

#[async_trait]
impl HouseholdDirectory for InMemoryHouseholdDirectory {
    async fn profile(
        &self,
        household: HouseholdId,
    ) -> Result<Option<HouseholdProfile>, KajiError> {
        let profiles = self.profiles.lock().await;
        Ok(profiles.get(&household).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::definition::{AssignmentHint, DefinitionDraft, Priority};
    use crate::domain::ids::CompletionId;
    use crate::domain::occurrence::OccurrenceStatus;
    use chrono::TimeZone;
    use ulid::Ulid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn definition(household: HouseholdId) -> TaskDefinition {
        TaskDefinition::create(
            DefinitionId::from_ulid(Ulid::new()),
            DefinitionDraft {
                household,
                title: "Water the plants".to_string(),
                description: None,
                room: None,
                rrule: "FREQ=DAILY".to_string(),
                start_date: date(2024, 1, 1),
                estimated_minutes: Some(5),
                priority: Priority::Low,
                assignment: AssignmentHint::Auto,
                is_catalog: false,
            },
            now(),
        )
        .unwrap()
    }

    fn occurrence(
        definition: DefinitionId,
        household: HouseholdId,
        scheduled: NaiveDate,
        due_at: DateTime<Utc>,
    ) -> TaskOccurrence {
        TaskOccurrence::new(
            OccurrenceId::from_ulid(Ulid::new()),
            definition,
            household,
            scheduled,
            due_at,
            None,
            now(),
        )
    }

    fn completion(occurrence: OccurrenceId) -> TaskCompletion {
        TaskCompletion::new(
            CompletionId::from_ulid(Ulid::new()),
            occurrence,
            None,
            now(),
            crate::domain::occurrence::CompletionDraft::default(),
        )
    }

    #[tokio::test]
    async fn definitions_round_trip_and_missing_ids_fail() {
        let store = InMemoryDefinitionStore::new();
        let household = HouseholdId::from_ulid(Ulid::new());
        let def = definition(household);

        store.insert(def.clone()).await.unwrap();
        assert_eq!(store.get(def.id).await.unwrap(), def);

        let missing = DefinitionId::from_ulid(Ulid::new());
        assert!(matches!(
            store.get(missing).await.unwrap_err(),
            KajiError::DefinitionNotFound(_)
        ));
        assert!(matches!(
            store.remove(missing).await.unwrap_err(),
            KajiError::DefinitionNotFound(_)
        ));
    }

    #[tokio::test]
    async fn list_by_household_hides_catalog_templates() {
        let store = InMemoryDefinitionStore::new();
        let household = HouseholdId::from_ulid(Ulid::new());

        let plain = definition(household);
        let mut template = definition(household);
        template.is_catalog = true;

        store.insert(plain.clone()).await.unwrap();
        store.insert(template.clone()).await.unwrap();

        let listed = store.list_by_household(household).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, plain.id);

        assert_eq!(store.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_key_inserts_are_rejected() {
        let store = InMemoryOccurrenceStore::new();
        let household = HouseholdId::from_ulid(Ulid::new());
        let def = DefinitionId::from_ulid(Ulid::new());

        let first = occurrence(def, household, date(2024, 1, 10), now());
        store.insert(first.clone()).await.unwrap();

        // 別の id でも (definition, date) が同じなら弾く
        let second = occurrence(def, household, date(2024, 1, 10), now());
        let err = store.insert(second).await.unwrap_err();
        assert!(matches!(err, KajiError::DuplicateOccurrence { .. }));

        let found = store
            .find_by_definition_and_date(def, date(2024, 1, 10))
            .await
            .unwrap();
        assert_eq!(found.map(|o| o.id), Some(first.id));
    }

    #[tokio::test]
    async fn complete_writes_the_status_and_the_history_together() {
        let store = InMemoryOccurrenceStore::new();
        let household = HouseholdId::from_ulid(Ulid::new());
        let def = DefinitionId::from_ulid(Ulid::new());
        let occ = occurrence(def, household, date(2024, 1, 10), now());
        store.insert(occ.clone()).await.unwrap();

        let updated = store.complete(occ.id, completion(occ.id), now()).await.unwrap();
        assert_eq!(updated.status, OccurrenceStatus::Done);
        assert_eq!(store.completions_for(occ.id).await.unwrap().len(), 1);

        // 二重完了は遷移エラーになり、履歴も増えない
        let err = store
            .complete(occ.id, completion(occ.id), now())
            .await
            .unwrap_err();
        assert!(matches!(err, KajiError::InvalidStatusTransition { .. }));
        assert_eq!(store.completions_for(occ.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn completion_history_survives_reopen() {
        let store = InMemoryOccurrenceStore::new();
        let household = HouseholdId::from_ulid(Ulid::new());
        let def = DefinitionId::from_ulid(Ulid::new());
        let occ = occurrence(def, household, date(2024, 1, 10), now());
        store.insert(occ.clone()).await.unwrap();

        store.complete(occ.id, completion(occ.id), now()).await.unwrap();
        let reopened = store.reopen(occ.id, now()).await.unwrap();

        assert_eq!(reopened.status, OccurrenceStatus::Pending);
        assert_eq!(store.completions_for(occ.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sweep_overdue_is_idempotent() {
        let store = InMemoryOccurrenceStore::new();
        let household = HouseholdId::from_ulid(Ulid::new());
        let def = DefinitionId::from_ulid(Ulid::new());

        let stale = occurrence(def, household, date(2024, 1, 9), now() - chrono::Duration::hours(5));
        let fresh = occurrence(def, household, date(2024, 1, 11), now() + chrono::Duration::hours(5));
        store.insert(stale.clone()).await.unwrap();
        store.insert(fresh.clone()).await.unwrap();

        let swept = store.sweep_overdue(now()).await.unwrap();
        assert_eq!(swept.len(), 1);
        assert_eq!(swept[0].id, stale.id);
        assert_eq!(swept[0].status, OccurrenceStatus::Overdue);

        let swept_again = store.sweep_overdue(now()).await.unwrap();
        assert!(swept_again.is_empty());
        assert_eq!(store.get(stale.id).await.unwrap().status, OccurrenceStatus::Overdue);
        assert_eq!(store.get(fresh.id).await.unwrap().status, OccurrenceStatus::Pending);
    }

    #[tokio::test]
    async fn resume_snoozed_only_wakes_ripe_occurrences() {
        let store = InMemoryOccurrenceStore::new();
        let household = HouseholdId::from_ulid(Ulid::new());
        let def = DefinitionId::from_ulid(Ulid::new());

        let soon = occurrence(def, household, date(2024, 1, 10), now() + chrono::Duration::hours(12));
        let later = occurrence(def, household, date(2024, 1, 11), now() + chrono::Duration::hours(36));
        store.insert(soon.clone()).await.unwrap();
        store.insert(later.clone()).await.unwrap();

        store.snooze(soon.id, now() + chrono::Duration::hours(1), now()).await.unwrap();
        store.snooze(later.id, now() + chrono::Duration::hours(10), now()).await.unwrap();

        let resumed = store
            .resume_snoozed(now() + chrono::Duration::hours(2))
            .await
            .unwrap();
        assert_eq!(resumed.len(), 1);
        assert_eq!(resumed[0].id, soon.id);
        assert_eq!(resumed[0].status, OccurrenceStatus::Pending);
        assert_eq!(store.get(later.id).await.unwrap().status, OccurrenceStatus::Snoozed);
    }

    #[tokio::test]
    async fn list_range_is_scoped_filtered_and_sorted() {
        let store = InMemoryOccurrenceStore::new();
        let home = HouseholdId::from_ulid(Ulid::new());
        let other = HouseholdId::from_ulid(Ulid::new());
        let def = DefinitionId::from_ulid(Ulid::new());
        let other_def = DefinitionId::from_ulid(Ulid::new());

        let jan12 = occurrence(def, home, date(2024, 1, 12), now());
        let jan10 = occurrence(def, home, date(2024, 1, 10), now());
        let jan20 = occurrence(def, home, date(2024, 1, 20), now());
        let elsewhere = occurrence(other_def, other, date(2024, 1, 11), now());
        for occ in [&jan12, &jan10, &jan20, &elsewhere] {
            store.insert(occ.clone()).await.unwrap();
        }
        store.skip(jan12.id, None, now()).await.unwrap();

        let all = store
            .list_range(home, date(2024, 1, 10), date(2024, 1, 14), &OccurrenceFilter::default())
            .await
            .unwrap();
        assert_eq!(
            all.iter().map(|o| o.id).collect::<Vec<_>>(),
            vec![jan10.id, jan12.id]
        );

        let pending_only = store
            .list_range(
                home,
                date(2024, 1, 1),
                date(2024, 1, 31),
                &OccurrenceFilter {
                    status: Some(OccurrenceStatus::Pending),
                    ..OccurrenceFilter::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(
            pending_only.iter().map(|o| o.id).collect::<Vec<_>>(),
            vec![jan10.id, jan20.id]
        );
    }

    #[tokio::test]
    async fn remove_for_definition_cascades_and_reports_the_count() {
        let store = InMemoryOccurrenceStore::new();
        let household = HouseholdId::from_ulid(Ulid::new());
        let def = DefinitionId::from_ulid(Ulid::new());
        let keep_def = DefinitionId::from_ulid(Ulid::new());

        let doomed1 = occurrence(def, household, date(2024, 1, 10), now());
        let doomed2 = occurrence(def, household, date(2024, 1, 11), now());
        let kept = occurrence(keep_def, household, date(2024, 1, 10), now());
        for occ in [&doomed1, &doomed2, &kept] {
            store.insert(occ.clone()).await.unwrap();
        }
        store.complete(doomed1.id, completion(doomed1.id), now()).await.unwrap();

        let removed = store.remove_for_definition(def).await.unwrap();
        assert_eq!(removed, 2);
        assert!(matches!(
            store.get(doomed1.id).await.unwrap_err(),
            KajiError::OccurrenceNotFound(_)
        ));
        assert!(store.get(kept.id).await.is_ok());

        // キーも解放されるので同じ日付を入れ直せる
        store
            .insert(occurrence(def, household, date(2024, 1, 10), now()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn counts_are_scoped_to_the_household() {
        let store = InMemoryOccurrenceStore::new();
        let home = HouseholdId::from_ulid(Ulid::new());
        let other = HouseholdId::from_ulid(Ulid::new());
        let def = DefinitionId::from_ulid(Ulid::new());
        let other_def = DefinitionId::from_ulid(Ulid::new());

        let a = occurrence(def, home, date(2024, 1, 10), now());
        let b = occurrence(def, home, date(2024, 1, 11), now());
        let c = occurrence(other_def, other, date(2024, 1, 10), now());
        for occ in [&a, &b, &c] {
            store.insert(occ.clone()).await.unwrap();
        }
        store.complete(a.id, completion(a.id), now()).await.unwrap();

        let counts = store.counts(home).await.unwrap();
        assert_eq!(counts.done, 1);
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.total(), 2);
    }

    #[tokio::test]
    async fn household_directory_returns_none_for_strangers() {
        let directory = InMemoryHouseholdDirectory::new();
        let known = HouseholdId::from_ulid(Ulid::new());
        directory
            .upsert(HouseholdProfile {
                household: known,
                timezone: chrono::FixedOffset::east_opt(9 * 3600).unwrap(),
                due_time: None,
                members: vec![UserId::from_ulid(Ulid::new())],
            })
            .await;

        assert!(directory.profile(known).await.unwrap().is_some());
        let stranger = HouseholdId::from_ulid(Ulid::new());
        assert!(directory.profile(stranger).await.unwrap().is_none());
    }
}
