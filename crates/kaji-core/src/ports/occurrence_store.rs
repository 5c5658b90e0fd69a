use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::ids::{DefinitionId, OccurrenceId, UserId};
use crate::domain::occurrence::{OccurrenceStatus, TaskCompletion, TaskOccurrence};
use crate::error::KajiError;
use crate::observability::OccurrenceCounts;

/// 一覧の絞り込み条件
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OccurrenceFilter {
    pub status: Option<OccurrenceStatus>,
    pub assignee: Option<UserId>,
    pub definition: Option<DefinitionId>,
}

impl OccurrenceFilter {
    pub fn matches(&self, occurrence: &TaskOccurrence) -> bool {
        if self.status.is_some_and(|status| occurrence.status != status) {
            return false;
        }
        if self.assignee.is_some_and(|user| occurrence.assignee != Some(user)) {
            return false;
        }
        if self
            .definition
            .is_some_and(|definition| occurrence.definition != definition)
        {
            return false;
        }
        true
    }
}

/// Occurrence store port (interface).
///
/// Design intent:
/// - The store enforces the (definition, scheduled_date) uniqueness key:
///   `insert` fails with `DuplicateOccurrence` so concurrent generation runs
///   cannot both win the race.
/// - Status changes go through semantic methods (`complete`, `snooze`, ...)
///   instead of a raw status setter. Each one applies the domain transition
///   check and its side record under the store's own lock, so a user action
///   and the sweep cannot interleave half-applied writes.
#[async_trait]
pub trait OccurrenceStore: Send + Sync {
    /// Insert a new occurrence, failing on a duplicate (definition, date) key.
    async fn insert(&self, occurrence: TaskOccurrence) -> Result<(), KajiError>;

    /// Fetch one occurrence or fail with `OccurrenceNotFound`.
    async fn get(&self, id: OccurrenceId) -> Result<TaskOccurrence, KajiError>;

    /// Lookup by the uniqueness key.
    async fn find_by_definition_and_date(
        &self,
        definition: DefinitionId,
        date: NaiveDate,
    ) -> Result<Option<TaskOccurrence>, KajiError>;

    /// Occurrences of one household with `scheduled_date` in `[from, to]`,
    /// filtered, ordered by (scheduled_date, id).
    async fn list_range(
        &self,
        household: crate::domain::ids::HouseholdId,
        from: NaiveDate,
        to: NaiveDate,
        filter: &OccurrenceFilter,
    ) -> Result<Vec<TaskOccurrence>, KajiError>;

    /// Transition to done and append the completion record atomically.
    async fn complete(
        &self,
        id: OccurrenceId,
        completion: TaskCompletion,
        now: DateTime<Utc>,
    ) -> Result<TaskOccurrence, KajiError>;

    async fn snooze(
        &self,
        id: OccurrenceId,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<TaskOccurrence, KajiError>;

    async fn skip(
        &self,
        id: OccurrenceId,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<TaskOccurrence, KajiError>;

    async fn reopen(&self, id: OccurrenceId, now: DateTime<Utc>)
        -> Result<TaskOccurrence, KajiError>;

    async fn assign(
        &self,
        id: OccurrenceId,
        assignee: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<TaskOccurrence, KajiError>;

    /// Promote every pending occurrence whose due time has passed.
    /// Returns the occurrences that changed, ordered by (scheduled_date, id).
    /// Idempotent: a second run with the same `now` changes nothing.
    async fn sweep_overdue(&self, now: DateTime<Utc>) -> Result<Vec<TaskOccurrence>, KajiError>;

    /// Return every snoozed occurrence whose wakeup time has passed to
    /// pending. Same ordering and idempotency as `sweep_overdue`.
    async fn resume_snoozed(&self, now: DateTime<Utc>) -> Result<Vec<TaskOccurrence>, KajiError>;

    /// Completion history of one occurrence, oldest first. Survives reopen.
    async fn completions_for(&self, id: OccurrenceId) -> Result<Vec<TaskCompletion>, KajiError>;

    /// Cascade helper for definition deletion. Returns how many were removed.
    async fn remove_for_definition(&self, definition: DefinitionId) -> Result<usize, KajiError>;

    /// Observability hook: counts by status for one household.
    async fn counts(
        &self,
        household: crate::domain::ids::HouseholdId,
    ) -> Result<OccurrenceCounts, KajiError>;
}
