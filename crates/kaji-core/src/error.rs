use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::domain::ids::{DefinitionId, HouseholdId, OccurrenceId, UserId};
use crate::domain::occurrence::OccurrenceStatus;

#[derive(Debug, Error)]
pub enum KajiError {
    #[error("invalid recurrence rule \"{rule}\": {reason}")]
    InvalidRecurrenceSpec { rule: String, reason: String },

    #[error("cannot {action} an occurrence in status {from}")]
    InvalidStatusTransition {
        from: OccurrenceStatus,
        action: &'static str,
    },

    /// Insert race on the (definition, scheduled_date) key. Callers that
    /// regenerate a horizon treat this as "already present", not as a failure.
    #[error("occurrence already exists for definition={definition} date={date}")]
    DuplicateOccurrence {
        definition: DefinitionId,
        date: NaiveDate,
    },

    #[error("task definition not found: {0}")]
    DefinitionNotFound(DefinitionId),

    #[error("occurrence not found: {0}")]
    OccurrenceNotFound(OccurrenceId),

    #[error("invalid task definition: {reason}")]
    InvalidDefinition { reason: String },

    #[error("snooze time must be in the future, got {until}")]
    InvalidSnoozeTime { until: DateTime<Utc> },

    #[error("user {user} is not a member of household {household}")]
    NotHouseholdMember {
        user: UserId,
        household: HouseholdId,
    },

    #[error("definition {0} is not a catalog template")]
    NotACatalogTask(DefinitionId),

    #[error("generation horizon must be 1..=90 days, got {days}")]
    InvalidHorizon { days: u32 },

    #[error("generation timed out after {millis}ms")]
    GenerationTimeout { millis: u64 },

    /// One definition failed during a batch run. Collected into the run
    /// report; sibling definitions keep generating.
    #[error("generation failed for definition {definition}: {source}")]
    Generation {
        definition: DefinitionId,
        #[source]
        source: Box<KajiError>,
    },
}
