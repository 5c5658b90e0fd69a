//! Domain model (IDs, rules, definitions, occurrences, events).

pub mod definition;
pub mod events;
pub mod ids;
pub mod occurrence;
pub mod presets;
pub mod rule;

pub use self::definition::{
    AssignmentHint, DefinitionDraft, DefinitionUpdate, Priority, TaskDefinition,
};
pub use self::events::{ReminderChannel, SchedulerEvent};
pub use self::ids::{
    CompletionId, DefinitionId, HouseholdId, OccurrenceId, RoomId, UserId,
};
pub use self::occurrence::{
    CompletionDraft, OccurrenceStatus, TaskCompletion, TaskOccurrence,
};
pub use self::presets::{preset_names, preset_rule};
pub use self::rule::{Frequency, RecurrenceRule, RuleBuilder};
