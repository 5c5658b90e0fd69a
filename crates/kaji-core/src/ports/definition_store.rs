use async_trait::async_trait;

use crate::domain::definition::TaskDefinition;
use crate::domain::ids::{DefinitionId, HouseholdId};
use crate::error::KajiError;

/// Definition store port (interface).
///
/// Owns the TaskDefinition records. The in-memory implementation lives in
/// `impls::memory`; a database-backed one plugs in behind the same trait.
#[async_trait]
pub trait DefinitionStore: Send + Sync {
    /// Insert a new definition. The id must not already exist.
    async fn insert(&self, definition: TaskDefinition) -> Result<(), KajiError>;

    /// Fetch one definition or fail with `DefinitionNotFound`.
    async fn get(&self, id: DefinitionId) -> Result<TaskDefinition, KajiError>;

    /// Replace an existing definition (matched by id).
    async fn update(&self, definition: TaskDefinition) -> Result<(), KajiError>;

    /// Delete a definition. Occurrence cleanup is the scheduler's job.
    async fn remove(&self, id: DefinitionId) -> Result<(), KajiError>;

    /// All definitions owned by one household, catalog templates excluded.
    async fn list_by_household(
        &self,
        household: HouseholdId,
    ) -> Result<Vec<TaskDefinition>, KajiError>;

    /// Every definition in the store, catalog templates included.
    /// Used by the periodic generation run.
    async fn list_all(&self) -> Result<Vec<TaskDefinition>, KajiError>;
}
