//! AppBuilder - スケジューラの構築とワイヤリング
//!
//! # Fail-fast 設計
//! 設定の検証は起動時に一度だけ行い、おかしな値（水平線 0 日、
//! タイムアウト 0 など）は [`BuildError`] で即座に返します。動き出した
//! 後のスケジューラは設定を信用して動きます。

use std::sync::Arc;

use crate::app::scheduler::{Scheduler, SchedulerConfig};
use crate::engine::MAX_HORIZON_DAYS;
use crate::impls::{InMemoryDefinitionStore, InMemoryOccurrenceStore};
use crate::ports::{
    Clock, DefinitionStore, EventSink, HouseholdDirectory, IdGenerator, NullEventSink,
    OccurrenceStore, SystemClock, UlidGenerator,
};

/// アプリケーション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("horizon_days must be 1..={MAX_HORIZON_DAYS}, got {0}")]
    InvalidHorizon(u32),
    #[error("definition_timeout must be greater than zero")]
    ZeroTimeout,
}

/// スケジューラを組み立てる builder
///
/// # 使用例
/// ```ignore
/// let app = AppBuilder::new()
///     .household_directory(directory)
///     .event_sink(sink)
///     .build()?;
/// app.scheduler.tick().await?;
/// ```
///
/// 指定しなかった依存にはデフォルト（OS 時計、ULID、インメモリストア、
/// 何もしない sink）が入ります。
pub struct AppBuilder {
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    definitions: Option<Arc<dyn DefinitionStore>>,
    occurrences: Option<Arc<dyn OccurrenceStore>>,
    events: Option<Arc<dyn EventSink>>,
    households: Option<Arc<dyn HouseholdDirectory>>,
    config: SchedulerConfig,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            clock: None,
            ids: None,
            definitions: None,
            occurrences: None,
            events: None,
            households: None,
            config: SchedulerConfig::default(),
        }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn definition_store(mut self, store: Arc<dyn DefinitionStore>) -> Self {
        self.definitions = Some(store);
        self
    }

    pub fn occurrence_store(mut self, store: Arc<dyn OccurrenceStore>) -> Self {
        self.occurrences = Some(store);
        self
    }

    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    pub fn household_directory(mut self, directory: Arc<dyn HouseholdDirectory>) -> Self {
        self.households = Some(directory);
        self
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// 設定を検証してスケジューラを組み立てる
    pub fn build(self) -> Result<App, BuildError> {
        if self.config.horizon_days == 0 || self.config.horizon_days > MAX_HORIZON_DAYS {
            return Err(BuildError::InvalidHorizon(self.config.horizon_days));
        }
        if self.config.definition_timeout.is_zero() {
            return Err(BuildError::ZeroTimeout);
        }

        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let ids: Arc<dyn IdGenerator> = match self.ids {
            Some(ids) => ids,
            None => Arc::new(UlidGenerator::new(clock.clone())),
        };
        let definitions: Arc<dyn DefinitionStore> = match self.definitions {
            Some(store) => store,
            None => Arc::new(InMemoryDefinitionStore::new()),
        };
        let occurrences: Arc<dyn OccurrenceStore> = match self.occurrences {
            Some(store) => store,
            None => Arc::new(InMemoryOccurrenceStore::new()),
        };
        let events: Arc<dyn EventSink> = match self.events {
            Some(sink) => sink,
            None => Arc::new(NullEventSink),
        };

        let mut scheduler =
            Scheduler::new(clock, ids, definitions, occurrences, events, self.config);
        if let Some(directory) = self.households {
            scheduler = scheduler.with_household_directory(directory);
        }
        Ok(App { scheduler })
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 組み立て済みのアプリケーション
pub struct App {
    pub scheduler: Scheduler,
}
