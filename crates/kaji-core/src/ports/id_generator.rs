//! IdGenerator port - ID 生成の抽象化
//!
//! スケジューラが新しいレコードを作るときの ID はここから払い出します。
//! trait にしてあるのはテスト容易性のためです。
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use ulid::Ulid;

use crate::domain::ids::{CompletionId, DefinitionId, OccurrenceId};
use crate::ports::Clock;

/// 新しい定義・発生・完了レコードに払い出す ID の供給源
///
/// ID は ULID なので払い出した時刻の順に並び、ストア側での採番や
/// 連番の調整は要りません。
pub trait IdGenerator: Send + Sync {
    fn generate_definition_id(&self) -> DefinitionId;

    fn generate_occurrence_id(&self) -> OccurrenceId;

    fn generate_completion_id(&self) -> CompletionId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock から取った時刻を timestamp 部に埋めるので、FixedClock と
/// 組み合わせると timestamp 部が決定的になります。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_definition_id(&self) -> DefinitionId {
        DefinitionId::from(self.next_ulid())
    }

    fn generate_occurrence_id(&self) -> OccurrenceId {
        OccurrenceId::from(self.next_ulid())
    }

    fn generate_completion_id(&self) -> CompletionId {
        CompletionId::from(self.next_ulid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn generated_ids_are_unique() {
        let id_gen = UlidGenerator::new(SystemClock);

        let id1 = id_gen.generate_occurrence_id();
        let id2 = id_gen.generate_occurrence_id();
        let id3 = id_gen.generate_occurrence_id();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn fixed_clock_pins_the_timestamp_part() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(FixedClock::new(fixed_time));

        let id1 = id_gen.generate_definition_id();
        let id2 = id_gen.generate_definition_id();

        // ランダム部分があるので ID 自体は異なる
        assert_ne!(id1, id2);

        // timestamp 部（上位 48 bit）は一致する
        let timestamp1 = (id1.as_ulid().0 >> 80) as u64;
        let timestamp2 = (id2.as_ulid().0 >> 80) as u64;
        assert_eq!(timestamp1, timestamp2);
        assert_eq!(timestamp1, fixed_time.timestamp_millis() as u64);
    }

    #[test]
    fn each_id_type_carries_its_own_prefix() {
        let id_gen = UlidGenerator::new(SystemClock);

        assert!(id_gen.generate_definition_id().to_string().starts_with("def-"));
        assert!(id_gen.generate_occurrence_id().to_string().starts_with("occ-"));
        assert!(id_gen.generate_completion_id().to_string().starts_with("cmp-"));
    }
}
