//! Domain identifiers (strongly-typed IDs).
//!
//! # ULID ベースの ID + Phantom type
//! ID はすべて ULID (Universally Unique Lexicographically Sortable Identifier)
//! をベースにしています。
//! - **時刻でソート可能**: timestamp が先頭にあるため、生成順にソートできる
//! - **分散生成可能**: 調整なしで複数プロセスから生成できる
//!
//! `Id<T>` はジェネリックな共通実装で、`T` は実行時には使われない
//! （PhantomData）マーカー型です。DefinitionId と OccurrenceId は
//! 同じ表現を持ちますが、コンパイル時には別の型として扱われるので、
//! 取り違えはコンパイルエラーになります。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"def-", "occ-", ...）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// `T` は PhantomData で、メモリを消費せずコンパイル時の型安全性だけを
/// 提供します。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// ULID から Id を作成
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    /// 内部の ULID を取得
    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// TaskDefinition のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Definition {}

impl IdMarker for Definition {
    fn prefix() -> &'static str {
        "def-"
    }
}

/// TaskOccurrence のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Occurrence {}

impl IdMarker for Occurrence {
    fn prefix() -> &'static str {
        "occ-"
    }
}

/// TaskCompletion のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Completion {}

impl IdMarker for Completion {
    fn prefix() -> &'static str {
        "cmp-"
    }
}

/// Household のマーカー型（外部システムが所有、ここでは参照のみ）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Household {}

impl IdMarker for Household {
    fn prefix() -> &'static str {
        "hh-"
    }
}

/// User のマーカー型（外部システムが所有、ここでは参照のみ）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum User {}

impl IdMarker for User {
    fn prefix() -> &'static str {
        "usr-"
    }
}

/// Room のマーカー型（外部システムが所有、ここでは参照のみ）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Room {}

impl IdMarker for Room {
    fn prefix() -> &'static str {
        "room-"
    }
}

// ========================================
// Type Alias（使いやすさのため）
// ========================================

/// Identifier of a TaskDefinition (the recurring chore template).
pub type DefinitionId = Id<Definition>;

/// Identifier of a TaskOccurrence (one scheduled instance).
pub type OccurrenceId = Id<Occurrence>;

/// Identifier of a TaskCompletion (append-only completion record).
pub type CompletionId = Id<Completion>;

/// Identifier of a Household (owned by the household service).
pub type HouseholdId = Id<Household>;

/// Identifier of a User (owned by the auth service).
pub type UserId = Id<User>;

/// Identifier of a Room (owned by the household service).
pub type RoomId = Id<Room>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let ulid1 = Ulid::new();
        let ulid2 = Ulid::new();

        let definition = DefinitionId::from_ulid(ulid1);
        let occurrence = OccurrenceId::from_ulid(ulid2);

        assert_eq!(definition.as_ulid(), ulid1);
        assert_eq!(occurrence.as_ulid(), ulid2);

        // Display のプレフィックスが正しいことを確認
        assert!(definition.to_string().starts_with("def-"));
        assert!(occurrence.to_string().starts_with("occ-"));
        assert!(CompletionId::from_ulid(ulid1).to_string().starts_with("cmp-"));
        assert!(HouseholdId::from_ulid(ulid1).to_string().starts_with("hh-"));
        assert!(UserId::from_ulid(ulid1).to_string().starts_with("usr-"));
        assert!(RoomId::from_ulid(ulid1).to_string().starts_with("room-"));

        // The whole point: you can't accidentally mix these types.
        // (This is a compile-time property, so we just keep it as a comment.)
        // let _: DefinitionId = occurrence; // <- does not compile
    }

    #[test]
    fn ulid_ids_are_sortable() {
        // timestamp 部分が異なれば生成順にソートされる
        let id1 = OccurrenceId::from_ulid(Ulid::from_parts(1_000, 42));
        let id2 = OccurrenceId::from_ulid(Ulid::from_parts(2_000, 7));
        let id3 = OccurrenceId::from_ulid(Ulid::from_parts(3_000, 0));

        assert!(id1 < id2);
        assert!(id2 < id3);
        assert!(id1 < id3);
    }

    #[test]
    fn ulid_ids_can_be_serialized() {
        let id = DefinitionId::from_ulid(Ulid::new());

        let serialized = serde_json::to_string(&id).unwrap();
        let deserialized: DefinitionId = serde_json::from_str(&serialized).unwrap();

        assert_eq!(id, deserialized);
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;

        // Id<T> のサイズは Ulid と同じ（16 bytes）
        assert_eq!(size_of::<DefinitionId>(), size_of::<Ulid>());
        assert_eq!(size_of::<OccurrenceId>(), size_of::<Ulid>());
        assert_eq!(size_of::<Ulid>(), 16);
    }
}
