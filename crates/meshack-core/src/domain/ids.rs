//! Domain identifiers (strongly-typed IDs).
//!
//! # ULID ベースの ID
//! タスク ID とブローカーメッセージ ID は ULID で表現します。
//! `Id<T>` は Phantom type で種類を区別するので、`TaskId` と `MessageId` を
//! 取り違えるとコンパイルエラーになります。
//!
//! - **時刻でソート可能**: ログを並べたときに受信順がそのまま読める
//! - **分散生成可能**: ゲートウェイのインスタンス間で調整が要らない

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"task-", "msg-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// `T` は PhantomData なので実行時のサイズは `Ulid` と同じです。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

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

/// Error returned when parsing an id from its display form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid id '{0}'")]
pub struct ParseIdError(String);

impl<T: IdMarker> FromStr for Id<T> {
    type Err = ParseIdError;

    /// Accepts both the prefixed display form (`task-01H...`) and a bare ULID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(T::prefix()).unwrap_or(s);
        Ulid::from_string(raw)
            .map(Self::from_ulid)
            .map_err(|_| ParseIdError(s.to_string()))
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Task のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {}

impl IdMarker for Task {
    fn prefix() -> &'static str {
        "task-"
    }
}

/// Broker message のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Message {}

impl IdMarker for Message {
    fn prefix() -> &'static str {
        "msg-"
    }
}

/// Identifier of a task spawned for an inbound broker message.
pub type TaskId = Id<Task>;

/// Identifier of an inbound broker message (used for logging only).
pub type MessageId = Id<Message>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let task = TaskId::from_ulid(Ulid::new());
        let msg = MessageId::from_ulid(Ulid::new());

        assert!(task.to_string().starts_with("task-"));
        assert!(msg.to_string().starts_with("msg-"));
        // let _: TaskId = msg; // <- does not compile
    }

    #[test]
    fn parse_accepts_prefixed_and_bare_forms() {
        let ulid = Ulid::new();
        let id = TaskId::from_ulid(ulid);

        assert_eq!(id.to_string().parse::<TaskId>().unwrap(), id);
        assert_eq!(ulid.to_string().parse::<TaskId>().unwrap(), id);
        assert!("task-not-a-ulid".parse::<TaskId>().is_err());
    }

    #[test]
    fn ids_can_be_serialized() {
        let id = TaskId::from_ulid(Ulid::new());
        let serialized = serde_json::to_string(&id).unwrap();
        let deserialized: TaskId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;
        assert_eq!(size_of::<TaskId>(), size_of::<Ulid>());
        assert_eq!(size_of::<MessageId>(), 16);
    }
}
