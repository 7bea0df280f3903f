//! MessageHandle port - ブローカーメッセージの settle 手段
//!
//! ブローカーの transport 実装が提供する capability です。
//! `ack` / `nack` は `self: Box<Self>` を消費するので、1 つのハンドルに対して
//! どちらか一方を高々 1 回しか呼べないことを型で保証します。

use async_trait::async_trait;

use crate::domain::{MessageId, NackOutcome, TransportError};

/// Settlement capability for one inbound broker message.
///
/// The handle is consumed by either call, so a message can be settled at most
/// once. Dropping the handle without calling either leaves the message to the
/// broker's own redelivery rules.
#[async_trait]
pub trait MessageHandle: Send {
    fn message_id(&self) -> MessageId;

    /// Tell the broker the message was processed and may be removed.
    async fn ack(self: Box<Self>) -> Result<(), TransportError>;

    /// Tell the broker the message was not processed.
    async fn nack(self: Box<Self>, outcome: NackOutcome) -> Result<(), TransportError>;
}
