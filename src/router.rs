//! Router interface (spec §4.K).
//!
//! The core never talks to a transport directly; it depends on this trait,
//! generic the same way the teacher's `Alpenglow<A, D, R>` is generic over
//! `All2All`/`Disseminator`/`Network` rather than boxing them.

use tokio::sync::mpsc;

use crate::block::BlockNumber;
use crate::crypto::Hash;

/// Message kinds a [`Router`] subscription can be filtered to (spec §4.K).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageFilter {
    NewBlock,
    PublishTx,
    SyncHeight,
    SyncBlock,
}

/// A message as it crosses the router boundary. Payloads are left encoded
/// (`Vec<u8>`) since decoding is the consumer's responsibility (spec §4.I
/// step 1: "Decode; reject malformed with `BadEncoding`").
#[derive(Clone, Debug)]
pub enum RouterMessage {
    NewBlock(Vec<u8>),
    PublishTx(Vec<u8>),
    SyncHeight,
    SyncBlock { hash: Option<Hash>, number: Option<BlockNumber> },
}

impl RouterMessage {
    #[must_use]
    pub const fn filter(&self) -> MessageFilter {
        match self {
            Self::NewBlock(_) => MessageFilter::NewBlock,
            Self::PublishTx(_) => MessageFilter::PublishTx,
            Self::SyncHeight => MessageFilter::SyncHeight,
            Self::SyncBlock { .. } => MessageFilter::SyncBlock,
        }
    }
}

/// Abstract transport surface the core depends on. No delivery guarantees
/// beyond "eventually, if a peer is reachable"; implementations are free to
/// drop messages under backpressure (spec §5: "the router drops oldest
/// undelivered messages of that type" when a bounded channel is full).
pub trait Router: Send + Sync + 'static {
    /// Opens a subscription for one message kind. Returned as an owned
    /// channel receiver so the caller's only suspension point is
    /// `recv().await` (spec §5's list of permitted suspension points).
    fn subscribe(&self, filter: MessageFilter) -> mpsc::Receiver<RouterMessage>;

    /// Best-effort, fire-and-forget broadcast. Must never block the caller
    /// (spec §5: "Producer never blocks on broadcast").
    fn broadcast(&self, msg: RouterMessage);
}
