//! Transport port of the protocol engine
//!
//! Concrete transports (stdio, streamable HTTP) live outside the engine;
//! anything that can deliver framed, ordered [`Message`]s on a single logical
//! session plugs in here. The [`pipe`] module provides an in-memory duplex
//! used by tests and examples.

use std::sync::Arc;
use async_trait::async_trait;
use crate::error::Error;
use crate::types::Message;

pub mod pipe;

/// The sending half of a transport.
///
/// Senders are shared: the engine captures the current sender per dispatched
/// request so a late response still reaches the peer that asked, even if the
/// transport was swapped mid-handler.
#[async_trait]
pub trait TransportSender: Send + Sync {
    /// Delivers a message to the remote peer
    async fn send(&self, msg: Message) -> Result<(), Error>;
}

/// The receiving half of a transport
#[async_trait]
pub trait TransportReceiver: Send {
    /// Receives the next message from the remote peer.
    ///
    /// Returns `ConnectionClosed` when the peer is gone; any other error is
    /// surfaced through the engine's error sink without ending the session.
    async fn recv(&mut self) -> Result<Message, Error>;
}

/// Describes a transport protocol for communicating between the two MCP peers
pub trait Transport: Send + 'static {
    /// Starts the transport's background machinery, if any
    fn start(&mut self);

    /// Splits the transport into its sending and receiving halves
    fn split(self: Box<Self>) -> (Arc<dyn TransportSender>, Box<dyn TransportReceiver>);
}
