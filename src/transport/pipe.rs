//! In-memory duplex transport

use std::sync::Arc;
use async_trait::async_trait;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use crate::error::{Error, ErrorCode};
use crate::transport::{Transport, TransportReceiver, TransportSender};
use crate::types::Message;

/// An in-memory transport: two [`Pipe`]s connected back to back.
///
/// Messages written to one end come out of the other in order. Dropping
/// either end closes the session for both peers.
pub struct Pipe {
    tx: UnboundedSender<Message>,
    rx: UnboundedReceiver<Message>,
}

/// The sending half of a [`Pipe`]
struct PipeSender {
    tx: UnboundedSender<Message>,
}

/// The receiving half of a [`Pipe`]
struct PipeReceiver {
    rx: UnboundedReceiver<Message>,
}

impl Pipe {
    /// Creates a connected pair of pipes, one per peer
    pub fn new() -> (Pipe, Pipe) {
        let (tx_a, rx_a) = unbounded_channel();
        let (tx_b, rx_b) = unbounded_channel();

        let left = Pipe { tx: tx_a, rx: rx_b };
        let right = Pipe { tx: tx_b, rx: rx_a };
        (left, right)
    }
}

impl Transport for Pipe {
    fn start(&mut self) {}

    fn split(self: Box<Self>) -> (Arc<dyn TransportSender>, Box<dyn TransportReceiver>) {
        (
            Arc::new(PipeSender { tx: self.tx }),
            Box::new(PipeReceiver { rx: self.rx }),
        )
    }
}

#[async_trait]
impl TransportSender for PipeSender {
    async fn send(&self, msg: Message) -> Result<(), Error> {
        self.tx
            .send(msg)
            .map_err(|_| Error::new(ErrorCode::ConnectionClosed, "Pipe closed"))
    }
}

#[async_trait]
impl TransportReceiver for PipeReceiver {
    async fn recv(&mut self) -> Result<Message, Error> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| Error::new(ErrorCode::ConnectionClosed, "Pipe closed"))
    }
}
