//! Cross-context channel.
//!
//! One [`ChannelHub`] per session maps each live context to the sending half
//! of its inbox. Frames to a context are delivered in send order. A port is
//! created when its context is created and removed when the context is
//! permanently destroyed; anything still addressed to it then fails with
//! `ChannelClosed`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use xdomain_common::{new_correlation_id, ContextId, DriverError, Result};

use crate::message::ChannelMessage;


/// A message in transit: JSON text plus an optional reply slot.
#[derive(Debug)]
struct Frame {
    from: ContextId,
    correlation: String,
    body: String,
    reply: Option<oneshot::Sender<String>>,
}

/// Routes frames between the contexts of one session.
#[derive(Clone, Default)]
pub struct ChannelHub {
    ports: Arc<RwLock<HashMap<ContextId, mpsc::UnboundedSender<Frame>>>>,
}

impl ChannelHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the port for `id` and return its receiving side. Connecting an
    /// id that already has a port replaces it; the old inbox stops receiving.
    pub fn connect(&self, id: ContextId) -> Inbox {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.ports.write().insert(id.clone(), tx).is_some() {
            debug!(context = %id, "channel port replaced");
        } else {
            debug!(context = %id, "channel port opened");
        }
        Inbox { owner: id, rx }
    }

    /// Remove the port for `id`. Pending requests it never answered resolve
    /// with `ChannelClosed` once its inbox is dropped.
    pub fn disconnect(&self, id: &ContextId) -> bool {
        let removed = self.ports.write().remove(id).is_some();
        if removed {
            debug!(context = %id, "channel port closed");
        }
        removed
    }

    pub fn is_connected(&self, id: &ContextId) -> bool {
        self.ports.read().contains_key(id)
    }

    /// Every context that currently has a port.
    pub fn contexts(&self) -> Vec<ContextId> {
        self.ports.read().keys().cloned().collect()
    }

    fn port(&self, to: &ContextId) -> Result<mpsc::UnboundedSender<Frame>> {
        self.ports
            .read()
            .get(to)
            .cloned()
            .ok_or_else(|| DriverError::ChannelClosed { context: to.clone() })
    }

    /// Fire-and-forget delivery.
    pub fn send(&self, from: &ContextId, to: &ContextId, message: &ChannelMessage) -> Result<()> {
        let body = message.to_json()?;
        let correlation = new_correlation_id();
        debug!(from = %from, to = %to, kind = message.kind(), %correlation, "send");
        self.port(to)?
            .send(Frame {
                from: from.clone(),
                correlation,
                body,
                reply: None,
            })
            .map_err(|_| DriverError::ChannelClosed { context: to.clone() })
    }

    /// Request/response delivery. Resolves with the reply, or with
    /// `ChannelClosed` if the receiving context goes away first.
    pub async fn request(
        &self,
        from: &ContextId,
        to: &ContextId,
        message: &ChannelMessage,
    ) -> Result<ChannelMessage> {
        let body = message.to_json()?;
        let correlation = new_correlation_id();
        let (reply_tx, reply_rx) = oneshot::channel();

        self.port(to)?
            .send(Frame {
                from: from.clone(),
                correlation: correlation.clone(),
                body,
                reply: Some(reply_tx),
            })
            .map_err(|_| DriverError::ChannelClosed { context: to.clone() })?;
        debug!(from = %from, to = %to, kind = message.kind(), %correlation, "request");

        let raw = reply_rx
            .await
            .map_err(|_| DriverError::ChannelClosed { context: to.clone() })?;
        debug!(from = %to, to = %from, %correlation, "reply");
        ChannelMessage::from_json(&raw)
    }

    /// Send `message` to every connected context except `from`. Returns how
    /// many contexts it was delivered to.
    pub fn broadcast(&self, from: &ContextId, message: &ChannelMessage) -> Result<usize> {
        let body = message.to_json()?;

        let peers: Vec<(ContextId, mpsc::UnboundedSender<Frame>)> = self
            .ports
            .read()
            .iter()
            .filter(|(id, _)| *id != from)
            .map(|(id, tx)| (id.clone(), tx.clone()))
            .collect();

        let mut delivered = 0;
        for (peer, tx) in peers {
            let frame = Frame {
                from: from.clone(),
                correlation: new_correlation_id(),
                body: body.clone(),
                reply: None,
            };
            if tx.send(frame).is_ok() {
                delivered += 1;
            } else {
                debug!(from = %from, to = %peer, "broadcast skipped closed port");
            }
        }
        debug!(from = %from, kind = message.kind(), delivered, "broadcast");
        Ok(delivered)
    }
}

/// A decoded message together with the means to answer it.
#[derive(Debug)]
pub struct Envelope {
    pub from: ContextId,
    pub correlation: String,
    pub message: ChannelMessage,
    pub responder: Option<Responder>,
}

/// Reply slot of a request frame. Dropping it unanswered closes the request.
#[derive(Debug)]
pub struct Responder {
    tx: oneshot::Sender<String>,
}

impl Responder {
    /// Answer the request. Returns false if the requester stopped waiting.
    pub fn respond(self, message: &ChannelMessage) -> bool {
        let body = message
            .to_json()
            .or_else(|e| ChannelMessage::callback_err(e.to_remote()).to_json());
        match body {
            Ok(body) => self.tx.send(body).is_ok(),
            Err(e) => {
                warn!(error = %e, "reply dropped: message did not serialize");
                false
            }
        }
    }
}

/// Receiving side of a context's port.
pub struct Inbox {
    owner: ContextId,
    rx: mpsc::UnboundedReceiver<Frame>,
}

impl Inbox {
    pub fn owner(&self) -> &ContextId {
        &self.owner
    }

    /// Wait for the next valid message. `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Envelope> {
        loop {
            let frame = self.rx.recv().await?;
            if let Some(envelope) = self.decode(frame) {
                return Some(envelope);
            }
        }
    }

    /// Take the next valid message without waiting.
    pub fn try_recv(&mut self) -> Option<Envelope> {
        loop {
            let frame = self.rx.try_recv().ok()?;
            if let Some(envelope) = self.decode(frame) {
                return Some(envelope);
            }
        }
    }

    fn decode(&self, frame: Frame) -> Option<Envelope> {
        let responder = frame.reply.map(|tx| Responder { tx });
        match ChannelMessage::from_json(&frame.body) {
            Ok(message) => Some(Envelope {
                from: frame.from,
                correlation: frame.correlation,
                message,
                responder,
            }),
            Err(e) => {
                warn!(
                    context = %self.owner,
                    from = %frame.from,
                    body_len = frame.body.len(),
                    "frame rejected: {e}"
                );
                if let Some(responder) = responder {
                    responder.respond(&ChannelMessage::callback_err(e.to_remote()));
                }
                None
            }
        }
    }
}
