//! In-process broker
//!
//! Used by tests and by `--dry-run`. Messages are kept in memory and
//! acknowledged according to the configured [`AckMode`].

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use super::{BrokerClient, BrokerEvent, DeliveryReport, DeliveryResult};

/// How the broker answers produced messages
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AckMode {
    /// Acknowledge immediately
    #[default]
    Deliver,
    /// Report a delivery failure with this reason
    Fail(String),
    /// Accept the message but never acknowledge it (until flush)
    Withhold,
    /// Refuse the message at produce time
    RejectProduce(String),
}

/// A message accepted by the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    /// Topic
    pub topic: String,
    /// Payload as text
    pub payload: String,
}

#[derive(Default)]
struct State {
    mode: AckMode,
    messages: Vec<PublishedMessage>,
    withheld: Vec<oneshot::Sender<DeliveryResult>>,
    produce_calls: usize,
    flush_calls: usize,
}

/// In-memory [`BrokerClient`]
///
/// Clones share state, so a test can keep a handle after moving one into a
/// publisher.
#[derive(Clone)]
pub struct MemoryBroker {
    state: Arc<Mutex<State>>,
    events: mpsc::UnboundedSender<BrokerEvent>,
}

impl MemoryBroker {
    /// Create a broker and the receiving end of its event stream
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BrokerEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                state: Arc::new(Mutex::new(State::default())),
                events,
            },
            rx,
        )
    }

    /// Change how later messages are answered
    pub fn set_mode(&self, mode: AckMode) {
        self.lock().mode = mode;
    }

    /// Messages accepted so far, in order
    pub fn messages(&self) -> Vec<PublishedMessage> {
        self.lock().messages.clone()
    }

    /// Number of produce attempts, accepted or not
    pub fn produce_calls(&self) -> usize {
        self.lock().produce_calls
    }

    /// Number of flushes
    pub fn flush_calls(&self) -> usize {
        self.lock().flush_calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl BrokerClient for MemoryBroker {
    fn produce(
        &self,
        topic: &str,
        payload: &[u8],
        ack: oneshot::Sender<DeliveryResult>,
    ) -> Result<(), String> {
        let mut state = self.lock();
        state.produce_calls += 1;

        let mode = state.mode.clone();
        if let AckMode::RejectProduce(reason) = &mode {
            return Err(reason.clone());
        }

        let offset = state.messages.len() as i64;
        state.messages.push(PublishedMessage {
            topic: topic.to_string(),
            payload: String::from_utf8_lossy(payload).into_owned(),
        });

        match mode {
            AckMode::Deliver => {
                let report = DeliveryReport {
                    topic: topic.to_string(),
                    partition: 0,
                    offset,
                };
                let _ = self.events.send(BrokerEvent::Delivered(report.clone()));
                let _ = ack.send(Ok(report));
            }
            AckMode::Fail(reason) => {
                let _ = self.events.send(BrokerEvent::DeliveryFailed {
                    topic: topic.to_string(),
                    reason: reason.clone(),
                });
                let _ = ack.send(Err(reason));
            }
            AckMode::Withhold => state.withheld.push(ack),
            AckMode::RejectProduce(_) => {}
        }
        Ok(())
    }

    fn flush(&self, _timeout: Duration) -> Result<(), String> {
        let mut state = self.lock();
        state.flush_calls += 1;
        for ack in state.withheld.drain(..) {
            let _ = ack.send(Err("flushed before acknowledgment".to_string()));
        }
        Ok(())
    }
}
