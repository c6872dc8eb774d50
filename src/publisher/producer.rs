//! Acknowledging publisher over a [`BrokerClient`]

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{
    BrokerClient, BrokerEvent, PublishError, QueuePublisher, ACK_TIMEOUT, FLUSH_TIMEOUT,
};
use crate::metrics::record_queue_publish;
use crate::shutdown::ShutdownCoordinator;

struct DrainTask {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

struct Inner<B> {
    client: Option<B>,
    closed: bool,
    drain: Option<DrainTask>,
}

/// Publisher that waits for each message's delivery report
///
/// Construction starts a background task that logs the client's event
/// stream; [`QueuePublisher::close`] stops and joins it. Must be created
/// inside a tokio runtime.
pub struct BrokerPublisher<B: BrokerClient> {
    inner: Mutex<Inner<B>>,
    ack_timeout: Duration,
    flush_timeout: Duration,
}

impl<B: BrokerClient> BrokerPublisher<B> {
    /// Wrap `client`, draining `events` in the background
    pub fn new(client: B, events: mpsc::UnboundedReceiver<BrokerEvent>) -> Self {
        let (stop, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(drain_events(events, stop_rx));

        Self {
            inner: Mutex::new(Inner {
                client: Some(client),
                closed: false,
                drain: Some(DrainTask { stop, handle }),
            }),
            ack_timeout: ACK_TIMEOUT,
            flush_timeout: FLUSH_TIMEOUT,
        }
    }

    /// Override the acknowledgment bound
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Override the flush bound used at close
    pub fn with_flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }

    /// Whether [`QueuePublisher::close`] has run
    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.closed
    }
}

async fn drain_events(
    mut events: mpsc::UnboundedReceiver<BrokerEvent>,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            event = events.recv() => match event {
                Some(event) => log_event(&event),
                None => return,
            },
        }
    }

    // Report what already arrived before stopping
    while let Ok(event) = events.try_recv() {
        log_event(&event);
    }
}

fn log_event(event: &BrokerEvent) {
    match event {
        BrokerEvent::Delivered(report) => debug!(
            topic = %report.topic,
            partition = report.partition,
            offset = report.offset,
            "Delivered message"
        ),
        BrokerEvent::DeliveryFailed { topic, reason } => {
            warn!(topic = %topic, reason = %reason, "Delivery failed")
        }
        BrokerEvent::Error(reason) => warn!(reason = %reason, "Broker client error"),
    }
}

#[async_trait]
impl<B: BrokerClient> QueuePublisher for BrokerPublisher<B> {
    async fn publish(
        &self,
        shutdown: &ShutdownCoordinator,
        broker: &str,
        topic: &str,
        message: &str,
    ) -> Result<(), PublishError> {
        let ack = {
            let inner = self.inner.lock().await;
            let client = match (&inner.client, inner.closed) {
                (Some(client), false) => client,
                _ => {
                    record_queue_publish("closed");
                    return Err(PublishError::Closed);
                }
            };
            if topic.is_empty() {
                return Err(PublishError::EmptyTopic);
            }

            let (tx, rx) = oneshot::channel();
            client
                .produce(topic, message.as_bytes(), tx)
                .map_err(|reason| {
                    record_queue_publish("failed");
                    PublishError::Produce {
                        broker: broker.to_string(),
                        topic: topic.to_string(),
                        reason,
                    }
                })?;
            rx
        };

        debug!(broker = %broker, topic = %topic, "Waiting for delivery report");

        let outcome = shutdown
            .run_until_shutdown(tokio::time::timeout(self.ack_timeout, ack))
            .await;

        match outcome {
            Err(_) => {
                record_queue_publish("cancelled");
                Err(PublishError::Cancelled)
            }
            Ok(Err(_elapsed)) => {
                record_queue_publish("timeout");
                Err(PublishError::AckTimeout(self.ack_timeout))
            }
            Ok(Ok(Err(_dropped))) => {
                record_queue_publish("failed");
                Err(PublishError::AckDropped)
            }
            Ok(Ok(Ok(Err(reason)))) => {
                record_queue_publish("failed");
                Err(PublishError::DeliveryFailed {
                    broker: broker.to_string(),
                    topic: topic.to_string(),
                    reason,
                })
            }
            Ok(Ok(Ok(Ok(report)))) => {
                record_queue_publish("delivered");
                info!(
                    topic = %report.topic,
                    partition = report.partition,
                    offset = report.offset,
                    "Message delivered"
                );
                Ok(())
            }
        }
    }

    async fn close(&self) -> Result<(), PublishError> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Ok(());
        }
        inner.closed = true;

        let flushed = match inner.client.take() {
            Some(client) => {
                let timeout = self.flush_timeout;
                tokio::task::spawn_blocking(move || {
                    let result = client.flush(timeout);
                    drop(client);
                    result
                })
                .await
                .map_err(|e| PublishError::Flush(e.to_string()))
                .and_then(|r| r.map_err(PublishError::Flush))
            }
            None => Ok(()),
        };

        if let Some(drain) = inner.drain.take() {
            let _ = drain.stop.send(());
            if let Err(e) = drain.handle.await {
                warn!(error = %e, "Event drain task ended abnormally");
            }
        }

        info!("Publisher closed");
        flushed
    }
}

impl<B: BrokerClient> Drop for BrokerPublisher<B> {
    fn drop(&mut self) {
        // Close was skipped: stop the drain task without joining it
        if let Some(drain) = self.inner.get_mut().drain.take() {
            let _ = drain.stop.send(());
        }
    }
}
