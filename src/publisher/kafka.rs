//! librdkafka-backed [`BrokerClient`]
//!
//! Each message carries its acknowledgment sender as the delivery opaque, so
//! the delivery callback resolves exactly the publish call that produced it.
//! The same callback forwards every outcome to the client-wide event stream.

use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::producer::{
    BaseRecord, DeliveryResult as KafkaDeliveryResult, Producer, ProducerContext,
    ThreadedProducer,
};
use rdkafka::ClientContext;
use tokio::sync::{mpsc, oneshot};
use tracing::info;

use super::{BrokerClient, BrokerEvent, DeliveryReport, DeliveryResult, PublishError};

/// Routes delivery callbacks to per-message senders and the event stream
pub struct AckContext {
    events: mpsc::UnboundedSender<BrokerEvent>,
}

impl ClientContext for AckContext {
    fn error(&self, error: KafkaError, reason: &str) {
        let _ = self.events.send(BrokerEvent::Error(format!("{error}: {reason}")));
    }
}

impl ProducerContext for AckContext {
    type DeliveryOpaque = Box<oneshot::Sender<DeliveryResult>>;

    fn delivery(&self, result: &KafkaDeliveryResult<'_>, ack: Self::DeliveryOpaque) {
        let outcome = match result {
            Ok(message) => {
                let report = DeliveryReport {
                    topic: message.topic().to_string(),
                    partition: message.partition(),
                    offset: message.offset(),
                };
                let _ = self.events.send(BrokerEvent::Delivered(report.clone()));
                Ok(report)
            }
            Err((error, message)) => {
                let reason = error.to_string();
                let _ = self.events.send(BrokerEvent::DeliveryFailed {
                    topic: message.topic().to_string(),
                    reason: reason.clone(),
                });
                Err(reason)
            }
        };
        let _ = (*ack).send(outcome);
    }
}

/// Kafka producer with `acks=all` and three client-side retries
pub struct KafkaBroker {
    producer: ThreadedProducer<AckContext>,
}

impl KafkaBroker {
    /// Connect to `bootstrap_servers`
    ///
    /// Returns the broker and the receiving end of its event stream.
    pub fn connect(
        bootstrap_servers: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<BrokerEvent>), PublishError> {
        if bootstrap_servers.is_empty() {
            return Err(PublishError::Client("broker URL cannot be empty".to_string()));
        }

        let (events, rx) = mpsc::unbounded_channel();
        let producer: ThreadedProducer<AckContext> = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .set("acks", "all")
            .set("retries", "3")
            .set("batch.size", "16384")
            .set("linger.ms", "1")
            .create_with_context(AckContext { events })
            .map_err(|e| PublishError::Client(e.to_string()))?;

        info!(brokers = %bootstrap_servers, "Kafka producer created");
        Ok((Self { producer }, rx))
    }
}

impl BrokerClient for KafkaBroker {
    fn produce(
        &self,
        topic: &str,
        payload: &[u8],
        ack: oneshot::Sender<DeliveryResult>,
    ) -> Result<(), String> {
        let record = BaseRecord::<(), [u8], _>::with_opaque_to(topic, Box::new(ack)).payload(payload);
        self.producer
            .send(record)
            .map_err(|(error, _record)| error.to_string())
    }

    fn flush(&self, timeout: Duration) -> Result<(), String> {
        self.producer.flush(timeout).map_err(|e| e.to_string())
    }
}
