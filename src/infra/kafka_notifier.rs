use crate::app::ports::EventNotifierPort;
use crate::error::{EnrichError, Result};
use crate::types::Event;
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use std::time::Duration;
use tracing::{debug, error, warn};

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Publishes events as JSON to a Kafka topic. Delivery happens on a spawned task;
/// failures are logged and dropped.
pub struct KafkaNotifier {
    producer: FutureProducer,
    topic: String,
}

impl KafkaNotifier {
    pub fn new(brokers: &str, topic: &str, client_id: &str) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("client.id", client_id)
            .set("compression.type", "zstd")
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| EnrichError::Config(format!("kafka producer: {e}")))?;
        Ok(Self {
            producer,
            topic: topic.to_string(),
        })
    }
}

impl EventNotifierPort for KafkaNotifier {
    fn emit(&self, event: Event) {
        let payload = match serde_json::to_vec(&event) {
            Ok(p) => p,
            Err(e) => {
                error!("Error serializing event: {}", e);
                crate::metrics::event_dropped();
                return;
            }
        };
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(h) => h,
            Err(_) => {
                warn!("No async runtime; dropping {} event", event.kind.as_str());
                crate::metrics::event_dropped();
                return;
            }
        };
        let producer = self.producer.clone();
        let topic = self.topic.clone();
        let kind = event.kind.as_str();
        handle.spawn(async move {
            let record = FutureRecord::to(&topic)
                .key(kind)
                .payload(&payload)
                .headers(OwnedHeaders::new().insert(Header {
                    key: "event-type",
                    value: Some(kind),
                }));
            match producer.send(record, DELIVERY_TIMEOUT).await {
                Ok(delivery) => debug!(event = kind, ?delivery, "Event delivered"),
                Err((e, _)) => {
                    error!(event = kind, "Error producing kafka message: {}", e);
                    crate::metrics::event_dropped();
                }
            }
        });
    }
}
