use crate::broker::BrokerPort;
use crate::error::{AppError, Result};
use crate::models::{
    BrokerDescriptor, ConsumeCommand, MessagePayload, OperationKind, OperationResult,
    ProduceCommand, QueueTarget, ReceivedMessage,
};
use crate::observability::get_metrics;
use async_trait::async_trait;
use chrono::Utc;
use rskafka::client::partition::{Compression, PartitionClient, UnknownTopicHandling};
use rskafka::client::ClientBuilder;
use rskafka::record::{Record, RecordAndOffset};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Header carrying the declared payload format of a produced message.
pub const FORMAT_HEADER: &str = "content-format";
/// Header carrying the reply destination of a produced message.
pub const REPLY_TO_HEADER: &str = "reply-to";

/// Configuration for the Kafka connector.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Bootstrap addresses used when a command names no endpoints.
    pub default_endpoints: Vec<String>,
    /// Upper bound per fetch request.
    pub max_fetch_bytes: i32,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            default_endpoints: vec!["localhost:9092".to_string()],
            max_fetch_bytes: 1_000_000,
        }
    }
}

/// Shared connection layer for the produce and consume adapters.
///
/// Commands may point at different clusters per request, so clients are cached
/// by bootstrap list and partition clients by (bootstrap list, queue). Kafka's
/// own bootstrap handling covers endpoint failover within a list.
pub struct KafkaConnector {
    config: ConnectorConfig,
    clients: RwLock<BTreeMap<String, Arc<rskafka::client::Client>>>,
    partition_clients: RwLock<BTreeMap<String, Arc<PartitionClient>>>,
}

impl KafkaConnector {
    pub fn new(config: ConnectorConfig) -> Self {
        Self {
            config,
            clients: RwLock::new(BTreeMap::new()),
            partition_clients: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Endpoints a command resolves to, falling back to the configured defaults.
    pub fn bootstrap_for(&self, broker: &BrokerDescriptor) -> Vec<String> {
        if broker.endpoints.is_empty() {
            self.config.default_endpoints.clone()
        } else {
            broker.bootstrap_addresses()
        }
    }

    /// Cache identity of one (cluster, queue) stream.
    pub fn stream_key(&self, broker: &BrokerDescriptor, queue: &str) -> String {
        format!("{}|{}", self.bootstrap_for(broker).join(","), queue)
    }

    async fn client_for(&self, bootstrap: &[String]) -> Result<Arc<rskafka::client::Client>> {
        let key = bootstrap.join(",");
        {
            let clients = self.clients.read().await;
            if let Some(client) = clients.get(&key) {
                return Ok(client.clone());
            }
        }

        info!("Connecting to broker endpoints: {:?}", bootstrap);
        let client = ClientBuilder::new(bootstrap.to_vec())
            .build()
            .await
            .map_err(|e| AppError::Operation(format!("unable to connect to broker {}: {}", key, e)))?;
        let client = Arc::new(client);

        {
            let mut clients = self.clients.write().await;
            clients.insert(key, client.clone());
        }

        Ok(client)
    }

    /// Round-trips a metadata request to the default cluster.
    pub async fn probe_default_cluster(&self) -> Result<usize> {
        let client = self.client_for(&self.config.default_endpoints).await?;
        let topics = client
            .list_topics()
            .await
            .map_err(|e| AppError::Operation(format!("broker metadata request failed: {}", e)))?;
        Ok(topics.len())
    }

    /// Gets or creates the partition client for a queue on the command's cluster.
    pub async fn partition_client(
        &self,
        broker: &BrokerDescriptor,
        queue: &str,
    ) -> Result<Arc<PartitionClient>> {
        let stream_key = self.stream_key(broker, queue);
        {
            let clients = self.partition_clients.read().await;
            if let Some(client) = clients.get(&stream_key) {
                return Ok(client.clone());
            }
        }

        let bootstrap = self.bootstrap_for(broker);
        let client = self.client_for(&bootstrap).await?;
        let partition_client = client
            .partition_client(queue.to_string(), 0, UnknownTopicHandling::Retry)
            .await
            .map_err(|e| AppError::Operation(format!("unable to open queue {}: {}", queue, e)))?;
        let partition_client = Arc::new(partition_client);

        {
            let mut clients = self.partition_clients.write().await;
            clients.insert(stream_key, partition_client.clone());
        }

        Ok(partition_client)
    }
}

/// Builds the record sequence a produce command writes.
///
/// Payloads are cycled round-robin until `total_messages` records exist.
fn build_records(command: &ProduceCommand) -> Vec<Record> {
    let total = command.settings.total_messages as usize;
    if command.payloads.is_empty() {
        return Vec::new();
    }
    (0..total)
        .map(|index| build_record(&command.payloads[index % command.payloads.len()], &command.target))
        .collect()
}

fn build_record(payload: &MessagePayload, target: &QueueTarget) -> Record {
    let mut headers: BTreeMap<String, Vec<u8>> = payload
        .headers
        .iter()
        .map(|(key, value)| (key.clone(), value.as_bytes().to_vec()))
        .collect();
    headers.insert(FORMAT_HEADER.to_string(), payload.format.as_str().as_bytes().to_vec());
    if let Some(reply_to) = &target.reply_to {
        headers.insert(REPLY_TO_HEADER.to_string(), reply_to.as_bytes().to_vec());
    }

    Record {
        key: None,
        value: Some(payload.body.clone().into_bytes()),
        headers,
        timestamp: Utc::now(),
    }
}

fn map_received_message(queue: &str, record_and_offset: RecordAndOffset) -> ReceivedMessage {
    let RecordAndOffset { record, offset } = record_and_offset;
    let headers = record
        .headers
        .into_iter()
        .map(|(key, value)| (key, String::from_utf8_lossy(&value).into_owned()))
        .collect();

    ReceivedMessage {
        message_id: format!("{}-0@{}", queue, offset),
        body: record
            .value
            .map(|value| String::from_utf8_lossy(&value).into_owned())
            .unwrap_or_default(),
        headers,
    }
}

/// Produce-side broker port.
pub struct KafkaMessageProducer {
    connector: Arc<KafkaConnector>,
}

impl KafkaMessageProducer {
    pub fn new(connector: Arc<KafkaConnector>) -> Self {
        Self { connector }
    }
}

#[async_trait]
impl BrokerPort for KafkaMessageProducer {
    type Command = ProduceCommand;

    async fn execute(&self, command: &ProduceCommand) -> Result<OperationResult> {
        let started_at = Utc::now();
        let queue = &command.target.queue;
        let partition_client = self.connector.partition_client(&command.broker, queue).await?;

        let records = build_records(command);
        let batch_size = command.settings.batch_size.max(1) as usize;
        let mut processed = 0u32;
        let mut batches = 0u32;
        let mut last_offset: Option<i64> = None;

        for chunk in records.chunks(batch_size) {
            let offsets = partition_client
                .produce(chunk.to_vec(), Compression::NoCompression)
                .await
                .map_err(|e| {
                    AppError::Operation(format!("failed to produce to queue {}: {}", queue, e))
                })?;
            processed += chunk.len() as u32;
            batches += 1;
            last_offset = offsets.last().copied().or(last_offset);
            debug!("Produced batch of {} messages to queue {}", chunk.len(), queue);
        }

        let completed_at = Utc::now();
        get_metrics().record_broker_messages(queue, u64::from(processed), "produced");
        info!("Produced {} messages to queue {} in {} batches", processed, queue, batches);

        let mut result = OperationResult::new(
            &command.idempotency_key,
            OperationKind::Produce,
            command.settings.total_messages,
            processed,
            started_at,
            completed_at,
        )
        .with_metadata("broker", command.broker.name.clone())
        .with_metadata("queue", queue.clone())
        .with_metadata("batch_size", command.settings.batch_size)
        .with_metadata("batches", batches);
        if let Some(offset) = last_offset {
            result = result.with_metadata("last_offset", offset);
        }
        Ok(result)
    }
}

/// Consume-side broker port.
///
/// rskafka has no consumer groups, so the adapter tracks its own next-read
/// offset per (cluster, queue) stream, starting from the earliest record.
pub struct KafkaMessageConsumer {
    connector: Arc<KafkaConnector>,
    offsets: RwLock<BTreeMap<String, i64>>,
}

impl KafkaMessageConsumer {
    pub fn new(connector: Arc<KafkaConnector>) -> Self {
        Self { connector, offsets: RwLock::new(BTreeMap::new()) }
    }

    async fn next_offset(&self, stream_key: &str) -> i64 {
        let offsets = self.offsets.read().await;
        offsets.get(stream_key).copied().unwrap_or(0)
    }

    async fn store_offset(&self, stream_key: &str, offset: i64) {
        let mut offsets = self.offsets.write().await;
        offsets.insert(stream_key.to_string(), offset);
    }
}

#[async_trait]
impl BrokerPort for KafkaMessageConsumer {
    type Command = ConsumeCommand;

    async fn execute(&self, command: &ConsumeCommand) -> Result<OperationResult> {
        let started_at = Utc::now();
        let queue = &command.target.queue;
        let partition_client = self.connector.partition_client(&command.broker, queue).await?;
        let stream_key = self.connector.stream_key(&command.broker, queue);

        let max_messages = command.settings.max_messages as usize;
        let wait_ms = i32::try_from(command.settings.wait_timeout_ms).unwrap_or(i32::MAX);
        let max_bytes = self.connector.config().max_fetch_bytes;
        let mut next_offset = self.next_offset(&stream_key).await;
        let mut received: Vec<ReceivedMessage> = Vec::new();
        let mut high_watermark = 0i64;

        'fetch: while received.len() < max_messages {
            let (records, watermark) = partition_client
                .fetch_records(next_offset, 1..max_bytes, wait_ms)
                .await
                .map_err(|e| {
                    AppError::Operation(format!("failed to consume from queue {}: {}", queue, e))
                })?;
            high_watermark = watermark;
            if records.is_empty() {
                break;
            }
            for record_and_offset in records {
                // Leave the unread tail for the next request.
                if received.len() >= max_messages {
                    break 'fetch;
                }
                next_offset = record_and_offset.offset + 1;
                received.push(map_received_message(queue, record_and_offset));
            }
        }

        self.store_offset(&stream_key, next_offset).await;
        let completed_at = Utc::now();
        let processed = received.len() as u32;
        get_metrics().record_broker_messages(queue, u64::from(processed), "consumed");
        info!("Consumed {} messages from queue {}", processed, queue);

        Ok(OperationResult::new(
            &command.idempotency_key,
            OperationKind::Consume,
            command.settings.max_messages,
            processed,
            started_at,
            completed_at,
        )
        .with_metadata("broker", command.broker.name.clone())
        .with_metadata("queue", queue.clone())
        .with_metadata("high_watermark", high_watermark)
        .with_messages(received))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PayloadFormat, ProduceSettings, QueueEndpoint};

    fn command_with(total: u32, payloads: Vec<MessagePayload>) -> ProduceCommand {
        ProduceCommand {
            idempotency_key: "k1".to_string(),
            broker: BrokerDescriptor::new("primary", vec![QueueEndpoint::new("kafka", 9092)]),
            target: QueueTarget::new("Q1").with_reply_to("Q1.REPLY"),
            payloads,
            settings: ProduceSettings::new(total, 2),
        }
    }

    #[test]
    fn build_records_cycles_payloads_to_reach_total() {
        let command = command_with(
            5,
            vec![MessagePayload::text("a"), MessagePayload::json("{\"b\":1}")],
        );
        let records = build_records(&command);
        assert_eq!(records.len(), 5);
        assert_eq!(records[0].value.as_deref(), Some(b"a".as_ref()));
        assert_eq!(records[1].value.as_deref(), Some(b"{\"b\":1}".as_ref()));
        assert_eq!(records[4].value.as_deref(), Some(b"a".as_ref()));
    }

    #[test]
    fn build_record_stamps_format_and_reply_headers() {
        let payload = MessagePayload::text("hello").with_header("trace-id", "t-1");
        let record = build_record(&payload, &QueueTarget::new("Q1").with_reply_to("Q1.REPLY"));
        assert_eq!(record.headers.get(FORMAT_HEADER).map(Vec::as_slice), Some(b"TEXT".as_ref()));
        assert_eq!(
            record.headers.get(REPLY_TO_HEADER).map(Vec::as_slice),
            Some(b"Q1.REPLY".as_ref())
        );
        assert_eq!(record.headers.get("trace-id").map(Vec::as_slice), Some(b"t-1".as_ref()));
    }

    #[test]
    fn build_records_is_empty_without_payloads() {
        let command = command_with(3, Vec::new());
        assert!(build_records(&command).is_empty());
    }

    #[test]
    fn binary_format_travels_as_header() {
        let payload = MessagePayload {
            body: "0xdeadbeef".to_string(),
            format: PayloadFormat::Binary,
            headers: BTreeMap::new(),
        };
        let record = build_record(&payload, &QueueTarget::new("Q1"));
        assert_eq!(record.headers.get(FORMAT_HEADER).map(Vec::as_slice), Some(b"BINARY".as_ref()));
    }

    #[test]
    fn map_received_message_exposes_offset_identity_and_headers() {
        let record = Record {
            key: None,
            value: Some(b"payload".to_vec()),
            headers: BTreeMap::from([("content-format".to_string(), b"TEXT".to_vec())]),
            timestamp: Utc::now(),
        };
        let message = map_received_message("Q1", RecordAndOffset { record, offset: 7 });
        assert_eq!(message.message_id, "Q1-0@7");
        assert_eq!(message.body, "payload");
        assert_eq!(message.headers.get("content-format").map(String::as_str), Some("TEXT"));
    }

    #[test]
    fn stream_key_falls_back_to_default_endpoints() {
        let connector = KafkaConnector::new(ConnectorConfig {
            default_endpoints: vec!["fallback:9092".to_string()],
            ..ConnectorConfig::default()
        });
        let empty = BrokerDescriptor::new("primary", Vec::new());
        assert_eq!(connector.stream_key(&empty, "Q1"), "fallback:9092|Q1");

        let explicit = BrokerDescriptor::new(
            "primary",
            vec![QueueEndpoint::new("a", 1), QueueEndpoint::new("b", 2)],
        );
        assert_eq!(connector.stream_key(&explicit, "Q1"), "a:1,b:2|Q1");
    }
}
