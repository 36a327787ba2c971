use async_trait::async_trait;
use chrono::{Duration, Utc};
use mq_probe::broker::BrokerPort;
use mq_probe::error::{AppError, Result};
use mq_probe::idempotency::{
    FingerprintStrategy, IdempotencyCoordinator, IdempotencyRecord, IdempotencyStatus,
    InMemoryRecordStore, RecordMutation, Sha256Fingerprint,
};
use mq_probe::models::{
    BrokerDescriptor, ConsumeCommand, ConsumeSettings, MessagePayload, OperationKind,
    OperationResult, ProduceCommand, ProduceSettings, QueueTarget, ReceivedMessage,
};
use mq_probe::services::{canonical_json, OperationExecutor};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

enum PortOutcome {
    Succeed,
    Fail(String),
}

/// Produce port double that counts invocations instead of talking to a broker.
struct FakeProducePort {
    calls: Arc<AtomicU32>,
    outcome: PortOutcome,
}

#[async_trait]
impl BrokerPort for FakeProducePort {
    type Command = ProduceCommand;

    async fn execute(&self, command: &ProduceCommand) -> Result<OperationResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            PortOutcome::Fail(message) => Err(AppError::Operation(message.clone())),
            PortOutcome::Succeed => {
                let now = Utc::now();
                Ok(OperationResult::new(
                    command.idempotency_key.clone(),
                    OperationKind::Produce,
                    command.settings.total_messages,
                    command.settings.total_messages,
                    now,
                    now,
                )
                .with_metadata("queue", command.target.queue.clone()))
            }
        }
    }
}

/// Consume port double returning two canned messages.
struct FakeConsumePort {
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl BrokerPort for FakeConsumePort {
    type Command = ConsumeCommand;

    async fn execute(&self, command: &ConsumeCommand) -> Result<OperationResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let messages = vec![
            ReceivedMessage {
                message_id: format!("{}-0@0", command.target.queue),
                body: "one".to_string(),
                headers: Default::default(),
            },
            ReceivedMessage {
                message_id: format!("{}-0@1", command.target.queue),
                body: "two".to_string(),
                headers: Default::default(),
            },
        ];
        Ok(OperationResult::new(
            command.idempotency_key.clone(),
            OperationKind::Consume,
            command.settings.max_messages,
            messages.len() as u32,
            now,
            now,
        )
        .with_messages(messages))
    }
}

fn produce_command(key: &str, total: u32) -> ProduceCommand {
    ProduceCommand {
        idempotency_key: key.to_string(),
        broker: BrokerDescriptor::new("default", Vec::new()),
        target: QueueTarget::new("Q1"),
        payloads: vec![MessagePayload::text("hello")],
        settings: ProduceSettings::new(total, total),
    }
}

fn consume_command(key: &str, max: u32) -> ConsumeCommand {
    ConsumeCommand {
        idempotency_key: key.to_string(),
        broker: BrokerDescriptor::new("default", Vec::new()),
        target: QueueTarget::new("Q1"),
        settings: ConsumeSettings::new(max),
    }
}

fn produce_executor(
    outcome: PortOutcome,
) -> (
    Arc<InMemoryRecordStore>,
    Arc<AtomicU32>,
    OperationExecutor<FakeProducePort>,
) {
    let store = Arc::new(InMemoryRecordStore::new());
    let coordinator = Arc::new(IdempotencyCoordinator::new(
        store.clone(),
        Duration::hours(24),
    ));
    let calls = Arc::new(AtomicU32::new(0));
    let port = FakeProducePort {
        calls: calls.clone(),
        outcome,
    };
    (store, calls, OperationExecutor::new(port, coordinator))
}

#[tokio::test]
async fn test_first_run_executes_and_stores_the_result() {
    let (store, calls, executor) = produce_executor(PortOutcome::Succeed);
    let command = produce_command("k1", 3);

    let result = executor.run(&command).await.expect("Run failed");
    assert_eq!(result.processed_messages, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let record = store.get_raw(OperationKind::Produce, "k1").await.unwrap();
    assert!(record.is_completed());
    let stored: OperationResult =
        serde_json::from_str(record.response_payload.as_deref().unwrap()).unwrap();
    assert_eq!(stored, result);
}

#[tokio::test]
async fn test_replay_skips_the_broker_port() {
    let (_store, calls, executor) = produce_executor(PortOutcome::Succeed);
    let command = produce_command("k1", 3);

    let first = executor.run(&command).await.expect("First run failed");
    let second = executor.run(&command).await.expect("Replay failed");

    assert_eq!(second, first);
    assert_eq!(calls.load(Ordering::SeqCst), 1, "replay must not re-invoke the port");
}

#[tokio::test]
async fn test_key_reuse_with_different_command_conflicts() {
    let (_store, calls, executor) = produce_executor(PortOutcome::Succeed);

    executor
        .run(&produce_command("k1", 3))
        .await
        .expect("First run failed");

    let reused = executor.run(&produce_command("k1", 5)).await;
    match reused {
        Err(AppError::Conflict(msg)) => assert!(msg.contains("different payload")),
        other => panic!("expected Conflict, got {:?}", other),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1, "mismatch must not reach the port");
}

#[tokio::test]
async fn test_broker_failure_marks_failed_and_surfaces_the_original_error() {
    let (store, calls, executor) =
        produce_executor(PortOutcome::Fail("partition offline".to_string()));
    let command = produce_command("k1", 3);

    let result = executor.run(&command).await;
    match result {
        Err(AppError::Operation(msg)) => assert_eq!(msg, "partition offline"),
        other => panic!("expected Operation, got {:?}", other),
    }

    let record = store.get_raw(OperationKind::Produce, "k1").await.unwrap();
    assert_eq!(record.status, IdempotencyStatus::Failed);
    assert!(record.response_payload.is_none());

    // A retry before expiry sees the FAILED record and conflicts without
    // reaching the broker again.
    let retry = executor.run(&command).await;
    match retry {
        Err(AppError::Conflict(msg)) => {
            assert!(msg.contains("failed to acquire idempotency lock"))
        }
        other => panic!("expected Conflict, got {:?}", other),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_completed_record_missing_payload_conflicts() {
    let (store, calls, executor) = produce_executor(PortOutcome::Succeed);
    let command = produce_command("k1", 3);

    // Completed record of this exact command, but with the payload lost.
    let serialized = canonical_json(&command).unwrap();
    let now = Utc::now();
    let mut record = IdempotencyRecord::in_progress(
        OperationKind::Produce,
        "k1",
        Sha256Fingerprint.digest(&serialized),
        now,
        now + Duration::hours(1),
    );
    record.apply(&RecordMutation {
        status: IdempotencyStatus::Completed,
        response_payload: None,
        updated_at: now,
    });
    store.seed(record).await;

    let result = executor.run(&command).await;
    match result {
        Err(AppError::Conflict(msg)) => assert!(msg.contains("missing its response payload")),
        other => panic!("expected Conflict, got {:?}", other),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_corrupted_stored_payload_surfaces_as_serialization_error() {
    let (store, calls, executor) = produce_executor(PortOutcome::Succeed);
    let command = produce_command("k1", 3);

    let serialized = canonical_json(&command).unwrap();
    let now = Utc::now();
    let mut record = IdempotencyRecord::in_progress(
        OperationKind::Produce,
        "k1",
        Sha256Fingerprint.digest(&serialized),
        now,
        now + Duration::hours(1),
    );
    record.apply(&RecordMutation {
        status: IdempotencyStatus::Completed,
        response_payload: Some("not json".to_string()),
        updated_at: now,
    });
    store.seed(record).await;

    let result = executor.run(&command).await;
    assert!(matches!(result, Err(AppError::Serialization(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_ttl_override_is_passed_through_to_the_record() {
    let (store, _calls, executor) = produce_executor(PortOutcome::Succeed);
    let command = produce_command("k1", 3);

    executor
        .run_with_ttl(&command, Some(Duration::seconds(600)))
        .await
        .expect("Run failed");

    let record = store.get_raw(OperationKind::Produce, "k1").await.unwrap();
    assert_eq!(record.expires_at - record.created_at, Duration::seconds(600));
}

#[tokio::test]
async fn test_same_key_under_different_kinds_does_not_collide() {
    let store = Arc::new(InMemoryRecordStore::new());
    let coordinator = Arc::new(IdempotencyCoordinator::new(
        store.clone(),
        Duration::hours(24),
    ));

    let produce_calls = Arc::new(AtomicU32::new(0));
    let produce = OperationExecutor::new(
        FakeProducePort {
            calls: produce_calls.clone(),
            outcome: PortOutcome::Succeed,
        },
        coordinator.clone(),
    );
    let consume_calls = Arc::new(AtomicU32::new(0));
    let consume = OperationExecutor::new(
        FakeConsumePort {
            calls: consume_calls.clone(),
        },
        coordinator,
    );

    produce
        .run(&produce_command("shared", 3))
        .await
        .expect("Produce failed");
    let consumed = consume
        .run(&consume_command("shared", 5))
        .await
        .expect("Consume failed");

    assert_eq!(consumed.processed_messages, 2);
    assert_eq!(produce_calls.load(Ordering::SeqCst), 1);
    assert_eq!(consume_calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn test_consume_replay_preserves_messages() {
    let store = Arc::new(InMemoryRecordStore::new());
    let coordinator = Arc::new(IdempotencyCoordinator::new(
        store,
        Duration::hours(24),
    ));
    let calls = Arc::new(AtomicU32::new(0));
    let executor = OperationExecutor::new(FakeConsumePort { calls: calls.clone() }, coordinator);
    let command = consume_command("k1", 5);

    let first = executor.run(&command).await.expect("First run failed");
    let replayed = executor.run(&command).await.expect("Replay failed");

    assert_eq!(replayed, first);
    assert_eq!(replayed.messages.len(), 2);
    assert_eq!(replayed.messages[0].body, "one");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
