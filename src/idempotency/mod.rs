pub mod coordinator;
pub mod fingerprint;
pub mod postgres;
pub mod record;
pub mod store;

pub use coordinator::IdempotencyCoordinator;
pub use fingerprint::{FingerprintStrategy, Sha256Fingerprint};
pub use postgres::{PostgresRecordStore, RecordSweeper};
pub use record::{IdempotencyRecord, IdempotencyStatus, RecordMutation};
pub use store::{InMemoryRecordStore, RecordStore};
