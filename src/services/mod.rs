pub mod executor;

pub use executor::{canonical_json, OperationExecutor};
