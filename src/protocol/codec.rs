//! JSON encoding of protocol messages
//!
//! The transport in front of the engine speaks JSON; these helpers turn
//! payloads into engine types and back, mapping failures to
//! [`SyncError::Serialization`](crate::error::SyncError::Serialization).

use crate::crdt::LwwRegister;
use crate::error::{Result, SyncError};
use crate::protocol::{Command, DiagramContent, Operation, Snapshot};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serialize any protocol message to JSON bytes
pub fn encode_message<M: Serialize>(msg: &M) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(msg)?)
}

/// Deserialize a protocol message from JSON bytes
pub fn decode_message<M: DeserializeOwned>(bytes: &[u8]) -> Result<M> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Encode an operation batch as a JSON array
pub fn encode_operations(operations: &[Operation]) -> Result<Vec<u8>> {
    encode_message(&operations)
}

/// Decode an operation batch
///
/// Accepts a single operation object as a batch of one. Every operation is
/// validated, so a malformed INSERT fails the whole batch before anything is
/// applied.
pub fn decode_operations(bytes: &[u8]) -> Result<Vec<Operation>> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;
    let operations: Vec<Operation> = match value {
        serde_json::Value::Array(_) => serde_json::from_value(value)?,
        serde_json::Value::Object(_) => vec![serde_json::from_value(value)?],
        other => {
            return Err(SyncError::InvalidOperation(format!(
                "expected an operation or an array of operations, got {}",
                other
            )))
        }
    };

    operations
        .iter()
        .map(Operation::command)
        .collect::<Result<Vec<Command>>>()?;
    Ok(operations)
}

/// Decode a diagram register state (`timeStamp` accepted for `timestamp`)
pub fn decode_register(bytes: &[u8]) -> Result<LwwRegister<DiagramContent>> {
    decode_message(bytes)
}

pub fn encode_register(state: &LwwRegister<DiagramContent>) -> Result<Vec<u8>> {
    encode_message(state)
}

pub fn encode_snapshot(snapshot: &Snapshot) -> Result<Vec<u8>> {
    encode_message(snapshot)
}
