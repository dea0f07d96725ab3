//! Record encoding.
//!
//! A stored record is a UTF-8 JSON object holding the session mapping.
//! Permanent sessions carry the reserved key `"_permanent": true`, which is
//! moved back into the flag on load.

use crate::error::{SessionError, SessionResult};
use ferrule_core::SessionData;
use serde_json::Value;

pub use ferrule_core::PERMANENT_KEY;

/// Converts session contents to and from stored bytes.
pub trait SessionSerializer: Send + Sync {
    fn dumps(&self, data: &SessionData, permanent: bool) -> SessionResult<Vec<u8>>;

    /// Returns the mapping and the permanent flag.
    fn loads(&self, bytes: &[u8]) -> SessionResult<(SessionData, bool)>;
}

/// JSON object records
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl SessionSerializer for JsonSerializer {
    fn dumps(&self, data: &SessionData, permanent: bool) -> SessionResult<Vec<u8>> {
        if data.contains_key(PERMANENT_KEY) {
            return Err(SessionError::Serialization(format!(
                "session data may not contain the reserved key {}",
                PERMANENT_KEY
            )));
        }

        let result = if permanent {
            let mut record = data.clone();
            record.insert(PERMANENT_KEY.to_string(), Value::Bool(true));
            serde_json::to_vec(&record)
        } else {
            serde_json::to_vec(data)
        };
        result.map_err(|e| SessionError::Serialization(e.to_string()))
    }

    fn loads(&self, bytes: &[u8]) -> SessionResult<(SessionData, bool)> {
        let mut data: SessionData = serde_json::from_slice(bytes)
            .map_err(|e| SessionError::Deserialization(e.to_string()))?;

        let permanent = match data.remove(PERMANENT_KEY) {
            Some(Value::Bool(flag)) => flag,
            Some(Value::Null) | None => false,
            Some(other) => {
                return Err(SessionError::Deserialization(format!(
                    "{} must be a boolean, got {}",
                    PERMANENT_KEY, other
                )));
            }
        };
        Ok((data, permanent))
    }
}
