use chrono::{DateTime, TimeZone, Utc};

use crate::CanopyError;

/// Opaque pagination token: the `(created_at, id)` position of the last
/// item a scan has read. Encoded as hex so callers treat it as a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub created_at: DateTime<Utc>,
    pub id: String,
}

impl Cursor {
    pub fn new(created_at: DateTime<Utc>, id: impl Into<String>) -> Self {
        Self {
            created_at,
            id: id.into(),
        }
    }

    pub fn encode(&self) -> String {
        // Microsecond precision: the store's timestamps carry micros, and a
        // coarser cursor would skip rows that share its truncated instant.
        let raw = format!("{}:{}", self.created_at.timestamp_micros(), self.id);
        hex::encode(raw.as_bytes())
    }

    pub fn decode(token: &str) -> Result<Self, CanopyError> {
        let bytes = hex::decode(token)
            .map_err(|_| CanopyError::Validation("malformed pagination cursor".to_string()))?;
        let raw = String::from_utf8(bytes)
            .map_err(|_| CanopyError::Validation("malformed pagination cursor".to_string()))?;
        let (micros, id) = raw
            .split_once(':')
            .ok_or_else(|| CanopyError::Validation("malformed pagination cursor".to_string()))?;
        let micros: i64 = micros
            .parse()
            .map_err(|_| CanopyError::Validation("malformed pagination cursor".to_string()))?;
        let created_at = Utc
            .timestamp_opt(micros.div_euclid(1_000_000), (micros.rem_euclid(1_000_000) as u32) * 1_000)
            .single()
            .ok_or_else(|| CanopyError::Validation("malformed pagination cursor".to_string()))?;
        if id.is_empty() {
            return Err(CanopyError::Validation(
                "malformed pagination cursor".to_string(),
            ));
        }
        Ok(Self {
            created_at,
            id: id.to_string(),
        })
    }
}
