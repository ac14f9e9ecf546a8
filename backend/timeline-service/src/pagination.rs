//! Opaque keyset cursors over the actor timeline.
//!
//! Wire format: `"<RFC3339 nanosecond timestamp>|<uri>"` of the last row
//! returned. The format must round-trip exactly; malformed input is a
//! reported error, never a panic.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{ServiceError, ServiceResult};

const SEPARATOR: char = '|';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub created_at: DateTime<Utc>,
    pub uri: String,
}

impl Cursor {
    pub fn encode(&self) -> String {
        format!(
            "{}{}{}",
            self.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
            SEPARATOR,
            self.uri
        )
    }

    /// Splits on the first separator only: uris may themselves contain `|`,
    /// while the timestamp half never does.
    pub fn decode(raw: &str) -> ServiceResult<Self> {
        let (timestamp, uri) = raw
            .split_once(SEPARATOR)
            .ok_or_else(|| ServiceError::InvalidInput("invalid cursor format".to_string()))?;

        let created_at = DateTime::parse_from_rfc3339(timestamp)
            .map_err(|_| ServiceError::InvalidInput("invalid cursor format".to_string()))?
            .with_timezone(&Utc);

        Ok(Self {
            created_at,
            uri: uri.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cursor(nanos: u32, uri: &str) -> Cursor {
        Cursor {
            created_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
                + chrono::Duration::nanoseconds(nanos as i64),
            uri: uri.to_string(),
        }
    }

    #[test]
    fn round_trips_nanosecond_timestamps() {
        let original = cursor(123_456_789, "at://did:plc:abc/app.murmur.feed.post/3k");
        let decoded = Cursor::decode(&original.encode()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn splits_on_the_first_separator_only() {
        let original = cursor(0, "at://did:plc:abc/app.murmur.feed.post/odd|rkey");
        let decoded = Cursor::decode(&original.encode()).unwrap();
        assert_eq!(decoded.uri, "at://did:plc:abc/app.murmur.feed.post/odd|rkey");
    }

    #[test]
    fn missing_separator_is_an_input_error() {
        let err = Cursor::decode("2024-01-01T00:00:00Z").unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[test]
    fn unparseable_timestamp_is_an_input_error() {
        let err = Cursor::decode("yesterday|at://did:plc:abc/p/1").unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }
}
