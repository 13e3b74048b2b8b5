//! Event Hubs connection string parsing.
//!
//! A connection string is a `;`-separated list of `Key=Value` pairs:
//!
//! ```text
//! Endpoint=sb://laekning.servicebus.windows.net/;SharedAccessKeyName=listen;SharedAccessKey=abc=;EntityPath=orders
//! ```
//!
//! Only `Endpoint` is required to reach the Kafka endpoint; the full string
//! is used as the SASL password.

use std::fmt;

use thiserror::Error;
use url::Url;

/// Port of the Event Hubs Kafka-compatible endpoint.
pub const KAFKA_PORT: u16 = 9093;

/// Errors that can occur while parsing a connection string.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConnectionStringError {
    /// The connection string is empty.
    #[error("connection string is empty")]
    Empty,

    /// A segment is not of the form `Key=Value`.
    #[error("malformed connection string segment: {0}")]
    MalformedSegment(String),

    /// The `Endpoint` key is missing.
    #[error("connection string has no Endpoint")]
    MissingEndpoint,

    /// The `Endpoint` value is not a URL with a host.
    #[error("invalid Endpoint: {0}")]
    InvalidEndpoint(String),

    /// `EntityPath` names a different event hub than the configured one.
    #[error("connection string is scoped to event hub '{entity_path}', not '{hub_name}'")]
    EntityMismatch {
        /// Event hub named in the connection string.
        entity_path: String,
        /// Event hub the consumer was asked to open.
        hub_name: String,
    },
}

/// A parsed Event Hubs connection string.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    raw: String,
    host: String,
    shared_access_key_name: Option<String>,
    shared_access_key: Option<String>,
    entity_path: Option<String>,
}

impl ConnectionString {
    /// Parse a connection string.
    ///
    /// Keys are matched case-insensitively; unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionStringError`] when the string is empty, has a
    /// malformed segment, or lacks a usable `Endpoint`.
    ///
    /// # Examples
    ///
    /// ```
    /// use laekning_eventhub::eventhub::ConnectionString;
    ///
    /// let conn = ConnectionString::parse(
    ///     "Endpoint=sb://laekning.servicebus.windows.net/;SharedAccessKeyName=listen;SharedAccessKey=c2VjcmV0",
    /// ).unwrap();
    /// assert_eq!(conn.host(), "laekning.servicebus.windows.net");
    /// assert_eq!(conn.kafka_bootstrap(), "laekning.servicebus.windows.net:9093");
    /// ```
    pub fn parse(raw: &str) -> Result<Self, ConnectionStringError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ConnectionStringError::Empty);
        }

        let mut endpoint = None;
        let mut shared_access_key_name = None;
        let mut shared_access_key = None;
        let mut entity_path = None;

        for segment in trimmed.split(';').filter(|s| !s.trim().is_empty()) {
            // Values may carry base64 '=' padding, so split once.
            let (key, value) = segment
                .split_once('=')
                .ok_or_else(|| ConnectionStringError::MalformedSegment(segment.to_string()))?;
            let value = value.trim().to_string();
            match key.trim().to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(value),
                "sharedaccesskeyname" => shared_access_key_name = Some(value),
                "sharedaccesskey" => shared_access_key = Some(value),
                "entitypath" => entity_path = Some(value).filter(|v| !v.is_empty()),
                _ => {}
            }
        }

        let endpoint = endpoint.ok_or(ConnectionStringError::MissingEndpoint)?;
        let url = Url::parse(&endpoint)
            .map_err(|e| ConnectionStringError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ConnectionStringError::InvalidEndpoint(endpoint.clone()))?
            .to_string();

        Ok(Self {
            raw: trimmed.to_string(),
            host,
            shared_access_key_name,
            shared_access_key,
            entity_path,
        })
    }

    /// The fully qualified namespace host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The shared access policy name, if present.
    pub fn shared_access_key_name(&self) -> Option<&str> {
        self.shared_access_key_name.as_deref()
    }

    /// The event hub the string is scoped to, if any.
    pub fn entity_path(&self) -> Option<&str> {
        self.entity_path.as_deref()
    }

    /// Returns true if a shared access key is present.
    pub fn has_shared_access_key(&self) -> bool {
        self.shared_access_key.is_some()
    }

    /// Bootstrap address of the namespace's Kafka endpoint.
    pub fn kafka_bootstrap(&self) -> String {
        format!("{}:{}", self.host, KAFKA_PORT)
    }

    /// The connection string as supplied, used as the SASL password.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Check that the string may be used to open `hub_name`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionStringError::EntityMismatch`] if the string is
    /// scoped to another event hub.
    pub fn ensure_entity(&self, hub_name: &str) -> Result<(), ConnectionStringError> {
        match &self.entity_path {
            Some(path) if path != hub_name => Err(ConnectionStringError::EntityMismatch {
                entity_path: path.clone(),
                hub_name: hub_name.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

// The key must never reach logs.
impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionString")
            .field("host", &self.host)
            .field("shared_access_key_name", &self.shared_access_key_name)
            .field(
                "shared_access_key",
                &self.shared_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("entity_path", &self.entity_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "Endpoint=sb://laekning.servicebus.windows.net/;SharedAccessKeyName=listen;SharedAccessKey=a2V5PQ==;EntityPath=laekning-events";

    #[test]
    fn test_parse_full_connection_string() {
        let conn = ConnectionString::parse(FULL).unwrap();
        assert_eq!(conn.host(), "laekning.servicebus.windows.net");
        assert_eq!(conn.shared_access_key_name(), Some("listen"));
        assert!(conn.has_shared_access_key());
        assert_eq!(conn.entity_path(), Some("laekning-events"));
        assert_eq!(conn.as_str(), FULL);
    }

    #[test]
    fn test_key_padding_is_preserved() {
        let conn = ConnectionString::parse(FULL).unwrap();
        assert_eq!(conn.shared_access_key.as_deref(), Some("a2V5PQ=="));
    }

    #[test]
    fn test_keys_are_case_insensitive_and_trailing_semicolon_ok() {
        let conn =
            ConnectionString::parse("endpoint=sb://ns.servicebus.windows.net/;ENTITYPATH=hub;")
                .unwrap();
        assert_eq!(conn.host(), "ns.servicebus.windows.net");
        assert_eq!(conn.entity_path(), Some("hub"));
        assert!(!conn.has_shared_access_key());
    }

    #[test]
    fn test_kafka_bootstrap() {
        let conn = ConnectionString::parse(FULL).unwrap();
        assert_eq!(conn.kafka_bootstrap(), "laekning.servicebus.windows.net:9093");
    }

    #[test]
    fn test_empty_connection_string() {
        assert_eq!(
            ConnectionString::parse("  "),
            Err(ConnectionStringError::Empty)
        );
    }

    #[test]
    fn test_missing_endpoint() {
        assert_eq!(
            ConnectionString::parse("SharedAccessKeyName=listen;SharedAccessKey=abc"),
            Err(ConnectionStringError::MissingEndpoint)
        );
    }

    #[test]
    fn test_malformed_segment() {
        let err = ConnectionString::parse("Endpoint=sb://ns.servicebus.windows.net/;garbage")
            .unwrap_err();
        assert_eq!(
            err,
            ConnectionStringError::MalformedSegment("garbage".to_string())
        );
    }

    #[test]
    fn test_invalid_endpoint() {
        let err = ConnectionString::parse("Endpoint=not a url").unwrap_err();
        assert!(matches!(err, ConnectionStringError::InvalidEndpoint(_)));
    }

    #[test]
    fn test_ensure_entity() {
        let conn = ConnectionString::parse(FULL).unwrap();
        assert!(conn.ensure_entity("laekning-events").is_ok());
        let err = conn.ensure_entity("other-hub").unwrap_err();
        assert_eq!(
            err.to_string(),
            "connection string is scoped to event hub 'laekning-events', not 'other-hub'"
        );

        let unscoped = ConnectionString::parse("Endpoint=sb://ns.servicebus.windows.net/").unwrap();
        assert!(unscoped.ensure_entity("anything").is_ok());
    }

    #[test]
    fn test_debug_redacts_key() {
        let conn = ConnectionString::parse(FULL).unwrap();
        let debug = format!("{:?}", conn);
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("a2V5PQ=="));
    }
}
