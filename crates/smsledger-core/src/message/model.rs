//! Message data models.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};

/// Spam verdict for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Classification {
    /// Unwanted message.
    Spam,
    /// Legitimate message.
    Ham,
    /// Not classified yet. Never persisted.
    #[default]
    Unset,
}

impl Classification {
    /// Parse from database string representation.
    ///
    /// Anything other than a known verdict is treated as unresolved.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "SPAM" => Self::Spam,
            "HAM" => Self::Ham,
            _ => Self::Unset,
        }
    }

    /// Convert to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Spam => "SPAM",
            Self::Ham => "HAM",
            Self::Unset => "UNSET",
        }
    }

    /// Returns `true` for SPAM or HAM.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unset)
    }

    /// Returns `true` if this is SPAM.
    #[must_use]
    pub const fn is_spam(&self) -> bool {
        matches!(self, Self::Spam)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Classification {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// Stable logical identifier of a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    /// Create an identifier from a source-provided value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive an identifier from sender and receipt time.
    ///
    /// Used when the event source supplies no native identifier.
    #[must_use]
    pub fn derive(address: &str, date: i64) -> Self {
        Self(format!("{address}-{date}"))
    }

    /// Derive an identifier for an undated message from sender and text.
    ///
    /// The `h` prefix keeps these apart from date-derived identifiers.
    #[must_use]
    pub fn derive_undated(address: &str, body: &str) -> Self {
        use fmt::Write as _;

        let digest = Sha256::digest(body.as_bytes());
        let mut id = format!("{address}-h");
        for byte in &digest[..8] {
            let _ = write!(id, "{byte:02x}");
        }
        Self(id)
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A classified SMS, the durable unit of record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Logical identifier, unique across the store.
    pub id: MessageId,
    /// Sender phone number or short code.
    pub address: String,
    /// Message text (may be empty).
    pub body: String,
    /// Receipt time in epoch milliseconds.
    pub date: i64,
    /// Spam verdict.
    pub classification: Classification,
    /// Whether the user has read the message.
    pub read: bool,
}

impl Message {
    /// Returns this message with the given classification.
    #[must_use]
    pub fn with_classification(mut self, classification: Classification) -> Self {
        self.classification = classification;
        self
    }

    /// Returns `true` once a SPAM/HAM verdict has been assigned.
    #[must_use]
    pub const fn is_classified(&self) -> bool {
        self.classification.is_resolved()
    }
}

/// Which input feed delivered an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    /// One-shot bulk listing of the existing inbox.
    Backfill,
    /// Live push stream of newly received messages.
    Live,
}

impl Feed {
    /// Name used in logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Backfill => "backfill",
            Self::Live => "live",
        }
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw message event as delivered by an event source.
///
/// Both feeds are normalised to this shape. Field aliases accept the
/// listener variant (`originatingAddress`, `messageBody`, `timestamp`) and the
/// inbox listing variant (`_id`), where ids and read flags may be numeric.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Sender identifier.
    #[serde(default, alias = "originatingAddress")]
    pub address: Option<String>,
    /// Message text.
    #[serde(default, alias = "messageBody")]
    pub body: Option<String>,
    /// Receipt time in epoch milliseconds.
    #[serde(default, alias = "timestamp")]
    pub date: Option<i64>,
    /// Source-native identifier, if the source has one.
    #[serde(default, alias = "_id", deserialize_with = "string_or_number")]
    pub native_id: Option<String>,
    /// Read flag reported by the source.
    #[serde(default, deserialize_with = "bool_or_number")]
    pub read: bool,
}

impl RawEvent {
    /// Create an event with sender, body, and date.
    #[must_use]
    pub fn new(address: impl Into<String>, body: impl Into<String>, date: i64) -> Self {
        Self {
            address: Some(address.into()),
            body: Some(body.into()),
            date: Some(date),
            native_id: None,
            read: false,
        }
    }

    /// Attach a source-native identifier.
    #[must_use]
    pub fn with_native_id(mut self, id: impl Into<String>) -> Self {
        self.native_id = Some(id.into());
        self
    }

    /// Canonical identifier: the native id when present, else `address-date`.
    ///
    /// Undated events are keyed by sender and a digest of the text, so every
    /// redelivery maps to the same identifier.
    #[must_use]
    pub fn message_id(&self) -> MessageId {
        if let Some(id) = self.native_id.as_deref().filter(|id| !id.is_empty()) {
            return MessageId::new(id);
        }

        let address = self.address.as_deref().unwrap_or_default();
        match self.date {
            Some(date) => MessageId::derive(address, date),
            None => MessageId::derive_undated(address, self.body.as_deref().unwrap_or_default()),
        }
    }

    /// Build the unclassified working record.
    ///
    /// `now_millis` stamps the date of events that arrived without one; it
    /// never feeds into the identifier.
    #[must_use]
    pub fn into_message(self, now_millis: i64) -> Message {
        let id = self.message_id();
        let date = self.date.unwrap_or(now_millis);
        Message {
            id,
            address: self.address.unwrap_or_default(),
            body: self.body.unwrap_or_default(),
            date,
            classification: Classification::Unset,
            read: self.read,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(i64),
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<StringOrNumber>::deserialize(deserializer)?.map(|value| match value {
            StringOrNumber::String(s) => s,
            StringOrNumber::Number(n) => n.to_string(),
        }),
    )
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoolOrNumber {
    Bool(bool),
    Number(i64),
}

fn bool_or_number<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<BoolOrNumber>::deserialize(deserializer)? {
        Some(BoolOrNumber::Bool(b)) => b,
        Some(BoolOrNumber::Number(n)) => n != 0,
        None => false,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_parse() {
        assert_eq!(Classification::parse("SPAM"), Classification::Spam);
        assert_eq!(Classification::parse("ham"), Classification::Ham);
        assert_eq!(Classification::parse(""), Classification::Unset);
        assert_eq!(Classification::parse("maybe"), Classification::Unset);
        assert!(!Classification::Unset.is_resolved());
    }

    #[test]
    fn test_derived_id() {
        let event = RawEvent::new("+15550001", "hello", 1_700_000_000_000);
        assert_eq!(
            event.message_id().as_str(),
            "+15550001-1700000000000"
        );
    }

    #[test]
    fn test_native_id_wins() {
        let event = RawEvent::new("+15550001", "hello", 42).with_native_id("981");
        assert_eq!(event.message_id().as_str(), "981");

        let empty = RawEvent::new("+15550001", "hello", 42).with_native_id("");
        assert_eq!(empty.message_id().as_str(), "+15550001-42");
    }

    #[test]
    fn test_missing_date_uses_now() {
        let event = RawEvent {
            address: Some("ACME".into()),
            body: None,
            ..RawEvent::default()
        };
        let message = event.into_message(5_000);
        assert_eq!(message.date, 5_000);
        assert_eq!(message.id, MessageId::derive_undated("ACME", ""));
        assert_eq!(message.body, "");
        assert_eq!(message.classification, Classification::Unset);
    }

    #[test]
    fn test_undated_id_stable_across_deliveries() {
        let event = RawEvent {
            address: Some("BANK".into()),
            body: Some("otp 1".into()),
            ..RawEvent::default()
        };

        let first = event.clone().into_message(1_000);
        let second = event.into_message(2_000);
        assert_eq!(first.id, second.id);
        assert_ne!(first.date, second.date);
        assert!(first.id.as_str().starts_with("BANK-h"));
        assert_eq!(first.id.as_str().len(), "BANK-h".len() + 16);

        let other = RawEvent {
            address: Some("BANK".into()),
            body: Some("otp 2".into()),
            ..RawEvent::default()
        };
        assert_ne!(other.message_id(), first.id);
    }

    #[test]
    fn test_deserialize_listener_variant() {
        let json = r#"{"originatingAddress":"+1555","messageBody":"hi","timestamp":17}"#;
        let event: RawEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.address.as_deref(), Some("+1555"));
        assert_eq!(event.body.as_deref(), Some("hi"));
        assert_eq!(event.date, Some(17));
        assert!(event.native_id.is_none());
    }

    #[test]
    fn test_deserialize_inbox_variant() {
        let json = r#"{"_id":1234,"address":"BANK","body":"code 1","date":99,"read":1}"#;
        let event: RawEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.native_id.as_deref(), Some("1234"));
        assert!(event.read);
    }

    #[test]
    fn test_message_serializes_uppercase_verdict() {
        let message = RawEvent::new("A", "b", 1)
            .into_message(0)
            .with_classification(Classification::Spam);
        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains(r#""classification":"SPAM""#));
    }
}
