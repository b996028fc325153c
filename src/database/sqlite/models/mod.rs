
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Format of the `timestamp` column, in UTC
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Separator used to store source document names in a single column
pub const SOURCE_NAME_SEPARATOR: &str = ", ";

/// One answered question, as stored in the conversation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: i64,
    pub name: String,
    pub timestamp: String,
    pub question: String,
    pub answer: String,
    pub source_document_names: Vec<String>,
}

impl ConversationRecord {
    /// Parse the stored timestamp; `None` for rows written by other tools
    #[inline]
    pub fn parsed_timestamp(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.timestamp, TIMESTAMP_FORMAT).ok()
    }

    /// The stored UTC timestamp converted to the local time zone
    #[inline]
    pub fn local_timestamp(&self) -> Option<DateTime<Local>> {
        self.parsed_timestamp()
            .map(|naive| Utc.from_utc_datetime(&naive).with_timezone(&Local))
    }

    #[inline]
    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id,
            name: self.name.clone(),
            timestamp: self.timestamp.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: i64,
    pub name: String,
    pub timestamp: String,
}

impl std::fmt::Display for ConversationSummary {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {} UTC", self.name, self.timestamp)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConversation {
    pub question: String,
    pub answer: String,
    pub source_document_names: Vec<String>,
}

#[inline]
pub fn join_source_names(names: &[String]) -> String {
    names.join(SOURCE_NAME_SEPARATOR)
}

#[inline]
pub fn split_source_names(stored: &str) -> Vec<String> {
    if stored.is_empty() {
        return Vec::new();
    }
    stored
        .split(SOURCE_NAME_SEPARATOR)
        .map(ToString::to_string)
        .collect()
}
