use crate::types::{Cell, EventRecord, Payload};

/// Builds an event whose payload holds a single `msg` entry.
pub fn message_event(message: &str) -> EventRecord {
    EventRecord::with_payload(Payload::from_pairs([("msg", Cell::from(message))]))
}

/// Builds one [`message_event`] per message.
pub fn message_events(messages: &[&str]) -> Vec<EventRecord> {
    messages.iter().map(|message| message_event(message)).collect()
}
