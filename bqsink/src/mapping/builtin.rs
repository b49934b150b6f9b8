use crate::types::{Cell, EventRecord};

/// Attribute every [`EventRecord`] carries besides its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinAttribute {
    EventId,
    EventName,
    Level,
    FormattedMessage,
    Keywords,
    KeywordsDescription,
    Task,
    TaskName,
    Opcode,
    OpcodeName,
    Timestamp,
    ProcessId,
    ThreadId,
    ProviderId,
    ProviderName,
    Version,
    ActivityId,
    RelatedActivityId,
}

impl BuiltinAttribute {
    pub const ALL: [BuiltinAttribute; 18] = [
        BuiltinAttribute::EventId,
        BuiltinAttribute::EventName,
        BuiltinAttribute::Level,
        BuiltinAttribute::FormattedMessage,
        BuiltinAttribute::Keywords,
        BuiltinAttribute::KeywordsDescription,
        BuiltinAttribute::Task,
        BuiltinAttribute::TaskName,
        BuiltinAttribute::Opcode,
        BuiltinAttribute::OpcodeName,
        BuiltinAttribute::Timestamp,
        BuiltinAttribute::ProcessId,
        BuiltinAttribute::ThreadId,
        BuiltinAttribute::ProviderId,
        BuiltinAttribute::ProviderName,
        BuiltinAttribute::Version,
        BuiltinAttribute::ActivityId,
        BuiltinAttribute::RelatedActivityId,
    ];

    /// Canonical snake_case name, matching the [`EventRecord`] field.
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinAttribute::EventId => "event_id",
            BuiltinAttribute::EventName => "event_name",
            BuiltinAttribute::Level => "level",
            BuiltinAttribute::FormattedMessage => "formatted_message",
            BuiltinAttribute::Keywords => "keywords",
            BuiltinAttribute::KeywordsDescription => "keywords_description",
            BuiltinAttribute::Task => "task",
            BuiltinAttribute::TaskName => "task_name",
            BuiltinAttribute::Opcode => "opcode",
            BuiltinAttribute::OpcodeName => "opcode_name",
            BuiltinAttribute::Timestamp => "timestamp",
            BuiltinAttribute::ProcessId => "process_id",
            BuiltinAttribute::ThreadId => "thread_id",
            BuiltinAttribute::ProviderId => "provider_id",
            BuiltinAttribute::ProviderName => "provider_name",
            BuiltinAttribute::Version => "version",
            BuiltinAttribute::ActivityId => "activity_id",
            BuiltinAttribute::RelatedActivityId => "related_activity_id",
        }
    }

    /// PascalCase alias accepted in schema files, e.g. `EventId`.
    pub fn alias(&self) -> &'static str {
        match self {
            BuiltinAttribute::EventId => "EventId",
            BuiltinAttribute::EventName => "EventName",
            BuiltinAttribute::Level => "Level",
            BuiltinAttribute::FormattedMessage => "FormattedMessage",
            BuiltinAttribute::Keywords => "Keywords",
            BuiltinAttribute::KeywordsDescription => "KeywordsDescription",
            BuiltinAttribute::Task => "Task",
            BuiltinAttribute::TaskName => "TaskName",
            BuiltinAttribute::Opcode => "Opcode",
            BuiltinAttribute::OpcodeName => "OpcodeName",
            BuiltinAttribute::Timestamp => "Timestamp",
            BuiltinAttribute::ProcessId => "ProcessId",
            BuiltinAttribute::ThreadId => "ThreadId",
            BuiltinAttribute::ProviderId => "ProviderId",
            BuiltinAttribute::ProviderName => "ProviderName",
            BuiltinAttribute::Version => "Version",
            BuiltinAttribute::ActivityId => "ActivityId",
            BuiltinAttribute::RelatedActivityId => "RelatedActivityId",
        }
    }

    /// Looks up an attribute by its canonical name or alias, case-sensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|attribute| attribute.name() == name || attribute.alias() == name)
    }

    /// Reads the attribute from `record`. Unset optional strings yield [`Cell::Null`].
    pub fn extract(&self, record: &EventRecord) -> Cell {
        match self {
            BuiltinAttribute::EventId => record.event_id.into(),
            BuiltinAttribute::EventName => record.event_name.clone().into(),
            BuiltinAttribute::Level => Cell::I64(record.level.as_i64()),
            BuiltinAttribute::FormattedMessage => record.formatted_message.clone().into(),
            BuiltinAttribute::Keywords => record.keywords.into(),
            BuiltinAttribute::KeywordsDescription => record.keywords_description.clone().into(),
            BuiltinAttribute::Task => record.task.into(),
            BuiltinAttribute::TaskName => record.task_name.clone().into(),
            BuiltinAttribute::Opcode => record.opcode.into(),
            BuiltinAttribute::OpcodeName => record.opcode_name.clone().into(),
            BuiltinAttribute::Timestamp => Cell::Timestamp(record.timestamp),
            BuiltinAttribute::ProcessId => record.process_id.into(),
            BuiltinAttribute::ThreadId => record.thread_id.into(),
            BuiltinAttribute::ProviderId => Cell::Uuid(record.provider_id),
            BuiltinAttribute::ProviderName => record.provider_name.clone().into(),
            BuiltinAttribute::Version => record.version.into(),
            BuiltinAttribute::ActivityId => Cell::Uuid(record.activity_id),
            BuiltinAttribute::RelatedActivityId => Cell::Uuid(record.related_activity_id),
        }
    }
}
