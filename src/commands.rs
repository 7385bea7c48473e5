//! The inbound log record envelope and the record/intent/value-type tags
//! that route it (spec §6, §4.6).

use crate::records::{DecisionRecord, DrgRecord, ProcessRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    Command,
    Event,
    Rejection,
}

/// The resource kind a record concerns. Doubles as the dispatch key's
/// first component (spec §4.6) and as the event-stream `ValueType` tag
/// (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    ResourceDeletion,
    Process,
    Decision,
    DecisionRequirements,
}

/// The lifecycle phase a record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    /// The inbound command intent (`DeleteResource`).
    Delete,
    Deleting,
    Deleted,
}

/// A generic record envelope (spec §6): `{key, sourceRecordPosition,
/// recordType, intent, valueType, partitionId, distributed, value}`.
#[derive(Debug, Clone)]
pub struct RecordEnvelope<V> {
    pub key: u64,
    pub source_record_position: u64,
    pub record_type: RecordType,
    pub value_type: ValueType,
    pub intent: Intent,
    pub partition_id: u32,
    /// `true` if this record was received from a peer partition rather
    /// than newly authored locally (spec §4.6).
    pub distributed: bool,
    pub value: V,
}

impl<V> RecordEnvelope<V> {
    pub fn is_distributed_command(&self) -> bool {
        self.distributed && self.record_type == RecordType::Command
    }
}

/// Payload of the `DeleteResource` command (spec §6): `{resourceKey: i64}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DeleteResourceCommand {
    pub resource_key: i64,
}

pub type CommandEnvelope = RecordEnvelope<DeleteResourceCommand>;

/// The payload carried by an emitted event (spec §6's "Emitted events"
/// list), tagged by the event's own `value_type`/`intent` on the
/// surrounding [`RecordEnvelope`].
#[derive(Debug, Clone, PartialEq)]
pub enum EventValue {
    ResourceDeletion { resource_key: i64 },
    Process(ProcessRecord),
    Decision(DecisionRecord),
    DecisionRequirements(DrgRecord),
}

pub type EventEnvelope = RecordEnvelope<EventValue>;
