//! Log writers (C3): the three sibling writers that buffer
//! follow-up events, rejections, and the client response for one command.
//!
//! A `StateWriter`/`RejectionWriter`/`ResponseWriter` split into three
//! separate objects from one builder would need interior mutability for
//! no real benefit here — the deletion processor calls them strictly in
//! sequence, never concurrently — so they are implemented as three method
//! groups on a single owner, [`LogWriters`], that the one
//! [`LogWriterBuilder`] produces. On a fully successful command these
//! writers' contents commit alongside the store mutations; on an expected
//! rejection the store mutations alone are rolled back; whatever events
//! had already been appended stay put and a rejection is added alongside
//! them (spec §8 S1, S3) — only an *unexpected* error discards this
//! buffer's contents too, since nothing here is durable until the caller
//! takes it after a successful dispatch.

use crate::commands::{CommandEnvelope, EventEnvelope, EventValue, Intent, RecordType, ValueType};
use crate::rejection::RejectionKind;

/// A durable refusal of a command, written to the log.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectionRecord {
    pub command_key: u64,
    pub resource_key: i64,
    pub kind: RejectionKind,
    pub message: String,
}

/// A best-effort response delivered to the client that submitted the
/// command, buffered until the owning transaction commits.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientResponse {
    Event { key: u64, value_type: ValueType, intent: Intent },
    Rejection { kind: RejectionKind, message: String },
}

/// Builds a fresh [`LogWriters`] bound to one command's partition.
pub struct LogWriterBuilder {
    partition_id: u32,
}

impl LogWriterBuilder {
    pub fn new(partition_id: u32) -> Self {
        Self { partition_id }
    }

    pub fn build(&self) -> LogWriters {
        LogWriters {
            partition_id: self.partition_id,
            events: Vec::new(),
            rejections: Vec::new(),
            response: None,
        }
    }
}

/// Buffers every follow-up event, rejection, and client response for one
/// command. Nothing here is durable until the owning transaction commits;
/// [`Self::take`] is only meaningful after commit.
#[derive(Default)]
pub struct LogWriters {
    partition_id: u32,
    events: Vec<EventEnvelope>,
    rejections: Vec<RejectionRecord>,
    response: Option<ClientResponse>,
}

impl LogWriters {
    // ---- StateWriter ----------------------------------------------------

    /// Appends a follow-up event. Events are the source of truth for
    /// replay: a processor reapplying this event on recovery must
    /// reproduce the identical store mutation the processor made when it
    /// first emitted it.
    pub fn append_follow_up_event(&mut self, key: u64, value_type: ValueType, intent: Intent, value: EventValue) {
        log::debug!("appending follow-up event key={key} value_type={value_type:?} intent={intent:?}");
        self.events.push(EventEnvelope {
            key,
            source_record_position: 0,
            record_type: RecordType::Event,
            value_type,
            intent,
            partition_id: self.partition_id,
            distributed: false,
            value,
        });
    }

    // ---- RejectionWriter -------------------------------------------------

    /// Records a refusal of `command` in the log.
    pub fn append_rejection(&mut self, command: &CommandEnvelope, kind: RejectionKind, human_message: impl Into<String>) {
        let message = human_message.into();
        log::info!("rejecting command key={} kind={kind} message={message}", command.key);
        self.rejections.push(RejectionRecord {
            command_key: command.key,
            resource_key: command.value.resource_key,
            kind,
            message,
        });
    }

    // ---- ResponseWriter ----------------------------------------------------

    pub fn write_event_on_command(&mut self, key: u64, value_type: ValueType, intent: Intent) {
        self.response = Some(ClientResponse::Event { key, value_type, intent });
    }

    pub fn write_rejection_on_command(&mut self, kind: RejectionKind, message: impl Into<String>) {
        self.response = Some(ClientResponse::Rejection { kind, message: message.into() });
    }

    /// Consumes the buffer, returning everything written during this
    /// command. Only call after the owning transaction has committed.
    pub fn take(self) -> (Vec<EventEnvelope>, Vec<RejectionRecord>, Option<ClientResponse>) {
        (self.events, self.rejections, self.response)
    }

    pub fn events(&self) -> &[EventEnvelope] {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::RecordEnvelope;

    fn command(key: u64, resource_key: i64) -> CommandEnvelope {
        RecordEnvelope {
            key,
            source_record_position: 0,
            record_type: RecordType::Command,
            value_type: ValueType::ResourceDeletion,
            intent: Intent::Delete,
            partition_id: 1,
            distributed: false,
            value: crate::commands::DeleteResourceCommand { resource_key },
        }
    }

    #[test]
    fn events_are_buffered_in_append_order() {
        let mut writers = LogWriterBuilder::new(1).build();
        writers.append_follow_up_event(
            10,
            ValueType::ResourceDeletion,
            Intent::Deleting,
            EventValue::ResourceDeletion { resource_key: 42 },
        );
        writers.append_follow_up_event(
            10,
            ValueType::ResourceDeletion,
            Intent::Deleted,
            EventValue::ResourceDeletion { resource_key: 42 },
        );
        let (events, _, _) = writers.take();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].intent, Intent::Deleting);
        assert_eq!(events[1].intent, Intent::Deleted);
    }

    #[test]
    fn rejection_and_response_are_recorded_together() {
        let mut writers = LogWriterBuilder::new(1).build();
        let cmd = command(5, 42);
        writers.append_rejection(&cmd, RejectionKind::NotFound, "no such resource 42");
        writers.write_rejection_on_command(RejectionKind::NotFound, "no such resource 42");
        let (_, rejections, response) = writers.take();
        assert_eq!(rejections.len(), 1);
        assert_eq!(rejections[0].kind, RejectionKind::NotFound);
        assert!(matches!(response, Some(ClientResponse::Rejection { kind: RejectionKind::NotFound, .. })));
    }
}
