//! The deletion processor (C5, spec §4.5): classifies a resource key as a
//! process or a decision requirements graph and deletes it, emitting the
//! bracketing `ResourceDeletion` events and (for a DRG) the child
//! `Decision`/`DecisionRequirements` events in between.
//!
//! Two entry points share this logic: [`DeletionProcessor::process_new_command`]
//! for a command authored locally, and
//! [`DeletionProcessor::process_distributed_command`] for one replayed from
//! a peer partition. They differ only in event-key allocation and in what
//! happens after the deletion succeeds — a fresh command distributes to
//! peers and answers the client; a distributed one only acknowledges back
//! to its originator.

use crate::commands::{CommandEnvelope, EventValue, Intent, ValueType};
use crate::dispatch::Processor;
use crate::distribution::{Clock, CommandDistributor, PeerTransport};
use crate::engine::Engine;
use crate::error::{CResult, Error};
use crate::kv::transaction::Transaction;
use crate::log_writers::LogWriters;
use crate::records::{DecisionRecord, DrgRecord, ProcessRecord};
use crate::store::ResourceStateStore;
use std::sync::atomic::{AtomicU64, Ordering};

/// External predicate the host runtime supplies (spec §4.5): whether a
/// process definition still has running instances. Out of this crate's
/// scope to compute, same as [`PeerTransport`] for distribution.
pub trait ActiveInstanceChecker {
    fn has_active_process_instances(&mut self, process_key: i64) -> CResult<bool>;
}

/// What a resource key turned out to be, resolved once up front so the
/// deletion step and the bracketing events agree on it.
enum Classification {
    Process(ProcessRecord),
    Drg(DrgRecord, Vec<DecisionRecord>),
    NotFound,
}

fn classify<E: Engine>(
    store: &mut ResourceStateStore,
    txn: &mut Transaction<E>,
    resource_key: i64,
) -> CResult<Classification> {
    if let Some(process) = store.get_process_by_key(txn, resource_key)? {
        return Ok(Classification::Process(process));
    }
    if let Some(drg) = store.find_drg_by_key(txn, resource_key)? {
        let decisions = store.find_decisions_by_drg_key(txn, drg.drg_key)?;
        return Ok(Classification::Drg(drg, decisions));
    }
    Ok(Classification::NotFound)
}

/// Allocates event keys for follow-up records within one partition.
/// Monotonic and process-local; the actual uniqueness guarantee comes from
/// pairing it with the partition id the way `partition_id` already tags
/// every [`crate::commands::RecordEnvelope`].
pub struct EventKeySequence {
    next: AtomicU64,
}

impl EventKeySequence {
    pub fn starting_at(first: u64) -> Self {
        Self { next: AtomicU64::new(first) }
    }

    pub fn next_key(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

pub struct DeletionProcessor<'a> {
    store: &'a mut ResourceStateStore,
    distributor: &'a CommandDistributor,
    keys: &'a EventKeySequence,
}

impl<'a> DeletionProcessor<'a> {
    pub fn new(store: &'a mut ResourceStateStore, distributor: &'a CommandDistributor, keys: &'a EventKeySequence) -> Self {
        Self { store, distributor, keys }
    }

    /// Deletes the resource and appends every bracketing/child event, but
    /// does not decide what happens to the command afterward — that is
    /// the two callers' job, since a new command distributes and answers
    /// the client while a distributed one only acknowledges.
    fn delete_and_emit_events<E: Engine>(
        &mut self,
        txn: &mut Transaction<E>,
        checker: &mut dyn ActiveInstanceChecker,
        writers: &mut LogWriters,
        resource_key: i64,
        outer_key: u64,
    ) -> CResult<()> {
        writers.append_follow_up_event(
            outer_key,
            ValueType::ResourceDeletion,
            Intent::Deleting,
            EventValue::ResourceDeletion { resource_key },
        );

        match classify(self.store, txn, resource_key)? {
            Classification::Process(process) => {
                let child_key = self.keys.next_key();
                writers.append_follow_up_event(
                    child_key,
                    ValueType::Process,
                    Intent::Deleting,
                    EventValue::Process(process.without_resource()),
                );
                if checker.has_active_process_instances(process.key)? {
                    return Err(Error::ActiveProcessInstances(resource_key));
                }
                self.store.delete_process(txn, &process)?;
                writers.append_follow_up_event(
                    child_key,
                    ValueType::Process,
                    Intent::Deleted,
                    EventValue::Process(process.without_resource()),
                );
            }
            Classification::Drg(drg, decisions) => {
                // Children are deleted and announced before the DRG they
                // belong to (spec §4.5) — a replaying processor must never
                // observe a DRG removed while one of its decisions is
                // still live. Unlike the process path, decisions and the
                // DRG itself only ever announce `DELETED` — there is no
                // `DELETING` half for them.
                for decision in &decisions {
                    self.store.delete_decision(txn, decision)?;
                    writers.append_follow_up_event(
                        self.keys.next_key(),
                        ValueType::Decision,
                        Intent::Deleted,
                        EventValue::Decision(decision.clone()),
                    );
                }
                self.store.delete_drg(txn, &drg)?;
                writers.append_follow_up_event(
                    self.keys.next_key(),
                    ValueType::DecisionRequirements,
                    Intent::Deleted,
                    EventValue::DecisionRequirements(drg),
                );
            }
            Classification::NotFound => return Err(Error::NoSuchResource(resource_key)),
        }

        writers.append_follow_up_event(
            outer_key,
            ValueType::ResourceDeletion,
            Intent::Deleted,
            EventValue::ResourceDeletion { resource_key },
        );
        Ok(())
    }

    /// The new-command path (spec §4.5): allocates a fresh event key,
    /// deletes and brackets the events, answers the client, then fans the
    /// command out to every peer partition.
    #[allow(clippy::too_many_arguments)]
    pub fn process_new_command<E: Engine>(
        &mut self,
        txn: &mut Transaction<E>,
        checker: &mut dyn ActiveInstanceChecker,
        writers: &mut LogWriters,
        transport: &mut dyn PeerTransport,
        clock: &dyn Clock,
        peers: &[u32],
        command: &CommandEnvelope,
    ) -> CResult<()> {
        let outer_key = self.keys.next_key();
        self.delete_and_emit_events(txn, checker, writers, command.value.resource_key, outer_key)?;
        // Step 6 echoes DELETING, not the DELETED that was just emitted
        // (spec §4.5).
        writers.write_event_on_command(outer_key, ValueType::ResourceDeletion, Intent::Deleting);
        self.distributor.distribute_command(txn, clock, transport, command.key, command, peers)?;
        Ok(())
    }

    /// The distributed-command path (spec §4.5): reuses the incoming
    /// record key instead of allocating a new one, and acknowledges the
    /// originator instead of writing a client response.
    pub fn process_distributed_command<E: Engine>(
        &mut self,
        txn: &mut Transaction<E>,
        checker: &mut dyn ActiveInstanceChecker,
        writers: &mut LogWriters,
        transport: &mut dyn PeerTransport,
        command: &CommandEnvelope,
    ) -> CResult<()> {
        self.delete_and_emit_events(txn, checker, writers, command.value.resource_key, command.key)?;
        self.distributor.acknowledge_command(transport, command.partition_id, command.key)?;
        Ok(())
    }
}

/// Binds a [`DeletionProcessor`] together with the collaborators a command
/// needs (the active-instance predicate, the peer transport, a clock, and
/// the peer set) so the pair can be driven through
/// [`crate::dispatch::Dispatcher::dispatch`], which picks
/// `process_new_command` vs `process_distributed_command` itself from the
/// record envelope rather than leaving that choice to the caller (spec
/// §4.6).
pub struct DeletionProcessorBinding<'a, 'b> {
    pub processor: DeletionProcessor<'a>,
    pub checker: &'b mut dyn ActiveInstanceChecker,
    pub transport: &'b mut dyn PeerTransport,
    pub clock: &'b dyn Clock,
    pub peers: &'b [u32],
}

impl<'a, 'b, E: Engine> Processor<E> for DeletionProcessorBinding<'a, 'b> {
    fn process_new(&mut self, txn: &mut Transaction<E>, writers: &mut LogWriters, command: &CommandEnvelope) -> CResult<()> {
        self.processor.process_new_command(
            txn,
            self.checker,
            writers,
            self.transport,
            self.clock,
            self.peers,
            command,
        )
    }

    fn process_distributed(&mut self, txn: &mut Transaction<E>, writers: &mut LogWriters, command: &CommandEnvelope) -> CResult<()> {
        self.processor.process_distributed_command(txn, self.checker, writers, self.transport, command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{DeleteResourceCommand, RecordEnvelope, RecordType};
    use crate::distribution::SystemClock;
    use crate::engine::memory::MemoryEngine;
    use crate::log_writers::LogWriterBuilder;
    use serde_bytes::ByteBuf;
    use std::cell::RefCell;

    struct AlwaysInactive;
    impl ActiveInstanceChecker for AlwaysInactive {
        fn has_active_process_instances(&mut self, _process_key: i64) -> CResult<bool> {
            Ok(false)
        }
    }

    struct AlwaysActive;
    impl ActiveInstanceChecker for AlwaysActive {
        fn has_active_process_instances(&mut self, _process_key: i64) -> CResult<bool> {
            Ok(true)
        }
    }

    #[derive(Default)]
    struct NullTransport {
        acks: RefCell<Vec<(u32, u64)>>,
    }
    impl PeerTransport for NullTransport {
        fn send_distributed_command(&mut self, _target_partition: u32, _key: u64, _command: &CommandEnvelope) -> CResult<()> {
            Ok(())
        }
        fn send_acknowledgement(&mut self, originating_partition: u32, key: u64) -> CResult<()> {
            self.acks.borrow_mut().push((originating_partition, key));
            Ok(())
        }
    }

    fn command(key: u64, resource_key: i64, distributed: bool) -> CommandEnvelope {
        RecordEnvelope {
            key,
            source_record_position: 0,
            record_type: RecordType::Command,
            value_type: ValueType::ResourceDeletion,
            intent: Intent::Delete,
            partition_id: 0,
            distributed,
            value: DeleteResourceCommand { resource_key },
        }
    }

    fn seed_process(store: &mut ResourceStateStore, txn: &mut Transaction<MemoryEngine>, key: i64) {
        store
            .store_process(
                txn,
                &ProcessRecord {
                    bpmn_process_id: "order-process".into(),
                    version: 1,
                    key,
                    resource_name: "order.bpmn".into(),
                    state: crate::records::ProcessState::Active,
                    checksum: Some(ByteBuf::from(vec![1])),
                    resource: Some(ByteBuf::from(vec![2])),
                },
            )
            .unwrap();
    }

    #[test]
    fn deleting_unknown_resource_raises_not_found() {
        let mut engine = MemoryEngine::new();
        let mut store = ResourceStateStore::new();
        let distributor = CommandDistributor::new();
        let keys = EventKeySequence::starting_at(1);
        let mut processor = DeletionProcessor::new(&mut store, &distributor, &keys);
        let mut checker = AlwaysInactive;
        let mut writers = LogWriterBuilder::new(0).build();
        let mut transport = NullTransport::default();
        let mut txn = Transaction::new(&mut engine);

        let err = processor
            .process_new_command(&mut txn, &mut checker, &mut writers, &mut transport, &SystemClock, &[], &command(1, 999, false))
            .unwrap_err();
        assert!(matches!(err, Error::NoSuchResource(999)));
    }

    #[test]
    fn deleting_inactive_process_emits_bracketed_events_and_distributes() {
        let mut engine = MemoryEngine::new();
        let mut store = ResourceStateStore::new();
        let distributor = CommandDistributor::new();
        let keys = EventKeySequence::starting_at(1);
        let mut checker = AlwaysInactive;
        let mut writers = LogWriterBuilder::new(0).build();
        let mut transport = NullTransport::default();

        {
            let mut txn = Transaction::new(&mut engine);
            seed_process(&mut store, &mut txn, 100);
            txn.commit().unwrap();
        }

        let mut txn = Transaction::new(&mut engine);
        let mut processor = DeletionProcessor::new(&mut store, &distributor, &keys);
        processor
            .process_new_command(&mut txn, &mut checker, &mut writers, &mut transport, &SystemClock, &[1, 2], &command(1, 100, false))
            .unwrap();
        txn.commit().unwrap();

        let events = writers.events();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].intent, Intent::Deleting);
        assert_eq!(events[0].value_type, ValueType::ResourceDeletion);
        assert_eq!(events[1].value_type, ValueType::Process);
        assert_eq!(events[1].intent, Intent::Deleting);
        assert_eq!(events[2].value_type, ValueType::Process);
        assert_eq!(events[2].intent, Intent::Deleted);
        assert_eq!(events[3].value_type, ValueType::ResourceDeletion);
        assert_eq!(events[3].intent, Intent::Deleted);
    }

    #[test]
    fn deleting_active_process_raises_active_process_instances_and_keeps_process() {
        let mut engine = MemoryEngine::new();
        let mut store = ResourceStateStore::new();
        let distributor = CommandDistributor::new();
        let keys = EventKeySequence::starting_at(1);
        let mut checker = AlwaysActive;
        let mut writers = LogWriterBuilder::new(0).build();
        let mut transport = NullTransport::default();

        {
            let mut txn = Transaction::new(&mut engine);
            seed_process(&mut store, &mut txn, 100);
            txn.commit().unwrap();
        }

        let mut txn = Transaction::new(&mut engine);
        let mut processor = DeletionProcessor::new(&mut store, &distributor, &keys);
        let err = processor
            .process_new_command(&mut txn, &mut checker, &mut writers, &mut transport, &SystemClock, &[], &command(1, 100, false))
            .unwrap_err();
        assert!(matches!(err, Error::ActiveProcessInstances(100)));
        assert!(matches!(err.classify(), crate::error::ErrorClassification::Expected));
        assert_eq!(store.get_process_by_key(&mut txn, 100).unwrap().map(|p| p.key), Some(100));
    }

    #[test]
    fn distributed_command_acknowledges_originator_instead_of_answering_client() {
        let mut engine = MemoryEngine::new();
        let mut store = ResourceStateStore::new();
        let distributor = CommandDistributor::new();
        let keys = EventKeySequence::starting_at(1);
        let mut checker = AlwaysInactive;
        let mut writers = LogWriterBuilder::new(0).build();
        let mut transport = NullTransport::default();

        {
            let mut txn = Transaction::new(&mut engine);
            seed_process(&mut store, &mut txn, 100);
            txn.commit().unwrap();
        }

        let mut txn = Transaction::new(&mut engine);
        let mut processor = DeletionProcessor::new(&mut store, &distributor, &keys);
        let incoming = command(55, 100, true);
        processor
            .process_distributed_command(&mut txn, &mut checker, &mut writers, &mut transport, &incoming)
            .unwrap();
        txn.commit().unwrap();

        assert_eq!(*transport.acks.borrow(), vec![(0, 55)]);
        let (_, _, response) = writers.take();
        assert!(response.is_none());
    }

    #[test]
    fn deleting_drg_removes_its_decisions_first_then_the_drg() {
        use crate::records::{DecisionRecord, DrgRecord};

        let mut engine = MemoryEngine::new();
        let mut store = ResourceStateStore::new();
        let distributor = CommandDistributor::new();
        let keys = EventKeySequence::starting_at(1);
        let mut checker = AlwaysInactive;
        let mut writers = LogWriterBuilder::new(0).build();
        let mut transport = NullTransport::default();

        {
            let mut txn = Transaction::new(&mut engine);
            store
                .store_drg(
                    &mut txn,
                    &DrgRecord {
                        drg_id: "D".into(),
                        drg_name: "Decide".into(),
                        drg_version: 1,
                        drg_key: 7,
                        resource_name: "decide.dmn".into(),
                        checksum: ByteBuf::from(vec![9]),
                        resource: ByteBuf::from(vec![9, 9]),
                    },
                )
                .unwrap();
            for (decision_key, decision_id) in [(70, "A"), (71, "B")] {
                store
                    .store_decision(
                        &mut txn,
                        &DecisionRecord {
                            decision_id: decision_id.into(),
                            decision_name: "Decide".into(),
                            version: 1,
                            decision_key,
                            drg_id: "D".into(),
                            drg_key: 7,
                        },
                    )
                    .unwrap();
            }
            txn.commit().unwrap();
        }

        let mut txn = Transaction::new(&mut engine);
        let mut processor = DeletionProcessor::new(&mut store, &distributor, &keys);
        processor
            .process_new_command(&mut txn, &mut checker, &mut writers, &mut transport, &SystemClock, &[], &command(1, 7, false))
            .unwrap();
        txn.commit().unwrap();

        let events = writers.events();
        assert_eq!(events.len(), 5);
        assert_eq!(events[0].value_type, ValueType::ResourceDeletion);
        assert_eq!(events[0].intent, Intent::Deleting);
        assert_eq!(events[1].value_type, ValueType::Decision);
        assert_eq!(events[1].intent, Intent::Deleted);
        assert_eq!(events[2].value_type, ValueType::Decision);
        assert_eq!(events[2].intent, Intent::Deleted);
        assert_eq!(events[3].value_type, ValueType::DecisionRequirements);
        assert_eq!(events[3].intent, Intent::Deleted);
        assert_eq!(events[4].value_type, ValueType::ResourceDeletion);
        assert_eq!(events[4].intent, Intent::Deleted);

        let mut verify_txn = Transaction::new(&mut engine);
        assert!(store.find_drg_by_key(&mut verify_txn, 7).unwrap().is_none());
        assert!(store.find_decisions_by_drg_key(&mut verify_txn, 7).unwrap().is_empty());
    }
}
