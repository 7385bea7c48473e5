//! Processor dispatch (C6): routes an inbound record to the
//! processor registered for its `(value_type, intent)` pair, and decides
//! whether a failure from that processor should produce a rejection (the
//! partition continues) or halt the partition (the failure is unexpected).
//!
//! This crate implements a single processor — resource deletion — so the
//! registered route set has exactly one entry. The `HashSet` it is backed
//! by exists so a second processor can register its own `(value_type,
//! intent)` pairs without changing the dispatch contract.

use crate::columns::ColumnFamily;
use crate::commands::{CommandEnvelope, Intent, ValueType};
use crate::engine::Engine;
use crate::error::{CResult, Error, ErrorClassification};
use crate::kv::transaction::Transaction;
use crate::log_writers::LogWriters;
use std::collections::HashSet;

/// The small capability set a registered processor must implement (spec
/// §4.6, §9 design note): `process_new` for a command authored locally on
/// this partition, `process_distributed` for one replayed from a peer.
/// [`Dispatcher::dispatch`] picks between them itself, from the record
/// envelope's `distributed` flag — callers never make that choice.
pub trait Processor<E: Engine> {
    fn process_new(
        &mut self,
        txn: &mut Transaction<E>,
        writers: &mut LogWriters,
        command: &CommandEnvelope,
    ) -> CResult<()>;

    fn process_distributed(
        &mut self,
        txn: &mut Transaction<E>,
        writers: &mut LogWriters,
        command: &CommandEnvelope,
    ) -> CResult<()>;
}

pub struct DispatcherBuilder {
    routes: HashSet<(ValueType, Intent)>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self { routes: HashSet::new() }
    }

    pub fn route(mut self, value_type: ValueType, intent: Intent) -> Self {
        self.routes.insert((value_type, intent));
        self
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher { routes: self.routes }
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Dispatcher {
    routes: HashSet<(ValueType, Intent)>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    pub fn is_routable(&self, command: &CommandEnvelope) -> bool {
        self.routes.contains(&(command.value_type, command.intent))
    }

    /// Routes `command` to `processor`, calling [`Processor::process_new`]
    /// or [`Processor::process_distributed`] according to the record
    /// envelope's `distributed` attribute (spec §4.6) — the dispatcher
    /// makes this choice itself, not the caller. On success, commits `txn`
    /// and returns the touched `(column, key)` pairs for cache
    /// invalidation. On an expected failure, aborts `txn` (discarding the
    /// store mutations) but keeps whatever follow-up events the processor
    /// had already buffered — they describe steps that genuinely ran
    /// before the rejection — and adds a rejection alongside them; the
    /// command is considered handled, not failed. An unexpected failure
    /// aborts `txn` and propagates, which is this crate's signal to the
    /// caller to halt the partition.
    pub fn dispatch<E: Engine>(
        &self,
        mut txn: Transaction<E>,
        writers: &mut LogWriters,
        command: &CommandEnvelope,
        processor: &mut dyn Processor<E>,
    ) -> CResult<Vec<(ColumnFamily, Vec<u8>)>> {
        if !self.is_routable(command) {
            txn.abort();
            return Err(Error::UnroutableCommand(command.value_type, command.intent));
        }
        let result = if command.is_distributed_command() {
            processor.process_distributed(&mut txn, writers, command)
        } else {
            processor.process_new(&mut txn, writers, command)
        };
        match result {
            Ok(()) => txn.commit(),
            Err(err) => self.try_handle_error(txn, writers, command, err).map(|()| Vec::new()),
        }
    }

    fn try_handle_error<E: Engine>(
        &self,
        txn: Transaction<E>,
        writers: &mut LogWriters,
        command: &CommandEnvelope,
        err: Error,
    ) -> CResult<()> {
        txn.abort();
        match err.classify() {
            ErrorClassification::Expected => {
                log::info!("command {} rejected: {err}", command.key);
                // The events buffered so far (e.g. the outer `DELETING`,
                // and for a blocked process its own `Process:DELETING`)
                // already happened and stay in the log alongside the
                // rejection (spec §8 S1, S3) — only the KV transaction's
                // store mutations are rolled back above.
                let kind = err.rejection_kind().expect("expected errors carry a rejection kind");
                writers.append_rejection(command, kind, err.to_string());
                writers.write_rejection_on_command(kind, err.to_string());
                Ok(())
            }
            ErrorClassification::Unexpected => {
                log::error!("command {} failed fatally: {err}", command.key);
                Err(err)
            }
        }
    }
}
