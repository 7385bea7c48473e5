//! Command distribution (C4): deterministic fan-out of a locally applied
//! command to every peer partition, with idempotent application and
//! acknowledgement tracking so the exactly-once contract holds across
//! restarts.

use crate::columns::ColumnFamily;
use crate::commands::CommandEnvelope;
use crate::engine::Engine;
use crate::error::CResult;
use crate::kv::column_family::ColumnFamilyHandle;
use crate::kv::key::KeyEncode;
use crate::kv::transaction::Transaction;
use serde::{Deserialize, Serialize};

/// The RPC transport is an external collaborator; this is the narrow
/// interface the distributor consumes from it.
pub trait PeerTransport {
    /// Sends `command` (already applied locally, keyed by `key`) to
    /// `target_partition`. May fail transiently — failures are retried by
    /// [`CommandDistributor::retry_pending`], never surfaced to the
    /// command.
    fn send_distributed_command(&mut self, target_partition: u32, key: u64, command: &CommandEnvelope) -> CResult<()>;

    /// Sends an acknowledgement back to `originating_partition` after a
    /// peer applies a distributed command.
    fn send_acknowledgement(&mut self, originating_partition: u32, key: u64) -> CResult<()>;
}

/// Abstracts wall-clock access so retry backoff is testable without
/// sleeping; production callers use [`SystemClock`].
pub trait Clock {
    fn now_millis(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system clock is after the epoch")
            .as_millis() as u64
    }
}

/// One peer's outstanding delivery: `{commandKey, targetPartition,
/// retryCount, lastAttemptAt}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PendingDistribution {
    pub command_key: u64,
    pub target_partition: u32,
    pub retry_count: u32,
    pub last_attempt_at_millis: u64,
}

const INITIAL_BACKOFF_MILLIS: u64 = 100;
const MAX_BACKOFF_MILLIS: u64 = 30_000;

fn backoff_millis(retry_count: u32) -> u64 {
    INITIAL_BACKOFF_MILLIS.saturating_mul(1u64 << retry_count.min(16)).min(MAX_BACKOFF_MILLIS)
}

/// Derives the peer set for distribution: every partition except the
/// originator, in ascending order. A pure function of stable partition
/// metadata, never wall time — so two replicas computing it for the same
/// command always agree.
pub fn peers_for(own_partition: u32, partition_count: u32) -> Vec<u32> {
    (0..partition_count).filter(|p| *p != own_partition).collect()
}

pub struct CommandDistributor {
    pending: ColumnFamilyHandle<(i64, i64), PendingDistribution>,
}

impl Default for CommandDistributor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandDistributor {
    pub fn new() -> Self {
        Self { pending: ColumnFamilyHandle::new(ColumnFamily::PendingDistribution) }
    }

    fn pending_key(command_key: u64, target_partition: u32) -> (i64, i64) {
        (command_key as i64, target_partition as i64)
    }

    /// Schedules one copy of `command` per peer partition. Persists a
    /// pending-ack record for each peer regardless of whether the initial
    /// send succeeds, so a failed send is simply picked up by
    /// [`Self::retry_pending`] rather than silently lost.
    pub fn distribute_command<E: Engine>(
        &self,
        txn: &mut Transaction<E>,
        clock: &dyn Clock,
        transport: &mut dyn PeerTransport,
        key: u64,
        command: &CommandEnvelope,
        peers: &[u32],
    ) -> CResult<()> {
        let now = clock.now_millis();
        for &peer in peers {
            let record = PendingDistribution {
                command_key: key,
                target_partition: peer,
                retry_count: 0,
                last_attempt_at_millis: now,
            };
            self.pending.put(txn, &Self::pending_key(key, peer), &record)?;
            if let Err(err) = transport.send_distributed_command(peer, key, command) {
                log::warn!("initial send of command {key} to partition {peer} failed: {err}, will retry");
            }
        }
        Ok(())
    }

    /// Called by a peer after it applies a distributed command, keyed by
    /// the same `key` the originator used.
    pub fn acknowledge_command<E: Engine>(
        &self,
        transport: &mut dyn PeerTransport,
        originating_partition: u32,
        key: u64,
    ) -> CResult<()> {
        transport.send_acknowledgement(originating_partition, key)
    }

    /// The originator calls this once a peer's ack arrives, clearing that
    /// peer's pending record.
    pub fn record_acknowledgement<E: Engine>(
        &self,
        txn: &mut Transaction<E>,
        key: u64,
        from_partition: u32,
    ) -> CResult<()> {
        let pk = Self::pending_key(key, from_partition);
        if self.pending.get(txn, &pk)?.is_some() {
            txn.delete(ColumnFamily::PendingDistribution, &pk.encode()?);
        }
        Ok(())
    }

    /// `true` if any peer has not yet acknowledged `key`.
    pub fn has_pending<E: Engine>(&self, txn: &mut Transaction<E>, key: u64) -> CResult<bool> {
        let mut any = false;
        let prefix = (key as i64).encode()?;
        txn.scan_prefix(ColumnFamily::PendingDistribution, &prefix, &mut |_k, _v| {
            any = true;
            false
        })?;
        Ok(any)
    }

    /// Resends every pending record whose backoff window has elapsed,
    /// bumping its retry count. Driven by an external timer — the
    /// partition actor itself never blocks waiting for acks.
    pub fn retry_pending<E: Engine>(
        &self,
        txn: &mut Transaction<E>,
        clock: &dyn Clock,
        transport: &mut dyn PeerTransport,
        command_key: u64,
        command: &CommandEnvelope,
    ) -> CResult<()> {
        let prefix = (command_key as i64).encode()?;
        let mut due = Vec::new();
        self.pending.scan_prefix(txn, &prefix, |_k, record| {
            due.push(record);
            true
        })?;
        let now = clock.now_millis();
        for mut record in due {
            let elapsed = now.saturating_sub(record.last_attempt_at_millis);
            if elapsed < backoff_millis(record.retry_count) {
                continue;
            }
            record.retry_count = record.retry_count.saturating_add(1);
            record.last_attempt_at_millis = now;
            self.pending
                .put(txn, &Self::pending_key(command_key, record.target_partition), &record)?;
            if let Err(err) = transport.send_distributed_command(record.target_partition, command_key, command) {
                log::warn!(
                    "retry {} of command {command_key} to partition {} failed: {err}",
                    record.retry_count,
                    record.target_partition
                );
            }
        }
        Ok(())
    }
}
