//! The Resource State Store (C2, spec §4.2): the column families for
//! processes, decisions, and DRGs, their latest-version indexes, and the
//! read-through cache fronting the hot lookups.

pub mod cache;

use crate::columns::ColumnFamily;
use crate::engine::Engine;
use crate::error::CResult;
use crate::kv::column_family::ColumnFamilyHandle;
use crate::kv::key::ForeignKey;
use crate::kv::transaction::Transaction;
use crate::records::{DecisionRecord, DrgRecord, ProcessRecord};
use cache::ReadThroughCache;

/// Returns the key of the row with the highest remaining version under
/// `id`, or `None` if no version remains — the core of the latest-version
/// maintenance algorithm (spec §4.2). Relies on big-endian version
/// encoding making ascending key order equal ascending version order, so
/// the last entry visited by the prefix scan is the maximum.
fn max_remaining_version<E: Engine>(
    cf: &ColumnFamilyHandle<(String, i32), i64>,
    txn: &mut Transaction<E>,
    id_prefix: &[u8],
) -> CResult<Option<i64>> {
    let mut last = None;
    cf.scan_prefix(txn, id_prefix, |_k, v| {
        last = Some(v);
        true
    })?;
    Ok(last)
}

/// Owns the column-family handles and the read-through caches. One
/// instance lives for the lifetime of the partition actor; a fresh
/// [`Transaction`] is created per command.
pub struct ResourceStateStore {
    decisions_by_key: ColumnFamilyHandle<i64, DecisionRecord>,
    latest_decision_by_id: ColumnFamilyHandle<String, i64>,
    decision_key_by_id_version: ColumnFamilyHandle<(String, i32), i64>,
    decision_key_by_drg_key: ColumnFamilyHandle<(i64, i64), ()>,

    drg_by_key: ColumnFamilyHandle<i64, DrgRecord>,
    latest_drg_by_id: ColumnFamilyHandle<String, i64>,
    drg_key_by_id_version: ColumnFamilyHandle<(String, i32), i64>,

    processes_by_key: ColumnFamilyHandle<i64, ProcessRecord>,
    latest_process_by_id: ColumnFamilyHandle<String, i64>,
    process_key_by_id_version: ColumnFamilyHandle<(String, i32), i64>,

    latest_decision_key_cache: ReadThroughCache<String, i64>,
    decision_by_key_cache: ReadThroughCache<i64, DecisionRecord>,
    latest_drg_key_cache: ReadThroughCache<String, i64>,
    drg_by_key_cache: ReadThroughCache<i64, DrgRecord>,
    decisions_by_drg_key_cache: ReadThroughCache<i64, Vec<DecisionRecord>>,

    /// Whether foreign-key writes are checked against their target column
    /// family (spec §4.1). Always on for `debug_assertions` builds; an
    /// embedder can additionally force it on in a release build by
    /// constructing the store with [`Self::with_validation`] (the "opened
    /// in validate mode" case).
    validate: bool,
}

impl Default for ResourceStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceStateStore {
    pub fn new() -> Self {
        Self::with_validation(cfg!(debug_assertions))
    }

    /// Builds a store with foreign-key verification explicitly forced on
    /// or off, regardless of the build profile.
    pub fn with_validation(validate: bool) -> Self {
        Self {
            validate,
            decisions_by_key: ColumnFamilyHandle::new(ColumnFamily::DecisionsByKey),
            latest_decision_by_id: ColumnFamilyHandle::new(ColumnFamily::LatestDecisionById),
            decision_key_by_id_version: ColumnFamilyHandle::new(ColumnFamily::DecisionKeyByIdVersion),
            decision_key_by_drg_key: ColumnFamilyHandle::new(ColumnFamily::DecisionKeyByDrgKey),

            drg_by_key: ColumnFamilyHandle::new(ColumnFamily::DrgByKey),
            latest_drg_by_id: ColumnFamilyHandle::new(ColumnFamily::LatestDrgById),
            drg_key_by_id_version: ColumnFamilyHandle::new(ColumnFamily::DrgKeyByIdVersion),

            processes_by_key: ColumnFamilyHandle::new(ColumnFamily::ProcessesByKey),
            latest_process_by_id: ColumnFamilyHandle::new(ColumnFamily::LatestProcessById),
            process_key_by_id_version: ColumnFamilyHandle::new(ColumnFamily::ProcessKeyByIdVersion),

            latest_decision_key_cache: ReadThroughCache::new(),
            decision_by_key_cache: ReadThroughCache::new(),
            latest_drg_key_cache: ReadThroughCache::new(),
            drg_by_key_cache: ReadThroughCache::new(),
            decisions_by_drg_key_cache: ReadThroughCache::new(),
        }
    }

    // ---- decisions ----------------------------------------------------

    pub fn find_decision_by_key<E: Engine>(
        &mut self,
        txn: &mut Transaction<E>,
        key: i64,
    ) -> CResult<Option<DecisionRecord>> {
        if let Some(hit) = self.decision_by_key_cache.get(&key) {
            log::trace!("decision_by_key cache hit for {key}");
            return Ok(Some(hit));
        }
        let found = self.decisions_by_key.get(txn, &key)?;
        if let Some(ref record) = found {
            self.decision_by_key_cache.put(key, record.clone());
        }
        Ok(found)
    }

    pub fn find_latest_decision_by_id<E: Engine>(
        &mut self,
        txn: &mut Transaction<E>,
        id: &str,
    ) -> CResult<Option<DecisionRecord>> {
        let key = if let Some(hit) = self.latest_decision_key_cache.get(&id.to_string()) {
            hit
        } else {
            match self.latest_decision_by_id.get(txn, &id.to_string())? {
                Some(k) => {
                    self.latest_decision_key_cache.put(id.to_string(), k);
                    k
                }
                None => return Ok(None),
            }
        };
        self.find_decision_by_key(txn, key)
    }

    pub fn find_decisions_by_drg_key<E: Engine>(
        &mut self,
        txn: &mut Transaction<E>,
        drg_key: i64,
    ) -> CResult<Vec<DecisionRecord>> {
        if let Some(hit) = self.decisions_by_drg_key_cache.get(&drg_key) {
            return Ok(hit);
        }
        // The join index value carries no payload (spec §3: `(drgKey,
        // decisionKey) -> ()`), so the decisionKey is recovered from the
        // raw key suffix rather than the decoded value.
        let mut keys = Vec::new();
        txn.scan_prefix(
            ColumnFamily::DecisionKeyByDrgKey,
            &drg_key.encode_prefix()?,
            &mut |k, _v| {
                // key = drgKey(8 bytes BE) || decisionKey(8 bytes BE)
                if k.len() >= 16 {
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(&k[8..16]);
                    keys.push(i64::from_be_bytes(buf));
                }
                true
            },
        )?;

        let mut decisions = Vec::with_capacity(keys.len());
        for decision_key in keys {
            if let Some(d) = self.find_decision_by_key(txn, decision_key)? {
                decisions.push(d);
            }
        }
        decisions.sort_by_key(|d| d.decision_key);
        self.decisions_by_drg_key_cache.put(drg_key, decisions.clone());
        Ok(decisions)
    }

    pub fn store_decision<E: Engine>(
        &mut self,
        txn: &mut Transaction<E>,
        record: &DecisionRecord,
    ) -> CResult<()> {
        if self.validate {
            let fk = ForeignKey::new(record.drg_key, ColumnFamily::DrgByKey);
            ColumnFamilyHandle::<i64, DrgRecord>::verify_foreign_key(txn, &fk, || {
                format!("decision {} drg_key {}", record.decision_id, record.drg_key)
            })?;
        }

        self.decisions_by_key.put(txn, &record.decision_key, record)?;
        self.decision_key_by_id_version
            .put(txn, &(record.decision_id.clone(), record.version), &record.decision_key)?;
        self.decision_key_by_drg_key
            .put(txn, &(record.drg_key, record.decision_key), &())?;

        self.decision_by_key_cache.invalidate(&record.decision_key);
        self.decisions_by_drg_key_cache.invalidate(&record.drg_key);

        let latest = self.latest_decision_by_id.get(txn, &record.decision_id)?;
        let should_advance = match &latest {
            None => true,
            Some(current_key) => match self.find_decision_by_key(txn, *current_key)? {
                Some(current) => record.version > current.version,
                None => true,
            },
        };
        if should_advance {
            self.latest_decision_by_id
                .put(txn, &record.decision_id, &record.decision_key)?;
            self.latest_decision_key_cache
                .put(record.decision_id.clone(), record.decision_key);
        }
        Ok(())
    }

    /// Deletes one decision row, folding the latest-version index per
    /// spec §4.2: if the deleted row was the latest, repoint
    /// `latest_decision_by_id` at the next-highest remaining version, or
    /// remove it entirely if none remain.
    pub fn delete_decision<E: Engine>(
        &mut self,
        txn: &mut Transaction<E>,
        record: &DecisionRecord,
    ) -> CResult<()> {
        self.decisions_by_key.delete_existing(txn, &record.decision_key)?;
        self.decision_key_by_id_version
            .delete_existing(txn, &(record.decision_id.clone(), record.version))?;
        self.decision_key_by_drg_key
            .delete_existing(txn, &(record.drg_key, record.decision_key))?;

        self.decision_by_key_cache.invalidate(&record.decision_key);
        self.decisions_by_drg_key_cache.invalidate(&record.drg_key);

        let latest = self.latest_decision_by_id.get(txn, &record.decision_id)?;
        if latest == Some(record.decision_key) {
            self.latest_decision_key_cache.invalidate(&record.decision_id);
            let id_prefix = record.decision_id.encode_prefix()?;
            match max_remaining_version(&self.decision_key_by_id_version, txn, &id_prefix)? {
                Some(remaining_key) => {
                    self.latest_decision_by_id
                        .put(txn, &record.decision_id, &remaining_key)?;
                    self.latest_decision_key_cache
                        .put(record.decision_id.clone(), remaining_key);
                }
                None => {
                    self.latest_decision_by_id.delete_existing(txn, &record.decision_id)?;
                }
            }
        }
        Ok(())
    }

    // ---- DRGs -----------------------------------------------------------

    pub fn find_drg_by_key<E: Engine>(
        &mut self,
        txn: &mut Transaction<E>,
        key: i64,
    ) -> CResult<Option<DrgRecord>> {
        if let Some(hit) = self.drg_by_key_cache.get(&key) {
            return Ok(Some(hit));
        }
        let found = self.drg_by_key.get(txn, &key)?;
        if let Some(ref record) = found {
            self.drg_by_key_cache.put(key, record.clone());
        }
        Ok(found)
    }

    pub fn find_latest_drg_by_id<E: Engine>(
        &mut self,
        txn: &mut Transaction<E>,
        id: &str,
    ) -> CResult<Option<DrgRecord>> {
        let key = if let Some(hit) = self.latest_drg_key_cache.get(&id.to_string()) {
            hit
        } else {
            match self.latest_drg_by_id.get(txn, &id.to_string())? {
                Some(k) => {
                    self.latest_drg_key_cache.put(id.to_string(), k);
                    k
                }
                None => return Ok(None),
            }
        };
        self.find_drg_by_key(txn, key)
    }

    pub fn store_drg<E: Engine>(
        &mut self,
        txn: &mut Transaction<E>,
        record: &DrgRecord,
    ) -> CResult<()> {
        self.drg_by_key.put(txn, &record.drg_key, record)?;
        self.drg_key_by_id_version
            .put(txn, &(record.drg_id.clone(), record.drg_version), &record.drg_key)?;
        self.drg_by_key_cache.invalidate(&record.drg_key);

        let latest = self.latest_drg_by_id.get(txn, &record.drg_id)?;
        let should_advance = match &latest {
            None => true,
            Some(current_key) => match self.find_drg_by_key(txn, *current_key)? {
                Some(current) => record.drg_version > current.drg_version,
                None => true,
            },
        };
        if should_advance {
            self.latest_drg_by_id.put(txn, &record.drg_id, &record.drg_key)?;
            self.latest_drg_key_cache.put(record.drg_id.clone(), record.drg_key);
        }
        Ok(())
    }

    pub fn delete_drg<E: Engine>(
        &mut self,
        txn: &mut Transaction<E>,
        record: &DrgRecord,
    ) -> CResult<()> {
        self.drg_by_key.delete_existing(txn, &record.drg_key)?;
        self.drg_key_by_id_version
            .delete_existing(txn, &(record.drg_id.clone(), record.drg_version))?;
        self.drg_by_key_cache.invalidate(&record.drg_key);

        let latest = self.latest_drg_by_id.get(txn, &record.drg_id)?;
        if latest == Some(record.drg_key) {
            self.latest_drg_key_cache.invalidate(&record.drg_id);
            let id_prefix = record.drg_id.encode_prefix()?;
            match max_remaining_version(&self.drg_key_by_id_version, txn, &id_prefix)? {
                Some(remaining_key) => {
                    self.latest_drg_by_id.put(txn, &record.drg_id, &remaining_key)?;
                    self.latest_drg_key_cache.put(record.drg_id.clone(), remaining_key);
                }
                None => {
                    self.latest_drg_by_id.delete_existing(txn, &record.drg_id)?;
                }
            }
        }
        Ok(())
    }

    // ---- processes ------------------------------------------------------

    /// Not cached — the store contract (spec §4.2) only lists the
    /// decision/DRG lookups as cache-accelerated.
    pub fn get_process_by_key<E: Engine>(
        &mut self,
        txn: &mut Transaction<E>,
        key: i64,
    ) -> CResult<Option<ProcessRecord>> {
        self.processes_by_key.get(txn, &key)
    }

    pub fn store_process<E: Engine>(
        &mut self,
        txn: &mut Transaction<E>,
        record: &ProcessRecord,
    ) -> CResult<()> {
        self.processes_by_key.put(txn, &record.key, record)?;
        self.process_key_by_id_version
            .put(txn, &(record.bpmn_process_id.clone(), record.version), &record.key)?;

        let latest = self.latest_process_by_id.get(txn, &record.bpmn_process_id)?;
        let should_advance = match &latest {
            None => true,
            Some(current_key) => match self.get_process_by_key(txn, *current_key)? {
                Some(current) => record.version > current.version,
                None => true,
            },
        };
        if should_advance {
            self.latest_process_by_id
                .put(txn, &record.bpmn_process_id, &record.key)?;
        }
        Ok(())
    }

    pub fn delete_process<E: Engine>(
        &mut self,
        txn: &mut Transaction<E>,
        record: &ProcessRecord,
    ) -> CResult<()> {
        self.processes_by_key.delete_existing(txn, &record.key)?;
        self.process_key_by_id_version
            .delete_existing(txn, &(record.bpmn_process_id.clone(), record.version))?;

        let latest = self.latest_process_by_id.get(txn, &record.bpmn_process_id)?;
        if latest == Some(record.key) {
            let id_prefix = record.bpmn_process_id.encode_prefix()?;
            match max_remaining_version(&self.process_key_by_id_version, txn, &id_prefix)? {
                Some(remaining_key) => {
                    self.latest_process_by_id
                        .put(txn, &record.bpmn_process_id, &remaining_key)?;
                }
                None => {
                    self.latest_process_by_id
                        .delete_existing(txn, &record.bpmn_process_id)?;
                }
            }
        }
        Ok(())
    }
}

/// Small helper trait so `id.encode_prefix()` reads naturally at call
/// sites that need only the id component of a `(id, version)` composite
/// key as a scan prefix.
trait EncodePrefix {
    fn encode_prefix(&self) -> CResult<Vec<u8>>;
}

impl EncodePrefix for String {
    fn encode_prefix(&self) -> CResult<Vec<u8>> {
        use crate::kv::key::KeyEncode;
        self.encode()
    }
}

impl EncodePrefix for i64 {
    fn encode_prefix(&self) -> CResult<Vec<u8>> {
        use crate::kv::key::KeyEncode;
        self.encode()
    }
}
