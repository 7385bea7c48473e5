//! The command transaction: a single buffered sequence of mutations that
//! commits or aborts atomically (spec §4.1, invariant I4).

use crate::columns::ColumnFamily;
use crate::engine::Engine;
use crate::error::CResult;
use std::collections::BTreeMap;

type BufferKey = (ColumnFamily, Vec<u8>);

enum BufferedOp {
    Put(Vec<u8>),
    Delete,
}

/// A namespaced key actually written to the backing engine.
fn namespaced(cf: ColumnFamily, key: &[u8]) -> Vec<u8> {
    let mut full = Vec::with_capacity(2 + key.len());
    full.extend_from_slice(&cf.namespace());
    full.extend_from_slice(key);
    full
}

/// Buffers every mutation for one command. Reads see the transaction's own
/// uncommitted writes (read-your-writes) layered over the engine's
/// committed state. `commit` replays the buffer onto the engine in
/// insertion order; `abort` discards it — neither ever applies partial
/// writes (invariant I4).
pub struct Transaction<'e, E: Engine> {
    engine: &'e mut E,
    buffer: BTreeMap<BufferKey, BufferedOp>,
    order: Vec<BufferKey>,
}

impl<'e, E: Engine> Transaction<'e, E> {
    pub fn new(engine: &'e mut E) -> Self {
        Self { engine, buffer: BTreeMap::new(), order: Vec::new() }
    }

    fn record(&mut self, key: BufferKey, op: BufferedOp) {
        if !self.buffer.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.buffer.insert(key, op);
    }

    pub fn get(&mut self, cf: ColumnFamily, key: &[u8]) -> CResult<Option<Vec<u8>>> {
        if let Some(op) = self.buffer.get(&(cf, key.to_vec())) {
            return Ok(match op {
                BufferedOp::Put(v) => Some(v.clone()),
                BufferedOp::Delete => None,
            });
        }
        self.engine.get(&namespaced(cf, key))
    }

    pub fn put(&mut self, cf: ColumnFamily, key: &[u8], value: Vec<u8>) {
        self.record((cf, key.to_vec()), BufferedOp::Put(value));
    }

    pub fn delete(&mut self, cf: ColumnFamily, key: &[u8]) {
        self.record((cf, key.to_vec()), BufferedOp::Delete);
    }

    /// Iterates over every key starting with `prefix` in `cf`, in
    /// ascending order, overlaying this transaction's own buffered writes
    /// on top of the engine's committed state.
    pub fn scan_prefix(
        &mut self,
        cf: ColumnFamily,
        prefix: &[u8],
        visit: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) -> CResult<()> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
        let ns_prefix = namespaced(cf, prefix);
        self.engine.scan_prefix(&ns_prefix, &mut |k, v| {
            merged.insert(k[2..].to_vec(), v.to_vec());
            true
        })?;
        for ((buf_cf, buf_key), op) in &self.buffer {
            if *buf_cf != cf || !buf_key.starts_with(prefix) {
                continue;
            }
            match op {
                BufferedOp::Put(v) => {
                    merged.insert(buf_key.clone(), v.clone());
                }
                BufferedOp::Delete => {
                    merged.remove(buf_key);
                }
            }
        }
        for (k, v) in &merged {
            if !visit(k, v) {
                break;
            }
        }
        Ok(())
    }

    /// Applies every buffered mutation to the backing engine, in the
    /// order the mutations were made, and returns the set of touched
    /// `(column, key)` pairs so the caller can invalidate the read-through
    /// cache for exactly those entries.
    pub fn commit(mut self) -> CResult<Vec<(ColumnFamily, Vec<u8>)>> {
        let touched = self.order.clone();
        for key in &self.order {
            let op = self.buffer.remove(key).expect("order and buffer stay in sync");
            let full = namespaced(key.0, &key.1);
            match op {
                BufferedOp::Put(value) => self.engine.set(&full, value)?,
                BufferedOp::Delete => self.engine.delete(&full)?,
            }
        }
        Ok(touched)
    }

    /// Discards every buffered mutation without touching the engine.
    pub fn abort(self) {
        // Dropping `self` discards the buffer; nothing was ever applied.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::memory::MemoryEngine;

    #[test]
    fn read_your_writes_before_commit() {
        let mut engine = MemoryEngine::new();
        let mut txn = Transaction::new(&mut engine);
        txn.put(ColumnFamily::DrgByKey, b"k1", vec![1, 2, 3]);
        assert_eq!(txn.get(ColumnFamily::DrgByKey, b"k1").unwrap(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn abort_leaves_engine_untouched() {
        let mut engine = MemoryEngine::new();
        {
            let mut txn = Transaction::new(&mut engine);
            txn.put(ColumnFamily::DrgByKey, b"k1", vec![1]);
            txn.abort();
        }
        let mut txn = Transaction::new(&mut engine);
        assert_eq!(txn.get(ColumnFamily::DrgByKey, b"k1").unwrap(), None);
    }

    #[test]
    fn commit_applies_buffered_writes_in_order() {
        let mut engine = MemoryEngine::new();
        {
            let mut txn = Transaction::new(&mut engine);
            txn.put(ColumnFamily::DrgByKey, b"k1", vec![1]);
            txn.put(ColumnFamily::DrgByKey, b"k1", vec![2]);
            txn.commit().unwrap();
        }
        let mut txn = Transaction::new(&mut engine);
        assert_eq!(txn.get(ColumnFamily::DrgByKey, b"k1").unwrap(), Some(vec![2]));
    }

    #[test]
    fn scan_prefix_overlays_buffer_on_engine() {
        let mut engine = MemoryEngine::new();
        {
            let mut txn = Transaction::new(&mut engine);
            txn.put(ColumnFamily::DrgByKey, b"a1", vec![1]);
            txn.put(ColumnFamily::DrgByKey, b"a2", vec![2]);
            txn.commit().unwrap();
        }
        let mut txn = Transaction::new(&mut engine);
        txn.delete(ColumnFamily::DrgByKey, b"a1");
        txn.put(ColumnFamily::DrgByKey, b"a3", vec![3]);
        let mut seen = Vec::new();
        txn.scan_prefix(ColumnFamily::DrgByKey, b"a", &mut |k, v| {
            seen.push((k.to_vec(), v.to_vec()));
            true
        })
        .unwrap();
        assert_eq!(seen, vec![(b"a2".to_vec(), vec![2]), (b"a3".to_vec(), vec![3])]);
    }
}
