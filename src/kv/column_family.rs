//! A typed handle over one [`ColumnFamily`], providing the
//! `get`/`put`/`upsert`/`update`/`deleteExisting`/`scanPrefix` primitives
//! spec §4.1 describes, layered on top of the raw [`Transaction`] byte
//! operations.

use crate::columns::ColumnFamily;
use crate::engine::Engine;
use crate::error::{CResult, Error};
use crate::kv::key::{ForeignKey, KeyEncode};
use crate::kv::transaction::Transaction;
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;

/// A typed view of one column family: `K` is the key type, `V` the
/// MessagePack-encoded value type.
pub struct ColumnFamilyHandle<K, V> {
    cf: ColumnFamily,
    _marker: PhantomData<(K, V)>,
}

impl<K: KeyEncode, V: Serialize + DeserializeOwned> ColumnFamilyHandle<K, V> {
    pub fn new(cf: ColumnFamily) -> Self {
        Self { cf, _marker: PhantomData }
    }

    fn decode(bytes: &[u8]) -> CResult<V> {
        rmp_serde::from_slice(bytes).map_err(|e| Error::CodecError(e.to_string()))
    }

    fn encode(value: &V) -> CResult<Vec<u8>> {
        rmp_serde::to_vec_named(value).map_err(|e| Error::CodecError(e.to_string()))
    }

    pub fn get<E: Engine>(&self, txn: &mut Transaction<E>, key: &K) -> CResult<Option<V>> {
        let raw = txn.get(self.cf, &key.encode()?)?;
        raw.map(|bytes| Self::decode(&bytes)).transpose()
    }

    /// Unconditional write: inserts or replaces whatever was there.
    pub fn put<E: Engine>(&self, txn: &mut Transaction<E>, key: &K, value: &V) -> CResult<()> {
        let encoded = Self::encode(value)?;
        txn.put(self.cf, &key.encode()?, encoded);
        Ok(())
    }

    /// Alias for [`Self::put`] — kept as a distinct name since callers
    /// reach for `upsert` when they mean "insert or replace" and `put`
    /// when they mean a first write.
    pub fn upsert<E: Engine>(&self, txn: &mut Transaction<E>, key: &K, value: &V) -> CResult<()> {
        self.put(txn, key, value)
    }

    /// Replaces an existing row. Fatal ([`Error::MissingPrimary`]) if the
    /// key is not already present.
    pub fn update<E: Engine>(&self, txn: &mut Transaction<E>, key: &K, value: &V) -> CResult<()> {
        let encoded_key = key.encode()?;
        if txn.get(self.cf, &encoded_key)?.is_none() {
            return Err(Error::MissingPrimary(self.cf));
        }
        let encoded_value = Self::encode(value)?;
        txn.put(self.cf, &encoded_key, encoded_value);
        Ok(())
    }

    /// Deletes a row that must already exist. Fatal
    /// ([`Error::MissingPrimary`]) if it is absent — this is an invariant
    /// violation, per spec §4.1's "delete on a missing key is fatal".
    pub fn delete_existing<E: Engine>(&self, txn: &mut Transaction<E>, key: &K) -> CResult<()> {
        let encoded_key = key.encode()?;
        if txn.get(self.cf, &encoded_key)?.is_none() {
            return Err(Error::MissingPrimary(self.cf));
        }
        txn.delete(self.cf, &encoded_key);
        Ok(())
    }

    /// Iterates the rows whose encoded key begins with `prefix`, decoding
    /// each value. Stops early if `visit` returns `false` or on the first
    /// decode error.
    pub fn scan_prefix<E: Engine>(
        &self,
        txn: &mut Transaction<E>,
        prefix: &[u8],
        mut visit: impl FnMut(&[u8], V) -> bool,
    ) -> CResult<()> {
        let mut first_err: Option<Error> = None;
        txn.scan_prefix(self.cf, prefix, &mut |k, v| match Self::decode(v) {
            Ok(value) => visit(k, value),
            Err(e) => {
                first_err = Some(e);
                false
            }
        })?;
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Verifies a [`ForeignKey`] points at an existing row in its target
    /// column family. Intended to be called at write time, gated on
    /// `debug_assertions` by callers (spec §4.1).
    pub fn verify_foreign_key<E: Engine>(
        txn: &mut Transaction<E>,
        fk: &ForeignKey<impl KeyEncode>,
        describe: impl FnOnce() -> String,
    ) -> CResult<()> {
        let encoded = fk.key.encode()?;
        if txn.get(fk.target, &encoded)?.is_none() {
            return Err(Error::ForeignKeyViolation(describe(), fk.target));
        }
        Ok(())
    }
}
