//! Composite key encoding: strings are length-prefixed, integers are
//! big-endian, and composite keys are the concatenation of their field
//! encodings in declared order (spec §4.1, §6).

use crate::columns::ColumnFamily;
use crate::error::{CResult, Error};

/// A type that can be encoded into the ordered-byte-key form used by the
/// column families. Implemented for the primitive field types plus tuples
/// of them, so composite keys like `(drgId, version)` just work.
pub trait KeyEncode {
    fn encode_into(&self, buf: &mut Vec<u8>) -> CResult<()>;

    fn encode(&self) -> CResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf)?;
        Ok(buf)
    }
}

impl KeyEncode for str {
    fn encode_into(&self, buf: &mut Vec<u8>) -> CResult<()> {
        let bytes = self.as_bytes();
        let len: u16 = bytes
            .len()
            .try_into()
            .map_err(|_| Error::CodecError(format!("string key too long: {} bytes", bytes.len())))?;
        buf.extend_from_slice(&len.to_be_bytes());
        buf.extend_from_slice(bytes);
        Ok(())
    }
}

impl KeyEncode for String {
    fn encode_into(&self, buf: &mut Vec<u8>) -> CResult<()> {
        self.as_str().encode_into(buf)
    }
}

impl KeyEncode for i32 {
    fn encode_into(&self, buf: &mut Vec<u8>) -> CResult<()> {
        buf.extend_from_slice(&self.to_be_bytes());
        Ok(())
    }
}

impl KeyEncode for i64 {
    fn encode_into(&self, buf: &mut Vec<u8>) -> CResult<()> {
        buf.extend_from_slice(&self.to_be_bytes());
        Ok(())
    }
}

impl<A: KeyEncode, B: KeyEncode> KeyEncode for (A, B) {
    fn encode_into(&self, buf: &mut Vec<u8>) -> CResult<()> {
        self.0.encode_into(buf)?;
        self.1.encode_into(buf)
    }
}

/// A typed reference to a primary key in `target`. Verified at write time
/// (in debug/validation builds — spec §4.1) by looking the key up in its
/// owning column family before the referencing row is written.
#[derive(Debug, Clone, Copy)]
pub struct ForeignKey<K> {
    pub key: K,
    pub target: ColumnFamily,
}

impl<K> ForeignKey<K> {
    pub fn new(key: K, target: ColumnFamily) -> Self {
        Self { key, target }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_prefix_preserves_order_within_fixed_total_len() {
        let a = "ab".encode().unwrap();
        let b = "ac".encode().unwrap();
        assert!(a < b);
    }

    #[test]
    fn composite_key_concatenates_fields_in_order() {
        let encoded = ("drg-1".to_string(), 3i32).encode().unwrap();
        let mut expect = Vec::new();
        "drg-1".encode_into(&mut expect).unwrap();
        3i32.encode_into(&mut expect).unwrap();
        assert_eq!(encoded, expect);
    }

    #[test]
    fn rejects_oversized_strings() {
        let huge = "x".repeat(u16::MAX as usize + 1);
        assert!(matches!(huge.encode(), Err(Error::CodecError(_))));
    }
}
