use crate::engine::{Engine, Status};
use crate::error::CResult;
use std::collections::BTreeMap;

/// A purely in-memory engine backed by a `BTreeMap`, storing keys and
/// values directly with no persistence. Used by tests and as the default
/// engine for embedders that do not need durability across restarts — the
/// on-disk engine is an external collaborator (spec §1) and is not
/// reimplemented here.
#[derive(Default)]
pub struct MemoryEngine {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self { data: BTreeMap::new() }
    }
}

impl Engine for MemoryEngine {
    fn get(&mut self, key: &[u8]) -> CResult<Option<Vec<u8>>> {
        Ok(self.data.get(key).cloned())
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) -> CResult<()> {
        self.data.insert(key.to_vec(), value);
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> CResult<()> {
        self.data.remove(key);
        Ok(())
    }

    fn scan_prefix(
        &mut self,
        prefix: &[u8],
        visit: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) -> CResult<()> {
        for (k, v) in self.data.range(prefix.to_vec()..) {
            if !k.starts_with(prefix) {
                break;
            }
            if !visit(k, v) {
                break;
            }
        }
        Ok(())
    }

    fn status(&mut self) -> CResult<Status> {
        Ok(Status {
            name: "memory".to_string(),
            keys: self.data.len() as u64,
            size: self.data.iter().fold(0, |acc, (k, v)| acc + k.len() as u64 + v.len() as u64),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::engine::tests::test_engine!(MemoryEngine::new());
}
