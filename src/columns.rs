//! The column-family enumeration for this store.
//!
//! Each variant is a distinct logical namespace within the embedded byte-key
//! engine (spec §6). The discriminant is a stable 16-bit id: migrations must
//! extend this list, never renumber it — mirroring the append-only
//! evolution discipline `near-store`'s `DBCol` enum documents for its own
//! RocksDB column families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ColumnFamily {
    /// `decisionKey -> Decision`
    DecisionsByKey = 0,
    /// `decisionId -> decisionKey` (newest version)
    LatestDecisionById = 1,
    /// `(decisionId, version) -> decisionKey`
    DecisionKeyByIdVersion = 2,
    /// `(drgKey, decisionKey) -> ()`, prefix-scannable join index
    DecisionKeyByDrgKey = 3,
    /// `drgKey -> Drg`
    DrgByKey = 4,
    /// `drgId -> drgKey` (newest version)
    LatestDrgById = 5,
    /// `(drgId, version) -> drgKey`
    DrgKeyByIdVersion = 6,
    /// `processKey -> Process`
    ProcessesByKey = 7,
    /// `bpmnProcessId -> processKey` (newest version)
    LatestProcessById = 8,
    /// `(bpmnProcessId, version) -> processKey`
    ProcessKeyByIdVersion = 9,
    /// `commandKey -> PendingDistribution` (C4 pending-ack bookkeeping)
    PendingDistribution = 10,
}

impl ColumnFamily {
    /// The 2-byte big-endian namespace prefix this family's keys are
    /// stored under in the backing engine.
    pub fn namespace(self) -> [u8; 2] {
        (self as u16).to_be_bytes()
    }

    pub const ALL: [ColumnFamily; 11] = [
        ColumnFamily::DecisionsByKey,
        ColumnFamily::LatestDecisionById,
        ColumnFamily::DecisionKeyByIdVersion,
        ColumnFamily::DecisionKeyByDrgKey,
        ColumnFamily::DrgByKey,
        ColumnFamily::LatestDrgById,
        ColumnFamily::DrgKeyByIdVersion,
        ColumnFamily::ProcessesByKey,
        ColumnFamily::LatestProcessById,
        ColumnFamily::ProcessKeyByIdVersion,
        ColumnFamily::PendingDistribution,
    ];
}
