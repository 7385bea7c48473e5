//! Wire record payloads (spec §6), MessagePack-encoded with a stable field
//! set. These are both the column-family value types (C2) and the event
//! payloads emitted by the log writers (C3).

use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

/// A process definition's lifecycle state (spec §3). Assigned on
/// `DEPLOYED` and transitioned outside this crate's scope — the deletion
/// processor (spec §4.5) never reads or writes it: a process with active
/// instances is simply rejected, not marked `PendingDeletion`, since the
/// whole command transaction aborts on that rejection (spec §7) and any
/// write made before the abort would be discarded with it. Carried here
/// only for data-model completeness and wire round-trip fidelity (spec §3,
/// §8 property 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessState {
    Active,
    PendingDeletion,
}

/// A deployed process definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub bpmn_process_id: String,
    pub version: i32,
    pub key: i64,
    pub resource_name: String,
    pub state: ProcessState,
    pub checksum: Option<ByteBuf>,
    pub resource: Option<ByteBuf>,
}

impl ProcessRecord {
    /// A copy with `resource` and `checksum` stripped, used for the
    /// `Process:DELETING`/`Process:DELETED` events so they stay small
    /// (spec §4.5).
    pub fn without_resource(&self) -> Self {
        Self { checksum: None, resource: None, ..self.clone() }
    }
}

/// A single decision within a DRG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub decision_id: String,
    pub decision_name: String,
    pub version: i32,
    pub decision_key: i64,
    pub drg_id: String,
    pub drg_key: i64,
}

/// A decision requirements graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrgRecord {
    pub drg_id: String,
    pub drg_name: String,
    pub drg_version: i32,
    pub drg_key: i64,
    pub resource_name: String,
    pub checksum: ByteBuf,
    pub resource: ByteBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_record_round_trips_through_msgpack() {
        let p = ProcessRecord {
            bpmn_process_id: "order-process".into(),
            version: 2,
            key: 100,
            resource_name: "order.bpmn".into(),
            state: ProcessState::Active,
            checksum: Some(ByteBuf::from(vec![0xaa, 0xbb])),
            resource: Some(ByteBuf::from(vec![1, 2, 3])),
        };
        let bytes = rmp_serde::to_vec_named(&p).unwrap();
        let decoded: ProcessRecord = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(p, decoded);
    }

    #[test]
    fn without_resource_drops_payload_but_keeps_identity() {
        let p = ProcessRecord {
            bpmn_process_id: "p".into(),
            version: 1,
            key: 100,
            resource_name: "p.bpmn".into(),
            state: ProcessState::Active,
            checksum: Some(ByteBuf::from(vec![1])),
            resource: Some(ByteBuf::from(vec![2])),
        };
        let stripped = p.without_resource();
        assert_eq!(stripped.key, 100);
        assert!(stripped.checksum.is_none());
        assert!(stripped.resource.is_none());
    }

    #[test]
    fn drg_record_round_trips_through_msgpack() {
        let d = DrgRecord {
            drg_id: "D".into(),
            drg_name: "Decide".into(),
            drg_version: 1,
            drg_key: 7,
            resource_name: "decide.dmn".into(),
            checksum: ByteBuf::from(vec![9, 9]),
            resource: ByteBuf::from(vec![4, 5, 6]),
        };
        let bytes = rmp_serde::to_vec_named(&d).unwrap();
        let decoded: DrgRecord = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(d, decoded);
    }
}
