use crate::domain::{StoredRecord, STORE_VERSION};
use crate::error::{ClusterError, ClusterResult};
use crate::ports::outbound::RecordCodec;
use serde::{Deserialize, Serialize};

/// Default record codec using bincode.
///
/// Layout: `u16` version tag followed by the bincode-encoded record.
#[derive(Debug, Default, Clone, Copy)]
pub struct BincodeRecordCodec;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u16,
    record: &'a StoredRecord,
}

#[derive(Deserialize)]
struct Envelope {
    version: u16,
    record: StoredRecord,
}

impl RecordCodec for BincodeRecordCodec {
    fn encode(&self, record: &StoredRecord) -> ClusterResult<Vec<u8>> {
        bincode::serialize(&EnvelopeRef {
            version: STORE_VERSION,
            record,
        })
        .map_err(|e| ClusterError::Recovery {
            reason: format!("encode failed: {e}"),
        })
    }

    fn decode(&self, data: &[u8]) -> ClusterResult<StoredRecord> {
        let version: u16 = bincode::deserialize(data).map_err(|e| ClusterError::Recovery {
            reason: format!("missing version tag: {e}"),
        })?;
        if version != STORE_VERSION {
            return Err(ClusterError::StoreVersionConflict {
                expected: STORE_VERSION,
                found: version,
            });
        }
        let envelope: Envelope = bincode::deserialize(data).map_err(|e| ClusterError::Recovery {
            reason: format!("malformed record: {e}"),
        })?;
        Ok(envelope.record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RemovedServers, SequenceState, StoredRemoteRecord, StoredSelfRecord};

    #[test]
    fn test_self_record_survives_encoding() {
        let codec = BincodeRecordCodec;
        let mut removed = RemovedServers::new();
        removed.insert("A1", 5);
        let record = StoredRecord::Local(StoredSelfRecord {
            uid: "LOCAL".into(),
            incarnation: 9,
            patterns: vec!["sensors/#".into()],
            removed_servers: Some(removed),
            cluster_name: Some("east".into()),
        });

        let bytes = codec.encode(&record).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), record);
    }

    #[test]
    fn test_rejects_other_version() {
        let codec = BincodeRecordCodec;
        let record = StoredRecord::Remote(StoredRemoteRecord {
            uid: "B1".into(),
            name: "b".into(),
            incarnation: 1,
            sequences: [SequenceState::new(3, 4); 4],
        });
        let mut bytes = codec.encode(&record).unwrap();
        bytes[0] = 7;
        bytes[1] = 0;

        assert!(matches!(
            codec.decode(&bytes),
            Err(ClusterError::StoreVersionConflict {
                expected: STORE_VERSION,
                found: 7
            })
        ));
    }

    #[test]
    fn test_rejects_truncated_bytes() {
        let codec = BincodeRecordCodec;
        assert!(matches!(
            codec.decode(&[1]),
            Err(ClusterError::Recovery { .. })
        ));

        let record = StoredRecord::Remote(StoredRemoteRecord {
            uid: "B1".into(),
            name: "b".into(),
            incarnation: 1,
            sequences: [SequenceState::default(); 4],
        });
        let bytes = codec.encode(&record).unwrap();
        assert!(matches!(
            codec.decode(&bytes[..bytes.len() - 3]),
            Err(ClusterError::Recovery { .. })
        ));
    }
}
