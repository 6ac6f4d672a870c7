//! Covering filter delivery
//!
//! A batch is ordered and checked against the record's sequence state in
//! full before any callout is queued. When anything is accepted the new
//! positions are committed to the store ahead of the filter callouts.

use super::callout::Callout;
use super::core::ViewKeeper;
use crate::domain::{order_batch, FilterKind, FilterUpdate, RemoteServerRecord, SequenceDecision};
use crate::events::ViewTask;
use tracing::debug;

impl ViewKeeper {
    pub(super) fn apply_filters(
        &self,
        record: &mut RemoteServerRecord,
        items: Vec<FilterUpdate>,
        out: &mut Vec<Callout>,
        tasks: &mut Vec<ViewTask>,
    ) {
        if items.is_empty() {
            return;
        }
        let server = record.server_ref();
        let mut deliveries = Vec::new();
        let mut gaps: Vec<FilterKind> = Vec::new();

        for item in order_batch(items) {
            match record.sequences.offer(&item) {
                SequenceDecision::ReplaceBase => deliveries.push(Callout::EngineReplaceFilter {
                    server: server.clone(),
                    kind: item.kind,
                    sqn: item.sqn,
                    payload: item.payload,
                }),
                SequenceDecision::ApplyUpdate => {
                    deliveries.push(Callout::EngineApplyFilterUpdate {
                        server: server.clone(),
                        kind: item.kind,
                        sqn: item.sqn,
                        payload: item.payload,
                    })
                }
                SequenceDecision::Stale => {
                    debug!(uid = %record.uid, kind = %item.kind, sqn = item.sqn, "stale filter item dropped");
                }
                SequenceDecision::Gap { expected } => {
                    debug!(
                        uid = %record.uid,
                        kind = %item.kind,
                        sqn = item.sqn,
                        expected,
                        "filter sequence gap"
                    );
                    if !gaps.contains(&item.kind) {
                        gaps.push(item.kind);
                        tasks.push(ViewTask::RequestFreshBase {
                            uid: record.uid.clone(),
                            kind: item.kind,
                        });
                    }
                }
            }
        }

        if deliveries.is_empty() {
            return;
        }
        if let Some(data) = self.encode_remote(record) {
            out.push(Callout::EngineUpdate {
                server: Some(server),
                data,
                commit: true,
            });
        }
        out.extend(deliveries);
    }
}
