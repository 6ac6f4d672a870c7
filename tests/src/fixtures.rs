//! Shared fixtures: JSON log capture and membership event builders.

use bc_01_cluster_view::test_utils::{join_metadata, make_node};
use bc_01_cluster_view::{FilterKind, FilterUpdate, MembershipEvent, NodeMetadata};
use bc_02_control_manager::test_utils::ControlHarness;
use bc_02_control_manager::ControlResult;
use bc_telemetry::{build_subscriber, TelemetryConfig};
use parking_lot::Mutex;
use serde_json::Value;
use std::io;
use std::sync::Arc;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

/// In-memory sink for JSON log lines.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Install a JSON subscriber for the current thread.
    ///
    /// Tokio tests run on a current-thread runtime, so every task spawned by
    /// the test logs through this subscriber while the guard lives.
    pub fn install(level: &str) -> (Self, DefaultGuard) {
        let capture = Self::default();
        let config = TelemetryConfig {
            service_name: "bc-tests".into(),
            log_level: level.into(),
            json_logs: true,
            ansi: false,
        };
        let subscriber = match build_subscriber(&config, capture.clone()) {
            Ok(subscriber) => subscriber,
            Err(err) => panic!("log capture setup failed: {err}"),
        };
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    /// Every captured line, parsed.
    pub fn records(&self) -> Vec<Value> {
        let bytes = self.0.lock().clone();
        String::from_utf8_lossy(&bytes)
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// Captured records whose message equals `message`.
    pub fn with_message(&self, message: &str) -> Vec<Value> {
        self.records()
            .into_iter()
            .filter(|r| r["fields"]["message"] == message)
            .collect()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'w> MakeWriter<'w> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'w self) -> Self::Writer {
        self.clone()
    }
}

pub fn exact_base(sqn: u64) -> FilterUpdate {
    FilterUpdate::base(FilterKind::ExactBloom, sqn, vec![sqn as u8])
}

pub fn exact_update(sqn: u64) -> FilterUpdate {
    FilterUpdate::update(FilterKind::ExactBloom, sqn, vec![sqn as u8])
}

/// Join `uid` at view version 1 with a forwarding endpoint on `port`.
pub async fn join(
    harness: &ControlHarness,
    uid: &str,
    incarnation: u64,
    port: u16,
) -> ControlResult<()> {
    harness
        .manager
        .on_membership_event(MembershipEvent::join(
            1,
            make_node(uid, incarnation),
            join_metadata(&uid.to_lowercase(), port),
        ))
        .await
}

/// Metadata change from `uid` at view version 1.
pub async fn announce(
    harness: &ControlHarness,
    uid: &str,
    incarnation: u64,
    metadata: NodeMetadata,
) -> ControlResult<()> {
    harness
        .manager
        .on_membership_event(MembershipEvent::metadata_change(
            1,
            make_node(uid, incarnation),
            metadata,
        ))
        .await
}
