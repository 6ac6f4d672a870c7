//! # Cluster Flows
//!
//! Admin deletes and removed-server gossip between two control managers:
//!
//! ```text
//! [Manager X] ──admin_delete_node(B1)──→ PublishRemovedServers {B1@2}
//!                                              │  (relayed as PEER metadata)
//!                                              ↓
//! [Manager Y] ──DeleteRemovedServers──→ view drops B1, ClearRetainedAttributes
//! ```

use crate::fixtures::{announce, exact_base, join, LogCapture};
use bc_01_cluster_view::test_utils::{RecordingEngine, RecordingForwarding};
use bc_01_cluster_view::{MembershipEvent, NodeMetadata, RemovedServers};
use bc_02_control_manager::test_utils::{
    ControlHarness, LeaveBehavior, MembershipCall, RecordingFatalHandler, RecordingMembership,
};
use bc_02_control_manager::{ControlManager, ControlState, DetachOutcome, TomlConfigProvider};
use std::sync::Arc;
use std::time::Duration;

fn published_removed_set(harness: &ControlHarness) -> RemovedServers {
    harness
        .membership
        .calls()
        .into_iter()
        .rev()
        .find_map(|call| match call {
            MembershipCall::PublishRemovedServers(set) => Some(set),
            _ => None,
        })
        .expect("removed servers were never published")
}

#[tokio::test]
async fn test_removed_list_gossip_between_managers() {
    let (logs, _guard) = LogCapture::install("info");
    let x = ControlHarness::running().await;
    let y = ControlHarness::running().await;

    for harness in [&x, &y] {
        join(harness, "PEER", 1, 7000).await.unwrap();
        join(harness, "B1", 2, 7001).await.unwrap();
    }

    let b_on_x = x.manager.view().handle_for_uid("B1").unwrap();
    x.manager.admin_delete_node(b_on_x).await.unwrap();
    let removed = published_removed_set(&x);
    assert!(removed.is_fenced("B1", 2));

    announce(&y, "PEER", 1, NodeMetadata::new().with_removed_servers(1, removed))
        .await
        .unwrap();

    assert!(y.manager.view().handle_for_uid("B1").is_none());
    assert!(y.manager.view().removed_servers().is_fenced("B1", 2));
    assert!(y.membership.calls().contains(&MembershipCall::ClearRetainedAttributes {
        uid: "B1".into(),
        incarnation: 2
    }));

    let deleted = logs.with_message("removed server deleted");
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0]["fields"]["uid"], "B1");
    assert_eq!(deleted[0]["fields"]["incarnation"], 2);
    assert_eq!(deleted[0]["fields"]["component"], "control");

    // The same incarnation stays fenced on both sides; a restart gets back in.
    join(&y, "B1", 2, 7001).await.unwrap();
    assert!(y.manager.view().handle_for_uid("B1").is_none());
    join(&y, "B1", 3, 7001).await.unwrap();
    assert!(y.manager.view().handle_for_uid("B1").is_some());
    join(&x, "B1", 2, 7001).await.unwrap();
    assert!(x.manager.view().handle_for_uid("B1").is_none());
}

#[tokio::test]
async fn test_delete_of_live_server_logs_warning() {
    let (logs, _guard) = LogCapture::install("warn");
    let h = ControlHarness::running().await;
    join(&h, "B1", 4, 7001).await.unwrap();
    h.membership.set_refuse_clear(true);

    let b = h.manager.view().handle_for_uid("B1").unwrap();
    h.manager.admin_delete_node(b).await.unwrap();

    let warnings = logs.with_message("retained attributes kept, server still alive");
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0]["level"], "WARN");
    assert_eq!(warnings[0]["fields"]["uid"], "B1");
    assert_eq!(warnings[0]["fields"]["incarnation"], 4);
    assert!(h.manager.view().server(b).is_none());
}

#[tokio::test]
async fn test_filters_and_forwarding_reach_engine() {
    let h = ControlHarness::running().await;
    join(&h, "B1", 1, 7001).await.unwrap();
    let b = h.manager.view().handle_for_uid("B1").unwrap();
    assert_eq!(h.manager.view().is_route_all(b), Some(true));

    announce(&h, "B1", 1, NodeMetadata::new().with_filter(exact_base(3)))
        .await
        .unwrap();
    assert_eq!(h.manager.view().is_route_all(b), Some(false));

    h.manager.node_forwarding_connected(b);
    assert_eq!(h.manager.drain_view_notifications(), 1);
    assert_eq!(h.view.engine.connected_count("B1"), 1);

    let statistics = h.manager.get_statistics();
    assert_eq!(statistics.connected_servers, 1);
    assert_eq!(statistics.disconnected_servers, 0);
}

#[tokio::test(start_paused = true)]
async fn test_detach_without_acknowledgment_then_close() {
    let (logs, _guard) = LogCapture::install("info");
    let h = ControlHarness::running().await;
    let maintenance = h.manager.spawn_maintenance();
    h.membership.set_leave_behavior(LeaveBehavior::NeverAcknowledge);

    assert_eq!(
        h.manager.admin_detach_from_cluster().await.unwrap(),
        DetachOutcome::NoAcknowledgment
    );
    assert_eq!(h.manager.state(), ControlState::Detached);
    assert_eq!(
        logs.with_message("no acknowledgment received from cluster, expected if this was the last server")
            .len(),
        1
    );

    h.manager.notify_term();
    h.manager.close();
    tokio::time::timeout(Duration::from_secs(1), maintenance)
        .await
        .unwrap()
        .unwrap();
    assert!(!logs.with_message("control manager closed").is_empty());
}

#[tokio::test]
async fn test_toml_config_builds_working_manager() {
    let provider = TomlConfigProvider::parse(
        r#"
        [cluster]
        server_name = "broker-a"
        server_uid = "A0"
        cluster_name = "it"
        max_servers = 2
        "#,
    )
    .unwrap();

    let engine = Arc::new(RecordingEngine::new());
    let forwarding = Arc::new(RecordingForwarding::new());
    let membership = Arc::new(RecordingMembership::new());
    let manager = ControlManager::from_config(
        provider.into_config(),
        engine.clone(),
        forwarding,
        membership,
        Arc::new(RecordingFatalHandler::default()),
    )
    .unwrap();
    manager.recovery_completed(1).await.unwrap();

    for (uid, port) in [("B1", 1), ("C1", 2), ("D1", 3)] {
        manager
            .on_membership_event(MembershipEvent::join(
                1,
                bc_01_cluster_view::test_utils::make_node(uid, 1),
                bc_01_cluster_view::test_utils::join_metadata(uid, port),
            ))
            .await
            .unwrap();
    }

    assert!(manager.view().handle_for_uid("B1").is_some());
    assert!(manager.view().handle_for_uid("C1").is_some());
    assert!(manager.view().handle_for_uid("D1").is_none());

    let view = manager.get_view();
    assert_eq!(view.local.uid, "A0");
    assert_eq!(view.local.name, "broker-a");
    assert_eq!(manager.get_statistics().cluster_name, "it");
}
