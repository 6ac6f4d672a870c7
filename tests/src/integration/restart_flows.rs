//! # Restart Flows
//!
//! Records persisted through the engine survive a restart of the control
//! manager; restored servers stay in route-all until their filter sequences
//! catch up with what was stored.

use crate::fixtures::{announce, exact_base, exact_update, join, LogCapture};
use bc_01_cluster_view::test_utils::{join_metadata, make_node, RecordingEngine, ViewKeeperHarness};
use bc_01_cluster_view::{ClusterViewConfig, MembershipEvent, NodeMetadata, NodeStatus, ViewMember};
use bc_02_control_manager::test_utils::{ControlHarness, MembershipCall};
use bc_02_control_manager::ControlState;

/// New manager over the records `before` persisted, restored but not recovered.
fn restarted(before: &ControlHarness) -> ControlHarness {
    let stored = before.view.engine.stored_records();
    let after = ControlHarness::over(ViewKeeperHarness::with_engine(
        ClusterViewConfig::for_testing(),
        RecordingEngine::with_store(&stored),
    ));
    let mappings = after.manager.restore_remote_servers(stored).unwrap();
    assert!(!mappings.is_empty());
    after
}

#[tokio::test]
async fn test_restart_reconciles_restored_server() {
    let (logs, _guard) = LogCapture::install("info");
    let before = ControlHarness::running().await;
    join(&before, "B1", 3, 7001).await.unwrap();
    announce(
        &before,
        "B1",
        3,
        NodeMetadata::new()
            .with_filter(exact_base(5))
            .with_filter(exact_update(6))
            .with_filter(exact_update(7)),
    )
    .await
    .unwrap();

    let after = restarted(&before);
    after.manager.recovery_completed(2).await.unwrap();
    assert_eq!(after.manager.state(), ControlState::Running);
    assert!(after
        .membership
        .calls()
        .contains(&MembershipCall::PublishRestored(vec!["B1".to_string()])));
    assert!(!logs.with_message("stored records restored").is_empty());

    let b = after.manager.view().handle_for_uid("B1").unwrap();
    assert_eq!(after.manager.view().is_route_all(b), Some(true));

    after
        .manager
        .on_membership_event(MembershipEvent::view_change(
            2,
            vec![ViewMember {
                node: make_node("B1", 3),
                status: NodeStatus::Alive,
                metadata: Some(
                    join_metadata("b1", 7001)
                        .with_filter(exact_base(5))
                        .with_filter(exact_update(6)),
                ),
            }],
        ))
        .await
        .unwrap();
    assert_eq!(after.manager.view().is_route_all(b), Some(true));
    assert!(!after.manager.view().is_reconciliation_finished());

    announce(&after, "B1", 3, NodeMetadata::new().with_filter(exact_update(7)))
        .await
        .unwrap();
    assert_eq!(after.manager.view().is_route_all(b), Some(false));
    assert!(after.manager.view().is_reconciliation_finished());
}

#[tokio::test]
async fn test_restart_keeps_fencing() {
    let before = ControlHarness::running().await;
    join(&before, "A1", 5, 7000).await.unwrap();
    let a = before.manager.view().handle_for_uid("A1").unwrap();
    before.manager.admin_delete_node(a).await.unwrap();

    let after = restarted(&before);
    after.manager.recovery_completed(2).await.unwrap();
    assert!(after.manager.view().removed_servers().is_fenced("A1", 5));

    join(&after, "A1", 5, 7000).await.unwrap();
    assert!(after.manager.view().handle_for_uid("A1").is_none());
    join(&after, "A1", 6, 7000).await.unwrap();
    assert!(after.manager.view().handle_for_uid("A1").is_some());
}

#[tokio::test]
async fn test_restored_server_missing_from_cluster_can_be_deleted() {
    let before = ControlHarness::running().await;
    join(&before, "B1", 3, 7001).await.unwrap();
    announce(&before, "B1", 3, NodeMetadata::new().with_filter(exact_base(4)))
        .await
        .unwrap();

    let after = restarted(&before);
    after.manager.recovery_completed(2).await.unwrap();
    after
        .manager
        .on_membership_event(MembershipEvent::view_change(2, Vec::new()))
        .await
        .unwrap();

    let b = after.manager.view().handle_for_uid("B1").unwrap();
    after.manager.admin_delete_node(b).await.unwrap();

    assert!(after.manager.view().get_restored_not_in_view().is_empty());
    assert!(after
        .membership
        .calls()
        .contains(&MembershipCall::ClearRetainedAttributes {
            uid: "B1".into(),
            incarnation: 3
        }));
    assert!(after.view.engine.stored_records().len() < before.view.engine.stored_records().len());
}

#[tokio::test]
async fn test_incarnation_must_advance_across_restart() {
    let before = ControlHarness::running().await;
    join(&before, "B1", 1, 7001).await.unwrap();

    let after = restarted(&before);
    assert!(after.manager.recovery_completed(1).await.is_err());
    assert_eq!(after.manager.state(), ControlState::Created);
    assert!(after.membership.calls().is_empty());
}
