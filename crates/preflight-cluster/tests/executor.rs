// crates/preflight-cluster/tests/executor.rs
// ============================================================================
// Module: Ephemeral Executor Tests
// Description: Pod polling, single-line capture and unconditional removal.
// Purpose: Ensure checker Pods never outlive their result.
// Dependencies: preflight-cluster, preflight-core, tokio
// ============================================================================
//! ## Overview
//! Drives the executor against the in-memory cluster with paused time so
//! poll loops and deadlines run instantly.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use preflight_cluster::ClusterError;
use preflight_cluster::ClusterObject;
use preflight_cluster::InMemoryCluster;
use preflight_cluster::PodPhase;
use preflight_cluster::executor::single_line;
use preflight_core::CheckContext;
use preflight_core::CheckError;
use preflight_core::ErrorClass;
use preflight_core::MemoryAuditSink;
use preflight_core::Mismatch;
use preflight_core::PermissionSet;

#[tokio::test(start_paused = true)]
async fn succeeded_pod_yields_its_line_and_is_deleted() {
    let cluster = InMemoryCluster::new();
    cluster.script_pod(
        common::NAMESPACE,
        common::POD,
        &[PodPhase::Pending, PodPhase::Running, PodPhase::Succeeded],
        "\n  storage.buckets.get;iam.roles.get  \n\n",
    );
    let audit = Arc::new(MemoryAuditSink::new());
    let executor = common::executor(&cluster).with_audit(audit.clone());

    let line = executor.run(&CheckContext::new(), &common::pod()).await.unwrap();

    assert_eq!(line, "storage.buckets.get;iam.roles.get");
    assert!(!cluster.contains(&common::pod().resource()));
    assert_eq!(
        cluster.operations(),
        vec!["create Pod crossplane/checker", "logs Pod crossplane/checker", "delete Pod crossplane/checker"]
    );
    assert_eq!(audit.event_names(), vec!["resource_created", "pod_terminated", "resource_deleted"]);
    assert_eq!(audit.events()[1]["polls"], 3);
}

#[tokio::test(start_paused = true)]
async fn stale_pod_is_removed_before_launch() {
    let cluster = InMemoryCluster::new().with_deletion_lag(2);
    cluster.insert(ClusterObject::Pod(common::pod()));
    cluster.script_pod(common::NAMESPACE, common::POD, &[PodPhase::Succeeded], "ok");

    let line = common::executor(&cluster).run(&CheckContext::new(), &common::pod()).await.unwrap();

    assert_eq!(line, "ok");
    let operations = cluster.operations();
    assert_eq!(operations[0], "delete Pod crossplane/checker");
    assert_eq!(operations[1], "create Pod crossplane/checker");
}

#[tokio::test(start_paused = true)]
async fn stale_pod_that_never_disappears_hits_the_removal_deadline() {
    let cluster = InMemoryCluster::new().with_deletion_lag(1_000);
    cluster.insert(ClusterObject::Pod(common::pod()));

    let err = common::executor(&cluster).run(&CheckContext::new(), &common::pod()).await.unwrap_err();

    assert_eq!(
        err,
        CheckError::DeadlineExceeded("waiting for stale Pod crossplane/checker to be removed".to_string())
    );
    assert!(common::operations_with(&cluster, "create").is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_pod_reports_its_line_as_the_error() {
    let cluster = InMemoryCluster::new();
    cluster.script_pod(common::NAMESPACE, common::POD, &[PodPhase::Running, PodPhase::Failed], "role not found\n");

    let err = common::executor(&cluster).run(&CheckContext::new(), &common::pod()).await.unwrap_err();

    assert_eq!(err, CheckError::JobFailed("role not found".to_string()));
    assert!(!cluster.contains(&common::pod().resource()));
}

#[tokio::test(start_paused = true)]
async fn more_than_one_line_is_a_protocol_violation() {
    let cluster = InMemoryCluster::new();
    cluster.script_pod(common::NAMESPACE, common::POD, &[PodPhase::Succeeded], "a\nb\n");

    let err = common::executor(&cluster).run(&CheckContext::new(), &common::pod()).await.unwrap_err();

    assert_eq!(err, CheckError::Protocol("got more than 1 log line".to_string()));
    assert_eq!(err.class(), ErrorClass::ProtocolViolation);
    assert!(!cluster.contains(&common::pod().resource()));
}

#[tokio::test(start_paused = true)]
async fn failed_pod_with_more_than_one_line_is_a_protocol_violation() {
    let cluster = InMemoryCluster::new();
    cluster.script_pod(common::NAMESPACE, common::POD, &[PodPhase::Running, PodPhase::Failed], "first\nsecond\n");

    let err = common::executor(&cluster).run(&CheckContext::new(), &common::pod()).await.unwrap_err();

    assert_eq!(err, CheckError::Protocol("got more than 1 log line".to_string()));
    assert_eq!(err.class(), ErrorClass::ProtocolViolation);
    assert!(!cluster.contains(&common::pod().resource()));
}

#[tokio::test(start_paused = true)]
async fn pod_that_never_terminates_exceeds_the_deadline_and_is_deleted() {
    let cluster = InMemoryCluster::new();
    cluster.script_pod(common::NAMESPACE, common::POD, &[PodPhase::Running], "");

    let err = common::executor(&cluster).run(&CheckContext::new(), &common::pod()).await.unwrap_err();

    assert_eq!(
        err,
        CheckError::DeadlineExceeded(
            "waiting for pod crossplane/checker to terminate (last phase Running)".to_string()
        )
    );
    assert!(common::operations_with(&cluster, "logs").is_empty());
    assert!(!cluster.contains(&common::pod().resource()));
}

#[tokio::test(start_paused = true)]
async fn cleanup_failure_is_attached_to_the_primary_failure() {
    let cluster = InMemoryCluster::new();
    cluster.script_pod(common::NAMESPACE, common::POD, &[PodPhase::Failed], "boom");
    cluster.fail_delete(
        common::pod().resource(),
        ClusterError::Api {
            code: 403,
            message: "forbidden".to_string(),
        },
    );

    let err = common::executor(&cluster).run(&CheckContext::new(), &common::pod()).await.unwrap_err();

    assert_eq!(err.primary(), &CheckError::JobFailed("boom".to_string()));
    assert_eq!(err.class(), ErrorClass::Transient);
    let CheckError::Compound {
        cleanup, ..
    } = err
    else {
        panic!("expected compound error");
    };
    assert_eq!(cleanup.failures[0].resource, "Pod crossplane/checker");
}

#[tokio::test(start_paused = true)]
async fn cleanup_failure_alone_fails_a_passing_run() {
    let cluster = InMemoryCluster::new();
    cluster.script_pod(common::NAMESPACE, common::POD, &[PodPhase::Succeeded], "ok");
    cluster.fail_delete(common::pod().resource(), ClusterError::Transport("connection reset".to_string()));

    let err = common::executor(&cluster).run(&CheckContext::new(), &common::pod()).await.unwrap_err();

    assert!(matches!(err, CheckError::Cleanup(_)));
}

#[tokio::test(start_paused = true)]
async fn hung_pod_removal_is_bounded_by_the_removal_timeout() {
    let cluster = InMemoryCluster::new();
    cluster.script_pod(common::NAMESPACE, common::POD, &[PodPhase::Succeeded], "ok");
    cluster.hang_delete(common::pod().resource());

    let err = common::executor(&cluster).run(&CheckContext::new(), &common::pod()).await.unwrap_err();

    let CheckError::Cleanup(cleanup) = err else {
        panic!("expected cleanup error");
    };
    assert_eq!(cleanup.failures[0].resource, "Pod crossplane/checker");
    assert!(cleanup.failures[0].reason.contains("did not finish within 10s"), "{}", cleanup.failures[0].reason);
}

#[tokio::test(start_paused = true)]
async fn cancellation_leaves_the_pod_in_place() {
    let cluster = InMemoryCluster::new();
    cluster.script_pod(common::NAMESPACE, common::POD, &[PodPhase::Running], "");
    let ctx = CheckContext::new();
    let cancel = ctx.cancellation();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        cancel.cancel();
    });

    let err = common::executor(&cluster).run(&ctx, &common::pod()).await.unwrap_err();

    assert_eq!(err, CheckError::Cancelled);
    assert!(cluster.contains(&common::pod().resource()));
    assert!(common::operations_with(&cluster, "delete").is_empty());
}

#[tokio::test(start_paused = true)]
async fn missing_permissions_are_listed() {
    let cluster = InMemoryCluster::new();
    cluster.script_pod(common::NAMESPACE, common::POD, &[PodPhase::Succeeded], "a.get;b.get;x.list");
    let expected = PermissionSet::from_delimited("a.get;b.get;c.get", ';');

    let err = common::executor(&cluster)
        .check_permissions(&CheckContext::new(), &common::pod(), &expected)
        .await
        .unwrap_err();

    assert_eq!(err, CheckError::PermissionMismatch(Mismatch::MissingPermissions(vec!["c.get".to_string()])));
    assert_eq!(err.to_string(), "role missing permissions: c.get");
}

#[tokio::test(start_paused = true)]
async fn missing_permissions_survive_a_failed_pod_removal() {
    let cluster = InMemoryCluster::new();
    cluster.script_pod(common::NAMESPACE, common::POD, &[PodPhase::Succeeded], "a;b;c");
    cluster.fail_delete(common::pod().resource(), ClusterError::Transport("boom".to_string()));
    let expected = PermissionSet::from_delimited("a;b;d", ';');

    let err = common::executor(&cluster)
        .check_permissions(&CheckContext::new(), &common::pod(), &expected)
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::PermissionMismatch);
    assert_eq!(err.mismatch(), Some(&Mismatch::MissingPermissions(vec!["d".to_string()])));
    let CheckError::Compound {
        cleanup, ..
    } = err
    else {
        panic!("expected compound error");
    };
    assert_eq!(cleanup.failures[0].reason, "cluster transport error: boom");
}

#[tokio::test(start_paused = true)]
async fn superset_output_satisfies_the_expected_permissions() {
    let cluster = InMemoryCluster::new();
    cluster.script_pod(common::NAMESPACE, common::POD, &[PodPhase::Succeeded], "a.get;b.get;extra.delete");
    let expected = PermissionSet::from_delimited("b.get;a.get", ';');

    let observed = common::executor(&cluster)
        .check_permissions(&CheckContext::new(), &common::pod(), &expected)
        .await
        .unwrap();

    assert_eq!(observed.len(), 3);
}

#[test]
fn single_line_rejects_empty_output() {
    assert_eq!(single_line(" \n\n").unwrap_err(), CheckError::Protocol("no log line".to_string()));
    assert_eq!(single_line("\r\n value \r\n").unwrap(), "value");
}
