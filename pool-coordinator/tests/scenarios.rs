mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{upstream_item, FakeFramedServer, FakeShareSubsystem, FakeUpstream, FakeWebhookSink};
use pool_coordinator::{ClientContext, Coordinator, CoordinatorConfig, DropReason, SubmissionOutcome};

fn max_target_hex() -> String {
    "ff".repeat(32)
}

fn loose_target_hex() -> String {
    // Highest byte zeroed out: still very loose, but not the absolute max,
    // so retargeting to the literal max produces a different value.
    format!("00{}", "ff".repeat(31))
}

struct Harness {
    coordinator: Coordinator,
    upstream: Arc<FakeUpstream>,
    server: Arc<FakeFramedServer>,
    shares: Arc<FakeShareSubsystem>,
    webhooks: Arc<FakeWebhookSink>,
}

fn build(config: CoordinatorConfig) -> Harness {
    let upstream = FakeUpstream::new();
    let server = FakeFramedServer::new();
    let shares = FakeShareSubsystem::new();
    let webhooks = FakeWebhookSink::new();

    let coordinator = Coordinator::new(
        config,
        upstream.clone() as Arc<dyn pool_coordinator::UpstreamNode>,
        server.clone() as Arc<dyn pool_coordinator::FramedServer>,
        shares.clone() as Arc<dyn pool_coordinator::ShareSubsystem>,
        webhooks.clone() as Arc<dyn pool_coordinator::WebhookSink>,
    )
    .expect("valid pool difficulty");

    Harness {
        coordinator,
        upstream,
        server,
        shares,
        webhooks,
    }
}

fn test_config() -> CoordinatorConfig {
    CoordinatorConfig {
        pool_name: "test-pool".to_string(),
        pool_difficulty: 1,
        retry_interval: Duration::from_secs(5),
        retarget_delay: Duration::from_secs(10),
        status_interval: None,
    }
}

async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

fn client(id: u64) -> ClientContext {
    ClientContext {
        id,
        public_address: format!("addr-{id}"),
        graffiti: "11".repeat(32),
    }
}

#[tokio::test(start_paused = true)]
async fn stale_submission_is_dropped_silently() {
    let h = build(test_config());
    h.coordinator.start();
    settle().await;

    h.upstream.push_template(upstream_item(&max_target_hex(), 1_000));
    settle().await;
    h.upstream.push_template(upstream_item(&max_target_hex(), 2_000));
    settle().await;

    let outcome = h
        .coordinator
        .submit_work(client(1), 0, "aa".to_string())
        .await;
    assert_eq!(outcome, SubmissionOutcome::Dropped(DropReason::Stale));

    assert!(h.shares.submitted_shares.lock().await.is_empty());
    assert!(h.upstream.submitted_templates().await.is_empty());
    assert!(h.server.punished.lock().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn duplicate_within_epoch_is_dropped_after_first() {
    let h = build(test_config());
    h.coordinator.start();
    settle().await;

    h.upstream.push_template(upstream_item(&max_target_hex(), 1_000));
    settle().await;

    let first = h
        .coordinator
        .submit_work(client(1), 0, "cafe".to_string())
        .await;
    assert_eq!(
        first,
        SubmissionOutcome::Processed {
            submitted_block: true,
            credited_share: true,
        }
    );

    let second = h
        .coordinator
        .submit_work(client(1), 0, "cafe".to_string())
        .await;
    assert_eq!(second, SubmissionOutcome::Dropped(DropReason::Duplicate));
    assert_eq!(
        h.upstream.submitted_templates().await.len(),
        1,
        "the duplicate must not reach the upstream a second time"
    );
}

#[tokio::test(start_paused = true)]
async fn duplicate_across_epochs_is_processed_again() {
    let h = build(test_config());
    h.coordinator.start();
    settle().await;

    h.upstream.push_template(upstream_item(&max_target_hex(), 1_000));
    settle().await;

    let first = h
        .coordinator
        .submit_work(client(1), 0, "cafe".to_string())
        .await;
    assert_eq!(
        first,
        SubmissionOutcome::Processed {
            submitted_block: true,
            credited_share: true,
        }
    );

    h.upstream.push_template(upstream_item(&max_target_hex(), 2_000));
    settle().await;

    let second = h
        .coordinator
        .submit_work(client(1), 1, "cafe".to_string())
        .await;
    assert_eq!(
        second,
        SubmissionOutcome::Processed {
            submitted_block: true,
            credited_share: true,
        },
        "nonce reused in a new epoch must not be treated as a duplicate"
    );
    assert_eq!(
        h.upstream.submitted_templates().await.len(),
        2,
        "both submissions address different epochs, so both reach the upstream"
    );
}

#[tokio::test(start_paused = true)]
async fn accepted_block_round_trips_with_composed_fields_to_upstream() {
    let h = build(test_config());
    h.coordinator.start();
    settle().await;

    h.upstream.push_template(upstream_item(&max_target_hex(), 1_000));
    settle().await;

    let submitting_client = client(7);
    let outcome = h
        .coordinator
        .submit_work(submitting_client.clone(), 0, "deadbeef".to_string())
        .await;

    assert_eq!(
        outcome,
        SubmissionOutcome::Processed {
            submitted_block: true,
            credited_share: true,
        }
    );

    let submitted = h.upstream.submitted_templates().await;
    assert_eq!(submitted.len(), 1, "exactly one block reaches the upstream");
    let submitted_header = &submitted[0].header;

    // Same template identity (previous-block hash, extra fields untouched),
    // but randomness/graffiti carry this submission's composed values.
    assert_eq!(submitted_header.previous_block_hash, "ab".repeat(32));
    assert_eq!(submitted_header.randomness, "deadbeef");
    assert_eq!(submitted_header.graffiti, submitting_client.graffiti);

    let blocks = h.webhooks.submitted_blocks.lock().await;
    assert_eq!(blocks.len(), 1, "poolSubmittedBlock fires once for the accepted block");

    assert_eq!(
        *h.shares.submitted_shares.lock().await,
        vec![submitting_client.public_address.clone()]
    );
}

#[tokio::test(start_paused = true)]
async fn share_credited_without_meeting_block_target() {
    // Pool difficulty 1 -> PoolTarget == max target (loosest possible), so
    // nearly any digest credits a share; the header target is an extremely
    // tight value that essentially no digest will meet, separating the two
    // checks.
    let mut config = test_config();
    config.pool_difficulty = 1;
    let h = build(config);
    h.coordinator.start();
    settle().await;

    let tight_target = "00".repeat(32);
    h.upstream
        .push_template(upstream_item(&tight_target, 1_000));
    settle().await;

    let outcome = h
        .coordinator
        .submit_work(client(1), 0, "deadbeef".to_string())
        .await;

    match outcome {
        SubmissionOutcome::Processed {
            submitted_block,
            credited_share,
        } => {
            assert!(!submitted_block, "digest should not beat an all-zero target");
            assert!(credited_share, "digest should beat the loosest pool target");
        }
        other => panic!("expected Processed, got {other:?}"),
    }
    assert!(h.upstream.submitted_templates().await.is_empty());
    assert_eq!(h.shares.submitted_shares.lock().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn retarget_no_op_when_difficulty_unchanged() {
    let h = build(test_config());
    h.coordinator.start();
    settle().await;

    h.upstream
        .push_template(upstream_item(&max_target_hex(), 1_000));
    settle().await;

    tokio::time::advance(Duration::from_secs(10)).await;
    settle().await;

    // Max target at difficulty 1 retargets to itself indefinitely when the
    // interval matches the target block time, so no second epoch should
    // have been broadcast.
    let calls = h.server.new_work_calls.lock().await;
    assert_eq!(calls.len(), 1, "expected exactly the initial epoch, no retarget epoch");
}

#[tokio::test(start_paused = true)]
async fn retarget_fires_and_mutates_cached_template() {
    let h = build(test_config());
    h.coordinator.start();
    settle().await;

    // A loose-but-not-maximal target plus a long elapsed retarget window
    // forces the retarget formula to a different value than the template
    // started with.
    let start_target = loose_target_hex();
    h.upstream.push_template(upstream_item(&start_target, 0));
    settle().await;

    tokio::time::advance(Duration::from_secs(10)).await;
    settle().await;

    let calls = h.server.new_work_calls.lock().await;
    assert_eq!(calls.len(), 2, "expected the initial epoch plus one retarget epoch");
    let (second_id, second_template) = &calls[1];
    assert_eq!(*second_id, 1);
    assert_ne!(second_template.header.target, start_target);
}

#[tokio::test(start_paused = true)]
async fn upstream_drop_enters_no_work_mode_and_reconnects() {
    let h = build(test_config());
    h.coordinator.start();
    settle().await;

    h.upstream
        .push_template(upstream_item(&max_target_hex(), 1_000));
    settle().await;
    let attempts_before = h.upstream.connect_attempts();

    // Close, then make the very first reconnect attempt fail, so the outage
    // actually exercises the 5s retry wait instead of reconnecting instantly.
    h.upstream.trigger_close();
    h.upstream.set_connectable(false);
    settle().await;

    assert_eq!(*h.server.wait_for_work_calls.lock().await, 1);
    assert_eq!(*h.webhooks.disconnected_calls.lock().await, 1);
    assert!(
        h.upstream.connect_attempts() > attempts_before,
        "expected an immediate (failing) reconnect attempt on close"
    );

    h.upstream.set_connectable(true);
    let attempts_before_retry = h.upstream.connect_attempts();
    tokio::time::advance(Duration::from_secs(5)).await;
    settle().await;

    assert!(
        h.upstream.connect_attempts() > attempts_before_retry,
        "expected the reconnect loop to retry 5s after the failed attempt"
    );
    assert_eq!(
        *h.webhooks.disconnected_calls.lock().await,
        1,
        "poolDisconnected must fire once per outage, not once per retry"
    );
}

#[tokio::test(start_paused = true)]
async fn malformed_submission_is_punished() {
    let h = build(test_config());
    h.coordinator.start();
    settle().await;

    h.upstream
        .push_template(upstream_item(&max_target_hex(), 1_000));
    settle().await;

    // Not valid hex, so the header fails to encode in step 7.
    let outcome = h
        .coordinator
        .submit_work(client(1), 0, "not-hex!!".to_string())
        .await;

    assert_eq!(outcome, SubmissionOutcome::Dropped(DropReason::Malformed));
    assert_eq!(h.server.punished.lock().await.len(), 1);
    assert!(h.shares.submitted_shares.lock().await.is_empty());
    assert!(h.upstream.submitted_templates().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn next_request_id_survives_a_stop_start_cycle() {
    let h = build(test_config());
    h.coordinator.start();
    settle().await;

    h.upstream
        .push_template(upstream_item(&max_target_hex(), 1_000));
    settle().await;

    h.coordinator.stop();
    h.coordinator.wait_for_stop().await;

    h.coordinator.start();
    settle().await;

    h.upstream
        .push_template(upstream_item(&max_target_hex(), 2_000));
    settle().await;

    let calls = h.server.new_work_calls.lock().await;
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, 0);
    assert_eq!(calls[1].0, 1, "request id must not reset across a restart");
}

#[tokio::test(start_paused = true)]
async fn start_is_idempotent() {
    let h = build(test_config());
    h.coordinator.start();
    h.coordinator.start();
    settle().await;
    assert_eq!(h.upstream.connect_attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn fatal_stream_error_stops_the_coordinator() {
    let h = build(test_config());
    h.coordinator.start();
    settle().await;

    h.upstream
        .push_template(upstream_item(&max_target_hex(), 1_000));
    settle().await;
    assert!(h.coordinator.is_running());

    h.upstream.push_stream_error();
    settle().await;

    assert!(
        !h.coordinator.is_running(),
        "a fatal upstream stream error must tear the whole coordinator down"
    );
    h.coordinator.wait_for_stop().await;
}
