use std::time::Duration;

use common::{forwarder_options, start_mock_remote, wait_for_requests, write_query};
use promrelay_forwarder::Forwarder;

mod common;

#[tokio::test]
async fn test_tick_skips_batches_below_threshold() {
    let (address, remote) = start_mock_remote().await;
    // threshold = queue_size / 10 = 10, so 5 buffered queries stay put.
    let forwarder = Forwarder::new(
        forwarder_options(&address, "d")
            .with_queue_size(100)
            .with_tick_interval(Duration::from_millis(50)),
    )
    .expect("start forwarder");

    for i in 0..5 {
        forwarder
            .write(write_query(&[("__name__", "x"), ("i", &i.to_string())]))
            .await
            .expect("write");
    }
    // Idle through a few ticks.
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(remote.requests().is_empty());

    // The final drain ignores the threshold.
    forwarder.close().await.expect("close");
    let requests = remote.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].request.timeseries.len(), 5);
}

#[tokio::test]
async fn test_tick_flushes_batches_above_threshold() {
    let (address, remote) = start_mock_remote().await;
    // threshold = 10 / 10 = 1: any non-empty queue flushes on the tick.
    let forwarder = Forwarder::new(
        forwarder_options(&address, "d")
            .with_queue_size(10)
            .with_tick_interval(Duration::from_millis(50)),
    )
    .expect("start forwarder");

    for i in 0..3 {
        forwarder
            .write(write_query(&[("__name__", "x"), ("i", &i.to_string())]))
            .await
            .expect("write");
    }
    wait_for_requests(&remote, 1).await;
    forwarder.close().await.expect("close");

    let requests = remote.requests();
    assert_eq!(requests[0].tenant.as_deref(), Some("d"));
    let total: usize = requests
        .iter()
        .map(|received| received.request.timeseries.len())
        .sum();
    assert_eq!(total, 3);
}

#[tokio::test]
async fn test_retry_until_benign_conflict() {
    let (address, remote) = start_mock_remote().await;
    remote.script_responses([500, 500, 409]);
    let forwarder = Forwarder::new(
        forwarder_options(&address, "d")
            .with_queue_size(1)
            .with_retries(3),
    )
    .expect("start forwarder");

    forwarder
        .write(write_query(&[("__name__", "x"), ("q", "retried")]))
        .await
        .expect("write");
    forwarder
        .write(write_query(&[("__name__", "x"), ("q", "tail")]))
        .await
        .expect("write");

    // Two failed attempts, then the 409 terminates the retry loop as a
    // benign duplicate. Let the retries finish before closing so the
    // shutdown token cannot cut the backoff short.
    wait_for_requests(&remote, 3).await;
    forwarder.close().await.expect("close");

    let requests = remote.requests();
    assert_eq!(requests.len(), 4);
    let retried: Vec<_> = requests
        .iter()
        .filter(|received| {
            received.request.timeseries[0]
                .labels
                .iter()
                .any(|label| label.name == "q" && label.value == "retried")
        })
        .collect();
    assert_eq!(retried.len(), 3);
    assert_eq!(
        retried
            .iter()
            .map(|received| received.status)
            .collect::<Vec<_>>(),
        vec![500, 500, 409]
    );
}

#[tokio::test]
async fn test_retries_exhausted_after_configured_attempts() {
    let (address, remote) = start_mock_remote().await;
    remote.script_responses([500, 500, 500]);
    let forwarder = Forwarder::new(
        forwarder_options(&address, "d")
            .with_queue_size(1)
            .with_retries(2),
    )
    .expect("start forwarder");

    forwarder
        .write(write_query(&[("__name__", "x"), ("q", "doomed")]))
        .await
        .expect("write");
    forwarder
        .write(write_query(&[("__name__", "x"), ("q", "tail")]))
        .await
        .expect("write");

    // retries + 1 attempts for the failing batch, no more.
    wait_for_requests(&remote, 3).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    forwarder.close().await.expect("close");

    let requests = remote.requests();
    let doomed = requests
        .iter()
        .filter(|received| {
            received.request.timeseries[0]
                .labels
                .iter()
                .any(|label| label.name == "q" && label.value == "doomed")
        })
        .count();
    assert_eq!(doomed, 3);

    // The tail batch is unaffected by the abandoned one.
    let tail: Vec<_> = requests
        .iter()
        .filter(|received| {
            received.request.timeseries[0]
                .labels
                .iter()
                .any(|label| label.name == "q" && label.value == "tail")
        })
        .collect();
    assert_eq!(tail.len(), 1);
    assert_eq!(tail[0].status, 200);
}
