use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use promrelay_forwarder::{EndpointOptions, ForwarderOptions};
use promrelay_remote_write::proto::WriteRequest;
use promrelay_resources::{Datapoint, Tags, TenantKey, WriteQuery, WriteQueryOptions};

/// One request observed by the mock remote-write endpoint.
#[derive(Debug, Clone)]
pub struct ReceivedWrite {
    pub tenant: Option<String>,
    pub content_encoding: Option<String>,
    pub content_type: Option<String>,
    pub authorization: Option<String>,
    pub remote_write_version: Option<String>,
    pub request: WriteRequest,
    /// Status the mock answered with.
    pub status: u16,
}

/// In-memory remote-write endpoint with scriptable responses.
///
/// Every request is decoded and recorded, then answered with the next
/// scripted status (200 once the script runs out).
#[derive(Default)]
pub struct MockRemote {
    requests: Mutex<Vec<ReceivedWrite>>,
    responses: Mutex<VecDeque<u16>>,
}

impl MockRemote {
    pub fn script_responses(&self, statuses: impl IntoIterator<Item = u16>) {
        self.responses.lock().unwrap().extend(statuses);
    }

    pub fn requests(&self) -> Vec<ReceivedWrite> {
        self.requests.lock().unwrap().clone()
    }
}

/// Binds the mock endpoint on an ephemeral port and returns its write URL.
pub async fn start_mock_remote() -> (String, Arc<MockRemote>) {
    let state = Arc::new(MockRemote::default());
    let app = Router::new()
        .route("/api/v1/write", post(write_handler))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock endpoint");
    let address = format!("http://{}/api/v1/write", listener.local_addr().expect("local addr"));
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve mock endpoint");
    });

    (address, state)
}

async fn write_handler(
    State(state): State<Arc<MockRemote>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let request = promrelay_remote_write::decode(&body).expect("decode remote write payload");
    let header = |name: &str| {
        headers
            .get(name)
            .map(|value| value.to_str().expect("header value").to_string())
    };

    let status = state.responses.lock().unwrap().pop_front().unwrap_or(200);
    state.requests.lock().unwrap().push(ReceivedWrite {
        tenant: header("X-Scope-OrgID"),
        content_encoding: header("content-encoding"),
        content_type: header("content-type"),
        authorization: header("authorization"),
        remote_write_version: header("X-Prometheus-Remote-Write-Version"),
        request,
        status,
    });

    StatusCode::from_u16(status).expect("valid scripted status")
}

/// Polls until the mock endpoint has seen at least `count` requests.
pub async fn wait_for_requests(state: &Arc<MockRemote>, count: usize) {
    for _ in 0..250 {
        if state.requests().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "mock endpoint saw {} requests, expected at least {count}",
        state.requests().len()
    );
}

pub fn write_query(pairs: &[(&str, &str)]) -> WriteQuery {
    WriteQuery::new(WriteQueryOptions {
        tags: Tags::from_pairs(
            pairs
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string())),
        ),
        datapoints: vec![Datapoint {
            timestamp_nanos: 1_700_000_000_000_000_000,
            value: 1.0,
        }],
        ..Default::default()
    })
    .expect("valid query")
}

/// Options pointing at the mock endpoint, with a tick interval long enough
/// to keep timers out of the picture unless a test shortens it.
pub fn forwarder_options(address: &str, tenant_default: &str) -> ForwarderOptions {
    ForwarderOptions::new(TenantKey::new_unchecked(tenant_default))
        .with_endpoint(EndpointOptions::new("primary", address))
        .with_tick_interval(Duration::from_secs(60))
}
