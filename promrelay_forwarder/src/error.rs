use promrelay_remote_write::EncodeError;
use promrelay_resources::ResourceError;
use snafu::Snafu;

/// Forwarder error types.
///
/// Errors from the asynchronous flush path are logged and counted, never
/// surfaced to the producer that enqueued the data; only `write` and
/// construction return them directly.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ForwarderError {
    /// Configuration failed validation at startup.
    #[snafu(display("invalid options: {message}"))]
    InvalidOptions { message: String },
    /// Could not build the shared HTTP client.
    #[snafu(display("failed to build http client"))]
    HttpClient { source: reqwest::Error },
    /// The forwarder was closed; no further writes are accepted.
    #[snafu(display("forwarder is closed"))]
    Closed,
    /// Deep-copying a reused producer query failed validation.
    #[snafu(display("failed to copy ingestor write"))]
    QueryCopy { source: ResourceError },
    /// The batch could not be converted to the wire format.
    #[snafu(display("failed to encode batch"))]
    Encode { source: EncodeError },
    /// The endpoint rejected the request with a non-retryable client error.
    #[snafu(display("invalid request: status={status}, resp={body}"))]
    InvalidParams { status: u16, body: String },
    /// The endpoint answered with a retryable status (5xx or 429).
    #[snafu(display("expected status code 2xx: actual={status}, resp={body}"))]
    Status { status: u16, body: String },
    /// The request never reached the endpoint.
    #[snafu(display("error connecting to remote endpoint"))]
    Transport { source: reqwest::Error },
    /// The retry loop was interrupted by shutdown.
    #[snafu(display("write canceled by shutdown"))]
    Canceled,
}

pub type Result<T, E = ForwarderError> = std::result::Result<T, E>;

impl ForwarderError {
    /// Whether another delivery attempt may succeed.
    pub(crate) fn is_retryable(&self) -> bool {
        matches!(
            self,
            ForwarderError::Status { .. } | ForwarderError::Transport { .. }
        )
    }
}
