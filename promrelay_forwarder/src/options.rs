use std::time::Duration;

use promrelay_resources::{TenantKey, TenantRule};
use snafu::ensure;

use crate::error::{InvalidOptionsSnafu, Result};

/// Header used to convey the tenant unless the endpoint overrides it.
pub const DEFAULT_TENANT_HEADER: &str = "X-Scope-OrgID";

/// A remote-write endpoint.
///
/// Only the first configured endpoint receives traffic; additional entries
/// are reserved for per-aggregation routing.
#[derive(Debug, Clone)]
pub struct EndpointOptions {
    /// Name used to tag this endpoint's metrics.
    pub name: String,
    /// Full write URL, e.g. `http://mimir:9009/api/v1/push`.
    pub address: String,
    /// When set, requests carry HTTP basic auth as `<tenant>:<api_token>`.
    pub api_token: Option<String>,
    /// Header carrying the tenant key.
    pub tenant_header: String,
    /// Additional headers set verbatim on every request.
    pub other_headers: Vec<(String, String)>,
}

/// Forwarder configuration.
#[derive(Debug, Clone)]
pub struct ForwarderOptions {
    /// Number of parallel batch-flush workers.
    pub pool_size: usize,
    /// Capacity of the ingest channel and of each per-tenant queue.
    pub queue_size: usize,
    /// Delivery retries per batch on top of the initial attempt.
    pub retries: usize,
    /// Interval between partial-batch flushes.
    pub tick_interval: Duration,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    pub endpoints: Vec<EndpointOptions>,
    /// Tenant for queries no rule matches.
    pub tenant_default: TenantKey,
    /// Routing rules, evaluated in order; first match wins.
    pub tenant_rules: Vec<TenantRule>,
}

impl EndpointOptions {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            api_token: None,
            tenant_header: DEFAULT_TENANT_HEADER.to_string(),
            other_headers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_tenant_header(mut self, header: impl Into<String>) -> Self {
        self.tenant_header = header.into();
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.other_headers.push((name.into(), value.into()));
        self
    }
}

impl ForwarderOptions {
    /// Creates options with production defaults; endpoints must be added
    /// before the forwarder will validate.
    pub fn new(tenant_default: TenantKey) -> Self {
        Self {
            pool_size: 4,
            queue_size: 256,
            retries: 3,
            tick_interval: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
            endpoints: Vec::new(),
            tenant_default,
            tenant_rules: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    #[must_use]
    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size;
        self
    }

    #[must_use]
    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    #[must_use]
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: EndpointOptions) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    #[must_use]
    pub fn with_rule(mut self, rule: TenantRule) -> Self {
        self.tenant_rules.push(rule);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        ensure!(
            self.pool_size >= 1,
            InvalidOptionsSnafu {
                message: "pool_size must be greater than 0",
            }
        );
        ensure!(
            self.queue_size >= 1,
            InvalidOptionsSnafu {
                message: "queue_size must be greater than 0 to batch writes",
            }
        );
        ensure!(
            !self.tick_interval.is_zero(),
            InvalidOptionsSnafu {
                message: "tick_interval must be non-zero",
            }
        );
        ensure!(
            !self.endpoints.is_empty(),
            InvalidOptionsSnafu {
                message: "endpoints must not be empty",
            }
        );

        Ok(())
    }

    /// Tenant queues below this size are skipped by tick flushes.
    pub(crate) fn flush_threshold(&self) -> usize {
        self.queue_size / 10
    }
}
