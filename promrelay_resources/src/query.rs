use std::fmt;

use snafu::ensure;

use crate::error::{EmptyDatapointsSnafu, EmptyTagsSnafu, ResourceResult};
use crate::tags::Tags;

/// A single sample: a value observed at a point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Datapoint {
    /// Timestamp in nanoseconds since the Unix epoch.
    pub timestamp_nanos: i64,
    pub value: f64,
}

/// The fields a write query is built from.
#[derive(Debug, Clone, Default)]
pub struct WriteQueryOptions {
    pub tags: Tags,
    pub datapoints: Vec<Datapoint>,
    /// Set when the call site writes the same data under multiple storage
    /// policies; such writes are counted and skipped by the forwarder.
    pub duplicate_write: bool,
    /// Set when the producer recycles the query object between writes.
    /// The forwarder must deep-copy tags and datapoints before enqueueing.
    pub from_ingestor: bool,
}

/// A validated write request for a single time series.
///
/// The forwarder never mutates a query after construction.
#[derive(Debug, Clone)]
pub struct WriteQuery {
    options: WriteQueryOptions,
}

impl WriteQueryOptions {
    /// Copies the fields the write path needs into freshly owned buffers:
    /// tag name/value bytes and the datapoint sequence.
    pub fn deep_copy(&self) -> Self {
        Self {
            tags: self.tags.deep_copy(),
            datapoints: self.datapoints.clone(),
            duplicate_write: self.duplicate_write,
            from_ingestor: self.from_ingestor,
        }
    }
}

impl WriteQuery {
    pub fn new(options: WriteQueryOptions) -> ResourceResult<Self> {
        ensure!(!options.tags.is_empty(), EmptyTagsSnafu);
        ensure!(!options.datapoints.is_empty(), EmptyDatapointsSnafu);

        Ok(Self { options })
    }

    pub fn tags(&self) -> &Tags {
        &self.options.tags
    }

    pub fn datapoints(&self) -> &[Datapoint] {
        &self.options.datapoints
    }

    pub fn options(&self) -> &WriteQueryOptions {
        &self.options
    }
}

impl fmt::Display for WriteQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{}}} ({} datapoints)",
            self.options.tags,
            self.options.datapoints.len()
        )
    }
}
