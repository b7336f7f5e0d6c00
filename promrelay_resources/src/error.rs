use snafu::Snafu;

/// Validation errors for the resource types.
///
/// The message is surfaced to the caller that constructed the value, so it
/// should say which precondition failed.
#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ResourceError {
    /// A write query must carry at least one tag.
    #[snafu(display("write query has no tags"))]
    EmptyTags,
    /// A write query must carry at least one datapoint.
    #[snafu(display("write query has no datapoints"))]
    EmptyDatapoints,
    /// Tenant keys are non-empty strings.
    #[snafu(display("tenant key must not be empty"))]
    EmptyTenant,
}

pub type ResourceResult<T, E = ResourceError> = std::result::Result<T, E>;
