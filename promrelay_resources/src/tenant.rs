use std::fmt;
use std::sync::Arc;

use snafu::ensure;

use crate::error::{EmptyTenantSnafu, ResourceResult};
use crate::matcher::TagMatcher;

/// A tenant identifier.
///
/// A tenant is a logical namespace for remote-write traffic, conveyed to the
/// remote endpoint as an HTTP header value. Equality is the only operation
/// the forwarder performs on it; clones are cheap.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TenantKey(Arc<str>);

/// A routing rule: queries whose tags satisfy `filter` belong to `tenant`.
///
/// Rules are static after construction and evaluated in declaration order;
/// the first match wins.
#[derive(Debug, Clone)]
pub struct TenantRule {
    pub filter: TagMatcher,
    pub tenant: TenantKey,
}

impl TenantKey {
    pub fn new(key: impl AsRef<str>) -> ResourceResult<Self> {
        let key = key.as_ref();
        ensure!(!key.is_empty(), EmptyTenantSnafu);

        Ok(Self(key.into()))
    }

    /// Constructs a key without validating it. Reserved for literals.
    pub fn new_unchecked(key: impl AsRef<str>) -> Self {
        Self(key.as_ref().into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TenantRule {
    pub fn new(filter: TagMatcher, tenant: TenantKey) -> Self {
        Self { filter, tenant }
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
