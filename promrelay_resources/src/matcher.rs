use bytes::Bytes;

use crate::tags::Tags;

/// Tag-based matcher used to route write queries to tenants.
///
/// A matcher is a conjunction of filters: a tag set matches when every
/// filter is satisfied. Exact value matching and name-presence checks are
/// supported; an empty matcher matches any tag set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagMatcher {
    filters: Vec<TagFilter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TagFilter {
    Eq { name: Bytes, value: Bytes },
    Present { name: Bytes },
}

impl TagMatcher {
    /// Creates a matcher requiring every given (name, value) pair to be
    /// present with an exactly matching value.
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Bytes>,
        V: Into<Bytes>,
    {
        Self {
            filters: pairs
                .into_iter()
                .map(|(name, value)| TagFilter::Eq {
                    name: name.into(),
                    value: value.into(),
                })
                .collect(),
        }
    }

    /// Creates an empty matcher that accepts any tag set.
    pub fn any() -> Self {
        Self::default()
    }

    /// Additionally requires a tag with the given name to be present,
    /// regardless of its value.
    #[must_use]
    pub fn with_present(mut self, name: impl Into<Bytes>) -> Self {
        self.filters.push(TagFilter::Present { name: name.into() });
        self
    }

    /// Checks whether the given tag set satisfies every filter.
    pub fn matches(&self, tags: &Tags) -> bool {
        self.filters.iter().all(|filter| match filter {
            TagFilter::Eq { name, value } => {
                tags.get(name).is_some_and(|actual| actual == value)
            }
            TagFilter::Present { name } => tags.get(name).is_some(),
        })
    }
}
