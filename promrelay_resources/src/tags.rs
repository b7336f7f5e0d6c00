use std::fmt;

use bytes::Bytes;

/// A single metric tag.
///
/// Names and values are raw byte sequences. Producers routinely hand out
/// tags that alias a shared backing buffer, which is why the deep-copy path
/// exists on [`Tags`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    pub name: Bytes,
    pub value: Bytes,
}

/// An ordered set of tags identifying a time series.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Tags(Vec<Tag>);

impl Tag {
    pub fn new(name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl Tags {
    pub fn new(tags: Vec<Tag>) -> Self {
        Self(tags)
    }

    /// Builds a tag set from (name, value) pairs, preserving order.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Bytes>,
        V: Into<Bytes>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(name, value)| Tag::new(name, value))
                .collect(),
        )
    }

    /// Returns the value of the first tag with the given name.
    pub fn get(&self, name: &[u8]) -> Option<&Bytes> {
        self.0
            .iter()
            .find(|tag| tag.name.as_ref() == name)
            .map(|tag| &tag.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copies every tag into freshly owned buffers.
    ///
    /// The result shares nothing with the original, so it stays valid even
    /// when the producer recycles the buffers backing the source tags.
    pub fn deep_copy(&self) -> Self {
        Self(
            self.0
                .iter()
                .map(|tag| Tag {
                    name: Bytes::copy_from_slice(&tag.name),
                    value: Bytes::copy_from_slice(&tag.value),
                })
                .collect(),
        )
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, tag) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(
                f,
                "{}={}",
                String::from_utf8_lossy(&tag.name),
                String::from_utf8_lossy(&tag.value)
            )?;
        }
        Ok(())
    }
}
