//! `MatchingData`: what a node input read, handed to an `InputMatcher`
//!
//! Every input in this crate reads text (a tag name, one attribute, one
//! class) or finds nothing. Keeping that behind one type lets a single
//! matcher serve any input.

/// A value read off a node by a [`DataInput`](crate::DataInput).
///
/// ```
/// use sift::MatchingData;
///
/// let data = MatchingData::from(Some("dialog".to_string()));
/// assert_eq!(data.as_str(), Some("dialog"));
/// assert!(MatchingData::from(None::<String>).is_absent());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MatchingData {
    /// The node has no such value. Predicates over it never match.
    #[default]
    Absent,

    /// Text read off the node. An empty attribute is `Text("")`, not `Absent`.
    Text(String),
}

impl MatchingData {
    /// Nothing was read.
    #[inline]
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// The text, if any.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Absent => None,
        }
    }
}

impl From<&str> for MatchingData {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for MatchingData {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Option<String>> for MatchingData {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Absent, Self::Text)
    }
}
