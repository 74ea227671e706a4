//! `InputMatcher`: value tests shared by every node input
//!
//! Matchers see only [`MatchingData`], never the node, so one matcher type
//! serves tag names, attribute values and classes alike. Each rule atom
//! compiles to exactly one of:
//!
//! | Atom | Matcher |
//! |------|---------|
//! | `div` | [`ExactMatcher::ignoring_case`] |
//! | `.open`, `[name]` | [`PresenceMatcher`] |
//! | `[name=v]` | [`ExactMatcher::new`] |
//! | `[name^=v]`, `[name*=v]`, `[name$=v]` | [`PatternMatcher`] |

use crate::MatchingData;
use std::fmt::Debug;

/// A test over a value read off a node.
///
/// [`MatchingData::Absent`] never matches, whatever the matcher.
///
/// ```
/// use sift::{ExactMatcher, InputMatcher, MatchingData};
///
/// let matcher = ExactMatcher::new("heading");
/// assert!(matcher.matches(&MatchingData::Text("heading".to_string())));
/// assert!(!matcher.matches(&MatchingData::Absent));
/// ```
#[diagnostic::on_unimplemented(
    message = "`{Self}` does not implement `InputMatcher`",
    label = "this type cannot test a value read off a node",
    note = "use ExactMatcher, PatternMatcher or PresenceMatcher, or implement `matches(&self, &MatchingData) -> bool`"
)]
pub trait InputMatcher: Debug {
    /// Does `value` pass?
    fn matches(&self, value: &MatchingData) -> bool;
}

#[diagnostic::do_not_recommend]
impl InputMatcher for Box<dyn InputMatcher> {
    fn matches(&self, value: &MatchingData) -> bool {
        (**self).matches(value)
    }
}

/// Whole-value equality, case-sensitive unless built with
/// [`ignoring_case`](Self::ignoring_case).
///
/// ```
/// use sift::{ExactMatcher, InputMatcher};
///
/// assert!(!ExactMatcher::new("dialog").matches(&"Dialog".into()));
/// assert!(ExactMatcher::ignoring_case("div").matches(&"DIV".into()));
/// assert!(!ExactMatcher::new("dialog").matches(&"dialog ".into()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExactMatcher {
    expected: String,
    ignore_case: bool,
}

impl ExactMatcher {
    /// Case-sensitive equality, as attribute values compare.
    pub fn new(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            ignore_case: false,
        }
    }

    /// ASCII case-insensitive equality, as tag names compare.
    pub fn ignoring_case(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            ignore_case: true,
        }
    }
}

impl InputMatcher for ExactMatcher {
    fn matches(&self, value: &MatchingData) -> bool {
        value.as_str().is_some_and(|text| {
            if self.ignore_case {
                text.eq_ignore_ascii_case(&self.expected)
            } else {
                text == self.expected
            }
        })
    }
}

/// Any value at all, the empty string included.
#[derive(Debug, Clone, Copy, Default)]
pub struct PresenceMatcher;

impl InputMatcher for PresenceMatcher {
    fn matches(&self, value: &MatchingData) -> bool {
        !value.is_absent()
    }
}

/// A regex compiled once and reused for every evaluation.
///
/// The `regex` crate matches in linear time, so operands taken from rule
/// text cannot cause catastrophic backtracking.
///
/// ```
/// use sift::{InputMatcher, PatternMatcher};
///
/// let matcher = PatternMatcher::new(r"^exit_").unwrap();
/// assert!(matcher.matches(&"exit_full_screen".into()));
/// assert!(!matcher.matches(&"enter".into()));
/// ```
#[derive(Debug, Clone)]
pub struct PatternMatcher(regex::Regex);

impl PatternMatcher {
    /// Compile `pattern`.
    ///
    /// # Errors
    ///
    /// Returns the `regex` error if the pattern does not compile.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        regex::Regex::new(pattern).map(Self)
    }

    /// The pattern as compiled.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl InputMatcher for PatternMatcher {
    fn matches(&self, value: &MatchingData) -> bool {
        value.as_str().is_some_and(|text| self.0.is_match(text))
    }
}
