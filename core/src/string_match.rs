//! `ValueMatchSpec`: what an attribute operator asks for
//!
//! A rule's `[name op value]` is the user's *intent* ("value starts with
//! `exit_`"). It compiles to a runtime [`InputMatcher`] via
//! [`to_input_matcher()`](ValueMatchSpec::to_input_matcher).
//!
//! - [`ValueMatchSpec`] = rule-level specification (what the user wrote)
//! - [`ExactMatcher`](crate::ExactMatcher) / [`PatternMatcher`](crate::PatternMatcher) = runtime engine (what evaluates at match time)
//!
//! Prefix, substring and suffix operators compile to an anchored regex over
//! the escaped operand, built once.

use crate::{
    AttributeInput, ExactMatcher, InputMatcher, PatternMatcher, Predicate, SelectorError,
    SinglePredicate, MAX_PATTERN_LENGTH,
};
use std::fmt;

/// A value match from an attribute selector.
///
/// # Example
///
/// ```
/// use sift::{InputMatcher, ValueMatchSpec};
///
/// let spec = ValueMatchSpec::from_operator("*=", "exit_full_screen").unwrap();
/// let matcher = spec.to_input_matcher().unwrap();
/// assert!(matcher.matches(&"a.exit_full_screen.b".into()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueMatchSpec {
    /// `=`: exact, case-sensitive equality.
    Exact(String),
    /// `^=`: value starts with the operand.
    Prefix(String),
    /// `*=`: value contains the operand.
    Contains(String),
    /// `$=`: value ends with the operand.
    Suffix(String),
}

impl ValueMatchSpec {
    /// Map an attribute operator to a spec; `None` for operators without one
    /// (`~=`, `|=`).
    #[must_use]
    pub fn from_operator(operator: &str, operand: &str) -> Option<Self> {
        let operand = operand.to_string();
        match operator {
            "=" => Some(Self::Exact(operand)),
            "^=" => Some(Self::Prefix(operand)),
            "*=" => Some(Self::Contains(operand)),
            "$=" => Some(Self::Suffix(operand)),
            _ => None,
        }
    }

    /// The operand as written.
    #[must_use]
    pub fn operand(&self) -> &str {
        match self {
            Self::Exact(v) | Self::Prefix(v) | Self::Contains(v) | Self::Suffix(v) => v,
        }
    }

    /// Compile this spec into a runtime [`InputMatcher`].
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError::TooLong`] if the operand exceeds
    /// [`MAX_PATTERN_LENGTH`], or [`SelectorError::InvalidPattern`] if the
    /// anchored regex fails to build.
    pub fn to_input_matcher(&self) -> Result<Box<dyn InputMatcher>, SelectorError> {
        let operand = self.operand();
        if operand.len() > MAX_PATTERN_LENGTH {
            return Err(SelectorError::TooLong {
                what: "attribute operand",
                len: operand.len(),
                max: MAX_PATTERN_LENGTH,
            });
        }

        let escaped = regex::escape(operand);
        let pattern = match self {
            Self::Exact(v) => return Ok(Box::new(ExactMatcher::new(v.as_str()))),
            Self::Prefix(_) => format!("^{escaped}"),
            Self::Contains(_) => escaped,
            Self::Suffix(_) => format!("{escaped}$"),
        };
        PatternMatcher::new(&pattern)
            .map(|matcher| Box::new(matcher) as Box<dyn InputMatcher>)
            .map_err(|e| SelectorError::InvalidPattern {
                pattern: operand.to_string(),
                reason: e.to_string(),
            })
    }

    /// Compile into a [`Predicate`] over the attribute `name`.
    ///
    /// # Errors
    ///
    /// Same as [`to_input_matcher()`](Self::to_input_matcher).
    pub fn to_predicate<N: crate::Element>(&self, name: &str) -> Result<Predicate<N>, SelectorError> {
        let matcher = self.to_input_matcher()?;
        Ok(Predicate::Single(SinglePredicate::new(
            Box::new(AttributeInput::new(name)),
            matcher,
        )))
    }
}

impl fmt::Display for ValueMatchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(v) => write!(f, "= \"{v}\""),
            Self::Prefix(v) => write!(f, "^= \"{v}\""),
            Self::Contains(v) => write!(f, "*= \"{v}\""),
            Self::Suffix(v) => write!(f, "$= \"{v}\""),
        }
    }
}
