//! `DataInput`: per-node data extraction
//!
//! A `DataInput` reads one value off a node (its tag name, one attribute, one
//! class) and returns type-erased `MatchingData`.
//!
//! Inputs are generic over the node type `N`, but return domain-agnostic
//! `MatchingData`, so the same `InputMatchers` serve every host tree.

use crate::{Element, MatchingData};
use std::fmt::Debug;

/// Extracts data from a node.
///
/// `DataInput` is the bridge between the host's node type and the
/// domain-agnostic matchers. It reads the relevant value from the node and
/// returns it as type-erased [`MatchingData`].
///
/// # Example
///
/// ```ignore
/// use sift::{DataInput, MatchingData};
///
/// #[derive(Debug)]
/// struct RoleInput;
///
/// impl DataInput<MyNode> for RoleInput {
///     fn get(&self, node: &MyNode) -> MatchingData {
///         node.attribute("role").into()
///     }
/// }
/// ```
#[diagnostic::on_unimplemented(
    message = "`{Self}` does not implement `DataInput<{N}>`",
    label = "this type cannot read data from `{N}`",
    note = "DataInput<N> reads one value off a specific node type"
)]
pub trait DataInput<N>: Debug {
    /// Extract data from the given node.
    ///
    /// Returns [`MatchingData::Absent`] if the requested value is not present.
    /// Predicates rely on this: None → predicate evaluates to false.
    fn get(&self, node: &N) -> MatchingData;
}

#[diagnostic::do_not_recommend]
impl<N> DataInput<N> for Box<dyn DataInput<N>> {
    fn get(&self, node: &N) -> MatchingData {
        (**self).get(node)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Node inputs
// ═══════════════════════════════════════════════════════════════════════════════

/// The node's tag name, as the host reports it.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagNameInput;

impl<N: Element> DataInput<N> for TagNameInput {
    fn get(&self, node: &N) -> MatchingData {
        MatchingData::Text(node.tag_name())
    }
}

/// One attribute's value; `None` when the attribute is absent.
#[derive(Debug, Clone)]
pub struct AttributeInput {
    name: String,
}

impl AttributeInput {
    /// Read the attribute called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The attribute this input reads.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<N: Element> DataInput<N> for AttributeInput {
    fn get(&self, node: &N) -> MatchingData {
        node.attribute(&self.name).into()
    }
}

/// One class, as [`Element::has_class`] reports it: the class name when the
/// node carries it, `None` otherwise.
#[derive(Debug, Clone)]
pub struct ClassInput {
    class: String,
}

impl ClassInput {
    /// Look for `class` on each node.
    #[must_use]
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
        }
    }
}

impl<N: Element> DataInput<N> for ClassInput {
    fn get(&self, node: &N) -> MatchingData {
        if node.has_class(&self.class) {
            MatchingData::Text(self.class.clone())
        } else {
            MatchingData::Absent
        }
    }
}
