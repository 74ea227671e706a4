//! Rule compiler: [`RuleNode`] tree → [`Predicate`] + relevant attributes
//!
//! Supported: selector lists (OR), compounds (AND), `:not(list)` (NOT),
//! `*`, tag names (case-insensitive), `.class`, `[name]`, and `[name op value]`
//! with `=`, `^=`, `*=`, `$=`. Everything else is a compile-time
//! [`SelectorError::Unsupported`] naming the construct.

use crate::{
    parse_rule, AttributeInput, ClassInput, Element, ExactMatcher, Predicate, PredicateTrace,
    PresenceMatcher, RuleNode, SelectorError, SinglePredicate, TagNameInput, ValueMatchSpec,
    MAX_DEPTH, MAX_PREDICATES_PER_COMPOUND, MAX_RULE_LENGTH,
};
use std::fmt;

/// A compiled rule: its predicate over nodes and the attributes it reads.
///
/// # Example
///
/// ```ignore
/// let rule = CompiledRule::<MyNode>::compile("div.thread:not([role=heading])")?;
/// assert_eq!(rule.relevant_attributes(), ["class", "role"]);
/// assert!(rule.matches(&node));
/// ```
pub struct CompiledRule<N> {
    text: String,
    predicate: Predicate<N>,
    attributes: Vec<String>,
}

impl<N: Element> CompiledRule<N> {
    /// Parse and compile `text`.
    ///
    /// # Errors
    ///
    /// - [`SelectorError::TooLong`] if `text` exceeds [`MAX_RULE_LENGTH`]
    /// - [`SelectorError::Syntax`] if it does not parse
    /// - [`SelectorError::DepthExceeded`] if it nests deeper than [`MAX_DEPTH`]
    /// - [`SelectorError::Unsupported`] for ids, combinators, pseudo-classes
    ///   other than `:not`, and the `~=` / `|=` operators
    pub fn compile(text: &str) -> Result<Self, SelectorError> {
        if text.len() > MAX_RULE_LENGTH {
            return Err(SelectorError::TooLong {
                what: "rule",
                len: text.len(),
                max: MAX_RULE_LENGTH,
            });
        }
        let tree = parse_rule(text)?;
        let depth = tree.depth();
        if depth > MAX_DEPTH {
            return Err(SelectorError::DepthExceeded {
                depth,
                max: MAX_DEPTH,
            });
        }

        let predicate = build(text, &tree)?;
        let mut attributes = Vec::new();
        collect_attributes(&tree, &mut attributes);
        tracing::trace!(rule = text, ?attributes, "compiled rule");

        Ok(Self {
            text: text.to_string(),
            predicate,
            attributes,
        })
    }

    /// Does `node` match this rule?
    pub fn matches(&self, node: &N) -> bool {
        self.predicate.evaluate(node)
    }

    /// Evaluate with a full trace of every sub-expression.
    #[must_use]
    pub fn explain(&self, node: &N) -> PredicateTrace {
        self.predicate.evaluate_with_trace(node)
    }
}

impl<N> CompiledRule<N> {
    /// The rule as written.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Attribute names whose changes can flip this rule's result, without
    /// duplicates, in order of first appearance. `class` stands in for every
    /// class selector.
    #[must_use]
    pub fn relevant_attributes(&self) -> &[String] {
        &self.attributes
    }
}

impl<N> fmt::Debug for CompiledRule<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRule")
            .field("text", &self.text)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

fn unsupported(rule: &str, construct: String) -> SelectorError {
    SelectorError::Unsupported {
        rule: rule.to_string(),
        construct,
    }
}

fn check_width(what: &'static str, count: usize) -> Result<(), SelectorError> {
    if count > MAX_PREDICATES_PER_COMPOUND {
        return Err(SelectorError::TooManyPredicates {
            what,
            count,
            max: MAX_PREDICATES_PER_COMPOUND,
        });
    }
    Ok(())
}

fn build<N: Element>(rule: &str, node: &RuleNode) -> Result<Predicate<N>, SelectorError> {
    match node {
        RuleNode::Root(alternatives) => {
            check_width("selector list", alternatives.len())?;
            let predicates = alternatives
                .iter()
                .map(|alternative| build(rule, alternative))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Predicate::any_of(predicates))
        }
        RuleNode::Compound(parts) => {
            check_width("compound selector", parts.len())?;
            let predicates = parts
                .iter()
                .map(|part| build(rule, part))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Predicate::all_of(predicates))
        }
        RuleNode::Universal => Ok(Predicate::And(Vec::new())),
        RuleNode::Tag(name) => Ok(Predicate::Single(SinglePredicate::new(
            Box::new(TagNameInput),
            Box::new(ExactMatcher::ignoring_case(name.as_str())),
        ))),
        RuleNode::Class(name) => Ok(Predicate::Single(SinglePredicate::new(
            Box::new(ClassInput::new(name.as_str())),
            Box::new(PresenceMatcher),
        ))),
        RuleNode::Attribute {
            name,
            operator: None,
            ..
        } => Ok(Predicate::Single(SinglePredicate::new(
            Box::new(AttributeInput::new(name.as_str())),
            Box::new(PresenceMatcher),
        ))),
        RuleNode::Attribute {
            name,
            operator: Some(operator),
            value,
        } => {
            let operand = value.as_deref().unwrap_or_default();
            let spec = ValueMatchSpec::from_operator(operator, operand).ok_or_else(|| {
                unsupported(rule, format!("attribute operator `{operator}`"))
            })?;
            spec.to_predicate(name)
        }
        RuleNode::Pseudo { name, arguments } if name == "not" => match arguments {
            Some(list) => Ok(Predicate::Not(Box::new(build(rule, list)?))),
            None => Err(unsupported(rule, "`:not` without an argument".to_string())),
        },
        RuleNode::Pseudo { name, .. } => Err(unsupported(rule, format!("pseudo-class `:{name}`"))),
        RuleNode::Id(id) => Err(unsupported(rule, format!("id selector `#{id}`"))),
        RuleNode::Combinator(kind) => Err(unsupported(
            rule,
            format!("combinator `{}`", if kind == " " { "descendant" } else { kind.as_str() }),
        )),
    }
}

fn push_unique(out: &mut Vec<String>, name: &str) {
    if !out.iter().any(|seen| seen == name) {
        out.push(name.to_string());
    }
}

fn collect_attributes(node: &RuleNode, out: &mut Vec<String>) {
    match node {
        RuleNode::Root(children) | RuleNode::Compound(children) => {
            for child in children {
                collect_attributes(child, out);
            }
        }
        RuleNode::Class(_) => push_unique(out, "class"),
        RuleNode::Attribute { name, .. } => push_unique(out, name),
        RuleNode::Pseudo {
            arguments: Some(list),
            ..
        } => collect_attributes(list, out),
        // Tag names never change; everything else was rejected by `build`.
        _ => {}
    }
}
