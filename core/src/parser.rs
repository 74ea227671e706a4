//! Rule parser: selector text → [`RuleNode`] tree
//!
//! The parser accepts the full shape of a selector list (combinators, ids,
//! every attribute operator, any pseudo-class) so that the compiler, not the
//! parser, decides what is supported and can name the construct it rejects.
//!
//! ```text
//! list      := complex ( ',' complex )*
//! complex   := compound ( combinator compound )*
//! compound  := ( tag | '*' ) simple* | simple+
//! simple    := '.' ident | '#' ident | '[' attribute ']' | ':' ':'? ident ( '(' list ')' )?
//! attribute := ident ( op ( ident | string ) )?
//! op        := '=' | '~=' | '|=' | '^=' | '$=' | '*='
//! ```

use crate::{SelectorError, MAX_DEPTH};

/// One node of a parsed rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleNode {
    /// A comma-separated selector list. Each entry is a [`RuleNode::Compound`].
    Root(Vec<RuleNode>),
    /// One complex selector: simple selectors, with any combinators in between.
    Compound(Vec<RuleNode>),
    /// `*`
    Universal,
    /// `div`
    Tag(String),
    /// `.name`
    Class(String),
    /// `#name`
    Id(String),
    /// `[name]` or `[name op value]`.
    Attribute {
        /// Attribute name.
        name: String,
        /// Operator (`=`, `^=`, ...); `None` for a presence test.
        operator: Option<String>,
        /// Operand, unquoted.
        value: Option<String>,
    },
    /// `:name` or `:name(list)`.
    Pseudo {
        /// Name without the colon(s).
        name: String,
        /// Parenthesised selector list, as a [`RuleNode::Root`].
        arguments: Option<Box<RuleNode>>,
    },
    /// A combinator between compounds: `" "`, `">"`, `"+"` or `"~"`.
    Combinator(String),
}

impl RuleNode {
    /// Nesting depth of this node (leaves are 1).
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Root(children) | Self::Compound(children) => {
                1 + children.iter().map(Self::depth).max().unwrap_or(0)
            }
            Self::Pseudo {
                arguments: Some(arguments),
                ..
            } => 1 + arguments.depth(),
            _ => 1,
        }
    }
}

/// Parse a rule into a [`RuleNode::Root`].
///
/// # Errors
///
/// Returns [`SelectorError::Syntax`] with the byte offset of the first
/// character that does not fit the grammar, or
/// [`SelectorError::DepthExceeded`] once `:not(...)` arguments open a
/// list deeper than [`MAX_DEPTH`].
///
/// ```
/// use sift::{parse_rule, RuleNode};
///
/// let tree = parse_rule("div.open").unwrap();
/// assert_eq!(
///     tree,
///     RuleNode::Root(vec![RuleNode::Compound(vec![
///         RuleNode::Tag("div".into()),
///         RuleNode::Class("open".into()),
///     ])])
/// );
/// ```
pub fn parse_rule(text: &str) -> Result<RuleNode, SelectorError> {
    let mut parser = Parser {
        text,
        pos: 0,
        nesting: 0,
    };
    let root = parser.list()?;
    parser.skip_whitespace();
    if let Some(c) = parser.peek() {
        return Err(parser.error(format!("unexpected `{c}`")));
    }
    Ok(root)
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
    /// Open pseudo-class argument lists around the current position.
    nesting: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), SelectorError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{expected}`")))
        }
    }

    /// Returns whether any whitespace was skipped.
    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
        self.pos > start
    }

    fn error(&self, message: impl Into<String>) -> SelectorError {
        SelectorError::Syntax {
            rule: self.text.to_string(),
            position: self.pos,
            message: message.into(),
        }
    }

    fn list(&mut self) -> Result<RuleNode, SelectorError> {
        // Each argument list sits under a Root, a Compound and a Pseudo.
        let depth = 3 * self.nesting + 1;
        if depth > MAX_DEPTH {
            return Err(SelectorError::DepthExceeded {
                depth,
                max: MAX_DEPTH,
            });
        }
        let mut alternatives = vec![self.complex()?];
        loop {
            self.skip_whitespace();
            if !self.eat(',') {
                break;
            }
            alternatives.push(self.complex()?);
        }
        Ok(RuleNode::Root(alternatives))
    }

    fn complex(&mut self) -> Result<RuleNode, SelectorError> {
        self.skip_whitespace();
        let mut parts = Vec::new();
        self.compound(&mut parts)?;
        loop {
            let spaced = self.skip_whitespace();
            match self.peek() {
                Some(c @ ('>' | '+' | '~')) => {
                    self.bump();
                    self.skip_whitespace();
                    parts.push(RuleNode::Combinator(c.to_string()));
                    self.compound(&mut parts)?;
                }
                Some(c) if spaced && starts_compound(c) => {
                    parts.push(RuleNode::Combinator(" ".to_string()));
                    self.compound(&mut parts)?;
                }
                _ => break,
            }
        }
        Ok(RuleNode::Compound(parts))
    }

    fn compound(&mut self, parts: &mut Vec<RuleNode>) -> Result<(), SelectorError> {
        let start = parts.len();
        loop {
            match self.peek() {
                Some('*') if parts.len() == start => {
                    self.bump();
                    parts.push(RuleNode::Universal);
                }
                Some('.') => {
                    self.bump();
                    parts.push(RuleNode::Class(self.ident()?));
                }
                Some('#') => {
                    self.bump();
                    parts.push(RuleNode::Id(self.ident()?));
                }
                Some('[') => {
                    self.bump();
                    parts.push(self.attribute()?);
                }
                Some(':') => {
                    self.bump();
                    self.eat(':');
                    parts.push(self.pseudo()?);
                }
                Some(c) if parts.len() == start && starts_ident(c) => {
                    parts.push(RuleNode::Tag(self.ident()?));
                }
                _ => break,
            }
        }
        if parts.len() == start {
            return Err(self.error("expected a selector"));
        }
        Ok(())
    }

    fn attribute(&mut self) -> Result<RuleNode, SelectorError> {
        self.skip_whitespace();
        let name = self.ident()?;
        self.skip_whitespace();
        if self.eat(']') {
            return Ok(RuleNode::Attribute {
                name,
                operator: None,
                value: None,
            });
        }

        let operator = match self.peek() {
            Some('=') => {
                self.bump();
                "=".to_string()
            }
            Some(c @ ('~' | '|' | '^' | '$' | '*')) => {
                self.bump();
                self.expect('=')?;
                format!("{c}=")
            }
            _ => return Err(self.error("expected `]` or an attribute operator")),
        };

        self.skip_whitespace();
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => self.quoted(quote)?,
            _ => self.ident()?,
        };
        self.skip_whitespace();
        self.expect(']')?;
        Ok(RuleNode::Attribute {
            name,
            operator: Some(operator),
            value: Some(value),
        })
    }

    fn pseudo(&mut self) -> Result<RuleNode, SelectorError> {
        let name = self.ident()?;
        let arguments = if self.eat('(') {
            self.nesting += 1;
            let list = self.list();
            self.nesting -= 1;
            let list = list?;
            self.skip_whitespace();
            self.expect(')')?;
            Some(Box::new(list))
        } else {
            None
        };
        Ok(RuleNode::Pseudo { name, arguments })
    }

    fn ident(&mut self) -> Result<String, SelectorError> {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.bump();
                match self.bump() {
                    Some(escaped) => out.push(escaped),
                    None => return Err(self.error("dangling escape")),
                }
            } else if is_ident_char(c) {
                self.bump();
                out.push(c);
            } else {
                break;
            }
        }
        if out.is_empty() {
            Err(self.error("expected an identifier"))
        } else {
            Ok(out)
        }
    }

    fn quoted(&mut self, quote: char) -> Result<String, SelectorError> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some('\\') => match self.bump() {
                    Some(escaped) => out.push(escaped),
                    None => return Err(self.error("unterminated string")),
                },
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
            }
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

fn starts_ident(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '-' || c == '_' || c == '\\' || !c.is_ascii()
}

fn starts_compound(c: char) -> bool {
    starts_ident(c) || matches!(c, '*' | '.' | '#' | '[' | ':')
}
