// src/packages/capability.rs

//! Capabilities and dependency expressions
//!
//! A capability is a name with an optional version range. Requirements may
//! also be rpm boolean ("rich") dependencies such as
//! `(foo >= 1.0 or bar)` or `(langpack-en if glibc)`, which are parsed into a
//! small expression tree.

use crate::error::{Error, Result};
use crate::version::{Comparison, RpmVersion, VersionConstraint};
use std::fmt;

const OPERATOR_CHARS: [char; 3] = ['<', '>', '='];

/// A named capability with an optional version range
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Capability {
    pub name: String,
    pub constraint: Option<VersionConstraint>,
}

impl Capability {
    /// Create an unversioned capability
    pub fn unversioned(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraint: None,
        }
    }

    /// Create a versioned capability
    pub fn versioned(name: impl Into<String>, op: Comparison, version: RpmVersion) -> Self {
        Self {
            name: name.into(),
            constraint: Some(VersionConstraint::new(op, version)),
        }
    }

    /// Whether `s` carries a relational operator (`foo >= 1`, `foo>=1`)
    pub fn is_relational(s: &str) -> bool {
        s.contains(OPERATOR_CHARS)
    }

    /// Parse `name`, or `name OP version` with or without spaces around OP
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || Error::ParseError(format!("Invalid capability '{}'", s));

        let Some(start) = s.find(OPERATOR_CHARS) else {
            if s.is_empty() || s.contains(char::is_whitespace) {
                return Err(invalid());
            }
            return Ok(Self::unversioned(s));
        };

        let name = s[..start].trim_end();
        let rest = &s[start..];
        let op_len = rest.find(|c: char| !OPERATOR_CHARS.contains(&c)).unwrap_or(rest.len());
        let (op, version) = rest.split_at(op_len);
        let version = version.trim_start();

        let malformed = |part: &str| part.is_empty() || part.contains(char::is_whitespace);
        if malformed(name) || malformed(version) {
            return Err(invalid());
        }
        let op = Comparison::from_operator(op)
            .ok_or_else(|| Error::ParseError(format!("Invalid operator '{}' in '{}'", op, s)))?;
        Ok(Self::versioned(name, op, RpmVersion::parse(version)?))
    }

    /// Whether this capability, offered as a provide, satisfies `required`
    pub fn provides(&self, required: &Capability) -> bool {
        if self.name != required.name {
            return false;
        }
        match (&self.constraint, &required.constraint) {
            (Some(offered), Some(wanted)) => offered.overlaps(wanted),
            _ => true,
        }
    }

    /// Capabilities satisfied implicitly by rpm itself
    pub fn is_rpmlib(&self) -> bool {
        self.name.starts_with("rpmlib(")
    }

    /// File path requirement (e.g. `/bin/sh`)
    pub fn is_file(&self) -> bool {
        self.name.starts_with('/')
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.constraint {
            Some(c) => write!(f, "{} {}", self.name, c),
            None => f.write_str(&self.name),
        }
    }
}

/// A requirement: a plain capability or a boolean expression over them
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependency {
    Capability(Capability),
    /// Every operand must be satisfied
    And(Vec<Dependency>),
    /// At least one operand must be satisfied
    Or(Vec<Dependency>),
    /// `then` is required only while `cond` is satisfied, `otherwise` when it is not
    If {
        then: Box<Dependency>,
        cond: Box<Dependency>,
        otherwise: Option<Box<Dependency>>,
    },
    /// `then` is required only while `cond` is not satisfied
    Unless {
        then: Box<Dependency>,
        cond: Box<Dependency>,
        otherwise: Option<Box<Dependency>>,
    },
    /// A single package must satisfy every operand
    With(Vec<Dependency>),
    /// A package satisfying the first operand but not the second
    Without(Box<Dependency>, Box<Dependency>),
}

impl Dependency {
    /// Parse a requirement as found in repository metadata
    ///
    /// Names starting with `(` are boolean expressions; everything else is a
    /// plain capability name (the range comes from separate attributes).
    pub fn parse_rich(s: &str) -> Result<Self> {
        let tokens = tokenize(s);
        let mut parser = RichParser { tokens, pos: 0 };
        let dep = parser.parse_group()?;
        if parser.pos != parser.tokens.len() {
            return Err(Error::ParseError(format!(
                "Trailing input in rich dependency '{}'",
                s
            )));
        }
        Ok(dep)
    }

    /// The plain capability, if this is not a boolean expression
    pub fn as_capability(&self) -> Option<&Capability> {
        match self {
            Dependency::Capability(cap) => Some(cap),
            _ => None,
        }
    }

    /// Whether the requirement is implicitly satisfied (`rpmlib(...)`)
    pub fn is_rpmlib(&self) -> bool {
        matches!(self, Dependency::Capability(cap) if cap.is_rpmlib())
    }
}

impl From<Capability> for Dependency {
    fn from(cap: Capability) -> Self {
        Dependency::Capability(cap)
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, items: &[Dependency], op: &str) -> fmt::Result {
            write!(f, "(")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, " {} ", op)?;
                }
                write!(f, "{}", item)?;
            }
            write!(f, ")")
        }

        match self {
            Dependency::Capability(cap) => write!(f, "{}", cap),
            Dependency::And(items) => join(f, items, "and"),
            Dependency::Or(items) => join(f, items, "or"),
            Dependency::With(items) => join(f, items, "with"),
            Dependency::Without(a, b) => write!(f, "({} without {})", a, b),
            Dependency::If {
                then,
                cond,
                otherwise,
            } => match otherwise {
                Some(o) => write!(f, "({} if {} else {})", then, cond, o),
                None => write!(f, "({} if {})", then, cond),
            },
            Dependency::Unless {
                then,
                cond,
                otherwise,
            } => match otherwise {
                Some(o) => write!(f, "({} unless {} else {})", then, cond, o),
                None => write!(f, "({} unless {})", then, cond),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    Word(String),
}

fn tokenize(s: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut depth_in_word = 0usize;

    let flush = |word: &mut String, tokens: &mut Vec<Token>| {
        if !word.is_empty() {
            tokens.push(Token::Word(std::mem::take(word)));
        }
    };

    for c in s.chars() {
        match c {
            // Parentheses inside a word belong to the capability name, e.g. perl(Foo)
            '(' if !word.is_empty() => {
                depth_in_word += 1;
                word.push(c);
            }
            ')' if depth_in_word > 0 => {
                depth_in_word -= 1;
                word.push(c);
            }
            '(' => tokens.push(Token::Open),
            ')' => {
                flush(&mut word, &mut tokens);
                tokens.push(Token::Close);
            }
            c if c.is_whitespace() && depth_in_word == 0 => flush(&mut word, &mut tokens),
            c => word.push(c),
        }
    }
    flush(&mut word, &mut tokens);
    tokens
}

struct RichParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl RichParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn error(&self, msg: &str) -> Error {
        Error::ParseError(format!("Invalid rich dependency: {}", msg))
    }

    /// `( operand [op operand]* )`
    fn parse_group(&mut self) -> Result<Dependency> {
        if self.next() != Some(Token::Open) {
            return Err(self.error("expected '('"));
        }

        let first = self.parse_operand()?;
        let mut operands = vec![first];
        let mut operator: Option<String> = None;
        let mut otherwise = None;

        loop {
            match self.next() {
                Some(Token::Close) => break,
                Some(Token::Word(op)) => {
                    let op = op.to_ascii_lowercase();
                    match op.as_str() {
                        "else" => {
                            if !matches!(operator.as_deref(), Some("if") | Some("unless")) {
                                return Err(self.error("'else' without 'if' or 'unless'"));
                            }
                            otherwise = Some(self.parse_operand()?);
                        }
                        "and" | "or" | "with" | "without" | "if" | "unless" => {
                            if let Some(ref existing) = operator {
                                if existing != &op || !matches!(op.as_str(), "and" | "or" | "with") {
                                    return Err(self.error("mixed operators need parentheses"));
                                }
                            }
                            operator = Some(op);
                            operands.push(self.parse_operand()?);
                        }
                        other => return Err(self.error(&format!("unknown operator '{}'", other))),
                    }
                }
                _ => return Err(self.error("unbalanced parentheses")),
            }
        }

        let Some(op) = operator else {
            return Ok(operands.remove(0));
        };

        let mut operands = operands.into_iter();
        Ok(match op.as_str() {
            "and" => Dependency::And(operands.collect()),
            "or" => Dependency::Or(operands.collect()),
            "with" => Dependency::With(operands.collect()),
            _ => {
                let (Some(left), Some(right)) = (operands.next(), operands.next()) else {
                    return Err(self.error("missing operand"));
                };
                match op.as_str() {
                    "without" => Dependency::Without(Box::new(left), Box::new(right)),
                    "if" => Dependency::If {
                        then: Box::new(left),
                        cond: Box::new(right),
                        otherwise: otherwise.map(Box::new),
                    },
                    _ => Dependency::Unless {
                        then: Box::new(left),
                        cond: Box::new(right),
                        otherwise: otherwise.map(Box::new),
                    },
                }
            }
        })
    }

    /// A nested group or `name [OP version]`
    fn parse_operand(&mut self) -> Result<Dependency> {
        match self.peek() {
            Some(Token::Open) => self.parse_group(),
            Some(Token::Word(_)) => {
                let Some(Token::Word(name)) = self.next() else {
                    return Err(self.error("expected capability"));
                };
                if let Some(Token::Word(op)) = self.peek() {
                    if let Some(cmp) = Comparison::from_operator(op) {
                        self.pos += 1;
                        let Some(Token::Word(version)) = self.next() else {
                            return Err(self.error("missing version after operator"));
                        };
                        return Ok(Capability::versioned(name, cmp, RpmVersion::parse(&version)?)
                            .into());
                    }
                }
                Ok(Capability::unversioned(name).into())
            }
            _ => Err(self.error("expected operand")),
        }
    }
}
