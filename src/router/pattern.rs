//! Path pattern compilation.
//!
//! A pattern is a `/`-separated list of segments. Each segment is either a
//! literal, matched exactly, or a token introduced by [`TOKEN_MARKER`]:
//!
//! ```text
//! /abc        - match exactly, e.g. '/abc'
//! /:abc       - match one path segment, e.g. '/one' or '/two'
//! /:abc?      - match zero or one segment, e.g. '/' or '/one'
//! /:abc+      - match one or more segments, e.g. '/one' or '/one/two'
//! /:abc*      - match zero or more segments, e.g. '/' or '/one' or '/one/two'
//! ```
//!
//! The `?`, `*` and `+` forms may only appear as the final segment, which also
//! means a pattern carries at most one of them.

use std::sync::Arc;

use regex::Regex;
use smallvec::SmallVec;

use crate::error::RouterError;

/// Character that introduces a token segment.
pub const TOKEN_MARKER: char = ':';

/// Maximum number of captures before the capture list spills to the heap.
/// Most routes carry two or three tokens.
pub const MAX_INLINE_CAPTURES: usize = 8;

/// Captured `(token, value)` pairs in token declaration order.
///
/// Token names are `Arc<str>` shared with the compiled pattern so a match
/// only allocates the captured values.
pub type CaptureVec = SmallVec<[(Arc<str>, String); MAX_INLINE_CAPTURES]>;

/// How many path segments a token consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `:name` - exactly one non-empty segment
    Required,
    /// `:name?` - zero or one segment
    Optional,
    /// `:name*` - zero or more segments
    ZeroOrMore,
    /// `:name+` - one or more segments
    OneOrMore,
}

impl TokenKind {
    fn must_be_final(self) -> bool {
        !matches!(self, TokenKind::Required)
    }

    fn is_required(self) -> bool {
        matches!(self, TokenKind::Required | TokenKind::OneOrMore)
    }

    fn regex_fragment(self) -> &'static str {
        match self {
            TokenKind::Required => "/([^/]+)",
            TokenKind::Optional => "(?:/([^/]*))?",
            TokenKind::ZeroOrMore => "(?:/(.*?))?",
            TokenKind::OneOrMore => "/(.+?)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    Token { name: &'a str, kind: TokenKind },
}

fn parse_segments(pattern: &str) -> Result<Vec<Segment<'_>>, RouterError> {
    let parts: Vec<&str> = pattern.split('/').filter(|p| !p.is_empty()).collect();
    let last = parts.len().saturating_sub(1);

    parts
        .iter()
        .enumerate()
        .map(|(index, part)| {
            let Some(spec) = part.strip_prefix(TOKEN_MARKER) else {
                return Ok(Segment::Literal(part));
            };

            let (name, kind) = if let Some(name) = spec.strip_suffix('?') {
                (name, TokenKind::Optional)
            } else if let Some(name) = spec.strip_suffix('*') {
                (name, TokenKind::ZeroOrMore)
            } else if let Some(name) = spec.strip_suffix('+') {
                (name, TokenKind::OneOrMore)
            } else {
                (spec, TokenKind::Required)
            };

            if name.is_empty() {
                return Err(RouterError::invalid_pattern(
                    pattern,
                    format!("token '{part}' has an empty name"),
                ));
            }
            if kind.must_be_final() && index != last {
                return Err(RouterError::invalid_pattern(
                    pattern,
                    format!("'{part}' must be the last segment of the pattern"),
                ));
            }

            Ok(Segment::Token { name, kind })
        })
        .collect()
}

/// A pattern compiled into a matcher.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pattern: String,
    regex: Regex,
    tokens: Vec<Arc<str>>,
    required: usize,
}

impl CompiledPattern {
    /// Compile `pattern` into an anchored regex plus its token list.
    ///
    /// A single trailing `/` on the request path is tolerated, and the empty
    /// pattern (or `/`) matches both `""` and `"/"`.
    ///
    /// # Errors
    ///
    /// [`RouterError::InvalidPattern`] when an optional or greedy token is not
    /// the final segment, or a token has no name.
    pub fn compile(pattern: &str) -> Result<Self, RouterError> {
        let segments = parse_segments(pattern)?;

        let mut re = String::with_capacity(pattern.len() + 16);
        re.push('^');
        let mut tokens = Vec::new();
        let mut required = 0;

        for segment in &segments {
            match segment {
                Segment::Literal(literal) => {
                    re.push('/');
                    re.push_str(&regex::escape(literal));
                }
                Segment::Token { name, kind } => {
                    re.push_str(kind.regex_fragment());
                    tokens.push(Arc::<str>::from(*name));
                    if kind.is_required() {
                        required += 1;
                    }
                }
            }
        }
        re.push_str("/?$");

        let regex =
            Regex::new(&re).map_err(|e| RouterError::invalid_pattern(pattern, e.to_string()))?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
            tokens,
            required,
        })
    }

    /// The source pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Token names in declaration order.
    #[must_use]
    pub fn tokens(&self) -> &[Arc<str>] {
        &self.tokens
    }

    /// Number of plain and `+` tokens.
    #[must_use]
    pub fn required(&self) -> usize {
        self.required
    }

    #[must_use]
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Match `path` and return one captured value per token.
    ///
    /// Tokens that matched nothing (`?` and `*` with no trailing segment)
    /// capture the empty string.
    #[must_use]
    pub fn captures(&self, path: &str) -> Option<CaptureVec> {
        let caps = self.regex.captures(path)?;
        Some(
            self.tokens
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let value = caps
                        .get(i + 1)
                        .map_or_else(String::new, |m| m.as_str().to_string());
                    (Arc::clone(name), value)
                })
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplatePart {
    Literal(String),
    Token { index: usize, required: bool },
}

/// A human-fillable form of a pattern, e.g. `/user/{id}`.
///
/// Used to construct concrete paths for a route (the test client builds its
/// request paths this way) without compiling a matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    template: String,
    parts: Vec<TemplatePart>,
    tokens: Vec<String>,
    required: usize,
}

impl PathTemplate {
    /// # Errors
    ///
    /// Same grammar errors as [`CompiledPattern::compile`].
    pub fn parse(pattern: &str) -> Result<Self, RouterError> {
        let segments = parse_segments(pattern)?;

        let mut template = String::with_capacity(pattern.len());
        let mut parts = Vec::with_capacity(segments.len());
        let mut tokens = Vec::new();
        let mut required = 0;

        for segment in segments {
            match segment {
                Segment::Literal(literal) => {
                    template.push('/');
                    template.push_str(literal);
                    parts.push(TemplatePart::Literal(literal.to_string()));
                }
                Segment::Token { name, kind } => {
                    template.push_str("/{");
                    template.push_str(name);
                    template.push('}');
                    parts.push(TemplatePart::Token {
                        index: tokens.len(),
                        required: kind.is_required(),
                    });
                    tokens.push(name.to_string());
                    if kind.is_required() {
                        required += 1;
                    }
                }
            }
        }

        if template.is_empty() {
            template.push('/');
        }

        Ok(Self {
            template,
            parts,
            tokens,
            required,
        })
    }

    /// The template string, tokens written as `{name}`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.template
    }

    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    #[must_use]
    pub fn required(&self) -> usize {
        self.required
    }

    /// Substitute positional `args` for the tokens.
    ///
    /// Optional tokens without an argument are left out of the path.
    /// Arguments beyond the token count are appended as extra segments, which
    /// is how a trailing `*`/`+` token receives several segments.
    ///
    /// # Errors
    ///
    /// [`RouterError::MissingArguments`] when fewer than [`Self::required`]
    /// arguments are given.
    pub fn fill(&self, args: &[&str]) -> Result<String, RouterError> {
        if args.len() < self.required {
            return Err(RouterError::MissingArguments {
                pattern: self.template.clone(),
                expected: self.required,
                found: args.len(),
            });
        }

        let mut path = String::new();
        for part in &self.parts {
            match part {
                TemplatePart::Literal(literal) => {
                    path.push('/');
                    path.push_str(literal);
                }
                TemplatePart::Token { index, required } => match args.get(*index) {
                    Some(value) if *required || !value.is_empty() => {
                        path.push('/');
                        path.push_str(value);
                    }
                    _ => {}
                },
            }
        }
        for extra in args.iter().skip(self.tokens.len()) {
            path.push('/');
            path.push_str(extra);
        }

        if path.is_empty() {
            path.push('/');
        }
        Ok(path)
    }
}
