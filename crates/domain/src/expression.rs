//! Boolean notation over named items, e.g. `(trigger1 AND trigger2) OR trigger3`.
//!
//! Grammar (keywords are case-insensitive, `AND` binds tighter than `OR`):
//!
//! ```text
//! expr   := term ( OR term )*
//! term   := factor ( AND factor )*
//! factor := identifier | "(" expr ")"
//! ```
//!
//! Identifiers are any run of characters other than whitespace and
//! parentheses. Every identifier is resolved before anything is evaluated,
//! so an unknown name fails even where short-circuiting would skip it.

use std::collections::BTreeMap;

/// Deepest parenthesis nesting accepted by [`Expression::parse`].
pub const MAX_DEPTH: usize = 128;

/// Failure to parse or evaluate a boolean notation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpressionError {
    #[error("expression is empty")]
    Empty,

    #[error("unexpected `{token}` at position {position}")]
    UnexpectedToken { token: String, position: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unbalanced parenthesis at position {0}")]
    UnbalancedParenthesis(usize),

    #[error("parentheses nested deeper than {MAX_DEPTH} at position {0}")]
    TooDeep(usize),

    /// The expression references a name that has no value.
    #[error("unknown identifier `{0}`")]
    UnknownIdentifier(String),
}

/// Parsed boolean notation.
///
/// Chains of the same operator are flattened, so the tree is never deeper
/// than the parenthesis nesting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    Identifier(String),
    And(Vec<Expression>),
    Or(Vec<Expression>),
}

impl Expression {
    /// Parse `text` into an expression tree.
    ///
    /// # Errors
    ///
    /// Returns an [`ExpressionError`] describing the first syntax problem.
    pub fn parse(text: &str) -> Result<Self, ExpressionError> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Err(ExpressionError::Empty);
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let expr = parser.parse_or()?;
        match parser.tokens.get(parser.pos) {
            None => Ok(expr),
            Some(Token {
                kind: TokenKind::Close,
                position,
            }) => Err(ExpressionError::UnbalancedParenthesis(*position)),
            Some(token) => Err(token.unexpected()),
        }
    }

    /// Identifiers referenced by this expression, in order of appearance.
    #[must_use]
    pub fn identifiers(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_identifiers(&mut out);
        out
    }

    fn collect_identifiers<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Identifier(name) => out.push(name),
            Self::And(items) | Self::Or(items) => {
                for item in items {
                    item.collect_identifiers(out);
                }
            }
        }
    }

    /// Evaluate against the given truth values.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressionError::UnknownIdentifier`] when a referenced name
    /// is missing from `values`.
    pub fn evaluate(&self, values: &BTreeMap<String, bool>) -> Result<bool, ExpressionError> {
        if let Some(missing) = self
            .identifiers()
            .into_iter()
            .find(|name| !values.contains_key(*name))
        {
            return Err(ExpressionError::UnknownIdentifier(missing.to_string()));
        }
        Ok(self.eval_resolved(values))
    }

    fn eval_resolved(&self, values: &BTreeMap<String, bool>) -> bool {
        match self {
            Self::Identifier(name) => values.get(name).copied().unwrap_or(false),
            Self::And(items) => items.iter().all(|item| item.eval_resolved(values)),
            Self::Or(items) => items.iter().any(|item| item.eval_resolved(values)),
        }
    }
}

/// Parse and evaluate `text` in one go.
///
/// # Errors
///
/// See [`Expression::parse`] and [`Expression::evaluate`].
pub fn evaluate(text: &str, values: &BTreeMap<String, bool>) -> Result<bool, ExpressionError> {
    Expression::parse(text)?.evaluate(values)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Open,
    Close,
    And,
    Or,
    Ident(String),
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    position: usize,
}

impl Token {
    fn unexpected(&self) -> ExpressionError {
        let token = match &self.kind {
            TokenKind::Open => "(".to_string(),
            TokenKind::Close => ")".to_string(),
            TokenKind::And => "AND".to_string(),
            TokenKind::Or => "OR".to_string(),
            TokenKind::Ident(name) => name.clone(),
        };
        ExpressionError::UnexpectedToken {
            token,
            position: self.position,
        }
    }
}

fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some((position, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '(' => tokens.push(Token {
                kind: TokenKind::Open,
                position,
            }),
            ')' => tokens.push(Token {
                kind: TokenKind::Close,
                position,
            }),
            _ => {
                let mut word = String::from(c);
                while let Some(&(_, next)) = chars.peek() {
                    if next.is_whitespace() || next == '(' || next == ')' {
                        break;
                    }
                    word.push(next);
                    chars.next();
                }
                let kind = if word.eq_ignore_ascii_case("and") {
                    TokenKind::And
                } else if word.eq_ignore_ascii_case("or") {
                    TokenKind::Or
                } else {
                    TokenKind::Ident(word)
                };
                tokens.push(Token { kind, position });
            }
        }
    }
    tokens
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn parse_or(&mut self) -> Result<Expression, ExpressionError> {
        let mut items = vec![self.parse_and()?];
        while self.peek() == Some(&TokenKind::Or) {
            self.pos += 1;
            items.push(self.parse_and()?);
        }
        Ok(Self::collapse(items, Expression::Or))
    }

    fn parse_and(&mut self) -> Result<Expression, ExpressionError> {
        let mut items = vec![self.parse_factor()?];
        while self.peek() == Some(&TokenKind::And) {
            self.pos += 1;
            items.push(self.parse_factor()?);
        }
        Ok(Self::collapse(items, Expression::And))
    }

    fn collapse(
        mut items: Vec<Expression>,
        join: fn(Vec<Expression>) -> Expression,
    ) -> Expression {
        if items.len() == 1 {
            items.swap_remove(0)
        } else {
            join(items)
        }
    }

    fn parse_factor(&mut self) -> Result<Expression, ExpressionError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(ExpressionError::UnexpectedEnd)?;
        self.pos += 1;
        match token.kind {
            TokenKind::Ident(name) => Ok(Expression::Identifier(name)),
            TokenKind::Open => {
                if self.depth == MAX_DEPTH {
                    return Err(ExpressionError::TooDeep(token.position));
                }
                self.depth += 1;
                let inner = self.parse_or()?;
                self.depth -= 1;
                match self.peek() {
                    Some(TokenKind::Close) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err(ExpressionError::UnbalancedParenthesis(token.position)),
                }
            }
            _ => Err(token.unexpected()),
        }
    }
}
