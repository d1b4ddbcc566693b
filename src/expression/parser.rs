//! Tokenizer, recursive-descent parser and evaluator.

use crate::types::Row;
use thiserror::Error;

/// Maximum nesting of parentheses and unary operators.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Errors raised while parsing or evaluating an expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("unexpected character '{ch}' at {position}")]
    UnexpectedCharacter { ch: char, position: usize },

    #[error("unterminated column reference starting at {position}")]
    UnterminatedColumn { position: usize },

    #[error("empty column reference at {position}")]
    EmptyColumn { position: usize },

    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),

    #[error("unexpected token at {position}")]
    UnexpectedToken { position: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("missing closing ')' for '(' at {position}")]
    UnclosedParen { position: usize },

    #[error("expression nested deeper than {MAX_NESTING_DEPTH} levels")]
    TooDeep,

    #[error("division by zero")]
    DivisionByZero,

    #[error("result is not a finite number")]
    NonFinite,
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Column(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    position: usize,
}

fn tokenize(source: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(position, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        if ch == '[' {
            chars.next();
            let mut name = String::new();
            let mut terminated = false;
            for (_, c) in chars.by_ref() {
                match c {
                    ']' => {
                        terminated = true;
                        break;
                    }
                    '[' => return Err(ExprError::UnexpectedCharacter { ch: c, position }),
                    _ => name.push(c),
                }
            }
            if !terminated {
                return Err(ExprError::UnterminatedColumn { position });
            }
            if name.is_empty() {
                return Err(ExprError::EmptyColumn { position });
            }
            tokens.push(Token {
                kind: TokenKind::Column(name),
                position,
            });
            continue;
        }

        if ch.is_ascii_digit() || ch == '.' {
            let start = position;
            let mut end = position;
            let mut prev = ch;
            while let Some(&(i, c)) = chars.peek() {
                let exponent_sign = (c == '+' || c == '-') && matches!(prev, 'e' | 'E');
                if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || exponent_sign {
                    end = i + c.len_utf8();
                    prev = c;
                    chars.next();
                } else {
                    break;
                }
            }
            let literal = &source[start..end];
            let value: f64 = literal
                .parse()
                .map_err(|_| ExprError::InvalidNumber(literal.to_string()))?;
            tokens.push(Token {
                kind: TokenKind::Number(value),
                position,
            });
            continue;
        }

        let kind = match ch {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            _ => return Err(ExprError::UnexpectedCharacter { ch, position }),
        };
        tokens.push(Token { kind, position });
        chars.next();
    }

    Ok(tokens)
}

/// Binary arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprNode {
    Number(f64),
    Column(String),
    Neg(Box<ExprNode>),
    Binary {
        op: BinaryOp,
        lhs: Box<ExprNode>,
        rhs: Box<ExprNode>,
    },
}

impl ExprNode {
    fn eval(&self, row: &Row) -> Result<f64, ExprError> {
        match self {
            ExprNode::Number(n) => Ok(*n),
            ExprNode::Column(name) => Ok(row.get(name).map_or(0.0, |v| v.coerce_number())),
            ExprNode::Neg(inner) => Ok(-inner.eval(row)?),
            ExprNode::Binary { op, lhs, rhs } => {
                let a = lhs.eval(row)?;
                let b = rhs.eval(row)?;
                let result = match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => {
                        if b == 0.0 {
                            return Err(ExprError::DivisionByZero);
                        }
                        a / b
                    }
                };
                Ok(result)
            }
        }
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            ExprNode::Number(_) => {}
            ExprNode::Column(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            ExprNode::Neg(inner) => inner.collect_columns(out),
            ExprNode::Binary { lhs, rhs, .. } => {
                lhs.collect_columns(out);
                rhs.collect_columns(out);
            }
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            cursor: 0,
            depth: 0,
        }
    }

    fn parse(mut self) -> Result<ExprNode, ExprError> {
        let node = self.parse_additive()?;
        match self.tokens.get(self.cursor) {
            None => Ok(node),
            Some(token) => Err(ExprError::UnexpectedToken {
                position: token.position,
            }),
        }
    }

    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.cursor).map(|t| &t.kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    fn enter(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(ExprError::TooDeep);
        }
        Ok(())
    }

    fn parse_additive(&mut self) -> Result<ExprNode, ExprError> {
        let mut node = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.cursor += 1;
            let rhs = self.parse_multiplicative()?;
            node = ExprNode::Binary {
                op,
                lhs: Box::new(node),
                rhs: Box::new(rhs),
            };
        }
        Ok(node)
    }

    fn parse_multiplicative(&mut self) -> Result<ExprNode, ExprError> {
        let mut node = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Star) => BinaryOp::Mul,
                Some(TokenKind::Slash) => BinaryOp::Div,
                _ => break,
            };
            self.cursor += 1;
            let rhs = self.parse_unary()?;
            node = ExprNode::Binary {
                op,
                lhs: Box::new(node),
                rhs: Box::new(rhs),
            };
        }
        Ok(node)
    }

    fn parse_unary(&mut self) -> Result<ExprNode, ExprError> {
        match self.peek() {
            Some(TokenKind::Minus) => {
                self.cursor += 1;
                self.enter()?;
                let inner = self.parse_unary()?;
                self.depth -= 1;
                Ok(ExprNode::Neg(Box::new(inner)))
            }
            Some(TokenKind::Plus) => {
                self.cursor += 1;
                self.enter()?;
                let inner = self.parse_unary()?;
                self.depth -= 1;
                Ok(inner)
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<ExprNode, ExprError> {
        let token = self.advance().ok_or(ExprError::UnexpectedEnd)?;
        match token.kind {
            TokenKind::Number(n) => Ok(ExprNode::Number(n)),
            TokenKind::Column(name) => Ok(ExprNode::Column(name)),
            TokenKind::LParen => {
                self.enter()?;
                let inner = self.parse_additive()?;
                self.depth -= 1;
                match self.advance() {
                    Some(Token {
                        kind: TokenKind::RParen,
                        ..
                    }) => Ok(inner),
                    _ => Err(ExprError::UnclosedParen {
                        position: token.position,
                    }),
                }
            }
            _ => Err(ExprError::UnexpectedToken {
                position: token.position,
            }),
        }
    }
}

/// A parsed, reusable expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: ExprNode,
}

impl Expression {
    /// Parse an expression.
    pub fn parse(source: &str) -> Result<Self, ExprError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(ExprError::UnexpectedEnd);
        }
        let root = Parser::new(tokens).parse()?;
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    /// Evaluate against a row. Non-finite results are errors.
    pub fn evaluate(&self, row: &Row) -> Result<f64, ExprError> {
        let value = self.root.eval(row)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ExprError::NonFinite)
        }
    }

    /// The original source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &ExprNode {
        &self.root
    }

    /// Column names referenced by the expression, in first-use order.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.root.collect_columns(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{row, Value};

    fn eval(src: &str, r: &Row) -> Result<f64, ExprError> {
        Expression::parse(src)?.evaluate(r)
    }

    #[test]
    fn test_precedence() {
        let r = Row::new();
        assert_eq!(eval("2 + 3 * 4", &r).unwrap(), 14.0);
        assert_eq!(eval("(2 + 3) * 4", &r).unwrap(), 20.0);
        assert_eq!(eval("10 - 4 - 3", &r).unwrap(), 3.0);
        assert_eq!(eval("24 / 4 / 2", &r).unwrap(), 3.0);
        assert_eq!(eval("-2 * -3", &r).unwrap(), 6.0);
        assert_eq!(eval("1e2 + .5", &r).unwrap(), 100.5);
    }

    #[test]
    fn test_column_references() {
        let r = row([("sal", 100)]);
        assert_eq!(eval("[sal] * 2", &r).unwrap(), 200.0);

        let bad = row([("sal", "abc")]);
        assert_eq!(eval("[sal] * 2", &bad).unwrap(), 0.0);

        assert_eq!(eval("[missing] + 1", &r).unwrap(), 1.0);

        let spaced = row([("unit price", Value::from("2.5"))]);
        assert_eq!(eval("[unit price] * 4", &spaced).unwrap(), 10.0);
    }

    #[test]
    fn test_parse_errors() {
        let r = Row::new();
        assert_eq!(eval("", &r), Err(ExprError::UnexpectedEnd));
        assert_eq!(eval("1 +", &r), Err(ExprError::UnexpectedEnd));
        assert!(matches!(
            eval("(1 + 2", &r),
            Err(ExprError::UnclosedParen { position: 0 })
        ));
        assert!(matches!(
            eval("1 2", &r),
            Err(ExprError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            eval("[open", &r),
            Err(ExprError::UnterminatedColumn { .. })
        ));
        assert!(matches!(eval("[]", &r), Err(ExprError::EmptyColumn { .. })));
        assert!(matches!(
            eval("alert(1)", &r),
            Err(ExprError::UnexpectedCharacter { ch: 'a', .. })
        ));
        assert!(matches!(eval("1.2.3", &r), Err(ExprError::InvalidNumber(_))));
    }

    #[test]
    fn test_evaluation_errors() {
        let r = row([("zero", 0)]);
        assert_eq!(eval("1 / [zero]", &r), Err(ExprError::DivisionByZero));
        assert_eq!(eval("1e308 * 10", &r), Err(ExprError::NonFinite));
    }

    #[test]
    fn test_nesting_limit() {
        let r = Row::new();
        let deep = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        assert_eq!(eval(&deep, &r), Err(ExprError::TooDeep));

        let ok = format!("{}1{}", "(".repeat(10), ")".repeat(10));
        assert_eq!(eval(&ok, &r).unwrap(), 1.0);

        let negations = format!("{}1", "-".repeat(200));
        assert_eq!(eval(&negations, &r), Err(ExprError::TooDeep));
    }

    #[test]
    fn test_columns_listing() {
        let expr = Expression::parse("[a] + [b] * [a]").unwrap();
        assert_eq!(expr.columns(), vec!["a", "b"]);
        assert_eq!(expr.source(), "[a] + [b] * [a]");
    }
}
