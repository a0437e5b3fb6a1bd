//! Arithmetic evaluation for the calculator service.
//!
//! Expressions are restricted to integer and decimal literals, the four binary
//! operators `+ - * /`, unary sign and parentheses:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := factor (('*' | '/') factor)*
//! factor  := ('+' | '-') factor | primary
//! primary := NUMBER | '(' expr ')'
//! ```
//!
//! Integer arithmetic stays integral; division always yields a float, and an
//! integer overflow degrades to float arithmetic instead of failing.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const MAX_NESTING: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(value) => value as f64,
            Self::Float(value) => value,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Self::Int(value) => value == 0,
            Self::Float(value) => value == 0.0,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) if value.fract() == 0.0 && value.abs() < 1e16 => {
                write!(f, "{value:.1}")
            }
            Self::Float(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal(Number),
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CalcError {
    #[error("Empty expression.")]
    Empty,
    #[error("Invalid expression. Use numbers, + - * /, parentheses.")]
    Invalid,
    #[error("Expression is nested too deeply.")]
    NestingTooDeep,
    #[error("Division by zero.")]
    DivisionByZero,
    #[error("Result is out of range.")]
    OutOfRange,
}

/// Parses and evaluates `source` in one step.
pub fn evaluate(source: &str) -> Result<Number, CalcError> {
    parse(source)?.eval()
}

pub fn parse(source: &str) -> Result<Expr, CalcError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(CalcError::Empty);
    }

    let mut parser = Parser { tokens, position: 0, depth: 0 };
    let expr = parser.expr()?;
    if parser.position != parser.tokens.len() {
        return Err(CalcError::Invalid);
    }
    Ok(expr)
}

impl Expr {
    pub fn eval(&self) -> Result<Number, CalcError> {
        match self {
            Self::Literal(value) => Ok(*value),
            Self::Unary { op, operand } => {
                let value = operand.eval()?;
                Ok(match (op, value) {
                    (UnaryOp::Plus, value) => value,
                    (UnaryOp::Minus, Number::Int(inner)) => inner
                        .checked_neg()
                        .map(Number::Int)
                        .unwrap_or(Number::Float(-(inner as f64))),
                    (UnaryOp::Minus, Number::Float(inner)) => Number::Float(-inner),
                })
            }
            Self::Binary { op, lhs, rhs } => {
                let left = lhs.eval()?;
                let right = rhs.eval()?;
                apply_binary(*op, left, right)
            }
        }
    }
}

fn apply_binary(op: BinaryOp, left: Number, right: Number) -> Result<Number, CalcError> {
    let result = match (op, left, right) {
        (BinaryOp::Div, _, divisor) if divisor.is_zero() => return Err(CalcError::DivisionByZero),
        (BinaryOp::Div, dividend, divisor) => Number::Float(dividend.as_f64() / divisor.as_f64()),
        (BinaryOp::Add, Number::Int(a), Number::Int(b)) => {
            a.checked_add(b).map(Number::Int).unwrap_or(Number::Float(a as f64 + b as f64))
        }
        (BinaryOp::Sub, Number::Int(a), Number::Int(b)) => {
            a.checked_sub(b).map(Number::Int).unwrap_or(Number::Float(a as f64 - b as f64))
        }
        (BinaryOp::Mul, Number::Int(a), Number::Int(b)) => {
            a.checked_mul(b).map(Number::Int).unwrap_or(Number::Float(a as f64 * b as f64))
        }
        (BinaryOp::Add, a, b) => Number::Float(a.as_f64() + b.as_f64()),
        (BinaryOp::Sub, a, b) => Number::Float(a.as_f64() - b.as_f64()),
        (BinaryOp::Mul, a, b) => Number::Float(a.as_f64() * b.as_f64()),
    };

    match result {
        Number::Float(value) if !value.is_finite() => Err(CalcError::OutOfRange),
        other => Ok(other),
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Token {
    Number(Number),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(source: &str) -> Result<Vec<Token>, CalcError> {
    let mut tokens = Vec::new();
    let chars = source.chars().collect::<Vec<_>>();
    let mut index = 0;

    while index < chars.len() {
        let character = chars[index];
        match character {
            c if c.is_whitespace() => index += 1,
            '+' => {
                tokens.push(Token::Plus);
                index += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                index += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                index += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                index += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                index += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                index += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = index;
                while index < chars.len() && (chars[index].is_ascii_digit() || chars[index] == '.')
                {
                    index += 1;
                }
                let literal = chars[start..index].iter().collect::<String>();
                tokens.push(Token::Number(parse_literal(&literal)?));
            }
            _ => return Err(CalcError::Invalid),
        }
    }

    Ok(tokens)
}

fn parse_literal(literal: &str) -> Result<Number, CalcError> {
    let dots = literal.matches('.').count();
    if dots > 1 || literal == "." {
        return Err(CalcError::Invalid);
    }
    if dots == 0 {
        return match literal.parse::<i64>() {
            Ok(value) => Ok(Number::Int(value)),
            Err(_) => literal.parse::<f64>().map(Number::Float).map_err(|_| CalcError::Invalid),
        };
    }
    literal.parse::<f64>().map(Number::Float).map_err(|_| CalcError::Invalid)
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.position).copied()
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.peek();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn expr(&mut self) -> Result<Expr, CalcError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.position += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
    }

    fn term(&mut self) -> Result<Expr, CalcError> {
        let mut lhs = self.factor()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.position += 1;
            let rhs = self.factor()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
    }

    fn factor(&mut self) -> Result<Expr, CalcError> {
        let op = match self.peek() {
            Some(Token::Plus) => UnaryOp::Plus,
            Some(Token::Minus) => UnaryOp::Minus,
            _ => return self.primary(),
        };
        self.position += 1;
        self.descend()?;
        let operand = self.factor()?;
        self.depth -= 1;
        Ok(Expr::Unary { op, operand: Box::new(operand) })
    }

    fn primary(&mut self) -> Result<Expr, CalcError> {
        match self.advance() {
            Some(Token::Number(value)) => Ok(Expr::Literal(value)),
            Some(Token::LParen) => {
                self.descend()?;
                let inner = self.expr()?;
                self.depth -= 1;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(CalcError::Invalid),
                }
            }
            _ => Err(CalcError::Invalid),
        }
    }

    fn descend(&mut self) -> Result<(), CalcError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(CalcError::NestingTooDeep);
        }
        Ok(())
    }
}
