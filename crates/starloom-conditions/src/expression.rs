//! [`Expression`]: integer arithmetic over literals and condition names.
//!
//! Expressions are written as whitespace-separated tokens:
//! `"cargo space" - 5 * ( tons + 1 )`. Multiplicative operators bind tighter
//! than additive ones and everything is left-associative.

use crate::error::ConditionError;
use crate::store::ConditionsStore;

/// A binary arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`, zero divisor yields zero.
    Div,
    /// `%`, zero divisor yields zero.
    Rem,
}

impl ArithOp {
    /// Parse an operator token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "+" => Some(Self::Add),
            "-" => Some(Self::Sub),
            "*" => Some(Self::Mul),
            "/" => Some(Self::Div),
            "%" => Some(Self::Rem),
            _ => None,
        }
    }

    /// The operator's token.
    pub const fn token(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
        }
    }

    const fn binds_tightly(self) -> bool {
        matches!(self, Self::Mul | Self::Div | Self::Rem)
    }

    /// Apply with saturation.
    pub const fn apply(self, lhs: i64, rhs: i64) -> i64 {
        match self {
            Self::Add => lhs.saturating_add(rhs),
            Self::Sub => lhs.saturating_sub(rhs),
            Self::Mul => lhs.saturating_mul(rhs),
            Self::Div => match lhs.checked_div(rhs) {
                Some(v) => v,
                None if rhs == 0 => 0,
                None => i64::MAX,
            },
            Self::Rem => match lhs.checked_rem(rhs) {
                Some(v) => v,
                None => 0,
            },
        }
    }
}

/// An integer expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    /// A constant.
    Literal(i64),
    /// The current value of a condition.
    Name(String),
    /// A parenthesised sub-expression.
    Group(Box<Self>),
    /// `lhs op rhs`.
    Binary {
        /// Left operand.
        lhs: Box<Self>,
        /// Operator.
        op: ArithOp,
        /// Right operand.
        rhs: Box<Self>,
    },
}

impl Expression {
    /// Parse a whole token list as one expression.
    pub fn parse<S: AsRef<str>>(tokens: &[S]) -> Result<Self, ConditionError> {
        let tokens: Vec<&str> = tokens.iter().map(AsRef::as_ref).collect();
        let mut pos = 0;
        let expr = parse_sum(&tokens, &mut pos)?;
        match tokens.get(pos) {
            None => Ok(expr),
            Some(extra) => Err(ConditionError::MalformedExpression {
                reason: format!("unexpected \"{extra}\""),
            }),
        }
    }

    /// Evaluate against `store`.
    pub fn evaluate(&self, store: &ConditionsStore) -> i64 {
        match self {
            Self::Literal(v) => *v,
            Self::Name(name) => store.get(name),
            Self::Group(inner) => inner.evaluate(store),
            Self::Binary { lhs, op, rhs } => op.apply(lhs.evaluate(store), rhs.evaluate(store)),
        }
    }

    /// Whether this expression is a single literal.
    pub const fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    /// Every condition name this expression reads.
    pub fn names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_names(&mut out);
        out
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Literal(_) => {}
            Self::Name(name) => out.push(name),
            Self::Group(inner) => inner.collect_names(out),
            Self::Binary { lhs, rhs, .. } => {
                lhs.collect_names(out);
                rhs.collect_names(out);
            }
        }
    }

    /// The tokens that parse back to this expression.
    pub fn to_tokens(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.push_tokens(&mut out);
        out
    }

    fn push_tokens(&self, out: &mut Vec<String>) {
        match self {
            Self::Literal(v) => out.push(v.to_string()),
            Self::Name(name) => out.push(name.clone()),
            Self::Group(inner) => {
                out.push("(".to_owned());
                inner.push_tokens(out);
                out.push(")".to_owned());
            }
            Self::Binary { lhs, op, rhs } => {
                lhs.push_tokens(out);
                out.push(op.token().to_owned());
                rhs.push_tokens(out);
            }
        }
    }
}

fn parse_sum(tokens: &[&str], pos: &mut usize) -> Result<Expression, ConditionError> {
    let mut lhs = parse_product(tokens, pos)?;
    while let Some(op) = tokens.get(*pos).and_then(|t| ArithOp::from_token(t)) {
        if op.binds_tightly() {
            break;
        }
        *pos = pos.saturating_add(1);
        let rhs = parse_product(tokens, pos)?;
        lhs = Expression::Binary {
            lhs: Box::new(lhs),
            op,
            rhs: Box::new(rhs),
        };
    }
    Ok(lhs)
}

fn parse_product(tokens: &[&str], pos: &mut usize) -> Result<Expression, ConditionError> {
    let mut lhs = parse_operand(tokens, pos)?;
    while let Some(op) = tokens.get(*pos).and_then(|t| ArithOp::from_token(t)) {
        if !op.binds_tightly() {
            break;
        }
        *pos = pos.saturating_add(1);
        let rhs = parse_operand(tokens, pos)?;
        lhs = Expression::Binary {
            lhs: Box::new(lhs),
            op,
            rhs: Box::new(rhs),
        };
    }
    Ok(lhs)
}

fn parse_operand(tokens: &[&str], pos: &mut usize) -> Result<Expression, ConditionError> {
    let Some(token) = tokens.get(*pos).copied() else {
        return Err(ConditionError::MalformedExpression {
            reason: "missing operand".to_owned(),
        });
    };
    *pos = pos.saturating_add(1);
    if token == "(" {
        let inner = parse_sum(tokens, pos)?;
        if tokens.get(*pos).copied() != Some(")") {
            return Err(ConditionError::MalformedExpression {
                reason: "unbalanced parenthesis".to_owned(),
            });
        }
        *pos = pos.saturating_add(1);
        return Ok(Expression::Group(Box::new(inner)));
    }
    if let Some(value) = parse_literal(token) {
        return Ok(Expression::Literal(value));
    }
    if ArithOp::from_token(token).is_some() || token == ")" || !starloom_data::node::is_condition_name(token) {
        return Err(ConditionError::MalformedExpression {
            reason: format!("\"{token}\" is not an operand"),
        });
    }
    Ok(Expression::Name(token.to_owned()))
}

/// Parse an integer literal token. Fractional numbers round to nearest.
pub fn parse_literal(token: &str) -> Option<i64> {
    if let Ok(v) = token.parse::<i64>() {
        return Some(v);
    }
    starloom_data::parse_number(token).map(to_i64)
}

/// Round a data-file number to a condition value, saturating.
#[allow(clippy::cast_possible_truncation)]
pub fn to_i64(value: f64) -> i64 {
    // Float-to-int `as` saturates and maps NaN to zero.
    value.round() as i64
}
