//! [`ConditionSet`]: a predicate over the conditions store.
//!
//! A set is loaded from the children of a node. Every child line must hold.
//! A line is one of:
//!
//! - `and` / `or` / `not` with indented children,
//! - `never`,
//! - `has <name>` or a bare `<name>` (true when non-zero),
//! - `not <name>` (true when zero),
//! - `<expression> <op> <expression>` with `op` one of
//!   `== != < <= > >=`,
//! - several of the above joined by infix `and` / `or` (`and` binds tighter).
//!
//! An empty set is true.

use starloom_data::{DataNode, DataWriter};

use crate::error::ConditionError;
use crate::expression::Expression;
use crate::store::ConditionsStore;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl Comparison {
    /// Parse an operator token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Le),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Ge),
            _ => None,
        }
    }

    /// The operator's token.
    pub const fn token(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    /// Compare two values.
    pub const fn holds(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
        }
    }
}

/// One node of a predicate tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `lhs op rhs`.
    Compare {
        /// Left side.
        lhs: Expression,
        /// Operator.
        op: Comparison,
        /// Right side.
        rhs: Expression,
    },
    /// `has <name>` or a bare name: the condition is non-zero.
    Has(String),
    /// `not <name>`: the condition is zero.
    Lacks(String),
    /// `never`: always false.
    Never,
    /// Every child holds.
    All(Vec<Self>),
    /// At least one child holds.
    Any(Vec<Self>),
    /// The child does not hold.
    Not(Box<Self>),
}

impl Condition {
    /// Evaluate against `store`. Every child of a combinator is evaluated,
    /// whatever the earlier results.
    pub fn test(&self, store: &ConditionsStore) -> bool {
        match self {
            Self::Compare { lhs, op, rhs } => op.holds(lhs.evaluate(store), rhs.evaluate(store)),
            Self::Has(name) => store.get(name) != 0,
            Self::Lacks(name) => store.get(name) == 0,
            Self::Never => false,
            Self::All(children) => children.iter().map(|c| c.test(store)).fold(true, |a, b| a & b),
            Self::Any(children) => children.iter().map(|c| c.test(store)).fold(false, |a, b| a | b),
            Self::Not(child) => !child.test(store),
        }
    }

    /// Parse one line and its children.
    pub fn parse(node: &DataNode) -> Result<Self, ConditionError> {
        let tokens = node.tokens();
        if node.size() == 1 && node.has_children() {
            match node.key() {
                "and" => return Ok(Self::All(parse_children(node))),
                "or" => return Ok(Self::Any(parse_children(node))),
                "not" => return Ok(Self::Not(Box::new(Self::All(parse_children(node))))),
                _ => {}
            }
        }
        parse_infix(tokens)
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Compare { lhs, rhs, .. } => {
                out.extend(lhs.names());
                out.extend(rhs.names());
            }
            Self::Has(name) | Self::Lacks(name) => out.push(name),
            Self::Never => {}
            Self::All(children) | Self::Any(children) => {
                for child in children {
                    child.collect_names(out);
                }
            }
            Self::Not(child) => child.collect_names(out),
        }
    }

    /// Write this condition as one line plus children.
    pub fn save(&self, writer: &mut DataWriter) {
        match self {
            Self::Compare { lhs, op, rhs } => {
                let mut tokens = lhs.to_tokens();
                tokens.push(op.token().to_owned());
                tokens.extend(rhs.to_tokens());
                writer.write(tokens);
            }
            Self::Has(name) => writer.write(["has", name.as_str()]),
            Self::Lacks(name) => writer.write(["not", name.as_str()]),
            Self::Never => writer.write(["never"]),
            Self::All(children) => save_block(writer, "and", children),
            Self::Any(children) => save_block(writer, "or", children),
            Self::Not(child) => match child.as_ref() {
                Self::All(children) => save_block(writer, "not", children),
                other => save_block(writer, "not", std::slice::from_ref(other)),
            },
        }
    }
}

fn save_block(writer: &mut DataWriter, keyword: &str, children: &[Condition]) {
    writer.write([keyword]);
    writer.begin_child();
    for child in children {
        child.save(writer);
    }
    writer.end_child();
}

/// Parse every child line, tracing and dropping the ones that fail.
fn parse_children(node: &DataNode) -> Vec<Condition> {
    node.children()
        .iter()
        .filter_map(|child| match Condition::parse(child) {
            Ok(condition) => Some(condition),
            Err(err) => {
                child.print_trace(&format!("Error: {err}:"));
                None
            }
        })
        .collect()
}

fn parse_infix(tokens: &[String]) -> Result<Condition, ConditionError> {
    let mut any = Vec::new();
    for or_group in tokens.split(|t| t == "or") {
        let mut all = Vec::new();
        for segment in or_group.split(|t| t == "and") {
            all.push(parse_simple(segment)?);
        }
        any.push(collapse(all, Condition::All));
    }
    Ok(collapse(any, Condition::Any))
}

fn collapse(mut parts: Vec<Condition>, wrap: fn(Vec<Condition>) -> Condition) -> Condition {
    if parts.len() == 1 {
        if let Some(only) = parts.pop() {
            return only;
        }
    }
    wrap(parts)
}

fn parse_simple(tokens: &[String]) -> Result<Condition, ConditionError> {
    match tokens {
        [] => Err(ConditionError::MalformedExpression {
            reason: "empty condition".to_owned(),
        }),
        [only] if only == "never" => Ok(Condition::Never),
        [keyword, name] if keyword == "has" => checked_name(name).map(Condition::Has),
        [keyword, name] if keyword == "not" => checked_name(name).map(Condition::Lacks),
        [name] => checked_name(name).map(Condition::Has),
        _ => {
            let Some(split) = tokens.iter().position(|t| Comparison::from_token(t).is_some()) else {
                let op = tokens
                    .iter()
                    .find(|t| looks_like_operator(t))
                    .cloned()
                    .unwrap_or_else(|| tokens.join(" "));
                return Err(ConditionError::UnknownOperator { op });
            };
            let op = tokens
                .get(split)
                .and_then(|t| Comparison::from_token(t))
                .ok_or_else(|| ConditionError::MalformedExpression {
                    reason: "missing comparison".to_owned(),
                })?;
            let lhs = Expression::parse(tokens.get(..split).unwrap_or_default())?;
            let rhs = Expression::parse(tokens.get(split.saturating_add(1)..).unwrap_or_default())?;
            Ok(Condition::Compare { lhs, op, rhs })
        }
    }
}

fn checked_name(name: &str) -> Result<String, ConditionError> {
    if starloom_data::node::is_condition_name(name) {
        Ok(name.to_owned())
    } else {
        Err(ConditionError::InvalidName {
            name: name.to_owned(),
        })
    }
}

fn looks_like_operator(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| "=<>!?+-*/%&|".contains(c))
}

/// A conjunction of conditions loaded from a node's children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionSet {
    conditions: Vec<Condition>,
}

impl ConditionSet {
    /// An empty set, which is always true.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a set from the children of `node`.
    pub fn from_node(node: &DataNode) -> Self {
        let mut set = Self::new();
        set.load(node);
        set
    }

    /// Append the conditions in the children of `node`. Lines that do not
    /// parse are reported with a trace and skipped.
    pub fn load(&mut self, node: &DataNode) {
        self.conditions.extend(parse_children(node));
    }

    /// Append one line (and its children) as a condition.
    pub fn add_line(&mut self, node: &DataNode) -> Result<(), ConditionError> {
        self.conditions.push(Condition::parse(node)?);
        Ok(())
    }

    /// Append an already-built condition.
    pub fn push(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    /// Whether the set has no conditions.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// The top-level conditions.
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Whether every condition holds.
    pub fn test(&self, store: &ConditionsStore) -> bool {
        self.conditions.iter().map(|c| c.test(store)).fold(true, |a, b| a & b)
    }

    /// Every condition name the set reads, in order, with repeats.
    pub fn names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for condition in &self.conditions {
            condition.collect_names(&mut out);
        }
        out
    }

    /// Write the conditions as lines at the writer's current depth.
    pub fn save(&self, writer: &mut DataWriter) {
        for condition in &self.conditions {
            condition.save(writer);
        }
    }

    /// Write `keyword` followed by the conditions as children, unless the
    /// set is empty.
    pub fn save_block(&self, writer: &mut DataWriter, keyword: &[&str]) {
        if self.is_empty() {
            return;
        }
        writer.write(keyword);
        writer.begin_child();
        self.save(writer);
        writer.end_child();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use starloom_data::DataFile;

    fn set(text: &str) -> ConditionSet {
        let file = DataFile::parse(text, "t").unwrap();
        ConditionSet::from_node(&file.nodes()[0])
    }

    #[test]
    fn empty_set_is_true() {
        assert!(ConditionSet::new().test(&ConditionsStore::new()));
    }

    #[test]
    fn infix_and_or() {
        let store = ConditionsStore::from_values([("cash", 1000), ("rep", -10)]);
        assert!(set("to offer\n\tcash >= 500 and rep > -20\n").test(&store));
        assert!(!set("to offer\n\tcash >= 5000\n").test(&store));
        assert!(set("t\n\tcash >= 5000 or rep == -10\n").test(&store));
        // `and` binds tighter: false or (true and true).
        assert!(set("t\n\tcash < 0 or cash > 0 and rep < 0\n").test(&store));
    }

    #[test]
    fn has_not_never_bare() {
        let store = ConditionsStore::from_values([("met", 1)]);
        assert!(set("t\n\thas met\n").test(&store));
        assert!(set("t\n\tmet\n").test(&store));
        assert!(set("t\n\tnot unmet\n").test(&store));
        assert!(!set("t\n\tnever\n").test(&store));
    }

    #[test]
    fn blocks() {
        let store = ConditionsStore::from_values([("a", 1), ("b", 0)]);
        assert!(set("t\n\tor\n\t\thas a\n\t\thas b\n").test(&store));
        assert!(!set("t\n\tand\n\t\thas a\n\t\thas b\n").test(&store));
        assert!(set("t\n\tnot\n\t\thas a\n\t\thas b\n").test(&store));
    }

    #[test]
    fn expression_sides() {
        let store = ConditionsStore::from_values([("tons", 7), ("space", 20)]);
        assert!(set("t\n\tspace - tons * 2 >= 6\n").test(&store));
    }

    #[test]
    fn unknown_operator_drops_line() {
        let loaded = set("t\n\tcash =< 4\n\thas x\n");
        assert_eq!(loaded.conditions().len(), 1);
        let file = DataFile::parse("cash =< 4\n", "t").unwrap();
        assert_eq!(
            Condition::parse(&file.nodes()[0]),
            Err(ConditionError::UnknownOperator { op: "=<".to_owned() })
        );
    }

    #[test]
    fn save_then_load_is_equivalent() {
        let original = set("t\n\tcash >= 500 and rep > -20\n\tnot\n\t\thas a\n\tnever\n");
        let mut writer = DataWriter::new();
        original.save_block(&mut writer, &["t"]);
        let reloaded = set(&writer.into_string());
        assert_eq!(original, reloaded);
    }
}
