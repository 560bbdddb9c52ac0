//! [`ConditionAssignments`]: an ordered program of condition writes.
//!
//! Each child line is one assignment:
//!
//! - `set <name>` / `clear <name>`
//! - `<name> ++` / `<name> --`
//! - `<name> <op> <expression>` with `op` one of
//!   `= += -= *= /= <?= >?=`
//!
//! Assignments apply in written order, so later lines see earlier writes.

use starloom_data::{DataNode, DataWriter};

use crate::error::ConditionError;
use crate::expression::Expression;
use crate::store::ConditionsStore;

/// An assignment operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `=`
    Assign,
    /// `+=`
    Add,
    /// `-=`
    Sub,
    /// `*=`
    Mul,
    /// `/=`, a zero divisor leaves the value unchanged.
    Div,
    /// `<?=`: keep the smaller.
    Min,
    /// `>?=`: keep the larger.
    Max,
    /// `++`
    Increment,
    /// `--`
    Decrement,
    /// `set`: becomes 1.
    Set,
    /// `clear`: the entry is removed.
    Clear,
}

impl AssignOp {
    /// Parse an infix operator token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "=" => Some(Self::Assign),
            "+=" => Some(Self::Add),
            "-=" => Some(Self::Sub),
            "*=" => Some(Self::Mul),
            "/=" => Some(Self::Div),
            "<?=" => Some(Self::Min),
            ">?=" => Some(Self::Max),
            "++" => Some(Self::Increment),
            "--" => Some(Self::Decrement),
            _ => None,
        }
    }

    /// The operator's token.
    pub const fn token(self) -> &'static str {
        match self {
            Self::Assign => "=",
            Self::Add => "+=",
            Self::Sub => "-=",
            Self::Mul => "*=",
            Self::Div => "/=",
            Self::Min => "<?=",
            Self::Max => ">?=",
            Self::Increment => "++",
            Self::Decrement => "--",
            Self::Set => "set",
            Self::Clear => "clear",
        }
    }

    const fn takes_operand(self) -> bool {
        !matches!(self, Self::Increment | Self::Decrement | Self::Set | Self::Clear)
    }
}

/// One write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Target condition.
    pub name: String,
    /// Operator.
    pub op: AssignOp,
    /// Right-hand side for operators that take one.
    pub value: Option<Expression>,
}

impl Assignment {
    /// Parse one line.
    pub fn parse(tokens: &[String]) -> Result<Self, ConditionError> {
        match tokens {
            [keyword, name] if keyword == "set" || keyword == "clear" => {
                let op = if keyword == "set" { AssignOp::Set } else { AssignOp::Clear };
                Ok(Self {
                    name: checked_name(name)?,
                    op,
                    value: None,
                })
            }
            [name, op_token, rest @ ..] => {
                let op = AssignOp::from_token(op_token).ok_or_else(|| ConditionError::UnknownOperator {
                    op: op_token.clone(),
                })?;
                let value = if op.takes_operand() {
                    Some(Expression::parse(rest)?)
                } else if rest.is_empty() {
                    None
                } else {
                    return Err(ConditionError::MalformedExpression {
                        reason: format!("\"{op_token}\" takes no operand"),
                    });
                };
                Ok(Self {
                    name: checked_name(name)?,
                    op,
                    value,
                })
            }
            _ => Err(ConditionError::MalformedExpression {
                reason: "an assignment needs a name and an operator".to_owned(),
            }),
        }
    }

    /// Apply to `store`.
    pub fn apply(&self, store: &mut ConditionsStore) {
        let rhs = self.value.as_ref().map_or(0, |v| v.evaluate(store));
        let current = store.get(&self.name);
        let next = match self.op {
            AssignOp::Assign => rhs,
            AssignOp::Add => current.saturating_add(rhs),
            AssignOp::Sub => current.saturating_sub(rhs),
            AssignOp::Mul => current.saturating_mul(rhs),
            AssignOp::Div => {
                if rhs == 0 {
                    current
                } else {
                    current.checked_div(rhs).unwrap_or(i64::MAX)
                }
            }
            AssignOp::Min => current.min(rhs),
            AssignOp::Max => current.max(rhs),
            AssignOp::Increment => current.saturating_add(1),
            AssignOp::Decrement => current.saturating_sub(1),
            AssignOp::Set => 1,
            AssignOp::Clear => {
                store.erase(&self.name);
                return;
            }
        };
        store.set(&self.name, next);
    }

    /// The tokens that parse back to this assignment.
    pub fn to_tokens(&self) -> Vec<String> {
        match self.op {
            AssignOp::Set | AssignOp::Clear => vec![self.op.token().to_owned(), self.name.clone()],
            op => {
                let mut tokens = vec![self.name.clone(), op.token().to_owned()];
                if let Some(value) = &self.value {
                    tokens.extend(value.to_tokens());
                }
                tokens
            }
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

/// An ordered list of assignments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionAssignments {
    assignments: Vec<Assignment>,
}

impl ConditionAssignments {
    /// An empty program.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the children of `node`.
    pub fn from_node(node: &DataNode) -> Self {
        let mut program = Self::new();
        program.load(node);
        program
    }

    /// Append every child of `node`. Lines that do not parse are reported
    /// with a trace and skipped.
    pub fn load(&mut self, node: &DataNode) {
        for child in node.children() {
            self.add_line(child);
        }
    }

    /// Append one line, tracing if it does not parse. Returns whether it
    /// was added.
    pub fn add_line(&mut self, node: &DataNode) -> bool {
        match Assignment::parse(node.tokens()) {
            Ok(assignment) => {
                self.assignments.push(assignment);
                true
            }
            Err(err) => {
                node.print_trace(&format!("Error: {err}:"));
                false
            }
        }
    }

    /// Append an already-built assignment.
    pub fn push(&mut self, assignment: Assignment) {
        self.assignments.push(assignment);
    }

    /// Shorthand for `name += delta`.
    pub fn add(&mut self, name: &str, delta: i64) {
        self.push(Assignment {
            name: name.to_owned(),
            op: AssignOp::Add,
            value: Some(Expression::Literal(delta)),
        });
    }

    /// Whether there is nothing to apply.
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// The assignments in order.
    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    /// Apply every assignment in order.
    pub fn apply(&self, store: &mut ConditionsStore) {
        for assignment in &self.assignments {
            assignment.apply(store);
        }
    }

    /// Write the assignments as lines at the writer's current depth.
    pub fn save(&self, writer: &mut DataWriter) {
        for assignment in &self.assignments {
            writer.write(assignment.to_tokens());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use starloom_data::DataFile;

    fn program(body: &str) -> ConditionAssignments {
        let file = DataFile::parse(&format!("apply\n{body}"), "t").unwrap();
        ConditionAssignments::from_node(&file.nodes()[0])
    }

    #[test]
    fn later_lines_see_earlier_writes() {
        let mut store = ConditionsStore::from_values([("cash", 1000)]);
        program("\tcash -= 500\n\tcash += 100\n\tcopy = cash\n").apply(&mut store);
        assert_eq!(store.get("cash"), 600);
        assert_eq!(store.get("copy"), 600);
    }

    #[test]
    fn every_operator() {
        let mut store = ConditionsStore::from_values([("a", 10), ("gone", 4)]);
        program(
            "\ta *= 3\n\ta /= 4\n\ta /= 0\n\ta <?= 5\n\tb >?= 2\n\tc ++\n\tc ++\n\td --\n\tset e\n\tclear gone\n",
        )
        .apply(&mut store);
        assert_eq!(store.get("a"), 5);
        assert_eq!(store.get("b"), 2);
        assert_eq!(store.get("c"), 2);
        assert_eq!(store.get("d"), -1);
        assert_eq!(store.get("e"), 1);
        assert!(!store.has("gone"));
    }

    #[test]
    fn saturates_at_limits() {
        let mut store = ConditionsStore::from_values([("x", i64::MAX)]);
        program("\tx += 1\n\ty = x * x\n").apply(&mut store);
        assert_eq!(store.get("x"), i64::MAX);
        assert_eq!(store.get("y"), i64::MAX);
    }

    #[test]
    fn unknown_operator_is_dropped() {
        let loaded = program("\tx =+ 3\n\ty = 2\n");
        assert_eq!(loaded.assignments().len(), 1);
        assert_eq!(loaded.assignments()[0].name, "y");
    }

    #[test]
    fn save_and_reload() {
        let original = program("\tx += 2 * y\n\tset flag\n\tz --\n");
        let mut writer = DataWriter::new();
        writer.write(["apply"]);
        writer.begin_child();
        original.save(&mut writer);
        writer.end_child();
        let file = DataFile::parse(&writer.into_string(), "t").unwrap();
        assert_eq!(ConditionAssignments::from_node(&file.nodes()[0]), original);
    }
}
