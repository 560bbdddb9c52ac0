//! Data-driven test definitions: `test <name>` and `test-data <name>`.
//!
//! ```text
//! test "Tick a day"
//! 	status active
//! 	sequence
//! 		inject "Fresh pilot"
//! 		apply
//! 			"test: counter" = 1
//! 		advance 1
//! 		assert
//! 			"test: counter" == 1
//! ```
//!
//! This module only describes tests. Running them needs a player, which is
//! the player crate's job.

use std::fmt;

use starloom_conditions::{ConditionAssignments, ConditionSet};
use starloom_core::Handle;
use starloom_data::DataNode;

use crate::entities::{Planet, System};
use crate::universe::UniverseObjects;

/// How far a test is trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TestStatus {
    /// Expected to pass.
    #[default]
    Active,
    /// Expected to pass, but exercises only part of a feature.
    Partial,
    /// Known to be broken itself.
    Broken,
    /// Fails because of a known bug.
    KnownFailure,
    /// Fails because the feature does not exist yet.
    MissingFeature,
}

impl TestStatus {
    /// Parse a `status` value.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "active" => Some(Self::Active),
            "partial" => Some(Self::Partial),
            "broken" => Some(Self::Broken),
            "known failure" => Some(Self::KnownFailure),
            "missing feature" => Some(Self::MissingFeature),
            _ => None,
        }
    }

    /// Whether tests with this status are executed.
    pub const fn runs(self) -> bool {
        matches!(self, Self::Active | Self::Partial)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Partial => "partial",
            Self::Broken => "broken",
            Self::KnownFailure => "known failure",
            Self::MissingFeature => "missing feature",
        })
    }
}

/// One step of a test sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum TestStep {
    /// Replace the player with the pilot stored in a `test-data` entry.
    Inject(String),
    /// Apply condition assignments.
    Apply(ConditionAssignments),
    /// Fail unless the conditions hold.
    Assert(ConditionSet),
    /// Jump to a label depending on the conditions.
    Branch {
        /// Conditions to test.
        conditions: ConditionSet,
        /// Label when they hold.
        if_true: String,
        /// Label otherwise; falls through when absent.
        if_false: Option<String>,
    },
    /// A jump target.
    Label(String),
    /// Run another test in place.
    Call(String),
    /// Set the travel plan.
    Navigate {
        /// Systems to travel through, in order.
        travel: Vec<Handle<System>>,
        /// Planet to land on at the end.
        destination: Option<Handle<Planet>>,
    },
    /// Log a message.
    Debug(String),
    /// Let days pass.
    Advance(i64),
    /// Keyboard, mouse or command input. Not supported without a UI.
    Input,
}

/// A `test` definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestDef {
    name: String,
    status: TestStatus,
    description: String,
    steps: Vec<TestStep>,
}

impl TestDef {
    /// Load a `test <name>` block.
    pub fn load(&mut self, node: &DataNode, universe: &mut UniverseObjects) {
        if node.size() < 2 {
            node.print_trace("Unnamed test:");
            return;
        }
        node.token(1).clone_into(&mut self.name);
        for child in node.children() {
            match child.key() {
                "status" if child.size() >= 2 => match TestStatus::from_token(child.token(1)) {
                    Some(status) => self.status = status,
                    None => {
                        child.print_trace("Unsupported status:");
                    }
                },
                "description" => {
                    self.description.clear();
                    let lines = child.tokens().iter().skip(1).cloned();
                    let nested = child.children().iter().map(|g| g.tokens().join(" "));
                    self.description = lines.chain(nested).collect::<Vec<_>>().join("\n");
                }
                "sequence" => {
                    self.steps = child.children().iter().filter_map(|step| load_step(step, universe)).collect();
                }
                _ => {
                    child.print_trace("Skipping unrecognized attribute:");
                }
            }
        }
    }

    /// The test name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The status.
    pub const fn status(&self) -> TestStatus {
        self.status
    }

    /// The description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The steps, in order.
    pub fn steps(&self) -> &[TestStep] {
        &self.steps
    }

    /// Index of the step `label <name>`.
    pub fn label(&self, name: &str) -> Option<usize> {
        self.steps
            .iter()
            .position(|step| matches!(step, TestStep::Label(label) if label == name))
    }
}

fn load_step(node: &DataNode, universe: &mut UniverseObjects) -> Option<TestStep> {
    let value = || (node.size() >= 2).then(|| node.token(1).to_owned());
    let step = match node.key() {
        "inject" => TestStep::Inject(value()?),
        "apply" | "assign" => TestStep::Apply(ConditionAssignments::from_node(node)),
        "assert" => TestStep::Assert(ConditionSet::from_node(node)),
        "branch" => TestStep::Branch {
            conditions: ConditionSet::from_node(node),
            if_true: value()?,
            if_false: (node.size() >= 3).then(|| node.token(2).to_owned()),
        },
        "label" => TestStep::Label(value()?),
        "call" => TestStep::Call(value()?),
        "navigate" => {
            let mut travel = Vec::new();
            let mut destination = None;
            for child in node.children() {
                match child.key() {
                    "travel" if child.size() >= 2 => travel.push(universe.systems.get(child.token(1))),
                    "travel destination" if child.size() >= 2 => {
                        destination = Some(universe.planets.get(child.token(1)));
                    }
                    _ => {
                        child.print_trace("Skipping unrecognized attribute:");
                    }
                }
            }
            TestStep::Navigate { travel, destination }
        }
        "debug" => TestStep::Debug(node.tokens().iter().skip(1).cloned().collect::<Vec<_>>().join(" ")),
        "advance" => TestStep::Advance(if node.size() >= 2 {
            starloom_conditions::expression::to_i64(node.value(1))
        } else {
            1
        }),
        "input" => TestStep::Input,
        _ => {
            node.print_trace("Skipping unrecognized test step:");
            return None;
        }
    };
    Some(step)
}

/// A `test-data` entry: a stored pilot that tests can inject.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestData {
    category: String,
    contents: Option<DataNode>,
}

impl TestData {
    /// Load a `test-data <name>` block.
    pub fn load(&mut self, node: &DataNode) {
        for child in node.children() {
            match child.key() {
                "category" if child.size() >= 2 => child.token(1).clone_into(&mut self.category),
                "contents" => self.contents = Some(child.clone()),
                _ => {
                    child.print_trace("Skipping unrecognized attribute:");
                }
            }
        }
    }

    /// The data category, e.g. `savegame`.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// The stored data: the children of the `contents` node.
    pub fn contents(&self) -> &[DataNode] {
        self.contents.as_ref().map_or(&[][..], DataNode::children)
    }
}
