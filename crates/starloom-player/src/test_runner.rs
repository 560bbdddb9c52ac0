//! Running `test` definitions against a live pilot.
//!
//! A run starts from an empty pilot; an `inject` step swaps in a saved
//! game from `test-data`. Steps then change conditions, check them, jump
//! between labels, fly and let days pass. Content changes made during the
//! run stay in the universe it was given.

use std::path::Path;

use starloom_data::DataWriter;
use starloom_universe::UniverseObjects;
use starloom_universe::test_def::{TestDef, TestStatus, TestStep};

use crate::error::TestError;
use crate::player::PlayerInfo;

/// Most steps one run may execute, counting every nested call.
pub const MAX_STEPS: usize = 100_000;

/// How deeply `call` steps may nest.
pub const MAX_CALL_DEPTH: usize = 32;

/// How a test run ended, short of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestReport {
    /// Every step ran and every assertion held.
    Passed {
        /// Steps executed, including those of called tests.
        steps: usize,
    },
    /// The test's status says it is not expected to pass, so it did not
    /// run.
    NotRun(TestStatus),
}

/// Runs tests against one universe, keeping the pilot between steps.
#[derive(Debug)]
pub struct TestRunner<'a> {
    universe: &'a mut UniverseObjects,
    player: PlayerInfo,
    seed: u64,
    executed: usize,
}

impl<'a> TestRunner<'a> {
    /// A runner with an empty pilot.
    pub fn new(universe: &'a mut UniverseObjects, seed: u64) -> Self {
        Self {
            universe,
            player: PlayerInfo::new(seed),
            seed,
            executed: 0,
        }
    }

    /// The pilot as the steps left it.
    pub const fn player(&self) -> &PlayerInfo {
        &self.player
    }

    /// Run test `name`.
    pub fn run(&mut self, name: &str) -> Result<TestReport, TestError> {
        let test = self.find(name)?;
        if !test.status().runs() {
            tracing::info!(test = name, status = %test.status(), "test skipped");
            return Ok(TestReport::NotRun(test.status()));
        }
        tracing::info!(test = name, "test started");
        self.run_steps(&test, 0)?;
        tracing::info!(test = name, steps = self.executed, "test passed");
        Ok(TestReport::Passed { steps: self.executed })
    }

    fn find(&self, name: &str) -> Result<TestDef, TestError> {
        self.universe
            .tests
            .find_value(name)
            .filter(|t| !t.name().is_empty())
            .cloned()
            .ok_or_else(|| TestError::UnknownTest(name.to_owned()))
    }

    fn run_steps(&mut self, test: &TestDef, depth: usize) -> Result<(), TestError> {
        if depth > MAX_CALL_DEPTH {
            return Err(TestError::CallDepth(MAX_CALL_DEPTH));
        }
        let mut index = 0;
        while let Some(step) = test.steps().get(index) {
            self.executed = self.executed.saturating_add(1);
            if self.executed > MAX_STEPS {
                return Err(TestError::StepLimit(MAX_STEPS));
            }
            index = match step {
                TestStep::Inject(data) => {
                    self.inject(data)?;
                    index.saturating_add(1)
                }
                TestStep::Apply(assignments) => {
                    assignments.apply(&mut self.player.conditions);
                    self.player.settle(self.universe);
                    index.saturating_add(1)
                }
                TestStep::Assert(conditions) => {
                    if !conditions.test(&self.player.conditions) {
                        let mut writer = DataWriter::new();
                        conditions.save(&mut writer);
                        let condition = writer.into_string().trim().replace('\n', "; ");
                        return Err(TestError::AssertionFailed { step: index, condition });
                    }
                    index.saturating_add(1)
                }
                TestStep::Branch {
                    conditions,
                    if_true,
                    if_false,
                } => {
                    let target = if conditions.test(&self.player.conditions) {
                        Some(if_true)
                    } else {
                        if_false.as_ref()
                    };
                    match target {
                        Some(label) => test
                            .label(label)
                            .ok_or_else(|| TestError::UnknownLabel(label.clone()))?,
                        None => index.saturating_add(1),
                    }
                }
                TestStep::Label(_) => index.saturating_add(1),
                TestStep::Call(name) => {
                    let called = self.find(name)?;
                    tracing::debug!(test = name, depth, "test called");
                    self.run_steps(&called, depth.saturating_add(1))?;
                    index.saturating_add(1)
                }
                TestStep::Navigate { travel, destination } => {
                    self.player.set_travel_plan(travel.clone(), *destination);
                    self.player.fly_travel_plan(self.universe);
                    index.saturating_add(1)
                }
                TestStep::Debug(message) => {
                    tracing::info!(test = test.name(), "{message}");
                    index.saturating_add(1)
                }
                TestStep::Advance(days) => {
                    for _ in 0..*days {
                        self.player.advance_day(self.universe);
                    }
                    index.saturating_add(1)
                }
                TestStep::Input => return Err(TestError::Unsupported(index)),
            };
        }
        Ok(())
    }

    fn inject(&mut self, name: &str) -> Result<(), TestError> {
        let contents = self
            .universe
            .test_data
            .find_value(name)
            .filter(|d| d.category() == "savegame")
            .map(|d| d.contents().to_vec())
            .ok_or_else(|| TestError::BadTestData(name.to_owned()))?;
        let player = PlayerInfo::from_nodes(&contents, Path::new(name), self.universe, self.seed)
            .map_err(|error| {
                tracing::warn!(%error, "test data does not load");
                TestError::BadTestData(name.to_owned())
            })?;
        self.player = player;
        Ok(())
    }
}

/// Run test `name` with a fresh pilot.
pub fn run_test(name: &str, universe: &mut UniverseObjects, seed: u64) -> Result<TestReport, TestError> {
    TestRunner::new(universe, seed).run(name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const CONTENT: &str = "\
system Sol
\tobject Earth
planet Earth
\tspaceport `Docks.`
test-data \"Fresh pilot\"
\tcategory savegame
\tcontents
\t\tpilot Ada Reyes
\t\tdate 1 1 3014
\t\tsystem Sol
\t\tplanet Earth
\t\tconditions
\t\t\t\"started\" 1
test Counting
\tstatus active
\tsequence
\t\tinject \"Fresh pilot\"
\t\tassert
\t\t\tstarted == 1
\t\tapply
\t\t\tcount = 0
\t\tlabel loop
\t\tapply
\t\t\tcount += 1
\t\tbranch loop
\t\t\tcount < 3
\t\tassert
\t\t\tcount == 3
\t\tadvance 2
\t\tassert
\t\t\tday == 3
test Failing
\tsequence
\t\tapply
\t\t\tx = 1
\t\tassert
\t\t\tx == 2
test Later
\tstatus \"missing feature\"
\tsequence
\t\tassert
\t\t\tnever == 1
test Caller
\tsequence
\t\tcall Counting
\t\tassert
\t\t\tcount == 3
test Loops
\tsequence
\t\tcall Loops
";

    fn universe() -> UniverseObjects {
        let mut universe = UniverseObjects::new();
        universe.load_text(CONTENT, "tests").unwrap();
        universe.finish_loading();
        universe
    }

    #[test]
    fn loops_and_days_pass() {
        let mut universe = universe();
        let report = run_test("Counting", &mut universe, 1).unwrap();
        assert!(matches!(report, TestReport::Passed { .. }));
    }

    #[test]
    fn failed_assertions_name_the_step() {
        let mut universe = universe();
        let error = run_test("Failing", &mut universe, 1).unwrap_err();
        assert!(matches!(error, TestError::AssertionFailed { step: 1, .. }));
    }

    #[test]
    fn tests_not_expected_to_pass_are_skipped() {
        let mut universe = universe();
        let report = run_test("Later", &mut universe, 1).unwrap();
        assert_eq!(report, TestReport::NotRun(TestStatus::MissingFeature));
    }

    #[test]
    fn called_tests_share_the_pilot() {
        let mut universe = universe();
        let mut runner = TestRunner::new(&mut universe, 1);
        assert!(runner.run("Caller").is_ok());
        assert_eq!(runner.player().name(), "Ada Reyes");
    }

    #[test]
    fn runaway_recursion_is_stopped() {
        let mut universe = universe();
        let error = run_test("Loops", &mut universe, 1).unwrap_err();
        assert_eq!(error, TestError::CallDepth(MAX_CALL_DEPTH));
    }

    #[test]
    fn unknown_tests_are_reported() {
        let mut universe = universe();
        let error = run_test("Nope", &mut universe, 1).unwrap_err();
        assert_eq!(error, TestError::UnknownTest("Nope".to_owned()));
    }
}
