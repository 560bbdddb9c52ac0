//! `start` scenarios: where and when a new pilot begins.

use starloom_conditions::{AssignOp, Assignment, ConditionAssignments};
use starloom_core::Handle;
use starloom_data::DataNode;
use starloom_types::Date;

use super::{Planet, ShipModel, System};
use crate::conversation::ConversationRef;
use crate::universe::UniverseObjects;

/// A starting scenario.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StartConditions {
    /// Name shown in the scenario list.
    pub display_name: String,
    /// Scenario description.
    pub description: String,
    /// Starting date.
    pub date: Date,
    /// Starting system.
    pub system: Option<Handle<System>>,
    /// Starting planet.
    pub planet: Option<Handle<Planet>>,
    /// Starting credits.
    pub credits: i64,
    /// Principal of the starting mortgage.
    pub mortgage: i64,
    /// Conditions set when the pilot is created.
    pub conditions: ConditionAssignments,
    /// Ships the pilot owns, with their names.
    pub ships: Vec<(Handle<ShipModel>, String)>,
    /// Introductory conversation.
    pub conversation: Option<ConversationRef>,
}

impl StartConditions {
    /// Apply one `start [<name>]` definition.
    pub fn load(&mut self, node: &DataNode, universe: &mut UniverseObjects) {
        for child in node.children() {
            let has = |n: usize| child.size() >= n;
            match child.key() {
                "name" | "display name" if has(2) => child.token(1).clone_into(&mut self.display_name),
                "description" if has(2) => {
                    if !self.description.is_empty() {
                        self.description.push('\n');
                    }
                    self.description.push_str(child.token(1));
                }
                "date" if has(4) => {
                    self.date = Date::new(
                        to_i32(child.value(1)),
                        to_i32(child.value(2)),
                        to_i32(child.value(3)),
                    );
                }
                "system" if has(2) => self.system = Some(universe.systems.get(child.token(1))),
                "planet" if has(2) => self.planet = Some(universe.planets.get(child.token(1))),
                "account" => {
                    for grand in child.children() {
                        match grand.key() {
                            "credits" if grand.size() >= 2 => {
                                self.credits = starloom_conditions::expression::to_i64(grand.value(1));
                            }
                            "mortgage" => {
                                let principal = grand
                                    .children()
                                    .iter()
                                    .find(|g| g.key() == "principal" && g.size() >= 2)
                                    .map_or(0, |g| starloom_conditions::expression::to_i64(g.value(1)));
                                self.mortgage = principal;
                            }
                            _ => {
                                grand.print_trace("Skipping unrecognized attribute:");
                            }
                        }
                    }
                }
                "conditions" => {
                    for grand in child.children() {
                        // A bare name sets the condition.
                        if grand.size() == 1 {
                            self.conditions.push(Assignment {
                                name: grand.token(0).to_owned(),
                                op: AssignOp::Set,
                                value: None,
                            });
                        } else {
                            self.conditions.add_line(grand);
                        }
                    }
                }
                "ship" if has(2) => {
                    let model = universe.ships.get(child.token(1));
                    let name = if has(3) { child.token(2) } else { child.token(1) };
                    self.ships.push((model, name.to_owned()));
                }
                "conversation" => {
                    self.conversation = Some(ConversationRef::load(child, universe));
                }
                _ => {
                    child.print_trace("Skipping unrecognized attribute:");
                }
            }
        }
    }
}

fn to_i32(value: f64) -> i32 {
    i32::try_from(starloom_conditions::expression::to_i64(value)).unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use starloom_conditions::ConditionsStore;

    fn universe(text: &str) -> UniverseObjects {
        let mut universe = UniverseObjects::new();
        universe.load_text(text, "starts.txt").unwrap();
        universe
    }

    #[test]
    fn a_full_scenario_loads() {
        let universe = universe(
            "start Pilot\n\
             \tname \"New Pilot\"\n\
             \tdescription \"You own one ship.\"\n\
             \tdescription \"And a large debt.\"\n\
             \tdate 16 11 3013\n\
             \tsystem Sol\n\
             \tplanet Earth\n\
             \taccount\n\
             \t\tcredits 50000\n\
             \t\tmortgage Mortgage\n\
             \t\t\tprincipal 480000\n\
             \tconditions\n\
             \t\tveteran\n\
             \t\t\"license: Pilot\" = 2\n\
             \tship Hauler \"First Light\"\n\
             \tship Sparrow\n",
        );
        let start = universe.starts.find_value("Pilot").unwrap();
        assert_eq!(start.display_name, "New Pilot");
        assert_eq!(start.description, "You own one ship.\nAnd a large debt.");
        assert_eq!((start.date.day(), start.date.month(), start.date.year()), (16, 11, 3013));
        assert_eq!(start.system, universe.systems.find("Sol"));
        assert_eq!(start.planet, universe.planets.find("Earth"));
        assert_eq!((start.credits, start.mortgage), (50_000, 480_000));

        let mut store = ConditionsStore::new();
        start.conditions.apply(&mut store);
        assert_eq!(store.get("veteran"), 1);
        assert_eq!(store.get("license: Pilot"), 2);

        let hauler = universe.ships.find("Hauler").unwrap();
        let sparrow = universe.ships.find("Sparrow").unwrap();
        assert_eq!(
            start.ships,
            vec![(hauler, "First Light".to_owned()), (sparrow, "Sparrow".to_owned())]
        );
        assert!(start.conversation.is_none());
    }

    #[test]
    fn an_unnamed_start_is_kept_under_the_empty_name() {
        let universe = universe("start\n\taccount\n\t\tcredits 100\n");
        assert!(universe.starts.is_defined(universe.starts.find("").unwrap()));
        assert_eq!(universe.starts.find_value("").unwrap().credits, 100);
    }
}
