//! Condition gating end to end: predicates and assignment programs loaded
//! from data text and run against one store.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use starloom_conditions::{Condition, ConditionAssignments, ConditionSet, ConditionsStore};
use starloom_data::DataFile;

fn first_node(text: &str) -> starloom_data::DataNode {
    DataFile::parse(text, "test").unwrap().nodes()[0].clone()
}

#[test]
fn cash_and_reputation_gate() {
    let mut store = ConditionsStore::from_values([("cash", 1000), ("rep", -10)]);

    let affordable = ConditionSet::from_node(&first_node("to offer\n\tcash >= 500 and rep > -20\n"));
    let rich = ConditionSet::from_node(&first_node("to offer\n\tcash >= 5000\n"));
    assert!(affordable.test(&store));
    assert!(!rich.test(&store));

    let spend = ConditionAssignments::from_node(&first_node("apply\n\tcash -= 500\n\tcash += 100\n"));
    spend.apply(&mut store);
    assert_eq!(store.get("cash"), 600);
}

/// `and`, `or` and `not` agree with boolean logic over every combination of
/// two flags.
#[test]
fn combinators_follow_boolean_logic() {
    let a = first_node("has a\n");
    let b = first_node("has b\n");
    let a = Condition::parse(&a).unwrap();
    let b = Condition::parse(&b).unwrap();

    for (va, vb) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
        let store = ConditionsStore::from_values([("a", va), ("b", vb)]);
        let ta = a.test(&store);
        let tb = b.test(&store);
        let both = Condition::All(vec![a.clone(), b.clone()]);
        let either = Condition::Any(vec![a.clone(), b.clone()]);
        let neither = Condition::Not(Box::new(a.clone()));
        assert_eq!(both.test(&store), ta && tb);
        assert_eq!(either.test(&store), ta || tb);
        assert_eq!(neither.test(&store), !ta);
    }

    assert!(ConditionSet::new().test(&ConditionsStore::new()));
}

#[test]
fn derived_values_gate_like_primaries() {
    let mut store = ConditionsStore::new();
    store.set_provider("credits", std::sync::Arc::new(|_: &str| 25_000_i64));
    let gate = ConditionSet::from_node(&first_node("to accept\n\tcredits >= 20000\n"));
    assert!(gate.test(&store));
}
