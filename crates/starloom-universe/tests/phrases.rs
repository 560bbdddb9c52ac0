//! Phrase expansion over a loaded universe.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

mod common;

use rand::SeedableRng;
use rand::rngs::StdRng;

#[test]
fn nested_references_expand() {
    let universe = common::universe(
        "phrase title\n\tword\n\t\tCaptain\nphrase greeting\n\tword\n\t\t\"Hello, ${title} \"\n\tphrase\n\t\tname\n\
         phrase name\n\tword\n\t\tReyes\n",
    );
    let mut rng = StdRng::seed_from_u64(1);
    let greeting = universe.phrases.find_value("greeting").unwrap();
    assert_eq!(greeting.get(&universe.phrases, &mut rng), "Hello, Captain Reyes");
}

/// A cycle is broken when loading finishes; every expansion still
/// terminates and the rest of the phrases are untouched.
#[test]
fn cycles_are_discarded_and_expansion_terminates() {
    let universe = common::universe(
        "phrase ping\n\tword\n\t\t\"ping ${pong}\"\nphrase pong\n\tword\n\t\t\"pong ${ping}\"\n\
         phrase safe\n\tword\n\t\tfine\n",
    );
    let mut rng = StdRng::seed_from_u64(2);
    for name in ["ping", "pong"] {
        let phrase = universe.phrases.find_value(name).unwrap();
        assert!(phrase.is_empty());
        assert_eq!(phrase.get(&universe.phrases, &mut rng), "");
    }
    let safe = universe.phrases.find_value("safe").unwrap();
    assert_eq!(safe.get(&universe.phrases, &mut rng), "fine");
}

#[test]
fn self_reference_is_a_cycle() {
    let universe = common::universe("phrase echo\n\tword\n\t\t\"again ${echo}\"\n");
    assert!(universe.phrases.find_value("echo").unwrap().is_empty());
}

#[test]
fn same_seed_same_text() {
    let universe = common::universe("phrase pick\n\tword\n\t\ta\n\t\tb\n\t\tc\n\tword\n\t\t1\n\t\t2\n\t\t3\n");
    let phrase = universe.phrases.find_value("pick").unwrap();
    let run = |seed| {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..8).map(|_| phrase.get(&universe.phrases, &mut rng)).collect::<Vec<_>>()
    };
    assert_eq!(run(9), run(9));
}
