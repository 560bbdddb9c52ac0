//! Mission instances driven through their triggers against a stub player.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

mod common;

use std::collections::BTreeSet;

use common::StubPlayer;
use rand::SeedableRng;
use rand::rngs::StdRng;
use starloom_types::{MissionTrigger, ShipEvents};
use starloom_universe::{Mission, PlayerContext, UniverseObjects};

const CONTENT: &str = "\
system Sol
\tlink Alpha
\tobject Earth
system Alpha
\tlink Sol
\tobject Mars
planet Earth
\tspaceport `Busy docks.`
planet Mars
\tspaceport `Red dust everywhere.`
mission Delivery
\tdescription `Haul freight to <planet>.`
\tsource Earth
\tdestination Mars
\tdeadline 2
\ton complete
\t\tpayment 10000
\t\tdelivered += 1
\ton fail
\t\t\"haul failed\" += 1
\ton accept
\t\t\"signed on\" += 1
ship Sparrow
\tattributes
\t\tcategory Interceptor
mission Escort
\tsource Earth
\tdestination Mars
\tnpc save
\t\tto despawn
\t\t\thas gone
\t\tship Sparrow Wren
mission Tour
\tsource Earth
\tdestination Mars
\tstopover
\t\tplanet Earth Mars
\tstopover
\t\tplanet Earth Mars
mission \"Grand Tour\"
\tsource Earth
\tdestination Mars
\tstopover
\t\tplanet Earth Mars
\tstopover
\t\tplanet Earth Mars
\tstopover
\t\tplanet Earth Mars
";

fn setup() -> (UniverseObjects, StubPlayer, Mission) {
    setup_mission("Delivery")
}

fn setup_mission(name: &str) -> (UniverseObjects, StubPlayer, Mission) {
    let universe = common::universe(CONTENT);
    let mut player = StubPlayer::new();
    player.system = universe.systems.find("Sol");
    player.planet = universe.planets.find("Earth");
    let template = universe.missions.find_value(name).unwrap();
    assert!(template.can_offer(&player, None, &universe));
    let mut rng = StdRng::seed_from_u64(7);
    let instance = template.instantiate(&player, None, &universe, &mut rng).unwrap();
    (universe, player, instance)
}

#[test]
fn instantiation_fills_in_text_and_deadline() {
    let (_, player, instance) = setup();
    assert!(instance.description().contains("Mars"), "{}", instance.description());
    assert_eq!(*instance.deadline(), player.date().plus_days(2));
}

#[test]
fn completion_pays_once_and_then_nothing_fires() {
    let (universe, mut player, mut instance) = setup();
    assert!(instance.do_trigger(MissionTrigger::Accept, &mut player, &universe).is_some());
    assert_eq!(player.conditions.get("Delivery: active"), 1);

    player.system = universe.systems.find("Alpha");
    player.planet = universe.planets.find("Mars");
    assert!(instance.can_complete(&player, &universe));
    assert!(instance.do_trigger(MissionTrigger::Complete, &mut player, &universe).is_some());
    assert_eq!(player.credits, 10000);
    assert_eq!(player.conditions.get("delivered"), 1);
    assert_eq!(player.conditions.get("Delivery: done"), 1);
    assert_eq!(player.conditions.get("Delivery: active"), 0);
    assert_eq!(instance.finished(), Some(MissionTrigger::Complete));

    for trigger in [MissionTrigger::Complete, MissionTrigger::Fail, MissionTrigger::Abort, MissionTrigger::Daily] {
        assert!(instance.do_trigger(trigger, &mut player, &universe).is_none());
    }
    assert_eq!(player.credits, 10000);
    assert_eq!(player.conditions.get("delivered"), 1);
    assert_eq!(player.conditions.get("Delivery: failed"), 0);
}

#[test]
fn missed_deadline_fails_once_without_payment() {
    let (universe, mut player, mut instance) = setup();
    instance.do_trigger(MissionTrigger::Accept, &mut player, &universe);

    let today = player.date().plus_days(3);
    assert!(instance.check_deadline(&today));
    assert!(!instance.check_deadline(&today));
    assert!(instance.has_failed(&player));
    assert!(instance.do_trigger(MissionTrigger::Fail, &mut player, &universe).is_some());
    assert!(instance.do_trigger(MissionTrigger::Fail, &mut player, &universe).is_none());

    assert_eq!(player.conditions.get("haul failed"), 1);
    assert_eq!(player.conditions.get("Delivery: failed"), 1);
    assert_eq!(player.credits, 0);
}

#[test]
fn cannot_complete_elsewhere() {
    let (universe, mut player, mut instance) = setup();
    instance.do_trigger(MissionTrigger::Accept, &mut player, &universe);
    assert!(!instance.can_complete(&player, &universe));
}

#[test]
fn accepting_twice_does_nothing_the_second_time() {
    let (universe, mut player, mut instance) = setup();
    assert!(instance.do_trigger(MissionTrigger::Accept, &mut player, &universe).is_some());
    assert!(instance.is_accepted());
    assert!(instance.do_trigger(MissionTrigger::Accept, &mut player, &universe).is_none());
    assert_eq!(player.conditions.get("signed on"), 1);
    assert_eq!(player.conditions.get("Delivery: active"), 1);
    assert_eq!(player.conditions.get("Delivery: offered"), 1);
}

#[test]
fn despawn_latches_when_a_ship_event_arrives() {
    let (universe, mut player, mut instance) = setup_mission("Escort");
    instance.do_trigger(MissionTrigger::Accept, &mut player, &universe);
    assert!(instance.npcs()[0].is_active());

    player.conditions.set("gone", 1);
    instance.handle_ship_event(0, 0, ShipEvents::DESTROY, true, &mut player, &universe);
    assert!(instance.npcs()[0].passed_despawn());
    assert!(!instance.has_failed(&player));
    assert!(player.presented.is_empty());

    player.conditions.set("gone", 0);
    instance.handle_ship_event(0, 0, ShipEvents::DESTROY, true, &mut player, &universe);
    assert!(instance.npcs()[0].passed_despawn());
    assert!(!instance.has_failed(&player));
}

#[test]
fn a_spawned_npc_still_fails_its_mission() {
    let (universe, mut player, mut instance) = setup_mission("Escort");
    instance.do_trigger(MissionTrigger::Accept, &mut player, &universe);
    instance.handle_ship_event(0, 0, ShipEvents::DESTROY, true, &mut player, &universe);
    assert!(instance.has_failed(&player));
    assert!(
        player
            .presented
            .iter()
            .any(|p| matches!(p, starloom_universe::Presentation::Message(text) if text == "Mission failed."))
    );
}

#[test]
fn stopover_filters_pick_distinct_planets() {
    let (universe, _, instance) = setup_mission("Tour");
    let both = BTreeSet::from([universe.planets.find("Earth").unwrap(), universe.planets.find("Mars").unwrap()]);
    assert_eq!(instance.stopovers(), &both);
}

#[test]
fn too_few_stopovers_means_no_instance() {
    let universe = common::universe(CONTENT);
    let mut player = StubPlayer::new();
    player.system = universe.systems.find("Sol");
    player.planet = universe.planets.find("Earth");
    let template = universe.missions.find_value("Grand Tour").unwrap();
    let mut rng = StdRng::seed_from_u64(7);
    assert!(template.instantiate(&player, None, &universe, &mut rng).is_none());
}
