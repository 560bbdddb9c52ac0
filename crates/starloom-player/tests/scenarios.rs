//! A pilot flying missions from offer to completion or failure.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

mod common;

use starloom_types::{Date, MissionLocation, ShipEvents};
use starloom_universe::PlayerContext;

const DELIVERY: &str = "\
mission Delivery
\tsource Earth
\tdestination Mars
\tcargo grain 5
\ton complete
\t\tpayment 10000
\t\tdelivered += 1
";

const DEADLINE: &str = "\
mission Delivery
\tsource Earth
\tdestination Mars
\tcargo grain 5
\tdeadline 2
\ton complete
\t\tpayment 10000
\ton fail
\t\t\"reputation: Republic\" -= 5
\t\t\"haul failed\" += 1
";

const DOUBLE_PENALTY: &str = "\
mission Delivery
\tsource Earth
\tdestination Mars
\tdeadline 1
\ton fail
\t\t\"reputation: Republic\" -= 5
\t\t\"reputation: Republic\" -= 5
";

const ESCORT: &str = "\
mission Escort
\tsource Earth
\tdestination Mars
\tnpc save
\t\tto despawn
\t\t\thas gone
\t\tship Hauler Wren
";

#[test]
fn delivery_is_paid_once_on_arrival() {
    let mut universe = common::universe(DELIVERY);
    let mut player = common::pilot(&universe, 11);
    let alpha = universe.systems.find("Alpha").unwrap();
    let mars = universe.planets.find("Mars").unwrap();

    let id = player.offer_mission(MissionLocation::Spaceport, &universe).unwrap();
    assert!(player.mission(id).is_some());
    assert_eq!(player.cargo_free(), 15);
    let credits = player.credits();

    player.set_travel_plan(vec![alpha], Some(mars));
    assert!(player.fly_travel_plan(&mut universe));
    assert_eq!(player.current_planet(), Some(mars));
    assert_eq!(player.credits(), credits.saturating_add(10_000));
    assert_eq!(player.cargo_free(), 20);
    assert!(player.missions().is_empty());
    assert_eq!(player.done_missions().len(), 1);
    assert_eq!(player.conditions().get("delivered"), 1);
    assert_eq!(player.conditions().get("Delivery: done"), 1);

    // Landing again pays nothing more.
    player.take_off(&universe);
    assert!(player.land_on(mars, &universe));
    assert_eq!(player.credits(), credits.saturating_add(10_000));
    assert_eq!(player.conditions().get("delivered"), 1);
}

#[test]
fn missed_deadline_fails_once_without_payment() {
    let mut universe = common::universe(DEADLINE);
    let mut player = common::pilot(&universe, 11);
    let republic = universe.governments.find("Republic").unwrap();

    let id = player.offer_mission(MissionLocation::Spaceport, &universe).unwrap();
    assert_eq!(player.mission(id).unwrap().deadline(), &Date::new(18, 11, 3013));
    let credits = player.credits();

    player.advance_day(&mut universe);
    player.advance_day(&mut universe);
    assert_eq!(player.missions().len(), 1);
    player.advance_day(&mut universe);
    assert!(player.missions().is_empty());
    assert_eq!(player.conditions().get("Delivery: failed"), 1);
    assert_eq!(player.conditions().get("haul failed"), 1);
    assert_eq!(player.conditions().get("reputation: Republic"), 5);
    assert!((player.politics().reputation(republic) - 5.).abs() < f64::EPSILON);
    assert_eq!(player.credits(), credits);
    assert_eq!(player.cargo_free(), 20);

    player.advance_day(&mut universe);
    player.advance_day(&mut universe);
    assert_eq!(player.conditions().get("haul failed"), 1);
    assert_eq!(player.conditions().get("reputation: Republic"), 5);
}

#[test]
fn the_deadline_warning_is_shown() {
    let mut universe = common::universe(DEADLINE);
    let mut player = common::pilot(&universe, 11);
    player.offer_mission(MissionLocation::Spaceport, &universe).unwrap();
    player.take_presentations();
    for _ in 0..3 {
        player.advance_day(&mut universe);
    }
    let shown = player.take_presentations();
    assert!(shown.iter().any(|p| matches!(
        p,
        starloom_universe::Presentation::Message(text) if text.contains("deadline")
    )));
}

#[test]
fn reputation_writes_in_one_action_accumulate() {
    let mut universe = common::universe(DOUBLE_PENALTY);
    let mut player = common::pilot(&universe, 11);
    let republic = universe.governments.find("Republic").unwrap();
    player.offer_mission(MissionLocation::Spaceport, &universe).unwrap();

    for _ in 0..2 {
        player.advance_day(&mut universe);
    }
    assert_eq!(player.conditions().get("Delivery: failed"), 1);
    assert!(player.politics().reputation(republic).abs() < f64::EPSILON);
    assert_eq!(player.conditions().get("reputation: Republic"), 0);
    assert_eq!(player.conditions().primary("reputation: Republic"), None);
}

#[test]
fn a_despawned_escort_no_longer_decides_the_mission() {
    let universe = common::universe(ESCORT);
    let mut player = common::pilot(&universe, 11);
    let id = player.offer_mission(MissionLocation::Spaceport, &universe).unwrap();

    player.conditions_mut().set("gone", 1);
    player.handle_ship_event(id, 0, 0, ShipEvents::DESTROY, true, &universe);
    assert!(!player.mission(id).unwrap().has_failed(&player));
    assert!(player.missions().iter().any(|m| m.id() == id));
}

#[test]
fn losing_a_live_escort_fails_the_mission() {
    let universe = common::universe(ESCORT);
    let mut player = common::pilot(&universe, 11);
    let id = player.offer_mission(MissionLocation::Spaceport, &universe).unwrap();

    player.handle_ship_event(id, 0, 0, ShipEvents::DESTROY, true, &universe);
    assert!(player.mission(id).unwrap().has_failed(&player));
}
