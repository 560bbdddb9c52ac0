//! Same seed, same content, same inputs: same game. Finished missions stay
//! finished.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

mod common;

use starloom_player::PlayerInfo;
use starloom_types::MissionTrigger;
use starloom_universe::{PlayerContext, UniverseObjects};

const CONTENT: &str = "\
event Coup
\tsystem Alpha
\t\tgovernment Pirate
\t\"coups\" += 1
event Census
\tcensus = year
mission Lottery
\tjob
\trepeat 0
\tsource Earth
\tdestination Mars
\tto offer
\t\trandom < 50
mission Courier
\tsource Earth
\tdestination Mars
\ton complete
\t\tpayment 500
";

fn play(seed: u64) -> (UniverseObjects, PlayerInfo) {
    let mut universe = common::universe(CONTENT);
    let mut player = common::pilot(&universe, seed);
    let coup = universe.events.find_value("Coup").unwrap().clone();
    let census = universe.events.find_value("Census").unwrap().clone();
    let today = player.today().clone();
    player.queue_event(census, today.plus_days(2));
    player.queue_event(coup, today.plus_days(1));

    let earth = universe.planets.find("Earth").unwrap();
    for _ in 0..5 {
        player.advance_day(&mut universe);
        player.take_off(&universe);
        player.land_on(earth, &universe);
    }
    (universe, player)
}

fn primaries(player: &PlayerInfo) -> Vec<(String, i64)> {
    player
        .conditions()
        .primaries()
        .map(|(name, value)| (name.to_owned(), value))
        .collect()
}

#[test]
fn a_seed_replays_the_same_game() {
    let (first_universe, first) = play(42);
    let (second_universe, second) = play(42);
    assert_eq!(primaries(&first), primaries(&second));
    assert_eq!(first.today(), second.today());
    assert_eq!(first.available_jobs().len(), second.available_jobs().len());

    let alpha = first_universe.systems.find("Alpha").unwrap();
    let pirate = first_universe.governments.find("Pirate");
    assert_eq!(first_universe.systems.value(alpha).unwrap().government, pirate);
    assert_eq!(
        second_universe.systems.value(alpha).unwrap().government,
        first_universe.systems.value(alpha).unwrap().government
    );
    assert_eq!(first.conditions().get("coups"), 1);
    assert_eq!(first.conditions().get("census"), 3013);
}

#[test]
fn finished_missions_ignore_further_triggers() {
    let mut universe = common::universe(CONTENT);
    let mut player = common::pilot(&universe, 3);
    let alpha = universe.systems.find("Alpha").unwrap();
    let mars = universe.planets.find("Mars").unwrap();
    player
        .offer_mission(starloom_types::MissionLocation::Spaceport, &universe)
        .unwrap();
    player.set_travel_plan(vec![alpha], Some(mars));
    assert!(player.fly_travel_plan(&mut universe));
    assert_eq!(player.conditions().get("Courier: done"), 1);

    let mut done = player.done_missions()[0].clone();
    let credits = player.credits();
    let before = primaries(&player);
    for trigger in [
        MissionTrigger::Complete,
        MissionTrigger::Fail,
        MissionTrigger::Abort,
        MissionTrigger::Daily,
        MissionTrigger::Visit,
    ] {
        assert!(done.do_trigger(trigger, &mut player, &universe).is_none());
    }
    assert_eq!(player.credits(), credits);
    assert_eq!(primaries(&player), before);
}
