//! Saving a pilot mid-mission and picking the game up again.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

mod common;

use std::path::PathBuf;

use starloom_player::{PlayerInfo, SaveError};
use starloom_types::{Date, MissionLocation};
use starloom_universe::PlayerContext;

const CONTENT: &str = "\
event Coup
\tsystem Alpha
\t\tgovernment Pirate
mission Delivery
\tsource Earth
\tdestination Mars
\tcargo grain 5
\ton complete
\t\tpayment 10000
";

/// A save file path under the system temp dir, removed on drop.
struct SavePath(PathBuf);

impl SavePath {
    fn new(name: &str) -> Self {
        Self(std::env::temp_dir().join(format!("starloom-{name}-{}.txt", std::process::id())))
    }
}

impl Drop for SavePath {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

#[test]
fn a_mission_survives_a_save_and_completes_after_loading() {
    let mut universe = common::universe(CONTENT);
    let mut player = common::pilot(&universe, 9);
    player.offer_mission(MissionLocation::Spaceport, &universe).unwrap();
    let coup = universe.events.find_value("Coup").unwrap().clone();
    let date = player.today().plus_days(1);
    player.queue_event(coup, date);
    player.advance_day(&mut universe);

    let path = SavePath::new("mid-mission");
    player.save(&path.0, &universe).unwrap();

    // A fresh universe only learns about the coup from the save.
    let mut reloaded = common::universe(CONTENT);
    let mut loaded = PlayerInfo::load(&path.0, &mut reloaded, 9).unwrap();
    let alpha = reloaded.systems.find("Alpha").unwrap();
    let mars = reloaded.planets.find("Mars").unwrap();
    assert_eq!(
        reloaded.systems.value(alpha).unwrap().government,
        reloaded.governments.find("Pirate")
    );
    assert_eq!(loaded.today(), &Date::new(17, 11, 3013));
    assert_eq!(loaded.missions().len(), 1);
    assert_eq!(loaded.cargo_free(), 15);

    let credits = loaded.credits();
    loaded.set_travel_plan(vec![alpha], Some(mars));
    assert!(loaded.fly_travel_plan(&mut reloaded));
    assert_eq!(loaded.credits(), credits.saturating_add(10_000));
    assert!(loaded.missions().is_empty());
}

#[test]
fn a_missing_save_is_an_io_or_parse_error() {
    let mut universe = common::universe("");
    let error = PlayerInfo::load(&SavePath::new("absent").0, &mut universe, 0).unwrap_err();
    assert!(matches!(error, SaveError::Parse { .. } | SaveError::Io { .. }));
}
