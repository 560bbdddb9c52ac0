//! A small two-system universe and a pilot starting in it.

#![allow(dead_code, clippy::unwrap_used, clippy::indexing_slicing)]

use starloom_player::PlayerInfo;
use starloom_universe::UniverseObjects;

/// Sol and Alpha, one jump apart, each with an inhabited planet.
pub const GALAXY: &str = "\
government Republic
\t\"player reputation\" 10
government Pirate
\t\"player reputation\" -10
system Sol
\tgovernment Republic
\tlink Alpha
\tobject Earth
\ttrade grain 300
system Alpha
\tgovernment Republic
\tlink Sol
\tobject Mars
planet Earth
\tspaceport `Busy docks.`
planet Mars
\tspaceport `Red dust everywhere.`
ship Hauler
\tattributes
\t\tcategory Freighter
\t\tcost 100000
\t\t\"cargo space\" 20
\t\tbunks 2
\t\t\"required crew\" 1
start
\tdate 16 11 3013
\tsystem Sol
\tplanet Earth
\taccount
\t\tcredits 1000
\tship Hauler Dray
";

/// The galaxy plus `extra` content, fully loaded.
pub fn universe(extra: &str) -> UniverseObjects {
    let mut universe = UniverseObjects::new();
    universe.load_text(GALAXY, "galaxy.txt").unwrap();
    universe.load_text(extra, "extra.txt").unwrap();
    universe.finish_loading();
    universe
}

/// A new pilot at Earth, landed, with the planet's missions created.
pub fn pilot(universe: &UniverseObjects, seed: u64) -> PlayerInfo {
    let start = universe.starts.find_value("").unwrap().clone();
    let mut player = PlayerInfo::from_start(&start, universe, "Ada", "Reyes", seed);
    let earth = universe.planets.find("Earth").unwrap();
    assert!(player.land_on(earth, universe));
    player
}
