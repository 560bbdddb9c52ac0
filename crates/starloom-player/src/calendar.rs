//! The daily tick and the pending-event queue.
//!
//! # Invariants
//!
//! - Events due on or before today fire in (date, queue order). Their
//!   universe changes are applied as one batch after every event of the
//!   day has written its conditions.
//! - A mission that misses its deadline is reported once and fails during
//!   the same tick; it gets no `on daily` action that day.

use std::cmp::{Ordering, Reverse};

use starloom_types::{Date, MissionTrigger};
use starloom_universe::game_event::GameEvent;
use starloom_universe::text_replacements::format_credits;
use starloom_universe::{PlayerContext, Presentation, UniverseObjects};

use crate::player::PlayerInfo;

/// An event waiting for its date.
#[derive(Debug, Clone)]
pub struct PendingEvent {
    /// When the event fires.
    pub date: Date,
    /// Queue order, breaking ties between events of the same day.
    pub sequence: u64,
    /// The event itself.
    pub event: GameEvent,
}

impl PartialEq for PendingEvent {
    fn eq(&self, other: &Self) -> bool {
        self.date == other.date && self.sequence == other.sequence
    }
}

impl Eq for PendingEvent {}

impl PartialOrd for PendingEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.date
            .cmp(&other.date)
            .then_with(|| self.sequence.cmp(&other.sequence))
    }
}

impl PlayerInfo {
    /// Let one day pass.
    pub fn advance_day(&mut self, universe: &mut UniverseObjects) {
        self.date.increment();
        tracing::debug!(date = %self.date, "day begins");

        self.fire_due_events(universe);
        let universe: &UniverseObjects = universe;

        // Deadlines, then the daily actions of everything still running.
        let today = self.date.clone();
        let mut missions = std::mem::take(&mut self.missions);
        let mut outcomes = Vec::new();
        for mission in &mut missions {
            if mission.check_deadline(&today) && mission.is_visible() {
                self.present(Presentation::Message(format!(
                    "You failed to meet the deadline for the mission \"{}\".",
                    mission.display_name()
                )));
            }
            if !mission.has_failed(self) {
                if let Some(fired) = mission.do_trigger(MissionTrigger::Daily, self, universe) {
                    outcomes.push((mission.id(), fired.outcome));
                }
            }
        }
        self.missions = missions;
        for (id, outcome) in outcomes {
            self.apply_outcome(Some(id), outcome);
        }
        self.settle(universe);
        self.remove_failed_missions(universe);

        self.collect_income();
        self.do_accounting(universe);
        self.politics.reset_daily();
        self.update_auto_conditions(universe);
    }

    /// Fire every pending event whose date has come.
    fn fire_due_events(&mut self, universe: &mut UniverseObjects) {
        let mut batch = Vec::new();
        while self.events.peek().is_some_and(|Reverse(p)| p.date <= self.date) {
            let Some(Reverse(pending)) = self.events.pop() else {
                break;
            };
            tracing::info!(event = %pending.event.name, date = %self.date, "event fired");
            batch.extend(pending.event.apply(self));
        }
        if !batch.is_empty() {
            universe.apply_changes(&batch);
            self.changes.extend(batch);
        }
    }

    /// Pay out `salary: *` and `tribute: *` conditions.
    fn collect_income(&mut self) {
        let (salary, tribute) = self.conditions.primaries().fold((0_i64, 0_i64), |(salary, tribute), (name, value)| {
            if name.starts_with("salary: ") {
                (salary.saturating_add(value), tribute)
            } else if name.starts_with("tribute: ") {
                (salary, tribute.saturating_add(value))
            } else {
                (salary, tribute)
            }
        });
        if salary == 0 && tribute == 0 {
            return;
        }
        let mut message = "You receive ".to_owned();
        if salary != 0 {
            message.push_str(&format!("{} salary", format_credits(salary)));
        }
        if salary != 0 && tribute != 0 {
            message.push_str(" and ");
        }
        if tribute != 0 {
            message.push_str(&format!("{} in tribute", format_credits(tribute)));
        }
        message.push('.');
        self.present(Presentation::Message(message));
        self.add_credits(salary.saturating_add(tribute));
    }

    /// Pay crew and debts for the day.
    fn do_accounting(&mut self, universe: &UniverseObjects) {
        let prices = self
            .system
            .and_then(|s| universe.systems.value(s))
            .map(|s| s.trade.clone())
            .unwrap_or_default();
        let assets = self
            .ships
            .iter()
            .fold(self.cargo.value(&prices, universe), |sum, s| sum.saturating_add(s.depreciated_value(universe)));
        let message = self.account.step(assets, self.crew_salaries());
        if !message.is_empty() {
            self.present(Presentation::Message(message));
        }
        self.refresh_account_conditions();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::account::Account;

    const CONTENT: &str = "\
government Republic
government Pirate
system Sol
\tgovernment Republic
event Coup
\tsystem Sol
\t\tgovernment Pirate
\t\"coup happened\" = 1
event First
\torder += 1
\tfirst = order
event Second
\torder += 1
\tsecond = order
";

    fn setup() -> (UniverseObjects, PlayerInfo) {
        let mut universe = UniverseObjects::new();
        universe.load_text(CONTENT, "calendar").unwrap();
        universe.finish_loading();
        let mut player = PlayerInfo::new(1);
        player.date = Date::new(1, 1, 3014);
        (universe, player)
    }

    fn queue(player: &mut PlayerInfo, universe: &UniverseObjects, name: &str, days: i32) {
        let event = universe.events.find_value(name).unwrap().clone();
        let date = player.date.plus_days(days);
        player.queue_event(event, date);
    }

    #[test]
    fn events_fire_on_their_day_and_change_the_universe() {
        let (mut universe, mut player) = setup();
        queue(&mut player, &universe, "Coup", 3);
        let sol = universe.systems.find("Sol").unwrap();
        let pirate = universe.governments.find("Pirate");

        player.advance_day(&mut universe);
        player.advance_day(&mut universe);
        assert_eq!(player.conditions.get("coup happened"), 0);
        player.advance_day(&mut universe);
        assert_eq!(player.conditions.get("coup happened"), 1);
        assert_eq!(universe.systems.value(sol).unwrap().government, pirate);
        assert_eq!(player.changes().len(), 1);
        assert!(player.pending_events().is_empty());

        player.advance_day(&mut universe);
        assert_eq!(player.changes().len(), 1);
    }

    #[test]
    fn same_day_events_fire_in_queue_order() {
        let (mut universe, mut player) = setup();
        queue(&mut player, &universe, "Second", 1);
        queue(&mut player, &universe, "First", 1);
        player.advance_day(&mut universe);
        assert_eq!(player.conditions.get("second"), 1);
        assert_eq!(player.conditions.get("first"), 2);
    }

    #[test]
    fn salary_and_tribute_are_paid_daily() {
        let (mut universe, mut player) = setup();
        player.conditions.set("salary: Navy", 1500);
        player.conditions.set("tribute: Sol", 250);
        player.advance_day(&mut universe);
        assert_eq!(player.credits(), 1750);
        let messages = player.take_presentations();
        assert!(messages.contains(&Presentation::Message(
            "You receive 1,500 credits salary and 250 credits in tribute.".to_owned()
        )));
    }

    #[test]
    fn debts_are_paid_from_credits() {
        let (mut universe, mut player) = setup();
        player.account = Account::new();
        player.add_fine(600);
        player.add_credits(1000);
        player.advance_day(&mut universe);
        assert_eq!(player.credits(), 990);
        assert_eq!(player.conditions.get("unpaid fines"), 590);
    }
}
