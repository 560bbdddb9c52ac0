//! [`GameAction`]: the side effects shared by mission triggers and
//! conversation action nodes.
//!
//! Recognised lines:
//!
//! ```text
//! log "text"                      log <category> <heading> "text"
//! give ship <model> [name]        take ship <model> [name]
//! outfit <name> [count]           payment [base [multiplier]]
//! fine <amount>                   debt <amount> (children: term, interest)
//! event <name> [min [max]]        fail [<mission>]
//! mark <system>                   unmark <system>
//! music <name>                    mute
//! ```
//!
//! Anything else is a condition assignment, applied last.
//!
//! # Ordering
//!
//! [`GameAction::do_action`] removes before it adds: ships are taken, then
//! outfits are taken, then outfits are given, then ships are given. Money
//! moves next, then events are queued, then missions are failed, and the
//! condition writes come last so they see the results of everything else.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use starloom_conditions::ConditionAssignments;
use starloom_core::Handle;
use starloom_data::{DataNode, DataWriter};

use crate::context::{PlayerContext, Presentation};
use crate::entities::{Outfit, ShipModel, System};
use crate::game_event::GameEvent;
use crate::text_replacements::{Substitutions, format_credits, replace};
use crate::universe::UniverseObjects;

/// Paragraph separator inside dialog and log text.
pub const PARAGRAPH_BREAK: &str = "\n\t";

/// Append the tokens of `node` from `start` on, then every token of its
/// children, as paragraphs of `text`.
pub fn parse_text_node(node: &DataNode, start: usize, text: &mut String) {
    let own = node.tokens().iter().skip(start);
    let nested = node.children().iter().flat_map(|child| child.tokens().iter());
    for token in own.chain(nested) {
        if !text.is_empty() {
            text.push_str(PARAGRAPH_BREAK);
        }
        text.push_str(token);
    }
}

/// A ship given to or taken from the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipTransfer {
    /// The hull.
    pub model: Handle<ShipModel>,
    /// The ship's name. Empty for "any ship of this model" when taking.
    pub name: String,
    /// `true` for `give ship`, `false` for `take ship`.
    pub giving: bool,
}

/// A loan pushed onto the player's accounts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Debt {
    /// Principal.
    pub amount: i64,
    /// Daily interest, or `None` to use the player's credit score.
    pub interest: Option<f64>,
    /// Days over which the debt is repaid.
    pub term: i64,
}

/// What a performed action asks of the mission that owns it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionOutcome {
    /// The calling mission should fail.
    pub fail_caller: bool,
    /// Systems to mark on the calling mission.
    pub mark: BTreeSet<Handle<System>>,
    /// Systems to unmark on the calling mission.
    pub unmark: BTreeSet<Handle<System>>,
}

impl ActionOutcome {
    /// Fold a later outcome into this one.
    pub fn merge(&mut self, other: Self) {
        self.fail_caller |= other.fail_caller;
        self.mark.extend(other.mark);
        self.unmark.extend(other.unmark);
    }
}

/// A bundle of player-state changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameAction {
    is_empty: bool,
    log_text: String,
    special_logs: BTreeMap<(String, String), String>,
    ships: Vec<ShipTransfer>,
    outfits: BTreeMap<Handle<Outfit>, i64>,
    payment: i64,
    payment_multiplier: i64,
    fine: i64,
    debts: Vec<Debt>,
    events: BTreeMap<Handle<GameEvent>, (i32, i32)>,
    fail: BTreeSet<String>,
    fail_caller: bool,
    music: Option<String>,
    mark: BTreeSet<Handle<System>>,
    unmark: BTreeSet<Handle<System>>,
    conditions: ConditionAssignments,
}

impl GameAction {
    /// An empty action.
    pub fn new() -> Self {
        Self {
            is_empty: true,
            ..Self::default()
        }
    }

    /// Load every child of `node`.
    pub fn from_node(node: &DataNode, universe: &mut UniverseObjects) -> Self {
        let mut action = Self::new();
        for child in node.children() {
            action.load_single(child, universe);
        }
        action
    }

    /// Load one line.
    pub fn load_single(&mut self, child: &DataNode, universe: &mut UniverseObjects) {
        self.is_empty = false;
        let key = child.key();
        let has_value = child.size() >= 2;
        match key {
            "log" => {
                let special = child.size() >= 3;
                if special {
                    let text = self
                        .special_logs
                        .entry((child.token(1).to_owned(), child.token(2).to_owned()))
                        .or_default();
                    parse_text_node(child, 3, text);
                } else {
                    parse_text_node(child, 1, &mut self.log_text);
                }
            }
            "give" | "take" if child.size() >= 3 && child.token(1) == "ship" => {
                self.ships.push(ShipTransfer {
                    model: universe.ships.get(child.token(2)),
                    name: if child.size() >= 4 { child.token(3).to_owned() } else { String::new() },
                    giving: key == "give",
                });
            }
            "outfit" if has_value => {
                let count = if child.size() < 3 { 1 } else { to_i64(child.value(2)) };
                if count == 0 {
                    child.print_trace("Error: Skipping invalid outfit quantity:");
                } else {
                    self.outfits.insert(universe.outfits.get(child.token(1)), count);
                }
            }
            "payment" => {
                if child.size() == 1 {
                    self.payment_multiplier = self.payment_multiplier.saturating_add(150);
                }
                if child.size() >= 2 {
                    self.payment = self.payment.saturating_add(to_i64(child.value(1)));
                }
                if child.size() >= 3 {
                    self.payment_multiplier = self.payment_multiplier.saturating_add(to_i64(child.value(2)));
                }
            }
            "fine" if has_value => {
                let value = to_i64(child.value(1));
                if value > 0 {
                    self.fine = self.fine.saturating_add(value);
                } else {
                    child.print_trace("Error: Skipping invalid \"fine\" with non-positive value:");
                }
            }
            "debt" if has_value => {
                let mut debt = Debt {
                    amount: to_i64(child.value(1)).max(0),
                    interest: None,
                    term: 365,
                };
                for grand in child.children() {
                    match grand.key() {
                        "term" if grand.size() > 1 => debt.term = to_i64(grand.value(1)).max(1),
                        "interest" if grand.size() > 1 => debt.interest = Some(grand.value(1).clamp(0.0, 0.999)),
                        _ => {
                            grand.print_trace("Error: Skipping unrecognized \"debt\" attribute:");
                        }
                    }
                }
                self.debts.push(debt);
            }
            "event" if has_value => {
                let min = if child.size() >= 3 { to_i32(child.value(2)) } else { 1 };
                let max = if child.size() >= 4 { to_i32(child.value(3)) } else { min };
                self.events
                    .insert(universe.events.get(child.token(1)), (min.min(max), min.max(max)));
            }
            "music" if has_value => self.music = Some(child.token(1).to_owned()),
            "mute" => self.music = Some(String::new()),
            "mark" if has_value => {
                self.mark.insert(universe.systems.get(child.token(1)));
            }
            "unmark" if has_value => {
                self.unmark.insert(universe.systems.get(child.token(1)));
            }
            "fail" if has_value => {
                self.fail.insert(child.token(1).to_owned());
            }
            "fail" => self.fail_caller = true,
            _ => {
                self.conditions.add_line(child);
            }
        }
    }

    /// Whether nothing was ever loaded into this action.
    pub const fn is_empty(&self) -> bool {
        self.is_empty
    }

    /// Credits paid to the player (negative to charge).
    pub const fn payment(&self) -> i64 {
        self.payment
    }

    /// Fine charged to the player.
    pub const fn fine(&self) -> i64 {
        self.fine
    }

    /// Outfits given (positive) or taken (negative).
    pub const fn outfits(&self) -> &BTreeMap<Handle<Outfit>, i64> {
        &self.outfits
    }

    /// Ships given or taken.
    pub fn ships(&self) -> &[ShipTransfer] {
        &self.ships
    }

    /// Condition writes.
    pub const fn conditions(&self) -> &ConditionAssignments {
        &self.conditions
    }

    /// Whether the player can afford this action and has everything it
    /// takes away.
    pub fn can_be_done(&self, player: &dyn PlayerContext) -> bool {
        if player.credits().saturating_add(self.payment) < 0 {
            return false;
        }
        let outfits_ok = self
            .outfits
            .iter()
            .filter(|(_, count)| **count < 0)
            .all(|(outfit, count)| player.outfit_count(*outfit) >= count.saturating_neg());
        outfits_ok
            && self
                .ships
                .iter()
                .filter(|ship| !ship.giving)
                .all(|ship| player.has_ship(ship.model, &ship.name))
    }

    /// Perform the action.
    pub fn do_action(&self, player: &mut dyn PlayerContext, universe: &UniverseObjects) -> ActionOutcome {
        if !self.log_text.is_empty() {
            player.add_log_entry(None, &self.log_text);
        }
        for ((category, heading), text) in &self.special_logs {
            player.add_log_entry(Some((category.as_str(), heading.as_str())), text);
        }

        for ship in self.ships.iter().filter(|ship| !ship.giving) {
            if !player.take_ship(ship.model, &ship.name) {
                tracing::warn!(model = universe.ships.name_of(ship.model), "no matching ship to take");
            }
        }
        for (outfit, count) in self.outfits.iter().filter(|(_, count)| **count < 0) {
            player.gift_outfit(universe, *outfit, *count);
        }
        for (outfit, count) in self.outfits.iter().filter(|(_, count)| **count > 0) {
            player.gift_outfit(universe, *outfit, *count);
        }
        for ship in self.ships.iter().filter(|ship| ship.giving) {
            player.gift_ship(universe, ship.model, &ship.name);
        }

        if self.payment != 0 {
            let account = player.credits();
            if account.saturating_add(self.payment) >= 0 {
                player.add_credits(self.payment);
            } else if account > 0 {
                player.add_credits(account.saturating_neg());
            }
        }
        if self.fine != 0 {
            player.add_fine(self.fine);
        }
        for debt in &self.debts {
            player.add_debt(debt.amount, debt.interest, debt.term);
        }

        let today = player.date();
        for (handle, (day, _)) in &self.events {
            if let Some(event) = universe.events.value(*handle) {
                let mut event = event.clone();
                if event.name.is_empty() {
                    universe.events.name_of(*handle).clone_into(&mut event.name);
                }
                player.queue_event(event, today.plus_days(*day));
            }
        }

        for name in &self.fail {
            player.fail_mission(name);
        }
        if let Some(music) = &self.music {
            let track = if music.is_empty() { None } else { Some(music.clone()) };
            player.present(Presentation::Music(track));
        }

        self.conditions.apply(player.conditions_mut());

        ActionOutcome {
            fail_caller: self.fail_caller,
            mark: self.mark.clone(),
            unmark: self.unmark.clone(),
        }
    }

    /// Freeze this template: pick the event days, compute the payment and
    /// fill `<payment>` and `<fine>` in `subs`.
    pub fn instantiate<R: Rng + ?Sized>(&self, subs: &mut Substitutions, jumps: i64, payload: i64, rng: &mut R) -> Self {
        let mut result = self.clone();
        for (min, max) in result.events.values_mut() {
            let day = rng.random_range(*min..=*max);
            *min = day;
            *max = day;
        }
        result.payment = self.payment.saturating_add(
            jumps
                .saturating_add(1)
                .saturating_mul(payload)
                .saturating_mul(self.payment_multiplier),
        );
        result.payment_multiplier = 0;
        if result.payment != 0 {
            subs.insert("<payment>".to_owned(), format_credits(result.payment.saturating_abs()));
        }
        if result.fine != 0 {
            subs.insert("<fine>".to_owned(), format_credits(result.fine));
        }
        if !self.log_text.is_empty() {
            result.log_text = replace(&self.log_text, subs);
        }
        for text in result.special_logs.values_mut() {
            *text = replace(text, subs);
        }
        result
    }

    /// The first content this action uses that is not fully defined.
    pub fn validate(&self, universe: &UniverseObjects) -> Option<String> {
        if let Some(handle) = self.events.keys().find(|h| !universe.events.is_defined(**h)) {
            return Some(format!("event \"{}\"", universe.events.name_of(*handle)));
        }
        if let Some(ship) = self.ships.iter().find(|s| !universe.ships.is_defined(s.model)) {
            return Some(format!("gift ship model \"{}\"", universe.ships.name_of(ship.model)));
        }
        if let Some(outfit) = self.outfits.keys().find(|h| !universe.outfits.is_defined(**h)) {
            return Some(format!("gift outfit \"{}\"", universe.outfits.name_of(*outfit)));
        }
        self.mark
            .iter()
            .chain(&self.unmark)
            .find(|h| !universe.systems.is_defined(**h))
            .map(|system| format!("system \"{}\"", universe.systems.name_of(*system)))
    }

    /// Write the action's lines at the writer's current depth.
    pub fn save(&self, writer: &mut DataWriter, universe: &UniverseObjects) {
        fn write_text(writer: &mut DataWriter, text: &str) {
            writer.begin_child();
            for line in text.split(PARAGRAPH_BREAK) {
                writer.write([line]);
            }
            writer.end_child();
        }
        if !self.log_text.is_empty() {
            writer.write(["log"]);
            write_text(writer, &self.log_text);
        }
        for ((category, heading), text) in &self.special_logs {
            writer.write(["log", category.as_str(), heading.as_str()]);
            write_text(writer, text);
        }
        for ship in &self.ships {
            let verb = if ship.giving { "give" } else { "take" };
            let mut tokens = vec![verb, "ship", universe.ships.name_of(ship.model)];
            if !ship.name.is_empty() {
                tokens.push(&ship.name);
            }
            writer.write(tokens);
        }
        for (outfit, count) in &self.outfits {
            writer.write(["outfit".to_owned(), universe.outfits.name_of(*outfit).to_owned(), count.to_string()]);
        }
        if self.payment != 0 || self.payment_multiplier != 0 {
            let mut tokens = vec!["payment".to_owned(), self.payment.to_string()];
            if self.payment_multiplier != 0 {
                tokens.push(self.payment_multiplier.to_string());
            }
            writer.write(tokens);
        }
        if self.fine != 0 {
            writer.write(["fine".to_owned(), self.fine.to_string()]);
        }
        for debt in &self.debts {
            writer.write(["debt".to_owned(), debt.amount.to_string()]);
            writer.begin_child();
            if let Some(interest) = debt.interest {
                writer.write(["interest".to_owned(), starloom_data::format_number(interest)]);
            }
            writer.write(["term".to_owned(), debt.term.to_string()]);
            writer.end_child();
        }
        for (event, (min, max)) in &self.events {
            writer.write([
                "event".to_owned(),
                universe.events.name_of(*event).to_owned(),
                min.to_string(),
                max.to_string(),
            ]);
        }
        for system in &self.mark {
            writer.write(["mark", universe.systems.name_of(*system)]);
        }
        for system in &self.unmark {
            writer.write(["unmark", universe.systems.name_of(*system)]);
        }
        for name in &self.fail {
            writer.write(["fail", name.as_str()]);
        }
        if self.fail_caller {
            writer.write(["fail"]);
        }
        match self.music.as_deref() {
            Some("") => writer.write(["mute"]),
            Some(music) => writer.write(["music", music]),
            None => {}
        }
        self.conditions.save(writer);
    }
}

fn to_i64(value: f64) -> i64 {
    starloom_conditions::expression::to_i64(value)
}

fn to_i32(value: f64) -> i32 {
    i32::try_from(to_i64(value)).unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use starloom_data::DataFile;

    fn action(text: &str, universe: &mut UniverseObjects) -> GameAction {
        let file = DataFile::parse(text, "t").unwrap();
        GameAction::from_node(&file.nodes()[0], universe)
    }

    #[test]
    fn lines_sort_into_fields() {
        let mut universe = UniverseObjects::default();
        let action = action(
            "action\n\tlog \"Met a trader.\"\n\toutfit Laser 2\n\toutfit Junk 0\n\tpayment 100 10\n\
             \tfine 50\n\tfine -5\n\tevent later 5 2\n\tfail\n\t\"met trader\" = 1\n",
            &mut universe,
        );
        assert!(!action.is_empty());
        assert_eq!(action.outfits().len(), 1);
        assert_eq!(action.payment(), 100);
        assert_eq!(action.fine(), 50);
        assert_eq!(action.events.values().next(), Some(&(2, 5)));
        assert!(action.fail_caller);
        assert_eq!(action.conditions().assignments().len(), 1);
    }

    #[test]
    fn bare_payment_scales_with_distance_and_payload() {
        let mut universe = UniverseObjects::default();
        let template = action("action\n\tpayment\n\tlog \"Paid <payment>.\"\n", &mut universe);
        let mut subs = Substitutions::new();
        let mut rng = StdRng::seed_from_u64(3);
        let instance = template.instantiate(&mut subs, 2, 10, &mut rng);
        assert_eq!(instance.payment(), 4500);
        assert_eq!(subs["<payment>"], "4,500 credits");
        assert_eq!(instance.log_text, "Paid 4,500 credits.");
    }

    #[test]
    fn event_days_are_fixed_on_instantiation() {
        let mut universe = UniverseObjects::default();
        let template = action("action\n\tevent later 2 9\n", &mut universe);
        let mut rng = StdRng::seed_from_u64(7);
        let instance = template.instantiate(&mut Substitutions::new(), 0, 0, &mut rng);
        let (min, max) = instance.events.values().next().copied().unwrap();
        assert_eq!(min, max);
        assert!((2..=9).contains(&min));
    }

    #[test]
    fn text_paragraphs_join_with_tab_breaks() {
        let file = DataFile::parse("log first\n\tsecond\n", "t").unwrap();
        let mut text = String::new();
        parse_text_node(&file.nodes()[0], 1, &mut text);
        assert_eq!(text, "first\n\tsecond");
    }

    #[test]
    fn validate_names_undefined_outfits() {
        let mut universe = UniverseObjects::default();
        let action = action("action\n\toutfit Ghost\n", &mut universe);
        assert_eq!(action.validate(&universe).as_deref(), Some("gift outfit \"Ghost\""));
    }
}
