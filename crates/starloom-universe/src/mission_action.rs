//! [`MissionAction`]: what happens when a mission trigger fires.
//!
//! An `on <trigger>` block adds a dialog or conversation, outfit
//! requirements and a system filter on top of a [`GameAction`].

use std::collections::BTreeMap;

use rand::Rng;
use starloom_core::Handle;
use starloom_data::{DataNode, DataWriter};

use crate::context::{PlayerContext, Presentation};
use crate::conversation::ConversationRef;
use crate::entities::{Outfit, System};
use crate::game_action::{ActionOutcome, GameAction, PARAGRAPH_BREAK, parse_text_node};
use crate::location_filter::LocationFilter;
use crate::phrase::PhraseRef;
use crate::text_replacements::{Substitutions, replace};
use crate::universe::UniverseObjects;

/// The action bound to one trigger of a mission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MissionAction {
    /// Trigger token, e.g. `offer`, `complete` or `enter`.
    pub trigger: String,
    /// For `on enter <system>`, the system.
    pub system: Option<Handle<System>>,
    system_filter: LocationFilter,
    dialog_text: String,
    dialog_phrase: Option<PhraseRef>,
    conversation: Option<ConversationRef>,
    required_outfits: BTreeMap<Handle<Outfit>, i64>,
    action: GameAction,
}

impl MissionAction {
    /// Load an `on <trigger> [system]` block.
    pub fn load(node: &DataNode, universe: &mut UniverseObjects) -> Self {
        let mut result = Self {
            action: GameAction::new(),
            ..Self::default()
        };
        if node.size() >= 2 {
            node.token(1).clone_into(&mut result.trigger);
        }
        if node.size() >= 3 {
            result.system = Some(universe.systems.get(node.token(2)));
        }
        for child in node.children() {
            let key = child.key();
            let has_value = child.size() >= 2;
            match key {
                "dialog" => result.load_dialog(child, universe),
                "conversation" if child.has_children() || has_value => {
                    result.conversation = Some(ConversationRef::load(child, universe));
                }
                "outfit" if has_value && child.size() >= 3 && to_i64(child.value(2)) == 0 => {
                    child.print_trace(
                        "Warning: deprecated use of \"outfit\" with count of 0. Use \"require <outfit>\" instead:",
                    );
                    result.required_outfits.insert(universe.outfits.get(child.token(1)), 1);
                }
                "require" if has_value => {
                    let count = if child.size() < 3 { 1 } else { to_i64(child.value(2)) };
                    if count >= 0 {
                        result.required_outfits.insert(universe.outfits.get(child.token(1)), count);
                    } else {
                        child.print_trace("Skipping invalid \"require\" amount:");
                    }
                }
                "system" => {
                    if result.system.is_none() && child.has_children() {
                        result.system_filter.load(child, universe);
                    } else {
                        child.print_trace("Unsupported use of \"system\" LocationFilter:");
                    }
                }
                _ => result.action.load_single(child, universe),
            }
        }
        result
    }

    fn load_dialog(&mut self, child: &DataNode, universe: &mut UniverseObjects) {
        let first = child.children().first();
        if child.size() >= 2 && child.token(1) == "phrase" {
            if !child.has_children() && child.size() == 3 {
                self.dialog_phrase = Some(PhraseRef::Named(universe.phrases.get(child.token(2))));
            } else {
                child.print_trace("Skipping unsupported dialog phrase syntax:");
            }
        } else if let Some(grand) = first.filter(|g| child.size() == 1 && g.key() == "phrase") {
            if grand.size() == 1 && grand.has_children() {
                self.dialog_phrase = Some(PhraseRef::load(grand, &mut universe.phrases));
            } else {
                grand.print_trace("Skipping unsupported dialog phrase syntax:");
            }
        } else {
            parse_text_node(child, 1, &mut self.dialog_text);
        }
    }

    /// The payment made by this action.
    pub const fn payment(&self) -> i64 {
        self.action.payment()
    }

    /// The dialog text, after instantiation.
    pub fn dialog_text(&self) -> &str {
        &self.dialog_text
    }

    /// The underlying game action.
    pub const fn action(&self) -> &GameAction {
        &self.action
    }

    /// Whether running this action shows the player anything.
    pub fn presents_something(&self) -> bool {
        !self.dialog_text.is_empty() || self.conversation.is_some()
    }

    /// Whether the player meets this action's requirements: enough money
    /// for a negative payment, every outfit to be taken, every required
    /// outfit (a count of zero means none at all), and the system filter.
    pub fn can_be_done(&self, player: &dyn PlayerContext, universe: &UniverseObjects) -> bool {
        if !self.action.can_be_done(player) {
            return false;
        }
        let outfits_ok = self.required_outfits.iter().all(|(outfit, count)| {
            let available = player.outfit_count(*outfit);
            if *count == 0 { available == 0 } else { available >= *count }
        });
        outfits_ok
            && (self.system_filter.is_empty()
                || player
                    .system()
                    .is_some_and(|system| self.system_filter.matches_system(system, None, universe)))
    }

    /// Show the dialog or conversation, then perform the action.
    ///
    /// `visit` dialogs are only shown for missions marked unique, so that
    /// repeated visits do not stack copies of the same text.
    pub fn do_action(
        &self,
        player: &mut dyn PlayerContext,
        universe: &UniverseObjects,
        mission: Option<u64>,
        is_unique: bool,
    ) -> ActionOutcome {
        let is_offer = self.trigger == "offer";
        if let Some(conversation) = self.conversation.as_ref().and_then(|c| c.resolve(universe)) {
            player.present(Presentation::Conversation {
                conversation: conversation.clone(),
                mission,
                is_offer,
            });
        } else if !self.dialog_text.is_empty() {
            let mut subs = Substitutions::new();
            subs.insert("<first>".to_owned(), player.first_name());
            subs.insert("<last>".to_owned(), player.last_name());
            let text = replace(&self.dialog_text, &subs);
            if is_offer || is_unique || self.trigger != "visit" {
                player.present(Presentation::Dialog { text, mission, is_offer });
            }
        }
        self.action.do_action(player, universe)
    }

    /// Freeze this template for one mission instance.
    pub fn instantiate<R: Rng + ?Sized>(
        &self,
        subs: &mut Substitutions,
        origin: Option<Handle<System>>,
        jumps: i64,
        payload: i64,
        universe: &UniverseObjects,
        rng: &mut R,
    ) -> Self {
        let previous_payment = subs.get("<payment>").cloned();
        let action = self.action.instantiate(subs, jumps, payload, rng);

        let dialog = match &self.dialog_phrase {
            Some(phrase) => phrase.get(&universe.phrases, rng),
            None => self.dialog_text.clone(),
        };
        let conversation = self.conversation.as_ref().and_then(|c| c.resolve(universe)).map(|c| {
            ConversationRef::Inline(Box::new(c.instantiate(subs, jumps, payload, universe, rng)))
        });

        if action.payment() != 0 && self.trigger != "complete" {
            match previous_payment {
                Some(payment) => subs.insert("<payment>".to_owned(), payment),
                None => subs.remove("<payment>"),
            };
        }

        Self {
            trigger: self.trigger.clone(),
            system: self.system,
            system_filter: origin.map_or_else(|| self.system_filter.clone(), |o| self.system_filter.set_origin(o)),
            dialog_text: if dialog.is_empty() { String::new() } else { replace(&dialog, subs) },
            dialog_phrase: None,
            conversation,
            required_outfits: self.required_outfits.clone(),
            action,
        }
    }

    /// The first content this action uses that is not fully defined.
    pub fn validate(&self, universe: &UniverseObjects) -> Option<String> {
        if let Some(ConversationRef::Named(handle)) = &self.conversation {
            if !universe.conversations.is_defined(*handle) {
                return Some(format!("conversation \"{}\"", universe.conversations.name_of(*handle)));
            }
        }
        if let Some(conversation) = self.conversation.as_ref().and_then(|c| c.resolve(universe)) {
            if let Some(reason) = conversation.validate(universe) {
                return Some(reason);
            }
        }
        if let Some(PhraseRef::Named(handle)) = &self.dialog_phrase {
            if !universe.phrases.is_defined(*handle) {
                return Some(format!("phrase \"{}\"", universe.phrases.name_of(*handle)));
            }
        }
        if let Some(outfit) = self.required_outfits.keys().find(|o| !universe.outfits.is_defined(**o)) {
            return Some(format!("required outfit \"{}\"", universe.outfits.name_of(*outfit)));
        }
        self.action.validate(universe)
    }

    /// Write `on <trigger> [system]` and the body.
    pub fn save(&self, writer: &mut DataWriter, universe: &UniverseObjects) {
        let mut header = vec!["on", self.trigger.as_str()];
        if let Some(system) = self.system {
            header.push(universe.systems.name_of(system));
        }
        writer.write(header);
        writer.begin_child();
        self.system_filter.save("system", writer, universe);
        if !self.dialog_text.is_empty() {
            writer.write(["dialog"]);
            writer.begin_child();
            for line in self.dialog_text.split(PARAGRAPH_BREAK) {
                writer.write([line]);
            }
            writer.end_child();
        } else if let Some(phrase) = &self.dialog_phrase {
            match phrase {
                PhraseRef::Named(handle) => writer.write(["dialog", "phrase", universe.phrases.name_of(*handle)]),
                PhraseRef::Inline(_) => {
                    writer.write(["dialog"]);
                    writer.begin_child();
                    phrase.save("phrase", writer, &universe.phrases);
                    writer.end_child();
                }
            }
        }
        if let Some(conversation) = &self.conversation {
            conversation.save(writer, universe);
        }
        for (outfit, count) in &self.required_outfits {
            writer.write(["require".to_owned(), universe.outfits.name_of(*outfit).to_owned(), count.to_string()]);
        }
        self.action.save(writer, universe);
        writer.end_child();
    }
}

fn to_i64(value: f64) -> i64 {
    starloom_conditions::expression::to_i64(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use starloom_data::DataFile;

    fn load(text: &str, universe: &mut UniverseObjects) -> MissionAction {
        let file = DataFile::parse(text, "t").unwrap();
        MissionAction::load(&file.nodes()[0], universe)
    }

    #[test]
    fn header_and_body_are_read() {
        let mut universe = UniverseObjects::default();
        let action = load(
            "on enter Sol\n\tdialog \"Welcome, <first>.\"\n\trequire Map 0\n\toutfit Laser 0\n\tpayment 500\n",
            &mut universe,
        );
        assert_eq!(action.trigger, "enter");
        assert_eq!(action.system, universe.systems.find("Sol"));
        assert_eq!(action.dialog_text(), "Welcome, <first>.");
        assert_eq!(action.required_outfits.len(), 2);
        assert_eq!(action.payment(), 500);
        assert!(action.presents_something());
    }

    #[test]
    fn dialog_phrase_is_expanded_on_instantiation() {
        let mut universe = UniverseObjects::default();
        let action = load(
            "on complete\n\tdialog\n\t\tphrase\n\t\t\tword\n\t\t\t\t\"Paid <payment>.\"\n\tpayment 1200\n",
            &mut universe,
        );
        let mut subs = Substitutions::new();
        let mut rng = StdRng::seed_from_u64(5);
        let instance = action.instantiate(&mut subs, None, 0, 0, &universe, &mut rng);
        assert_eq!(instance.dialog_text(), "Paid 1,200 credits.");
        assert_eq!(subs["<payment>"], "1,200 credits");
    }

    #[test]
    fn non_complete_payment_does_not_leak_into_substitutions() {
        let mut universe = UniverseObjects::default();
        let action = load("on accept\n\tpayment 50\n", &mut universe);
        let mut subs = Substitutions::new();
        subs.insert("<payment>".to_owned(), "9 credits".to_owned());
        let mut rng = StdRng::seed_from_u64(5);
        let instance = action.instantiate(&mut subs, None, 0, 0, &universe, &mut rng);
        assert_eq!(instance.payment(), 50);
        assert_eq!(subs["<payment>"], "9 credits");
    }
}
