//! Conversations: a small graph of text, choices, branches and actions
//! that ends in an [`Outcome`].
//!
//! ```text
//! conversation "bar talk"
//! 	scene "scene/bar"
//! 	`The trader waves you over.`
//! 	action
//! 		"met trader" = 1
//! 	choice
//! 		`"Sure, I'll help."`
//! 			accept
//! 		`"Not today."`
//! 			goto refuse
//! 	label refuse
//! 	`She shrugs.`
//! 		decline
//! ```
//!
//! # Modules
//!
//! - [`Conversation`] holds the nodes. Loading resolves `goto` labels to
//!   node indices, merges consecutive text lines into one node, and
//!   rejects graphs that can cycle without passing a real choice.
//! - [`ConversationRunner`] walks a conversation against a
//!   [`PlayerContext`], stopping at choices and name entry.
//!
//! # Invariants
//!
//! - A link past the last node is stored as [`Outcome::Decline`] once
//!   loading finishes.
//! - Each action node runs at most once per walk.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use starloom_conditions::ConditionSet;
use starloom_core::Handle;
use starloom_data::{DataNode, DataWriter};
use starloom_types::Outcome;

use crate::context::PlayerContext;
use crate::game_action::{ActionOutcome, GameAction};
use crate::phrase::expand_phrases;
use crate::text_replacements::{Substitutions, replace};
use crate::universe::UniverseObjects;

/// Where control goes after a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// Another node, by index.
    Node(usize),
    /// The end of the conversation.
    End(Outcome),
}

/// A line of text, shown only if its conditions hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paragraph {
    /// The text.
    pub text: String,
    /// Conditions for showing it.
    pub to_display: ConditionSet,
}

/// One option of a choice node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceEntry {
    /// The option's text.
    pub text: String,
    /// Conditions for listing the option at all.
    pub to_display: ConditionSet,
    /// Conditions for the option to be selectable.
    pub to_activate: ConditionSet,
    /// Where choosing it leads.
    pub next: Link,
}

/// A conversation node.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationNode {
    /// Text shown to the player.
    Text {
        /// The paragraphs.
        paragraphs: Vec<Paragraph>,
        /// Scene image, by name.
        scene: Option<String>,
        /// Where the text leads.
        next: Link,
    },
    /// A choice between options.
    Choice {
        /// The options, in order.
        entries: Vec<ChoiceEntry>,
    },
    /// The player enters their name. Control falls through afterwards.
    Name,
    /// A conditional jump.
    Branch {
        /// The test.
        conditions: ConditionSet,
        /// Target when the test holds.
        if_true: Link,
        /// Target otherwise.
        if_false: Link,
    },
    /// Side effects. Control falls through afterwards.
    Action(Box<GameAction>),
}

impl ConversationNode {
    fn text(index: usize) -> Self {
        Self::Text {
            paragraphs: Vec::new(),
            scene: None,
            next: Link::Node(index.saturating_add(1)),
        }
    }

    fn link_mut(&mut self, slot: usize) -> Option<&mut Link> {
        match self {
            Self::Text { next, .. } => (slot == 0).then_some(next),
            Self::Choice { entries } => entries.get_mut(slot).map(|entry| &mut entry.next),
            Self::Branch { if_true, if_false, .. } => match slot {
                0 => Some(if_true),
                1 => Some(if_false),
                _ => None,
            },
            Self::Name | Self::Action(_) => None,
        }
    }

    /// Where control goes when no real choice is made.
    fn single_exit(&self, index: usize) -> Option<Link> {
        match self {
            Self::Text { next, .. } => Some(*next),
            Self::Branch { if_true, .. } => Some(*if_true),
            Self::Choice { entries } if entries.len() == 1 => entries.first().map(|entry| entry.next),
            Self::Choice { .. } => None,
            Self::Name | Self::Action(_) => Some(Link::Node(index.saturating_add(1))),
        }
    }
}

/// A conversation graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    nodes: Vec<ConversationNode>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

struct Builder {
    nodes: Vec<ConversationNode>,
    can_merge: bool,
    labels: BTreeMap<String, usize>,
    unresolved: Vec<(String, usize, usize)>,
}

impl Builder {
    fn push(&mut self, node: ConversationNode, can_merge: bool) {
        self.nodes.push(node);
        self.can_merge = can_merge;
    }

    fn last_index(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    fn add_label(&mut self, label: &str, node: &DataNode) {
        self.can_merge = false;
        if self.labels.contains_key(label) {
            node.print_trace(&format!("Conversation: label \"{label}\" is used more than once:"));
            return;
        }
        let target = self.nodes.len();
        let (resolved, pending): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.unresolved).into_iter().partition(|(name, _, _)| name == label);
        self.unresolved = pending;
        for (_, index, slot) in resolved {
            self.set_link(index, slot, Link::Node(target));
        }
        self.labels.insert(label.to_owned(), target);
    }

    fn goto(&mut self, label: &str, index: usize, slot: usize) {
        if let Some(target) = self.labels.get(label).copied() {
            self.set_link(index, slot, Link::Node(target));
        } else {
            self.unresolved.push((label.to_owned(), index, slot));
        }
    }

    fn set_link(&mut self, index: usize, slot: usize, link: Link) {
        if let Some(target) = self.nodes.get_mut(index).and_then(|node| node.link_mut(slot)) {
            *target = link;
        }
    }

    /// Read the children of a text line or choice option: an optional goto
    /// or outcome and optional display conditions. Returns whether a goto
    /// or outcome was found.
    fn load_gotos(
        &mut self,
        node: &DataNode,
        slot: usize,
        to_display: &mut ConditionSet,
        mut to_activate: Option<&mut ConditionSet>,
    ) -> bool {
        let index = self.last_index();
        let mut has_goto = false;
        for child in node.children() {
            let key = child.key();
            if key == "to" && child.size() >= 2 && child.token(1) == "display" {
                to_display.load(child);
            } else if key == "to" && child.size() >= 2 && child.token(1) == "activate" {
                if let Some(conditions) = to_activate.as_deref_mut() {
                    conditions.load(child);
                } else {
                    child.print_trace("Skipping \"to activate\" outside of a choice:");
                }
            } else if has_goto {
                child.print_trace("Ignoring extra text in conversation choice:");
            } else if child.size() == 2 && key == "goto" {
                self.goto(child.token(1), index, slot);
                has_goto = true;
            } else if let Some(outcome) = Outcome::from_token(key).filter(|_| child.size() == 1) {
                self.set_link(index, slot, Link::End(outcome));
                has_goto = true;
            } else {
                child.print_trace("Expected goto or endpoint in conversation, found this:");
            }
        }
        has_goto
    }

    fn branch_target(&mut self, token: &str, slot: usize) {
        if let Some(outcome) = Outcome::from_token(token) {
            let index = self.last_index();
            self.set_link(index, slot, Link::End(outcome));
        } else {
            let index = self.last_index();
            self.goto(token, index, slot);
        }
    }
}

impl Conversation {
    /// Load a `conversation` node, replacing anything loaded before.
    pub fn load(&mut self, node: &DataNode, universe: &mut UniverseObjects) {
        let mut builder = Builder {
            nodes: Vec::new(),
            can_merge: false,
            labels: BTreeMap::new(),
            unresolved: Vec::new(),
        };

        for child in node.children() {
            let key = child.key();
            match key {
                "scene" if child.size() >= 2 => {
                    let mut text = ConversationNode::text(builder.nodes.len());
                    if let ConversationNode::Text { scene, .. } = &mut text {
                        *scene = Some(child.token(1).to_owned());
                    }
                    builder.push(text, true);
                }
                "label" if child.size() >= 2 => builder.add_label(child.token(1), child),
                "choice" => {
                    let next = Link::Node(builder.nodes.len().saturating_add(1));
                    builder.push(ConversationNode::Choice { entries: Vec::new() }, false);
                    for (slot, grand) in child.children().iter().enumerate() {
                        let mut entry = ChoiceEntry {
                            text: grand.token(0).to_owned(),
                            to_display: ConditionSet::new(),
                            to_activate: ConditionSet::new(),
                            next,
                        };
                        if let Some(ConversationNode::Choice { entries }) = builder.nodes.last_mut() {
                            entries.push(entry.clone());
                        }
                        builder.load_gotos(grand, slot, &mut entry.to_display, Some(&mut entry.to_activate));
                        let stored = match builder.nodes.last_mut() {
                            Some(ConversationNode::Choice { entries }) => entries.get_mut(slot),
                            _ => None,
                        };
                        if let Some(stored) = stored {
                            stored.to_display = entry.to_display;
                            stored.to_activate = entry.to_activate;
                        }
                    }
                    if matches!(builder.nodes.last(), Some(ConversationNode::Choice { entries }) if entries.is_empty()) {
                        child.print_trace("Conversation contains an empty \"choice\" node:");
                        builder.nodes.pop();
                    }
                }
                "name" => builder.push(ConversationNode::Name, false),
                "branch" => {
                    let fall_through = Link::Node(builder.nodes.len().saturating_add(1));
                    builder.push(
                        ConversationNode::Branch {
                            conditions: ConditionSet::from_node(child),
                            if_true: fall_through,
                            if_false: fall_through,
                        },
                        false,
                    );
                    for slot in 0_usize..2 {
                        if child.size() > slot.saturating_add(1) {
                            builder.branch_target(child.token(slot.saturating_add(1)), slot);
                        }
                    }
                }
                "action" | "apply" => {
                    builder.push(ConversationNode::Action(Box::new(GameAction::from_node(child, universe))), false);
                }
                _ => {
                    if builder.nodes.is_empty() || !builder.can_merge {
                        let text = ConversationNode::text(builder.nodes.len());
                        builder.push(text, true);
                    }
                    let mut paragraph = Paragraph {
                        text: child.token(0).to_owned(),
                        to_display: ConditionSet::new(),
                    };
                    let has_goto = builder.load_gotos(child, 0, &mut paragraph.to_display, None);
                    if let Some(ConversationNode::Text { paragraphs, .. }) = builder.nodes.last_mut() {
                        paragraphs.push(paragraph);
                    }
                    if has_goto {
                        builder.can_merge = false;
                    }
                }
            }
        }

        for (label, _, _) in &builder.unresolved {
            node.print_trace(&format!("Conversation contains unrecognized label \"{label}\":"));
        }
        self.nodes = builder.nodes;
        let len = self.nodes.len();
        for node in &mut self.nodes {
            let mut slot = 0;
            while let Some(link) = node.link_mut(slot) {
                if matches!(link, Link::Node(index) if *index >= len) {
                    *link = Link::End(Outcome::Decline);
                }
                slot = slot.saturating_add(1);
            }
        }

        if let Some(label) = builder.labels.iter().find_map(|(label, start)| self.loops_from(*start).then_some(label)) {
            node.print_trace(&format!("Conversation contains infinite loop beginning with label \"{label}\":"));
            self.nodes.clear();
        }
    }

    /// Whether a walk from `start` that never meets a real choice can go on
    /// forever.
    fn loops_from(&self, start: usize) -> bool {
        let mut index = start;
        for _ in 0..=self.nodes.len() {
            let Some(Link::Node(next)) = self.nodes.get(index).and_then(|node| node.single_exit(index)) else {
                return false;
            };
            if next == start {
                return true;
            }
            index = next;
        }
        true
    }

    /// Whether the conversation has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The nodes, in order.
    pub fn nodes(&self) -> &[ConversationNode] {
        &self.nodes
    }

    /// The first reason this conversation cannot be used, if any.
    pub fn validate(&self, universe: &UniverseObjects) -> Option<String> {
        for (index, node) in self.nodes.iter().enumerate() {
            match node {
                ConversationNode::Choice { entries } if entries.is_empty() => {
                    return Some(format!("node {index} is an empty choice"));
                }
                ConversationNode::Action(action) => {
                    if let Some(reason) = action.validate(universe) {
                        return Some(format!("action node {index}: {reason}"));
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// A copy with every `${phrase}` expanded and every `<key>` replaced.
    /// Actions are instantiated first so that the `<payment>` they set is
    /// available to the text.
    pub fn instantiate<R: Rng + ?Sized>(
        &self,
        subs: &mut Substitutions,
        jumps: i64,
        payload: i64,
        universe: &UniverseObjects,
        rng: &mut R,
    ) -> Self {
        let mut result = self.clone();
        for node in &mut result.nodes {
            if let ConversationNode::Action(action) = node {
                **action = action.instantiate(subs, jumps, payload, rng);
            }
        }
        let mut expand = |text: &mut String| {
            *text = replace(&expand_phrases(text.as_str(), &universe.phrases, rng), subs);
        };
        for node in &mut result.nodes {
            match node {
                ConversationNode::Text { paragraphs, .. } => {
                    paragraphs.iter_mut().for_each(|p| expand(&mut p.text));
                }
                ConversationNode::Choice { entries } => {
                    entries.iter_mut().for_each(|e| expand(&mut e.text));
                }
                _ => {}
            }
        }
        result
    }

    /// Write the conversation. Labels are written as node indices.
    pub fn save(&self, writer: &mut DataWriter, universe: &UniverseObjects) {
        writer.write(["conversation"]);
        writer.begin_child();
        for (index, node) in self.nodes.iter().enumerate() {
            writer.write(["label".to_owned(), index.to_string()]);
            match node {
                ConversationNode::Text { paragraphs, scene, next } => {
                    if let Some(scene) = scene {
                        writer.write(["scene", scene.as_str()]);
                    }
                    // A scene with no text of its own falls through to the
                    // next node on reload; only an unusual link needs a line.
                    let falls_through = *next == self.fallthrough(index);
                    if paragraphs.is_empty() && !(scene.is_some() && falls_through) {
                        writer.write([""]);
                        writer.begin_child();
                        self.write_link(writer, *next);
                        writer.end_child();
                    }
                    let last = paragraphs.len().saturating_sub(1);
                    for (i, paragraph) in paragraphs.iter().enumerate() {
                        writer.write([paragraph.text.as_str()]);
                        writer.begin_child();
                        if !paragraph.to_display.is_empty() {
                            paragraph.to_display.save_block(writer, &["to", "display"]);
                        }
                        if i == last {
                            self.write_link(writer, *next);
                        }
                        writer.end_child();
                    }
                }
                ConversationNode::Choice { entries } => {
                    writer.write(["choice"]);
                    writer.begin_child();
                    for entry in entries {
                        writer.write([entry.text.as_str()]);
                        writer.begin_child();
                        if !entry.to_display.is_empty() {
                            entry.to_display.save_block(writer, &["to", "display"]);
                        }
                        if !entry.to_activate.is_empty() {
                            entry.to_activate.save_block(writer, &["to", "activate"]);
                        }
                        self.write_link(writer, entry.next);
                        writer.end_child();
                    }
                    writer.end_child();
                }
                ConversationNode::Name => writer.write(["name"]),
                ConversationNode::Branch { conditions, if_true, if_false } => {
                    writer.write(["branch".to_owned(), self.link_token(*if_true), self.link_token(*if_false)]);
                    writer.begin_child();
                    conditions.save(writer);
                    writer.end_child();
                }
                ConversationNode::Action(action) => {
                    writer.write(["action"]);
                    writer.begin_child();
                    action.save(writer, universe);
                    writer.end_child();
                }
            }
        }
        writer.end_child();
    }

    fn link_token(&self, link: Link) -> String {
        match link {
            Link::Node(index) if index < self.nodes.len() => index.to_string(),
            Link::Node(_) => Outcome::Decline.token().to_owned(),
            Link::End(outcome) => outcome.token().to_owned(),
        }
    }

    fn fallthrough(&self, index: usize) -> Link {
        let next = index.saturating_add(1);
        if next < self.nodes.len() {
            Link::Node(next)
        } else {
            Link::End(Outcome::Decline)
        }
    }

    fn write_link(&self, writer: &mut DataWriter, link: Link) {
        match link {
            Link::Node(index) if index < self.nodes.len() => {
                writer.write(["goto".to_owned(), index.to_string()]);
            }
            _ => writer.write([self.link_token(link)]),
        }
    }
}

// ---------------------------------------------------------------------------
// References
// ---------------------------------------------------------------------------

/// A conversation named by a key line, or written inline beneath it.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationRef {
    /// A conversation in the registry.
    Named(Handle<Conversation>),
    /// A conversation defined in place.
    Inline(Box<Conversation>),
}

impl ConversationRef {
    /// Read `conversation <name>` or an inline `conversation` block.
    pub fn load(node: &DataNode, universe: &mut UniverseObjects) -> Self {
        if node.size() >= 2 {
            Self::Named(universe.conversations.get(node.token(1)))
        } else {
            let mut conversation = Conversation::default();
            conversation.load(node, universe);
            Self::Inline(Box::new(conversation))
        }
    }

    /// The conversation this refers to.
    pub fn resolve<'a>(&'a self, universe: &'a UniverseObjects) -> Option<&'a Conversation> {
        match self {
            Self::Named(handle) => universe.conversations.value(*handle),
            Self::Inline(conversation) => Some(conversation),
        }
    }

    /// Write `conversation <name>` or the inline definition.
    pub fn save(&self, writer: &mut DataWriter, universe: &UniverseObjects) {
        match self {
            Self::Named(handle) => writer.write(["conversation", universe.conversations.name_of(*handle)]),
            Self::Inline(conversation) => conversation.save(writer, universe),
        }
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// An option as the player sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceView {
    /// Index to pass to [`ConversationRunner::choose`].
    pub index: usize,
    /// The option's text.
    pub text: String,
    /// Whether the option can be selected.
    pub active: bool,
}

/// Where a walk stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The player must pick one of these.
    Choices(Vec<ChoiceView>),
    /// The player must enter a name.
    Name,
    /// The conversation is over.
    Finished(Outcome),
}

/// Walks a conversation one interaction at a time.
#[derive(Debug, Clone)]
pub struct ConversationRunner {
    conversation: Conversation,
    current: Link,
    transcript: Vec<String>,
    done_actions: BTreeSet<usize>,
    outcome: ActionOutcome,
}

impl ConversationRunner {
    /// Start at the first node.
    pub fn new(conversation: Conversation) -> Self {
        Self {
            conversation,
            current: Link::Node(0),
            transcript: Vec::new(),
            done_actions: BTreeSet::new(),
            outcome: ActionOutcome::default(),
        }
    }

    /// Follow text, branches and actions until the player has to act or
    /// the conversation ends.
    pub fn advance(&mut self, player: &mut dyn PlayerContext, universe: &UniverseObjects) -> Step {
        // Every cycle passes a choice, so a walk longer than this is stuck.
        let limit = self.conversation.nodes.len().saturating_mul(2).saturating_add(1);
        for _ in 0..limit {
            let index = match self.current {
                Link::End(outcome) => return Step::Finished(outcome),
                Link::Node(index) => index,
            };
            let Some(node) = self.conversation.nodes.get(index) else {
                self.current = Link::End(Outcome::Decline);
                continue;
            };
            match node {
                ConversationNode::Text { paragraphs, next, .. } => {
                    let store = player.conditions();
                    self.transcript.extend(
                        paragraphs
                            .iter()
                            .filter(|p| !p.text.is_empty() && p.to_display.test(store))
                            .map(|p| p.text.clone()),
                    );
                    self.current = *next;
                }
                ConversationNode::Branch { conditions, if_true, if_false } => {
                    self.current = if conditions.test(player.conditions()) { *if_true } else { *if_false };
                }
                ConversationNode::Action(action) => {
                    if self.done_actions.insert(index) {
                        self.outcome.merge(action.do_action(player, universe));
                    }
                    self.current = Link::Node(index.saturating_add(1));
                }
                ConversationNode::Name => return Step::Name,
                ConversationNode::Choice { entries } => {
                    let store = player.conditions();
                    let views: Vec<ChoiceView> = entries
                        .iter()
                        .enumerate()
                        .filter(|(_, entry)| entry.to_display.test(store))
                        .map(|(i, entry)| ChoiceView {
                            index: i,
                            text: entry.text.clone(),
                            active: entry.to_activate.test(store),
                        })
                        .collect();
                    if views.is_empty() {
                        self.current = Link::Node(index.saturating_add(1));
                    } else {
                        return Step::Choices(views);
                    }
                }
            }
        }
        tracing::warn!("conversation walk did not reach a choice or an outcome");
        self.current = Link::End(Outcome::Decline);
        Step::Finished(Outcome::Decline)
    }

    /// Pick option `index` of the current choice. Returns `false` if there
    /// is no such selectable option.
    pub fn choose(&mut self, player: &dyn PlayerContext, index: usize) -> bool {
        let Link::Node(current) = self.current else {
            return false;
        };
        let Some(ConversationNode::Choice { entries }) = self.conversation.nodes.get(current) else {
            return false;
        };
        let store = player.conditions();
        match entries.get(index) {
            Some(entry) if entry.to_display.test(store) && entry.to_activate.test(store) => {
                self.transcript.push(entry.text.clone());
                self.current = entry.next;
                true
            }
            _ => false,
        }
    }

    /// Finish name entry. Returns `false` if no name was being asked for.
    pub fn enter_name(&mut self) -> bool {
        match self.current {
            Link::Node(index) if matches!(self.conversation.nodes.get(index), Some(ConversationNode::Name)) => {
                self.current = Link::Node(index.saturating_add(1));
                true
            }
            _ => false,
        }
    }

    /// The outcome, once the conversation is over.
    pub const fn outcome(&self) -> Option<Outcome> {
        match self.current {
            Link::End(outcome) => Some(outcome),
            Link::Node(_) => None,
        }
    }

    /// Text shown so far, including chosen options.
    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    /// What the actions run so far asked of the calling mission.
    pub fn take_action_outcome(&mut self) -> ActionOutcome {
        std::mem::take(&mut self.outcome)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use starloom_data::DataFile;

    fn load(text: &str) -> Conversation {
        let file = DataFile::parse(text, "t").unwrap();
        let mut universe = UniverseObjects::default();
        let mut conversation = Conversation::default();
        conversation.load(&file.nodes()[0], &mut universe);
        conversation
    }

    #[test]
    fn consecutive_text_merges_until_a_goto() {
        let conversation = load("conversation\n\tone\n\ttwo\n\t\tgoto end\n\tthree\n\tlabel end\n\tfour\n");
        assert_eq!(conversation.nodes().len(), 3);
        let ConversationNode::Text { paragraphs, next, .. } = &conversation.nodes()[0] else {
            panic!("expected text");
        };
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(*next, Link::Node(2));
    }

    #[test]
    fn forward_labels_and_outcomes_resolve() {
        let conversation =
            load("conversation\n\tchoice\n\t\tyes\n\t\t\tgoto later\n\t\tno\n\t\t\tdecline\n\tlabel later\n\thi\n\t\taccept\n");
        let ConversationNode::Choice { entries } = &conversation.nodes()[0] else {
            panic!("expected choice");
        };
        assert_eq!(entries[0].next, Link::Node(1));
        assert_eq!(entries[1].next, Link::End(Outcome::Decline));
    }

    #[test]
    fn empty_choice_is_dropped() {
        let conversation = load("conversation\n\thello\n\tchoice\n");
        assert_eq!(conversation.nodes().len(), 1);
    }

    #[test]
    fn cycle_without_a_choice_empties_the_conversation() {
        let conversation = load("conversation\n\tlabel top\n\tround\n\t\tgoto again\n\tlabel again\n\tand round\n\t\tgoto top\n");
        assert!(conversation.is_empty());
    }

    #[test]
    fn cycle_through_a_choice_is_allowed() {
        let conversation = load(
            "conversation\n\tlabel top\n\tagain?\n\tchoice\n\t\tyes\n\t\t\tgoto top\n\t\tno\n\t\t\tdecline\n",
        );
        assert_eq!(conversation.nodes().len(), 2);
    }

    #[test]
    fn branch_tokens_accept_labels_and_outcomes() {
        let conversation = load("conversation\n\tbranch rich accept\n\t\tcredits > 10\n\tlabel rich\n\twow\n");
        let ConversationNode::Branch { if_true, if_false, .. } = &conversation.nodes()[0] else {
            panic!("expected branch");
        };
        assert_eq!(*if_true, Link::Node(1));
        assert_eq!(*if_false, Link::End(Outcome::Accept));
    }

    #[test]
    fn save_then_load_keeps_the_shape() {
        let original = load(
            "conversation\n\tscene bar\n\thello\n\tbranch yes no\n\t\tmoney > 0\n\tlabel yes\n\t\
             choice\n\t\tok\n\t\t\taccept\n\t\tnope\n\t\t\tto activate\n\t\t\t\tbrave\n\t\t\tdecline\n\tlabel no\n\tbye\n",
        );
        let universe = UniverseObjects::default();
        let mut writer = DataWriter::new();
        original.save(&mut writer, &universe);
        let reloaded = load(writer.as_str());
        assert_eq!(reloaded, original);
    }

    #[test]
    fn a_scene_without_text_saves_without_an_empty_paragraph() {
        let original = load("conversation\n\tscene bar\n\tlabel start\n\thello\n\t\taccept\n");
        assert!(matches!(&original.nodes()[0], ConversationNode::Text { paragraphs, .. } if paragraphs.is_empty()));

        let universe = UniverseObjects::default();
        let mut writer = DataWriter::new();
        original.save(&mut writer, &universe);
        assert!(!writer.as_str().contains("\"\""), "{}", writer.as_str());

        let reloaded = load(writer.as_str());
        assert_eq!(reloaded, original);
        let mut again = DataWriter::new();
        reloaded.save(&mut again, &universe);
        assert_eq!(again.as_str(), writer.as_str());
    }
}
