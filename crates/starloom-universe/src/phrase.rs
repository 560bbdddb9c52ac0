//! [`Phrase`]: weighted random text.
//!
//! Every `phrase <name>` definition adds one sentence. A sentence is a run
//! of parts:
//!
//! ```text
//! phrase "greeting"
//! 	word
//! 		"Hello" 3
//! 		"Hi"
//! 	word
//! 		", ${pilot title}."
//! 	phrase
//! 		"farewell"
//! 	replace
//! 		"  " " "
//! ```
//!
//! `word` picks one literal by weight. A literal may embed `${other}`, which
//! expands that phrase in place. `phrase` picks one phrase name by weight
//! and expands it. `replace` rewrites the text built so far.
//!
//! # Invariants
//!
//! - A phrase never reaches itself through references. Cycles are found by
//!   [`find_cycles`] after loading and the phrases involved are emptied.

use std::collections::BTreeSet;

use rand::Rng;
use starloom_core::{Handle, Set, WeightedList};
use starloom_data::DataNode;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Phrase(Handle<Phrase>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Choices(WeightedList<Vec<Segment>>),
    Replace(Vec<(String, String)>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Sentence {
    parts: Vec<Part>,
}

/// A named generator of random text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Phrase {
    sentences: WeightedList<Sentence>,
    origin: Option<DataNode>,
}

impl Phrase {
    /// Add the sentence defined by `node`. References to other phrases are
    /// looked up in `phrases`, creating stubs for names not yet defined.
    pub fn load(&mut self, node: &DataNode, phrases: &mut Set<Self>) {
        if self.origin.is_none() {
            self.origin = Some(node.clone());
        }
        let mut sentence = Sentence::default();
        for child in node.children() {
            match child.key() {
                "word" => {
                    let mut choices = WeightedList::new();
                    for grand in child.children() {
                        choices.push(parse_segments(grand.token(0), phrases), weight(grand));
                    }
                    sentence.parts.push(Part::Choices(choices));
                }
                "phrase" => {
                    let mut choices = WeightedList::new();
                    for grand in child.children() {
                        let target = phrases.get(grand.token(0));
                        choices.push(vec![Segment::Phrase(target)], weight(grand));
                    }
                    sentence.parts.push(Part::Choices(choices));
                }
                "replace" => {
                    let pairs = child
                        .children()
                        .iter()
                        .map(|grand| (grand.token(0).to_owned(), grand.token(1).to_owned()))
                        .collect();
                    sentence.parts.push(Part::Replace(pairs));
                }
                _ => {
                    child.print_trace("Skipping unrecognized attribute:");
                }
            }
        }
        if sentence.parts.is_empty() {
            node.print_trace("Skipping phrase with no content:");
            return;
        }
        self.sentences.push(sentence, 1);
    }

    /// Whether there is nothing to say.
    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    /// The node of the first definition, for traces.
    pub const fn origin(&self) -> Option<&DataNode> {
        self.origin.as_ref()
    }

    /// Drop every sentence, leaving a phrase that expands to nothing.
    pub fn clear(&mut self) {
        self.sentences.clear();
    }

    /// Expand the phrase. Nested references are followed at most as deep as
    /// there are phrases.
    pub fn get<R: Rng + ?Sized>(&self, phrases: &Set<Self>, rng: &mut R) -> String {
        self.expand(phrases, rng, phrases.len())
    }

    fn expand<R: Rng + ?Sized>(&self, phrases: &Set<Self>, rng: &mut R, depth: usize) -> String {
        let mut out = String::new();
        let Some(sentence) = self.sentences.pick(rng) else {
            return out;
        };
        for part in &sentence.parts {
            match part {
                Part::Choices(choices) => {
                    let Some(segments) = choices.pick(rng) else {
                        continue;
                    };
                    for segment in segments {
                        match segment {
                            Segment::Text(text) => out.push_str(text),
                            Segment::Phrase(handle) => {
                                let Some(next) = depth.checked_sub(1) else {
                                    tracing::warn!("phrase expansion too deep");
                                    continue;
                                };
                                if let Some(phrase) = phrases.value(*handle) {
                                    out.push_str(&phrase.expand(phrases, rng, next));
                                }
                            }
                        }
                    }
                }
                Part::Replace(pairs) => {
                    for (from, to) in pairs {
                        if !from.is_empty() {
                            out = out.replace(from.as_str(), to);
                        }
                    }
                }
            }
        }
        out
    }

    fn references(&self) -> impl Iterator<Item = Handle<Self>> + '_ {
        self.sentences.iter().flat_map(|(sentence, _)| {
            sentence.parts.iter().flat_map(|part| match part {
                Part::Choices(choices) => choices
                    .iter()
                    .flat_map(|(segments, _)| segments.iter())
                    .filter_map(|segment| match segment {
                        Segment::Phrase(handle) => Some(*handle),
                        Segment::Text(_) => None,
                    })
                    .collect::<Vec<_>>(),
                Part::Replace(_) => Vec::new(),
            })
        })
    }
}

/// A phrase named by a key line, or written inline beneath it.
///
/// `name "bar names"` refers to a phrase; `name` followed by `word` /
/// `phrase` children defines an anonymous one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhraseRef {
    /// A phrase in the registry.
    Named(Handle<Phrase>),
    /// A phrase defined in place.
    Inline(Phrase),
}

impl PhraseRef {
    /// Read the reference on `node`.
    pub fn load(node: &DataNode, phrases: &mut Set<Phrase>) -> Self {
        if node.size() >= 2 {
            Self::Named(phrases.get(node.token(1)))
        } else {
            let mut phrase = Phrase::default();
            phrase.load(node, phrases);
            Self::Inline(phrase)
        }
    }

    /// Expand the referenced phrase.
    pub fn get<R: Rng + ?Sized>(&self, phrases: &Set<Phrase>, rng: &mut R) -> String {
        match self {
            Self::Named(handle) => phrases
                .value(*handle)
                .map(|phrase| phrase.get(phrases, rng))
                .unwrap_or_default(),
            Self::Inline(phrase) => phrase.get(phrases, rng),
        }
    }

    /// Write `key name`, or `key` and the inline definition.
    pub fn save(&self, key: &str, writer: &mut starloom_data::DataWriter, phrases: &Set<Phrase>) {
        match self {
            Self::Named(handle) => writer.write([key, phrases.name_of(*handle)]),
            Self::Inline(phrase) => {
                writer.write([key]);
                if let Some(origin) = phrase.origin() {
                    writer.begin_child();
                    for child in origin.children() {
                        writer.write_node(child);
                    }
                    writer.end_child();
                }
            }
        }
    }
}

fn weight(node: &DataNode) -> i64 {
    if node.size() >= 2 {
        starloom_conditions::expression::to_i64(node.value(1))
    } else {
        1
    }
}

/// Split `text` on `${name}` references.
fn parse_segments(text: &str, phrases: &mut Set<Phrase>) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        let after = rest.get(start.saturating_add(2)..).unwrap_or("");
        let Some(end) = after.find('}') else {
            break;
        };
        let before = rest.get(..start).unwrap_or("");
        if !before.is_empty() {
            segments.push(Segment::Text(before.to_owned()));
        }
        let name = after.get(..end).unwrap_or("");
        segments.push(Segment::Phrase(phrases.get(name)));
        rest = after.get(end.saturating_add(1)..).unwrap_or("");
    }
    if !rest.is_empty() || segments.is_empty() {
        segments.push(Segment::Text(rest.to_owned()));
    }
    segments
}

/// Replace each `${name}` in free text with an expansion of that phrase.
/// Names with no phrase behind them expand to nothing.
pub fn expand_phrases<R: Rng + ?Sized>(text: &str, phrases: &Set<Phrase>, rng: &mut R) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        let after = rest.get(start.saturating_add(2)..).unwrap_or("");
        let Some(end) = after.find('}') else {
            break;
        };
        out.push_str(rest.get(..start).unwrap_or(""));
        if let Some(phrase) = after.get(..end).and_then(|name| phrases.find_value(name)) {
            out.push_str(&phrase.get(phrases, rng));
        }
        rest = after.get(end.saturating_add(1)..).unwrap_or("");
    }
    out.push_str(rest);
    out
}

/// Every phrase that can reach itself through its references.
pub fn find_cycles(phrases: &Set<Phrase>) -> BTreeSet<Handle<Phrase>> {
    let mut cyclic = BTreeSet::new();
    for start in phrases.handles() {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<Handle<Phrase>> = phrases
            .value(start)
            .map(|p| p.references().collect())
            .unwrap_or_default();
        while let Some(current) = stack.pop() {
            if current == start {
                cyclic.insert(start);
                break;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(phrase) = phrases.value(current) {
                stack.extend(phrase.references());
            }
        }
    }
    cyclic
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use starloom_data::DataFile;

    fn load_all(text: &str) -> Set<Phrase> {
        let file = DataFile::parse(text, "t").unwrap();
        let mut phrases: Set<Phrase> = Set::new();
        for node in file.nodes() {
            let handle = phrases.get(node.token(1));
            let mut phrase = phrases.take(handle);
            phrase.load(node, &mut phrases);
            phrases.put(handle, phrase);
            phrases.mark_defined(handle);
        }
        phrases
    }

    #[test]
    fn nested_references_expand() {
        let phrases = load_all(
            "phrase greet\n\tword\n\t\t\"Hello, ${who}!\"\n\
             phrase who\n\tword\n\t\tCaptain\n",
        );
        let mut rng = StdRng::seed_from_u64(1);
        let greet = phrases.find_value("greet").unwrap();
        assert_eq!(greet.get(&phrases, &mut rng), "Hello, Captain!");
    }

    #[test]
    fn phrase_parts_and_replace() {
        let phrases = load_all(
            "phrase a\n\tphrase\n\t\tb\n\tword\n\t\t\" there\"\n\treplace\n\t\tx y\n\
             phrase b\n\tword\n\t\txx\n",
        );
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(phrases.find_value("a").unwrap().get(&phrases, &mut rng), "yy there");
    }

    #[test]
    fn cycles_are_found() {
        let phrases = load_all(
            "phrase a\n\tphrase\n\t\tb\n\
             phrase b\n\tword\n\t\t\"${a}\"\n\
             phrase c\n\tphrase\n\t\ta\n\
             phrase d\n\tword\n\t\t\"${d}\"\n\
             phrase e\n\tword\n\t\tplain\n",
        );
        let cyclic: Vec<&str> = find_cycles(&phrases)
            .into_iter()
            .map(|h| phrases.name_of(h))
            .collect();
        assert_eq!(cyclic, ["a", "b", "d"]);
    }

    #[test]
    fn expansion_is_bounded() {
        let phrases = load_all("phrase loop\n\tword\n\t\t\"x${loop}\"\n");
        let mut rng = StdRng::seed_from_u64(1);
        let text = phrases.find_value("loop").unwrap().get(&phrases, &mut rng);
        assert!(text.len() <= 2);
    }

    #[test]
    fn repeated_definitions_add_sentences() {
        let phrases = load_all("phrase p\n\tword\n\t\tone\nphrase p\n\tword\n\t\ttwo\n");
        let phrase = phrases.find_value("p").unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let seen: BTreeSet<String> = (0..50).map(|_| phrase.get(&phrases, &mut rng)).collect();
        assert_eq!(seen.len(), 2);
    }
}
