//! Enumeration types shared by the mission and conversation state machines.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Conversation outcomes
// ---------------------------------------------------------------------------

/// A sentinel that ends a conversation walk.
///
/// Conversation node links are stored as signed integers: non-negative values
/// index the node list, negative values are one of these outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// The player accepts the offer.
    Accept,
    /// The player declines the offer.
    Decline,
    /// The offer returns to the pool and may be made again later.
    Defer,
    /// Accept, then take off immediately.
    Launch,
    /// Decline, then take off immediately.
    Flee,
    /// Defer, then take off immediately.
    Depart,
    /// The player is killed.
    Die,
    /// The player's flagship is destroyed.
    Explode,
}

impl Outcome {
    /// Every outcome, in sentinel order.
    pub const ALL: [Self; 8] = [
        Self::Accept,
        Self::Decline,
        Self::Defer,
        Self::Launch,
        Self::Flee,
        Self::Depart,
        Self::Die,
        Self::Explode,
    ];

    /// The negative link value that encodes this outcome.
    pub const fn code(self) -> i32 {
        match self {
            Self::Accept => -1,
            Self::Decline => -2,
            Self::Defer => -3,
            Self::Launch => -4,
            Self::Flee => -5,
            Self::Depart => -6,
            Self::Die => -7,
            Self::Explode => -8,
        }
    }

    /// Decode a negative link value.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|outcome| outcome.code() == code)
    }

    /// The keyword used for this outcome in data files.
    pub const fn token(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Decline => "decline",
            Self::Defer => "defer",
            Self::Launch => "launch",
            Self::Flee => "flee",
            Self::Depart => "depart",
            Self::Die => "die",
            Self::Explode => "explode",
        }
    }

    /// Parse a data-file keyword.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|outcome| outcome.token() == token)
    }

    /// Outcomes that force the player to take off immediately.
    pub const fn requires_launch(self) -> bool {
        matches!(self, Self::Launch | Self::Flee | Self::Depart)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

// ---------------------------------------------------------------------------
// Mission triggers
// ---------------------------------------------------------------------------

/// A discrete event in the mission life cycle that may fire an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MissionTrigger {
    /// The mission is being offered.
    Offer,
    /// The player accepted the mission.
    Accept,
    /// The player declined the mission.
    Decline,
    /// The offer was deferred.
    Defer,
    /// The player landed on the destination without completing it.
    Visit,
    /// The player landed on a stopover.
    Stopover,
    /// The player entered a waypoint system.
    Waypoint,
    /// A calendar day passed while the mission was active.
    Daily,
    /// The player's flagship was disabled.
    Disabled,
    /// The mission was completed.
    Complete,
    /// The mission failed.
    Fail,
    /// The player abandoned the mission.
    Abort,
}

impl MissionTrigger {
    /// Every trigger, in declaration order.
    pub const ALL: [Self; 12] = [
        Self::Offer,
        Self::Accept,
        Self::Decline,
        Self::Defer,
        Self::Visit,
        Self::Stopover,
        Self::Waypoint,
        Self::Daily,
        Self::Disabled,
        Self::Complete,
        Self::Fail,
        Self::Abort,
    ];

    /// The keyword used after `on` in data files.
    pub const fn token(self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Accept => "accept",
            Self::Decline => "decline",
            Self::Defer => "defer",
            Self::Visit => "visit",
            Self::Stopover => "stopover",
            Self::Waypoint => "waypoint",
            Self::Daily => "daily",
            Self::Disabled => "disabled",
            Self::Complete => "complete",
            Self::Fail => "fail",
            Self::Abort => "abort",
        }
    }

    /// Parse a data-file keyword.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|trigger| trigger.token() == token)
    }

    /// Triggers after which a mission instance is gone for good.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Fail | Self::Abort)
    }
}

impl fmt::Display for MissionTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

// ---------------------------------------------------------------------------
// Mission locations
// ---------------------------------------------------------------------------

/// Where a mission is offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum MissionLocation {
    /// Offered in the spaceport when landing.
    #[default]
    Spaceport,
    /// Offered immediately on landing, before the spaceport.
    Landing,
    /// Listed on the job board.
    Job,
    /// Offered when boarding a disabled ship.
    Boarding,
    /// Offered when assisting a friendly ship.
    Assisting,
    /// Offered when entering the shipyard.
    Shipyard,
    /// Offered when entering the outfitter.
    Outfitter,
    /// Offered when entering a system.
    Entering,
    /// Offered when opening the job board.
    JobBoard,
}

impl MissionLocation {
    /// Every location, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Spaceport,
        Self::Landing,
        Self::Job,
        Self::Boarding,
        Self::Assisting,
        Self::Shipyard,
        Self::Outfitter,
        Self::Entering,
        Self::JobBoard,
    ];

    /// The keyword used in mission definitions.
    pub const fn token(self) -> &'static str {
        match self {
            Self::Spaceport => "spaceport",
            Self::Landing => "landing",
            Self::Job => "job",
            Self::Boarding => "boarding",
            Self::Assisting => "assisting",
            Self::Shipyard => "shipyard",
            Self::Outfitter => "outfitter",
            Self::Entering => "entering",
            Self::JobBoard => "job board",
        }
    }

    /// Parse a mission-definition keyword.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|location| location.token() == token)
    }
}

// ---------------------------------------------------------------------------
// Ship events
// ---------------------------------------------------------------------------

/// A set of ship events, stored as a bit mask.
///
/// NPC success and failure conditions are expressed as masks that must be
/// (or must never be) contained in the per-ship event history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct ShipEvents(u32);

impl ShipEvents {
    /// No events.
    pub const NONE: Self = Self(0);
    /// The ship was assisted (repaired or refuelled).
    pub const ASSIST: Self = Self(1);
    /// The ship was disabled.
    pub const DISABLE: Self = Self(1 << 1);
    /// The ship's cargo was scanned.
    pub const SCAN_CARGO: Self = Self(1 << 2);
    /// The ship's outfits were scanned.
    pub const SCAN_OUTFITS: Self = Self(1 << 3);
    /// The ship was boarded.
    pub const BOARD: Self = Self(1 << 4);
    /// The ship was captured.
    pub const CAPTURE: Self = Self(1 << 5);
    /// The ship was destroyed.
    pub const DESTROY: Self = Self(1 << 6);
    /// Something so terrible happened that it ends the game.
    pub const ATROCITY: Self = Self(1 << 7);
    /// The ship was provoked into hostility.
    pub const PROVOKE: Self = Self(1 << 8);
    /// The ship jumped to another system.
    pub const JUMP: Self = Self(1 << 9);
    /// The ship was encountered for the first time.
    pub const ENCOUNTER: Self = Self(1 << 10);
    /// The ship is out of play: captured or destroyed.
    pub const KILL: Self = Self(Self::CAPTURE.0 | Self::DESTROY.0);
    /// Events only the player can cause.
    pub const PLAYER_ONLY: Self = Self(
        Self::SCAN_CARGO.0 | Self::SCAN_OUTFITS.0 | Self::ASSIST.0 | Self::BOARD.0 | Self::CAPTURE.0
            | Self::PROVOKE.0,
    );

    /// Build a set from its raw bits.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// The raw bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether no event is present.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether every event in `other` is also in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether `self` and `other` share any event.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// `self` with every event in `other` removed.
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Events present in both sets.
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Parse the NPC-header keyword for a single event, if it names one.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "assist" => Some(Self::ASSIST),
            "disable" => Some(Self::DISABLE),
            "scan cargo" => Some(Self::SCAN_CARGO),
            "scan outfits" => Some(Self::SCAN_OUTFITS),
            "board" => Some(Self::BOARD),
            "capture" => Some(Self::CAPTURE),
            "destroy" => Some(Self::DESTROY),
            "atrocity" => Some(Self::ATROCITY),
            "provoke" => Some(Self::PROVOKE),
            "jump" => Some(Self::JUMP),
            "encounter" => Some(Self::ENCOUNTER),
            "kill" => Some(Self::KILL),
            _ => None,
        }
    }
}

impl BitOr for ShipEvents {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ShipEvents {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_codes_and_tokens_agree() {
        for outcome in Outcome::ALL {
            assert!(outcome.code() < 0);
            assert_eq!(Outcome::from_code(outcome.code()), Some(outcome));
            assert_eq!(Outcome::from_token(outcome.token()), Some(outcome));
        }
        assert_eq!(Outcome::from_code(0), None);
        assert_eq!(Outcome::from_token("goto"), None);
    }

    #[test]
    fn only_three_outcomes_force_launch() {
        let launching: Vec<_> = Outcome::ALL
            .into_iter()
            .filter(|o| o.requires_launch())
            .collect();
        assert_eq!(launching, vec![Outcome::Launch, Outcome::Flee, Outcome::Depart]);
    }

    #[test]
    fn terminal_triggers() {
        assert!(MissionTrigger::Complete.is_terminal());
        assert!(MissionTrigger::Fail.is_terminal());
        assert!(MissionTrigger::Abort.is_terminal());
        assert!(!MissionTrigger::Visit.is_terminal());
        assert_eq!(MissionTrigger::from_token("stopover"), Some(MissionTrigger::Stopover));
    }

    #[test]
    fn kill_is_capture_or_destroy() {
        assert!(ShipEvents::KILL.contains(ShipEvents::CAPTURE));
        assert!(ShipEvents::KILL.contains(ShipEvents::DESTROY));
        assert!(ShipEvents::CAPTURE.intersects(ShipEvents::KILL));
        assert!(!ShipEvents::BOARD.intersects(ShipEvents::KILL));
    }

    #[test]
    fn event_masks_accumulate() {
        let mut mask = ShipEvents::NONE;
        mask |= ShipEvents::DISABLE;
        mask |= ShipEvents::BOARD;
        assert!(mask.contains(ShipEvents::DISABLE | ShipEvents::BOARD));
        assert!(!mask.contains(ShipEvents::DESTROY));
        assert_eq!(mask.without(ShipEvents::DISABLE), ShipEvents::BOARD);
    }

    #[test]
    fn location_tokens() {
        assert_eq!(MissionLocation::from_token("job board"), Some(MissionLocation::JobBoard));
        assert_eq!(MissionLocation::default(), MissionLocation::Spaceport);
    }
}
