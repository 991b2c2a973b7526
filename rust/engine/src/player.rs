use crate::cards::Card;
use serde::{Deserialize, Serialize};

/// Seat identifier, allocated by the room in increasing order and never reused.
pub type SeatId = u32;

/// Where a seat stands within the current hand.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SeatStatus {
    /// Dealt in and still able to act
    Active,
    /// Gave up any claim on the pot this hand
    Folded,
    /// Whole stack committed; rides to showdown without acting
    AllIn,
    /// Not dealt in (new, busted, disconnected, or not ready)
    SittingOut,
}

/// Most recent thing a seat did on the current street, for display.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LastAction {
    #[default]
    None,
    SmallBlind,
    BigBlind,
    Check,
    Call,
    Bet,
    Raise,
    Fold,
    AllIn,
}

/// Why a seat is going away once the current hand is over.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Departure {
    /// Remove the seat and cash it out.
    Leave,
    /// Keep the seat but sit it out until the player returns.
    Disconnect,
}

/// One seat at a room. Only the room mutates it.
#[derive(Debug, Clone)]
pub struct Player {
    id: SeatId,
    display_name: String,
    stack: u32,
    hole: Vec<Card>,
    street_wager: u32,
    hand_contribution: u32,
    status: SeatStatus,
    is_ready: bool,
    has_acted: bool,
    last_action: LastAction,
    departure: Option<Departure>,
}

impl Player {
    pub fn new(id: SeatId, display_name: impl Into<String>, stack: u32) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            stack,
            hole: Vec::with_capacity(2),
            street_wager: 0,
            hand_contribution: 0,
            status: SeatStatus::SittingOut,
            is_ready: false,
            has_acted: false,
            last_action: LastAction::None,
            departure: None,
        }
    }

    pub fn id(&self) -> SeatId {
        self.id
    }
    pub fn display_name(&self) -> &str {
        &self.display_name
    }
    pub fn stack(&self) -> u32 {
        self.stack
    }
    pub fn hole_cards(&self) -> &[Card] {
        &self.hole
    }
    pub fn street_wager(&self) -> u32 {
        self.street_wager
    }
    pub fn hand_contribution(&self) -> u32 {
        self.hand_contribution
    }
    pub fn status(&self) -> SeatStatus {
        self.status
    }
    pub fn is_ready(&self) -> bool {
        self.is_ready
    }
    pub fn has_acted(&self) -> bool {
        self.has_acted
    }
    pub fn last_action(&self) -> LastAction {
        self.last_action
    }
    pub fn departure(&self) -> Option<Departure> {
        self.departure
    }

    /// Dealt into the current hand and not folded.
    pub fn in_hand(&self) -> bool {
        matches!(self.status, SeatStatus::Active | SeatStatus::AllIn)
    }

    pub fn can_bet(&self) -> bool {
        self.status == SeatStatus::Active
    }

    pub(crate) fn set_ready(&mut self) {
        self.is_ready = true;
        self.status = SeatStatus::Active;
    }

    pub(crate) fn sit_out(&mut self) {
        self.is_ready = false;
        self.status = SeatStatus::SittingOut;
    }

    pub(crate) fn set_departure(&mut self, departure: Option<Departure>) {
        self.departure = departure;
    }

    pub(crate) fn give_card(&mut self, c: Card) {
        debug_assert!(self.hole.len() < 2, "seat {} already holds two cards", self.id);
        self.hole.push(c);
    }

    /// Moves up to `chips` from the stack into the street wager and returns how many moved.
    /// A seat whose stack reaches zero is all-in.
    pub(crate) fn commit(&mut self, chips: u32) -> u32 {
        let moved = chips.min(self.stack);
        self.stack -= moved;
        self.street_wager += moved;
        self.hand_contribution += moved;
        if self.stack == 0 && self.status == SeatStatus::Active {
            self.status = SeatStatus::AllIn;
        }
        moved
    }

    pub(crate) fn record(&mut self, action: LastAction) {
        self.last_action = action;
        if !matches!(action, LastAction::SmallBlind | LastAction::BigBlind) {
            self.has_acted = true;
        }
    }

    pub(crate) fn fold(&mut self) {
        self.status = SeatStatus::Folded;
        self.record(LastAction::Fold);
    }

    /// Called on every other seat when the bet is raised: they owe a response again.
    pub(crate) fn reopen(&mut self) {
        self.has_acted = false;
    }

    /// Clears per-street state; the wager itself is collected separately.
    pub(crate) fn reset_for_street(&mut self) {
        self.street_wager = 0;
        self.has_acted = false;
        self.last_action = LastAction::None;
    }

    pub(crate) fn add_chips(&mut self, amount: u32) {
        self.stack = self.stack.saturating_add(amount);
    }

    /// Back to the lobby after a hand: cards returned, readiness cleared, busted seats
    /// sit out.
    pub(crate) fn reset_for_hand(&mut self) {
        self.hole.clear();
        self.street_wager = 0;
        self.hand_contribution = 0;
        self.is_ready = false;
        self.has_acted = false;
        self.last_action = LastAction::None;
        self.status = if self.stack == 0 || self.status == SeatStatus::SittingOut {
            SeatStatus::SittingOut
        } else {
            SeatStatus::Active
        };
    }

    pub(crate) fn start_hand(&mut self) {
        self.hole.clear();
        self.street_wager = 0;
        self.hand_contribution = 0;
        self.has_acted = false;
        self.last_action = LastAction::None;
        self.status = SeatStatus::Active;
    }
}
