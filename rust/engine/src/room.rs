use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cards::Card;
use crate::deck::Deck;
use crate::errors::GameError;
use crate::hand::evaluate;
use crate::intent::PlayerIntent;
use crate::player::{Departure, LastAction, Player, SeatId, SeatStatus};
use crate::pot::{award_uncontested, build_pots, distribute, verify_pots, Contribution, Payout, SidePot};
use crate::rules::{validate_action, ValidatedAction};
use crate::snapshot::{self, RoomStateSnapshot};

/// Longest display name a seat may use, in characters.
pub const MAX_NAME_LEN: usize = 24;

/// Where the room is in the hand cycle.
///
/// `Preflop` through `River` are the betting states. `Dealing` and `Showdown` are
/// passed through synchronously and are observable only in events emitted on the way.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Waiting,
    Dealing,
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
}

impl Phase {
    pub fn is_betting(self) -> bool {
        matches!(self, Phase::Preflop | Phase::Flop | Phase::Turn | Phase::River)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Waiting => "waiting",
            Phase::Dealing => "dealing",
            Phase::Preflop => "preflop",
            Phase::Flop => "flop",
            Phase::Turn => "turn",
            Phase::River => "river",
            Phase::Showdown => "showdown",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Table stakes and limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    pub small_blind: u32,
    pub big_blind: u32,
    pub max_seats: usize,
    pub min_buy_in: u32,
    pub max_buy_in: u32,
    /// Hand `n` is shuffled with `seed + n` when set.
    pub seed: Option<u64>,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            small_blind: 5,
            big_blind: 10,
            max_seats: 6,
            min_buy_in: 100,
            max_buy_in: 10_000,
            seed: None,
        }
    }
}

impl RoomConfig {
    pub fn validate(&self) -> Result<(), GameError> {
        let fail = |msg: String| Err(GameError::InvalidConfig(msg));
        if self.small_blind == 0 {
            return fail("small_blind must be positive".into());
        }
        if self.big_blind <= self.small_blind {
            return fail(format!(
                "big_blind ({}) must exceed small_blind ({})",
                self.big_blind, self.small_blind
            ));
        }
        if !(2..=10).contains(&self.max_seats) {
            return fail(format!("max_seats must be 2-10, got {}", self.max_seats));
        }
        if self.min_buy_in > self.max_buy_in {
            return fail(format!(
                "min_buy_in ({}) exceeds max_buy_in ({})",
                self.min_buy_in, self.max_buy_in
            ));
        }
        if self.min_buy_in < self.big_blind {
            return fail(format!(
                "min_buy_in ({}) is below big_blind ({})",
                self.min_buy_in, self.big_blind
            ));
        }
        if u64::from(self.max_buy_in) * self.max_seats as u64 > u64::from(u32::MAX) {
            return fail("a full table at max_buy_in would overflow chip counts".into());
        }
        Ok(())
    }
}

/// A hand revealed at showdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealedHand {
    pub seat_id: SeatId,
    pub cards: Vec<Card>,
    pub category: String,
    pub rank: f64,
}

/// Something that happened in the room, in order. Hole cards only ever appear in
/// [`RoomEvent::Showdown`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoomEvent {
    #[serde(rename_all = "camelCase")]
    SeatJoined {
        seat_id: SeatId,
        display_name: String,
        chips: u32,
    },
    #[serde(rename_all = "camelCase")]
    SeatLeft { seat_id: SeatId, chips: u32 },
    #[serde(rename_all = "camelCase")]
    SeatSatOut { seat_id: SeatId },
    #[serde(rename_all = "camelCase")]
    PlayerReady { seat_id: SeatId },
    #[serde(rename_all = "camelCase")]
    HandStarted {
        hand_number: u64,
        dealer_seat_id: SeatId,
        seat_ids: Vec<SeatId>,
    },
    #[serde(rename_all = "camelCase")]
    BlindPosted {
        seat_id: SeatId,
        blind: LastAction,
        amount: u32,
    },
    #[serde(rename_all = "camelCase")]
    ActionTaken {
        seat_id: SeatId,
        action: LastAction,
        /// Chips that left the stack.
        amount: u32,
        /// Played by the room for a departing or timed-out seat.
        automatic: bool,
    },
    #[serde(rename_all = "camelCase")]
    StreetDealt { phase: Phase, cards: Vec<Card> },
    #[serde(rename_all = "camelCase")]
    Showdown {
        snapshot: Box<RoomStateSnapshot>,
        hands: Vec<RevealedHand>,
    },
    #[serde(rename_all = "camelCase")]
    PotAwarded {
        seat_id: SeatId,
        amount: u32,
        pot_index: usize,
        uncontested: bool,
    },
    #[serde(rename_all = "camelCase")]
    HandEnded { hand_number: u64 },
}

/// The authoritative state of one table.
///
/// All mutation goes through `&mut self`, so a single owner serializes every change.
/// Methods that reject a request return `Err` before touching anything. Methods that
/// detect an invariant violation (see [`GameError::is_invariant_violation`]) leave the
/// room in an unusable state and the owner must stop it.
///
/// # Examples
///
/// ```
/// use pokeroom_engine::intent::PlayerIntent;
/// use pokeroom_engine::room::{Phase, Room, RoomConfig};
///
/// let mut room = Room::new(RoomConfig { seed: Some(1), ..RoomConfig::default() }).unwrap();
/// let (a, _) = room.join("ann", 1000).unwrap();
/// let (b, _) = room.join("bob", 1000).unwrap();
/// room.apply(a, PlayerIntent::Ready).unwrap();
/// room.apply(b, PlayerIntent::Ready).unwrap();
/// assert_eq!(room.phase(), Phase::Preflop);
/// assert_eq!(room.pot() + room.players().iter().map(|p| p.street_wager()).sum::<u32>(), 15);
/// ```
#[derive(Debug, Clone)]
pub struct Room {
    config: RoomConfig,
    players: Vec<Player>,
    next_seat_id: SeatId,
    deck: Option<Deck>,
    community: Vec<Card>,
    burn: Vec<Card>,
    pot: u32,
    current_bet: u32,
    side_pots: Vec<SidePot>,
    dealer_seat: Option<SeatId>,
    active_index: Option<usize>,
    last_aggressor: Option<usize>,
    phase: Phase,
    hand_number: u64,
    chips_at_start: u64,
}

impl Room {
    pub fn new(config: RoomConfig) -> Result<Self, GameError> {
        config.validate()?;
        Ok(Self {
            config,
            players: Vec::new(),
            next_seat_id: 1,
            deck: None,
            community: Vec::with_capacity(5),
            burn: Vec::with_capacity(3),
            pot: 0,
            current_bet: 0,
            side_pots: Vec::new(),
            dealer_seat: None,
            active_index: None,
            last_aggressor: None,
            phase: Phase::Waiting,
            hand_number: 0,
            chips_at_start: 0,
        })
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }
    pub fn phase(&self) -> Phase {
        self.phase
    }
    pub fn players(&self) -> &[Player] {
        &self.players
    }
    pub fn player(&self, seat: SeatId) -> Option<&Player> {
        self.players.iter().find(|p| p.id() == seat)
    }
    pub fn pot(&self) -> u32 {
        self.pot
    }
    pub fn current_bet(&self) -> u32 {
        self.current_bet
    }
    pub fn community_cards(&self) -> &[Card] {
        &self.community
    }
    pub fn burn_pile(&self) -> &[Card] {
        &self.burn
    }
    pub fn side_pots(&self) -> &[SidePot] {
        &self.side_pots
    }
    pub fn hand_number(&self) -> u64 {
        self.hand_number
    }
    pub fn active_index(&self) -> Option<usize> {
        self.active_index
    }
    pub fn last_aggressor_index(&self) -> Option<usize> {
        self.last_aggressor
    }

    pub fn dealer_index(&self) -> Option<usize> {
        let seat = self.dealer_seat?;
        self.index_of(seat).ok()
    }

    /// Seat whose turn it is, if any.
    pub fn active_seat(&self) -> Option<SeatId> {
        self.active_index.map(|i| self.players[i].id())
    }

    /// All chips at the table: stacks, open wagers and the pot.
    pub fn total_chips(&self) -> u64 {
        let seats: u64 = self
            .players
            .iter()
            .map(|p| u64::from(p.stack()) + u64::from(p.street_wager()))
            .sum();
        seats + u64::from(self.pot)
    }

    pub fn snapshot_for(&self, viewer: Option<SeatId>) -> RoomStateSnapshot {
        snapshot::build(self, viewer)
    }

    /// Every card the current hand accounts for: deck, hole cards, board and burn pile.
    /// Empty between hands.
    pub fn card_ledger(&self) -> Vec<Card> {
        let Some(deck) = &self.deck else {
            return Vec::new();
        };
        let mut all: Vec<Card> = deck.cards().to_vec();
        for p in &self.players {
            all.extend_from_slice(p.hole_cards());
        }
        all.extend_from_slice(&self.community);
        all.extend_from_slice(&self.burn);
        all
    }

    /// Checks the ledger holds the 52 distinct cards.
    pub fn audit_ledger(&self) -> Result<(), GameError> {
        let ledger = self.card_ledger();
        let mut seen = HashSet::with_capacity(52);
        for c in &ledger {
            if !seen.insert(*c) {
                return Err(GameError::DuplicateCard(*c));
            }
        }
        if ledger.len() != 52 {
            return Err(GameError::LedgerSize(ledger.len()));
        }
        Ok(())
    }

    /// Seats a new player. The seat starts sitting out until it sends `ready`.
    pub fn join(
        &mut self,
        display_name: &str,
        starting_chips: u32,
    ) -> Result<(SeatId, Vec<RoomEvent>), GameError> {
        let name = display_name.trim();
        if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Err(GameError::InvalidName { max: MAX_NAME_LEN });
        }
        if starting_chips < self.config.min_buy_in || starting_chips > self.config.max_buy_in {
            return Err(GameError::InvalidBuyIn {
                amount: starting_chips,
                min: self.config.min_buy_in,
                max: self.config.max_buy_in,
            });
        }
        if self.players.len() >= self.config.max_seats {
            return Err(GameError::TableFull {
                max: self.config.max_seats,
            });
        }

        let id = self.next_seat_id;
        self.next_seat_id += 1;
        self.players.push(Player::new(id, name, starting_chips));
        // the hand in progress closes against the table total including this buy-in
        if self.phase != Phase::Waiting {
            self.chips_at_start += u64::from(starting_chips);
        }
        Ok((
            id,
            vec![RoomEvent::SeatJoined {
                seat_id: id,
                display_name: name.to_string(),
                chips: starting_chips,
            }],
        ))
    }

    /// Removes a seat. During a hand the seat folds if it is its turn, otherwise it is
    /// marked to leave and folds when its turn comes; removal happens when the hand ends.
    pub fn leave(&mut self, seat: SeatId) -> Result<Vec<RoomEvent>, GameError> {
        self.depart(seat, Departure::Leave)
    }

    /// Like [`Room::leave`] but the seat stays at the table, sitting out.
    pub fn disconnect(&mut self, seat: SeatId) -> Result<Vec<RoomEvent>, GameError> {
        self.depart(seat, Departure::Disconnect)
    }

    /// Cancels a pending disconnect. A seat already sat out must send `ready` again.
    pub fn reconnect(&mut self, seat: SeatId) -> Result<Vec<RoomEvent>, GameError> {
        let idx = self.index_of(seat)?;
        if self.players[idx].departure() == Some(Departure::Disconnect) {
            self.players[idx].set_departure(None);
        }
        Ok(Vec::new())
    }

    /// Applies one intent from `seat`.
    pub fn apply(&mut self, seat: SeatId, intent: PlayerIntent) -> Result<Vec<RoomEvent>, GameError> {
        let idx = self.index_of(seat)?;
        if intent == PlayerIntent::Ready {
            return self.ready(idx);
        }
        if !self.phase.is_betting() {
            return Err(GameError::WrongPhase { phase: self.phase });
        }
        if self.active_index != Some(idx) {
            return Err(GameError::NotYourTurn { seat });
        }
        let p = &self.players[idx];
        let action = validate_action(p.stack(), p.street_wager(), self.current_bet, intent)?;

        let mut events = Vec::new();
        self.execute(idx, action, false, &mut events);
        self.progress(idx, &mut events)?;
        Ok(events)
    }

    /// Action clock expiry: the seat to act checks when it can, otherwise folds.
    pub fn apply_timeout(&mut self) -> Result<Vec<RoomEvent>, GameError> {
        let Some(idx) = self.active_index.filter(|_| self.phase.is_betting()) else {
            return Ok(Vec::new());
        };
        let action = if self.players[idx].street_wager() >= self.current_bet {
            ValidatedAction::Check
        } else {
            ValidatedAction::Fold
        };
        let mut events = Vec::new();
        self.execute(idx, action, true, &mut events);
        self.progress(idx, &mut events)?;
        Ok(events)
    }

    /// A representative set of intents `seat` may legally send right now.
    pub fn legal_intents(&self, seat: SeatId) -> Vec<PlayerIntent> {
        let Ok(idx) = self.index_of(seat) else {
            return Vec::new();
        };
        let p = &self.players[idx];
        if self.phase == Phase::Waiting {
            if !p.is_ready() && p.stack() > 0 {
                return vec![PlayerIntent::Ready];
            }
            return Vec::new();
        }
        if !self.phase.is_betting() || self.active_index != Some(idx) {
            return Vec::new();
        }

        let bb = self.config.big_blind;
        let mut candidates = vec![PlayerIntent::Fold, PlayerIntent::Check, PlayerIntent::Call];
        if self.current_bet == 0 {
            candidates.push(PlayerIntent::Bet { amount: bb.min(p.stack()) });
            candidates.push(PlayerIntent::Bet { amount: p.stack() });
        } else {
            let all_in_to = p.stack() + p.street_wager();
            candidates.push(PlayerIntent::Raise {
                amount: (self.current_bet + bb).min(all_in_to),
            });
            candidates.push(PlayerIntent::Raise { amount: all_in_to });
        }
        let mut legal: Vec<PlayerIntent> = Vec::new();
        for intent in candidates {
            if validate_action(p.stack(), p.street_wager(), self.current_bet, intent).is_ok()
                && !legal.contains(&intent)
            {
                legal.push(intent);
            }
        }
        legal
    }

    fn index_of(&self, seat: SeatId) -> Result<usize, GameError> {
        self.players
            .iter()
            .position(|p| p.id() == seat)
            .ok_or(GameError::UnknownSeat(seat))
    }

    fn ready(&mut self, idx: usize) -> Result<Vec<RoomEvent>, GameError> {
        if self.phase != Phase::Waiting {
            return Err(GameError::WrongPhase { phase: self.phase });
        }
        let p = &mut self.players[idx];
        if p.is_ready() {
            return Err(GameError::AlreadyReady(p.id()));
        }
        if p.stack() == 0 {
            return Err(GameError::Busted(p.id()));
        }
        p.set_ready();
        let mut events = vec![RoomEvent::PlayerReady { seat_id: p.id() }];
        self.try_start(&mut events)?;
        Ok(events)
    }

    fn depart(&mut self, seat: SeatId, departure: Departure) -> Result<Vec<RoomEvent>, GameError> {
        let idx = self.index_of(seat)?;
        let mut events = Vec::new();

        if self.phase == Phase::Waiting {
            match departure {
                Departure::Leave => {
                    let p = self.players.remove(idx);
                    events.push(RoomEvent::SeatLeft {
                        seat_id: p.id(),
                        chips: p.stack(),
                    });
                }
                Departure::Disconnect => {
                    self.players[idx].sit_out();
                    events.push(RoomEvent::SeatSatOut { seat_id: seat });
                }
            }
            self.try_start(&mut events)?;
            return Ok(events);
        }

        self.players[idx].set_departure(Some(departure));
        if self.active_index == Some(idx) {
            self.execute(idx, ValidatedAction::Fold, true, &mut events);
            self.progress(idx, &mut events)?;
        }
        Ok(events)
    }

    /// WAITING -> DEALING once every seat that is not sitting out is ready, with at
    /// least two of them.
    fn try_start(&mut self, events: &mut Vec<RoomEvent>) -> Result<(), GameError> {
        if self.phase != Phase::Waiting {
            return Ok(());
        }
        let seated: Vec<&Player> = self
            .players
            .iter()
            .filter(|p| p.status() != SeatStatus::SittingOut)
            .collect();
        if seated.len() < 2 || !seated.iter().all(|p| p.is_ready()) {
            return Ok(());
        }
        self.start_hand(events)
    }

    fn start_hand(&mut self, events: &mut Vec<RoomEvent>) -> Result<(), GameError> {
        self.hand_number += 1;
        self.phase = Phase::Dealing;
        self.chips_at_start = self.total_chips();
        let seed = self.config.seed.map(|s| s.wrapping_add(self.hand_number));
        self.deck = Some(Deck::new_shuffled(seed));
        self.community.clear();
        self.burn.clear();
        self.pot = 0;
        self.current_bet = 0;
        self.side_pots.clear();
        self.last_aggressor = None;
        self.active_index = None;

        let participants: Vec<usize> = (0..self.players.len())
            .filter(|&i| self.players[i].status() == SeatStatus::Active)
            .collect();
        for &i in &participants {
            self.players[i].start_hand();
        }

        let dealer = self.rotate_button(&participants);
        let dealer_seat = self.players[dealer].id();
        self.dealer_seat = Some(dealer_seat);
        events.push(RoomEvent::HandStarted {
            hand_number: self.hand_number,
            dealer_seat_id: dealer_seat,
            seat_ids: participants.iter().map(|&i| self.players[i].id()).collect(),
        });

        // two passes, one card each, starting left of the button
        let order = self.order_after(dealer, &participants);
        for _ in 0..2 {
            for &i in &order {
                let card = self.draw()?;
                self.players[i].give_card(card);
            }
        }
        self.audit_ledger()?;

        let (sb, bb) = if participants.len() == 2 {
            (dealer, order[0])
        } else {
            (order[0], order[1])
        };
        self.post_blind(sb, self.config.small_blind, LastAction::SmallBlind, events);
        self.post_blind(bb, self.config.big_blind, LastAction::BigBlind, events);
        self.current_bet = self.config.big_blind;

        self.phase = Phase::Preflop;
        self.progress(bb, events)
    }

    /// First hand: the first participant. Afterwards: the next participant after the
    /// previous button.
    fn rotate_button(&self, participants: &[usize]) -> usize {
        let first = participants[0];
        let Some(prev) = self.dealer_seat else {
            return first;
        };
        participants
            .iter()
            .copied()
            .find(|&i| self.players[i].id() > prev)
            .unwrap_or(first)
    }

    /// `subset` reordered to start with the first member after `from`, clockwise.
    fn order_after(&self, from: usize, subset: &[usize]) -> Vec<usize> {
        let n = self.players.len();
        (1..=n)
            .map(|k| (from + k) % n)
            .filter(|i| subset.contains(i))
            .collect()
    }

    fn post_blind(&mut self, idx: usize, amount: u32, blind: LastAction, events: &mut Vec<RoomEvent>) {
        let p = &mut self.players[idx];
        let posted = p.commit(amount);
        p.record(blind);
        events.push(RoomEvent::BlindPosted {
            seat_id: p.id(),
            blind,
            amount: posted,
        });
    }

    fn draw(&mut self) -> Result<Card, GameError> {
        self.deck.as_mut().ok_or(GameError::EmptyDeck)?.draw()
    }

    fn execute(&mut self, idx: usize, action: ValidatedAction, automatic: bool, events: &mut Vec<RoomEvent>) {
        let chips = action.chips();
        let p = &mut self.players[idx];
        let label = match action {
            ValidatedAction::Fold => {
                p.fold();
                LastAction::Fold
            }
            ValidatedAction::Check => LastAction::Check,
            ValidatedAction::Call(c) => {
                p.commit(c);
                LastAction::Call
            }
            ValidatedAction::Bet(c) => {
                p.commit(c);
                LastAction::Bet
            }
            ValidatedAction::Raise { chips, .. } => {
                p.commit(chips);
                LastAction::Raise
            }
        };
        let label = if p.status() == SeatStatus::AllIn && label != LastAction::Fold {
            LastAction::AllIn
        } else {
            label
        };
        if label != LastAction::Fold {
            p.record(label);
        }
        let seat_id = p.id();
        let wager = p.street_wager();

        if wager > self.current_bet {
            self.current_bet = wager;
            self.last_aggressor = Some(idx);
            for (i, other) in self.players.iter_mut().enumerate() {
                if i != idx {
                    other.reopen();
                }
            }
        }
        events.push(RoomEvent::ActionTaken {
            seat_id,
            action: label,
            amount: chips,
            automatic,
        });
    }

    /// Moves the turn on from `from`, closing streets, running the board out and
    /// settling as required.
    fn progress(&mut self, from: usize, events: &mut Vec<RoomEvent>) -> Result<(), GameError> {
        let mut cursor = from;
        loop {
            if self.players.iter().filter(|p| p.in_hand()).count() == 1 {
                return self.finish_uncontested(events);
            }

            match self.next_to_act(cursor) {
                Some(idx) if !self.round_closed() => {
                    if self.players[idx].departure().is_some() {
                        self.execute(idx, ValidatedAction::Fold, true, events);
                        cursor = idx;
                        continue;
                    }
                    self.active_index = Some(idx);
                    return Ok(());
                }
                _ => {
                    self.close_street()?;
                    if self.phase == Phase::River {
                        return self.showdown(events);
                    }
                    self.deal_street(events)?;
                    cursor = self.dealer_index().unwrap_or(0);
                }
            }
        }
    }

    /// Next seat clockwise from `from` that can bet and still owes a decision.
    fn next_to_act(&self, from: usize) -> Option<usize> {
        let n = self.players.len();
        (1..=n).map(|k| (from + k) % n).find(|&i| {
            let p = &self.players[i];
            p.can_bet() && (!p.has_acted() || p.street_wager() < self.current_bet)
        })
    }

    fn round_closed(&self) -> bool {
        let active: Vec<&Player> = self.players.iter().filter(|p| p.can_bet()).collect();
        match active.as_slice() {
            [] => true,
            // nobody left to bet against
            [only] => only.street_wager() >= self.current_bet,
            _ => active
                .iter()
                .all(|p| p.has_acted() && p.street_wager() == self.current_bet),
        }
    }

    /// Sweeps street wagers into the pot and recomputes the layers.
    fn close_street(&mut self) -> Result<(), GameError> {
        for p in &mut self.players {
            self.pot += p.street_wager();
            p.reset_for_street();
        }
        self.current_bet = 0;
        self.last_aggressor = None;
        self.active_index = None;
        self.side_pots = build_pots(&self.contributions());
        verify_pots(&self.side_pots, self.pot)
    }

    fn contributions(&self) -> Vec<Contribution> {
        self.players
            .iter()
            .filter(|p| !p.hole_cards().is_empty())
            .map(|p| Contribution {
                seat: p.id(),
                amount: p.hand_contribution(),
                folded: p.status() == SeatStatus::Folded,
                all_in: p.status() == SeatStatus::AllIn,
            })
            .collect()
    }

    fn deal_street(&mut self, events: &mut Vec<RoomEvent>) -> Result<(), GameError> {
        let (next, count) = match self.phase {
            Phase::Preflop => (Phase::Flop, 3),
            Phase::Flop => (Phase::Turn, 1),
            Phase::Turn => (Phase::River, 1),
            other => return Err(GameError::WrongPhase { phase: other }),
        };
        let burned = self.draw()?;
        self.burn.push(burned);
        let mut cards = Vec::with_capacity(count);
        for _ in 0..count {
            cards.push(self.draw()?);
        }
        self.community.extend_from_slice(&cards);
        self.audit_ledger()?;
        self.phase = next;
        events.push(RoomEvent::StreetDealt { phase: next, cards });
        Ok(())
    }

    fn showdown(&mut self, events: &mut Vec<RoomEvent>) -> Result<(), GameError> {
        self.phase = Phase::Showdown;
        let mut revealed = Vec::new();
        for p in self.players.iter().filter(|p| p.in_hand()) {
            let mut cards = p.hole_cards().to_vec();
            cards.extend_from_slice(&self.community);
            let eval = evaluate(&cards)?;
            revealed.push((p.id(), eval));
        }

        let dealer = self.dealer_index().unwrap_or(0);
        let everyone: Vec<usize> = (0..self.players.len()).collect();
        let order: Vec<SeatId> = self
            .order_after(dealer, &everyone)
            .into_iter()
            .map(|i| self.players[i].id())
            .collect();
        let payouts = distribute(&self.side_pots, &order, |seat| {
            revealed
                .iter()
                .find(|(s, _)| *s == seat)
                .map(|(_, e)| e.strength)
        });

        let hands = revealed
            .into_iter()
            .map(|(seat_id, eval)| RevealedHand {
                seat_id,
                cards: self
                    .player(seat_id)
                    .map(|p| p.hole_cards().to_vec())
                    .unwrap_or_default(),
                category: eval.category,
                rank: eval.rank,
            })
            .collect();
        events.push(RoomEvent::Showdown {
            snapshot: Box::new(self.snapshot_for(None)),
            hands,
        });

        self.pay(&payouts, false, events)?;
        self.end_hand(events)
    }

    fn finish_uncontested(&mut self, events: &mut Vec<RoomEvent>) -> Result<(), GameError> {
        self.close_street()?;
        let Some(winner) = self.players.iter().find(|p| p.in_hand()).map(|p| p.id()) else {
            return Ok(());
        };
        let payouts = award_uncontested(&self.side_pots, winner);
        self.pay(&payouts, true, events)?;
        self.end_hand(events)
    }

    fn pay(&mut self, payouts: &[Payout], uncontested: bool, events: &mut Vec<RoomEvent>) -> Result<(), GameError> {
        for payout in payouts {
            let idx = self.index_of(payout.seat_id)?;
            self.players[idx].add_chips(payout.amount);
            self.pot = self.pot.saturating_sub(payout.amount);
            events.push(RoomEvent::PotAwarded {
                seat_id: payout.seat_id,
                amount: payout.amount,
                pot_index: payout.pot_index,
                uncontested,
            });
        }
        Ok(())
    }

    /// Checks conservation, resets seats, applies departures and returns to WAITING.
    fn end_hand(&mut self, events: &mut Vec<RoomEvent>) -> Result<(), GameError> {
        let after = self.total_chips();
        if after != self.chips_at_start || self.pot != 0 {
            return Err(GameError::ChipConservation {
                expected: self.chips_at_start,
                actual: after - u64::from(self.pot),
            });
        }

        for p in &mut self.players {
            p.reset_for_hand();
            if p.departure() == Some(Departure::Disconnect) {
                p.sit_out();
                p.set_departure(None);
                events.push(RoomEvent::SeatSatOut { seat_id: p.id() });
            }
        }
        let mut i = 0;
        while i < self.players.len() {
            if self.players[i].departure() == Some(Departure::Leave) {
                let p = self.players.remove(i);
                events.push(RoomEvent::SeatLeft {
                    seat_id: p.id(),
                    chips: p.stack(),
                });
            } else {
                i += 1;
            }
        }

        self.deck = None;
        self.community.clear();
        self.burn.clear();
        self.side_pots.clear();
        self.current_bet = 0;
        self.active_index = None;
        self.last_aggressor = None;
        self.phase = Phase::Waiting;
        events.push(RoomEvent::HandEnded {
            hand_number: self.hand_number,
        });
        Ok(())
    }
}
