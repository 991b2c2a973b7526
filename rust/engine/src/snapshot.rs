use serde::{Deserialize, Serialize};

use crate::cards::Card;
use crate::player::{LastAction, Player, SeatId, SeatStatus};
use crate::pot::SidePot;
use crate::room::{Phase, Room};

/// What one viewer may see of the room. Built per viewer; never shared between seats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStateSnapshot {
    pub phase: Phase,
    pub pot: u32,
    pub current_bet: u32,
    pub dealer_index: Option<usize>,
    pub active_seat_index: Option<usize>,
    pub last_aggressor_index: Option<usize>,
    pub community_cards: Vec<Card>,
    pub players: Vec<PlayerSnapshot>,
    pub side_pots: Vec<SidePot>,
    pub small_blind: u32,
    pub big_blind: u32,
    pub hand_number: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: SeatId,
    pub name: String,
    pub chips: u32,
    pub cards: HoleCardsView,
    pub is_ready: bool,
    pub is_active: bool,
    pub current_bet: u32,
    pub last_action: LastAction,
    pub can_act: bool,
    pub status: SeatStatus,
}

/// Hole cards as one viewer sees them: the cards themselves, or only how many there are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HoleCardsView {
    Visible(Vec<Card>),
    Hidden(usize),
}

impl HoleCardsView {
    pub fn is_visible(&self) -> bool {
        matches!(self, HoleCardsView::Visible(_))
    }
}

pub(crate) fn build(room: &Room, viewer: Option<SeatId>) -> RoomStateSnapshot {
    let showdown = room.phase() == Phase::Showdown;
    let active = room.active_index();
    let players = room
        .players()
        .iter()
        .enumerate()
        .map(|(i, p)| player_view(p, viewer, showdown, active == Some(i)))
        .collect();

    RoomStateSnapshot {
        phase: room.phase(),
        pot: room.pot(),
        current_bet: room.current_bet(),
        dealer_index: room.dealer_index(),
        active_seat_index: active,
        last_aggressor_index: room.last_aggressor_index(),
        community_cards: room.community_cards().to_vec(),
        players,
        side_pots: room.side_pots().to_vec(),
        small_blind: room.config().small_blind,
        big_blind: room.config().big_blind,
        hand_number: room.hand_number(),
    }
}

fn player_view(p: &Player, viewer: Option<SeatId>, showdown: bool, can_act: bool) -> PlayerSnapshot {
    let own = viewer == Some(p.id());
    let cards = if own || (showdown && p.in_hand()) {
        HoleCardsView::Visible(p.hole_cards().to_vec())
    } else {
        HoleCardsView::Hidden(p.hole_cards().len())
    };
    PlayerSnapshot {
        id: p.id(),
        name: p.display_name().to_string(),
        chips: p.stack(),
        cards,
        is_ready: p.is_ready(),
        is_active: p.in_hand(),
        current_bet: p.street_wager(),
        last_action: p.last_action(),
        can_act,
        status: p.status(),
    }
}
