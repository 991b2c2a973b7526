//! Command handler modules for the pokeroom CLI.
//!
//! Each command lives in its own module with the same shape:
//!
//! - Public handler function: `pub fn handle_COMMAND_command(...) -> Result<(), CliError>`
//! - Output streams (`&mut dyn Write`) passed in, so tests can capture them
//! - Errors propagated via `CliError`

pub mod cfg;
pub mod deal;
pub mod eval;
pub mod sim;

pub use cfg::handle_cfg_command;
pub use deal::handle_deal_command;
pub use eval::handle_eval_command;
pub use sim::handle_sim_command;

use pokeroom_engine::errors::GameError;
use pokeroom_engine::intent::PlayerIntent;
use pokeroom_engine::room::{Room, RoomEvent};

/// Joins `seats` players named `p1`, `p2`, ... and readies them all, which deals
/// the first hand.
pub(crate) fn seat_players(
    room: &mut Room,
    seats: usize,
    starting_stack: u32,
) -> Result<Vec<RoomEvent>, GameError> {
    let mut events = Vec::new();
    let mut ids = Vec::with_capacity(seats);
    for n in 1..=seats {
        let (id, joined) = room.join(&format!("p{n}"), starting_stack)?;
        ids.push(id);
        events.extend(joined);
    }
    for id in ids {
        events.extend(room.apply(id, PlayerIntent::Ready)?);
    }
    Ok(events)
}

/// Plays the current hand to its end, every seat checking when it can and calling
/// otherwise.
pub(crate) fn run_out_with_checks(room: &mut Room) -> Result<Vec<RoomEvent>, GameError> {
    let mut events = Vec::new();
    while room.phase().is_betting() {
        let Some(seat) = room.active_seat() else {
            break;
        };
        let legal = room.legal_intents(seat);
        let intent = [PlayerIntent::Check, PlayerIntent::Call]
            .into_iter()
            .find(|i| legal.contains(i))
            .unwrap_or(PlayerIntent::Fold);
        events.extend(room.apply(seat, intent)?);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pokeroom_engine::room::{Phase, RoomConfig};

    #[test]
    fn checked_down_hand_deals_the_whole_board() {
        let mut room = Room::new(RoomConfig {
            seed: Some(4),
            ..RoomConfig::default()
        })
        .unwrap();
        let started = seat_players(&mut room, 4, 500).unwrap();
        assert!(started
            .iter()
            .any(|e| matches!(e, RoomEvent::HandStarted { .. })));
        assert_eq!(room.phase(), Phase::Preflop);

        let events = run_out_with_checks(&mut room).unwrap();
        let streets = events
            .iter()
            .filter(|e| matches!(e, RoomEvent::StreetDealt { .. }))
            .count();
        assert_eq!(streets, 3);
        assert!(events.iter().any(|e| matches!(e, RoomEvent::Showdown { .. })));
        assert_eq!(room.phase(), Phase::Waiting);
        assert_eq!(room.total_chips(), 2000);
    }
}
