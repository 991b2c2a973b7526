//! Deal command handler.
//!
//! Seats the configured number of players, readies them so the room deals a hand,
//! prints every seat's hole cards, then checks (or calls) the hand down and prints
//! the board it ran out.

use crate::commands::{run_out_with_checks, seat_players};
use crate::config::{self, Overrides};
use crate::error::CliError;
use crate::ui;
use pokeroom_engine::room::{Room, RoomEvent};
use std::io::Write;

/// Handle the deal command.
///
/// Without a seed (flag, `POKEROOM_SEED` or config file) a random one is drawn and
/// printed so the deal can be repeated.
pub fn handle_deal_command(
    seed: Option<u64>,
    seats: Option<usize>,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let mut cfg = config::load_with_sources(Overrides { seed, seats })?.config;
    let seed = *cfg.seed.get_or_insert_with(rand::random);

    let mut room = Room::new(cfg.room_config())?;
    let mut events = seat_players(&mut room, cfg.seats, cfg.starting_stack)?;

    writeln!(out, "Seed: {}", seed)?;
    writeln!(out, "Hand #{}", room.hand_number())?;
    for p in room.players() {
        writeln!(
            out,
            "Seat {} ({}): {}",
            p.id(),
            p.display_name(),
            ui::card_list(p.hole_cards())
        )?;
    }

    events.extend(run_out_with_checks(&mut room)?);
    let board: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            RoomEvent::StreetDealt { cards, .. } => Some(cards.iter().copied()),
            _ => None,
        })
        .flatten()
        .collect();
    writeln!(out, "Board: {}", ui::card_list(&board))?;
    Ok(())
}
