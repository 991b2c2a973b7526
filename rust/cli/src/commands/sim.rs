//! Simulation command handler.
//!
//! Plays hands through a [`Room`] with every seat picking a random legal intent,
//! and checks after every action that the table still holds the 52 distinct cards
//! and after every hand that no chips appeared or vanished. Intent choices come
//! from a ChaCha stream seeded like the deck, so a seed repeats the whole run.

use crate::commands::seat_players;
use crate::config::{self, Overrides};
use crate::error::CliError;
use crate::ui;
use pokeroom_engine::intent::PlayerIntent;
use pokeroom_engine::room::{Room, RoomEvent};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::io::Write;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SimSummary {
    pub hands: u64,
    pub showdowns: u64,
    pub uncontested: u64,
    pub largest_pot: u32,
}

/// Handle the sim command: play `hands` hands with random legal intents.
///
/// Stops early, with a warning, once fewer than two seats have chips.
///
/// # Errors
///
/// `CliError::InvalidInput` when `hands` is 0, `CliError::Invariant` when a hand
/// loses track of chips or cards.
pub fn handle_sim_command(
    hands: u64,
    seed: Option<u64>,
    seats: Option<usize>,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<(), CliError> {
    if hands == 0 {
        return Err(CliError::InvalidInput("hands must be >= 1".to_string()));
    }

    let mut cfg = config::load_with_sources(Overrides { seed, seats })?.config;
    let seed = *cfg.seed.get_or_insert_with(rand::random);
    let summary = simulate(hands, &cfg, seed)?;

    if summary.hands < hands {
        ui::display_warning(
            err,
            &format!(
                "table broke after {} of {} hands: fewer than two seats have chips",
                summary.hands, hands
            ),
        )?;
    }
    writeln!(out, "Seed: {}", seed)?;
    writeln!(out, "Hands: {}", summary.hands)?;
    writeln!(out, "Showdowns: {}", summary.showdowns)?;
    writeln!(out, "Uncontested: {}", summary.uncontested)?;
    writeln!(out, "Largest pot: {}", summary.largest_pot)?;
    Ok(())
}

fn simulate(hands: u64, cfg: &config::Config, seed: u64) -> Result<SimSummary, CliError> {
    let mut room = Room::new(cfg.room_config())?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let chips = room_chips(cfg);
    let mut summary = SimSummary::default();

    let mut events = seat_players(&mut room, cfg.seats, cfg.starting_stack)?;
    while summary.hands < hands {
        if !room.phase().is_betting() {
            break;
        }
        room.audit_ledger()?;
        while room.phase().is_betting() {
            let Some(seat) = room.active_seat() else {
                break;
            };
            let legal = room.legal_intents(seat);
            if legal.is_empty() {
                return Err(CliError::Invariant(format!(
                    "seat {seat} is to act with no legal intent"
                )));
            }
            let intent = legal[rng.random_range(0..legal.len())];
            events.extend(room.apply(seat, intent)?);
            if room.phase().is_betting() {
                room.audit_ledger()?;
            }
        }

        summary.hands += 1;
        record_hand(&mut summary, &events);
        if room.total_chips() != chips {
            return Err(CliError::Invariant(format!(
                "hand {} ended with {} chips at a {} chip table",
                room.hand_number(),
                room.total_chips(),
                chips
            )));
        }

        events = ready_funded_seats(&mut room)?;
    }
    Ok(summary)
}

fn room_chips(cfg: &config::Config) -> u64 {
    u64::from(cfg.starting_stack) * cfg.seats as u64
}

fn record_hand(summary: &mut SimSummary, events: &[RoomEvent]) {
    let mut pot = 0u32;
    let mut showdown = false;
    let mut uncontested = false;
    for event in events {
        match event {
            RoomEvent::Showdown { .. } => showdown = true,
            RoomEvent::PotAwarded {
                amount,
                uncontested: alone,
                ..
            } => {
                pot += amount;
                uncontested |= *alone;
            }
            _ => {}
        }
    }
    if showdown {
        summary.showdowns += 1;
    }
    if uncontested && !showdown {
        summary.uncontested += 1;
    }
    summary.largest_pot = summary.largest_pot.max(pot);
}

/// Readies every seat with chips; the last `ready` deals the next hand when at
/// least two are left.
fn ready_funded_seats(room: &mut Room) -> Result<Vec<RoomEvent>, CliError> {
    let funded: Vec<_> = room
        .players()
        .iter()
        .filter(|p| p.stack() > 0)
        .map(|p| p.id())
        .collect();
    let mut events = Vec::new();
    if funded.len() < 2 {
        return Ok(events);
    }
    for id in funded {
        events.extend(room.apply(id, PlayerIntent::Ready)?);
    }
    Ok(events)
}
