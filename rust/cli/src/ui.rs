//! Terminal output helpers shared by the command handlers.

use pokeroom_engine::cards::Card;
use std::io::Write;

pub fn write_error(err: &mut dyn Write, msg: &str) -> std::io::Result<()> {
    writeln!(err, "Error: {}", msg)
}

/// Display a warning message to stderr with "WARNING:" prefix
pub fn display_warning(err: &mut dyn Write, message: &str) -> std::io::Result<()> {
    writeln!(err, "WARNING: {}", message)
}

/// Space-separated canonical card names, e.g. `AS TD 2H`.
pub fn card_list(cards: &[Card]) -> String {
    cards
        .iter()
        .map(Card::name)
        .collect::<Vec<_>>()
        .join(" ")
}
