//! Eval command handler: scores 5 to 7 cards given by name.

use crate::error::CliError;
use pokeroom_engine::cards::parse_cards;
use pokeroom_engine::hand::evaluate;
use std::io::Write;

/// Handle the eval command.
///
/// `cards` may hold one name per element or several separated by spaces or commas,
/// so both `eval AS KS QS JS TS` and `eval "AS,KS,QS,JS,TS"` work.
///
/// # Errors
///
/// `CliError::Engine` for an unknown card name, a repeated card, or a count
/// outside 5 to 7.
pub fn handle_eval_command(cards: &[String], out: &mut dyn Write) -> Result<(), CliError> {
    let parsed = parse_cards(&cards.join(" "))?;
    // a repeated card is bad input here, not a broken deck
    let eval = evaluate(&parsed).map_err(CliError::Engine)?;
    writeln!(out, "Cards: {}", crate::ui::card_list(&parsed))?;
    writeln!(out, "Category: {}", eval.category)?;
    writeln!(out, "Rank: {:.10}", eval.rank)?;
    Ok(())
}
