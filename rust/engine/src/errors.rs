use thiserror::Error;

use crate::cards::Card;
use crate::player::SeatId;
use crate::room::Phase;

/// Everything the engine can refuse or detect.
///
/// Two families share this enum. Protocol errors (malformed or out-of-turn intents,
/// illegal amounts) leave the room untouched and are reported only to the sender.
/// Invariant violations (see [`GameError::is_invariant_violation`]) mean the money or
/// card state can no longer be trusted; the owner of the room must stop it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("seat {0} is not at this table")]
    UnknownSeat(SeatId),
    #[error("table is full ({max} seats)")]
    TableFull { max: usize },
    #[error("display name must be 1-{max} characters")]
    InvalidName { max: usize },
    #[error("buy-in {amount} outside allowed range {min}..={max}")]
    InvalidBuyIn { amount: u32, min: u32, max: u32 },
    #[error("invalid room configuration: {0}")]
    InvalidConfig(String),
    #[error("not allowed during {phase}")]
    WrongPhase { phase: Phase },
    #[error("seat {0} is already ready")]
    AlreadyReady(SeatId),
    #[error("seat {0} has no chips")]
    Busted(SeatId),
    #[error("it is not seat {seat}'s turn")]
    NotYourTurn { seat: SeatId },
    #[error("cannot check facing {to_call} to call")]
    CannotCheck { to_call: u32 },
    #[error("nothing to call")]
    NothingToCall,
    #[error("cannot bet, there is already a bet of {current_bet}; raise instead")]
    BetNotAllowed { current_bet: u32 },
    #[error("cannot raise, there is no bet to raise")]
    NoBetToRaise,
    #[error("raise to {amount} must exceed the current bet of {current_bet}")]
    RaiseTooSmall { amount: u32, current_bet: u32 },
    #[error("amount must be a positive integer")]
    InvalidAmount,
    #[error("insufficient chips: need {required}, have {available}")]
    InsufficientChips { required: u32, available: u32 },
    #[error("malformed intent: {0}")]
    MalformedIntent(String),
    #[error("invalid card: {0:?}")]
    InvalidCard(String),
    #[error("a hand must have 5 to 7 cards, got {0}")]
    InvalidHandSize(usize),

    #[error("drew from an empty deck")]
    EmptyDeck,
    #[error("card {0} appears more than once")]
    DuplicateCard(Card),
    #[error("card ledger holds {0} cards instead of 52")]
    LedgerSize(usize),
    #[error("chips not conserved: expected {expected}, found {actual}")]
    ChipConservation { expected: u64, actual: u64 },
    #[error("pot layers total {layers} but pot holds {pot}")]
    PotMismatch { layers: u64, pot: u64 },
}

impl GameError {
    /// True for logic errors that must be fatal to the room.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            GameError::EmptyDeck
                | GameError::DuplicateCard(_)
                | GameError::LedgerSize(_)
                | GameError::ChipConservation { .. }
                | GameError::PotMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_invariant_violations() {
        assert!(GameError::EmptyDeck.is_invariant_violation());
        assert!(GameError::PotMismatch { layers: 1, pot: 2 }.is_invariant_violation());
        assert!(!GameError::NothingToCall.is_invariant_violation());
        assert!(!GameError::NotYourTurn { seat: 3 }.is_invariant_violation());
    }

    #[test]
    fn messages_carry_amounts() {
        let err = GameError::InsufficientChips {
            required: 200,
            available: 50,
        };
        assert_eq!(err.to_string(), "insufficient chips: need 200, have 50");
    }
}
