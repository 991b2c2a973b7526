use crate::errors::GameError;
use crate::intent::PlayerIntent as I;

/// A betting intent checked against the acting seat's chips and the street's bet.
/// Amounts are chips that leave the stack, except `Raise::to` which is the street total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatedAction {
    Fold,
    Check,
    /// Chips moved to call; less than the amount owed when the stack is short.
    Call(u32),
    Bet(u32),
    Raise { to: u32, chips: u32 },
}

impl ValidatedAction {
    /// Chips this action takes from the stack.
    pub fn chips(&self) -> u32 {
        match self {
            ValidatedAction::Fold | ValidatedAction::Check => 0,
            ValidatedAction::Call(c) | ValidatedAction::Bet(c) => *c,
            ValidatedAction::Raise { chips, .. } => *chips,
        }
    }
}

/// Validates a betting intent for a seat holding `stack` chips that has already put
/// `wager` into a street whose highest wager is `current_bet`.
///
/// # Errors
///
/// - [`GameError::CannotCheck`] - check while facing a bet
/// - [`GameError::NothingToCall`] - call with nothing owed
/// - [`GameError::BetNotAllowed`] - bet after the street was opened
/// - [`GameError::NoBetToRaise`] - raise on an unopened street
/// - [`GameError::RaiseTooSmall`] - raise-to not above the current bet
/// - [`GameError::InvalidAmount`] - zero amount
/// - [`GameError::InsufficientChips`] - bet or raise beyond the stack
/// - [`GameError::MalformedIntent`] - `ready` is not a betting action
///
/// # Examples
///
/// ```
/// use pokeroom_engine::intent::PlayerIntent;
/// use pokeroom_engine::rules::{validate_action, ValidatedAction};
///
/// // Short stack calls all-in for less
/// let result = validate_action(30, 0, 50, PlayerIntent::Call);
/// assert_eq!(result, Ok(ValidatedAction::Call(30)));
///
/// // Raise to 100 having already put 20 in
/// let result = validate_action(500, 20, 40, PlayerIntent::Raise { amount: 100 });
/// assert_eq!(result, Ok(ValidatedAction::Raise { to: 100, chips: 80 }));
/// ```
pub fn validate_action(
    stack: u32,
    wager: u32,
    current_bet: u32,
    intent: I,
) -> Result<ValidatedAction, GameError> {
    let to_call = current_bet.saturating_sub(wager);
    match intent {
        I::Ready => Err(GameError::MalformedIntent(
            "ready is only accepted between hands".to_string(),
        )),
        I::Fold => Ok(ValidatedAction::Fold),
        I::Check => {
            if to_call == 0 {
                Ok(ValidatedAction::Check)
            } else {
                Err(GameError::CannotCheck { to_call })
            }
        }
        I::Call => {
            if to_call == 0 {
                Err(GameError::NothingToCall)
            } else {
                Ok(ValidatedAction::Call(to_call.min(stack)))
            }
        }
        I::Bet { amount } => {
            if current_bet > 0 {
                return Err(GameError::BetNotAllowed { current_bet });
            }
            if amount == 0 {
                return Err(GameError::InvalidAmount);
            }
            if amount > stack {
                return Err(GameError::InsufficientChips {
                    required: amount,
                    available: stack,
                });
            }
            Ok(ValidatedAction::Bet(amount))
        }
        I::Raise { amount } => {
            if current_bet == 0 {
                return Err(GameError::NoBetToRaise);
            }
            if amount == 0 {
                return Err(GameError::InvalidAmount);
            }
            if amount <= current_bet {
                return Err(GameError::RaiseTooSmall {
                    amount,
                    current_bet,
                });
            }
            let chips = amount - wager;
            if chips > stack {
                return Err(GameError::InsufficientChips {
                    required: chips,
                    available: stack,
                });
            }
            Ok(ValidatedAction::Raise { to: amount, chips })
        }
    }
}
