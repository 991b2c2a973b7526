use serde::{Deserialize, Serialize};

use crate::errors::GameError;

/// A request from a seat to change the room.
///
/// Wire form: `{"type": "ready" | "fold" | "check" | "call" | "bet" | "raise", "amount"?: n}`.
/// `amount` is required for `bet` and `raise`; any `amount` on other intents is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PlayerIntent {
    Ready,
    Fold,
    Check,
    Call,
    /// Open the street with `amount` chips.
    Bet { amount: u32 },
    /// Raise the street total to `amount`.
    Raise { amount: u32 },
}

impl PlayerIntent {
    /// Parses the wire form, mapping every decoding failure to
    /// [`GameError::MalformedIntent`].
    ///
    /// ```
    /// use pokeroom_engine::intent::PlayerIntent;
    ///
    /// let intent = PlayerIntent::from_json(r#"{"type":"raise","amount":40}"#).unwrap();
    /// assert_eq!(intent, PlayerIntent::Raise { amount: 40 });
    /// assert!(PlayerIntent::from_json(r#"{"type":"bet"}"#).is_err());
    /// ```
    pub fn from_json(input: &str) -> Result<Self, GameError> {
        serde_json::from_str(input).map_err(|e| GameError::MalformedIntent(e.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            PlayerIntent::Ready => "ready",
            PlayerIntent::Fold => "fold",
            PlayerIntent::Check => "check",
            PlayerIntent::Call => "call",
            PlayerIntent::Bet { .. } => "bet",
            PlayerIntent::Raise { .. } => "raise",
        }
    }

    pub fn is_betting_action(&self) -> bool {
        !matches!(self, PlayerIntent::Ready)
    }
}
