use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use crate::cards::{full_deck, Card};
use crate::errors::GameError;

/// An ordered stack of cards owned by the hand in progress.
///
/// The top of the deck is the end of the vector, so [`Deck::draw`] is a `pop`.
#[derive(Debug, Clone)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// All 52 cards, unshuffled.
    pub fn ordered() -> Self {
        Self { cards: full_deck() }
    }

    /// A full deck shuffled with Fisher–Yates.
    ///
    /// A seed gives a reproducible order; without one the generator is seeded from
    /// the operating system, which is what live tables use.
    pub fn new_shuffled(seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed),
            None => ChaCha20Rng::from_os_rng(),
        };
        let mut deck = Self::ordered();
        deck.cards.shuffle(&mut rng);
        deck
    }

    /// Removes and returns the top card.
    ///
    /// An empty deck here is a logic error in the caller, never a player mistake.
    pub fn draw(&mut self) -> Result<Card, GameError> {
        self.cards.pop().ok_or(GameError::EmptyDeck)
    }

    pub fn draw_n(&mut self, n: usize) -> Result<Vec<Card>, GameError> {
        (0..n).map(|_| self.draw()).collect()
    }

    pub fn remaining(&self) -> usize {
        self.cards.len()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }
}
