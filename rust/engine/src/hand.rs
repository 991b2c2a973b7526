use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cards::{Card, Rank, Suit};
use crate::errors::GameError;

/// Hand categories, weakest to strongest. The discriminant is the integer part of
/// [`Evaluation::rank`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Category {
    HighCard = 1,
    OnePair = 2,
    TwoPair = 3,
    ThreeOfAKind = 4,
    Straight = 5,
    Flush = 6,
    FullHouse = 7,
    FourOfAKind = 8,
    StraightFlush = 9,
    RoyalFlush = 10,
}

impl Category {
    pub fn base(self) -> u8 {
        self as u8
    }
}

/// Exact comparison key for a hand: category first, then the deciding values
/// ordered high to low. Unused kicker slots are zero.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct HandStrength {
    pub category: Category,
    pub kickers: [u8; 5],
}

impl HandStrength {
    /// Float projection of the key: `category + k1/100 + k2/100^2 + ... + k5/100^5`.
    ///
    /// Every kicker is below 100, so each term is smaller than one unit of the term
    /// before it and the projection preserves the ordering of [`HandStrength`].
    pub fn score(&self) -> f64 {
        let mut score = f64::from(self.category.base());
        let mut scale = 1.0;
        for k in self.kickers {
            scale /= 100.0;
            score += f64::from(k) * scale;
        }
        score
    }
}

/// Result of scoring 5 to 7 cards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Globally comparable score; higher wins, equal means a split.
    pub rank: f64,
    /// Human readable description, e.g. `Full House (Kings over Fours)`.
    pub category: String,
    pub strength: HandStrength,
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{:.10}]", self.category, self.rank)
    }
}

/// Scores the best five-card hand contained in `cards`.
///
/// # Errors
///
/// [`GameError::InvalidHandSize`] unless 5 to 7 cards are given, and
/// [`GameError::DuplicateCard`] if a card repeats.
///
/// # Examples
///
/// ```
/// use pokeroom_engine::cards::parse_cards;
/// use pokeroom_engine::hand::evaluate;
///
/// let cards = parse_cards("QC 9S QD 9C QS").unwrap();
/// let eval = evaluate(&cards).unwrap();
/// assert_eq!(eval.category, "Full House (Queens over Nines)");
/// assert!(eval.rank >= 7.0 && eval.rank < 8.0);
/// ```
pub fn evaluate(cards: &[Card]) -> Result<Evaluation, GameError> {
    if !(5..=7).contains(&cards.len()) {
        return Err(GameError::InvalidHandSize(cards.len()));
    }
    let mut sorted = cards.to_vec();
    sorted.sort_unstable();
    if let Some(pair) = sorted.windows(2).find(|w| w[0] == w[1]) {
        return Err(GameError::DuplicateCard(pair[0]));
    }

    let strength = strength_of(cards);
    Ok(Evaluation {
        rank: strength.score(),
        category: describe(&strength),
        strength,
    })
}

pub fn compare(a: &Evaluation, b: &Evaluation) -> Ordering {
    a.strength.cmp(&b.strength)
}

fn strength_of(cards: &[Card]) -> HandStrength {
    let mut counts = [0u8; 15];
    let mut value_mask: u16 = 0;
    for c in cards {
        counts[c.value() as usize] += 1;
        value_mask |= 1 << c.value();
    }

    // (count, value), sorted by count desc then value desc
    let mut groups: Vec<(u8, u8)> = (2..=14u8)
        .rev()
        .filter(|v| counts[*v as usize] > 0)
        .map(|v| (counts[v as usize], v))
        .collect();
    groups.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));

    if let Some(suit) = flush_suit(cards) {
        let suited_mask = cards
            .iter()
            .filter(|c| c.suit == suit)
            .fold(0u16, |m, c| m | (1 << c.value()));
        if let Some(high) = straight_high(suited_mask) {
            let category = if high == 14 {
                Category::RoyalFlush
            } else {
                Category::StraightFlush
            };
            return with_kickers(category, &[high]);
        }
    }

    let (top_count, top_value) = groups[0];
    let second = groups.get(1).copied();

    if top_count == 4 {
        let kicker = highest_excluding(&groups, &[top_value], 1);
        return with_kickers(Category::FourOfAKind, &[&[top_value][..], &kicker].concat());
    }

    if top_count == 3 {
        if let Some((count, value)) = second {
            if count >= 2 {
                return with_kickers(Category::FullHouse, &[top_value, value]);
            }
        }
    }

    if let Some(suit) = flush_suit(cards) {
        let mut values: Vec<u8> = cards
            .iter()
            .filter(|c| c.suit == suit)
            .map(|c| c.value())
            .collect();
        values.sort_unstable_by(|a, b| b.cmp(a));
        values.truncate(5);
        return with_kickers(Category::Flush, &values);
    }

    if let Some(high) = straight_high(value_mask) {
        return with_kickers(Category::Straight, &[high]);
    }

    if top_count == 3 {
        let kickers = highest_excluding(&groups, &[top_value], 2);
        return with_kickers(Category::ThreeOfAKind, &[&[top_value][..], &kickers].concat());
    }

    if top_count == 2 {
        if let Some((2, low_pair)) = second {
            let kicker = highest_excluding(&groups, &[top_value, low_pair], 1);
            return with_kickers(
                Category::TwoPair,
                &[&[top_value, low_pair][..], &kicker].concat(),
            );
        }
        let kickers = highest_excluding(&groups, &[top_value], 3);
        return with_kickers(Category::OnePair, &[&[top_value][..], &kickers].concat());
    }

    let highs = highest_excluding(&groups, &[], 5);
    with_kickers(Category::HighCard, &highs)
}

fn flush_suit(cards: &[Card]) -> Option<Suit> {
    let mut counts = [0u8; 4];
    for c in cards {
        counts[suit_index(c.suit)] += 1;
    }
    crate::cards::all_suits()
        .into_iter()
        .find(|s| counts[suit_index(*s)] >= 5)
}

fn suit_index(s: Suit) -> usize {
    match s {
        Suit::Hearts => 0,
        Suit::Diamonds => 1,
        Suit::Clubs => 2,
        Suit::Spades => 3,
    }
}

/// Highest card of the best five-in-a-row in `mask` (bit `v` set for value `v`).
/// The wheel A-2-3-4-5 counts as five high.
fn straight_high(mask: u16) -> Option<u8> {
    let mut m = mask;
    if m & (1 << 14) != 0 {
        m |= 1 << 1;
    }
    (5..=14u8).rev().find(|&high| {
        let window = 0b1_1111u16 << (high - 4);
        m & window == window
    })
}

/// Up to `n` distinct values, high to low, skipping `exclude`.
fn highest_excluding(groups: &[(u8, u8)], exclude: &[u8], n: usize) -> Vec<u8> {
    let mut values: Vec<u8> = groups
        .iter()
        .map(|&(_, v)| v)
        .filter(|v| !exclude.contains(v))
        .collect();
    values.sort_unstable_by(|a, b| b.cmp(a));
    values.truncate(n);
    values
}

fn with_kickers(category: Category, values: &[u8]) -> HandStrength {
    let mut kickers = [0u8; 5];
    for (slot, v) in kickers.iter_mut().zip(values) {
        *slot = *v;
    }
    HandStrength { category, kickers }
}

fn describe(strength: &HandStrength) -> String {
    let rank = |i: usize| Rank::from_value(strength.kickers[i]).unwrap_or(Rank::Two);
    match strength.category {
        Category::RoyalFlush => "Royal Flush".to_string(),
        Category::StraightFlush if strength.kickers[0] == 5 => "Straight Flush (Wheel)".to_string(),
        Category::StraightFlush => format!("Straight Flush ({} high)", rank(0).word()),
        Category::FourOfAKind => format!("Four of a Kind ({})", rank(0).plural()),
        Category::FullHouse => format!(
            "Full House ({} over {})",
            rank(0).plural(),
            rank(1).plural()
        ),
        Category::Flush => format!("Flush ({} high)", rank(0).word()),
        Category::Straight if strength.kickers[0] == 5 => "Straight (Wheel)".to_string(),
        Category::Straight => format!("Straight ({} high)", rank(0).word()),
        Category::ThreeOfAKind => format!("Three of a Kind ({})", rank(0).plural()),
        Category::TwoPair => format!(
            "Two Pair ({} and {})",
            rank(0).plural(),
            rank(1).plural()
        ),
        Category::OnePair => format!("Pair of {}", rank(0).plural()),
        Category::HighCard => format!("High Card ({})", rank(0).word()),
    }
}
