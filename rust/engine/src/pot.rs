use serde::{Deserialize, Serialize};

use crate::errors::GameError;
use crate::hand::HandStrength;
use crate::player::SeatId;

/// A seat's total stake in the hand, as seen by settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contribution {
    pub seat: SeatId,
    pub amount: u32,
    pub folded: bool,
    pub all_in: bool,
}

/// One layer of the pot and the seats that can win it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidePot {
    pub amount: u32,
    pub eligible_seat_ids: Vec<SeatId>,
}

/// Chips moved to a winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payout {
    pub seat_id: SeatId,
    pub amount: u32,
    /// Index of the layer in [`build_pots`] order.
    pub pot_index: usize,
}

/// Partitions the hand's contributions into pot layers, smallest first.
///
/// Each distinct stake of a non-folded all-in seat closes a layer; the last layer runs
/// up to the largest stake. A layer holds what every seat put in between the previous
/// threshold and its own, and is open to the non-folded seats that reached it. Chips no
/// live seat can claim (a folded seat out-staking everyone left) join the layer below.
///
/// ```
/// use pokeroom_engine::pot::{build_pots, Contribution};
///
/// let c = |seat, amount, all_in| Contribution { seat, amount, folded: false, all_in };
/// let pots = build_pots(&[c(1, 50, true), c(2, 200, false), c(3, 200, false)]);
/// assert_eq!(pots.len(), 2);
/// assert_eq!(pots[0].amount, 150);
/// assert_eq!(pots[0].eligible_seat_ids, vec![1, 2, 3]);
/// assert_eq!(pots[1].amount, 300);
/// assert_eq!(pots[1].eligible_seat_ids, vec![2, 3]);
/// ```
pub fn build_pots(contributions: &[Contribution]) -> Vec<SidePot> {
    let Some(top) = contributions.iter().map(|c| c.amount).max() else {
        return Vec::new();
    };
    if top == 0 {
        return Vec::new();
    }

    let mut thresholds: Vec<u32> = contributions
        .iter()
        .filter(|c| c.all_in && !c.folded && c.amount > 0)
        .map(|c| c.amount)
        .collect();
    thresholds.push(top);
    thresholds.sort_unstable();
    thresholds.dedup();

    let mut pots: Vec<SidePot> = Vec::new();
    let mut carried = 0u32;
    let mut prev = 0u32;
    for thr in thresholds {
        let amount: u32 = contributions
            .iter()
            .map(|c| c.amount.min(thr) - c.amount.min(prev))
            .sum::<u32>()
            + carried;
        let eligible: Vec<SeatId> = contributions
            .iter()
            .filter(|c| !c.folded && c.amount >= thr)
            .map(|c| c.seat)
            .collect();
        prev = thr;

        if eligible.is_empty() {
            match pots.last_mut() {
                Some(last) => last.amount += amount,
                None => carried = amount,
            }
            continue;
        }
        carried = 0;
        pots.push(SidePot {
            amount,
            eligible_seat_ids: eligible,
        });
    }

    // every live seat folded below the top stake
    if carried > 0 {
        let live: Vec<SeatId> = contributions
            .iter()
            .filter(|c| !c.folded)
            .map(|c| c.seat)
            .collect();
        pots.push(SidePot {
            amount: carried,
            eligible_seat_ids: live,
        });
    }
    pots
}

/// Fails with [`GameError::PotMismatch`] unless the layers add up to `pot`.
pub fn verify_pots(pots: &[SidePot], pot: u32) -> Result<(), GameError> {
    let layers: u64 = pots.iter().map(|p| u64::from(p.amount)).sum();
    if layers != u64::from(pot) {
        return Err(GameError::PotMismatch {
            layers,
            pot: u64::from(pot),
        });
    }
    Ok(())
}

/// Awards each layer to its best eligible hand.
///
/// `order` lists seats starting left of the dealer; tied winners split evenly and any
/// odd chips go to the first of them in that order. `strength_of` returns `None` for a
/// seat without a hand, which can never win.
pub fn distribute<F>(pots: &[SidePot], order: &[SeatId], strength_of: F) -> Vec<Payout>
where
    F: Fn(SeatId) -> Option<HandStrength>,
{
    let mut payouts = Vec::new();
    for (pot_index, pot) in pots.iter().enumerate() {
        let contenders: Vec<(SeatId, HandStrength)> = order
            .iter()
            .filter(|s| pot.eligible_seat_ids.contains(s))
            .filter_map(|&s| strength_of(s).map(|h| (s, h)))
            .collect();
        let Some(best) = contenders.iter().map(|(_, h)| *h).max() else {
            continue;
        };
        let winners: Vec<SeatId> = contenders
            .iter()
            .filter(|(_, h)| *h == best)
            .map(|(s, _)| *s)
            .collect();
        payouts.extend(split(pot.amount, &winners, pot_index));
    }
    payouts
}

/// Gives the whole of every layer to `seat`.
pub fn award_uncontested(pots: &[SidePot], seat: SeatId) -> Vec<Payout> {
    pots.iter()
        .enumerate()
        .map(|(pot_index, pot)| Payout {
            seat_id: seat,
            amount: pot.amount,
            pot_index,
        })
        .collect()
}

fn split(amount: u32, winners: &[SeatId], pot_index: usize) -> Vec<Payout> {
    let n = winners.len() as u32;
    if n == 0 {
        return Vec::new();
    }
    let share = amount / n;
    let remainder = amount % n;
    winners
        .iter()
        .enumerate()
        .map(|(i, &seat_id)| Payout {
            seat_id,
            amount: if i == 0 { share + remainder } else { share },
            pot_index,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::Category;

    fn c(seat: SeatId, amount: u32, folded: bool, all_in: bool) -> Contribution {
        Contribution {
            seat,
            amount,
            folded,
            all_in,
        }
    }

    fn strength(category: Category, high: u8) -> HandStrength {
        HandStrength {
            category,
            kickers: [high, 0, 0, 0, 0],
        }
    }

    #[test]
    fn folded_chips_stay_in_the_layers() {
        let pots = build_pots(&[c(1, 40, true, false), c(2, 100, false, false), c(3, 100, false, false)]);
        assert_eq!(pots.len(), 1);
        assert_eq!(pots[0].amount, 240);
        assert_eq!(pots[0].eligible_seat_ids, vec![2, 3]);
    }

    #[test]
    fn unclaimable_top_layer_merges_down() {
        // seat 2 out-staked the all-in seat and then folded
        let pots = build_pots(&[c(1, 50, false, true), c(2, 200, true, false)]);
        assert_eq!(pots.len(), 1);
        assert_eq!(pots[0].amount, 250);
        assert_eq!(pots[0].eligible_seat_ids, vec![1]);
        assert!(verify_pots(&pots, 250).is_ok());
    }

    #[test]
    fn odd_chip_goes_to_first_in_order() {
        let pots = vec![SidePot {
            amount: 101,
            eligible_seat_ids: vec![1, 2],
        }];
        let pay = distribute(&pots, &[2, 1], |_| Some(strength(Category::Flush, 14)));
        assert_eq!(pay[0], Payout { seat_id: 2, amount: 51, pot_index: 0 });
        assert_eq!(pay[1], Payout { seat_id: 1, amount: 50, pot_index: 0 });
    }

    #[test]
    fn each_layer_judged_among_its_own_seats() {
        let pots = build_pots(&[c(1, 50, false, true), c(2, 200, false, false), c(3, 200, false, false)]);
        // short stack holds the best hand; seat 3 beats seat 2
        let pay = distribute(&pots, &[1, 2, 3], |s| match s {
            1 => Some(strength(Category::FourOfAKind, 9)),
            2 => Some(strength(Category::OnePair, 4)),
            _ => Some(strength(Category::TwoPair, 8)),
        });
        assert_eq!(pay, vec![
            Payout { seat_id: 1, amount: 150, pot_index: 0 },
            Payout { seat_id: 3, amount: 300, pot_index: 1 },
        ]);
    }

    #[test]
    fn mismatch_is_reported() {
        let pots = vec![SidePot {
            amount: 10,
            eligible_seat_ids: vec![1],
        }];
        assert_eq!(
            verify_pots(&pots, 12),
            Err(GameError::PotMismatch { layers: 10, pot: 12 })
        );
    }
}
