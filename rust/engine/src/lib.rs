//! # pokeroom-engine: Authoritative Poker Room Core
//!
//! A synchronous Texas Hold'em engine for tables of 2 to 10 seats. It deals cards,
//! tracks stacks, enforces betting legality, moves a hand through its phases and
//! settles main and side pots. It performs no I/O; a transport owns each [`room::Room`]
//! and feeds it intents one at a time.
//!
//! ## Core Modules
//!
//! - [`cards`] - Card representation (Suit, Rank, Card) and canonical names
//! - [`deck`] - Fisher–Yates shuffled decks, seeded or OS-random
//! - [`hand`] - Hand evaluation into a comparable rank and a category string
//! - [`player`] - Per-seat state
//! - [`rules`] - Betting validation
//! - [`pot`] - Side-pot layering and payouts
//! - [`room`] - The room state machine and its events
//! - [`intent`] / [`snapshot`] - Wire types exchanged with clients
//! - [`errors`] - Protocol errors and invariant violations
//!
//! ## Quick Start
//!
//! ```rust
//! use pokeroom_engine::cards::parse_cards;
//! use pokeroom_engine::hand::evaluate;
//!
//! let cards = parse_cards("AH KH QH JH TH 2C 3D").unwrap();
//! let result = evaluate(&cards).unwrap();
//! assert_eq!(result.category, "Royal Flush");
//! assert!(result.rank >= 10.0);
//! ```
//!
//! ## Playing a hand
//!
//! ```rust
//! use pokeroom_engine::intent::PlayerIntent;
//! use pokeroom_engine::room::{Phase, Room, RoomConfig};
//!
//! let mut room = Room::new(RoomConfig::default()).unwrap();
//! let (ann, _) = room.join("ann", 500).unwrap();
//! let (bob, _) = room.join("bob", 500).unwrap();
//! room.apply(ann, PlayerIntent::Ready).unwrap();
//! room.apply(bob, PlayerIntent::Ready).unwrap();
//!
//! // heads-up: the button posts the small blind and acts first
//! let first = room.active_seat().unwrap();
//! room.apply(first, PlayerIntent::Fold).unwrap();
//! assert_eq!(room.phase(), Phase::Waiting);
//! assert_eq!(room.total_chips(), 1000);
//! ```

pub mod cards;
pub mod deck;
pub mod errors;
pub mod hand;
pub mod intent;
pub mod player;
pub mod pot;
pub mod room;
pub mod rules;
pub mod snapshot;

pub use errors::GameError;
pub use intent::PlayerIntent;
pub use room::{Phase, Room, RoomConfig, RoomEvent};
pub use snapshot::RoomStateSnapshot;
