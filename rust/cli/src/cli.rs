use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "pokeroom",
    version,
    about = "Offline tools for the pokeroom engine: deal, evaluate, simulate"
)]
pub struct PokeroomCli {
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Deal one hand, print every seat's hole cards and the board
    Deal {
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        seats: Option<usize>,
    },
    /// Evaluate 5 to 7 cards, e.g. `eval AS KS QS JS TS`
    Eval {
        #[arg(required = true, num_args = 1..)]
        cards: Vec<String>,
    },
    /// Play hands with random legal intents and check chips and cards stay consistent
    Sim {
        #[arg(long)]
        hands: u64,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        seats: Option<usize>,
    },
    /// Show the resolved configuration and where each value came from
    Cfg,
}
