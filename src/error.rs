// Error types shared by the bracket engine and the selection environment

use thiserror::Error;

use crate::bracket::Region;

/// Errors raised by the engine, the environment and the table loaders
#[derive(Debug, Error)]
pub enum Error {
    #[error("no win rate for seed {seed} in round {round}")]
    Lookup { seed: u8, round: u8 },

    #[error("invalid seed pairing {seed_a} vs {seed_b} in round {round}: {source}")]
    InvalidSeed {
        seed_a: u8,
        seed_b: u8,
        round: u8,
        #[source]
        source: Box<Error>,
    },

    #[error("win rate {winrate} for seed {seed} in round {round} is outside [0, 1]")]
    InvalidOdds { seed: u8, round: u8, winrate: f64 },

    #[error("invalid action: {0}")]
    Validation(String),

    #[error("no seed {seed} team in the {region} region")]
    MissingTeam { region: Region, seed: u8 },

    #[error("team table must have exactly {expected} rows, got {actual}")]
    TeamTableShape { expected: usize, actual: usize },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
