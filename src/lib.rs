// NCAA tournament bracket simulator and multi-entry selection environment

pub mod board;
pub mod bracket;
pub mod config;
pub mod error;
pub mod game_result;
pub mod ingest;
pub mod odds;
pub mod pool;
pub mod selection;

pub use board::{Board, BoardMode};
pub use bracket::{BracketEngine, Matchup, Region, Team, TeamId};
pub use config::{Config, EnvSettings, SimulationSettings};
pub use error::{Error, Result};
pub use game_result::GameResult;
pub use ingest::{HistoricalRecord, TeamRow, TeamTable};
pub use odds::{OddsModel, OddsTable};
pub use pool::Batch;
pub use selection::{Environment, Observation, ResetOptions, SelectionEnv, StepOutcome};
