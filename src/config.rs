// Configuration module for the tournament simulator and selection environment
// Supports YAML configuration files for simulation and environment settings

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::board::BoardMode;
use crate::error::{Error, Result};

/// Looked up in order when no config path is given
pub const DEFAULT_CONFIG_PATHS: [&str; 3] = ["config.yaml", "config.yml", ".ncaa-config.yaml"];

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub simulation: SimulationSettings,
    #[serde(default)]
    pub environment: EnvSettings,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            return Err(Error::Config(format!("config file not found: {}", path)));
        }
        let content = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// First loadable and valid config among `path` (or the default locations when None).
    /// Unreadable or invalid candidates are skipped with a warning; defaults if none is usable.
    pub fn load_or_default(path: Option<&str>) -> Self {
        let candidates: Vec<&str> = match path {
            Some(p) => vec![p],
            None => DEFAULT_CONFIG_PATHS
                .iter()
                .copied()
                .filter(|p| Path::new(p).exists())
                .collect(),
        };
        for candidate in candidates {
            match Self::from_file(candidate) {
                Ok(config) => {
                    log::info!("loaded configuration from {}", candidate);
                    return config;
                }
                Err(e) => log::warn!("ignoring {}: {}", candidate, e),
            }
        }
        Self::default()
    }

    /// Save configuration to a YAML file
    pub fn save_to_file(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.environment.num_entries == 0 {
            return Err(Error::Config("environment.num_entries must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Bracket simulation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// Rng seed; a fresh random seed is drawn when unset
    #[serde(default)]
    pub seed: Option<u64>,

    /// Number of tournaments in a Monte Carlo batch
    #[serde(default = "default_runs")]
    pub runs: usize,

    /// Odds csv (seed,round,winrate); the built-in historical table is used when unset
    #[serde(default)]
    pub odds_path: Option<String>,

    /// Show a progress bar while a batch runs
    #[serde(default = "default_show_progress")]
    pub show_progress: bool,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        SimulationSettings {
            seed: None,
            runs: default_runs(),
            odds_path: None,
            show_progress: default_show_progress(),
        }
    }
}

fn default_runs() -> usize { 10000 }
fn default_show_progress() -> bool { true }

/// Selection environment settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvSettings {
    /// Number of entries filling picks side by side
    #[serde(default = "default_num_entries")]
    pub num_entries: usize,

    /// "shared": one board for all entries, "independent": one board per entry
    #[serde(default)]
    pub board_mode: BoardMode,

    /// Reward for an accepted pick
    #[serde(default = "default_step_reward")]
    pub step_reward: f64,

    /// Reward for the pick that settles the last active match on the entry's board
    #[serde(default = "default_completion_reward")]
    pub completion_reward: f64,
}

impl Default for EnvSettings {
    fn default() -> Self {
        EnvSettings {
            num_entries: default_num_entries(),
            board_mode: BoardMode::default(),
            step_reward: default_step_reward(),
            completion_reward: default_completion_reward(),
        }
    }
}

fn default_num_entries() -> usize { 5 }
fn default_step_reward() -> f64 { 1.0 }
fn default_completion_reward() -> f64 { 10.0 }

/// Generate a sample configuration file
pub fn generate_sample_config() -> String {
    r#"# NCAA tournament simulator configuration
# All values shown are defaults - uncomment and modify as needed

# Bracket simulation
simulation:
  # Rng seed for reproducible runs (omit for a random seed)
  # seed: 42
  # Tournaments per Monte Carlo batch
  runs: 10000
  # Odds csv with columns seed,round,winrate (omit to use built-in historical rates)
  # odds_path: winrates.csv
  # Show a progress bar during batches
  show_progress: true

# Selection environment
environment:
  # Entries picking side by side
  num_entries: 5
  # "shared" = one board, a pick by any entry knocks the loser out for everyone
  # "independent" = every entry has its own board
  board_mode: shared
  # Reward for an accepted pick
  step_reward: 1.0
  # Reward for the pick that settles the last active match
  completion_reward: 10.0
"#.to_string()
}
