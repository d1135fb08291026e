use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use ncaa_env::board::BoardMode;
use ncaa_env::bracket::NUM_TEAMS;
use ncaa_env::config::{generate_sample_config, Config};
use ncaa_env::game_result::{champion, to_json, write_csv};
use ncaa_env::ingest::{read_history_path, write_history, TeamTable};
use ncaa_env::odds::{OddsModel, OddsTable};
use ncaa_env::pool::Batch;
use ncaa_env::selection::{Environment, SelectionEnv};
use ncaa_env::BracketEngine;

#[derive(Parser)]
#[command(name = "ncaa-env")]
#[command(about = "NCAA tournament bracket simulator and pick selection environment")]
struct Cli {
    /// YAML config file (defaults to config.yaml in the working directory if present)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate one full tournament
    Simulate {
        /// Odds csv (seed,round,winrate)
        #[arg(long)]
        odds: Option<PathBuf>,
        #[arg(long)]
        seed: Option<u64>,
        /// Write the 63 games as csv
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print the games as json instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Run a Monte Carlo batch of tournaments and tally champions
    Batch {
        #[arg(long)]
        odds: Option<PathBuf>,
        /// Tournaments to simulate (overrides config)
        #[arg(long)]
        runs: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Drive the selection environment with random picks
    Env {
        /// Team table csv (teamseed,playable,odds,match no,teamname)
        #[arg(long)]
        teams: PathBuf,
        /// Pick log to replay first (entry_id,team_id,match_no,valid)
        #[arg(long)]
        history: Option<PathBuf>,
        /// Number of entries (overrides config)
        #[arg(long)]
        entries: Option<usize>,
        /// shared or independent (overrides config)
        #[arg(long)]
        mode: Option<BoardMode>,
        #[arg(long, default_value_t = 100)]
        steps: usize,
        #[arg(long)]
        seed: Option<u64>,
        /// Write the resulting pick log here
        #[arg(long)]
        history_out: Option<PathBuf>,
    },
    /// Print a sample configuration file
    InitConfig,
}

fn make_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

fn load_odds(path: Option<PathBuf>, config: &Config) -> Result<OddsTable> {
    match path.or_else(|| config.simulation.odds_path.as_ref().map(PathBuf::from)) {
        Some(path) => OddsTable::from_path(&path).with_context(|| format!("loading odds from {}", path.display())),
        None => Ok(OddsTable::historical()),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.as_deref());

    match cli.command {
        Commands::Simulate { odds, seed, output, json } => {
            let engine = BracketEngine::new(OddsModel::new(load_odds(odds, &config)?));
            let mut rng = make_rng(seed.or(config.simulation.seed));
            let games = engine.run_full_bracket(&mut rng)?;

            if let Some(path) = output {
                let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
                write_csv(&games, file)?;
                log::info!("wrote {} games to {}", games.len(), path.display());
            }
            if json {
                println!("{}", to_json(&games)?);
            } else {
                for game in &games {
                    println!(
                        "round {} day {}: {} {} over {} {}",
                        game.round(),
                        game.day,
                        game.winner.region,
                        game.winner.seed,
                        game.loser.region,
                        game.loser.seed
                    );
                }
                if let Some(team) = champion(&games) {
                    println!("Champion: {} {} seed", team.region, team.seed);
                }
            }
        }
        Commands::Batch { odds, runs, seed } => {
            let engine = BracketEngine::new(OddsModel::new(load_odds(odds, &config)?));
            let runs = runs.unwrap_or(config.simulation.runs);
            let base_seed = seed
                .or(config.simulation.seed)
                .unwrap_or_else(|| rand::thread_rng().gen());
            let batch = Batch::simulate(&engine, runs, base_seed, config.simulation.show_progress)?;
            batch.pretty_print();
            if let Some((team, titles)) = batch.most_common_champion() {
                let team = engine.teams()[team as usize];
                println!("Most common champion: {} {} seed ({} titles)", team.region, team.seed, titles);
            }
        }
        Commands::Env {
            teams,
            history,
            entries,
            mode,
            steps,
            seed,
            history_out,
        } => {
            let table = TeamTable::from_path(&teams).with_context(|| format!("loading teams from {}", teams.display()))?;
            let records = match history {
                Some(path) => read_history_path(&path).with_context(|| format!("loading history from {}", path.display()))?,
                None => Vec::new(),
            };
            let mut settings = config.environment.clone();
            if let Some(entries) = entries {
                settings.num_entries = entries;
            }
            if let Some(mode) = mode {
                settings.board_mode = mode;
            }

            let mut env = SelectionEnv::new(table, records, settings)?;
            let mut rng = make_rng(seed.or(config.simulation.seed));
            let mut total_reward = 0.0;
            for step in 0..steps {
                let actions: Vec<i64> = (0..env.num_entries())
                    .map(|_| rng.gen_range(0..NUM_TEAMS as i64))
                    .collect();
                let outcome = env.step(&actions)?;
                total_reward += outcome.reward;
                if outcome.terminated {
                    log::info!("all entries completed after {} steps", step + 1);
                    break;
                }
            }

            print!("{}", env);
            println!("Total reward: {:.1}", total_reward);
            if let Some(path) = history_out {
                let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
                write_history(env.history(), file)?;
                log::info!("wrote {} history records to {}", env.history().len(), path.display());
            }
        }
        Commands::InitConfig => {
            print!("{}", generate_sample_config());
        }
    }

    Ok(())
}
