use crate::bracket::{BracketEngine, TeamId, NUM_TEAMS, SEEDS_PER_REGION};
use crate::error::Result;
use crate::game_result::champion;
use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

//This file runs batches of full-tournament Monte Carlo simulations.
//Every run gets its own ChaCha8 rng seeded from base_seed + run index, so a batch gives the same
//tallies no matter how rayon splits the work across cores.

#[derive(Debug, Clone)]
pub struct Batch {
    pub runs: usize,
    pub base_seed: u64,
    /// champion_counts[team id] = number of runs that team won
    pub champion_counts: Vec<usize>,
    /// seed_counts[seed - 1] = number of runs won by that seed
    pub seed_counts: [usize; SEEDS_PER_REGION],
    /// average number of games won by the worse seed per tournament
    pub mean_upsets: f64,
}

impl Batch {
    pub fn simulate(engine: &BracketEngine, runs: usize, base_seed: u64, show_progress: bool) -> Result<Batch> {
        let num_cpus = num_cpus::get();
        let runs_per_core = (runs / num_cpus).max(1);

        let progress = if show_progress {
            let pb = ProgressBar::new(runs as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} tournaments"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        let outcomes: Vec<(TeamId, usize)> = (0..runs)
            .into_par_iter()
            .with_min_len(runs_per_core)
            .map(|run| -> Result<(TeamId, usize)> {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(run as u64));
                let games = engine.run_full_bracket(&mut rng)?;
                progress.inc(1);
                let upsets = games.iter().filter(|g| g.is_upset()).count();
                //run_full_bracket always ends with the title game
                let winner = champion(&games).map(|t| t.id).unwrap_or_default();
                Ok((winner, upsets))
            })
            .collect::<Result<Vec<_>>>()?;
        progress.finish_and_clear();

        let mut champion_counts = vec![0usize; NUM_TEAMS];
        let mut seed_counts = [0usize; SEEDS_PER_REGION];
        let mut total_upsets = 0usize;
        for &(winner, upsets) in &outcomes {
            champion_counts[winner as usize] += 1;
            let seed = engine.teams()[winner as usize].seed;
            seed_counts[seed as usize - 1] += 1;
            total_upsets += upsets;
        }
        let mean_upsets = if runs == 0 { 0.0 } else { total_upsets as f64 / runs as f64 };

        log::info!("simulated {} tournaments from base seed {}", runs, base_seed);
        Ok(Batch {
            runs,
            base_seed,
            champion_counts,
            seed_counts,
            mean_upsets,
        })
    }

    /// Share of runs won by a team of the given seed (1..16)
    pub fn champion_seed_share(&self, seed: u8) -> f64 {
        if self.runs == 0 || seed == 0 || seed as usize > SEEDS_PER_REGION {
            return 0.0;
        }
        self.seed_counts[seed as usize - 1] as f64 / self.runs as f64
    }

    /// (team id, titles) of the most frequent champion, lowest id on ties
    pub fn most_common_champion(&self) -> Option<(TeamId, usize)> {
        self.champion_counts
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .fold(None, |best: Option<(TeamId, usize)>, (id, &count)| match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((id as TeamId, count)),
            })
    }

    pub fn pretty_print(&self) {
        println!("Tournaments simulated: {}", self.runs);
        println!("Average upsets per tournament: {:.2}", self.mean_upsets);
        println!("{:>4} {:>8} {:>7}", "Seed", "Titles", "Share");
        for (idx, &count) in self.seed_counts.iter().enumerate() {
            if count > 0 {
                println!("{:>4} {:>8} {:>6.2}%", idx + 1, count, 100.0 * count as f64 / self.runs as f64);
            }
        }
    }
}
