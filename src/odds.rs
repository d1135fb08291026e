// Seed-vs-seed win probabilities built from empirical per-round win rates.
// The odds table maps (seed, round) to the historical share of games that seed won in that round.

use fnv::FnvHashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

use crate::error::{Error, Result};

/// Rounds 0 (Round of 64) through 5 (Championship)
pub const NUM_ROUNDS: u8 = 6;

/// Historical first-weekend win rate of each seed, index 0 is the 1 seed
pub const HISTORICAL_SEED_RATES: [f64; 16] = [
    0.797213622,
    0.706225681,
    0.653758542,
    0.61209068,
    0.535714286,
    0.512578616,
    0.472789116,
    0.417293233,
    0.380952381,
    0.37751004,
    0.4,
    0.336170213,
    0.2,
    0.138121547,
    0.093023256,
    0.012658228,
];

/// One row of the odds csv: `seed,round,winrate`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OddsRow {
    pub seed: u8,
    pub round: u8,
    pub winrate: f64,
}

#[derive(Debug, Clone, Default)]
pub struct OddsTable {
    rates: FnvHashMap<(u8, u8), f64>,
}

impl OddsTable {
    pub fn new() -> OddsTable {
        OddsTable::default()
    }

    /// Same win rate for a seed in every round
    pub fn from_seed_rates(rates: &[f64; 16]) -> OddsTable {
        let mut table = OddsTable::new();
        for (idx, &rate) in rates.iter().enumerate() {
            for round in 0..NUM_ROUNDS {
                table.rates.insert((idx as u8 + 1, round), rate);
            }
        }
        table
    }

    pub fn historical() -> OddsTable {
        OddsTable::from_seed_rates(&HISTORICAL_SEED_RATES)
    }

    pub fn insert(&mut self, seed: u8, round: u8, winrate: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&winrate) {
            return Err(Error::InvalidOdds { seed, round, winrate });
        }
        self.rates.insert((seed, round), winrate);
        Ok(())
    }

    pub fn from_reader<R: io::Read>(reader: R) -> Result<OddsTable> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut table = OddsTable::new();
        for row in rdr.deserialize::<OddsRow>() {
            let row = row?;
            table.insert(row.seed, row.round, row.winrate)?;
        }
        log::debug!("loaded {} odds entries", table.len());
        Ok(table)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<OddsTable> {
        let file = std::fs::File::open(path)?;
        OddsTable::from_reader(file)
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Exact lookup, no interpolation and no default
    pub fn win_rate(&self, seed: u8, round: u8) -> Result<f64> {
        self.rates
            .get(&(seed, round))
            .copied()
            .ok_or(Error::Lookup { seed, round })
    }
}

/// Turns per-seed win rates into head-to-head probabilities and samples outcomes
#[derive(Debug, Clone)]
pub struct OddsModel {
    table: OddsTable,
}

impl OddsModel {
    pub fn new(table: OddsTable) -> OddsModel {
        OddsModel { table }
    }

    pub fn table(&self) -> &OddsTable {
        &self.table
    }

    pub fn win_rate(&self, seed: u8, round: u8) -> Result<f64> {
        self.table.win_rate(seed, round)
    }

    /// Probability that `seed_a` beats `seed_b` in `round`:
    /// rate(a) / (rate(a) + rate(b)), or an even game when both rates are zero
    pub fn win_probability(&self, seed_a: u8, seed_b: u8, round: u8) -> Result<f64> {
        let invalid = |source: Error| Error::InvalidSeed {
            seed_a,
            seed_b,
            round,
            source: Box::new(source),
        };
        let rate_a = self.win_rate(seed_a, round).map_err(invalid)?;
        let rate_b = self.win_rate(seed_b, round).map_err(invalid)?;
        let total = rate_a + rate_b;
        if total <= 0.0 {
            return Ok(0.5);
        }
        Ok(rate_a / total)
    }

    /// Draws exactly one uniform value from `rng`
    pub fn sample_winner<R: Rng + ?Sized>(
        &self,
        seed_a: u8,
        seed_b: u8,
        round: u8,
        rng: &mut R,
    ) -> Result<u8> {
        let p = self.win_probability(seed_a, seed_b, round)?;
        let rand_num: f64 = rng.gen();
        Ok(if rand_num < p { seed_a } else { seed_b })
    }
}

impl Default for OddsModel {
    fn default() -> Self {
        OddsModel::new(OddsTable::historical())
    }
}
