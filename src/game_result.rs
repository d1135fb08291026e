// This module defines the record of one simulated game and the flat row format downstream tools read.
// Results are written as csv (one row per game) or json.

use serde::{Deserialize, Serialize};
use std::io;

use crate::bracket::{Matchup, Team, CHAMPIONSHIP_ROUND};
use crate::error::Result;

/// A resolved matchup. Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GameResult {
    pub matchup: Matchup,
    pub winner: Team,
    pub loser: Team,
    /// probability that matchup.team1 wins
    pub team1_win_prob: f64,
    /// 1 or 2
    pub day: u8,
}

impl GameResult {
    pub fn new(matchup: Matchup, winner: Team, loser: Team, team1_win_prob: f64, day: u8) -> Self {
        GameResult {
            matchup,
            winner,
            loser,
            team1_win_prob,
            day,
        }
    }

    pub fn round(&self) -> u8 {
        self.matchup.round
    }

    pub fn team1_won(&self) -> bool {
        self.winner == self.matchup.team1
    }

    /// Probability the eventual winner had going into the game
    pub fn winner_prob(&self) -> f64 {
        if self.team1_won() {
            self.team1_win_prob
        } else {
            1.0 - self.team1_win_prob
        }
    }

    /// Did the worse seed win?
    pub fn is_upset(&self) -> bool {
        self.winner.seed > self.loser.seed
    }
}

/// Winner of the Championship game, if the list has one
pub fn champion(results: &[GameResult]) -> Option<Team> {
    results
        .iter()
        .rev()
        .find(|r| r.round() == CHAMPIONSHIP_ROUND)
        .map(|r| r.winner)
}

/// One csv row per game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub team1: u8,
    pub team2: u8,
    pub seed_team1: u8,
    pub seed_team2: u8,
    pub odds_team1: f64,
    pub team1_win: u8,
    pub tournament_round: u8,
    pub day: u8,
}

impl From<&GameResult> for GameRecord {
    fn from(result: &GameResult) -> Self {
        GameRecord {
            team1: result.matchup.team1.id,
            team2: result.matchup.team2.id,
            seed_team1: result.matchup.team1.seed,
            seed_team2: result.matchup.team2.seed,
            odds_team1: result.team1_win_prob,
            team1_win: result.team1_won() as u8,
            tournament_round: result.round(),
            day: result.day,
        }
    }
}

pub fn write_csv<W: io::Write>(results: &[GameResult], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for result in results {
        wtr.serialize(GameRecord::from(result))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn to_json(results: &[GameResult]) -> Result<String> {
    Ok(serde_json::to_string_pretty(results)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::Region;

    fn sample_result() -> GameResult {
        let one = Team::new(Region::East, 1);
        let sixteen = Team::new(Region::East, 16);
        GameResult::new(Matchup::new(one, sixteen, 0), sixteen, one, 0.98, 2)
    }

    #[test]
    fn test_result_accessors() {
        let result = sample_result();
        assert!(!result.team1_won());
        assert!(result.is_upset());
        assert!((result.winner_prob() - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_champion_needs_title_game() {
        let result = sample_result();
        assert_eq!(champion(&[result]), None);

        let mut title = result;
        title.matchup.round = CHAMPIONSHIP_ROUND;
        assert_eq!(champion(&[result, title]).map(|t| t.seed), Some(16));
    }

    #[test]
    fn test_csv_columns() {
        let mut buf = Vec::new();
        write_csv(&[sample_result()], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("team1,team2,seed_team1,seed_team2,odds_team1,team1_win,tournament_round,day")
        );
        assert_eq!(lines.next(), Some("0,15,1,16,0.98,0,0,2"));
    }

    #[test]
    fn test_json_output() {
        let json = to_json(&[sample_result()]).unwrap();
        let parsed: Vec<GameResult> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, vec![sample_result()]);
    }
}
