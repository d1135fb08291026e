//This contains the tournament simulation driven by seed win rates.
//A Matchup pairs two teams in a round, play_round resolves a list of matchups into GameResults and the next round's matchups.
//BracketEngine runs the four regions through the regional final, then the Final Four and the Championship, for 63 games total.
//Every random draw comes from the rng handed in by the caller so a seeded rng reproduces a whole tournament.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::game_result::GameResult;
use crate::odds::OddsModel;

pub type TeamId = u8;

pub const NUM_REGIONS: usize = 4;
pub const SEEDS_PER_REGION: usize = 16;
pub const NUM_TEAMS: usize = NUM_REGIONS * SEEDS_PER_REGION;
pub const NUM_GAMES: usize = NUM_TEAMS - 1;

pub const REGIONAL_FINAL_ROUND: u8 = 3;
pub const FINAL_FOUR_ROUND: u8 = 4;
pub const CHAMPIONSHIP_ROUND: u8 = 5;

//structure of round one: which seed plays which, in bracket order.
//winners of neighbouring games meet in the next round, so this order is a contract.
pub const FIRST_ROUND_SEEDS: [[u8; 2]; 8] = [
    [1, 16],
    [8, 9],
    [5, 12],
    [4, 13],
    [6, 11],
    [3, 14],
    [7, 10],
    [2, 15],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    East,
    West,
    South,
    Midwest,
}

impl Region {
    pub const ALL: [Region; NUM_REGIONS] = [Region::East, Region::West, Region::South, Region::Midwest];

    pub fn index(self) -> usize {
        match self {
            Region::East => 0,
            Region::West => 1,
            Region::South => 2,
            Region::Midwest => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Region::East => "East",
            Region::West => "West",
            Region::South => "South",
            Region::Midwest => "Midwest",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub seed: u8,
    pub region: Region,
}

impl Team {
    pub fn new(region: Region, seed: u8) -> Team {
        Team {
            id: team_id(region, seed),
            seed,
            region,
        }
    }
}

/// Ids run sequentially per region: East 1 seed is 0, Midwest 16 seed is 63
pub fn team_id(region: Region, seed: u8) -> TeamId {
    (region.index() * SEEDS_PER_REGION) as TeamId + seed - 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matchup {
    pub team1: Team,
    pub team2: Team,
    pub round: u8,
}

impl Matchup {
    pub fn new(team1: Team, team2: Team, round: u8) -> Matchup {
        Matchup { team1, team2, round }
    }

    pub fn contains(&self, id: TeamId) -> bool {
        self.team1.id == id || self.team2.id == id
    }
}

/// All 64 teams, region by region, seeds 1..16 within each region
pub fn build_initial_bracket() -> Vec<Team> {
    let mut teams = Vec::with_capacity(NUM_TEAMS);
    for region in Region::ALL {
        for seed in 1..=SEEDS_PER_REGION as u8 {
            teams.push(Team::new(region, seed));
        }
    }
    teams
}

/// The eight opening games of one region in bracket order
pub fn first_round_matchups(region_teams: &[Team]) -> Result<Vec<Matchup>> {
    let region = region_teams.first().map(|t| t.region).unwrap_or(Region::East);
    let by_seed = |seed: u8| {
        region_teams
            .iter()
            .find(|t| t.seed == seed)
            .copied()
            .ok_or(Error::MissingTeam { region, seed })
    };

    FIRST_ROUND_SEEDS
        .iter()
        .map(|&[s1, s2]| Ok(Matchup::new(by_seed(s1)?, by_seed(s2)?, 0)))
        .collect()
}

/// Pairs neighbouring winners (0 & 1, 2 & 3, ...) into next-round matchups.
/// `results` must stay in bracket order; a trailing unpaired result is dropped.
pub fn advance(results: &[GameResult]) -> Vec<Matchup> {
    results
        .chunks_exact(2)
        .map(|pair| Matchup::new(pair[0].winner, pair[1].winner, pair[0].round() + 1))
        .collect()
}

/// Puts the first two regional finals on day 1 and the rest on day 2
pub fn rebalance_regional_finals(results: &mut [GameResult]) {
    let mut seen = 0;
    for result in results.iter_mut().filter(|r| r.round() == REGIONAL_FINAL_ROUND) {
        result.day = if seen < 2 { 1 } else { 2 };
        seen += 1;
    }
}

#[derive(Debug, Clone)]
pub struct BracketEngine {
    odds: OddsModel,
    teams: Vec<Team>,
}

impl BracketEngine {
    pub fn new(odds: OddsModel) -> BracketEngine {
        BracketEngine {
            odds,
            teams: build_initial_bracket(),
        }
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn odds(&self) -> &OddsModel {
        &self.odds
    }

    pub fn region_teams(&self, region: Region) -> Vec<Team> {
        self.teams.iter().filter(|t| t.region == region).copied().collect()
    }

    /// Resolves every matchup and returns the results together with the next round's matchups.
    /// With `day_count == 2` the games are split ceil(n/2) / floor(n/2) over two days in shuffled order,
    /// otherwise every game is on day 1.
    pub fn play_round<R: Rng + ?Sized>(
        &self,
        matchups: &[Matchup],
        round: u8,
        day_count: u8,
        rng: &mut R,
    ) -> Result<(Vec<GameResult>, Vec<Matchup>)> {
        let n = matchups.len();
        let days: Vec<u8> = if day_count == 2 {
            let mut days = vec![1u8; (n + 1) / 2];
            days.extend(std::iter::repeat(2u8).take(n / 2));
            days.shuffle(rng);
            days
        } else {
            vec![1u8; n]
        };

        let mut results = Vec::with_capacity(n);
        for (matchup, day) in matchups.iter().zip(days) {
            let matchup = Matchup { round, ..*matchup };
            let team1prob = self.odds.win_probability(matchup.team1.seed, matchup.team2.seed, round)?;
            let rand_num: f64 = rng.gen();
            let (winner, loser) = if rand_num < team1prob {
                (matchup.team1, matchup.team2)
            } else {
                (matchup.team2, matchup.team1)
            };
            results.push(GameResult::new(matchup, winner, loser, team1prob, day));
        }

        let next = advance(&results);
        Ok((results, next))
    }

    /// Plays a whole tournament: 32 + 16 + 8 + 4 regional games, 2 Final Four games and the Championship.
    /// Results come back region by region (rounds 0-3), then the Final Four, then the Championship.
    pub fn run_full_bracket<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<GameResult>> {
        let mut games: Vec<GameResult> = Vec::with_capacity(NUM_GAMES);
        let mut regional_champions: Vec<Team> = Vec::with_capacity(NUM_REGIONS);

        for region in Region::ALL {
            let mut matchups = first_round_matchups(&self.region_teams(region))?;
            for round in 0..=REGIONAL_FINAL_ROUND {
                let day_count = if round < REGIONAL_FINAL_ROUND { 2 } else { 1 };
                let (results, next) = self.play_round(&matchups, round, day_count, rng)?;
                if round == REGIONAL_FINAL_ROUND {
                    regional_champions.extend(results.iter().map(|r| r.winner));
                }
                games.extend(results);
                matchups = next;
            }
        }
        debug_assert_eq!(regional_champions.len(), NUM_REGIONS);

        rebalance_regional_finals(&mut games);

        //East plays West, South plays Midwest
        let final_four = [
            Matchup::new(regional_champions[0], regional_champions[1], FINAL_FOUR_ROUND),
            Matchup::new(regional_champions[2], regional_champions[3], FINAL_FOUR_ROUND),
        ];
        let (semifinals, championship) = self.play_round(&final_four, FINAL_FOUR_ROUND, 1, rng)?;
        games.extend(semifinals);

        let (title_game, _) = self.play_round(&championship, CHAMPIONSHIP_ROUND, 1, rng)?;
        games.extend(title_game);

        debug_assert_eq!(games.len(), NUM_GAMES);
        Ok(games)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_result::champion;
    use crate::odds::OddsTable;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashSet;

    fn setup_engine() -> BracketEngine {
        BracketEngine::new(OddsModel::new(OddsTable::historical()))
    }

    #[test]
    fn test_initial_bracket_ids_and_seeds() {
        let teams = build_initial_bracket();
        assert_eq!(teams.len(), 64);
        for (idx, team) in teams.iter().enumerate() {
            assert_eq!(team.id as usize, idx);
            assert_eq!(team.seed as usize, idx % 16 + 1);
            assert_eq!(team.region.index(), idx / 16);
        }
        assert_eq!(team_id(Region::Midwest, 16), 63);
    }

    #[test]
    fn test_first_round_order() {
        let engine = setup_engine();
        let matchups = first_round_matchups(&engine.region_teams(Region::South)).unwrap();
        let seeds: Vec<[u8; 2]> = matchups.iter().map(|m| [m.team1.seed, m.team2.seed]).collect();
        assert_eq!(seeds, FIRST_ROUND_SEEDS.to_vec());
        assert!(matchups.iter().all(|m| m.round == 0 && m.team1.region == Region::South));
    }

    #[test]
    fn test_first_round_missing_seed() {
        let teams: Vec<Team> = (1..=15).map(|s| Team::new(Region::West, s)).collect();
        let err = first_round_matchups(&teams).unwrap_err();
        assert!(matches!(err, Error::MissingTeam { region: Region::West, seed: 16 }));
    }

    #[test]
    fn test_play_round_day_split() {
        let engine = setup_engine();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let matchups = first_round_matchups(&engine.region_teams(Region::East)).unwrap();
        let (results, next) = engine.play_round(&matchups, 0, 2, &mut rng).unwrap();
        assert_eq!(results.len(), 8);
        assert_eq!(next.len(), 4);
        assert_eq!(results.iter().filter(|r| r.day == 1).count(), 4);
        assert_eq!(results.iter().filter(|r| r.day == 2).count(), 4);

        let (results, _) = engine.play_round(&next, 1, 1, &mut rng).unwrap();
        assert!(results.iter().all(|r| r.day == 1));
    }

    #[test]
    fn test_play_round_odd_count_puts_extra_game_on_day_one() {
        let engine = setup_engine();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let matchups = first_round_matchups(&engine.region_teams(Region::East)).unwrap();
        let (results, next) = engine.play_round(&matchups[..3], 0, 2, &mut rng).unwrap();
        assert_eq!(results.iter().filter(|r| r.day == 1).count(), 2);
        assert_eq!(results.iter().filter(|r| r.day == 2).count(), 1);
        assert_eq!(next.len(), 1);
    }

    #[test]
    fn test_advance_pairs_neighbours() {
        let engine = setup_engine();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let matchups = first_round_matchups(&engine.region_teams(Region::East)).unwrap();
        let (results, _) = engine.play_round(&matchups, 0, 2, &mut rng).unwrap();
        let next = advance(&results);
        for (i, m) in next.iter().enumerate() {
            assert_eq!(m.team1, results[2 * i].winner);
            assert_eq!(m.team2, results[2 * i + 1].winner);
            assert_eq!(m.round, 1);
        }
    }

    #[test]
    fn test_full_bracket_shape() {
        let engine = setup_engine();
        let mut rng = ChaCha8Rng::seed_from_u64(2024);
        let games = engine.run_full_bracket(&mut rng).unwrap();
        assert_eq!(games.len(), 63);

        let per_round: Vec<usize> = (0..6).map(|r| games.iter().filter(|g| g.round() == r).count()).collect();
        assert_eq!(per_round, vec![32, 16, 8, 4, 2, 1]);
        assert!(champion(&games).is_some());

        let mut losers = HashSet::new();
        for game in &games {
            assert!(losers.insert(game.loser.id), "team {} lost twice", game.loser.id);
            assert!(game.matchup.contains(game.winner.id) && game.matchup.contains(game.loser.id));
        }
        assert_eq!(losers.len(), 63);
        assert!(!losers.contains(&champion(&games).unwrap().id));
    }

    #[test]
    fn test_day_balance() {
        let engine = setup_engine();
        for seed in 0..20 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let games = engine.run_full_bracket(&mut rng).unwrap();
            for region in Region::ALL {
                for round in 0..REGIONAL_FINAL_ROUND {
                    let in_round: Vec<&GameResult> = games
                        .iter()
                        .filter(|g| g.round() == round && g.matchup.team1.region == region)
                        .collect();
                    let day1 = in_round.iter().filter(|g| g.day == 1).count() as i64;
                    let day2 = in_round.iter().filter(|g| g.day == 2).count() as i64;
                    assert!((day1 - day2).abs() <= 1);
                }
            }
            let finals: Vec<u8> = games.iter().filter(|g| g.round() == 3).map(|g| g.day).collect();
            assert_eq!(finals, vec![1, 1, 2, 2]);
            assert!(games.iter().filter(|g| g.round() >= 4).all(|g| g.day == 1));
        }
    }

    #[test]
    fn test_full_bracket_is_reproducible() {
        let engine = setup_engine();
        let a = engine.run_full_bracket(&mut ChaCha8Rng::seed_from_u64(99)).unwrap();
        let b = engine.run_full_bracket(&mut ChaCha8Rng::seed_from_u64(99)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_final_four_pairs_regions() {
        let engine = setup_engine();
        let games = engine.run_full_bracket(&mut ChaCha8Rng::seed_from_u64(8)).unwrap();
        let semis: Vec<&GameResult> = games.iter().filter(|g| g.round() == FINAL_FOUR_ROUND).collect();
        assert_eq!(semis[0].matchup.team1.region, Region::East);
        assert_eq!(semis[0].matchup.team2.region, Region::West);
        assert_eq!(semis[1].matchup.team1.region, Region::South);
        assert_eq!(semis[1].matchup.team2.region, Region::Midwest);
    }

    #[test]
    fn test_missing_odds_aborts_run() {
        let mut table = OddsTable::new();
        for seed in 1..=16 {
            table.insert(seed, 0, 0.5).unwrap();
        }
        let engine = BracketEngine::new(OddsModel::new(table));
        let err = engine.run_full_bracket(&mut ChaCha8Rng::seed_from_u64(1)).unwrap_err();
        assert!(matches!(err, Error::InvalidSeed { round: 1, .. }));
    }
}
