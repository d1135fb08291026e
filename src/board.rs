// A board is the live state one or more entries pick against: which teams are still alive
// and the fixed list of matches read from the team table's match numbers.
// A match is active while both of its teams are alive.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::bracket::{TeamId, NUM_TEAMS};
use crate::ingest::TeamTable;

/// How many boards the selection environment keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BoardMode {
    /// One board for everybody: a valid pick by any entry knocks the loser out for all entries,
    /// so the order entries are processed in changes outcomes
    #[default]
    Shared,
    /// Every entry fills its own bracket on its own board
    Independent,
}

impl std::str::FromStr for BoardMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "shared" => Ok(BoardMode::Shared),
            "independent" => Ok(BoardMode::Independent),
            other => Err(format!("unknown board mode '{}', expected shared or independent", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    available: Vec<bool>,
    matches: Vec<(TeamId, TeamId)>,
}

impl Board {
    /// Availability comes from the playable column. Playable teams sharing a match number > 0 form a match;
    /// matches are ordered by match number, lower team id first. Numbers without exactly two teams are dropped.
    pub fn from_table(table: &TeamTable) -> Board {
        let available: Vec<bool> = table.rows().iter().map(|row| row.playable).collect();

        let mut by_number: BTreeMap<u32, Vec<TeamId>> = BTreeMap::new();
        for (idx, row) in table.rows().iter().enumerate() {
            if row.match_no > 0 && row.playable {
                by_number.entry(row.match_no).or_default().push(idx as TeamId);
            }
        }

        let mut matches = Vec::with_capacity(by_number.len());
        for (number, teams) in by_number {
            match teams.as_slice() {
                [a, b] => matches.push((*a, *b)),
                _ => log::warn!("match {} has {} teams, expected 2; skipping it", number, teams.len()),
            }
        }

        Board { available, matches }
    }

    pub fn is_available(&self, team: TeamId) -> bool {
        self.available.get(team as usize).copied().unwrap_or(false)
    }

    pub fn available(&self) -> &[bool] {
        &self.available
    }

    pub fn available_count(&self) -> usize {
        self.available.iter().filter(|&&a| a).count()
    }

    pub fn matches(&self) -> &[(TeamId, TeamId)] {
        &self.matches
    }

    /// Teams of the match at list position `index`
    pub fn match_at(&self, index: usize) -> Option<(TeamId, TeamId)> {
        self.matches.get(index).copied()
    }

    pub fn is_active(&self, index: usize) -> bool {
        self.match_at(index)
            .map(|(a, b)| self.is_available(a) && self.is_available(b))
            .unwrap_or(false)
    }

    /// Index of the first active match (list order) the team plays in
    pub fn active_match_for(&self, team: TeamId) -> Option<usize> {
        self.matches
            .iter()
            .enumerate()
            .find(|(idx, pair)| (pair.0 == team || pair.1 == team) && self.is_active(*idx))
            .map(|(idx, _)| idx)
    }

    pub fn active_match_count(&self) -> usize {
        (0..self.matches.len()).filter(|&idx| self.is_active(idx)).count()
    }

    pub fn has_active_matches(&self) -> bool {
        (0..self.matches.len()).any(|idx| self.is_active(idx))
    }

    /// Settles match `index` in favour of `winner` and knocks the other team out.
    /// Returns the loser, or None when the match is not active or `winner` isn't in it.
    pub fn resolve(&mut self, index: usize, winner: TeamId) -> Option<TeamId> {
        if !self.is_active(index) {
            return None;
        }
        let (a, b) = self.matches[index];
        let loser = if winner == a {
            b
        } else if winner == b {
            a
        } else {
            return None;
        };
        self.available[loser as usize] = false;
        Some(loser)
    }

    /// For every team, the 1-based number of the active match it is in, or 0
    pub fn match_assignments(&self) -> Vec<u32> {
        let mut assignments = vec![0u32; NUM_TEAMS];
        for (idx, &(a, b)) in self.matches.iter().enumerate() {
            if self.is_active(idx) {
                assignments[a as usize] = idx as u32 + 1;
                assignments[b as usize] = idx as u32 + 1;
            }
        }
        assignments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::build_initial_bracket;
    use crate::ingest::TeamRow;
    use crate::odds::OddsTable;

    fn opening_board() -> Board {
        let table = TeamTable::from_bracket(&build_initial_bracket(), &OddsTable::historical()).unwrap();
        Board::from_table(&table)
    }

    #[test]
    fn test_opening_board_has_32_matches() {
        let board = opening_board();
        assert_eq!(board.matches().len(), 32);
        assert_eq!(board.active_match_count(), 32);
        assert_eq!(board.available_count(), 64);
        // match 1 is East 1 v 16
        assert_eq!(board.match_at(0), Some((0, 15)));
    }

    #[test]
    fn test_resolve_knocks_out_loser_once() {
        let mut board = opening_board();
        let idx = board.active_match_for(0).unwrap();
        assert_eq!(board.resolve(idx, 0), Some(15));
        assert!(!board.is_available(15));
        assert!(board.is_available(0));
        assert_eq!(board.active_match_for(0), None);
        assert_eq!(board.resolve(idx, 0), None);
        assert_eq!(board.available_count(), 63);
        assert_eq!(board.active_match_count(), 31);
    }

    #[test]
    fn test_resolve_rejects_outsider() {
        let mut board = opening_board();
        assert_eq!(board.resolve(0, 7), None);
        assert_eq!(board.available_count(), 64);
    }

    #[test]
    fn test_match_assignments() {
        let mut board = opening_board();
        let assignments = board.match_assignments();
        assert_eq!(assignments[0], 1);
        assert_eq!(assignments[15], 1);
        assert!(assignments.iter().all(|&m| m > 0));

        board.resolve(0, 15);
        let assignments = board.match_assignments();
        assert_eq!(assignments[0], 0);
        assert_eq!(assignments[15], 0);
    }

    #[test]
    fn test_incomplete_match_numbers_are_dropped() {
        let mut rows: Vec<TeamRow> = (0..64).map(|i| TeamRow::new(i % 16 + 1, false, 0.5, 0)).collect();
        rows[0] = TeamRow::new(1, true, 0.5, 4);
        rows[1] = TeamRow::new(2, true, 0.5, 4);
        rows[2] = TeamRow::new(3, true, 0.5, 9);
        // unplayable team with a match number is ignored
        rows[3] = TeamRow::new(4, false, 0.5, 9);
        let board = Board::from_table(&TeamTable::new(rows).unwrap());
        assert_eq!(board.matches(), &[(0, 1)]);
        assert_eq!(board.available_count(), 3);
    }

    #[test]
    fn test_board_mode_parse() {
        assert_eq!("Shared".parse::<BoardMode>(), Ok(BoardMode::Shared));
        assert_eq!("independent".parse::<BoardMode>(), Ok(BoardMode::Independent));
        assert!("race".parse::<BoardMode>().is_err());
    }
}
