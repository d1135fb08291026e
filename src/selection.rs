// Multi-entry selection environment.
// Each entry picks one team per step; a pick is accepted when the team is alive, sits in an active match
// and hasn't been claimed by that entry before. Accepted picks knock the opponent out on the entry's board.
// A historical pick log can be replayed on reset to rebuild mid-tournament state.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

use crate::board::{Board, BoardMode};
use crate::bracket::{TeamId, NUM_GAMES, NUM_TEAMS};
use crate::config::EnvSettings;
use crate::error::{Error, Result};
use crate::ingest::{HistoricalRecord, TeamTable};

/// Observation features per team row: available, seed, odds, active match number (0 = none)
pub const FEATURES_PER_TEAM: usize = 4;

/// Gym-style contract the environment is driven through
pub trait Environment {
    fn reset(&mut self, options: Option<ResetOptions>) -> Result<(Observation, ResetInfo)>;
    fn step(&mut self, actions: &[i64]) -> Result<StepOutcome>;
    fn observe(&self) -> Observation;
}

/// Why a pick was turned down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Rejection {
    EntryCompleted,
    NotPlayable,
    NotInActiveMatch,
    AlreadyUsed,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Rejection::EntryCompleted => "entry already completed",
            Rejection::NotPlayable => "team not playable",
            Rejection::NotInActiveMatch => "team not in an active match",
            Rejection::AlreadyUsed => "team already used by this entry",
        };
        write!(f, "{}", reason)
    }
}

/// An accepted pick. `loser` is None for picks carried over from a log whose match is not on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pick {
    pub match_no: i64,
    pub winner: TeamId,
    pub loser: Option<TeamId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Entry {
    /// accepted picks so far
    pub match_count: usize,
    pub completed: bool,
    pub champion: Option<TeamId>,
    /// every team this entry tried, accepted or not
    pub attempts: Vec<TeamId>,
    pub claimed: BTreeSet<TeamId>,
    pub picks: Vec<Pick>,
    /// why the latest stepped pick was turned down, None once a pick is accepted.
    /// Replayed logs carry no reasons, so replay leaves it unset.
    pub last_rejection: Option<Rejection>,
}

/// One board per row block, NUM_TEAMS rows of FEATURES_PER_TEAM values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub boards: Vec<Vec<[f32; FEATURES_PER_TEAM]>>,
}

impl Observation {
    pub fn flatten(&self) -> Vec<f32> {
        self.boards.iter().flatten().flat_map(|row| row.iter().copied()).collect()
    }
}

/// What happened to one entry's action in a step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryDiagnostics {
    pub entry_id: usize,
    pub team_id: TeamId,
    pub team_name: String,
    pub playable: bool,
    pub in_active_match: bool,
    pub already_used: bool,
    pub valid: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepInfo {
    pub entries: Vec<EntryDiagnostics>,
    /// team table of every board with the current availability
    pub boards: Vec<TeamTable>,
    pub history: Vec<HistoricalRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutcome {
    pub observation: Observation,
    pub rewards: Vec<f64>,
    pub reward: f64,
    pub entry_terminated: Vec<bool>,
    /// all entries completed
    pub terminated: bool,
    pub truncated: bool,
    pub info: StepInfo,
}

#[derive(Debug, Clone, Default)]
pub struct ResetOptions {
    /// replaces the team table, also for later bare resets
    pub teams: Option<TeamTable>,
    /// replayed instead of the construction-time log
    pub history: Option<Vec<HistoricalRecord>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResetInfo {
    pub boards: Vec<TeamTable>,
    pub history: Vec<HistoricalRecord>,
    pub completed: Vec<bool>,
}

/// (team, display name, accepted?) for one attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub team_id: TeamId,
    pub name: String,
    pub claimed: bool,
}

#[derive(Debug, Clone)]
pub struct SelectionEnv {
    settings: EnvSettings,
    teams: TeamTable,
    initial_history: Vec<HistoricalRecord>,
    boards: Vec<Board>,
    entries: Vec<Entry>,
    history: Vec<HistoricalRecord>,
}

impl SelectionEnv {
    pub fn new(teams: TeamTable, history: Vec<HistoricalRecord>, settings: EnvSettings) -> Result<SelectionEnv> {
        if settings.num_entries == 0 {
            return Err(Error::Validation("num_entries must be at least 1".to_string()));
        }
        let mut env = SelectionEnv {
            settings,
            teams,
            initial_history: history,
            boards: Vec::new(),
            entries: Vec::new(),
            history: Vec::new(),
        };
        env.rebuild();
        let initial = env.initial_history.clone();
        env.ingest_history(&initial);
        Ok(env)
    }

    pub fn num_entries(&self) -> usize {
        self.settings.num_entries
    }

    pub fn settings(&self) -> &EnvSettings {
        &self.settings
    }

    pub fn teams(&self) -> &TeamTable {
        &self.teams
    }

    pub fn boards(&self) -> &[Board] {
        &self.boards
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn entry(&self, entry_id: usize) -> Option<&Entry> {
        self.entries.get(entry_id)
    }

    pub fn history(&self) -> &[HistoricalRecord] {
        &self.history
    }

    fn board_index(&self, entry_id: usize) -> usize {
        match self.settings.board_mode {
            BoardMode::Shared => 0,
            BoardMode::Independent => entry_id,
        }
    }

    /// Board the entry picks against, None for an unknown entry
    pub fn board_for(&self, entry_id: usize) -> Option<&Board> {
        if entry_id >= self.settings.num_entries {
            return None;
        }
        self.boards.get(self.board_index(entry_id))
    }

    // callers have already checked entry_id < num_entries
    fn entry_board(&self, entry_id: usize) -> &Board {
        &self.boards[self.board_index(entry_id)]
    }

    pub fn all_completed(&self) -> bool {
        self.entries.iter().all(|e| e.completed)
    }

    fn rebuild(&mut self) {
        let board = Board::from_table(&self.teams);
        let num_boards = match self.settings.board_mode {
            BoardMode::Shared => 1,
            BoardMode::Independent => self.settings.num_entries,
        };
        self.boards = vec![board; num_boards];
        self.entries = vec![Entry::default(); self.settings.num_entries];
        self.history.clear();
    }

    // claims the team for the entry, settles match `index` on its board and checks for completion
    fn settle(&mut self, entry_id: usize, index: usize, team: TeamId) -> bool {
        let b = self.board_index(entry_id);
        let loser = match self.boards[b].resolve(index, team) {
            Some(loser) => loser,
            None => return false,
        };
        let board_done = !self.boards[b].has_active_matches();
        let entry = &mut self.entries[entry_id];
        entry.claimed.insert(team);
        entry.match_count += 1;
        entry.picks.push(Pick {
            match_no: index as i64 + 1,
            winner: team,
            loser: Some(loser),
        });
        if board_done {
            entry.completed = true;
            entry.champion = Some(team);
            log::info!("entry {} completed with champion {}", entry_id, self.teams.name(team));
        }
        true
    }

    /// Replays a pick log on top of the current state, in order.
    /// Valid records whose match_no names an active match containing the team resolve that match;
    /// other valid records only count and claim the team.
    pub fn ingest_history(&mut self, records: &[HistoricalRecord]) {
        for record in records {
            if record.entry_id >= self.settings.num_entries || record.team_id as usize >= NUM_TEAMS {
                log::warn!(
                    "skipping history record for entry {} team {}: out of range",
                    record.entry_id,
                    record.team_id
                );
                continue;
            }
            let (entry_id, team) = (record.entry_id, record.team_id);
            self.history.push(*record);
            self.entries[entry_id].attempts.push(team);
            if !record.valid {
                continue;
            }

            let board = self.entry_board(entry_id);
            let slot = usize::try_from(record.match_no.saturating_sub(1))
                .ok()
                .filter(|&idx| board.is_active(idx))
                .filter(|&idx| board.match_at(idx).map_or(false, |pair| pair.0 == team || pair.1 == team));
            let settled = match slot {
                Some(idx) => self.settle(entry_id, idx, team),
                None => false,
            };
            if !settled {
                let entry = &mut self.entries[entry_id];
                entry.claimed.insert(team);
                entry.match_count += 1;
                entry.picks.push(Pick {
                    match_no: record.match_no,
                    winner: team,
                    loser: None,
                });
            }
        }

        for entry in self.entries.iter_mut().filter(|e| !e.completed && e.match_count >= NUM_GAMES) {
            entry.completed = true;
            entry.champion = entry.picks.last().map(|p| p.winner);
        }
        log::debug!("replayed {} history records", records.len());
    }

    fn board_tables(&self) -> Vec<TeamTable> {
        self.boards
            .iter()
            .map(|board| self.teams.with_availability(board.available()))
            .collect()
    }

    fn evaluate(&self, entry_id: usize, team: TeamId) -> (EntryDiagnostics, Option<Rejection>) {
        let entry = &self.entries[entry_id];
        let board = self.entry_board(entry_id);
        let playable = board.is_available(team);
        let in_active_match = board.active_match_for(team).is_some();
        let already_used = entry.claimed.contains(&team);

        let rejection = if entry.completed {
            Some(Rejection::EntryCompleted)
        } else if !playable {
            Some(Rejection::NotPlayable)
        } else if !in_active_match {
            Some(Rejection::NotInActiveMatch)
        } else if already_used {
            Some(Rejection::AlreadyUsed)
        } else {
            None
        };

        let diagnostics = EntryDiagnostics {
            entry_id,
            team_id: team,
            team_name: self.teams.name(team),
            playable,
            in_active_match,
            already_used,
            valid: rejection.is_none(),
            reason: rejection.map(|r| r.to_string()),
        };
        (diagnostics, rejection)
    }

    /// Every attempt the entry made, in order
    pub fn entry_selections(&self, entry_id: usize) -> Result<Vec<Selection>> {
        let entry = self
            .entries
            .get(entry_id)
            .ok_or_else(|| Error::Validation(format!("no entry {}", entry_id)))?;
        Ok(entry
            .attempts
            .iter()
            .map(|&team| Selection {
                team_id: team,
                name: self.teams.name(team),
                claimed: entry.claimed.contains(&team),
            })
            .collect())
    }

    pub fn entry_report(&self, entry_id: usize) -> Result<String> {
        let selections = self.entry_selections(entry_id)?;
        let entry = &self.entries[entry_id];
        let mut report = format!(
            "Entry {}: {} picks, {}\n",
            entry_id,
            entry.match_count,
            if entry.completed { "completed" } else { "active" }
        );
        if let Some(champion) = entry.champion {
            report.push_str(&format!("  Champion: {}\n", self.teams.name(champion)));
        }
        for pick in &entry.picks {
            match pick.loser {
                Some(loser) => report.push_str(&format!(
                    "  match {:>2}: {} over {}\n",
                    pick.match_no,
                    self.teams.name(pick.winner),
                    self.teams.name(loser)
                )),
                None => report.push_str(&format!("  earlier: {}\n", self.teams.name(pick.winner))),
            }
        }
        let rejected = selections.iter().filter(|s| !s.claimed).count();
        if rejected > 0 {
            report.push_str(&format!("  rejected attempts: {}\n", rejected));
        }
        if let (Some(reason), Some(&team)) = (entry.last_rejection, entry.attempts.last()) {
            report.push_str(&format!("  last attempt: {} ({})\n", self.teams.name(team), reason));
        }
        Ok(report)
    }
}

impl Environment for SelectionEnv {
    fn reset(&mut self, options: Option<ResetOptions>) -> Result<(Observation, ResetInfo)> {
        let options = options.unwrap_or_default();
        if let Some(teams) = options.teams {
            self.teams = teams;
        }
        self.rebuild();
        let history = options.history.unwrap_or_else(|| self.initial_history.clone());
        self.ingest_history(&history);

        let info = ResetInfo {
            boards: self.board_tables(),
            history: self.history.clone(),
            completed: self.entries.iter().map(|e| e.completed).collect(),
        };
        Ok((self.observe(), info))
    }

    fn step(&mut self, actions: &[i64]) -> Result<StepOutcome> {
        if actions.len() != self.settings.num_entries {
            return Err(Error::Validation(format!(
                "expected {} actions, got {}",
                self.settings.num_entries,
                actions.len()
            )));
        }

        let mut rewards = vec![0.0; actions.len()];
        let mut diagnostics = Vec::with_capacity(actions.len());
        for (entry_id, &action) in actions.iter().enumerate() {
            let team = action.rem_euclid(NUM_TEAMS as i64) as TeamId;
            let (diag, rejection) = self.evaluate(entry_id, team);
            self.entries[entry_id].attempts.push(team);

            let settled = match rejection {
                Some(reason) => {
                    log::debug!("entry {} pick {} rejected: {}", entry_id, team, reason);
                    self.entries[entry_id].last_rejection = Some(reason);
                    None
                }
                None => {
                    let slot = self.entry_board(entry_id).active_match_for(team);
                    match slot {
                        Some(idx) if self.settle(entry_id, idx, team) => Some(idx),
                        _ => None,
                    }
                }
            };

            match settled {
                Some(idx) => {
                    self.entries[entry_id].last_rejection = None;
                    rewards[entry_id] = if self.entries[entry_id].completed {
                        self.settings.completion_reward
                    } else {
                        self.settings.step_reward
                    };
                    self.history.push(HistoricalRecord::valid(entry_id, team, idx + 1));
                }
                None => self.history.push(HistoricalRecord::invalid(entry_id, team)),
            }
            diagnostics.push(diag);
        }

        Ok(StepOutcome {
            observation: self.observe(),
            reward: rewards.iter().sum(),
            rewards,
            entry_terminated: self.entries.iter().map(|e| e.completed).collect(),
            terminated: self.all_completed(),
            truncated: false,
            info: StepInfo {
                entries: diagnostics,
                boards: self.board_tables(),
                history: self.history.clone(),
            },
        })
    }

    fn observe(&self) -> Observation {
        let boards = self
            .boards
            .iter()
            .map(|board| {
                let assignments = board.match_assignments();
                self.teams
                    .rows()
                    .iter()
                    .enumerate()
                    .map(|(idx, row)| {
                        [
                            board.is_available(idx as TeamId) as u8 as f32,
                            row.seed as f32,
                            row.odds as f32,
                            assignments[idx] as f32,
                        ]
                    })
                    .collect()
            })
            .collect();
        Observation { boards }
    }
}

impl fmt::Display for SelectionEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Selection environment: {} entries, {:?} boards, {} history records",
            self.settings.num_entries,
            self.settings.board_mode,
            self.history.len()
        )?;
        for (idx, board) in self.boards.iter().enumerate() {
            writeln!(
                f,
                "Board {}: {} teams alive, {} active matches",
                idx,
                board.available_count(),
                board.active_match_count()
            )?;
        }
        for entry_id in 0..self.entries.len() {
            let report = self.entry_report(entry_id).map_err(|_| fmt::Error)?;
            write!(f, "{}", report)?;
        }
        Ok(())
    }
}
