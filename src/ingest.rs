// This file ingests the tables the selection environment runs on and writes them back out:
// the 64-row team table (seed, playable flag, odds, match number, optional name)
// and the append-only historical log of picks.
// Team tables are shape-checked when built, log rows that can't be read are skipped with a warning.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

use crate::bracket::{Team, TeamId, FIRST_ROUND_SEEDS, NUM_TEAMS};
use crate::error::{Error, Result};
use crate::odds::OddsTable;

/// One team's row: seed, whether it is still alive, an odds proxy and its current match number (0 = unpaired)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRow {
    pub seed: u8,
    pub playable: bool,
    pub odds: f64,
    pub match_no: u32,
    pub name: Option<String>,
}

impl TeamRow {
    pub fn new(seed: u8, playable: bool, odds: f64, match_no: u32) -> TeamRow {
        TeamRow {
            seed,
            playable,
            odds,
            match_no,
            name: None,
        }
    }
}

// csv layout: teamseed,playable,odds,match no,teamname
#[derive(Debug, Serialize, Deserialize)]
struct TeamCsvRow {
    teamseed: u8,
    playable: u8,
    odds: f64,
    #[serde(rename = "match no", default)]
    match_no: Option<u32>,
    #[serde(default)]
    teamname: Option<String>,
}

impl From<TeamCsvRow> for TeamRow {
    fn from(row: TeamCsvRow) -> Self {
        TeamRow {
            seed: row.teamseed,
            playable: row.playable != 0,
            odds: row.odds,
            match_no: row.match_no.unwrap_or(0),
            name: row.teamname.filter(|n| !n.is_empty()),
        }
    }
}

impl From<&TeamRow> for TeamCsvRow {
    fn from(row: &TeamRow) -> Self {
        TeamCsvRow {
            teamseed: row.seed,
            playable: row.playable as u8,
            odds: row.odds,
            match_no: Some(row.match_no),
            teamname: row.name.clone(),
        }
    }
}

/// Exactly one row per team, indexed by team id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamTable {
    rows: Vec<TeamRow>,
}

impl TeamTable {
    pub fn new(rows: Vec<TeamRow>) -> Result<TeamTable> {
        if rows.len() != NUM_TEAMS {
            return Err(Error::TeamTableShape {
                expected: NUM_TEAMS,
                actual: rows.len(),
            });
        }
        Ok(TeamTable { rows })
    }

    /// Opening-round table for a fresh bracket: everyone playable, odds = round 0 win rate of the seed,
    /// match numbers follow the first-round slots (region * 8 + game + 1)
    pub fn from_bracket(teams: &[Team], odds: &OddsTable) -> Result<TeamTable> {
        let rows = teams
            .iter()
            .map(|team| {
                let game = FIRST_ROUND_SEEDS
                    .iter()
                    .position(|pair| pair.contains(&team.seed))
                    .unwrap_or(0);
                let match_no = (team.region.index() * FIRST_ROUND_SEEDS.len() + game + 1) as u32;
                Ok(TeamRow::new(team.seed, true, odds.win_rate(team.seed, 0)?, match_no))
            })
            .collect::<Result<Vec<_>>>()?;
        TeamTable::new(rows)
    }

    pub fn from_reader<R: io::Read>(reader: R) -> Result<TeamTable> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut rows = Vec::with_capacity(NUM_TEAMS);
        for row in rdr.deserialize::<TeamCsvRow>() {
            rows.push(TeamRow::from(row?));
        }
        TeamTable::new(rows)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<TeamTable> {
        let file = std::fs::File::open(path)?;
        TeamTable::from_reader(file)
    }

    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        for row in &self.rows {
            wtr.serialize(TeamCsvRow::from(row))?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn rows(&self) -> &[TeamRow] {
        &self.rows
    }

    pub fn get(&self, team: TeamId) -> Option<&TeamRow> {
        self.rows.get(team as usize)
    }

    pub fn name(&self, team: TeamId) -> String {
        self.get(team)
            .and_then(|row| row.name.clone())
            .unwrap_or_else(|| format!("Team_{}", team))
    }

    /// Copy of the table with the playable column replaced
    pub fn with_availability(&self, available: &[bool]) -> TeamTable {
        let mut table = self.clone();
        for (row, &alive) in table.rows.iter_mut().zip(available) {
            row.playable = alive;
        }
        table
    }
}

/// One line of the pick log; invalid picks carry match_no = -1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub entry_id: usize,
    pub team_id: TeamId,
    pub match_no: i64,
    pub valid: bool,
}

impl HistoricalRecord {
    pub fn valid(entry_id: usize, team_id: TeamId, match_no: usize) -> HistoricalRecord {
        HistoricalRecord {
            entry_id,
            team_id,
            match_no: match_no as i64,
            valid: true,
        }
    }

    pub fn invalid(entry_id: usize, team_id: TeamId) -> HistoricalRecord {
        HistoricalRecord {
            entry_id,
            team_id,
            match_no: -1,
            valid: false,
        }
    }
}

// accepts "3" as well as "3.0" since logs often pass through spreadsheets
fn parse_int(field: &str) -> Option<i64> {
    let field = field.trim();
    if let Ok(v) = field.parse::<i64>() {
        return Some(v);
    }
    match field.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v.is_finite() => Some(v as i64),
        _ => None,
    }
}

fn parse_bool(field: &str) -> Option<bool> {
    match field.trim().to_lowercase().as_str() {
        "true" | "t" | "1" | "1.0" | "yes" => Some(true),
        "false" | "f" | "0" | "0.0" | "no" => Some(false),
        _ => None,
    }
}

/// Reads a log with columns entry_id,team_id,match_no,valid.
/// Rows that can't be read (bad csv, invalid utf-8), or with a missing or non-integer entry_id/team_id,
/// or an unreadable valid flag, are skipped with a warning.
/// A missing match_no counts as -1 and a missing valid flag as true.
pub fn read_history<R: io::Read>(reader: R) -> Result<Vec<HistoricalRecord>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.byte_headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| std::str::from_utf8(h).map_or(false, |h| h.trim() == name))
    };
    let entry_col = column("entry_id");
    let team_col = column("team_id");
    let match_col = column("match_no");
    let valid_col = column("valid");

    let mut records = Vec::new();
    for (line, result) in rdr.byte_records().enumerate() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                log::warn!("skipping history row {}: {}", line + 1, e);
                continue;
            }
        };
        if row.iter().any(|f| std::str::from_utf8(f).is_err()) {
            log::warn!("skipping history row {}: invalid utf-8", line + 1);
            continue;
        }
        let field = |col: Option<usize>| {
            col.and_then(|c| row.get(c))
                .and_then(|f| std::str::from_utf8(f).ok())
                .filter(|f| !f.trim().is_empty())
        };

        let entry_id = field(entry_col).and_then(parse_int).filter(|&v| v >= 0);
        let team_id = field(team_col).and_then(parse_int).filter(|&v| (0..=TeamId::MAX as i64).contains(&v));
        let (entry_id, team_id) = match (entry_id, team_id) {
            (Some(e), Some(t)) => (e as usize, t as TeamId),
            _ => {
                log::warn!("skipping history row {}: bad entry_id or team_id {:?}", line + 1, row);
                continue;
            }
        };
        let match_no = match field(match_col) {
            None => -1,
            Some(f) => match parse_int(f) {
                Some(v) => v,
                None => {
                    log::warn!("skipping history row {}: bad match_no {:?}", line + 1, f);
                    continue;
                }
            },
        };
        let valid = match field(valid_col) {
            None => true,
            Some(f) => match parse_bool(f) {
                Some(v) => v,
                None => {
                    log::warn!("skipping history row {}: bad valid flag {:?}", line + 1, f);
                    continue;
                }
            },
        };
        records.push(HistoricalRecord {
            entry_id,
            team_id,
            match_no,
            valid,
        });
    }
    Ok(records)
}

pub fn read_history_path<P: AsRef<Path>>(path: P) -> Result<Vec<HistoricalRecord>> {
    let file = std::fs::File::open(path)?;
    read_history(file)
}

pub fn write_history<W: io::Write>(records: &[HistoricalRecord], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::build_initial_bracket;

    fn team_csv(rows: usize) -> String {
        let mut csv = String::from("teamseed,playable,odds,match no,teamname\n");
        for i in 0..rows {
            csv.push_str(&format!("{},1,0.5,{},\n", i % 16 + 1, i / 2 + 1));
        }
        csv
    }

    #[test]
    fn test_team_table_shape_is_checked() {
        let err = TeamTable::from_reader(team_csv(63).as_bytes()).unwrap_err();
        assert!(matches!(err, Error::TeamTableShape { expected: 64, actual: 63 }));
        assert!(TeamTable::from_reader(team_csv(64).as_bytes()).is_ok());
    }

    #[test]
    fn test_team_table_optional_columns() {
        let mut csv = String::from("teamseed,playable,odds,match no,teamname\n");
        csv.push_str("1,1,0.9,,Duke\n");
        for i in 1..64 {
            csv.push_str(&format!("{},0,0.1,0,\n", i % 16 + 1));
        }
        let table = TeamTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.get(0).unwrap().match_no, 0);
        assert_eq!(table.name(0), "Duke");
        assert_eq!(table.name(5), "Team_5");
        assert!(!table.get(5).unwrap().playable);
    }

    #[test]
    fn test_from_bracket_pairs_first_round() {
        let table = TeamTable::from_bracket(&build_initial_bracket(), &OddsTable::historical()).unwrap();
        // East 1 seed and East 16 seed share match 1, West 2 seed plays in West's last slot (8 + 8)
        assert_eq!(table.get(0).unwrap().match_no, 1);
        assert_eq!(table.get(15).unwrap().match_no, 1);
        assert_eq!(table.get(16 + 1).unwrap().match_no, 16);
        assert!(table.rows().iter().all(|r| r.playable));
        for m in 1..=32 {
            assert_eq!(table.rows().iter().filter(|r| r.match_no == m).count(), 2);
        }
    }

    #[test]
    fn test_team_table_csv_round_trip() {
        let table = TeamTable::from_bracket(&build_initial_bracket(), &OddsTable::historical()).unwrap();
        let mut buf = Vec::new();
        table.write_csv(&mut buf).unwrap();
        assert!(String::from_utf8(buf.clone()).unwrap().starts_with("teamseed,playable,odds,match no,teamname"));
        assert_eq!(TeamTable::from_reader(buf.as_slice()).unwrap(), table);
    }

    #[test]
    fn test_with_availability() {
        let table = TeamTable::from_bracket(&build_initial_bracket(), &OddsTable::historical()).unwrap();
        let mut mask = vec![true; 64];
        mask[3] = false;
        let updated = table.with_availability(&mask);
        assert!(!updated.get(3).unwrap().playable);
        assert!(table.get(3).unwrap().playable);
    }

    #[test]
    fn test_read_history_skips_malformed_rows() {
        let log = "entry_id,team_id,match_no,valid\n\
                   0,5,3,True\n\
                   x,5,3,True\n\
                   1,,2,True\n\
                   1.0,7.0,-1,False\n\
                   2,9,abc,True\n\
                   2,300,1,True\n\
                   3,4\n";
        let records = read_history(log.as_bytes()).unwrap();
        assert_eq!(
            records,
            vec![
                HistoricalRecord::valid(0, 5, 3),
                HistoricalRecord::invalid(1, 7),
                HistoricalRecord { entry_id: 3, team_id: 4, match_no: -1, valid: true },
            ]
        );
    }

    #[test]
    fn test_read_history_skips_non_utf8_rows() {
        let mut log = b"entry_id,team_id,match_no,valid\n0,5,3,True\n1,".to_vec();
        log.extend_from_slice(&[0xff, 0xfe]);
        log.extend_from_slice(b",2,True\n2,6,4,True\n");
        let records = read_history(log.as_slice()).unwrap();
        assert_eq!(records, vec![HistoricalRecord::valid(0, 5, 3), HistoricalRecord::valid(2, 6, 4)]);
    }

    #[test]
    fn test_history_written_with_expected_header() {
        let mut buf = Vec::new();
        write_history(&[HistoricalRecord::valid(0, 1, 2), HistoricalRecord::invalid(1, 3)], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "entry_id,team_id,match_no,valid\n0,1,2,true\n1,3,-1,false\n");
        assert_eq!(read_history(text.as_bytes()).unwrap().len(), 2);
    }
}
