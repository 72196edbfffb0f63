//! Team records, form and head-to-head summaries.
//!
//! Everything here is derived on demand from finished matches; only matches that
//! are completed and carry both scores count.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{MatchModel, TeamModel};

const FORM_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormResult {
    W,
    D,
    L,
}

impl FormResult {
    fn from_goals(scored: i32, conceded: i32) -> Self {
        match scored.cmp(&conceded) {
            std::cmp::Ordering::Greater => FormResult::W,
            std::cmp::Ordering::Equal => FormResult::D,
            std::cmp::Ordering::Less => FormResult::L,
        }
    }

    fn as_char(self) -> char {
        match self {
            FormResult::W => 'W',
            FormResult::D => 'D',
            FormResult::L => 'L',
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamRecord {
    pub matches_played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub goals_scored: i64,
    pub goals_conceded: i64,
    pub goal_difference: i64,
    pub points: u32,
    pub win_rate: f64,
    pub clean_sheets: u32,
}

impl TeamRecord {
    fn record(&mut self, scored: i32, conceded: i32) {
        self.matches_played += 1;
        match FormResult::from_goals(scored, conceded) {
            FormResult::W => {
                self.wins += 1;
                self.points += 3;
            }
            FormResult::D => {
                self.draws += 1;
                self.points += 1;
            }
            FormResult::L => self.losses += 1,
        }
        self.goals_scored += i64::from(scored);
        self.goals_conceded += i64::from(conceded);
        self.goal_difference = self.goals_scored - self.goals_conceded;
        if conceded == 0 {
            self.clean_sheets += 1;
        }
        self.win_rate = f64::from(self.wins) / f64::from(self.matches_played);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Form {
    /// Most recent first, e.g. `"WWDLW"`.
    pub current_form: String,
    pub last_5_results: Vec<FormResult>,
    pub goals_last_5: i64,
    pub conceded_last_5: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamStats {
    pub team_id: Uuid,
    pub team_name: String,
    pub season: Option<i32>,
    pub overall: TeamRecord,
    pub home: TeamRecord,
    pub away: TeamRecord,
    pub form: Form,
}

/// Meetings between two teams, seen from the first team's side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadToHead {
    pub total_matches: u32,
    pub home_team_wins: u32,
    pub away_team_wins: u32,
    pub draws: u32,
    pub last_5_results: Vec<FormResult>,
}

fn finished(m: &MatchModel) -> bool {
    m.is_completed() && m.has_result()
}

/// Finished matches involving `team_id`, most recent first.
fn played_by<'a>(team_id: Uuid, matches: &'a [MatchModel]) -> Vec<&'a MatchModel> {
    let mut played: Vec<_> = matches
        .iter()
        .filter(|m| finished(m) && m.involves(team_id))
        .collect();
    played.sort_by(|a, b| b.match_date.cmp(&a.match_date));
    played
}

pub fn record(team_id: Uuid, matches: &[MatchModel]) -> TeamRecord {
    let mut overall = TeamRecord::default();
    for (scored, conceded) in played_by(team_id, matches)
        .into_iter()
        .filter_map(|m| m.goals_for(team_id))
    {
        overall.record(scored, conceded);
    }
    overall
}

pub fn form(team_id: Uuid, matches: &[MatchModel]) -> Form {
    let mut form = Form::default();
    for (scored, conceded) in played_by(team_id, matches)
        .into_iter()
        .filter_map(|m| m.goals_for(team_id))
        .take(FORM_WINDOW)
    {
        let result = FormResult::from_goals(scored, conceded);
        form.current_form.push(result.as_char());
        form.last_5_results.push(result);
        form.goals_last_5 += i64::from(scored);
        form.conceded_last_5 += i64::from(conceded);
    }
    form
}

pub fn team_stats(team: &TeamModel, season: Option<i32>, matches: &[MatchModel]) -> TeamStats {
    let mut stats = TeamStats {
        team_id: team.id,
        team_name: team.name.clone(),
        season,
        overall: TeamRecord::default(),
        home: TeamRecord::default(),
        away: TeamRecord::default(),
        form: form(team.id, matches),
    };

    for m in played_by(team.id, matches) {
        let Some((scored, conceded)) = m.goals_for(team.id) else {
            continue;
        };
        stats.overall.record(scored, conceded);
        if m.home_team_id == team.id {
            stats.home.record(scored, conceded);
        } else {
            stats.away.record(scored, conceded);
        }
    }
    stats
}

pub fn head_to_head(team_id: Uuid, opponent_id: Uuid, matches: &[MatchModel]) -> HeadToHead {
    let mut h2h = HeadToHead::default();
    for m in played_by(team_id, matches)
        .into_iter()
        .filter(|m| m.involves(opponent_id))
    {
        let Some((scored, conceded)) = m.goals_for(team_id) else {
            continue;
        };
        let result = FormResult::from_goals(scored, conceded);
        h2h.total_matches += 1;
        match result {
            FormResult::W => h2h.home_team_wins += 1,
            FormResult::L => h2h.away_team_wins += 1,
            FormResult::D => h2h.draws += 1,
        }
        if h2h.last_5_results.len() < FORM_WINDOW {
            h2h.last_5_results.push(result);
        }
    }
    h2h
}
