use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{CompetitionType, MatchStatus};

// For sqlx
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, sqlx::FromRow)]
pub struct CompetitionModel {
    pub id: Uuid,
    pub external_id: i64,
    pub name: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: CompetitionType,
    pub logo_url: Option<String>,
    pub country: Option<String>,
    pub tier: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, sqlx::FromRow)]
pub struct TeamModel {
    pub id: Uuid,
    pub external_id: i64,
    pub name: String,
    pub short_name: Option<String>,
    pub logo_url: Option<String>,
    pub country: Option<String>,
    pub founded_year: Option<i32>,
    pub venue_name: Option<String>,
    pub venue_capacity: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, sqlx::FromRow)]
pub struct MatchModel {
    pub id: Uuid,
    pub external_id: i64,
    pub competition_id: Uuid,
    pub home_team_id: Uuid,
    pub away_team_id: Uuid,
    pub match_date: DateTime<Utc>,
    pub venue: Option<String>,
    pub season: i32,
    pub round: Option<String>,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub status: MatchStatus,
    pub referee: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Which side won a match that has a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Home,
    Away,
    Draw,
}

impl MatchModel {
    /// Scheduled and kicking off strictly after `now`.
    pub fn is_upcoming_at(&self, now: DateTime<Utc>) -> bool {
        self.status == MatchStatus::Scheduled && self.match_date > now
    }

    pub fn is_upcoming(&self) -> bool {
        self.is_upcoming_at(Utc::now())
    }

    pub fn is_completed(&self) -> bool {
        self.status == MatchStatus::Completed
    }

    pub fn is_live(&self) -> bool {
        self.status == MatchStatus::Live
    }

    pub fn has_result(&self) -> bool {
        self.home_score.is_some() && self.away_score.is_some()
    }

    /// `None` until both scores are known.
    pub fn winner(&self) -> Option<Outcome> {
        let (home, away) = (self.home_score?, self.away_score?);
        Some(match home.cmp(&away) {
            std::cmp::Ordering::Greater => Outcome::Home,
            std::cmp::Ordering::Less => Outcome::Away,
            std::cmp::Ordering::Equal => Outcome::Draw,
        })
    }

    pub fn involves(&self, team_id: Uuid) -> bool {
        self.home_team_id == team_id || self.away_team_id == team_id
    }

    /// Goals for and against from `team_id`'s side, if it played and the result is known.
    pub fn goals_for(&self, team_id: Uuid) -> Option<(i32, i32)> {
        let (home, away) = (self.home_score?, self.away_score?);
        if self.home_team_id == team_id {
            Some((home, away))
        } else if self.away_team_id == team_id {
            Some((away, home))
        } else {
            None
        }
    }
}

/// Current time at the precision the database keeps.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Timestamp for a mutation of a record last touched at `previous`.
///
/// Always strictly after `previous`, even when the clock has not advanced a microsecond.
pub fn touched_after(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}
