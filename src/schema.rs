use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use uuid::Uuid;

use crate::error::ConstraintViolation;
use crate::model::{CompetitionModel, MatchModel, Outcome, TeamModel};
use crate::stats::{HeadToHead, TeamRecord};
use crate::store::{double_option, MatchPatch, NewCompetition, NewMatch, NewTeam};

#[derive(Deserialize, Debug, Default)]
pub struct Pagination {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq, Eq, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "match_status", rename_all = "lowercase")]
pub enum MatchStatus {
    #[default]
    Scheduled,
    Live,
    Completed,
    Postponed,
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "scheduled",
            MatchStatus::Live => "live",
            MatchStatus::Completed => "completed",
            MatchStatus::Postponed => "postponed",
            MatchStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for MatchStatus {
    type Error = ConstraintViolation;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "scheduled" => Ok(MatchStatus::Scheduled),
            "live" => Ok(MatchStatus::Live),
            "completed" => Ok(MatchStatus::Completed),
            "postponed" => Ok(MatchStatus::Postponed),
            "cancelled" => Ok(MatchStatus::Cancelled),
            _ => Err(ConstraintViolation::InvalidValue {
                field: "status",
                value: s.to_owned(),
            }),
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "competition_type", rename_all = "lowercase")]
pub enum CompetitionType {
    League,
    Cup,
    International,
    Friendly,
}

impl TryFrom<&str> for CompetitionType {
    type Error = ConstraintViolation;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "league" => Ok(CompetitionType::League),
            "cup" => Ok(CompetitionType::Cup),
            "international" => Ok(CompetitionType::International),
            "friendly" => Ok(CompetitionType::Friendly),
            _ => Err(ConstraintViolation::InvalidValue {
                field: "type",
                value: s.to_owned(),
            }),
        }
    }
}

/// Which side of a fixture a team filter looks at.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    Home,
    Away,
    #[default]
    Either,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

// Requests

#[derive(Deserialize, Debug, Default)]
pub struct MatchListParams {
    pub competition_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub role: Option<TeamRole>,
    pub status: Option<String>,
    pub season: Option<i32>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub order: Option<SortOrder>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
pub struct SeasonParams {
    pub season: Option<i32>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CreateCompetitionSchema {
    pub external_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub logo_url: Option<String>,
    pub country: Option<String>,
    pub tier: Option<i32>,
}

impl TryFrom<CreateCompetitionSchema> for NewCompetition {
    type Error = ConstraintViolation;

    fn try_from(c: CreateCompetitionSchema) -> Result<Self, Self::Error> {
        Ok(Self {
            kind: CompetitionType::try_from(c.kind.as_str())?,
            external_id: c.external_id,
            name: c.name,
            logo_url: c.logo_url,
            country: c.country,
            tier: c.tier,
        })
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CreateTeamSchema {
    pub external_id: i64,
    pub name: String,
    pub short_name: Option<String>,
    pub logo_url: Option<String>,
    pub country: Option<String>,
    pub founded_year: Option<i32>,
    pub venue_name: Option<String>,
    pub venue_capacity: Option<i32>,
}

impl From<CreateTeamSchema> for NewTeam {
    fn from(t: CreateTeamSchema) -> Self {
        Self {
            external_id: t.external_id,
            name: t.name,
            short_name: t.short_name,
            logo_url: t.logo_url,
            country: t.country,
            founded_year: t.founded_year,
            venue_name: t.venue_name,
            venue_capacity: t.venue_capacity,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CreateMatchSchema {
    pub external_id: i64,
    pub competition_id: Uuid,
    pub home_team_id: Uuid,
    pub away_team_id: Uuid,
    pub match_date: DateTime<Utc>,
    pub season: i32,
    pub venue: Option<String>,
    pub round: Option<String>,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub status: Option<String>,
    pub referee: Option<String>,
}

impl TryFrom<CreateMatchSchema> for NewMatch {
    type Error = ConstraintViolation;

    fn try_from(m: CreateMatchSchema) -> Result<Self, Self::Error> {
        let status = match m.status.as_deref() {
            Some(s) => MatchStatus::try_from(s)?,
            None => MatchStatus::default(),
        };
        Ok(Self {
            external_id: m.external_id,
            competition_id: m.competition_id,
            home_team_id: m.home_team_id,
            away_team_id: m.away_team_id,
            match_date: m.match_date,
            venue: m.venue,
            season: m.season,
            round: m.round,
            home_score: m.home_score,
            away_score: m.away_score,
            status,
            referee: m.referee,
        })
    }
}

/// Partial update; a field set to `null` is cleared, a missing one is kept.
#[derive(Deserialize, Debug, Default)]
pub struct UpdateMatchSchema {
    #[serde(default, deserialize_with = "double_option")]
    pub home_score: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub away_score: Option<Option<i32>>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub referee: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub venue: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub round: Option<Option<String>>,
}

impl TryFrom<UpdateMatchSchema> for MatchPatch {
    type Error = ConstraintViolation;

    fn try_from(u: UpdateMatchSchema) -> Result<Self, Self::Error> {
        Ok(Self {
            status: u.status.as_deref().map(MatchStatus::try_from).transpose()?,
            home_score: u.home_score,
            away_score: u.away_score,
            referee: u.referee,
            venue: u.venue,
            round: u.round,
        })
    }
}

// Responses

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TeamRef {
    pub id: Uuid,
    pub external_id: i64,
    pub name: String,
    pub logo: Option<String>,
}

impl From<&TeamModel> for TeamRef {
    fn from(t: &TeamModel) -> Self {
        Self {
            id: t.id,
            external_id: t.external_id,
            name: t.name.clone(),
            logo: t.logo_url.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CompetitionRef {
    pub id: Uuid,
    pub external_id: i64,
    pub name: String,
    pub country: Option<String>,
}

impl From<&CompetitionModel> for CompetitionRef {
    fn from(c: &CompetitionModel) -> Self {
        Self {
            id: c.id,
            external_id: c.external_id,
            name: c.name.clone(),
            country: c.country.clone(),
        }
    }
}

/// Derived match state, computed at serialization time.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MatchState {
    pub is_upcoming: bool,
    pub is_live: bool,
    pub is_completed: bool,
    pub has_result: bool,
    pub winner: Option<Outcome>,
}

impl From<&MatchModel> for MatchState {
    fn from(m: &MatchModel) -> Self {
        Self {
            is_upcoming: m.is_upcoming(),
            is_live: m.is_live(),
            is_completed: m.is_completed(),
            has_result: m.has_result(),
            winner: m.winner(),
        }
    }
}

// For json response
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GetMatchSchema {
    pub id: Uuid,
    pub external_id: i64,
    pub home_team: TeamRef,
    pub away_team: TeamRef,
    pub competition: CompetitionRef,
    pub match_date: DateTime<Utc>,
    pub venue: Option<String>,
    pub status: MatchStatus,
    pub round: Option<String>,
    pub season: i32,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub referee: Option<String>,
    #[serde(flatten)]
    pub state: MatchState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GetMatchSchema {
    pub fn new(
        m: &MatchModel,
        home: &TeamModel,
        away: &TeamModel,
        competition: &CompetitionModel,
    ) -> Self {
        Self {
            id: m.id,
            external_id: m.external_id,
            home_team: home.into(),
            away_team: away.into(),
            competition: competition.into(),
            match_date: m.match_date,
            venue: m.venue.clone(),
            status: m.status,
            round: m.round.clone(),
            season: m.season,
            home_score: m.home_score,
            away_score: m.away_score,
            referee: m.referee.clone(),
            state: m.into(),
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TeamFormSchema {
    #[serde(flatten)]
    pub team: TeamRef,
    pub form: String,
    pub stats: TeamRecord,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MatchDetailSchema {
    #[serde(flatten)]
    pub summary: GetMatchSchema,
    pub home_form: TeamFormSchema,
    pub away_form: TeamFormSchema,
    pub head_to_head: HeadToHead,
}
