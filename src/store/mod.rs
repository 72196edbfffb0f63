//! Data access for competitions, teams and matches.
//!
//! [`MatchStore`] is the seam between the HTTP layer and storage. Every write
//! validates the data-model invariants before it commits, so [`PgStore`] and
//! [`MemoryStore`] reject the same inputs with the same [`ConstraintViolation`]s;
//! the database constraints in `migrations/` back the Postgres checks up under
//! concurrent writers.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ConstraintViolation, StoreResult};
use crate::model::{CompetitionModel, MatchModel, TeamModel};
use crate::schema::{CompetitionType, MatchStatus, SortOrder, TeamRole};

const NAME_MAX: usize = 100;
const SHORT_MAX: usize = 50;
const URL_MAX: usize = 255;

#[derive(Debug, Clone)]
pub struct NewCompetition {
    pub external_id: i64,
    pub name: String,
    pub kind: CompetitionType,
    pub logo_url: Option<String>,
    pub country: Option<String>,
    pub tier: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct NewTeam {
    pub external_id: i64,
    pub name: String,
    pub short_name: Option<String>,
    pub logo_url: Option<String>,
    pub country: Option<String>,
    pub founded_year: Option<i32>,
    pub venue_name: Option<String>,
    pub venue_capacity: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct NewMatch {
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
}

/// Changes to the mutable fields of a match.
///
/// `None` leaves a field alone; `Some(None)` clears a nullable one.
#[derive(Debug, Clone, Default)]
pub struct MatchPatch {
    pub home_score: Option<Option<i32>>,
    pub away_score: Option<Option<i32>>,
    pub status: Option<MatchStatus>,
    pub referee: Option<Option<String>>,
    pub venue: Option<Option<String>>,
    pub round: Option<Option<String>>,
}

impl MatchPatch {
    pub fn is_empty(&self) -> bool {
        self.home_score.is_none()
            && self.away_score.is_none()
            && self.status.is_none()
            && self.referee.is_none()
            && self.venue.is_none()
            && self.round.is_none()
    }

    /// The match as it would look after the patch, timestamps untouched.
    pub fn apply_to(&self, current: &MatchModel) -> MatchModel {
        let mut next = current.clone();
        if let Some(score) = self.home_score {
            next.home_score = score;
        }
        if let Some(score) = self.away_score {
            next.away_score = score;
        }
        if let Some(status) = self.status {
            next.status = status;
        }
        if let Some(referee) = &self.referee {
            next.referee = referee.clone();
        }
        if let Some(venue) = &self.venue {
            next.venue = venue.clone();
        }
        if let Some(round) = &self.round {
            next.round = round.clone();
        }
        next
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamFilter {
    pub team_id: Uuid,
    pub role: TeamRole,
}

/// Filters for listing matches. Every field is optional and they combine with AND.
#[derive(Debug, Clone, Default)]
pub struct MatchQuery {
    pub competition_id: Option<Uuid>,
    pub team: Option<TeamFilter>,
    pub status: Option<MatchStatus>,
    pub season: Option<i32>,
    /// Inclusive lower bound on the match date.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on the match date.
    pub to: Option<DateTime<Utc>>,
    pub order: SortOrder,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl MatchQuery {
    pub fn for_team(team_id: Uuid, role: TeamRole) -> Self {
        Self {
            team: Some(TeamFilter { team_id, role }),
            ..Self::default()
        }
    }

    pub fn matches(&self, m: &MatchModel) -> bool {
        if self.competition_id.is_some_and(|id| m.competition_id != id) {
            return false;
        }
        if let Some(filter) = self.team {
            let hit = match filter.role {
                TeamRole::Home => m.home_team_id == filter.team_id,
                TeamRole::Away => m.away_team_id == filter.team_id,
                TeamRole::Either => m.involves(filter.team_id),
            };
            if !hit {
                return false;
            }
        }
        if self.status.is_some_and(|s| m.status != s) {
            return false;
        }
        if self.season.is_some_and(|s| m.season != s) {
            return false;
        }
        if self.from.is_some_and(|from| m.match_date < from) {
            return false;
        }
        if self.to.is_some_and(|to| m.match_date >= to) {
            return false;
        }
        true
    }
}

/// A team's fixtures split by the role it plays.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct TeamMatches {
    pub home: Vec<MatchModel>,
    pub away: Vec<MatchModel>,
}

#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Round-trips to the backing storage.
    async fn ping(&self) -> StoreResult<()>;

    async fn create_competition(&self, new: NewCompetition) -> StoreResult<CompetitionModel>;
    async fn get_competition(&self, id: Uuid) -> StoreResult<CompetitionModel>;
    async fn list_competitions(
        &self,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<CompetitionModel>>;
    async fn competitions_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<CompetitionModel>>;
    /// Removes the competition and every match it owns; returns how many matches went with it.
    async fn delete_competition(&self, id: Uuid) -> StoreResult<u64>;

    async fn create_team(&self, new: NewTeam) -> StoreResult<TeamModel>;
    async fn get_team(&self, id: Uuid) -> StoreResult<TeamModel>;
    async fn list_teams(&self, limit: usize, offset: usize) -> StoreResult<Vec<TeamModel>>;
    async fn teams_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<TeamModel>>;
    /// Fails with [`ConstraintViolation::TeamInUse`] while any match references the team.
    async fn delete_team(&self, id: Uuid) -> StoreResult<()>;

    async fn create_match(&self, new: NewMatch) -> StoreResult<MatchModel>;
    async fn get_match(&self, id: Uuid) -> StoreResult<MatchModel>;
    async fn get_match_by_external_id(&self, external_id: i64) -> StoreResult<MatchModel>;
    async fn list_matches(&self, query: &MatchQuery) -> StoreResult<Vec<MatchModel>>;
    async fn update_match(&self, id: Uuid, patch: MatchPatch) -> StoreResult<MatchModel>;
    async fn delete_match(&self, id: Uuid) -> StoreResult<()>;

    async fn team_matches(&self, team_id: Uuid) -> StoreResult<TeamMatches> {
        self.get_team(team_id).await?;
        let home = self
            .list_matches(&MatchQuery::for_team(team_id, TeamRole::Home))
            .await?;
        let away = self
            .list_matches(&MatchQuery::for_team(team_id, TeamRole::Away))
            .await?;
        Ok(TeamMatches { home, away })
    }
}

fn required(field: &'static str, value: &str, max: usize) -> Result<(), ConstraintViolation> {
    if value.trim().is_empty() {
        return Err(ConstraintViolation::Blank { field });
    }
    optional(field, Some(value), max)
}

fn optional(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<(), ConstraintViolation> {
    match value {
        Some(v) if v.chars().count() > max => Err(ConstraintViolation::TooLong { field, max }),
        _ => Ok(()),
    }
}

fn score(field: &'static str, value: Option<i32>) -> Result<(), ConstraintViolation> {
    match value {
        Some(v) if v < 0 => Err(ConstraintViolation::NegativeScore { field, value: v }),
        _ => Ok(()),
    }
}

impl NewCompetition {
    pub fn validate(&self) -> Result<(), ConstraintViolation> {
        required("name", &self.name, NAME_MAX)?;
        optional("logo_url", self.logo_url.as_deref(), URL_MAX)?;
        optional("country", self.country.as_deref(), SHORT_MAX)
    }
}

impl NewTeam {
    pub fn validate(&self) -> Result<(), ConstraintViolation> {
        required("name", &self.name, NAME_MAX)?;
        optional("short_name", self.short_name.as_deref(), SHORT_MAX)?;
        optional("logo_url", self.logo_url.as_deref(), URL_MAX)?;
        optional("country", self.country.as_deref(), SHORT_MAX)?;
        optional("venue_name", self.venue_name.as_deref(), NAME_MAX)
    }
}

impl NewMatch {
    /// Stored form of the kickoff time; fixtures are unique at this precision.
    pub(crate) fn normalized(mut self) -> Self {
        self.match_date = self.match_date.trunc_subsecs(6);
        self
    }
}

/// Invariants every stored match must satisfy.
pub fn validate_match(m: &MatchModel) -> Result<(), ConstraintViolation> {
    if m.home_team_id == m.away_team_id {
        return Err(ConstraintViolation::SameTeam);
    }
    score("home_score", m.home_score)?;
    score("away_score", m.away_score)?;
    optional("venue", m.venue.as_deref(), NAME_MAX)?;
    optional("round", m.round.as_deref(), SHORT_MAX)?;
    optional("referee", m.referee.as_deref(), NAME_MAX)
}

/// Builds the row a new match would become, validated.
fn match_row(
    id: Uuid,
    new: NewMatch,
    at: DateTime<Utc>,
) -> Result<MatchModel, ConstraintViolation> {
    let new = new.normalized();
    let row = MatchModel {
        id,
        external_id: new.external_id,
        competition_id: new.competition_id,
        home_team_id: new.home_team_id,
        away_team_id: new.away_team_id,
        match_date: new.match_date,
        venue: new.venue,
        season: new.season,
        round: new.round,
        home_score: new.home_score,
        away_score: new.away_score,
        status: new.status,
        referee: new.referee,
        created_at: at,
        updated_at: at,
    };
    validate_match(&row)?;
    Ok(row)
}

/// Deserializes a present-but-null field as `Some(None)` so patches can clear values.
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn new_match() -> NewMatch {
        NewMatch {
            external_id: 1_035_037,
            competition_id: Uuid::new_v4(),
            home_team_id: Uuid::new_v4(),
            away_team_id: Uuid::new_v4(),
            match_date: Utc.with_ymd_and_hms(2024, 10, 26, 19, 0, 0).unwrap(),
            venue: None,
            season: 2024,
            round: None,
            home_score: None,
            away_score: None,
            status: MatchStatus::Scheduled,
            referee: None,
        }
    }

    #[test]
    fn same_team_is_rejected() {
        let mut m = new_match();
        m.away_team_id = m.home_team_id;
        let err = match_row(Uuid::new_v4(), m, Utc::now()).unwrap_err();
        assert_eq!(err, ConstraintViolation::SameTeam);
    }

    #[test]
    fn negative_scores_name_their_side() {
        let mut m = new_match();
        m.away_score = Some(-1);
        let err = match_row(Uuid::new_v4(), m, Utc::now()).unwrap_err();
        assert_eq!(
            err,
            ConstraintViolation::NegativeScore {
                field: "away_score",
                value: -1
            }
        );
    }

    #[test]
    fn zero_scores_are_fine() {
        let mut m = new_match();
        m.home_score = Some(0);
        m.away_score = Some(0);
        assert!(match_row(Uuid::new_v4(), m, Utc::now()).is_ok());
    }

    #[test]
    fn blank_and_long_names_are_rejected() {
        let blank = NewTeam {
            external_id: 541,
            name: "   ".into(),
            short_name: None,
            logo_url: None,
            country: None,
            founded_year: None,
            venue_name: None,
            venue_capacity: None,
        };
        assert_eq!(blank.validate(), Err(ConstraintViolation::Blank { field: "name" }));

        let long = NewTeam {
            short_name: Some("x".repeat(51)),
            name: "Real Madrid".into(),
            ..blank
        };
        assert_eq!(
            long.validate(),
            Err(ConstraintViolation::TooLong {
                field: "short_name",
                max: 50
            })
        );
    }

    #[test]
    fn patch_only_touches_named_fields() {
        let row = match_row(Uuid::new_v4(), new_match(), Utc::now()).unwrap();
        let patch = MatchPatch {
            home_score: Some(Some(2)),
            away_score: Some(Some(1)),
            status: Some(MatchStatus::Completed),
            venue: Some(None),
            ..MatchPatch::default()
        };
        let next = patch.apply_to(&row);
        assert_eq!(next.home_score, Some(2));
        assert_eq!(next.status, MatchStatus::Completed);
        assert_eq!(next.venue, None);
        assert_eq!(next.round, row.round);
        assert_eq!(next.match_date, row.match_date);
    }

    #[test]
    fn query_date_range_is_half_open() {
        let row = match_row(Uuid::new_v4(), new_match(), Utc::now()).unwrap();
        let at = row.match_date;

        let q = MatchQuery {
            from: Some(at),
            to: Some(at + chrono::Duration::minutes(1)),
            ..MatchQuery::default()
        };
        assert!(q.matches(&row));

        let q = MatchQuery {
            to: Some(at),
            ..MatchQuery::default()
        };
        assert!(!q.matches(&row));
    }

    #[test]
    fn query_team_roles() {
        let row = match_row(Uuid::new_v4(), new_match(), Utc::now()).unwrap();
        assert!(MatchQuery::for_team(row.home_team_id, TeamRole::Home).matches(&row));
        assert!(!MatchQuery::for_team(row.home_team_id, TeamRole::Away).matches(&row));
        assert!(MatchQuery::for_team(row.away_team_id, TeamRole::Either).matches(&row));
    }
}
