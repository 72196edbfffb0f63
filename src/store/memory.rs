use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    match_row, validate_match, MatchPatch, MatchQuery, MatchStore, NewCompetition, NewMatch,
    NewTeam,
};
use crate::error::{ConstraintViolation, Entity, Lookup, StoreError, StoreResult};
use crate::model::{self, CompetitionModel, MatchModel, TeamModel};
use crate::schema::SortOrder;

#[derive(Default)]
struct Tables {
    competitions: HashMap<Uuid, CompetitionModel>,
    teams: HashMap<Uuid, TeamModel>,
    matches: HashMap<Uuid, MatchModel>,
}

impl Tables {
    fn same_fixture(a: &MatchModel, b: &MatchModel) -> bool {
        a.competition_id == b.competition_id
            && a.season == b.season
            && a.home_team_id == b.home_team_id
            && a.away_team_id == b.away_team_id
            && a.match_date == b.match_date
    }

    /// Uniqueness and reference checks for `row` against everything except itself.
    fn check_match(&self, row: &MatchModel) -> StoreResult<()> {
        if !self.competitions.contains_key(&row.competition_id) {
            return Err(StoreError::Referential {
                field: "competition_id",
                entity: Entity::Competition,
                id: row.competition_id,
            });
        }
        let teams = [
            ("home_team_id", row.home_team_id),
            ("away_team_id", row.away_team_id),
        ];
        for (field, id) in teams {
            if !self.teams.contains_key(&id) {
                return Err(StoreError::Referential {
                    field,
                    entity: Entity::Team,
                    id,
                });
            }
        }
        let others = move || self.matches.values().filter(move |m| m.id != row.id);
        if others().any(|other| other.external_id == row.external_id) {
            return Err(ConstraintViolation::DuplicateExternalId {
                entity: Entity::Match,
                external_id: row.external_id,
            }
            .into());
        }
        if others().any(|other| Self::same_fixture(other, row)) {
            return Err(ConstraintViolation::DuplicateFixture.into());
        }
        Ok(())
    }
}

/// Store kept entirely in process memory.
///
/// One lock guards all three tables, so every write (including cascades) is
/// checked and applied as a unit and concurrent writers are serialized.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn page<T>(mut rows: Vec<T>, limit: usize, offset: usize) -> Vec<T> {
    rows.drain(..offset.min(rows.len()));
    rows.truncate(limit);
    rows
}

#[async_trait]
impl MatchStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn create_competition(&self, new: NewCompetition) -> StoreResult<CompetitionModel> {
        new.validate()?;
        let mut tables = self.tables.write().await;
        if tables
            .competitions
            .values()
            .any(|c| c.external_id == new.external_id)
        {
            return Err(ConstraintViolation::DuplicateExternalId {
                entity: Entity::Competition,
                external_id: new.external_id,
            }
            .into());
        }

        let at = model::now();
        let competition = CompetitionModel {
            id: Uuid::new_v4(),
            external_id: new.external_id,
            name: new.name,
            kind: new.kind,
            logo_url: new.logo_url,
            country: new.country,
            tier: new.tier,
            created_at: at,
            updated_at: at,
        };
        tables.competitions.insert(competition.id, competition.clone());
        Ok(competition)
    }

    async fn get_competition(&self, id: Uuid) -> StoreResult<CompetitionModel> {
        let tables = self.tables.read().await;
        tables
            .competitions
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(Entity::Competition, id))
    }

    async fn list_competitions(
        &self,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<CompetitionModel>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<_> = tables.competitions.values().cloned().collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(page(rows, limit, offset))
    }

    async fn competitions_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<CompetitionModel>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.competitions.get(id).cloned())
            .collect())
    }

    async fn delete_competition(&self, id: Uuid) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        if tables.competitions.remove(&id).is_none() {
            return Err(StoreError::not_found(Entity::Competition, id));
        }
        let before = tables.matches.len();
        tables.matches.retain(|_, m| m.competition_id != id);
        Ok((before - tables.matches.len()) as u64)
    }

    async fn create_team(&self, new: NewTeam) -> StoreResult<TeamModel> {
        new.validate()?;
        let mut tables = self.tables.write().await;
        if tables.teams.values().any(|t| t.external_id == new.external_id) {
            return Err(ConstraintViolation::DuplicateExternalId {
                entity: Entity::Team,
                external_id: new.external_id,
            }
            .into());
        }

        let at = model::now();
        let team = TeamModel {
            id: Uuid::new_v4(),
            external_id: new.external_id,
            name: new.name,
            short_name: new.short_name,
            logo_url: new.logo_url,
            country: new.country,
            founded_year: new.founded_year,
            venue_name: new.venue_name,
            venue_capacity: new.venue_capacity,
            created_at: at,
            updated_at: at,
        };
        tables.teams.insert(team.id, team.clone());
        Ok(team)
    }

    async fn get_team(&self, id: Uuid) -> StoreResult<TeamModel> {
        let tables = self.tables.read().await;
        tables
            .teams
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(Entity::Team, id))
    }

    async fn list_teams(&self, limit: usize, offset: usize) -> StoreResult<Vec<TeamModel>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<_> = tables.teams.values().cloned().collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(page(rows, limit, offset))
    }

    async fn teams_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<TeamModel>> {
        let tables = self.tables.read().await;
        Ok(ids.iter().filter_map(|id| tables.teams.get(id).cloned()).collect())
    }

    async fn delete_team(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.teams.contains_key(&id) {
            return Err(StoreError::not_found(Entity::Team, id));
        }
        if tables.matches.values().any(|m| m.involves(id)) {
            return Err(ConstraintViolation::TeamInUse { team_id: id }.into());
        }
        tables.teams.remove(&id);
        Ok(())
    }

    async fn create_match(&self, new: NewMatch) -> StoreResult<MatchModel> {
        let row = match_row(Uuid::new_v4(), new, model::now())?;
        let mut tables = self.tables.write().await;
        tables.check_match(&row)?;
        tables.matches.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_match(&self, id: Uuid) -> StoreResult<MatchModel> {
        let tables = self.tables.read().await;
        tables
            .matches
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(Entity::Match, id))
    }

    async fn get_match_by_external_id(&self, external_id: i64) -> StoreResult<MatchModel> {
        let tables = self.tables.read().await;
        tables
            .matches
            .values()
            .find(|m| m.external_id == external_id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: Entity::Match,
                lookup: Lookup::ExternalId(external_id),
            })
    }

    async fn list_matches(&self, query: &MatchQuery) -> StoreResult<Vec<MatchModel>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<_> = tables
            .matches
            .values()
            .filter(|m| query.matches(m))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            let by_date = match query.order {
                SortOrder::Asc => a.match_date.cmp(&b.match_date),
                SortOrder::Desc => b.match_date.cmp(&a.match_date),
            };
            by_date.then(a.id.cmp(&b.id))
        });
        Ok(page(rows, query.limit.unwrap_or(usize::MAX), query.offset))
    }

    async fn update_match(&self, id: Uuid, patch: MatchPatch) -> StoreResult<MatchModel> {
        let mut tables = self.tables.write().await;
        let current = tables
            .matches
            .get(&id)
            .ok_or_else(|| StoreError::not_found(Entity::Match, id))?;
        if patch.is_empty() {
            return Ok(current.clone());
        }

        let mut next = patch.apply_to(current);
        validate_match(&next)?;
        tables.check_match(&next)?;
        next.updated_at = model::touched_after(next.updated_at);
        tables.matches.insert(id, next.clone());
        Ok(next)
    }

    async fn delete_match(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .matches
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(Entity::Match, id))
    }
}
