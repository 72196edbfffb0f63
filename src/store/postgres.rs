use async_trait::async_trait;
use sqlx::{query_as, Pool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{
    match_row, validate_match, MatchPatch, MatchQuery, MatchStore, NewCompetition, NewMatch,
    NewTeam,
};
use crate::error::{ConstraintViolation, Entity, Lookup, StoreError, StoreResult};
use crate::model::{self, CompetitionModel, MatchModel, TeamModel};
use crate::schema::{SortOrder, TeamRole};

const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Store backed by the Postgres schema in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    db: Pool<Postgres>,
}

impl PgStore {
    pub fn new(db: Pool<Postgres>) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.db
    }
}

/// Name of the constraint a database error tripped, if any.
fn violated(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) => db.constraint().map(str::to_owned),
        _ => None,
    }
}

fn is_fk_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(FOREIGN_KEY_VIOLATION))
}

/// Translates constraint failures raised by a match write into typed errors.
fn match_write_error(err: sqlx::Error, row: &MatchModel) -> StoreError {
    match violated(&err).as_deref() {
        Some("uq_matches_external_id") => ConstraintViolation::DuplicateExternalId {
            entity: Entity::Match,
            external_id: row.external_id,
        }
        .into(),
        Some("uq_matches_fixture") => ConstraintViolation::DuplicateFixture.into(),
        Some("ck_matches_different_teams") => ConstraintViolation::SameTeam.into(),
        Some("ck_matches_scores_non_negative") => {
            let (field, value) = match row.home_score {
                Some(v) if v < 0 => ("home_score", v),
                _ => ("away_score", row.away_score.unwrap_or_default()),
            };
            ConstraintViolation::NegativeScore { field, value }.into()
        }
        Some("fk_matches_competition") => StoreError::Referential {
            field: "competition_id",
            entity: Entity::Competition,
            id: row.competition_id,
        },
        Some("fk_matches_home_team") => StoreError::Referential {
            field: "home_team_id",
            entity: Entity::Team,
            id: row.home_team_id,
        },
        Some("fk_matches_away_team") => StoreError::Referential {
            field: "away_team_id",
            entity: Entity::Team,
            id: row.away_team_id,
        },
        _ => StoreError::Storage(err),
    }
}

/// `LIMIT`/`OFFSET` value for a row count; anything past `i64::MAX` means "all of them".
fn sql_count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn not_found_or(entity: Entity, id: Uuid) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |err| match err {
        sqlx::Error::RowNotFound => StoreError::not_found(entity, id),
        other => StoreError::Storage(other),
    }
}

#[async_trait]
impl MatchStore for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }

    async fn create_competition(&self, new: NewCompetition) -> StoreResult<CompetitionModel> {
        new.validate()?;
        let at = model::now();
        let external_id = new.external_id;

        let c: CompetitionModel = query_as(
            r#"
            INSERT INTO competitions (id, external_id, name, type, logo_url, country, tier,
                                      created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.external_id)
        .bind(new.name)
        .bind(new.kind)
        .bind(new.logo_url)
        .bind(new.country)
        .bind(new.tier)
        .bind(at)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match violated(&e).as_deref() {
            Some("uq_competitions_external_id") => ConstraintViolation::DuplicateExternalId {
                entity: Entity::Competition,
                external_id,
            }
            .into(),
            _ => StoreError::Storage(e),
        })?;

        tracing::info!(competition_id = %c.id, external_id, name = %c.name, "competition created");
        Ok(c)
    }

    async fn get_competition(&self, id: Uuid) -> StoreResult<CompetitionModel> {
        query_as(r#"SELECT * FROM competitions WHERE id = $1"#)
            .bind(id)
            .fetch_one(&self.db)
            .await
            .map_err(not_found_or(Entity::Competition, id))
    }

    async fn list_competitions(
        &self,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<CompetitionModel>> {
        let rows = query_as(r#"SELECT * FROM competitions ORDER BY name, id LIMIT $1 OFFSET $2"#)
            .bind(sql_count(limit))
            .bind(sql_count(offset))
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn competitions_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<CompetitionModel>> {
        let rows = query_as(r#"SELECT * FROM competitions WHERE id = ANY($1)"#)
            .bind(ids)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn delete_competition(&self, id: Uuid) -> StoreResult<u64> {
        let mut tx = self.db.begin().await?;

        // Owned matches go first so the count is known. ON DELETE CASCADE backs this up.
        let removed = sqlx::query(r#"DELETE FROM matches WHERE competition_id = $1"#)
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let deleted = sqlx::query(r#"DELETE FROM competitions WHERE id = $1"#)
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            // dropping `tx` rolls the match deletions back
            return Err(StoreError::not_found(Entity::Competition, id));
        }

        tx.commit().await?;
        tracing::info!(competition_id = %id, matches_removed = removed, "competition deleted");
        Ok(removed)
    }

    async fn create_team(&self, new: NewTeam) -> StoreResult<TeamModel> {
        new.validate()?;
        let at = model::now();
        let external_id = new.external_id;

        let t: TeamModel = query_as(
            r#"
            INSERT INTO teams (id, external_id, name, short_name, logo_url, country,
                               founded_year, venue_name, venue_capacity, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.external_id)
        .bind(new.name)
        .bind(new.short_name)
        .bind(new.logo_url)
        .bind(new.country)
        .bind(new.founded_year)
        .bind(new.venue_name)
        .bind(new.venue_capacity)
        .bind(at)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match violated(&e).as_deref() {
            Some("uq_teams_external_id") => ConstraintViolation::DuplicateExternalId {
                entity: Entity::Team,
                external_id,
            }
            .into(),
            _ => StoreError::Storage(e),
        })?;

        tracing::info!(team_id = %t.id, external_id, name = %t.name, "team created");
        Ok(t)
    }

    async fn get_team(&self, id: Uuid) -> StoreResult<TeamModel> {
        query_as(r#"SELECT * FROM teams WHERE id = $1"#)
            .bind(id)
            .fetch_one(&self.db)
            .await
            .map_err(not_found_or(Entity::Team, id))
    }

    async fn list_teams(&self, limit: usize, offset: usize) -> StoreResult<Vec<TeamModel>> {
        let rows = query_as(r#"SELECT * FROM teams ORDER BY name, id LIMIT $1 OFFSET $2"#)
            .bind(sql_count(limit))
            .bind(sql_count(offset))
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn teams_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<TeamModel>> {
        let rows = query_as(r#"SELECT * FROM teams WHERE id = ANY($1)"#)
            .bind(ids)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn delete_team(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query(r#"DELETE FROM teams WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| {
                if is_fk_violation(&e) {
                    ConstraintViolation::TeamInUse { team_id: id }.into()
                } else {
                    StoreError::Storage(e)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(Entity::Team, id));
        }
        tracing::info!(team_id = %id, "team deleted");
        Ok(())
    }

    async fn create_match(&self, new: NewMatch) -> StoreResult<MatchModel> {
        let row = match_row(Uuid::new_v4(), new, model::now())?;

        let m: MatchModel = query_as(
            r#"
            INSERT INTO matches (id, external_id, competition_id, home_team_id, away_team_id,
                                 match_date, venue, season, round, home_score, away_score,
                                 status, referee, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14)
            RETURNING *
            "#,
        )
        .bind(row.id)
        .bind(row.external_id)
        .bind(row.competition_id)
        .bind(row.home_team_id)
        .bind(row.away_team_id)
        .bind(row.match_date)
        .bind(&row.venue)
        .bind(row.season)
        .bind(&row.round)
        .bind(row.home_score)
        .bind(row.away_score)
        .bind(row.status)
        .bind(&row.referee)
        .bind(row.created_at)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match_write_error(e, &row))?;

        tracing::info!(
            match_id = %m.id,
            external_id = m.external_id,
            competition_id = %m.competition_id,
            season = m.season,
            "match created"
        );
        Ok(m)
    }

    async fn get_match(&self, id: Uuid) -> StoreResult<MatchModel> {
        query_as(r#"SELECT * FROM matches WHERE id = $1"#)
            .bind(id)
            .fetch_one(&self.db)
            .await
            .map_err(not_found_or(Entity::Match, id))
    }

    async fn get_match_by_external_id(&self, external_id: i64) -> StoreResult<MatchModel> {
        query_as(r#"SELECT * FROM matches WHERE external_id = $1"#)
            .bind(external_id)
            .fetch_one(&self.db)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => StoreError::NotFound {
                    entity: Entity::Match,
                    lookup: Lookup::ExternalId(external_id),
                },
                other => StoreError::Storage(other),
            })
    }

    async fn list_matches(&self, query: &MatchQuery) -> StoreResult<Vec<MatchModel>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM matches WHERE TRUE");

        if let Some(competition_id) = query.competition_id {
            qb.push(" AND competition_id = ").push_bind(competition_id);
        }
        if let Some(filter) = query.team {
            match filter.role {
                TeamRole::Home => {
                    qb.push(" AND home_team_id = ").push_bind(filter.team_id);
                }
                TeamRole::Away => {
                    qb.push(" AND away_team_id = ").push_bind(filter.team_id);
                }
                TeamRole::Either => {
                    qb.push(" AND (home_team_id = ")
                        .push_bind(filter.team_id)
                        .push(" OR away_team_id = ")
                        .push_bind(filter.team_id)
                        .push(")");
                }
            }
        }
        if let Some(status) = query.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(season) = query.season {
            qb.push(" AND season = ").push_bind(season);
        }
        if let Some(from) = query.from {
            qb.push(" AND match_date >= ").push_bind(from);
        }
        if let Some(to) = query.to {
            qb.push(" AND match_date < ").push_bind(to);
        }

        qb.push(match query.order {
            SortOrder::Asc => " ORDER BY match_date ASC, id ASC",
            SortOrder::Desc => " ORDER BY match_date DESC, id ASC",
        });
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ").push_bind(sql_count(limit));
        }
        qb.push(" OFFSET ").push_bind(sql_count(query.offset));

        let rows = qb.build_query_as::<MatchModel>().fetch_all(&self.db).await?;
        Ok(rows)
    }

    async fn update_match(&self, id: Uuid, patch: MatchPatch) -> StoreResult<MatchModel> {
        if patch.is_empty() {
            return self.get_match(id).await;
        }
        let mut tx = self.db.begin().await?;

        let current: MatchModel = query_as(r#"SELECT * FROM matches WHERE id = $1 FOR UPDATE"#)
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(not_found_or(Entity::Match, id))?;

        let next = patch.apply_to(&current);
        validate_match(&next)?;

        let m: MatchModel = query_as(
            r#"
            UPDATE matches
            SET (home_score, away_score, status, referee, venue, round, updated_at)
                = ($2, $3, $4, $5, $6, $7, $8)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(next.home_score)
        .bind(next.away_score)
        .bind(next.status)
        .bind(&next.referee)
        .bind(&next.venue)
        .bind(&next.round)
        .bind(model::touched_after(current.updated_at))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match_write_error(e, &next))?;

        tx.commit().await?;
        tracing::info!(match_id = %id, status = %m.status, "match updated");
        Ok(m)
    }

    async fn delete_match(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query(r#"DELETE FROM matches WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(Entity::Match, id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_counts_saturate_instead_of_wrapping() {
        assert_eq!(sql_count(0), 0);
        assert_eq!(sql_count(200), 200);
        assert_eq!(sql_count(usize::MAX), i64::MAX);
    }
}
