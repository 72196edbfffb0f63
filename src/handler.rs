use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::extract::{Json, Path, Query};
use crate::model::{self, MatchModel};
use crate::schema::{
    CreateCompetitionSchema, CreateMatchSchema, CreateTeamSchema, GetMatchSchema,
    MatchDetailSchema, MatchListParams, MatchStatus, Pagination, SeasonParams, TeamFormSchema,
    TeamRole, UpdateMatchSchema,
};
use crate::stats;
use crate::store::{MatchPatch, MatchQuery, MatchStore, NewCompetition, NewMatch, TeamFilter};
use crate::AppState;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 200;

fn limit_of(requested: Option<usize>) -> usize {
    requested.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Resolves the teams and competitions a page of matches points at.
async fn expand(
    store: &dyn MatchStore,
    matches: &[MatchModel],
) -> Result<Vec<GetMatchSchema>, AppError> {
    let mut team_ids: Vec<Uuid> = matches
        .iter()
        .flat_map(|m| [m.home_team_id, m.away_team_id])
        .collect();
    team_ids.sort_unstable();
    team_ids.dedup();
    let mut competition_ids: Vec<Uuid> = matches.iter().map(|m| m.competition_id).collect();
    competition_ids.sort_unstable();
    competition_ids.dedup();

    let teams: HashMap<_, _> = store
        .teams_by_ids(&team_ids)
        .await?
        .into_iter()
        .map(|t| (t.id, t))
        .collect();
    let competitions: HashMap<_, _> = store
        .competitions_by_ids(&competition_ids)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    matches
        .iter()
        .map(|m| {
            let (Some(home), Some(away), Some(competition)) = (
                teams.get(&m.home_team_id),
                teams.get(&m.away_team_id),
                competitions.get(&m.competition_id),
            ) else {
                return Err(AppError::from(anyhow!("match {} has dangling references", m.id)));
            };
            Ok(GetMatchSchema::new(m, home, away, competition))
        })
        .collect()
}

pub async fn root_handler(State(data): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "name": data.settings.app_name,
        "version": data.settings.app_version,
        "status": "running",
        "timestamp": model::now(),
    }))
}

pub async fn health_handler(
    State(data): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    data.store.ping().await.map_err(AppError::Unavailable)?;
    Ok(Json(json!({
        "status": "healthy",
        "timestamp": model::now(),
    })))
}

// Competitions

pub async fn get_competitions_handler(
    Query(opts): Query<Pagination>,
    State(data): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {

    let competitions = data
        .store
        .list_competitions(limit_of(opts.limit), opts.offset.unwrap_or(0))
        .await?;

    Ok(Json(json!({
        "success": true,
        "count": competitions.len(),
        "competitions": competitions,
    })))
}

pub async fn create_competition_handler(
    State(data): State<Arc<AppState>>,
    Json(body): Json<CreateCompetitionSchema>,
) -> Result<impl IntoResponse, AppError> {
    let competition = data.store.create_competition(NewCompetition::try_from(body)?).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "competition": competition })),
    ))
}

pub async fn get_competition_handler(
    Path(competition_id): Path<Uuid>,
    State(data): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let competition = data.store.get_competition(competition_id).await?;
    Ok(Json(json!({ "success": true, "competition": competition })))
}

pub async fn delete_competition_handler(
    Path(competition_id): Path<Uuid>,
    State(data): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let removed = data.store.delete_competition(competition_id).await?;
    Ok(Json(json!({ "success": true, "deleted_matches": removed })))
}

// Teams

pub async fn get_teams_handler(
    Query(opts): Query<Pagination>,
    State(data): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {

    let teams = data
        .store
        .list_teams(limit_of(opts.limit), opts.offset.unwrap_or(0))
        .await?;

    Ok(Json(json!({
        "success": true,
        "count": teams.len(),
        "teams": teams,
    })))
}

pub async fn create_team_handler(
    State(data): State<Arc<AppState>>,
    Json(body): Json<CreateTeamSchema>,
) -> Result<impl IntoResponse, AppError> {
    let team = data.store.create_team(body.into()).await?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "team": team }))))
}

pub async fn get_team_handler(
    Path(team_id): Path<Uuid>,
    State(data): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let team = data.store.get_team(team_id).await?;
    Ok(Json(json!({ "success": true, "team": team })))
}

pub async fn delete_team_handler(
    Path(team_id): Path<Uuid>,
    State(data): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    data.store.delete_team(team_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_team_matches_handler(
    Path(team_id): Path<Uuid>,
    State(data): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let split = data.store.team_matches(team_id).await?;
    let home = expand(data.store.as_ref(), &split.home).await?;
    let away = expand(data.store.as_ref(), &split.away).await?;

    Ok(Json(json!({
        "success": true,
        "team_id": team_id,
        "home": home,
        "away": away,
    })))
}

pub async fn get_team_stats_handler(
    Path(team_id): Path<Uuid>,
    Query(params): Query<SeasonParams>,
    State(data): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let team = data.store.get_team(team_id).await?;
    let query = MatchQuery {
        team: Some(TeamFilter {
            team_id,
            role: TeamRole::Either,
        }),
        status: Some(MatchStatus::Completed),
        season: params.season,
        ..MatchQuery::default()
    };
    let matches = data.store.list_matches(&query).await?;

    Ok(Json(json!({
        "success": true,
        "stats": stats::team_stats(&team, params.season, &matches),
    })))
}

// Matches

pub async fn get_matches_handler(
    Query(params): Query<MatchListParams>,
    State(data): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let query = MatchQuery {
        competition_id: params.competition_id,
        team: params.team_id.map(|team_id| TeamFilter {
            team_id,
            role: params.role.unwrap_or_default(),
        }),
        status: params.status.as_deref().map(MatchStatus::try_from).transpose()?,
        season: params.season,
        from: params.from,
        to: params.to,
        order: params.order.unwrap_or_default(),
        limit: Some(limit_of(params.limit)),
        offset: params.offset.unwrap_or(0),
    };

    let matches = data.store.list_matches(&query).await?;
    let matches = expand(data.store.as_ref(), &matches).await?;

    Ok(Json(json!({
        "success": true,
        "count": matches.len(),
        "matches": matches,
    })))
}

pub async fn create_match_handler(
    State(data): State<Arc<AppState>>,
    Json(body): Json<CreateMatchSchema>,
) -> Result<impl IntoResponse, AppError> {
    let m = data.store.create_match(NewMatch::try_from(body)?).await?;
    let m = expand(data.store.as_ref(), std::slice::from_ref(&m)).await?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "match": m[0] }))))
}

pub async fn get_match_by_id_handler(
    Path(match_id): Path<Uuid>,
    State(data): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let m = data.store.get_match(match_id).await?;
    let summary = expand(data.store.as_ref(), std::slice::from_ref(&m))
        .await?
        .remove(0);

    let in_season = |team_id: Uuid| MatchQuery {
        competition_id: Some(m.competition_id),
        season: Some(m.season),
        status: Some(MatchStatus::Completed),
        ..MatchQuery::for_team(team_id, TeamRole::Either)
    };
    let (home_query, away_query) = (in_season(m.home_team_id), in_season(m.away_team_id));
    let meetings_query = MatchQuery {
        status: Some(MatchStatus::Completed),
        ..MatchQuery::for_team(m.home_team_id, TeamRole::Either)
    };
    let (home_history, away_history, meetings) = futures::try_join!(
        data.store.list_matches(&home_query),
        data.store.list_matches(&away_query),
        data.store.list_matches(&meetings_query),
    )?;

    let home_form = stats::form(m.home_team_id, &home_history);
    let away_form = stats::form(m.away_team_id, &away_history);
    let detail = MatchDetailSchema {
        home_form: TeamFormSchema {
            team: summary.home_team.clone(),
            form: home_form.current_form,
            stats: stats::record(m.home_team_id, &home_history),
        },
        away_form: TeamFormSchema {
            team: summary.away_team.clone(),
            form: away_form.current_form,
            stats: stats::record(m.away_team_id, &away_history),
        },
        head_to_head: stats::head_to_head(m.home_team_id, m.away_team_id, &meetings),
        summary,
    };

    Ok(Json(json!({ "success": true, "match": detail })))
}

pub async fn get_match_by_external_id_handler(
    Path(external_id): Path<i64>,
    State(data): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let m = data.store.get_match_by_external_id(external_id).await?;
    let m = expand(data.store.as_ref(), std::slice::from_ref(&m)).await?;
    Ok(Json(json!({ "success": true, "match": m[0] })))
}

pub async fn update_match_handler(
    Path(match_id): Path<Uuid>,
    State(data): State<Arc<AppState>>,
    Json(body): Json<UpdateMatchSchema>,
) -> Result<impl IntoResponse, AppError> {
    let patch = MatchPatch::try_from(body)?;
    let m = data.store.update_match(match_id, patch).await?;
    let m = expand(data.store.as_ref(), std::slice::from_ref(&m)).await?;
    Ok(Json(json!({ "success": true, "match": m[0] })))
}

pub async fn delete_match_handler(
    Path(match_id): Path<Uuid>,
    State(data): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    data.store.delete_match(match_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
