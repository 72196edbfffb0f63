#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use football_predictor::model::{CompetitionModel, TeamModel};
use football_predictor::schema::{CompetitionType, MatchStatus};
use football_predictor::store::{MatchStore, NewCompetition, NewMatch, NewTeam};
use uuid::Uuid;

pub struct Seed {
    pub la_liga: CompetitionModel,
    pub madrid: TeamModel,
    pub barcelona: TeamModel,
    pub atletico: TeamModel,
}

pub fn la_liga() -> NewCompetition {
    NewCompetition {
        external_id: 140,
        name: "La Liga".into(),
        kind: CompetitionType::League,
        logo_url: Some("https://media.api-sports.io/football/leagues/140.png".into()),
        country: Some("Spain".into()),
        tier: Some(1),
    }
}

pub fn team(external_id: i64, name: &str) -> NewTeam {
    NewTeam {
        external_id,
        name: name.into(),
        short_name: None,
        logo_url: Some(format!("https://media.api-sports.io/football/teams/{external_id}.png")),
        country: Some("Spain".into()),
        founded_year: None,
        venue_name: None,
        venue_capacity: None,
    }
}

pub async fn seed(store: &dyn MatchStore) -> Seed {
    Seed {
        la_liga: store.create_competition(la_liga()).await.expect("competition"),
        madrid: store.create_team(team(541, "Real Madrid")).await.expect("madrid"),
        barcelona: store.create_team(team(529, "Barcelona")).await.expect("barcelona"),
        atletico: store.create_team(team(530, "Atletico Madrid")).await.expect("atletico"),
    }
}

pub fn kickoff(days_from_now: i64) -> DateTime<Utc> {
    Utc::now() + Duration::days(days_from_now)
}

pub fn fixed_kickoff() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, 26, 19, 0, 0).unwrap()
}

pub fn fixture(
    external_id: i64,
    competition_id: Uuid,
    home: Uuid,
    away: Uuid,
    match_date: DateTime<Utc>,
) -> NewMatch {
    NewMatch {
        external_id,
        competition_id,
        home_team_id: home,
        away_team_id: away,
        match_date,
        venue: Some("Santiago Bernabéu".into()),
        season: 2024,
        round: Some("Regular Season - 11".into()),
        home_score: None,
        away_score: None,
        status: MatchStatus::Scheduled,
        referee: None,
    }
}

pub mod scenarios;
