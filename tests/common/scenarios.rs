//! Behaviour every `MatchStore` implementation must share.

use chrono::Duration;
use football_predictor::error::{ConstraintViolation, Entity, Lookup, StoreError};
use football_predictor::model::{MatchModel, Outcome};
use football_predictor::schema::{CompetitionType, MatchStatus, SortOrder, TeamRole};
use football_predictor::store::{MatchPatch, MatchQuery, MatchStore, NewCompetition};
use futures::future::join_all;
use uuid::Uuid;

use super::{fixed_kickoff, fixture, kickoff, la_liga, seed, team};

pub async fn result_update_sets_derived_state(store: &dyn MatchStore) {
    let s = seed(store).await;
    let created = store
        .create_match(fixture(1_208_021, s.la_liga.id, s.madrid.id, s.barcelona.id, kickoff(3)))
        .await
        .expect("create");
    assert_eq!(created.created_at, created.updated_at);
    assert!(created.is_upcoming());
    assert!(!created.has_result());
    assert_eq!(created.winner(), None);

    let updated = store
        .update_match(
            created.id,
            MatchPatch {
                home_score: Some(Some(2)),
                away_score: Some(Some(1)),
                status: Some(MatchStatus::Completed),
                ..MatchPatch::default()
            },
        )
        .await
        .expect("update");

    assert!(updated.has_result());
    assert_eq!(updated.winner(), Some(Outcome::Home));
    assert!(updated.is_completed());
    assert!(!updated.is_upcoming());
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at > created.created_at);
    assert_eq!(updated.match_date, created.match_date);

    assert_eq!(store.get_match(created.id).await.expect("reload"), updated);
}

pub async fn completing_a_match_only_flips_upcoming(store: &dyn MatchStore) {
    let s = seed(store).await;
    let created = store
        .create_match(fixture(9001, s.la_liga.id, s.madrid.id, s.atletico.id, kickoff(7)))
        .await
        .expect("create");
    assert!(created.is_upcoming());

    let updated = store
        .update_match(
            created.id,
            MatchPatch {
                status: Some(MatchStatus::Completed),
                ..MatchPatch::default()
            },
        )
        .await
        .expect("update");
    assert!(!updated.is_upcoming());
    assert_eq!(updated.home_score, created.home_score);
    assert_eq!(updated.venue, created.venue);
    assert_eq!(updated.round, created.round);
}

pub async fn same_team_is_rejected(store: &dyn MatchStore) {
    let s = seed(store).await;
    let err = store
        .create_match(fixture(77, s.la_liga.id, s.madrid.id, s.madrid.id, kickoff(3)))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Constraint(ConstraintViolation::SameTeam)), "{err:?}");
    assert!(!err.is_retryable());

    let all = store.list_matches(&MatchQuery::default()).await.expect("list");
    assert!(all.is_empty());
}

pub async fn duplicate_fixture_is_rejected(store: &dyn MatchStore) {
    let s = seed(store).await;
    let at = fixed_kickoff();
    let first = store
        .create_match(fixture(1, s.la_liga.id, s.madrid.id, s.barcelona.id, at))
        .await
        .expect("first");

    let err = store
        .create_match(fixture(2, s.la_liga.id, s.madrid.id, s.barcelona.id, at))
        .await
        .unwrap_err();
    assert!(
        matches!(err, StoreError::Constraint(ConstraintViolation::DuplicateFixture)),
        "{err:?}"
    );

    assert_eq!(store.get_match(first.id).await.expect("first"), first);
    let err = store.get_match_by_external_id(2).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::NotFound {
            entity: Entity::Match,
            lookup: Lookup::ExternalId(2)
        }
    ));

    // the reverse fixture and a different season are distinct fixtures
    store
        .create_match(fixture(3, s.la_liga.id, s.barcelona.id, s.madrid.id, at))
        .await
        .expect("reverse fixture");
    let mut next_season = fixture(4, s.la_liga.id, s.madrid.id, s.barcelona.id, at);
    next_season.season = 2025;
    store.create_match(next_season).await.expect("next season");
}

pub async fn duplicate_external_ids_are_rejected(store: &dyn MatchStore) {
    let s = seed(store).await;

    let err = store.create_competition(la_liga()).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Constraint(ConstraintViolation::DuplicateExternalId {
            entity: Entity::Competition,
            external_id: 140
        })
    ));

    let err = store.create_team(team(541, "Madrid again")).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Constraint(ConstraintViolation::DuplicateExternalId {
            entity: Entity::Team,
            external_id: 541
        })
    ));

    store
        .create_match(fixture(500, s.la_liga.id, s.madrid.id, s.barcelona.id, kickoff(1)))
        .await
        .expect("first");
    let err = store
        .create_match(fixture(500, s.la_liga.id, s.atletico.id, s.barcelona.id, kickoff(2)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Constraint(ConstraintViolation::DuplicateExternalId {
            entity: Entity::Match,
            external_id: 500
        })
    ));
}

pub async fn unknown_references_are_rejected(store: &dyn MatchStore) {
    let s = seed(store).await;
    let ghost = Uuid::new_v4();

    let err = store
        .create_match(fixture(10, ghost, s.madrid.id, s.barcelona.id, kickoff(1)))
        .await
        .unwrap_err();
    assert!(
        matches!(err, StoreError::Referential { field: "competition_id", id, .. } if id == ghost),
        "{err:?}"
    );

    let err = store
        .create_match(fixture(11, s.la_liga.id, s.madrid.id, ghost, kickoff(1)))
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            StoreError::Referential {
                field: "away_team_id",
                entity: Entity::Team,
                id,
            } if id == ghost
        ),
        "{err:?}"
    );
}

pub async fn rejected_update_leaves_match_unchanged(store: &dyn MatchStore) {
    let s = seed(store).await;
    let created = store
        .create_match(fixture(20, s.la_liga.id, s.madrid.id, s.barcelona.id, kickoff(1)))
        .await
        .expect("create");

    let err = store
        .update_match(
            created.id,
            MatchPatch {
                home_score: Some(Some(1)),
                away_score: Some(Some(-2)),
                status: Some(MatchStatus::Completed),
                ..MatchPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Constraint(ConstraintViolation::NegativeScore {
            field: "away_score",
            value: -2
        })
    ));
    assert_eq!(store.get_match(created.id).await.expect("reload"), created);

    let err = store
        .update_match(Uuid::new_v4(), MatchPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { entity: Entity::Match, .. }));
}

pub async fn deleting_competition_cascades(store: &dyn MatchStore) {
    let s = seed(store).await;
    let copa = store
        .create_competition(NewCompetition {
            external_id: 143,
            name: "Copa del Rey".into(),
            kind: CompetitionType::Cup,
            logo_url: None,
            country: Some("Spain".into()),
            tier: None,
        })
        .await
        .expect("copa");

    for (i, (home, away)) in [
        (s.madrid.id, s.barcelona.id),
        (s.barcelona.id, s.atletico.id),
        (s.atletico.id, s.madrid.id),
    ]
    .into_iter()
    .enumerate()
    {
        store
            .create_match(fixture(100 + i as i64, s.la_liga.id, home, away, kickoff(i as i64 + 1)))
            .await
            .expect("league match");
    }
    let cup_match = store
        .create_match(fixture(200, copa.id, s.madrid.id, s.barcelona.id, kickoff(4)))
        .await
        .expect("cup match");

    assert_eq!(store.delete_competition(s.la_liga.id).await.expect("delete"), 3);

    let league = MatchQuery {
        competition_id: Some(s.la_liga.id),
        ..MatchQuery::default()
    };
    assert!(store.list_matches(&league).await.expect("list").is_empty());
    assert_eq!(
        store.list_matches(&MatchQuery::default()).await.expect("all"),
        vec![cup_match]
    );
    assert!(matches!(
        store.get_competition(s.la_liga.id).await.unwrap_err(),
        StoreError::NotFound {
            entity: Entity::Competition,
            ..
        }
    ));
    assert!(matches!(
        store.delete_competition(s.la_liga.id).await.unwrap_err(),
        StoreError::NotFound { .. }
    ));
    // teams are referenced, not owned
    store.get_team(s.madrid.id).await.expect("team survives");
}

pub async fn referenced_team_cannot_be_deleted(store: &dyn MatchStore) {
    let s = seed(store).await;
    let m = store
        .create_match(fixture(30, s.la_liga.id, s.madrid.id, s.barcelona.id, kickoff(2)))
        .await
        .expect("create");

    let err = store.delete_team(s.barcelona.id).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Constraint(ConstraintViolation::TeamInUse { team_id })
            if team_id == s.barcelona.id
    ));
    store.get_team(s.barcelona.id).await.expect("still there");

    store.delete_match(m.id).await.expect("delete match");
    store.delete_team(s.barcelona.id).await.expect("delete team");
    assert!(matches!(
        store.get_team(s.barcelona.id).await.unwrap_err(),
        StoreError::NotFound { entity: Entity::Team, .. }
    ));
}

pub async fn lookups_by_either_id(store: &dyn MatchStore) {
    let s = seed(store).await;
    let m = store
        .create_match(fixture(1_035_037, s.la_liga.id, s.madrid.id, s.barcelona.id, kickoff(3)))
        .await
        .expect("create");

    assert_eq!(store.get_match(m.id).await.expect("by id"), m);
    assert_eq!(store.get_match_by_external_id(1_035_037).await.expect("by external"), m);

    let missing = Uuid::new_v4();
    assert!(matches!(
        store.get_match(missing).await.unwrap_err(),
        StoreError::NotFound { entity: Entity::Match, lookup: Lookup::Id(id) } if id == missing
    ));
}

pub async fn listing_filters_and_orders(store: &dyn MatchStore) {
    let s = seed(store).await;
    let base = fixed_kickoff();

    let (two_weeks, one_week) = (base + Duration::days(14), base + Duration::days(7));

    let a = store
        .create_match(fixture(1, s.la_liga.id, s.madrid.id, s.barcelona.id, two_weeks))
        .await
        .expect("a");
    let b = store
        .create_match(fixture(2, s.la_liga.id, s.atletico.id, s.madrid.id, base))
        .await
        .expect("b");
    let c = store
        .create_match(fixture(3, s.la_liga.id, s.barcelona.id, s.atletico.id, one_week))
        .await
        .expect("c");
    let c = store
        .update_match(
            c.id,
            MatchPatch {
                status: Some(MatchStatus::Postponed),
                ..MatchPatch::default()
            },
        )
        .await
        .expect("postpone");

    let ids = |rows: Vec<MatchModel>| rows.into_iter().map(|m| m.id).collect::<Vec<_>>();

    let all = store.list_matches(&MatchQuery::default()).await.expect("all");
    assert_eq!(ids(all), vec![b.id, c.id, a.id]);

    let desc = MatchQuery {
        order: SortOrder::Desc,
        ..MatchQuery::default()
    };
    assert_eq!(ids(store.list_matches(&desc).await.expect("desc")), vec![a.id, c.id, b.id]);

    let madrid = MatchQuery::for_team(s.madrid.id, TeamRole::Either);
    assert_eq!(ids(store.list_matches(&madrid).await.expect("madrid")), vec![b.id, a.id]);

    let madrid_home = MatchQuery::for_team(s.madrid.id, TeamRole::Home);
    assert_eq!(ids(store.list_matches(&madrid_home).await.expect("home")), vec![a.id]);

    let postponed = MatchQuery {
        status: Some(MatchStatus::Postponed),
        ..MatchQuery::default()
    };
    assert_eq!(ids(store.list_matches(&postponed).await.expect("status")), vec![c.id]);

    let window = MatchQuery {
        from: Some(base),
        to: Some(base + Duration::days(14)),
        ..MatchQuery::default()
    };
    assert_eq!(ids(store.list_matches(&window).await.expect("window")), vec![b.id, c.id]);

    let paged = MatchQuery {
        limit: Some(1),
        offset: 1,
        ..MatchQuery::default()
    };
    assert_eq!(ids(store.list_matches(&paged).await.expect("page")), vec![c.id]);

    let combined = MatchQuery {
        competition_id: Some(s.la_liga.id),
        status: Some(MatchStatus::Scheduled),
        ..MatchQuery::for_team(s.atletico.id, TeamRole::Either)
    };
    assert_eq!(ids(store.list_matches(&combined).await.expect("combined")), vec![b.id]);
}

pub async fn team_matches_are_split_by_role(store: &dyn MatchStore) {
    let s = seed(store).await;
    let home = store
        .create_match(fixture(1, s.la_liga.id, s.madrid.id, s.barcelona.id, kickoff(3)))
        .await
        .expect("home");
    let away = store
        .create_match(fixture(2, s.la_liga.id, s.atletico.id, s.madrid.id, kickoff(7)))
        .await
        .expect("away");
    store
        .create_match(fixture(3, s.la_liga.id, s.barcelona.id, s.atletico.id, kickoff(10)))
        .await
        .expect("unrelated");

    let split = store.team_matches(s.madrid.id).await.expect("split");
    assert_eq!(split.home, vec![home]);
    assert_eq!(split.away, vec![away]);

    assert!(matches!(
        store.team_matches(Uuid::new_v4()).await.unwrap_err(),
        StoreError::NotFound { entity: Entity::Team, .. }
    ));
}

pub async fn concurrent_duplicates_have_one_winner(store: &dyn MatchStore) {
    let s = seed(store).await;
    let at = fixed_kickoff();

    let attempts = (0..8).map(|i| {
        store.create_match(fixture(4000 + i, s.la_liga.id, s.madrid.id, s.barcelona.id, at))
    });
    let results = join_all(attempts).await;

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for err in results.into_iter().filter_map(Result::err) {
        assert!(
            matches!(err, StoreError::Constraint(ConstraintViolation::DuplicateFixture)),
            "{err:?}"
        );
    }
    assert_eq!(store.list_matches(&MatchQuery::default()).await.expect("list").len(), 1);
}

pub async fn empty_patch_leaves_match_untouched(store: &dyn MatchStore) {
    let s = seed(store).await;
    let created = store
        .create_match(fixture(61, s.la_liga.id, s.madrid.id, s.barcelona.id, kickoff(3)))
        .await
        .expect("create");

    let same = store
        .update_match(created.id, MatchPatch::default())
        .await
        .expect("empty patch");
    assert_eq!(same, created);
    assert_eq!(same.updated_at, created.created_at);

    let err = store
        .update_match(Uuid::new_v4(), MatchPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { entity: Entity::Match, .. }), "{err:?}");
}

pub async fn external_id_clash_is_reported_before_fixture_clash(store: &dyn MatchStore) {
    let s = seed(store).await;
    let at = fixed_kickoff();
    for ext in 10..20 {
        let at = at + Duration::days(ext);
        store
            .create_match(fixture(ext, s.la_liga.id, s.madrid.id, s.barcelona.id, at))
            .await
            .expect("fixture");
    }

    // collides with match 15 on external id and with match 12 on the fixture
    let clash = fixture(15, s.la_liga.id, s.madrid.id, s.barcelona.id, at + Duration::days(12));
    let err = store
        .create_match(clash)
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            StoreError::Constraint(ConstraintViolation::DuplicateExternalId {
                entity: Entity::Match,
                external_id: 15
            })
        ),
        "{err:?}"
    );
}

pub async fn offset_past_the_end_is_empty(store: &dyn MatchStore) {
    let s = seed(store).await;
    store
        .create_match(fixture(71, s.la_liga.id, s.madrid.id, s.barcelona.id, kickoff(3)))
        .await
        .expect("create");

    let query = MatchQuery {
        limit: Some(usize::MAX),
        offset: usize::MAX,
        ..MatchQuery::default()
    };
    assert!(store.list_matches(&query).await.expect("list").is_empty());
    assert!(store
        .list_competitions(usize::MAX, usize::MAX)
        .await
        .expect("competitions")
        .is_empty());
}
