use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use test_log::test;

use team_manager::config::TeamConfig;
use team_manager::store::MemoryStore;
use team_manager::types::Player;
use team_manager::web::{router, AppState};
use team_manager::Team;

fn server() -> TestServer {
    let team = Team::new(Arc::new(MemoryStore::new()), TeamConfig::default());
    TestServer::new(router(AppState { team })).unwrap()
}

fn player_body(name: &str, expires_in_days: i64) -> Value {
    let expires = Utc::now().date_naive() + Duration::days(expires_in_days);
    json!({
        "fullName": name,
        "dateOfBirth": "2011-04-09",
        "healthCardExpiration": expires.format("%Y-%m-%d").to_string(),
        "goalsScored": 3,
    })
}

async fn create_player(server: &TestServer, name: &str) -> Player {
    let response = server.post("/api/players").json(&player_body(name, 200)).await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json::<Player>()
}

#[test(tokio::test)]
async fn test_health_reports_backend() {
    let response = server().get("/api/health").await;
    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>(),
        json!({ "status": "ok", "backend": "memory" })
    );
}

#[test(tokio::test)]
async fn test_create_then_list_players() {
    let server = server();
    let created = create_player(&server, "Lucía Méndez").await;
    assert_eq!(created.full_name, "Lucía Méndez");
    assert_eq!(created.goals_scored, 3);

    let listed = server.get("/api/players").await.json::<Vec<Value>>();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["fullName"], "Lucía Méndez");
    assert_eq!(listed[0]["healthCard"]["status"], "valid");

    let fetched = server
        .get(&format!("/api/players/{}", created.id))
        .await
        .json::<Player>();
    assert_eq!(fetched, created);
}

#[test(tokio::test)]
async fn test_search_needs_two_characters() {
    let server = server();
    create_player(&server, "Lucía Méndez").await;
    create_player(&server, "Luna Prieto").await;

    let short = server
        .get("/api/players/search")
        .add_query_param("q", "l")
        .await
        .json::<Vec<Value>>();
    assert!(short.is_empty());

    let found = server
        .get("/api/players/search")
        .add_query_param("q", "lu")
        .await
        .json::<Vec<Value>>();
    assert_eq!(found.len(), 2);
}

#[test(tokio::test)]
async fn test_invalid_player_is_unprocessable() {
    let server = server();
    let response = server
        .post("/api/players")
        .json(&player_body("   ", 10))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["error"], "Validation failed");

    let listed = server.get("/api/players").await.json::<Vec<Value>>();
    assert!(listed.is_empty());
}

#[test(tokio::test)]
async fn test_delete_requires_confirmation() {
    let server = server();
    let created = create_player(&server, "Nerea Ortiz").await;
    let path = format!("/api/players/{}", created.id);

    let unconfirmed = server.delete(&path).await;
    assert_eq!(unconfirmed.status_code(), StatusCode::CONFLICT);
    server.get(&path).await.assert_status_ok();

    let confirmed = server.delete(&path).add_query_param("confirm", true).await;
    assert_eq!(confirmed.status_code(), StatusCode::NO_CONTENT);
    assert_eq!(server.get(&path).await.status_code(), StatusCode::NOT_FOUND);
}

#[test(tokio::test)]
async fn test_unknown_ids_are_not_found() {
    let server = server();
    let id = uuid::Uuid::new_v4();

    let profile = server.get(&format!("/api/players/{}/profile", id)).await;
    assert_eq!(profile.status_code(), StatusCode::NOT_FOUND);

    let update = server
        .put(&format!("/api/practices/{}", id))
        .json(&json!({ "date": "2026-11-02T18:00", "attendees": [] }))
        .await;
    assert_eq!(update.status_code(), StatusCode::NOT_FOUND);

    let delete = server
        .delete(&format!("/api/matches/{}", id))
        .add_query_param("confirm", true)
        .await;
    assert_eq!(delete.status_code(), StatusCode::NOT_FOUND);
}

#[test(tokio::test)]
async fn test_practice_and_match_flow() {
    let server = server();
    let ana = create_player(&server, "Ana Ruiz").await;
    let bea = create_player(&server, "Bea Gil").await;

    let tomorrow = (Utc::now() + Duration::days(1)).to_rfc3339();
    let practice = server
        .post("/api/practices")
        .json(&json!({
            "date": tomorrow,
            "attendees": [ana.id],
            "absentees": [bea.id],
        }))
        .await;
    assert_eq!(practice.status_code(), StatusCode::CREATED);

    let upcoming = server
        .get("/api/practices/upcoming")
        .await
        .json::<Vec<Value>>();
    assert_eq!(upcoming.len(), 1);
    assert_eq!(upcoming[0]["attendeeCount"], 1);

    let game = server
        .post("/api/matches")
        .json(&json!({
            "date": "2026-09-12T10:00:00Z",
            "rival": "CD Leganés",
            "result": { "homeScore": 1, "awayScore": 0 },
            "players": [
                { "playerId": ana.id, "minutesPlayed": 90 },
                { "playerId": bea.id, "minutesPlayed": 25, "substitutionTime": 65 },
            ],
        }))
        .await;
    assert_eq!(game.status_code(), StatusCode::CREATED);

    let listed = server.get("/api/matches").await.json::<Vec<Value>>();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["score"], "1 - 0");
    assert_eq!(listed[0]["playersSummary"], "Ana Ruiz, Bea Gil (Sub: 65')");

    let rivals = server.get("/api/matches/rivals").await.json::<Vec<String>>();
    assert_eq!(rivals, vec!["CD Leganés"]);

    let dashboard = server.get("/api/dashboard").await.json::<Value>();
    assert_eq!(dashboard["counts"]["totalPlayers"], 2);
    assert_eq!(dashboard["counts"]["totalMatches"], 1);
}
