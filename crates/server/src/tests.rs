use super::*;
use std::time::Duration;
use wayfarer_protocol::Direction;

fn temp_store() -> Store {
    let p = std::env::temp_dir().join(format!(
        "wayfarer-server-test-{}.db",
        time::OffsetDateTime::now_utc().unix_timestamp_nanos()
    ));
    let store = Store::new(p);
    let _ = store.open().expect("open db");
    store
}

const CATALOG_YAML: &str = r#"
town:
  x: 0
  y: 0
expeditions:
  day3-north:
    day: 3
    name: North sweep
    route: "0-0_0-3"
  day5-east:
    day: 5
    name: East run
    route: "0-0_3-0"
"#;

fn test_state() -> Arc<AppState> {
    let catalog = Catalog::from_yaml(CATALOG_YAML).unwrap();
    Arc::new(AppState::new(temp_store(), catalog))
}

fn snapshot(readout: &str) -> PageSnapshot {
    PageSnapshot {
        readout: Some(readout.to_string()),
        controls: Direction::ALL.to_vec(),
    }
}

async fn latest_highlight(state: &Arc<AppState>) -> UiUpdate {
    // The session resolves snapshots asynchronously; poll briefly.
    for _ in 0..100 {
        let out = api_track_latest(axum::extract::State(state.clone())).await;
        if let Some(update) = out.0 {
            return update;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("no highlight published in time");
}

#[tokio::test]
async fn select_start_and_refresh_highlights_next_move() {
    let state = test_state();

    api_route_select(
        axum::extract::State(state.clone()),
        Json(SelectRouteInput {
            route: "0-0_1-0_1-1".to_string(),
            town_x: 0,
            town_y: 0,
        }),
    )
    .await
    .unwrap();

    let started = api_track_start(axum::extract::State(state.clone()))
        .await
        .unwrap();
    assert_eq!(started.0.cells, 3);

    // Player stands at local (1, 0) => absolute (1, 0), cursor 1; the next
    // cell is (1, 1), so the south control gets highlighted.
    let posted = api_page_state(
        axum::extract::State(state.clone()),
        Json(snapshot("Position: 1 / 0")),
    )
    .await;
    assert_eq!(posted.0["tracking"], true);

    let update = latest_highlight(&state).await;
    assert_eq!(update.patches[0].target, "action-move-south");

    let stopped = api_track_stop(axum::extract::State(state.clone())).await;
    assert_eq!(stopped.0["was_tracking"], true);
}

#[tokio::test]
async fn start_without_selection_is_a_conflict() {
    let state = test_state();
    let err = api_track_start(axum::extract::State(state))
        .await
        .unwrap_err();
    assert_eq!(err.0, StatusCode::CONFLICT);
}

#[tokio::test]
async fn select_rejects_malformed_route() {
    let state = test_state();
    let err = api_route_select(
        axum::extract::State(state),
        Json(SelectRouteInput {
            route: "0-0_bogus".to_string(),
            town_x: 0,
            town_y: 0,
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.0, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn expeditions_are_listed_newest_first() {
    let state = test_state();
    let out = api_expeditions(axum::extract::State(state)).await;
    let ids: Vec<&str> = out.0.expeditions.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["day5-east", "day3-north"]);
}

#[tokio::test]
async fn page_state_when_idle_reports_not_tracking() {
    let state = test_state();
    let posted = api_page_state(
        axum::extract::State(state),
        Json(snapshot("Position: 0 / 0")),
    )
    .await;
    assert_eq!(posted.0["tracking"], false);
}

#[tokio::test]
async fn stop_when_idle_is_a_noop() {
    let state = test_state();
    let stopped = api_track_stop(axum::extract::State(state)).await;
    assert_eq!(stopped.0["was_tracking"], false);
}

#[tokio::test]
async fn restarting_replaces_the_previous_session() {
    let state = test_state();
    api_route_select(
        axum::extract::State(state.clone()),
        Json(SelectRouteInput {
            route: "0-0_2-0".to_string(),
            town_x: 0,
            town_y: 0,
        }),
    )
    .await
    .unwrap();

    api_track_start(axum::extract::State(state.clone()))
        .await
        .unwrap();
    api_track_start(axum::extract::State(state.clone()))
        .await
        .unwrap();

    let status = api_status(axum::extract::State(state.clone())).await.unwrap();
    assert!(status.0.tracking);
    assert!(status.0.route_selected);

    // Exactly one live session: the replacement still resolves snapshots.
    api_page_state(
        axum::extract::State(state.clone()),
        Json(snapshot("Position: 0 / 0")),
    )
    .await;
    let update = latest_highlight(&state).await;
    assert_eq!(update.patches[0].target, "action-move-east");
}

#[test]
fn catalog_preserves_document_order() {
    let catalog = Catalog::from_yaml(CATALOG_YAML).unwrap();
    let ids: Vec<&str> = catalog
        .entries()
        .iter()
        .map(|(id, _)| id.as_str())
        .collect();
    assert_eq!(ids, ["day3-north", "day5-east"]);
    assert_eq!(catalog.town(), Coord::new(0, 0));
    assert_eq!(catalog.entries()[1].1.day, 5);
}

#[test]
fn loopback_and_game_origins_are_allowed() {
    use axum::http::HeaderValue;

    assert!(is_loopback_peer("127.0.0.1".parse().unwrap()));
    assert!(!is_loopback_peer("192.168.1.10".parse().unwrap()));

    for origin in [
        "https://myhordes.eu",
        "https://fatamorgana.md26.eu",
        "http://localhost:5173",
        "http://127.0.0.1",
    ] {
        assert!(
            is_allowed_origin(&HeaderValue::from_str(origin).unwrap()),
            "{origin} should be allowed"
        );
    }
    assert!(!is_allowed_origin(
        &HeaderValue::from_static("https://evil.example")
    ));
}
