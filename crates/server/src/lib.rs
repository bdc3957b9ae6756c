//! Local HTTP surface for the Wayfarer expedition tracker.
//!
//! A thin userscript in the game page talks to this server: it posts DOM
//! observations (`/api/page/state`) whenever the move controls mutate and
//! applies whatever patches `/api/track/latest` hands back. The planning-site
//! side of the userscript lists `/api/expeditions` and posts the chosen route
//! to `/api/route/select`. Everything stateful lives in the engine crate.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::{
    middleware,
    response::{Html, IntoResponse},
    routing::get,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;
use wayfarer_engine::{expand, parse_route, session, Session, Store, Tracker};
use wayfarer_protocol::{Coord, Expedition, PageSnapshot, UiUpdate};

pub mod catalog;
pub use catalog::Catalog;

#[cfg(test)]
mod tests;

pub struct AppState {
    pub store: Store,
    pub catalog: Catalog,
    /// At most one tracking session at a time; starting a new one stops the
    /// previous session first.
    pub session: Mutex<Option<Session>>,
}

impl AppState {
    pub fn new(store: Store, catalog: Catalog) -> Self {
        Self {
            store,
            catalog,
            session: Mutex::new(None),
        }
    }
}

type ApiError = (StatusCode, String);

fn internal(err: anyhow::Error) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/health", get(health))
        .route("/api/status", get(api_status))
        .route("/api/expeditions", get(api_expeditions))
        .route("/api/route/select", post(api_route_select))
        .route("/api/track/start", post(api_track_start))
        .route("/api/track/stop", post(api_track_stop))
        .route("/api/track/latest", get(api_track_latest))
        .route("/api/page/state", post(api_page_state))
        .with_state(state)
        // Local security: only the loopback peer may talk to us.
        .layer(middleware::from_fn(ip_allowlist))
        // The userscript runs inside the game pages, so those origins must be
        // allowed explicitly. Never `Access-Control-Allow-Origin: *`: this
        // service reflects what the player is doing in the game.
        .layer(game_origin_cors())
}

async fn health() -> &'static str {
    "ok"
}

async fn dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

#[derive(Debug, Serialize)]
pub struct StatusOut {
    pub rev: i64,
    pub route_selected: bool,
    pub tracking: bool,
}

async fn api_status(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> Result<Json<StatusOut>, ApiError> {
    let rev = state.store.rev().map_err(internal)?;
    let route_selected = state.store.selected_route().map_err(internal)?.is_some();
    let tracking = match state.session.lock().await.as_ref() {
        Some(session) => !session.handle.is_finished(),
        None => false,
    };
    Ok(Json(StatusOut {
        rev,
        route_selected,
        tracking,
    }))
}

#[derive(Debug, Serialize)]
pub struct ExpeditionEntry {
    pub id: String,
    #[serde(flatten)]
    pub expedition: Expedition,
}

#[derive(Debug, Serialize)]
pub struct ExpeditionsOut {
    pub town: Coord,
    pub expeditions: Vec<ExpeditionEntry>,
}

async fn api_expeditions(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> Json<ExpeditionsOut> {
    let expeditions = state
        .catalog
        .newest_first()
        .map(|(id, expedition)| ExpeditionEntry {
            id: id.clone(),
            expedition: expedition.clone(),
        })
        .collect();
    Json(ExpeditionsOut {
        town: state.catalog.town(),
        expeditions,
    })
}

#[derive(Debug, Deserialize)]
pub struct SelectRouteInput {
    pub route: String,
    pub town_x: i64,
    pub town_y: i64,
}

async fn api_route_select(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
    Json(input): Json<SelectRouteInput>,
) -> Result<Json<serde_json::Value>, ApiError> {
    // Reject routes the tracker could never expand instead of storing them.
    if let Err(err) = parse_route(&input.route) {
        return Err((StatusCode::UNPROCESSABLE_ENTITY, err.to_string()));
    }
    let origin = Coord::new(input.town_x, input.town_y);
    state
        .store
        .select_route(&input.route, origin)
        .map_err(internal)?;
    let rev = state.store.rev().map_err(internal)?;
    info!(rev, "route selected");
    Ok(Json(serde_json::json!({ "ok": true, "rev": rev })))
}

#[derive(Debug, Serialize)]
pub struct TrackStartOut {
    /// Number of cells in the expanded dense path.
    pub cells: usize,
}

async fn api_track_start(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> Result<Json<TrackStartOut>, ApiError> {
    let mut guard = state.session.lock().await;
    // Stop the previous activation so observers never accumulate.
    if let Some(previous) = guard.take() {
        previous.handle.stop().await;
    }

    let Some(selected) = state.store.selected_route().map_err(internal)? else {
        return Err((StatusCode::CONFLICT, "no route selected".to_string()));
    };
    let waypoints = parse_route(&selected.route)
        .map_err(|err| internal(anyhow::anyhow!("stored route is invalid: {err}")))?;
    let path = expand(&waypoints);
    let cells = path.len();
    let tracker = Tracker::new(path, selected.origin);

    *guard = Some(Session::spawn(tracker, session::FIRST_SNAPSHOT_TIMEOUT));
    info!(cells, "tracking started");
    Ok(Json(TrackStartOut { cells }))
}

async fn api_track_stop(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> Json<serde_json::Value> {
    let was_tracking = {
        let mut guard = state.session.lock().await;
        match guard.take() {
            Some(session) => {
                let was = !session.handle.is_finished();
                session.handle.stop().await;
                was
            }
            None => false,
        }
    };
    Json(serde_json::json!({ "ok": true, "was_tracking": was_tracking }))
}

async fn api_track_latest(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> Json<Option<UiUpdate>> {
    let latest = match state.session.lock().await.as_ref() {
        Some(session) => session.updates.borrow().clone(),
        None => None,
    };
    Json(latest)
}

async fn api_page_state(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
    Json(snapshot): Json<PageSnapshot>,
) -> Json<serde_json::Value> {
    let guard = state.session.lock().await;
    let tracking = match guard.as_ref() {
        Some(session) if !session.handle.is_finished() => {
            session.snapshots.send(snapshot).await.is_ok()
        }
        _ => false,
    };
    Json(serde_json::json!({ "ok": tracking, "tracking": tracking }))
}

pub async fn serve(addr: SocketAddr, db_path: PathBuf, catalog_path: PathBuf) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve_listener(listener, db_path, catalog_path, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;
    Ok(())
}

pub async fn serve_listener(
    listener: tokio::net::TcpListener,
    db_path: PathBuf,
    catalog_path: PathBuf,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<SocketAddr> {
    let catalog = Catalog::load(&catalog_path)?;
    let state = Arc::new(AppState::new(Store::new(db_path), catalog));
    let app = build_router(state);
    let addr = listener.local_addr()?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    Ok(addr)
}

async fn ip_allowlist(
    axum::extract::ConnectInfo(peer): axum::extract::ConnectInfo<SocketAddr>,
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    if is_loopback_peer(peer.ip()) {
        return next.run(req).await;
    }
    (StatusCode::FORBIDDEN, "forbidden").into_response()
}

fn is_loopback_peer(ip: IpAddr) -> bool {
    ip.is_loopback()
}

/// Origins the userscript runs under.
const GAME_ORIGINS: [&str; 2] = ["https://myhordes.eu", "https://fatamorgana.md26.eu"];

fn game_origin_cors() -> CorsLayer {
    use axum::http::header;
    use axum::http::HeaderValue;
    use axum::http::Method;

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _req| {
            is_allowed_origin(origin)
        }))
}

fn is_allowed_origin(origin: &axum::http::HeaderValue) -> bool {
    let Ok(s) = origin.to_str() else {
        return false;
    };

    if GAME_ORIGINS.contains(&s) {
        return true;
    }

    // Local dev pages.
    is_http_origin_for_host(s, "localhost") || is_http_origin_for_host(s, "127.0.0.1")
}

fn is_http_origin_for_host(origin: &str, host: &str) -> bool {
    for scheme in ["http://", "https://"] {
        if let Some(rest) = origin.strip_prefix(scheme) {
            if let Some(after) = rest.strip_prefix(host) {
                // Origin is just scheme://host[:port]
                return after.is_empty() || after.starts_with(':');
            }
        }
    }
    false
}

const DASHBOARD_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>Wayfarer</title>
  <style>
    body{font-family:system-ui,sans-serif;margin:2rem;max-width:40rem;color:#222}
    h1{font-size:1.3rem}
    dt{font-weight:600;margin-top:.6rem}
    code{background:#eee;padding:0 .3rem;border-radius:4px}
  </style>
</head>
<body>
  <h1>Wayfarer expedition tracker</h1>
  <dl>
    <dt>Store revision</dt><dd id="rev">-</dd>
    <dt>Route selected</dt><dd id="selected">-</dd>
    <dt>Tracking</dt><dd id="tracking">-</dd>
  </dl>
  <p>Userscript endpoints: <code>GET /api/expeditions</code>,
     <code>POST /api/route/select</code>, <code>POST /api/track/start</code>,
     <code>POST /api/page/state</code>, <code>GET /api/track/latest</code>.</p>
  <script>
  (async function(){
    for(;;){
      try{
        const s = await (await fetch("/api/status", { cache: "no-store" })).json();
        document.getElementById("rev").textContent = s.rev;
        document.getElementById("selected").textContent = s.route_selected;
        document.getElementById("tracking").textContent = s.tracking;
      }catch(_e){}
      await new Promise(res => setTimeout(res, 1500));
    }
  })();
  </script>
</body>
</html>
"#;
