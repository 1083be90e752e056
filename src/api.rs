// Medicine Inventory - HTTP API
// JSON view of the same tabs the terminal UI renders.

use crate::card::MedicineCard;
use crate::db::SqliteStore;
use crate::error::{ShortlistError, SubscriptionError};
use crate::inventory::{add_to_shortlist, render_tab, Catalog, Tab, TabView};
use crate::locale::Language;
use crate::medicine::Collection;
use crate::shortlist::Shortlist;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    catalog: Arc<Mutex<Catalog>>,
    sessions: Arc<Mutex<HashMap<Uuid, Shortlist>>>,
}

impl AppState {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog: Arc::new(Mutex::new(catalog)),
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn catalog(&self) -> MutexGuard<'_, Catalog> {
        self.catalog.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<Uuid, Shortlist>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// API Response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::<()>::err(message))).into_response()
}

/// One tab as JSON. `items` is null while loading or when an error is shown.
#[derive(Debug, Serialize)]
pub struct TabResponse {
    pub loading: bool,
    pub error: Option<SubscriptionError>,
    pub items: Option<Vec<MedicineCard>>,
}

impl From<TabView> for TabResponse {
    fn from(view: TabView) -> Self {
        match view {
            TabView::Loading => Self {
                loading: true,
                error: None,
                items: None,
            },
            TabView::Failed(error) => Self {
                loading: false,
                error: Some(error),
                items: None,
            },
            TabView::List(cards) => Self {
                loading: false,
                error: None,
                items: Some(cards),
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct TabQuery {
    #[serde(default)]
    q: String,
    #[serde(default)]
    lang: Language,
    /// Whose shortlist `my-medicines` shows.
    session: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionResponse {
    session: Uuid,
}

#[derive(Debug, Deserialize)]
struct AddRequest {
    collection: Collection,
    id: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct AddResponse {
    added: bool,
    count: usize,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/tabs/:tab - Render one tab
async fn get_tab(
    State(state): State<AppState>,
    Path(tab): Path<String>,
    Query(query): Query<TabQuery>,
) -> Response {
    let Ok(tab) = tab.parse::<Tab>() else {
        return failure(StatusCode::NOT_FOUND, format!("unknown tab: {}", tab));
    };

    let shortlist = match (tab, query.session) {
        (Tab::MyMedicines, Some(session)) => match state.sessions().get(&session) {
            Some(list) => list.clone(),
            None => return failure(StatusCode::NOT_FOUND, "unknown session"),
        },
        _ => Shortlist::new(),
    };

    let view = render_tab(&state.catalog(), &shortlist, tab, &query.q, query.lang);
    Json(ApiResponse::ok(TabResponse::from(view))).into_response()
}

/// POST /api/sessions - Start a shortlist session
async fn create_session(State(state): State<AppState>) -> impl IntoResponse {
    let session = Uuid::new_v4();
    state.sessions().insert(session, Shortlist::new());
    info!(%session, "session created");
    (StatusCode::CREATED, Json(ApiResponse::ok(SessionResponse { session })))
}

/// GET /api/sessions/:session/shortlist - The session's "my medicines" tab
async fn get_shortlist(
    State(state): State<AppState>,
    Path(session): Path<Uuid>,
    Query(query): Query<TabQuery>,
) -> Response {
    let Some(shortlist) = state.sessions().get(&session).cloned() else {
        return failure(StatusCode::NOT_FOUND, "unknown session");
    };

    let view = render_tab(&state.catalog(), &shortlist, Tab::MyMedicines, &query.q, query.lang);
    Json(ApiResponse::ok(TabResponse::from(view))).into_response()
}

/// POST /api/sessions/:session/shortlist - Add a live record
async fn add_to_session(
    State(state): State<AppState>,
    Path(session): Path<Uuid>,
    Json(request): Json<AddRequest>,
) -> Response {
    let catalog = state.catalog();
    let mut sessions = state.sessions();
    let Some(shortlist) = sessions.get_mut(&session) else {
        return failure(StatusCode::NOT_FOUND, "unknown session");
    };

    match add_to_shortlist(&catalog, shortlist, request.collection, &request.id) {
        Ok(added) => Json(ApiResponse::ok(AddResponse {
            added,
            count: shortlist.len(),
        }))
        .into_response(),
        Err(err @ ShortlistError::NotFound { .. }) => failure(StatusCode::NOT_FOUND, err.to_string()),
        Err(err @ ShortlistError::OutOfStock(_)) => {
            warn!(%session, error = %err, "refused shortlist add");
            failure(StatusCode::CONFLICT, err.to_string())
        }
    }
}

/// POST /api/retry - Resubscribe both collections
async fn retry(State(state): State<AppState>) -> impl IntoResponse {
    state.catalog().retry();
    Json(ApiResponse::ok("OK"))
}

/// Poll `store` every `period` on the blocking pool, so SQLite reads and
/// listener delivery never run on an async worker.
pub fn spawn_store_poller(store: SqliteStore, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let store = store.clone();
            match tokio::task::spawn_blocking(move || store.poll()).await {
                Ok(0) => {}
                Ok(delivered) => debug!(delivered, "store changes delivered"),
                Err(e) => warn!(error = %e, "store poll task failed"),
            }
        }
    })
}

/// Build the HTTP API router.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/tabs/:tab", get(get_tab))
        .route("/sessions", post(create_session))
        .route("/sessions/:session/shortlist", get(get_shortlist).post(add_to_session))
        .route("/retry", post(retry))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}
