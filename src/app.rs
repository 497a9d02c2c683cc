use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    middleware,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tokio::net::TcpListener;

use crate::client::SupabaseClient;
use crate::config::Config;
use crate::downloader;
use crate::error::AppError;
use crate::graph;
use crate::login::{self, SessionStore};
use crate::pipeline::{self, BillView, FilterParams};
use crate::records::{self, BillRecord};

/// Shared application state: configuration, the REST client, the session
/// map and the most recently fetched dataset. One instance per process,
/// passed explicitly through every handler.
pub struct AppState {
    pub config: Config,
    pub client: SupabaseClient,
    pub sessions: RwLock<SessionStore>,
    pub dataset: RwLock<Vec<BillRecord>>,
}

impl AppState {
    /// # Errors
    /// * `AppError::Config` when the REST client cannot be built.
    pub fn new(config: Config) -> Result<Self, AppError> {
        let client = SupabaseClient::new(&config)?;
        Ok(Self {
            config,
            client,
            sessions: RwLock::new(SessionStore::new()),
            dataset: RwLock::new(Vec::new()),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Filter parameters as they arrive on the query string. `months` and
/// `eros` are comma-separated lists; present-but-empty means an explicit
/// zero selection, absent means "all".
///
/// Option values are assumed comma-free (bill months are `YYYY-MM`, ERO
/// codes are plain identifiers); a value containing a comma cannot be
/// expressed in this format and would need repeated parameters instead.
#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    months: Option<String>,
    eros: Option<String>,
    search: Option<String>,
    page: Option<usize>,
    rows_per_page: Option<usize>,
}

impl ViewQuery {
    fn into_params(self) -> FilterParams {
        FilterParams {
            months: self.months.map(split_csv),
            eros: self.eros.map(split_csv),
            search: self.search.unwrap_or_default().trim().to_string(),
            page: self.page.unwrap_or(1),
            rows_per_page: self.rows_per_page.unwrap_or(pipeline::DEFAULT_ROWS_PER_PAGE),
        }
    }
}

fn split_csv(raw: String) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Serialize)]
struct FetchResponse {
    status: String,
    records: usize,
}

/// Start the web server.
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config)?);

    let protected = Router::new()
        .route("/dashboard", get(serve_dashboard))
        .route("/api/fetch", post(handle_fetch))
        .route("/api/view", get(handle_view))
        .route("/api/export/csv", get(export_csv))
        .route("/api/export/xlsx", get(export_xlsx))
        .route("/api/chart/ero.png", get(chart_ero))
        .route("/api/chart/month.png", get(chart_month))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    let app = Router::new()
        .route("/", get(serve_root))
        .route("/login", get(serve_login_page).post(handle_login))
        .route("/logout", get(handle_logout))
        .merge(protected)
        .with_state(state);

    let listener = TcpListener::bind(&bind_addr).await?;
    log::info!("Listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Session guard, evaluated at the start of every protected request cycle.
///
/// An expired session is removed before any protected handler runs; the
/// request is redirected to the login page (or rejected with 401 for API
/// calls) and `last_active` is refreshed for live sessions.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    if let Some(cookie) = jar.get("session") {
        let username = match state.sessions.write() {
            Ok(mut sessions) => sessions.validate(cookie.value()),
            Err(_) => None,
        };
        if let Some(username) = username {
            request.extensions_mut().insert(username);
            return next.run(request).await;
        }
    }

    if request.uri().path().starts_with("/api/") {
        AppError::Auth("not logged in or session expired".to_string()).into_response()
    } else {
        Redirect::to("/login").into_response()
    }
}

async fn serve_root() -> Redirect {
    Redirect::to("/dashboard")
}

async fn serve_login_page() -> Html<&'static str> {
    Html(include_str!("./static/login.html"))
}

async fn serve_dashboard() -> Html<&'static str> {
    Html(include_str!("./static/dashboard.html"))
}

/// Handle login form submissions: validate against the remote user table
/// and set the session cookie on success.
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    axum::Form(form): axum::Form<LoginForm>,
) -> Response {
    match login::check_login(&state.client, &form.username, &form.password).await {
        Ok(()) => {
            let session_id = match state.sessions.write() {
                Ok(mut sessions) => sessions.create(&form.username),
                Err(_) => {
                    return (StatusCode::INTERNAL_SERVER_ERROR, "session store unavailable")
                        .into_response();
                }
            };
            let cookie = Cookie::new("session", session_id);
            (jar.add(cookie), Redirect::to("/dashboard")).into_response()
        }
        Err(err) => {
            log::info!("login rejected for {}: {}", form.username, err);
            (StatusCode::UNAUTHORIZED, err.to_string()).into_response()
        }
    }
}

/// Clear the session cookie and drop the server-side session.
pub async fn handle_logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    let session_id = jar.get("session").map(|cookie| cookie.value().to_string());
    if let (Some(id), Ok(mut sessions)) = (session_id, state.sessions.write()) {
        sessions.remove(&id);
    }

    (jar.remove(Cookie::from("session")), Redirect::to("/login"))
}

/// Fetch the bill table, normalize it and replace the in-memory dataset.
///
/// A failed fetch leaves the previously stored dataset unchanged; a
/// successful fetch of zero rows clears it and reports "no data".
async fn handle_fetch(State(state): State<Arc<AppState>>) -> Result<Json<FetchResponse>, AppError> {
    let raw = state.client.fetch_table(&state.config.table).await?;
    let normalized = records::normalize(&raw);

    let count = normalized.len();
    {
        let mut dataset = state
            .dataset
            .write()
            .map_err(|_| AppError::Transport("dataset store unavailable".to_string()))?;
        *dataset = normalized;
    }

    if count == 0 {
        return Err(AppError::EmptyResult(state.config.table.clone()));
    }

    log::info!("fetched {} records from {}", count, state.config.table);
    Ok(Json(FetchResponse {
        status: "ok".to_string(),
        records: count,
    }))
}

/// Run the filter/aggregate/paginate pipeline for the current parameters.
async fn handle_view(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<BillView>, AppError> {
    let params = query.into_params();
    let dataset = state
        .dataset
        .read()
        .map_err(|_| AppError::Transport("dataset store unavailable".to_string()))?;
    let view = pipeline::build_view(&dataset, &params)?;
    Ok(Json(view))
}

async fn export_csv(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ViewQuery>,
) -> Result<Response, AppError> {
    let rows = filtered_for_export(&state, query)?;
    let csv = downloader::to_csv(&rows);
    let filename = format!("{}_filtered.csv", state.config.table);

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        csv,
    )
        .into_response())
}

async fn export_xlsx(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ViewQuery>,
) -> Result<Response, AppError> {
    let rows = filtered_for_export(&state, query)?;
    let xlsx = downloader::to_xlsx(&rows)
        .map_err(|err| AppError::Transport(format!("XLSX serialization failed: {}", err)))?;
    let filename = format!("{}_filtered.xlsx", state.config.table);

    Ok((
        [
            (
                header::CONTENT_TYPE,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        xlsx,
    )
        .into_response())
}

async fn chart_ero(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ViewQuery>,
) -> Result<Response, AppError> {
    let params = query.into_params();
    let dataset = state
        .dataset
        .read()
        .map_err(|_| AppError::Transport("dataset store unavailable".to_string()))?;
    let view = pipeline::build_view(&dataset, &params)?;

    let png = graph::render_bar_chart(&view.ero_totals, "ERO vs Total Amount (totAmt)")
        .map_err(|err| AppError::Transport(format!("chart rendering failed: {}", err)))?;
    Ok(png_response(png))
}

async fn chart_month(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ViewQuery>,
) -> Result<Response, AppError> {
    let params = query.into_params();
    let dataset = state
        .dataset
        .read()
        .map_err(|_| AppError::Transport("dataset store unavailable".to_string()))?;
    let view = pipeline::build_view(&dataset, &params)?;

    let png = graph::render_trend_chart(&view.month_totals, "Month-wise Trend (totAmt)")
        .map_err(|err| AppError::Transport(format!("chart rendering failed: {}", err)))?;
    Ok(png_response(png))
}

fn png_response(png: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "image/png".to_string())], png).into_response()
}

// Exports run over the filtered (not paginated) view.
fn filtered_for_export(state: &AppState, query: ViewQuery) -> Result<Vec<BillRecord>, AppError> {
    let params = query.into_params();
    let dataset = state
        .dataset
        .read()
        .map_err(|_| AppError::Transport("dataset store unavailable".to_string()))?;
    pipeline::filtered_records(&dataset, &params)
}
