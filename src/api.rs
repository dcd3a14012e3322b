//! Read-only HTTP surface over the article store.

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::backup::{self, BackupError};
use crate::db::{ArticleQuery, Database, SortBy};
use crate::model::{Article, Category, ThreatScore};
use crate::threat::today_threat_score;
use crate::TARGET_WEB_REQUEST;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        error!(target: TARGET_WEB_REQUEST, "Store error while serving request: {}", err);
        ApiError::Internal("failed to read articles".to_string())
    }
}

impl From<BackupError> for ApiError {
    fn from(err: BackupError) -> Self {
        error!(target: TARGET_WEB_REQUEST, "CSV export failed: {}", err);
        ApiError::Internal("failed to export articles".to_string())
    }
}

/// Raw `/news` query string. Everything is parsed by hand so bad values become a 400 with
/// a readable message.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsParams {
    pub source: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub limit: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sort_by: Option<String>,
}

impl NewsParams {
    pub fn to_query(&self) -> Result<ArticleQuery, ApiError> {
        let category = match filter_value(&self.category) {
            Some(raw) => Some(
                raw.parse::<Category>()
                    .map_err(|err| ApiError::BadRequest(err.to_string()))?,
            ),
            None => None,
        };

        let limit = match non_empty(&self.limit) {
            Some(raw) => {
                let limit: i64 = raw
                    .parse()
                    .map_err(|_| ApiError::BadRequest(format!("invalid limit: {:?}", raw)))?;
                (limit > 0).then(|| u32::try_from(limit).unwrap_or(u32::MAX))
            }
            None => None,
        };

        let start = non_empty(&self.start_date)
            .map(|raw| parse_date(raw, false))
            .transpose()?;
        let end = non_empty(&self.end_date)
            .map(|raw| parse_date(raw, true))
            .transpose()?;

        let sort_by = match non_empty(&self.sort_by) {
            Some("rank") => SortBy::Rank,
            _ => SortBy::Recency,
        };

        Ok(ArticleQuery {
            source: filter_value(&self.source).map(str::to_string),
            category,
            search: non_empty(&self.search).map(str::to_string),
            limit,
            start,
            end,
            sort_by,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// `all` means no filter.
fn filter_value(value: &Option<String>) -> Option<&str> {
    non_empty(value).filter(|v| !v.eq_ignore_ascii_case("all"))
}

/// Accepts `YYYY-MM-DD` (start or end of that UTC day) or RFC 3339.
fn parse_date(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let time = if end_of_day {
            date.and_hms_opt(23, 59, 59)
        } else {
            date.and_hms_opt(0, 0, 0)
        };
        if let Some(time) = time {
            return Ok(time.and_utc());
        }
    }

    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ApiError::BadRequest(format!("invalid date: {:?}", raw)))
}

async fn get_news(
    State(state): State<AppState>,
    Query(params): Query<NewsParams>,
) -> Result<Json<Vec<Article>>, ApiError> {
    let query = params.to_query()?;
    let articles = state.db.query_articles(&query).await?;
    Ok(Json(articles))
}

async fn get_today_threat(State(state): State<AppState>) -> Result<Json<ThreatScore>, ApiError> {
    Ok(Json(today_threat_score(&state.db).await?))
}

async fn export_csv(State(state): State<AppState>) -> Result<Response, ApiError> {
    let mut body = Vec::new();
    let rows = backup::export_csv(&state.db, &mut body).await?;
    info!(target: TARGET_WEB_REQUEST, "Serving CSV export with {} articles", rows);

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=articles.csv",
            ),
        ],
        body,
    )
        .into_response())
}

async fn healthz() -> &'static str {
    "OK"
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/news", get(get_news))
        .route("/today-threat", get(get_today_threat))
        .route("/export/csv", get(export_csv))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves until `shutdown` resolves, then stops accepting connections and drains in-flight requests.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Server running on http://{}", addr);
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
