use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application error taxonomy.
///
/// Every fetch-time failure is caught at the handler boundary and converted
/// into a user-visible message; nothing here propagates as a panic.
#[derive(Debug, Error)]
pub enum AppError {
    /// Required configuration is missing. Fatal, raised before any network
    /// call is attempted.
    #[error("configuration error: {0}")]
    Config(String),

    /// Network or HTTP failure after the retry budget is exhausted.
    #[error("network error when fetching data: {0}")]
    Transport(String),

    /// Certificate / handshake failure. The message carries remediation
    /// guidance because these are almost always environmental.
    #[error(
        "SSL error while connecting: {0}. Try switching network (mobile hotspot or VPN) \
         and check that SUPABASE_URL starts with https://"
    )]
    Tls(String),

    /// Bad credentials or an unreachable user table.
    #[error("{0}")]
    Auth(String),

    /// The fetch succeeded but the table had no rows.
    #[error("no data found in table {0}")]
    EmptyResult(String),

    /// The user deselected every month or every ERO; re-prompt instead of
    /// rendering an empty table.
    #[error("{0}")]
    Selection(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Transport(_) | AppError::Tls(_) => StatusCode::BAD_GATEWAY,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::EmptyResult(_) => StatusCode::NOT_FOUND,
            AppError::Selection(_) => StatusCode::BAD_REQUEST,
        };

        let body = Json(serde_json::json!({
            "status": "error",
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}
