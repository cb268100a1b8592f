use http::StatusCode;
use serde_json::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{status}: {detail}")]
    Status { status: StatusCode, detail: String },
    #[error("session expired, log in again")]
    SessionExpired,
    #[error("not logged in")]
    NotAuthenticated,
    #[error("you must lock the document before saving")]
    NotLocked,
    #[error("document is locked by user {0}")]
    LockedByOther(i64),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// Build a `Status` error from a non-2xx response body.
    pub fn from_status(status: StatusCode, body: &str) -> Error {
        let detail = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| error_detail(&v))
            .unwrap_or_else(|| {
                let body = body.trim();
                if body.is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                } else {
                    body.to_string()
                }
            });
        Error::Status { status, detail }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Status { status, .. } => Some(*status),
            Error::Http(e) => e.status(),
            _ => None,
        }
    }
}

// DRF error bodies come in a few shapes: {"detail": ..}, {"error": ..},
// {"non_field_errors": [..]}, {"field": [..]} or a bare [..]. Field errors are
// taken in wire order (serde_json `preserve_order`).
fn error_detail(body: &Value) -> Option<String> {
    if body.is_array() {
        return first_message(body);
    }
    let obj = body.as_object()?;
    for key in &["detail", "error"] {
        if let Some(s) = obj.get(*key).and_then(Value::as_str) {
            return Some(s.to_string());
        }
    }
    if let Some(s) = obj.get("non_field_errors").and_then(first_message) {
        return Some(s);
    }
    obj.iter()
        .find_map(|(field, v)| first_message(v).map(|msg| format!("{}: {}", field, msg)))
}

fn first_message(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.to_string()),
        Value::Array(items) => items.first().and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}
