use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Every way a fetch can fail to produce a JSON document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Network Error: {detail}")]
    Network { detail: String },
    #[error("Request Timeout")]
    Timeout,
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("HTTP {status}: {message}")]
    Body { status: u16, message: String },
}

impl FetchError {
    pub const TIMEOUT_STATUS: u16 = 408;

    /// 0 when no response was obtained at all.
    pub fn status(&self) -> u16 {
        match self {
            FetchError::Network { .. } => 0,
            FetchError::Timeout => Self::TIMEOUT_STATUS,
            FetchError::Http { status, .. } | FetchError::Body { status, .. } => *status,
        }
    }

    pub fn message(&self) -> String {
        match self {
            FetchError::Network { .. } | FetchError::Timeout => self.to_string(),
            FetchError::Http { message, .. } | FetchError::Body { message, .. } => message.clone(),
        }
    }

}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Network {
                detail: err.to_string(),
            }
        }
    }
}

/// GET `url` and parse the body as JSON, giving up after `timeout`.
pub async fn fetch_json(client: &Client, url: &str, timeout: Duration) -> Result<Value, FetchError> {
    let resp = client
        .get(url)
        .timeout(timeout)
        .send()
        .await?;

    let status = resp.status();
    debug!(url, status = status.as_u16(), "agent responded");

    if !status.is_success() {
        let body = match resp.bytes().await {
            Ok(body) => body,
            Err(err) if err.is_timeout() => return Err(FetchError::Timeout),
            Err(err) => {
                debug!(url, error = %err, "failed to read error body");
                Default::default()
            }
        };
        return Err(FetchError::Http {
            status: status.as_u16(),
            message: error_message(status, &body),
        });
    }

    if status == StatusCode::NO_CONTENT {
        return Ok(Value::Object(Map::new()));
    }

    let body = resp.bytes().await.map_err(|err| {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Body {
                status: status.as_u16(),
                message: format!("Failed to read response body: {err}"),
            }
        }
    })?;

    serde_json::from_slice(&body).map_err(|err| FetchError::Body {
        status: status.as_u16(),
        message: format!("Failed to parse response JSON: {err}"),
    })
}

fn error_message(status: StatusCode, body: &[u8]) -> String {
    match serde_json::from_slice::<Value>(body) {
        Ok(json) => ["message", "error"]
            .iter()
            .find_map(|key| {
                json.get(*key)
                    .and_then(Value::as_str)
                    .filter(|m| !m.is_empty())
            })
            .map(str::to_string)
            .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned()),
        Err(_) => status_text(status),
    }
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}
