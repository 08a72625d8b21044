use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Failure payload for a platform service call.
///
/// Carries the observed HTTP status together with whatever the platform put
/// in its JSON error body. `Display` prefers the platform's OAuth2-style
/// `error` code; callers that need the raw pieces can match on the fields.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl ServiceError {
    pub(crate) fn without_body(code: u16, message: impl Into<String>) -> Self {
        Self {
            code: i32::from(code),
            message: message.into(),
            error: None,
            error_description: None,
        }
    }

    pub(crate) fn from_payload(code: u16, payload: &Value, fallback: &str) -> Self {
        Self {
            code: i32::from(code),
            message: fallback.to_string(),
            error: payload
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_owned),
            error_description: payload
                .get("error_description")
                .and_then(Value::as_str)
                .map(str::to_owned),
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            Some(error) => {
                write!(f, "{error}")?;
                if let Some(description) = &self.error_description {
                    write!(f, ": {description}")?;
                }
                Ok(())
            }
            None => write!(f, "{} (status={})", self.message, self.code),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("malformed token: {0}")]
    MalformedToken(String),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("platform error: {0}")]
    Api(ServiceError),
}
