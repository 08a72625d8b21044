use crate::claims;
use crate::jwt;
use crate::models::LaunchClaims;
use log::warn;
use std::collections::HashMap;
use std::fmt;

// Message types and versions accepted from pre-1.3 callers.
const LEGACY_MESSAGE_TYPES: &[&str] = &[
    "basic-lti-launch-request",
    "LtiResourceLinkRequest",
    "ToolProxyReregistrationRequest",
    "ContentItemSelectionRequest",
];
const LEGACY_VERSIONS: &[&str] = &["LTI-1p0", "LTI-2p0"];

/// Outcome of [`inspect_launch`]: no token at all, a token that failed to
/// decode (with the decode failure), or a minimally well-formed launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchCheck {
    NoToken,
    Invalid(String),
    Valid,
}

/// Ordered, append-only list of claim validation failures.
///
/// Empty means the body passed validation under the mode it was checked
/// with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationFailures {
    failures: Vec<String>,
}

impl ValidationFailures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, failure: impl Into<String>) {
        self.failures.push(failure.into());
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.failures
    }
}

impl fmt::Display for ValidationFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.failures.join("; "))
    }
}

impl<'a> IntoIterator for &'a ValidationFailures {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.failures.iter()
    }
}

/// Returns the raw `id_token` field from the request data, if any.
/// An empty value counts as absent.
pub fn raw_id_token(request_data: &HashMap<String, String>) -> Option<&str> {
    request_data
        .get("id_token")
        .map(String::as_str)
        .filter(|token| !token.is_empty())
}

/// Returns true when the request carries a minimally well-formed launch
/// token. Decode failures are logged and reported as "not a launch";
/// use [`inspect_launch`] when the failure reason matters.
pub fn is_launch(request_data: &HashMap<String, String>) -> bool {
    match inspect_launch(request_data) {
        LaunchCheck::Valid => true,
        LaunchCheck::NoToken => false,
        LaunchCheck::Invalid(reason) => {
            warn!("bad launch: {reason}");
            false
        }
    }
}

/// Like [`is_launch`], but keeps the decode failure so callers can tell
/// "no token" from "malformed token".
pub fn inspect_launch(request_data: &HashMap<String, String>) -> LaunchCheck {
    let Some(raw_jwt) = raw_id_token(request_data) else {
        return LaunchCheck::NoToken;
    };
    match jwt::decode_launch_token(raw_jwt, true) {
        Ok(_) => LaunchCheck::Valid,
        Err(err) => LaunchCheck::Invalid(err.to_string()),
    }
}

/// Checks the IMS claims of a decoded launch body.
///
/// With `strict` unset nothing is checked; interoperability testing against
/// not-quite-conformant platforms runs in that mode. With `strict` set, the
/// version must start with `1.3`, the message type must be one of the two
/// supported types, resource-link launches must carry a resource link with
/// an id, and the roles and deployment-id claims must be present. Every
/// violation is reported; the pass never short-circuits.
pub fn validate_claims(body: &LaunchClaims, strict: bool) -> ValidationFailures {
    let mut failures = ValidationFailures::new();
    if !strict {
        return failures;
    }

    let version = body.version.as_deref().unwrap_or_default();
    if !version.starts_with("1.3") {
        failures.push(format!("bad lti version: {version}"));
    }

    match body.message_type.as_deref() {
        None | Some("") => failures.push("missing message type"),
        Some(claims::MESSAGE_TYPE_RESOURCE) => match &body.resource_link {
            None => {
                failures.push("missing required resource_link claim");
                failures.push("missing required resource_link id");
            }
            Some(link) if link.id.is_none() => {
                failures.push("missing required resource_link id");
            }
            Some(_) => {}
        },
        Some(claims::MESSAGE_TYPE_DEEP_LINK) => {}
        Some(other) => failures.push(format!("bad message type: {other}")),
    }

    if body.roles.is_none() {
        failures.push("missing required role claim");
    }
    if body.deployment_id.is_none() {
        failures.push("missing required deployment_id claim");
    }
    failures
}

/// Returns true when `lti_message_type` holds a value accepted from 1.1-era
/// callers.
pub fn is_valid_message_type(lti_message_type: &str) -> bool {
    LEGACY_MESSAGE_TYPES.contains(&lti_message_type)
}

/// Returns true when `lti_version` holds a value accepted from 1.1-era
/// callers.
pub fn is_valid_version(lti_version: &str) -> bool {
    LEGACY_VERSIONS.contains(&lti_version)
}
