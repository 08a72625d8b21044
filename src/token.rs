use crate::client_defaults::DEFAULT_TIMEOUT;
use crate::debug::{note, DebugLog};
use crate::error::Error;
use crate::jwt;
use crate::keys::normalize_private_key;
use crate::models::TokenResponse;
use jsonwebtoken::Algorithm;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use url::Url;

pub const CLIENT_ASSERTION_TYPE_JWT_BEARER: &str =
    "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

pub const SCOPE_LINEITEM: &str = "https://purl.imsglobal.org/spec/lti-ags/scope/lineitem";
pub const SCOPE_SCORE: &str = "https://purl.imsglobal.org/spec/lti-ags/scope/score";
pub const SCOPE_RESULT_READONLY: &str =
    "https://purl.imsglobal.org/spec/lti-ags/scope/result.readonly";
pub const SCOPE_CONTEXT_MEMBERSHIP_READONLY: &str =
    "https://purl.imsglobal.org/spec/lti-nrps/scope/contextmembership.readonly";

const ASSERTION_LIFETIME_SECS: i64 = 60;

/// Ephemeral claim set signed into the `client_assertion` of one token
/// exchange. Built fresh for every exchange and never reused.
#[derive(Debug, Clone, Serialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl AssertionClaims {
    pub fn new(issuer: &str, subject: &str, audience: &str) -> Self {
        let iat = unix_time_now();
        Self {
            iss: issuer.to_string(),
            sub: subject.to_string(),
            aud: audience.to_string(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
            jti: unique_jti(issuer),
        }
    }
}

fn unix_time_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

// Issuer plus the microsecond clock; uniqueness is best-effort.
fn unique_jti(issuer: &str) -> String {
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros();
    format!("{issuer}{micros:x}")
}

pub struct TokenClientBuilder {
    token_url: Url,
    timeout: Option<Duration>,
}

impl TokenClientBuilder {
    pub fn new(token_url: impl AsRef<str>) -> Result<Self, Error> {
        Ok(Self {
            token_url: Url::parse(token_url.as_ref().trim())?,
            timeout: None,
        })
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<TokenClient, Error> {
        let http = HttpClient::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()?;
        Ok(TokenClient {
            token_url: self.token_url,
            http,
        })
    }
}

/// Client for a platform's OAuth2 token endpoint.
///
/// Performs the client-credentials grant with a signed JWT assertion. No
/// token is cached: every call performs a fresh exchange, so a batch of
/// AGS/NRPS calls should obtain one token up front and reuse it for the
/// batch.
pub struct TokenClient {
    token_url: Url,
    http: HttpClient,
}

impl TokenClient {
    pub fn builder(token_url: impl AsRef<str>) -> Result<TokenClientBuilder, Error> {
        TokenClientBuilder::new(token_url)
    }

    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    /// Requests an access token for the given scopes.
    ///
    /// Signs a 60-second assertion (audience = the token endpoint) with the
    /// normalized private key and posts the client-credentials form. Unlike
    /// the AGS/NRPS calls, the response body is parsed and returned
    /// regardless of HTTP status, since platforms put their OAuth2 error
    /// payload in non-200 responses. Check `access_token` vs `error` on the
    /// returned value; only transport and JSON-parse failures are `Err`.
    pub fn get_access_token(
        &self,
        scopes: &[&str],
        issuer: &str,
        subject: &str,
        private_key_pem: &str,
        mut debug: Option<&mut DebugLog>,
    ) -> Result<TokenResponse, Error> {
        let issuer = issuer.trim();
        let subject = subject.trim();
        let key_pem = normalize_private_key(private_key_pem);

        let assertion = AssertionClaims::new(issuer, subject, self.token_url.as_str());
        let client_assertion = jwt::encode_jwt(&assertion, &key_pem, Algorithm::RS256)?;

        let mut params = url::form_urlencoded::Serializer::new(String::new());
        params.append_pair("grant_type", "client_credentials");
        params.append_pair("client_assertion_type", CLIENT_ASSERTION_TYPE_JWT_BEARER);
        params.append_pair("client_assertion", &client_assertion);
        params.append_pair("scope", &scopes.join(" "));
        let body = params.finish();

        note(&mut debug, format!("token url: {}", self.token_url));
        let resp = self
            .http
            .post(self.token_url.clone())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()?;
        let status = resp.status();
        let bytes = resp.bytes()?;
        note(
            &mut debug,
            format!("returned token data status={status} ({} bytes)", bytes.len()),
        );
        serde_json::from_slice::<TokenResponse>(&bytes).map_err(Error::from)
    }

    /// Token for posting grades and reading results.
    pub fn get_grade_token(
        &self,
        issuer: &str,
        subject: &str,
        private_key_pem: &str,
        debug: Option<&mut DebugLog>,
    ) -> Result<TokenResponse, Error> {
        self.get_access_token(
            &[SCOPE_LINEITEM, SCOPE_SCORE, SCOPE_RESULT_READONLY],
            issuer,
            subject,
            private_key_pem,
            debug,
        )
    }

    /// Token for reading the course membership.
    pub fn get_roster_token(
        &self,
        issuer: &str,
        subject: &str,
        private_key_pem: &str,
        debug: Option<&mut DebugLog>,
    ) -> Result<TokenResponse, Error> {
        self.get_access_token(
            &[SCOPE_CONTEXT_MEMBERSHIP_READONLY],
            issuer,
            subject,
            private_key_pem,
            debug,
        )
    }

    /// Token for reading the course membership including legacy source
    /// dids. Requests the same scope set as [`Self::get_roster_token`];
    /// kept as its own entry point for call sites that need the
    /// distinction.
    pub fn get_roster_with_source_dids_token(
        &self,
        issuer: &str,
        subject: &str,
        private_key_pem: &str,
        debug: Option<&mut DebugLog>,
    ) -> Result<TokenResponse, Error> {
        self.get_access_token(
            &[SCOPE_CONTEXT_MEMBERSHIP_READONLY],
            issuer,
            subject,
            private_key_pem,
            debug,
        )
    }

    /// Token for managing line items.
    pub fn get_line_items_token(
        &self,
        issuer: &str,
        subject: &str,
        private_key_pem: &str,
        debug: Option<&mut DebugLog>,
    ) -> Result<TokenResponse, Error> {
        self.get_access_token(&[SCOPE_LINEITEM], issuer, subject, private_key_pem, debug)
    }
}
