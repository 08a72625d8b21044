use crate::client_defaults::DEFAULT_TIMEOUT;
use crate::debug::{note, DebugLog};
use crate::error::{Error, ServiceError};
use crate::models::{LineItem, Score, ScoreResult};
use chrono::{SecondsFormat, Utc};
use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use url::Url;

pub const MEDIA_TYPE_LINEITEM: &str = "application/vnd.ims.lis.v2.lineitem+json";
pub const MEDIA_TYPE_LINEITEM_CONTAINER: &str =
    "application/vnd.ims.lis.v2.lineitemcontainer+json";
pub const MEDIA_TYPE_SCORE: &str = "application/vnd.ims.lis.v1.score+json";
pub const MEDIA_TYPE_RESULT_CONTAINER: &str =
    "application/vnd.ims.lis.v2.resultcontainer+json";

pub struct AgsClientBuilder {
    access_token: String,
    timeout: Option<Duration>,
}

impl AgsClientBuilder {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            timeout: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<AgsClient, Error> {
        let http = HttpClient::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()?;
        Ok(AgsClient {
            http,
            access_token: self.access_token,
        })
    }
}

/// Assignment & Grade Services client.
///
/// Holds the bearer token for one batch of calls; the target URLs come from
/// the launch's AGS endpoint claim and are passed per call.
pub struct AgsClient {
    http: HttpClient,
    access_token: String,
}

impl AgsClient {
    pub fn builder(access_token: impl Into<String>) -> AgsClientBuilder {
        AgsClientBuilder::new(access_token)
    }

    /// Posts one submission result to `<lineitem_url>/scores`.
    ///
    /// `grade` is a fraction in `0..=1`; the wire score is the truncated
    /// integer percentage against a fixed `scoreMaximum` of 100. Activity
    /// and grading progress are reported as `Completed` with the current
    /// UTC timestamp.
    pub fn send_score(
        &self,
        user_id: &str,
        grade: f64,
        comment: &str,
        lineitem_url: &str,
        mut debug: Option<&mut DebugLog>,
    ) -> Result<(), Error> {
        let url = join_suffix(lineitem_url, "scores")?;
        let score = Score {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, false),
            score_given: (grade * 100.0) as i64,
            score_maximum: 100,
            comment: comment.to_string(),
            activity_progress: "Completed".to_string(),
            grading_progress: "Completed".to_string(),
            user_id: user_id.to_string(),
        };
        note(&mut debug, format!("scores url: {url}"));
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .header(CONTENT_TYPE, MEDIA_TYPE_SCORE)
            .header(ACCEPT, MEDIA_TYPE_SCORE)
            .body(serde_json::to_vec(&score)?)
            .send()?;
        self.expect_ok(resp, "unable to send score", debug)
    }

    /// Creates a line item in the platform's line-items collection.
    pub fn create_line_item(
        &self,
        lineitems_url: &str,
        lineitem: &LineItem,
        mut debug: Option<&mut DebugLog>,
    ) -> Result<(), Error> {
        let url = parse_url(lineitems_url)?;
        note(&mut debug, format!("lineitems url: {url}"));
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .header(CONTENT_TYPE, MEDIA_TYPE_LINEITEM)
            .body(serde_json::to_vec(lineitem)?)
            .send()?;
        self.expect_ok(resp, "unable to create lineitem", debug)
    }

    /// Replaces an existing line item.
    pub fn update_line_item(
        &self,
        lineitem_url: &str,
        lineitem: &LineItem,
        mut debug: Option<&mut DebugLog>,
    ) -> Result<(), Error> {
        let url = parse_url(lineitem_url)?;
        note(&mut debug, format!("lineitem url: {url}"));
        let resp = self
            .http
            .put(url)
            .bearer_auth(&self.access_token)
            .header(CONTENT_TYPE, MEDIA_TYPE_LINEITEM)
            .body(serde_json::to_vec(lineitem)?)
            .send()?;
        self.expect_ok(resp, "unable to update lineitem", debug)
    }

    /// Deletes a line item.
    pub fn delete_line_item(
        &self,
        lineitem_url: &str,
        mut debug: Option<&mut DebugLog>,
    ) -> Result<(), Error> {
        let url = parse_url(lineitem_url)?;
        note(&mut debug, format!("lineitem url: {url}"));
        let resp = self
            .http
            .delete(url)
            .bearer_auth(&self.access_token)
            .send()?;
        let status = resp.status();
        let body = resp.bytes()?;
        note(
            &mut debug,
            format!("sent lineitem delete, received status={status} ({} bytes)", body.len()),
        );
        if status == StatusCode::OK {
            return Ok(());
        }
        if body.is_empty() {
            return Err(Error::Api(ServiceError::without_body(
                status.as_u16(),
                "failed with no response body",
            )));
        }
        let json: Value = serde_json::from_slice(&body)?;
        Err(Error::Api(ServiceError::from_payload(
            status.as_u16(),
            &json,
            "unable to delete lineitem",
        )))
    }

    /// Reads one line item.
    pub fn load_line_item(
        &self,
        lineitem_url: &str,
        debug: Option<&mut DebugLog>,
    ) -> Result<LineItem, Error> {
        self.get_json(
            parse_url(lineitem_url)?,
            MEDIA_TYPE_LINEITEM,
            None,
            "unable to load lineitem",
            debug,
        )
    }

    /// Reads the full line-items collection.
    pub fn load_line_items(
        &self,
        lineitems_url: &str,
        debug: Option<&mut DebugLog>,
    ) -> Result<Vec<LineItem>, Error> {
        self.get_json(
            parse_url(lineitems_url)?,
            MEDIA_TYPE_LINEITEM_CONTAINER,
            None,
            "unable to load lineitems",
            debug,
        )
    }

    /// Reads the results posted against a line item.
    pub fn load_results(
        &self,
        lineitem_url: &str,
        debug: Option<&mut DebugLog>,
    ) -> Result<Vec<ScoreResult>, Error> {
        self.get_json(
            join_suffix(lineitem_url, "results")?,
            MEDIA_TYPE_RESULT_CONTAINER,
            Some(MEDIA_TYPE_RESULT_CONTAINER),
            "unable to load results",
            debug,
        )
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        accept: &str,
        content_type: Option<&str>,
        fallback: &str,
        mut debug: Option<&mut DebugLog>,
    ) -> Result<T, Error> {
        note(&mut debug, format!("request url: {url}"));
        let mut req = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .header(ACCEPT, accept);
        if let Some(content_type) = content_type {
            req = req.header(CONTENT_TYPE, content_type);
        }
        let resp = req.send()?;
        let status = resp.status();
        let body = resp.bytes()?;
        note(
            &mut debug,
            format!("received status={status} ({} bytes)", body.len()),
        );
        if body.is_empty() {
            return Err(Error::Api(ServiceError::without_body(
                status.as_u16(),
                "no data retrieved",
            )));
        }
        let json: Value = serde_json::from_slice(&body)?;
        if status == StatusCode::OK {
            if let Ok(value) = serde_json::from_value::<T>(json.clone()) {
                return Ok(value);
            }
        }
        Err(Error::Api(ServiceError::from_payload(
            status.as_u16(),
            &json,
            fallback,
        )))
    }

    fn expect_ok(
        &self,
        resp: Response,
        fallback: &str,
        mut debug: Option<&mut DebugLog>,
    ) -> Result<(), Error> {
        let status = resp.status();
        let body = resp.bytes()?;
        note(
            &mut debug,
            format!("received status={status} ({} bytes)", body.len()),
        );
        if status == StatusCode::OK {
            return Ok(());
        }
        let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        Err(Error::Api(ServiceError::from_payload(
            status.as_u16(),
            &json,
            fallback,
        )))
    }
}

fn parse_url(raw: &str) -> Result<Url, Error> {
    Url::parse(raw.trim()).map_err(Error::from)
}

fn join_suffix(base: &str, suffix: &str) -> Result<Url, Error> {
    Url::parse(&format!(
        "{}/{suffix}",
        base.trim().trim_end_matches('/')
    ))
    .map_err(Error::from)
}
