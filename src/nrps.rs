use crate::client_defaults::DEFAULT_TIMEOUT;
use crate::debug::{note, DebugLog};
use crate::error::{Error, ServiceError};
use crate::models::MembershipContainer;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use url::Url;

pub const MEDIA_TYPE_MEMBERSHIP_CONTAINER: &str =
    "application/vnd.ims.lti-nrps.v2.membershipcontainer+json";

pub struct NrpsClientBuilder {
    access_token: String,
    timeout: Option<Duration>,
}

impl NrpsClientBuilder {
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

    pub fn build(self) -> Result<NrpsClient, Error> {
        let http = HttpClient::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()?;
        Ok(NrpsClient {
            http,
            access_token: self.access_token,
        })
    }
}

/// Names & Role Provisioning Services client.
pub struct NrpsClient {
    http: HttpClient,
    access_token: String,
}

impl NrpsClient {
    pub fn builder(access_token: impl Into<String>) -> NrpsClientBuilder {
        NrpsClientBuilder::new(access_token)
    }

    /// Fetches the course membership from the URL in the launch's NRPS
    /// claim.
    ///
    /// A 200 response must carry a `members` collection to count as a
    /// success; the whole container (context included) is returned, not
    /// just the member list.
    pub fn load_roster(
        &self,
        membership_url: &str,
        mut debug: Option<&mut DebugLog>,
    ) -> Result<MembershipContainer, Error> {
        let url = Url::parse(membership_url.trim())?;
        note(&mut debug, format!("membership url: {url}"));
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .header(ACCEPT, MEDIA_TYPE_MEMBERSHIP_CONTAINER)
            // TODO: drop the Content-Type header once the platforms that
            // reject bare membership GETs are out of circulation.
            .header(CONTENT_TYPE, MEDIA_TYPE_MEMBERSHIP_CONTAINER)
            .send()?;
        let status = resp.status();
        let body = resp.bytes()?;
        note(
            &mut debug,
            format!(
                "sent roster request, received status={status} ({} bytes)",
                body.len()
            ),
        );
        if body.is_empty() {
            return Err(Error::Api(ServiceError::without_body(
                status.as_u16(),
                "no data retrieved",
            )));
        }
        let json: Value = serde_json::from_slice(&body)?;
        if status == StatusCode::OK {
            if let Ok(container) = serde_json::from_value::<MembershipContainer>(json.clone()) {
                note(
                    &mut debug,
                    format!("loaded {} roster entries", container.members.len()),
                );
                return Ok(container);
            }
        }
        Err(Error::Api(ServiceError::from_payload(
            status.as_u16(),
            &json,
            "unable to load roster",
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::mpsc;
    use std::thread;

    fn nrps_client() -> NrpsClient {
        NrpsClient::builder("tok-1").build().expect("build")
    }

    #[test]
    fn load_roster_returns_full_container() {
        let body = concat!(
            "{\"id\":\"https://lms.example/nrps/7\",",
            "\"context\":{\"id\":\"ctx-7\",\"title\":\"Biology 101\"},",
            "\"members\":[",
            "{\"user_id\":\"user-7\",\"name\":\"Jamie Lee\",",
            "\"roles\":[\"http://purl.imsglobal.org/vocab/lis/v2/membership#Learner\"]},",
            "{\"user_id\":\"user-8\",\"status\":\"Active\",\"roles\":[]}",
            "]}"
        );
        let (base_url, rx, handle) = serve_once(json_response("200 OK", body));
        let nrps = nrps_client();

        let mut debug = DebugLog::new();
        let container = nrps
            .load_roster(&format!("{base_url}/nrps/7"), Some(&mut debug))
            .expect("roster");
        assert_eq!(container.members.len(), 2);
        assert_eq!(container.members[0].user_id.as_deref(), Some("user-7"));
        assert_eq!(
            container.context.as_ref().and_then(|c| c.title.as_deref()),
            Some("Biology 101")
        );
        assert!(debug
            .entries()
            .iter()
            .any(|entry| entry.contains("2 roster entries")));

        let captured = rx.recv().expect("request");
        assert_eq!(captured.method, "GET");
        assert_eq!(
            captured.headers.get("authorization").map(String::as_str),
            Some("Bearer tok-1")
        );
        assert_eq!(
            captured.headers.get("accept").map(String::as_str),
            Some(MEDIA_TYPE_MEMBERSHIP_CONTAINER)
        );
        assert_eq!(
            captured.headers.get("content-type").map(String::as_str),
            Some(MEDIA_TYPE_MEMBERSHIP_CONTAINER)
        );

        handle.join().expect("server");
    }

    #[test]
    fn empty_roster_body_reports_status() {
        let (base_url, _rx, handle) = serve_once(empty_response("503 Service Unavailable"));
        let nrps = nrps_client();

        let err = nrps
            .load_roster(&format!("{base_url}/nrps/7"), None)
            .expect_err("must fail");
        match err {
            Error::Api(service) => {
                assert_eq!(service.code, 503);
                assert!(service.to_string().contains("503"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        handle.join().expect("server");
    }

    #[test]
    fn missing_members_on_200_is_a_failure() {
        let (base_url, _rx, handle) =
            serve_once(json_response("200 OK", "{\"id\":\"https://lms.example/nrps/7\"}"));
        let nrps = nrps_client();

        let err = nrps
            .load_roster(&format!("{base_url}/nrps/7"), None)
            .expect_err("must fail");
        match err {
            Error::Api(service) => {
                assert!(service.to_string().contains("unable to load roster"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        handle.join().expect("server");
    }

    #[test]
    fn error_field_wins_over_fallback() {
        let (base_url, _rx, handle) = serve_once(json_response(
            "401 Unauthorized",
            "{\"error\":\"insufficient_scope\"}",
        ));
        let nrps = nrps_client();

        let err = nrps
            .load_roster(&format!("{base_url}/nrps/7"), None)
            .expect_err("must fail");
        match err {
            Error::Api(service) => {
                assert_eq!(service.to_string(), "insufficient_scope");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        handle.join().expect("server");
    }

    #[test]
    fn unparseable_roster_body_is_a_json_error() {
        let (base_url, _rx, handle) = serve_once(json_response("200 OK", "<html>oops</html>"));
        let nrps = nrps_client();

        let err = nrps
            .load_roster(&format!("{base_url}/nrps/7"), None)
            .expect_err("must fail");
        match err {
            Error::Json(_) => {}
            other => panic!("unexpected error: {other:?}"),
        }

        handle.join().expect("server");
    }

    struct CapturedRequest {
        method: String,
        headers: HashMap<String, String>,
    }

    fn response_with_body(status: &str, content_type: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        )
    }

    fn json_response(status: &str, body: &str) -> String {
        response_with_body(status, "application/json", body)
    }

    fn empty_response(status: &str) -> String {
        format!("HTTP/1.1 {status}\r\nContent-Length: 0\r\n\r\n")
    }

    fn serve_once(
        response: String,
    ) -> (
        String,
        mpsc::Receiver<CapturedRequest>,
        thread::JoinHandle<()>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let req = read_request(&mut stream);
                let _ = tx.send(req);
                let _ = stream.write_all(response.as_bytes());
            }
        });
        (format!("http://{}", addr), rx, handle)
    }

    fn read_request(stream: &mut TcpStream) -> CapturedRequest {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        let mut header_end = None;
        while header_end.is_none() {
            let read = stream.read(&mut chunk).unwrap_or(0);
            if read == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..read]);
            header_end = buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4);
        }
        let header_end = header_end.unwrap_or(buf.len());

        let header_str = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let mut lines = header_str.split("\r\n");
        let request_line = lines.next().unwrap_or("");
        let mut parts = request_line.split_whitespace();
        let method = parts.next().unwrap_or("").to_string();
        let mut headers = HashMap::new();
        for line in lines {
            if let Some((key, value)) = line.split_once(':') {
                headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }

        CapturedRequest { method, headers }
    }
}
