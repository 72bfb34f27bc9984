//! Altary REST API client: projects, error lists and error completion.
//!
//! The token is always passed in by the caller; the client never reads or
//! writes the persisted configuration.

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client as HttpClient, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::constants::{
    APP_NAME, APP_VERSION, COMPLETE_ERROR_PATH, ERRORS_PATH, PROJECTS_PATH, REQUEST_TIMEOUT,
    TOKEN_HEADER,
};
use crate::error::{AltaryError, ApiError, Result};

/// A project visible to the authenticated user.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Project {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Public `ALTR-` identifier; preferred over `id` when present.
    #[serde(default)]
    pub report_rand: Option<String>,
}

impl Project {
    /// The identifier users pass to `set_default_project` and `get_errors`.
    pub fn public_id(&self) -> &str {
        self.report_rand
            .as_deref()
            .or(self.id.as_deref())
            .unwrap_or_default()
    }

    pub fn matches(&self, project_id: &str) -> bool {
        self.report_rand.as_deref() == Some(project_id) || self.id.as_deref() == Some(project_id)
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Build the shared HTTP client: pooled connections, fixed timeout, no retries.
pub fn http_client() -> Result<HttpClient> {
    let client = HttpClient::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(format!("{APP_NAME}-mcp/{APP_VERSION}"))
        .build()?;
    Ok(client)
}

/// Thin wrapper around the Altary HTTP API.
#[derive(Clone)]
pub struct AltaryClient {
    pub base_url: String,
    http_client: HttpClient,
}

impl AltaryClient {
    pub fn new(http_client: HttpClient, base_url: &str) -> Self {
        AltaryClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        }
    }

    /// `GET users/getUserProjects`, normalised to a list.
    pub async fn list_projects(&self, token: &str) -> Result<Vec<Project>> {
        let request = self.http_client.get(self.endpoint(PROJECTS_PATH, None)?);
        let payload = self.send(request, token, None).await?;
        normalize_projects(payload)?
            .into_iter()
            .map(|item| {
                serde_json::from_value(item).map_err(|err| {
                    AltaryError::from(ApiError::Malformed(format!("project entry: {err}")))
                })
            })
            .collect()
    }

    /// `GET issues/getError/{project_id}`; the payload is returned as-is.
    pub async fn get_errors(&self, token: &str, project_id: &str) -> Result<Value> {
        let request = self.http_client.get(self.endpoint(ERRORS_PATH, Some(project_id))?);
        self.send(
            request,
            token,
            Some(format!("project or errors for {project_id}")),
        )
        .await
    }

    /// `POST issues/completeErrorWithSimilar/{error_id}`.
    pub async fn complete_error(&self, token: &str, error_id: &str) -> Result<Value> {
        let request = self
            .http_client
            .post(self.endpoint(COMPLETE_ERROR_PATH, Some(error_id))?);
        self.send(request, token, Some(format!("error {error_id}")))
            .await
    }

    /// Try `token` against the projects endpoint. Any failure means "invalid".
    pub async fn validate_token(&self, token: &str) -> bool {
        match self.list_projects(token).await {
            Ok(projects) => {
                tracing::debug!(projects = projects.len(), "token accepted");
                true
            }
            Err(err) => {
                tracing::info!(%err, "token validation failed");
                false
            }
        }
    }

    /// `{base}/{path}`, with `id` appended as a single percent-encoded
    /// segment so it can never change the route or add a query.
    fn endpoint(&self, path: &str, id: Option<&str>) -> Result<Url> {
        if matches!(id, Some("" | "." | "..")) {
            return Err(AltaryError::Config(format!("invalid resource id {id:?}")));
        }
        let invalid_base =
            || AltaryError::Config(format!("invalid api_base_url {:?}", self.base_url));
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid_base())?;
        {
            let mut segments = url.path_segments_mut().map_err(|()| invalid_base())?;
            segments
                .pop_if_empty()
                .extend(path.split('/').filter(|segment| !segment.is_empty()));
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    /// Send with auth headers and map the status to a typed failure.
    /// `not_found` names the resource for a 404; `None` treats 404 like any
    /// other status.
    async fn send(
        &self,
        request: RequestBuilder,
        token: &str,
        not_found: Option<String>,
    ) -> Result<Value> {
        let response = request
            .header(TOKEN_HEADER, token)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "Altary request failed");
            return Err(classify_status(status, &text, not_found).into());
        }
        serde_json::from_str(&text)
            .map_err(|err| AltaryError::from(ApiError::Malformed(err.to_string())))
    }
}

fn classify_status(status: StatusCode, body: &str, not_found: Option<String>) -> ApiError {
    match (status, not_found) {
        (StatusCode::UNAUTHORIZED, _) => ApiError::Unauthorized,
        (StatusCode::FORBIDDEN, _) => ApiError::Forbidden,
        (StatusCode::NOT_FOUND, Some(resource)) => ApiError::NotFound(resource),
        _ => ApiError::Status {
            status: status.as_u16(),
            message: body_message(body).unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
        },
    }
}

/// Pull a human-readable `message` (or `error`) out of a JSON error body.
fn body_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

/// Accept the three shapes the projects endpoint has been seen to return:
/// a bare list, `{"projects": [...]}`, or a single project object.
pub fn normalize_projects(payload: Value) -> std::result::Result<Vec<Value>, ApiError> {
    match payload {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => {
            if let Some(projects) = map.remove("projects") {
                return match projects {
                    Value::Array(items) => Ok(items),
                    Value::Null => Ok(Vec::new()),
                    other => Err(ApiError::Malformed(format!(
                        "`projects` is not a list: {other}"
                    ))),
                };
            }
            if map.contains_key("error") || map.contains_key("message") {
                let message = ["message", "error"]
                    .iter()
                    .find_map(|key| map.get(*key).and_then(Value::as_str))
                    .unwrap_or("unknown error")
                    .to_string();
                return Err(ApiError::Remote(message));
            }
            Ok(vec![Value::Object(map)])
        }
        other => Err(ApiError::Malformed(format!(
            "expected a list or object of projects, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockApi, MockResponse};
    use serde_json::json;

    fn client_for(mock: &MockApi) -> AltaryClient {
        AltaryClient::new(http_client().unwrap(), &mock.base_url)
    }

    #[test]
    fn normalize_accepts_all_three_shapes() {
        let expected = vec![json!({"id": "p1"})];
        assert_eq!(
            normalize_projects(json!({"projects": [{"id": "p1"}]})).unwrap(),
            expected
        );
        assert_eq!(normalize_projects(json!([{"id": "p1"}])).unwrap(), expected);
        assert_eq!(normalize_projects(json!({"id": "p1"})).unwrap(), expected);
    }

    #[test]
    fn normalize_surfaces_error_objects() {
        let err = normalize_projects(json!({"status": "error", "message": "no access"})).unwrap_err();
        assert_eq!(err, ApiError::Remote("no access".to_string()));
        assert!(matches!(
            normalize_projects(json!("nope")),
            Err(ApiError::Malformed(_))
        ));
    }

    #[test]
    fn project_public_id_prefers_report_rand() {
        let project: Project =
            serde_json::from_value(json!({"id": 7, "name": "Shop", "report_rand": "ALTR-7"}))
                .unwrap();
        assert_eq!(project.public_id(), "ALTR-7");
        assert!(project.matches("7"));
        assert!(project.matches("ALTR-7"));
        assert!(!project.matches("ALTR-8"));
    }

    #[tokio::test]
    async fn list_projects_sends_token_and_unwraps_payload() {
        let mock = MockApi::start(|_| MockResponse::json(200, json!({"projects": [{"id": "p1"}]})));
        let projects = client_for(&mock).list_projects("T1").await.unwrap();

        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].id.as_deref(), Some("p1"));
        let requests = mock.requests();
        assert_eq!(requests[0].method, "GET");
        assert_eq!(requests[0].url, "/users/getUserProjects");
        assert_eq!(requests[0].token.as_deref(), Some("T1"));
    }

    #[tokio::test]
    async fn list_projects_maps_status_codes() {
        let mock = MockApi::start(|request| match request.token.as_deref() {
            Some("expired") => MockResponse::json(401, json!({})),
            Some("guest") => MockResponse::json(403, json!({})),
            _ => MockResponse::json(500, json!({"message": "database down"})),
        });
        let client = client_for(&mock);

        let err = client.list_projects("expired").await.unwrap_err();
        assert!(matches!(err, AltaryError::Api(ApiError::Unauthorized)), "{err:?}");
        let err = client.list_projects("guest").await.unwrap_err();
        assert!(matches!(err, AltaryError::Api(ApiError::Forbidden)), "{err:?}");
        let err = client.list_projects("other").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "request failed with HTTP 500: database down"
        );
    }

    #[tokio::test]
    async fn transport_failures_are_typed() {
        // Nothing listens on a freshly released port.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = AltaryClient::new(http_client().unwrap(), &format!("http://127.0.0.1:{port}"));
        let err = client.list_projects("T").await.unwrap_err();
        assert!(matches!(err, AltaryError::Transport(_)), "{err:?}");
    }

    #[tokio::test]
    async fn get_errors_and_complete_error_map_not_found() {
        let mock = MockApi::start(|request| {
            if request.url.ends_with("/ALTR-1") {
                MockResponse::json(200, json!({"status": "success", "errors": []}))
            } else {
                MockResponse::json(404, json!({}))
            }
        });
        let client = client_for(&mock);

        let payload = client.get_errors("T", "ALTR-1").await.unwrap();
        assert_eq!(payload["status"], "success");

        let err = client.get_errors("T", "ALTR-2").await.unwrap_err();
        assert!(matches!(err, AltaryError::Api(ApiError::NotFound(_))), "{err:?}");

        let err = client.complete_error("T", "E-9").await.unwrap_err();
        assert_eq!(err.to_string(), "not found: error E-9");
        let last = mock.requests().pop().unwrap();
        assert_eq!(last.method, "POST");
        assert_eq!(last.url, "/issues/completeErrorWithSimilar/E-9");
    }

    #[tokio::test]
    async fn ids_stay_inside_their_path_segment() {
        let mock = MockApi::start(|_| MockResponse::json(200, json!({"status": "success"})));
        let client = client_for(&mock);

        client.complete_error("T", "../../users/getUserProjects").await.unwrap();
        client.complete_error("T", "E1?force=1").await.unwrap();
        client.get_errors("T", "ALTR-1/../../users/claude-auth").await.unwrap();

        let seen: Vec<(String, String)> = mock
            .requests()
            .into_iter()
            .map(|r| (r.method, r.url))
            .collect();
        assert_eq!(
            seen,
            [
                (
                    "POST".to_string(),
                    "/issues/completeErrorWithSimilar/..%2F..%2Fusers%2FgetUserProjects".to_string()
                ),
                (
                    "POST".to_string(),
                    "/issues/completeErrorWithSimilar/E1%3Fforce=1".to_string()
                ),
                (
                    "GET".to_string(),
                    "/issues/getError/ALTR-1%2F..%2F..%2Fusers%2Fclaude-auth".to_string()
                ),
            ]
        );
    }

    #[tokio::test]
    async fn dot_segment_ids_are_refused_before_sending() {
        let mock = MockApi::start(|_| MockResponse::json(200, json!({"status": "success"})));
        let client = client_for(&mock);

        let err = client.complete_error("T", "..").await.unwrap_err();
        assert!(matches!(err, AltaryError::Config(_)), "{err:?}");
        let err = client.get_errors("T", ".").await.unwrap_err();
        assert!(matches!(err, AltaryError::Config(_)), "{err:?}");
        assert!(mock.requests().is_empty());
    }

    #[test]
    fn endpoint_keeps_a_base_path_prefix() {
        let client = AltaryClient::new(http_client().unwrap(), "https://altary.example/api/");
        let url = client.endpoint(ERRORS_PATH, Some("ALTR-1")).unwrap();
        assert_eq!(url.as_str(), "https://altary.example/api/issues/getError/ALTR-1");
    }

    #[tokio::test]
    async fn validate_token_is_a_boolean() {
        let mock = MockApi::start(|request| match request.token.as_deref() {
            Some("good") => MockResponse::json(200, json!([])),
            _ => MockResponse::json(401, json!({})),
        });
        let client = client_for(&mock);
        assert!(client.validate_token("good").await);
        assert!(!client.validate_token("bad").await);
    }
}
