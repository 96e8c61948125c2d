use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, AUTHORIZATION, CONTENT_TYPE, USER_AGENT,
};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::config::Settings;
use crate::error::{AkaError, Result};
use crate::http::auth::resolve_authorization;
use crate::http::client::{HttpClient, HttpError, Response};

/// Client for the platform API
///
/// Adds the default headers and credentials to every request and resolves
/// relative paths against the configured API host.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: HttpClient,
    host: Option<String>,
    headers: HeaderMap,
}

impl ApiClient {
    pub fn new(settings: &Settings) -> std::result::Result<Self, HttpError> {
        let authorization = resolve_authorization(
            settings.stored_credential.as_deref(),
            settings.api_token.as_deref(),
            settings.api_auth.as_deref(),
        );

        Ok(Self {
            http: HttpClient::new(settings.max_redirects)?,
            host: settings.api_host.clone(),
            headers: default_headers(&settings.user_agent, authorization.as_deref()),
        })
    }

    /// Underlying pipeline, for requests outside the API host
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// Headers sent with every API request
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Absolute URL for `path`
    pub fn url(&self, path: &str) -> Result<String> {
        if is_absolute(path) {
            return Ok(path.to_string());
        }
        let host = self.host.as_deref().ok_or(AkaError::ApiHostMissing)?;
        Ok(resolve_url(host, path))
    }

    /// Perform a request and return the raw response
    pub async fn request(
        &self,
        method: Method,
        payload: Option<&[u8]>,
        path: &str,
    ) -> Result<Response> {
        let url = self.url(path)?;
        let response = self.http.perform(method, payload, &url, &self.headers).await?;
        Ok(response)
    }

    /// Perform a request and decode the JSON body
    ///
    /// An empty body decodes as JSON `null`.
    pub async fn json<T: DeserializeOwned>(
        &self,
        method: Method,
        payload: Option<&[u8]>,
        path: &str,
    ) -> Result<T> {
        let response = self.request(method, payload, path).await?;
        let text = response.body.as_text().ok_or(HttpError::UnexpectedBinary)?;
        let text = match text.trim() {
            "" => "null",
            _ => text,
        };
        let value = serde_json::from_str(text).map_err(HttpError::Json)?;
        Ok(value)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.json(Method::GET, None, path).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.json(Method::DELETE, None, path).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, body: &B, path: &str) -> Result<T> {
        let payload = serde_json::to_vec(body)?;
        self.json(Method::POST, Some(&payload), path).await
    }

    pub async fn patch<B: Serialize, T: DeserializeOwned>(
        &self,
        body: &B,
        path: &str,
    ) -> Result<T> {
        let payload = serde_json::to_vec(body)?;
        self.json(Method::PATCH, Some(&payload), path).await
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(&self, body: &B, path: &str) -> Result<T> {
        let payload = serde_json::to_vec(body)?;
        self.json(Method::PUT, Some(&payload), path).await
    }
}

fn is_absolute(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

/// Resolve `path` against `host`, assuming https when the host has no scheme
pub fn resolve_url(host: &str, path: &str) -> String {
    if is_absolute(path) {
        return path.to_string();
    }
    let base = if is_absolute(host) {
        host.to_string()
    } else {
        format!("https://{host}")
    };
    format!("{}{}", base.trim_end_matches('/'), path)
}

fn default_headers(user_agent: &str, authorization: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

    match HeaderValue::from_str(user_agent) {
        Ok(value) => {
            headers.insert(USER_AGENT, value);
        }
        Err(_) => warn!(user_agent, "ignoring invalid user agent"),
    }

    if let Some(authorization) = authorization {
        match HeaderValue::from_str(authorization) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            Err(_) => warn!("ignoring authorization value with invalid characters"),
        }
    }

    headers
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::write::GzEncoder;
    use flate2::Compression;
    use serde::Deserialize;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Build {
        id: String,
    }

    fn create_test_client(host: String, token: Option<&str>) -> ApiClient {
        let settings = Settings {
            api_host: Some(host),
            stored_credential: Some("stored".to_string()),
            api_token: token.map(str::to_string),
            ..Settings::default()
        };
        ApiClient::new(&settings).unwrap()
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url("apps.example.com", "/apps"),
            "https://apps.example.com/apps"
        );
        assert_eq!(
            resolve_url("http://localhost:5000/", "/apps"),
            "http://localhost:5000/apps"
        );
        assert_eq!(
            resolve_url("apps.example.com", "https://logs.example.com/stream/1"),
            "https://logs.example.com/stream/1"
        );
    }

    #[test]
    fn test_missing_host_is_reported() {
        let client = ApiClient::new(&Settings::default()).unwrap();
        assert!(matches!(client.url("/apps"), Err(AkaError::ApiHostMissing)));
        assert_eq!(
            client.url("http://other/x").unwrap(),
            "http://other/x".to_string()
        );
    }

    #[test]
    fn test_default_headers() {
        let client = create_test_client("apps.example.com".to_string(), None);
        let headers = client.headers();

        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(headers[ACCEPT], "*/*");
        assert_eq!(headers[ACCEPT_ENCODING], "gzip");
        assert_eq!(headers[USER_AGENT], "akkeris-cli");
        assert_eq!(headers[AUTHORIZATION], "Bearer stored");
    }

    #[tokio::test]
    async fn test_get_decodes_gzipped_json_with_credentials() {
        let server = MockServer::start().await;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(br#"[{"id":"b1"},{"id":"b2"}]"#).unwrap();

        Mock::given(method("GET"))
            .and(path("/apps/api/builds"))
            .and(header("authorization", "Bearer override"))
            .and(header("user-agent", "akkeris-cli"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-encoding", "gzip")
                    .set_body_bytes(encoder.finish().unwrap()),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(server.uri(), Some("override"));
        let builds: Vec<Build> = client.get("/apps/api/builds").await.unwrap();

        assert_eq!(
            builds,
            vec![
                Build {
                    id: "b1".to_string()
                },
                Build {
                    id: "b2".to_string()
                }
            ]
        );
    }

    #[tokio::test]
    async fn test_post_sends_json_payload() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/apps/api/builds"))
            .and(body_json(serde_json::json!({"sha": "abc"})))
            .respond_with(ResponseTemplate::new(201).set_body_string(r#"{"id":"b3"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(server.uri(), None);
        let build: Build = client
            .post(&serde_json::json!({"sha": "abc"}), "/apps/api/builds")
            .await
            .unwrap();

        assert_eq!(build.id, "b3");
    }

    #[tokio::test]
    async fn test_empty_success_body_decodes_as_null() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/apps/api/builds/b1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(server.uri(), None);
        let deleted: Option<serde_json::Value> =
            client.delete("/apps/api/builds/b1").await.unwrap();

        assert_eq!(deleted, None);
    }

    #[tokio::test]
    async fn test_status_failure_is_returned_not_decoded() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/apps/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let client = create_test_client(server.uri(), None);
        let err = client
            .get::<serde_json::Value>("/apps/missing")
            .await
            .unwrap_err();

        let AkaError::Http(HttpError::Status(failure)) = err else {
            panic!("expected a status failure, got {err:?}");
        };
        assert_eq!(failure.status.as_u16(), 404);
        assert_eq!(failure.body_text(), "not found");
    }

    #[tokio::test]
    async fn test_binary_body_cannot_be_decoded_as_json() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/slug.zip"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/zip")
                    .set_body_bytes(vec![0x50, 0x4b]),
            )
            .mount(&server)
            .await;

        let client = create_test_client(server.uri(), None);
        let err = client
            .get::<serde_json::Value>("/slug.zip")
            .await
            .unwrap_err();
        assert!(matches!(err, AkaError::Http(HttpError::UnexpectedBinary)));

        let response = client.request(Method::GET, None, "/slug.zip").await.unwrap();
        assert!(response.body.is_binary());
    }
}
