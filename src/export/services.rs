//! Remote collaborators of the export pipeline.
//!
//! The pipeline talks to two services through traits so tests can swap in
//! scripted implementations: [`UrlResolver`] turns file ids into temporary
//! download URLs, and [`ContentFetcher`] downloads the bytes behind a URL.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::types::{ExportContext, FileRef, SUCCESS_CODE};

/// Map file ids to download URLs
#[async_trait]
pub trait UrlResolver: Send + Sync {
    /// Resolve one batch; ids missing from the returned map have no URL
    async fn resolve(
        &self,
        ctx: &ExportContext,
        files: &[FileRef],
    ) -> Result<HashMap<String, String>>;
}

/// Download the content behind a resolved URL
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetch the whole body
    async fn fetch(&self, ctx: &ExportContext, url: &str) -> Result<Vec<u8>>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolveRequest<'a> {
    org_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    bus_type_code: Option<&'a str>,
    files: &'a [FileRef],
}

#[derive(Deserialize)]
struct ResolveResponse {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: HashMap<String, Option<String>>,
}

fn build_client(config: &ServiceConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()?)
}

fn with_auth(
    request: reqwest::RequestBuilder,
    header: &str,
    ctx: &ExportContext,
) -> reqwest::RequestBuilder {
    match &ctx.auth_token {
        Some(token) => request.header(header, token),
        None => request,
    }
}

/// [`UrlResolver`] posting JSON to the platform's URL-resolution endpoint
///
/// Request body: `{ "orgId", "busTypeCode", "files": [{ "fileId", ... }] }`.
/// Response body: `{ "code": 200, "data": { "<fileId>": "<url>" } }`.
/// Relative URLs in the response are resolved against the endpoint.
#[derive(Clone, Debug)]
pub struct HttpUrlResolver {
    client: reqwest::Client,
    endpoint: Url,
    auth_header: String,
}

impl HttpUrlResolver {
    /// Create a resolver for `config.resolve_url`
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.resolve_url).map_err(|e| Error::Config {
            message: format!("invalid resolve_url '{}': {}", config.resolve_url, e),
            key: Some("resolve_url".to_string()),
        })?;
        Ok(Self {
            client: build_client(config)?,
            endpoint,
            auth_header: config.auth_header.clone(),
        })
    }
}

#[async_trait]
impl UrlResolver for HttpUrlResolver {
    async fn resolve(
        &self,
        ctx: &ExportContext,
        files: &[FileRef],
    ) -> Result<HashMap<String, String>> {
        let body = ResolveRequest {
            org_id: &ctx.org_id,
            bus_type_code: ctx.bus_type_code.as_deref(),
            files,
        };
        let request = self.client.post(self.endpoint.clone()).json(&body);
        let response = with_auth(request, &self.auth_header, ctx)
            .send()
            .await?
            .error_for_status()?;
        let parsed: ResolveResponse = response.json().await?;

        if parsed.code != SUCCESS_CODE {
            return Err(Error::Service(format!(
                "URL resolution returned code {}: {}",
                parsed.code,
                parsed.message.unwrap_or_default()
            )));
        }

        let mut urls = HashMap::with_capacity(parsed.data.len());
        for (file_id, url) in parsed.data {
            let Some(url) = url.filter(|u| !u.trim().is_empty()) else {
                continue;
            };
            match self.endpoint.join(&url) {
                Ok(absolute) => {
                    urls.insert(file_id, absolute.to_string());
                }
                Err(e) => {
                    tracing::warn!(file_id = %file_id, url = %url, error = %e, "ignoring unparseable download URL");
                }
            }
        }
        tracing::debug!(requested = files.len(), resolved = urls.len(), "resolved download URLs");
        Ok(urls)
    }
}

/// [`ContentFetcher`] performing an authenticated GET
#[derive(Clone, Debug)]
pub struct HttpContentFetcher {
    client: reqwest::Client,
    auth_header: String,
}

impl HttpContentFetcher {
    /// Create a fetcher using the timeout and auth header of `config`
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            auth_header: config.auth_header.clone(),
        })
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch(&self, ctx: &ExportContext, url: &str) -> Result<Vec<u8>> {
        let request = self.client.get(url);
        let response = with_auth(request, &self.auth_header, ctx)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service_config(server: &MockServer) -> ServiceConfig {
        ServiceConfig {
            resolve_url: format!("{}/api/file/urls", server.uri()),
            ..Default::default()
        }
    }

    fn ctx() -> ExportContext {
        ExportContext {
            org_id: "org-1".to_string(),
            bus_type_code: Some("PO".to_string()),
            auth_token: Some("token-abc".to_string()),
        }
    }

    fn file_ref(id: &str) -> FileRef {
        FileRef {
            file_id: id.to_string(),
            session_guid: None,
            bus_type_code: None,
        }
    }

    #[tokio::test]
    async fn resolver_posts_context_and_reads_url_map() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/file/urls"))
            .and(header("Authorization", "token-abc"))
            .and(body_partial_json(serde_json::json!({
                "orgId": "org-1",
                "busTypeCode": "PO",
                "files": [{ "fileId": "f1" }, { "fileId": "f2" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 200,
                "data": { "f1": "/download/f1", "f2": null }
            })))
            .mount(&server)
            .await;

        let resolver = HttpUrlResolver::new(&service_config(&server)).unwrap();
        let urls = resolver
            .resolve(&ctx(), &[file_ref("f1"), file_ref("f2")])
            .await
            .unwrap();

        assert_eq!(urls.len(), 1);
        assert_eq!(urls["f1"], format!("{}/download/f1", server.uri()));
    }

    #[tokio::test]
    async fn resolver_rejects_non_success_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 401,
                "message": "session expired"
            })))
            .mount(&server)
            .await;

        let resolver = HttpUrlResolver::new(&service_config(&server)).unwrap();
        let err = resolver.resolve(&ctx(), &[file_ref("f1")]).await.unwrap_err();

        match err {
            Error::Service(msg) => assert!(msg.contains("session expired")),
            other => panic!("expected service error, got {other:?}"),
        }
    }

    #[test]
    fn resolver_requires_valid_endpoint() {
        let err = HttpUrlResolver::new(&ServiceConfig::default()).unwrap_err();
        assert_eq!(err.error_code(), "config_error");
    }

    #[tokio::test]
    async fn fetcher_returns_body_and_maps_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/download/ok"))
            .and(header("Authorization", "token-abc"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/download/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpContentFetcher::new(&ServiceConfig::default()).unwrap();

        let body = fetcher
            .fetch(&ctx(), &format!("{}/download/ok", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, b"%PDF-1.4");

        let err = fetcher
            .fetch(&ctx(), &format!("{}/download/gone", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }
}
