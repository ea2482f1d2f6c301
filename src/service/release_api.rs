//! Release API client.
//!
//! [`ReleaseApi`] is the seam the fetch controller depends on.
//! [`GithubReleaseApi`] lists releases through the GitHub REST API and maps
//! HTTP failures onto [`FetchError`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, RETRY_AFTER};

use crate::domain::{Release, ResourceKey};
use crate::error::{CompanionError, FetchError};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Number of releases requested per list call.
const PER_PAGE: &str = "30";

/// Source of release lists.
#[async_trait]
pub trait ReleaseApi: Send + Sync + std::fmt::Debug {
    /// Lists the releases of `key`, newest first.
    async fn list_releases(&self, key: ResourceKey) -> Result<Vec<Release>, FetchError>;
}

/// GitHub REST implementation of [`ReleaseApi`].
#[derive(Debug, Clone)]
pub struct GithubReleaseApi {
    client: reqwest::Client,
    base_url: String,
    firmware_repo: String,
    app_repo: String,
    timeout: Duration,
}

impl GithubReleaseApi {
    /// Creates a client for the given API base URL and `owner/name`
    /// repositories.
    ///
    /// # Errors
    ///
    /// Returns [`CompanionError::Internal`] if the HTTP client cannot be
    /// built.
    pub fn new(
        base_url: impl Into<String>,
        firmware_repo: impl Into<String>,
        app_repo: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CompanionError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| CompanionError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            firmware_repo: firmware_repo.into(),
            app_repo: app_repo.into(),
            timeout,
        })
    }

    /// Repository that holds the releases of `key`.
    #[must_use]
    pub fn repo(&self, key: ResourceKey) -> &str {
        match key {
            ResourceKey::Firmware => &self.firmware_repo,
            ResourceKey::App => &self.app_repo,
        }
    }

    fn map_transport_error(&self, err: &reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else if err.is_decode() {
            FetchError::Decode {
                message: err.to_string(),
            }
        } else {
            FetchError::Network {
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl ReleaseApi for GithubReleaseApi {
    async fn list_releases(&self, key: ResourceKey) -> Result<Vec<Release>, FetchError> {
        let repo = self.repo(key);
        let url = format!("{}/repos/{repo}/releases", self.base_url);

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/vnd.github+json")
            .query(&[("per_page", PER_PAGE)])
            .send()
            .await
            .map_err(|e| self.map_transport_error(&e))?;

        if let Some(remaining) = header_u64(response.headers(), "x-ratelimit-remaining")
            && remaining < 10
        {
            tracing::warn!(remaining, resource = %key, "release API rate limit low");
        }

        if let Some(error) = classify_status(response.status(), response.headers(), repo) {
            return Err(error);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_transport_error(&e))?;
        serde_json::from_slice::<Vec<Release>>(&body).map_err(|e| FetchError::Decode {
            message: e.to_string(),
        })
    }
}

/// Maps a non-success response onto a [`FetchError`]. Returns `None` for
/// success statuses.
#[must_use]
pub fn classify_status(status: StatusCode, headers: &HeaderMap, repo: &str) -> Option<FetchError> {
    if status.is_success() {
        return None;
    }
    if status == StatusCode::NOT_FOUND {
        return Some(FetchError::NotFound {
            repo: repo.to_string(),
        });
    }

    let exhausted = header_u64(headers, "x-ratelimit-remaining") == Some(0);
    let retry_after = header_u64(headers, RETRY_AFTER.as_str());
    let rate_limited = status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && (exhausted || retry_after.is_some()));
    if rate_limited {
        let retry_after_secs = retry_after.or_else(|| {
            let reset = header_u64(headers, "x-ratelimit-reset")?;
            let now = u64::try_from(Utc::now().timestamp()).ok()?;
            Some(reset.saturating_sub(now))
        });
        return Some(FetchError::RateLimited { retry_after_secs });
    }

    Some(FetchError::Network {
        message: format!("unexpected status {status}"),
    })
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::net::SocketAddr;

    use axum::Router;
    use axum::http::HeaderValue;
    use axum::response::IntoResponse;
    use axum::routing::get;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn success_is_not_an_error() {
        assert!(classify_status(StatusCode::OK, &HeaderMap::new(), "a/b").is_none());
    }

    #[test]
    fn not_found_names_repo() {
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND, &HeaderMap::new(), "a/b"),
            Some(FetchError::NotFound {
                repo: "a/b".to_string()
            })
        );
    }

    #[test]
    fn exhausted_quota_is_rate_limited() {
        let error = classify_status(
            StatusCode::FORBIDDEN,
            &headers(&[("x-ratelimit-remaining", "0")]),
            "a/b",
        );
        assert!(error.as_ref().is_some_and(FetchError::is_rate_limited));
    }

    #[test]
    fn retry_after_is_carried() {
        let error = classify_status(
            StatusCode::TOO_MANY_REQUESTS,
            &headers(&[("retry-after", "120")]),
            "a/b",
        );
        assert_eq!(
            error,
            Some(FetchError::RateLimited {
                retry_after_secs: Some(120)
            })
        );
    }

    #[test]
    fn plain_forbidden_is_network_error() {
        let error = classify_status(StatusCode::FORBIDDEN, &HeaderMap::new(), "a/b");
        assert!(matches!(error, Some(FetchError::Network { .. })));
    }

    async fn serve(router: Router) -> SocketAddr {
        let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            panic!("bind failed");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("no local addr");
        };
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        addr
    }

    fn api(addr: SocketAddr, timeout: Duration) -> GithubReleaseApi {
        let Ok(api) = GithubReleaseApi::new(
            format!("http://{addr}/"),
            "tbnobody/OpenDTU",
            "OpenDTU-App/opendtu-react-native",
            timeout,
        ) else {
            panic!("client build failed");
        };
        api
    }

    #[tokio::test]
    async fn lists_releases_from_server() {
        let router = Router::new().route(
            "/repos/tbnobody/OpenDTU/releases",
            get(|| async {
                (
                    [("content-type", "application/json")],
                    r#"[{"id": 2, "tag_name": "v24.2.12", "name": "v24.2.12",
                        "published_at": "2024-02-12T18:30:00Z", "body": "",
                        "html_url": "https://github.com/tbnobody/OpenDTU/releases/tag/v24.2.12"}]"#,
                )
                    .into_response()
            }),
        );
        let addr = serve(router).await;

        let Ok(releases) = api(addr, Duration::from_secs(5))
            .list_releases(ResourceKey::Firmware)
            .await
        else {
            panic!("list failed");
        };
        assert_eq!(releases.len(), 1);
        assert!(releases.iter().all(|r| r.tag_name == "v24.2.12"));
    }

    #[tokio::test]
    async fn missing_repo_is_not_found() {
        let addr = serve(Router::new()).await;
        let result = api(addr, Duration::from_secs(5))
            .list_releases(ResourceKey::App)
            .await;
        assert_eq!(
            result,
            Err(FetchError::NotFound {
                repo: "OpenDTU-App/opendtu-react-native".to_string()
            })
        );
    }

    #[tokio::test]
    async fn garbage_body_is_decode_error() {
        let router = Router::new().route(
            "/repos/tbnobody/OpenDTU/releases",
            get(|| async { "{\"message\": \"not a list\"}" }),
        );
        let addr = serve(router).await;
        let result = api(addr, Duration::from_secs(5))
            .list_releases(ResourceKey::Firmware)
            .await;
        assert!(matches!(result, Err(FetchError::Decode { .. })));
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let router = Router::new().route(
            "/repos/tbnobody/OpenDTU/releases",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "[]"
            }),
        );
        let addr = serve(router).await;
        let result = api(addr, Duration::from_millis(100))
            .list_releases(ResourceKey::Firmware)
            .await;
        assert_eq!(result, Err(FetchError::Timeout { timeout_ms: 100 }));
    }
}
