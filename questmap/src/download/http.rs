//! HTTP client abstraction for testability

use std::time::Duration;

use super::error::DownloadError;
use super::task::BoxFuture;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Trait for HTTP GET requests.
///
/// Lets downloaders be tested against canned responses.
pub trait HttpClient: Send + Sync {
    /// Perform a GET request and return the response body.
    ///
    /// Error statuses map to [`DownloadError::Server`], transport failures to
    /// [`DownloadError::Http`].
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, DownloadError>>;
}

/// HTTP client backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self, DownloadError> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(timeout_secs: u64) -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("questmap/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DownloadError::Http(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, DownloadError>> {
        Box::pin(async move {
            let response = self.client.get(url).send().await?;

            let status = response.status();
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(DownloadError::Server {
                    status: status.as_u16(),
                    message: message.trim().to_string(),
                });
            }

            let body = response.bytes().await?;
            Ok(body.to_vec())
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Canned HTTP client recording requested URLs.
    pub(crate) struct MockHttpClient {
        pub response: Mutex<Option<Result<Vec<u8>, DownloadError>>>,
        pub requests: Mutex<Vec<String>>,
    }

    impl MockHttpClient {
        pub fn ok(body: &str) -> Self {
            Self {
                response: Mutex::new(Some(Ok(body.as_bytes().to_vec()))),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(error: DownloadError) -> Self {
            Self {
                response: Mutex::new(Some(Err(error))),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl HttpClient for MockHttpClient {
        fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, DownloadError>> {
            self.requests.lock().push(url.to_string());
            let response = self
                .response
                .lock()
                .take()
                .unwrap_or_else(|| Err(DownloadError::Http("no response left".into())));
            Box::pin(async move { response })
        }
    }

    #[tokio::test]
    async fn test_mock_client() {
        let mock = MockHttpClient::ok("hello");
        assert_eq!(mock.get("http://example.com").await.unwrap(), b"hello");
        assert!(mock.get("http://example.com").await.is_err());
        assert_eq!(mock.requests.lock().len(), 2);
    }

    #[test]
    fn test_reqwest_client_builds() {
        assert!(ReqwestClient::with_timeout(5).is_ok());
    }
}
