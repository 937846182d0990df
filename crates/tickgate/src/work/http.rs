use super::Work;
use core::time::Duration;
use tokio_util::sync::CancellationToken;

/// Per-request timeout applied by [`StatusFetch`] unless configured otherwise.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings for the default HTTP work function.
#[derive(Clone, Debug)]
pub struct FetchConfig {
    /// Upper bound on one request, from connect until the response head has
    /// arrived. Owned by the work function, independent of the pool.
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

/// Failure of a single [`StatusFetch`] invocation.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request could not be built, sent, or timed out.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The run was cancelled while the request was in flight.
    #[error("request cancelled")]
    Cancelled,
}

/// Default work function: one `GET` per URL, reporting only the status code.
///
/// The body is never read. On success the payload is `"Status: <code>"`.
#[derive(Clone, Debug)]
pub struct StatusFetch {
    client: reqwest::Client,
}

impl StatusFetch {
    /// Builds a fetcher with its own client.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Transport`] if the HTTP client cannot be
    /// initialized (for example, TLS backend setup failed).
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client })
    }

    /// Reuses an existing client, keeping whatever timeout it was built with.
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch(&self, scope: CancellationToken, url: String) -> Result<String, FetchError> {
        #[cfg(feature = "tracing")]
        tracing::trace!("GET {}", url);

        tokio::select! {
            () = scope.cancelled() => Err(FetchError::Cancelled),
            response = self.client.get(&url).send() => {
                let response = response?;
                Ok(format!("Status: {}", response.status().as_u16()))
            }
        }
    }
}

impl Work<String> for StatusFetch {
    type Output = String;
    type Error = FetchError;

    fn run(
        &self,
        scope: CancellationToken,
        item: String,
    ) -> impl Future<Output = Result<String, FetchError>> + Send {
        self.fetch(scope, item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    /// Serves a single canned response and returns the URL to reach it.
    async fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0_u8; 1024];
            let _ = stream.read(&mut buf).await;
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        });
        format!("http://{addr}/")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn reports_status_code() {
        let url = serve_once("HTTP/1.1 204 No Content\r\nContent-Length: 0\r\n\r\n").await;
        let fetch = StatusFetch::new(FetchConfig::default()).unwrap();

        let payload = fetch.run(CancellationToken::new(), url).await.unwrap();
        assert_eq!(payload, "Status: 204");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn non_success_status_is_still_a_payload() {
        let url = serve_once("HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n").await;
        let fetch = StatusFetch::new(FetchConfig::default()).unwrap();

        let payload = fetch.run(CancellationToken::new(), url).await.unwrap();
        assert_eq!(payload, "Status: 404");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn transport_failure_is_an_error() {
        // Bind then drop to get a port nothing listens on.
        let addr = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();
        let fetch = StatusFetch::new(FetchConfig {
            timeout: Duration::from_secs(2),
        })
        .unwrap();

        let err = fetch
            .run(CancellationToken::new(), format!("http://{addr}/"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn malformed_url_is_an_error() {
        let fetch = StatusFetch::new(FetchConfig::default()).unwrap();
        let err = fetch
            .run(CancellationToken::new(), "not a url".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancelled_scope_short_circuits() {
        // Accepts but never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _hold = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let fetch = StatusFetch::new(FetchConfig::default()).unwrap();
        let scope = CancellationToken::new();
        let request = tokio::spawn({
            let scope = scope.clone();
            async move { fetch.run(scope, format!("http://{addr}/")).await }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        scope.cancel();
        let err = request.await.unwrap().unwrap_err();
        assert!(matches!(err, FetchError::Cancelled));
    }

    #[test]
    fn default_timeout_is_ten_seconds() {
        assert_eq!(FetchConfig::default().timeout, Duration::from_secs(10));
    }
}
