use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, Method};

use crate::args::{DEFAULT_USER_AGENT, HttpMethod};
use crate::error::{AppResult, TaskError, TaskFailure, ValidationError};
use crate::user::{Behavior, UserContext, VirtualUser};

/// Builds the HTTP client shared by every user of a run.
///
/// # Errors
///
/// Returns an error when the TLS backend cannot be initialised.
pub fn build_client(request_timeout: Duration, connect_timeout: Duration) -> AppResult<Client> {
    let client = Client::builder()
        .timeout(request_timeout)
        .connect_timeout(connect_timeout)
        .user_agent(DEFAULT_USER_AGENT)
        .build()?;
    Ok(client)
}

/// One request shape: method, `host + path`, and the pause between requests.
#[derive(Debug, Clone)]
pub struct HttpTarget {
    client: Client,
    method: HttpMethod,
    url: String,
    name: String,
    min_wait: Duration,
    max_wait: Duration,
}

impl HttpTarget {
    /// Stats entries are keyed by `path`.
    #[must_use]
    pub fn new(client: Client, method: HttpMethod, host: &str, path: &str) -> Self {
        Self {
            client,
            method,
            url: join_url(host, path),
            name: path.to_owned(),
            min_wait: Duration::ZERO,
            max_wait: Duration::ZERO,
        }
    }

    /// Sets the pause range between two requests of one user.
    ///
    /// # Errors
    ///
    /// Returns an error when `min_wait` exceeds `max_wait`.
    pub fn with_wait(mut self, min_wait: Duration, max_wait: Duration) -> Result<Self, ValidationError> {
        if min_wait > max_wait {
            return Err(ValidationError::WaitRangeInverted {
                name: self.name,
                min_ms: duration_ms(min_wait),
                max_ms: duration_ms(max_wait),
            });
        }
        self.min_wait = min_wait;
        self.max_wait = max_wait;
        Ok(self)
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Behavior for HttpTarget {
    fn create(&self) -> Box<dyn VirtualUser> {
        Box::new(HttpUser {
            target: self.clone(),
        })
    }
}

/// A virtual user that repeatedly requests one [`HttpTarget`].
#[derive(Debug)]
pub struct HttpUser {
    target: HttpTarget,
}

#[async_trait]
impl VirtualUser for HttpUser {
    async fn step(&mut self, ctx: &UserContext) -> Result<(), TaskError> {
        let target = &self.target;
        let method = target.method.as_str();
        let started = Instant::now();
        let outcome = target
            .client
            .request(to_reqwest(target.method), &target.url)
            .send()
            .await;

        let response = match outcome {
            Ok(response) => response,
            Err(err) if err.is_builder() => {
                return Err(TaskError::Failure(TaskFailure::from_error(&err)));
            }
            Err(err) => {
                ctx.log_failure(method, &target.name, elapsed_ms(started), &err.to_string());
                return Ok(());
            }
        };

        let status = response.status();
        match response.bytes().await {
            Ok(body) if status.is_success() || status.is_redirection() => {
                let length = u64::try_from(body.len()).unwrap_or(u64::MAX);
                ctx.log_success(method, &target.name, elapsed_ms(started), length);
            }
            Ok(_) => {
                let error = format!("HTTP {}", status);
                ctx.log_failure(method, &target.name, elapsed_ms(started), &error);
            }
            Err(err) => {
                tracing::debug!("Body read failed for {}: {}", target.url, err);
                ctx.log_failure(method, &target.name, elapsed_ms(started), &err.to_string());
            }
        }
        Ok(())
    }

    fn wait_time(&self) -> Duration {
        let (min_wait, max_wait) = (self.target.min_wait, self.target.max_wait);
        if max_wait > min_wait {
            rand::thread_rng().gen_range(min_wait..=max_wait)
        } else {
            min_wait
        }
    }
}

fn to_reqwest(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn join_url(host: &str, path: &str) -> String {
    let host = host.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{}/{}", host, path)
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn elapsed_ms(started: Instant) -> u64 {
    duration_ms(started.elapsed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, AppResult};
    use crate::exceptions::ExceptionsHandle;
    use crate::stats::StatsHandle;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves `responses` one connection at a time and returns the base URL.
    async fn serve(responses: Vec<&'static str>) -> AppResult<String> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            for response in responses {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = [0_u8; 1024];
                if stream.read(&mut buf).await.is_err() {
                    return;
                }
                if stream.write_all(response.as_bytes()).await.is_err() {
                    return;
                }
                if stream.shutdown().await.is_err() {
                    return;
                }
            }
        });
        Ok(format!("http://{}", addr))
    }

    fn context() -> (UserContext, StatsHandle) {
        let stats = StatsHandle::new();
        let ctx = UserContext::new("browse", stats.clone(), ExceptionsHandle::new());
        (ctx, stats)
    }

    #[tokio::test(flavor = "current_thread")]
    async fn successful_request_is_logged_with_content_length() -> AppResult<()> {
        let host =
            serve(vec!["HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello"])
                .await?;
        let client = build_client(Duration::from_secs(5), Duration::from_secs(5))?;
        let mut user = HttpTarget::new(client, HttpMethod::Get, &host, "/items").create();
        let (ctx, stats) = context();

        user.step(&ctx).await.map_err(|err| AppError::validation(err.to_string()))?;

        let (requests, failures, length) = stats.read(|stats| {
            stats.get("GET", "/items").map_or((0, 0, 0.0), |entry| {
                (
                    entry.num_requests(),
                    entry.num_failures(),
                    entry.avg_content_length(),
                )
            })
        });
        if requests != 1 || failures != 0 {
            return Err(AppError::validation(format!(
                "Expected one successful request, got {} requests / {} failures",
                requests, failures
            )));
        }
        if (length - 5.0).abs() > f64::EPSILON {
            return Err(AppError::validation(format!(
                "Unexpected content length {}",
                length
            )));
        }
        Ok(())
    }

    #[tokio::test(flavor = "current_thread")]
    async fn error_status_is_logged_as_failure() -> AppResult<()> {
        let host = serve(vec![
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        ])
        .await?;
        let client = build_client(Duration::from_secs(5), Duration::from_secs(5))?;
        let mut user = HttpTarget::new(client, HttpMethod::Post, &host, "cart").create();
        let (ctx, stats) = context();

        user.step(&ctx).await.map_err(|err| AppError::validation(err.to_string()))?;

        let errors = stats.read(|stats| stats.request_errors());
        let Some(error) = errors.first() else {
            return Err(AppError::validation("Expected a request error entry"));
        };
        if error.method != "POST" || error.name != "cart" || !error.error.contains("503") {
            return Err(AppError::validation(format!(
                "Unexpected request error {:?}",
                error
            )));
        }
        Ok(())
    }

    #[tokio::test(flavor = "current_thread")]
    async fn malformed_url_is_a_task_failure() -> AppResult<()> {
        let client = build_client(Duration::from_secs(1), Duration::from_secs(1))?;
        let mut user = HttpTarget::new(client, HttpMethod::Get, "not a url", "/").create();
        let (ctx, stats) = context();

        match user.step(&ctx).await {
            Err(TaskError::Failure(_)) => {}
            Err(TaskError::Interrupt | TaskError::Stop) | Ok(()) => {
                return Err(AppError::validation("Expected a task failure"));
            }
        }
        if stats.read(|stats| stats.total().num_requests()) != 0 {
            return Err(AppError::validation("Builder errors must not be logged as requests"));
        }
        Ok(())
    }

    #[test]
    fn wait_time_stays_in_range() -> AppResult<()> {
        let client = build_client(Duration::from_secs(1), Duration::from_secs(1))?;
        let target = HttpTarget::new(client, HttpMethod::Get, "http://localhost", "/")
            .with_wait(Duration::from_millis(100), Duration::from_millis(200))?;
        let user = target.create();
        for _ in 0..50 {
            let wait = user.wait_time();
            if wait < Duration::from_millis(100) || wait > Duration::from_millis(200) {
                return Err(AppError::validation(format!("Wait {:?} out of range", wait)));
            }
        }
        Ok(())
    }

    #[test]
    fn inverted_wait_range_is_rejected() -> AppResult<()> {
        let client = build_client(Duration::from_secs(1), Duration::from_secs(1))?;
        let result = HttpTarget::new(client, HttpMethod::Get, "http://localhost", "/")
            .with_wait(Duration::from_millis(300), Duration::from_millis(200));
        match result {
            Err(ValidationError::WaitRangeInverted { min_ms: 300, max_ms: 200, .. }) => Ok(()),
            Err(err) => Err(AppError::validation(format!("Unexpected error {}", err))),
            Ok(_) => Err(AppError::validation("Expected inverted wait range to fail")),
        }
    }

    #[test]
    fn urls_join_with_a_single_slash() -> AppResult<()> {
        let cases = [
            ("http://h:1", "/a", "http://h:1/a"),
            ("http://h:1/", "/a", "http://h:1/a"),
            ("http://h:1/", "a", "http://h:1/a"),
        ];
        for (host, path, expected) in cases {
            if join_url(host, path) != expected {
                return Err(AppError::validation(format!(
                    "Unexpected url for {} + {}",
                    host, path
                )));
            }
        }
        Ok(())
    }
}
