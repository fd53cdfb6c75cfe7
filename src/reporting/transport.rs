use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;

use crate::error::Result;

/// A POST the reporter wants delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub url: Url,
    pub content_type: &'static str,
    pub body: String,
}

impl OutboundRequest {
    pub fn json(url: Url, body: String) -> Self {
        Self {
            url,
            content_type: "application/json",
            body,
        }
    }

    pub fn text(url: Url, body: String) -> Self {
        Self {
            url,
            content_type: "text/plain",
            body,
        }
    }
}

/// Status and body of the collector's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound HTTP seam. Implementations return `Err` only for transport
/// failures; non-2xx answers come back as an `HttpResponse`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, request: OutboundRequest) -> Result<HttpResponse>;
}

/// `Transport` over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("latency-agent/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, request: OutboundRequest) -> Result<HttpResponse> {
        let response = self
            .client
            .post(request.url)
            .header(reqwest::header::CONTENT_TYPE, request.content_type)
            .body(request.body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::error::AgentError;

    enum Scripted {
        Respond(HttpResponse),
        Fail(String),
    }

    /// Records requests and replays scripted answers (200 `{}` once the
    /// script runs out). Answers can be held back with `delay`.
    #[derive(Default)]
    pub(crate) struct MockTransport {
        requests: Mutex<Vec<OutboundRequest>>,
        script: Mutex<VecDeque<Scripted>>,
        delay: Mutex<Option<Duration>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    struct InFlight<'a>(&'a AtomicUsize);

    impl Drop for InFlight<'_> {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl MockTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn respond(&self, status: u16, body: &str) -> &Self {
            self.script.lock().push_back(Scripted::Respond(HttpResponse {
                status,
                body: body.to_string(),
            }));
            self
        }

        pub(crate) fn fail(&self, message: &str) -> &Self {
            self.script.lock().push_back(Scripted::Fail(message.to_string()));
            self
        }

        /// Hold every answer for `delay` (tokio time)
        pub(crate) fn delay(&self, delay: Duration) -> &Self {
            *self.delay.lock() = Some(delay);
            self
        }

        /// Most requests that were ever awaiting an answer at the same time
        pub(crate) fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }

        pub(crate) fn requests(&self) -> Vec<OutboundRequest> {
            self.requests.lock().clone()
        }

        pub(crate) fn requests_to(&self, path_suffix: &str) -> Vec<OutboundRequest> {
            self.requests
                .lock()
                .iter()
                .filter(|r| r.url.path().ends_with(path_suffix))
                .cloned()
                .collect()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn post(&self, request: OutboundRequest) -> Result<HttpResponse> {
            self.requests.lock().push(request);

            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            let _in_flight = InFlight(&self.in_flight);

            let delay = *self.delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            match self.script.lock().pop_front() {
                Some(Scripted::Respond(response)) => Ok(response),
                Some(Scripted::Fail(message)) => Err(AgentError::TransportError {
                    message,
                    source: None,
                }),
                None => Ok(HttpResponse {
                    status: 200,
                    body: "{}".to_string(),
                }),
            }
        }
    }
}
