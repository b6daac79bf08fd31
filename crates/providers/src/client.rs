//! LlmClient: the provider wrapper the reasoner actually talks to.
//!
//! Adds, on top of a raw `ChatProvider`:
//! - sliding-window rate limiting (the wait counts toward the caller's
//!   deadline)
//! - exponential-backoff retry on transient errors
//! - cumulative token accounting read by the resource governor
//!
//! Permanent errors (auth, malformed tool payloads) surface immediately so
//! the reasoner can branch into its recovery path.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use ironmind_core::error::{is_retryable, Error, Result};
use ironmind_core::provider::{ChatProvider, ChatRequest, ChatResponse, Usage};

use crate::rate_limit::RateLimiter;

/// Retry and rate-limit settings for the client.
#[derive(Debug, Clone, Copy)]
pub struct ClientSettings {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub rate_limit_rpm: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            rate_limit_rpm: 30,
        }
    }
}

/// Provider wrapper with rate limiting, retry, and token accounting.
pub struct LlmClient {
    provider: Arc<dyn ChatProvider>,
    limiter: RateLimiter,
    settings: ClientSettings,
    stats: Mutex<Usage>,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn ChatProvider>, settings: ClientSettings) -> Self {
        Self {
            provider,
            limiter: RateLimiter::new(settings.rate_limit_rpm),
            settings,
            stats: Mutex::new(Usage::default()),
        }
    }

    /// Send a chat request with tools.
    ///
    /// Transient errors (network, timeout, 5xx, rate limit) are retried
    /// with backoff `d * 2^k` up to `max_retries`. The optional deadline
    /// bounds both the limiter wait and the retry sleeps; overrunning it
    /// yields `Error::Cancelled`.
    pub async fn chat_with_tools(
        &self,
        request: ChatRequest,
        deadline: Option<Instant>,
    ) -> Result<ChatResponse> {
        self.limiter
            .acquire(deadline)
            .await
            .map_err(|_| Error::Cancelled {
                reason: "task deadline elapsed while waiting for a rate limit slot".into(),
            })?;

        let mut attempt: u32 = 0;
        loop {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(Error::Cancelled {
                        reason: "task deadline elapsed before the LLM call".into(),
                    });
                }
            }

            match self.provider.chat(request.clone()).await {
                Ok(response) => {
                    if let Some(usage) = &response.usage {
                        let mut stats = self.stats.lock().expect("stats lock poisoned");
                        stats.add(usage);
                        debug!(
                            call_tokens = usage.total_tokens,
                            cumulative = stats.total_tokens,
                            "LLM call complete"
                        );
                    }
                    return Ok(response);
                }
                Err(provider_error) => {
                    let error = Error::Provider(provider_error);
                    if !is_retryable(&error) || attempt >= self.settings.max_retries {
                        return Err(error);
                    }

                    let delay = self.settings.retry_delay * 2u32.pow(attempt);
                    attempt += 1;
                    warn!(
                        attempt,
                        max = self.settings.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Transient LLM error, retrying with backoff"
                    );

                    if let Some(deadline) = deadline {
                        if Instant::now() + delay > deadline {
                            return Err(Error::Cancelled {
                                reason: "task deadline elapsed during retry backoff".into(),
                            });
                        }
                    }
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Cumulative token usage since the last reset.
    pub fn stats(&self) -> Usage {
        *self.stats.lock().expect("stats lock poisoned")
    }

    /// Reset the cumulative counters (the reasoner does this per task).
    pub fn reset_stats(&self) {
        *self.stats.lock().expect("stats lock poisoned") = Usage::default();
    }
}
