//! The external text-completion capability.
//!
//! The engine never talks to a model provider directly. Whoever embeds it
//! supplies a [`TextCompletion`] implementation; this module only adds a
//! bounded timeout and a small retry budget around it.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::CompletionError;
use crate::prompt::RenderedPrompt;

/// Generation options passed through to the completion service.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    /// Upper bound on response length.
    pub max_tokens: u32,
    /// Sampling temperature. Scorers use a low value.
    pub temperature: f32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            max_tokens: 256,
            temperature: 0.1,
        }
    }
}

/// Prompt in, text out.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// Complete `prompt`.
    async fn complete(
        &self,
        prompt: &RenderedPrompt,
        options: CompletionOptions,
    ) -> Result<String, CompletionError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// Call `client` with a per-attempt `limit`, retrying up to `retries` times.
///
/// Each response is passed through `accept`; a rejected response counts
/// as a failed attempt just like a transport error. A timed-out attempt
/// counts as [`CompletionError::Unavailable`]. A rate-limited attempt
/// waits for the suggested delay (capped at `limit`) before retrying. The
/// last error is returned once the budget is spent.
pub async fn complete_with_retry<T>(
    client: &dyn TextCompletion,
    prompt: &RenderedPrompt,
    options: CompletionOptions,
    limit: Duration,
    retries: u32,
    accept: impl Fn(&str) -> Result<T, CompletionError> + Send,
) -> Result<T, CompletionError> {
    let mut attempt: u32 = 0;
    loop {
        let result = match timeout(limit, client.complete(prompt, options)).await {
            Ok(inner) => inner.and_then(|text| accept(&text)),
            Err(_elapsed) => Err(CompletionError::Unavailable {
                reason: format!("timed out after {}ms", limit.as_millis()),
            }),
        };

        match result {
            Ok(value) => {
                debug!(backend = client.name(), attempt, "completion succeeded");
                return Ok(value);
            }
            Err(err) if attempt < retries => {
                warn!(backend = client.name(), attempt, error = %err, "completion failed, retrying");
                if let CompletionError::RateLimited {
                    retry_after_ms: Some(ms),
                } = err
                {
                    tokio::time::sleep(Duration::from_millis(ms).min(limit)).await;
                }
                attempt = attempt.saturating_add(1);
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted completion backends for tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    /// Replays a fixed script of responses, then repeats the last one.
    pub struct Scripted {
        script: Mutex<VecDeque<Result<String, CompletionError>>>,
        pub calls: AtomicU32,
    }

    impl Scripted {
        pub fn new(script: Vec<Result<String, CompletionError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            }
        }

        pub fn always(response: Result<String, CompletionError>) -> Self {
            Self::new(vec![response])
        }
    }

    #[async_trait]
    impl TextCompletion for Scripted {
        async fn complete(
            &self,
            _prompt: &RenderedPrompt,
            _options: CompletionOptions,
        ) -> Result<String, CompletionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            #[allow(clippy::unwrap_used)]
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front().unwrap_or_else(|| {
                    Err(CompletionError::InvalidResponse {
                        reason: String::from("script exhausted"),
                    })
                })
            } else {
                script.front().cloned().unwrap_or_else(|| {
                    Err(CompletionError::InvalidResponse {
                        reason: String::from("empty script"),
                    })
                })
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    /// Never answers.
    pub struct Stalled;

    #[async_trait]
    impl TextCompletion for Stalled {
        async fn complete(
            &self,
            _prompt: &RenderedPrompt,
            _options: CompletionOptions,
        ) -> Result<String, CompletionError> {
            std::future::pending::<()>().await;
            Err(CompletionError::Unavailable {
                reason: String::from("unreachable"),
            })
        }

        fn name(&self) -> &str {
            "stalled"
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::testing::{Scripted, Stalled};
    use super::*;

    fn prompt() -> RenderedPrompt {
        RenderedPrompt {
            system: String::from("sys"),
            user: String::from("user"),
        }
    }

    #[tokio::test]
    async fn transient_failure_is_retried_once() {
        let client = Scripted::new(vec![
            Err(CompletionError::Unavailable {
                reason: String::from("reset"),
            }),
            Ok(String::from("{\"ok\": true}")),
        ]);
        let text = complete_with_retry(
            &client,
            &prompt(),
            CompletionOptions::default(),
            Duration::from_secs(1),
            1,
            |text| Ok(text.to_owned()),
        )
        .await
        .unwrap();
        assert_eq!(text, "{\"ok\": true}");
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn budget_exhaustion_returns_last_error() {
        let client = Scripted::always(Err(CompletionError::InvalidResponse {
            reason: String::from("garbage"),
        }));
        let err = complete_with_retry(
            &client,
            &prompt(),
            CompletionOptions::default(),
            Duration::from_secs(1),
            1,
            |text| Ok(text.to_owned()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CompletionError::InvalidResponse { .. }));
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_backend_times_out_as_unavailable() {
        let err = complete_with_retry(
            &Stalled,
            &prompt(),
            CompletionOptions::default(),
            Duration::from_millis(50),
            1,
            |text| Ok(text.to_owned()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CompletionError::Unavailable { .. }));
    }
}
