//! Retry policy: bounded fixed-delay retries for unreachable-service
//! failures only.
//!
//! A retry is the same logical request: same generation, same prompt,
//! same images. Only the attempt counter moves.

use super::client::CompletionService;
use super::types::{CompletionError, UserContent};
use crate::capture::TargetLanguage;
use crate::config::PolicySettings;
use crate::session::Generation;
use std::time::Duration;

/// One logical request, threaded through every attempt.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub system_prompt: String,
    pub content: UserContent,
    pub language: TargetLanguage,
    pub generation: Generation,
    pub attempt: u32,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    pub fn from_settings(policy: &PolicySettings) -> Self {
        Self::new(policy.max_retries, policy.retry_delay)
    }

    /// Run `request` to completion, retrying unreachable failures.
    ///
    /// `still_current` is consulted before each retry; once the request's
    /// generation is superseded there is no point spending more round
    /// trips on it, and the last error is handed back for the caller to
    /// discard.
    pub async fn execute<C, F>(
        &self,
        client: &C,
        request: &mut PendingRequest,
        still_current: F,
    ) -> Result<String, CompletionError>
    where
        C: CompletionService + ?Sized,
        F: Fn(Generation) -> bool,
    {
        loop {
            let result = client
                .complete(&request.system_prompt, &request.content)
                .await;

            let err = match result {
                Ok(text) => {
                    if request.attempt > 0 {
                        log::info!(
                            "[RETRY] {} succeeded on attempt {}",
                            request.generation,
                            request.attempt
                        );
                    }
                    return Ok(text);
                }
                Err(err) => err,
            };

            if !err.is_transient() || request.attempt >= self.max_retries {
                return Err(err);
            }
            if !still_current(request.generation) {
                log::debug!("[RETRY] {} superseded, not retrying", request.generation);
                return Err(err);
            }

            request.attempt += 1;
            log::warn!(
                "[RETRY] {} unreachable ({}), retry {}/{} in {}ms",
                request.generation,
                err,
                request.attempt,
                self.max_retries,
                self.delay.as_millis()
            );
            tokio::time::sleep(self.delay).await;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&PolicySettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::GenerationAuthority;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays a scripted list of outcomes, one per call.
    struct Scripted {
        outcomes: Mutex<Vec<Result<String, CompletionError>>>,
        calls: Mutex<Vec<(String, UserContent)>>,
    }

    impl Scripted {
        fn new(mut outcomes: Vec<Result<String, CompletionError>>) -> Self {
            outcomes.reverse();
            Self {
                outcomes: Mutex::new(outcomes),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionService for Scripted {
        async fn complete(
            &self,
            system_prompt: &str,
            user_content: &UserContent,
        ) -> Result<String, CompletionError> {
            self.calls
                .lock()
                .unwrap()
                .push((system_prompt.to_string(), user_content.clone()));
            self.outcomes
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(CompletionError::Local("script exhausted".into())))
        }
    }

    fn request(authority: &GenerationAuthority) -> PendingRequest {
        PendingRequest {
            system_prompt: "sys".into(),
            content: UserContent::WithImages {
                instruction: "solve".into(),
                images: vec!["img-a".into()],
            },
            language: TargetLanguage::Python,
            generation: authority.current(),
            attempt: 0,
        }
    }

    fn unreachable() -> Result<String, CompletionError> {
        Err(CompletionError::Unreachable("connection refused".into()))
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_two_unreachable_attempts() {
        let authority = GenerationAuthority::new();
        let client = Scripted::new(vec![unreachable(), unreachable(), Ok("answer".into())]);
        let policy = RetryPolicy::new(2, Duration::from_millis(1200));
        let mut req = request(&authority);

        let start = tokio::time::Instant::now();
        let result = policy
            .execute(&client, &mut req, |g| authority.is_current(g))
            .await;

        assert_eq!(result, Ok("answer".to_string()));
        assert_eq!(client.call_count(), 3);
        assert_eq!(req.attempt, 2);
        assert_eq!(start.elapsed(), Duration::from_millis(2400));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_reuse_identical_payload() {
        let authority = GenerationAuthority::new();
        let client = Scripted::new(vec![unreachable(), Ok("ok".into())]);
        let policy = RetryPolicy::new(2, Duration::from_millis(10));
        let mut req = request(&authority);
        let generation = req.generation;

        policy
            .execute(&client, &mut req, |g| authority.is_current(g))
            .await
            .unwrap();

        let calls = client.calls.lock().unwrap();
        assert_eq!(calls[0], calls[1]);
        assert_eq!(req.generation, generation);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let authority = GenerationAuthority::new();
        let client = Scripted::new(vec![unreachable(), unreachable(), unreachable(), Ok("late".into())]);
        let policy = RetryPolicy::new(2, Duration::from_millis(1200));
        let mut req = request(&authority);

        let result = policy
            .execute(&client, &mut req, |g| authority.is_current(g))
            .await;

        assert!(matches!(result, Err(CompletionError::Unreachable(_))));
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_and_local_are_not_retried() {
        let authority = GenerationAuthority::new();
        let policy = RetryPolicy::new(2, Duration::from_millis(1200));

        let client = Scripted::new(vec![Err(CompletionError::Rejected {
            status: 400,
            message: "bad".into(),
        })]);
        let mut req = request(&authority);
        let result = policy.execute(&client, &mut req, |_| true).await;
        assert!(matches!(result, Err(CompletionError::Rejected { status: 400, .. })));
        assert_eq!(client.call_count(), 1);

        let client = Scripted::new(vec![Err(CompletionError::Configuration("no key".into()))]);
        let mut req = request(&authority);
        let result = policy.execute(&client, &mut req, |_| true).await;
        assert!(matches!(result, Err(CompletionError::Configuration(_))));
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_request_stops_retrying() {
        let authority = GenerationAuthority::new();
        let client = Scripted::new(vec![unreachable(), Ok("never".into())]);
        let policy = RetryPolicy::new(2, Duration::from_millis(1200));
        let mut req = request(&authority);
        authority.bump();

        let result = policy
            .execute(&client, &mut req, |g| authority.is_current(g))
            .await;

        assert!(result.is_err());
        assert_eq!(client.call_count(), 1);
    }
}
